use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemorySagaLedger};
use crate::routes::with_intake_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use consular_intake::config::{AppConfig, IntakeConfig, DEFAULT_ATTACHMENT_CAP_BYTES};
use consular_intake::error::AppError;
use consular_intake::intake::{
    HttpPaymentConfirmer, HttpPaymentPreparer, HttpRecordKeeper, IntakeError, IntakeService,
    ServiceRegistry, SubmissionValidator,
};
use consular_intake::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    // Fail fast: without endpoints and secrets the saga can never leave
    // Idle, so a misconfigured deployment should not come up at all.
    let intake_config = IntakeConfig::load()?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let recorder =
        Arc::new(HttpRecordKeeper::from_config(&intake_config).map_err(IntakeError::from)?);
    let preparer =
        Arc::new(HttpPaymentPreparer::from_config(&intake_config).map_err(IntakeError::from)?);
    let confirmer =
        Arc::new(HttpPaymentConfirmer::from_config(&intake_config).map_err(IntakeError::from)?);
    let ledger = Arc::new(InMemorySagaLedger::default());

    let cap = if intake_config.attachment_cap_bytes > 0 {
        intake_config.attachment_cap_bytes
    } else {
        DEFAULT_ATTACHMENT_CAP_BYTES
    };
    let intake_service = Arc::new(IntakeService::new(
        SubmissionValidator::new(ServiceRegistry::standard(cap)),
        recorder,
        preparer,
        confirmer,
        ledger,
    ));

    let app = with_intake_routes(intake_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "consular intake service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
