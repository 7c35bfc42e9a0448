use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use consular_intake::intake::{
    intake_router, IntakeService, PaymentConfirmer, PaymentPreparer, RecordKeeper, SagaLedger,
};
use serde_json::json;
use std::sync::Arc;

/// The intake saga routes plus the service's operational endpoints.
pub(crate) fn with_intake_routes<R, P, C, L>(
    service: Arc<IntakeService<R, P, C, L>>,
) -> axum::Router
where
    R: RecordKeeper + 'static,
    P: PaymentPreparer + 'static,
    C: PaymentConfirmer + 'static,
    L: SagaLedger + 'static,
{
    intake_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
