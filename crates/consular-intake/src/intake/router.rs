use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::booking::BookingId;
use super::domain::IntakeRequest;
use super::ledger::SagaLedger;
use super::payment::{PaymentConfirmer, PaymentPreparer};
use super::record::RecordKeeper;
use super::service::{IntakeError, IntakeService, SubmitError};

/// Attachments allowed for when sizing the request-body limit.
const BODY_LIMIT_ATTACHMENTS: usize = 4;
/// Headroom for the JSON envelope around the attachment payloads.
const BODY_LIMIT_SLACK_BYTES: usize = 256 * 1024;

/// Axum's default body limit (2 MB) sits well under the attachment cap, so
/// the submissions route carries its own limit: enough for several
/// cap-sized attachments after base64 inflation (4/3), plus envelope slack.
/// Oversized files must reach the codec and get its error, not a bare 413.
fn submission_body_limit(cap_bytes: u64) -> usize {
    let encoded = (cap_bytes as usize).div_ceil(3) * 4;
    encoded * BODY_LIMIT_ATTACHMENTS + BODY_LIMIT_SLACK_BYTES
}

/// Router builder exposing the intake saga over HTTP.
pub fn intake_router<R, P, C, L>(service: Arc<IntakeService<R, P, C, L>>) -> Router
where
    R: RecordKeeper + 'static,
    P: PaymentPreparer + 'static,
    C: PaymentConfirmer + 'static,
    L: SagaLedger + 'static,
{
    let body_limit =
        submission_body_limit(service.validator().registry().max_attachment_cap_bytes());
    Router::new()
        .route(
            "/api/v1/intake/submissions",
            post(submit_handler::<R, P, C, L>).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/api/v1/intake/submissions/:booking_id",
            get(status_handler::<R, P, C, L>),
        )
        .route(
            "/api/v1/intake/payments/confirmations",
            post(confirm_handler::<R, P, C, L>),
        )
        .with_state(service)
}

fn error_response(err: &IntakeError) -> Response {
    let mut payload = json!({
        "error": err.to_string(),
        "stage": err.stage().label(),
    });
    if let IntakeError::Validation(validation) = err {
        if let Some(field) = validation.field() {
            payload["field"] = json!(field);
        }
    }
    (err.status_code(), axum::Json(payload)).into_response()
}

pub(crate) async fn submit_handler<R, P, C, L>(
    State(service): State<Arc<IntakeService<R, P, C, L>>>,
    axum::Json(request): axum::Json<IntakeRequest>,
) -> Response
where
    R: RecordKeeper + 'static,
    P: PaymentPreparer + 'static,
    C: PaymentConfirmer + 'static,
    L: SagaLedger + 'static,
{
    match service.submit(request).await {
        Ok(receipt) => (StatusCode::ACCEPTED, axum::Json(receipt)).into_response(),
        Err(err) => submit_error_response(&err),
    }
}

/// Failed submits additionally expose the booking id (when one exists) so
/// the frontend can retry with `resume` instead of opening a second saga.
fn submit_error_response(err: &SubmitError) -> Response {
    let mut response = error_response(&err.error);
    if let Some(booking_id) = &err.booking_id {
        let payload = json!({
            "error": err.error.to_string(),
            "stage": err.error.stage().label(),
            "bookingId": booking_id,
        });
        response = (err.error.status_code(), axum::Json(payload)).into_response();
    }
    response
}

pub(crate) async fn status_handler<R, P, C, L>(
    State(service): State<Arc<IntakeService<R, P, C, L>>>,
    Path(booking_id): Path<String>,
) -> Response
where
    R: RecordKeeper + 'static,
    P: PaymentPreparer + 'static,
    C: PaymentConfirmer + 'static,
    L: SagaLedger + 'static,
{
    let booking_id = BookingId::from(booking_id.as_str());
    match service.status(&booking_id) {
        Ok(Some(record)) => (StatusCode::OK, axum::Json(record.status_view())).into_response(),
        Ok(None) => {
            let payload = json!({ "error": format!("booking '{booking_id}' not found") });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConfirmRequest {
    #[serde(rename = "clientSecret")]
    pub(crate) client_secret: String,
}

pub(crate) async fn confirm_handler<R, P, C, L>(
    State(service): State<Arc<IntakeService<R, P, C, L>>>,
    axum::Json(request): axum::Json<ConfirmRequest>,
) -> Response
where
    R: RecordKeeper + 'static,
    P: PaymentPreparer + 'static,
    C: PaymentConfirmer + 'static,
    L: SagaLedger + 'static,
{
    match service.confirm(&request.client_secret).await {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => error_response(&err),
    }
}
