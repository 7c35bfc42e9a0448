//! End-to-end intake saga exercised through the public facade and router,
//! with both downstream systems faked at the trait seams.

mod common {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use consular_intake::intake::{
        BookingId, LedgerError, PaymentConfirmationError, PaymentConfirmer, PaymentOutcome,
        PaymentPreparation, PaymentPreparationError, PaymentPreparationRequest, PaymentPreparer,
        RecordAck, RecordKeeper, RecordingError, SagaLedger, SagaRecord, Submission,
    };

    /// Record-keeping fake that captures the last submission it saw.
    #[derive(Default)]
    pub struct CapturingRecorder {
        pub seen: Mutex<Vec<(BookingId, Submission)>>,
    }

    #[async_trait]
    impl RecordKeeper for CapturingRecorder {
        async fn record(
            &self,
            submission: &Submission,
            booking_id: &BookingId,
        ) -> Result<RecordAck, RecordingError> {
            self.seen
                .lock()
                .expect("mutex poisoned")
                .push((booking_id.clone(), submission.clone()));
            Ok(RecordAck {
                ok: true,
                error: None,
            })
        }
    }

    /// Preparer that always hands back an embedded-flow client secret.
    #[derive(Default)]
    pub struct EmbeddedPreparer {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl PaymentPreparer for EmbeddedPreparer {
        async fn prepare(
            &self,
            _request: &PaymentPreparationRequest,
        ) -> Result<PaymentPreparation, PaymentPreparationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PaymentPreparation::Embedded {
                client_secret: "pi_42_secret_xyz".to_string(),
            })
        }
    }

    #[derive(Default)]
    pub struct ConfirmedConfirmer;

    #[async_trait]
    impl PaymentConfirmer for ConfirmedConfirmer {
        async fn confirm(
            &self,
            _client_secret: &str,
        ) -> Result<PaymentOutcome, PaymentConfirmationError> {
            Ok(PaymentOutcome::Confirmed)
        }
    }

    #[derive(Default)]
    pub struct MemoryLedger {
        rows: Mutex<HashMap<BookingId, SagaRecord>>,
        busy: Mutex<HashSet<BookingId>>,
    }

    impl SagaLedger for MemoryLedger {
        fn begin(&self, record: SagaRecord) -> Result<(), LedgerError> {
            let mut rows = self.rows.lock().expect("mutex poisoned");
            if rows.contains_key(&record.booking_id) {
                return Err(LedgerError::Conflict);
            }
            rows.insert(record.booking_id.clone(), record);
            Ok(())
        }

        fn fetch(&self, id: &BookingId) -> Result<Option<SagaRecord>, LedgerError> {
            Ok(self.rows.lock().expect("mutex poisoned").get(id).cloned())
        }

        fn update(&self, record: SagaRecord) -> Result<(), LedgerError> {
            let mut rows = self.rows.lock().expect("mutex poisoned");
            if !rows.contains_key(&record.booking_id) {
                return Err(LedgerError::NotFound);
            }
            rows.insert(record.booking_id.clone(), record);
            Ok(())
        }

        fn acquire(&self, id: &BookingId) -> Result<(), LedgerError> {
            if !self.busy.lock().expect("mutex poisoned").insert(id.clone()) {
                return Err(LedgerError::Busy);
            }
            Ok(())
        }

        fn release(&self, id: &BookingId) -> Result<(), LedgerError> {
            self.busy.lock().expect("mutex poisoned").remove(id);
            Ok(())
        }
    }
}

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{CapturingRecorder, ConfirmedConfirmer, EmbeddedPreparer, MemoryLedger};
use consular_intake::config::DEFAULT_ATTACHMENT_CAP_BYTES;
use consular_intake::intake::{
    intake_router, IntakeService, ServiceRegistry, SubmissionValidator,
};

type SagaService =
    IntakeService<CapturingRecorder, EmbeddedPreparer, ConfirmedConfirmer, MemoryLedger>;

fn build() -> (
    Arc<SagaService>,
    Arc<CapturingRecorder>,
    Arc<EmbeddedPreparer>,
) {
    let recorder = Arc::new(CapturingRecorder::default());
    let preparer = Arc::new(EmbeddedPreparer::default());
    let service = Arc::new(IntakeService::new(
        SubmissionValidator::new(ServiceRegistry::standard(DEFAULT_ATTACHMENT_CAP_BYTES)),
        recorder.clone(),
        preparer.clone(),
        Arc::new(ConfirmedConfirmer),
        Arc::new(MemoryLedger::default()),
    ));
    (service, recorder, preparer)
}

fn aire_submission() -> Value {
    json!({
        "service": "aire_registration",
        "fields": {
            "full_name": "Marco Bianchi",
            "email": "marco.bianchi@example.com",
            "telephone": "+44 20 7946 0812",
            "date_of_birth": "1985-11-23",
            "place_of_birth": "Napoli",
            "foreign_address": "12 Holland Park Ave, London",
            "marital_status": "married",
            "partner_full_name": "Elena Greco",
            "partner_date_of_birth": "1987-02-14",
            "multiple_citizenships": "no",
        },
        "consent": true,
        "locale": "it",
        "attachments": [{
            "filename": "passport.pdf",
            "mime_type": "application/pdf",
            "declared_bytes": 4,
            "data": STANDARD.encode(b"%PDF"),
        }],
    })
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("serializable")))
        .expect("request builds")
}

#[tokio::test]
async fn full_saga_submit_status_confirm() {
    let (service, recorder, preparer) = build();
    let router = intake_router(service);

    // Submit: validate → encode → record → prepare → embedded handoff.
    let response = router
        .clone()
        .oneshot(post("/api/v1/intake/submissions", &aire_submission()))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let receipt = json_body(response).await;
    let booking_id = receipt["bookingId"].as_str().expect("id").to_string();
    assert_eq!(receipt["next"]["mode"], "embedded");
    let client_secret = receipt["next"]["clientSecret"].as_str().expect("secret");

    // The recorded submission carried the wire-ready attachment and the
    // conditional partner fields.
    let seen = recorder.seen.lock().expect("mutex poisoned");
    assert_eq!(seen.len(), 1);
    let (recorded_id, submission) = &seen[0];
    assert_eq!(recorded_id.as_str(), booking_id);
    assert_eq!(submission.attachments.len(), 1);
    assert_eq!(submission.attachments[0].data, STANDARD.encode(b"%PDF"));
    assert_eq!(
        submission.details.get("partner_full_name").map(String::as_str),
        Some("Elena Greco")
    );
    drop(seen);
    assert_eq!(preparer.calls.load(Ordering::SeqCst), 1);

    // Status reflects the embedded confirmation stage.
    let response = router
        .clone()
        .oneshot(
            Request::get(format!("/api/v1/intake/submissions/{booking_id}"))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let status = json_body(response).await;
    assert_eq!(status["stage"], "confirming_embedded_payment");
    assert_eq!(status["recorded"], true);
    assert_eq!(status["service"], "aire_registration");

    // Confirmation reports the provider's verdict.
    let response = router
        .oneshot(post(
            "/api/v1/intake/payments/confirmations",
            &json!({ "clientSecret": client_secret }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = json_body(response).await;
    assert_eq!(outcome["status"], "confirmed");
}

#[tokio::test]
async fn invalid_submission_is_rejected_without_recording() {
    let (service, recorder, preparer) = build();
    let mut body = aire_submission();
    body["fields"]["partner_full_name"] = json!("");

    let response = intake_router(service)
        .oneshot(post("/api/v1/intake/submissions", &body))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let error = json_body(response).await;
    assert_eq!(error["field"], "partner_full_name");
    assert!(recorder.seen.lock().expect("mutex poisoned").is_empty());
    assert_eq!(preparer.calls.load(Ordering::SeqCst), 0);
}
