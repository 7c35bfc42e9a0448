use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;
use consular_intake::config::DEFAULT_ATTACHMENT_CAP_BYTES;
use consular_intake::error::AppError;
use consular_intake::intake::{
    AttachmentUpload, BookingId, IntakeRequest, IntakeService, PaymentConfirmationError,
    PaymentConfirmer, PaymentOutcome, PaymentPreparation, PaymentPreparationError,
    PaymentPreparationRequest, PaymentPreparer, RecordAck, RecordKeeper, RecordingError,
    ServiceKind, ServiceRegistry, Submission, SubmissionValidator,
};

use crate::infra::InMemorySagaLedger;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Service to submit (passport, id_card, visa, benefits, housing,
    /// citizenship, aire_registration)
    #[arg(long, default_value = "passport", value_parser = crate::infra::parse_service)]
    pub(crate) service: ServiceKind,
    /// Use the hosted-checkout redirect flow instead of the embedded one
    #[arg(long)]
    pub(crate) redirect: bool,
    /// Make the record-keeping stand-in reject the first attempt, then
    /// resume with the same booking identifier
    #[arg(long)]
    pub(crate) simulate_rejection: bool,
}

/// Record-keeping stand-in: optionally rejects the first call so the demo
/// can show the resume path.
struct DemoRecorder {
    reject_first: AtomicBool,
}

#[async_trait]
impl RecordKeeper for DemoRecorder {
    async fn record(
        &self,
        _submission: &Submission,
        booking_id: &BookingId,
    ) -> Result<RecordAck, RecordingError> {
        if self.reject_first.swap(false, Ordering::SeqCst) {
            return Ok(RecordAck {
                ok: false,
                error: Some("duplicate booking reference".to_string()),
            });
        }
        println!("  record-keeping: acknowledged booking {booking_id}");
        Ok(RecordAck {
            ok: true,
            error: None,
        })
    }
}

struct DemoPreparer {
    redirect: bool,
}

#[async_trait]
impl PaymentPreparer for DemoPreparer {
    async fn prepare(
        &self,
        request: &PaymentPreparationRequest,
    ) -> Result<PaymentPreparation, PaymentPreparationError> {
        if self.redirect {
            Ok(PaymentPreparation::Redirect {
                url: format!("https://checkout.example/session/{}", request.booking_id),
            })
        } else {
            Ok(PaymentPreparation::Embedded {
                client_secret: format!("pi_demo_secret_{}", request.booking_id),
            })
        }
    }
}

struct DemoConfirmer;

#[async_trait]
impl PaymentConfirmer for DemoConfirmer {
    async fn confirm(
        &self,
        _client_secret: &str,
    ) -> Result<PaymentOutcome, PaymentConfirmationError> {
        Ok(PaymentOutcome::Confirmed)
    }
}

fn sample_fields(service: ServiceKind) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    fields.insert("full_name".to_string(), "Giulia Rossi".to_string());
    fields.insert("email".to_string(), "giulia.rossi@example.com".to_string());
    fields.insert("telephone".to_string(), "+39 333 1234567".to_string());

    let extra: &[(&str, &str)] = match service {
        ServiceKind::Passport => &[
            ("date_of_birth", "1990-05-04"),
            ("place_of_birth", "Bologna"),
            ("residence_address", "Via Indipendenza 12, Bologna"),
            ("marital_status", "single"),
        ],
        ServiceKind::IdCard => &[
            ("date_of_birth", "1990-05-04"),
            ("place_of_birth", "Bologna"),
            ("residence_address", "Via Indipendenza 12, Bologna"),
        ],
        ServiceKind::Visa => &[
            ("passport_number", "YA1234567"),
            ("travel_purpose", "study"),
            ("arrival_date", "2026-09-01"),
            ("departure_date", "2026-12-20"),
        ],
        ServiceKind::Benefits => &[
            ("fiscal_code", "RSSGLI90E44A944X"),
            ("benefit_type", "maternity"),
            ("household_size", "3"),
        ],
        ServiceKind::Housing => &[
            ("fiscal_code", "RSSGLI90E44A944X"),
            ("current_address", "Via Indipendenza 12, Bologna"),
            ("household_size", "3"),
            ("income_band", "b"),
        ],
        ServiceKind::Citizenship => &[
            ("date_of_birth", "1990-05-04"),
            ("place_of_birth", "Bologna"),
            ("marital_status", "single"),
            ("multiple_citizenships", "no"),
        ],
        ServiceKind::AireRegistration => &[
            ("date_of_birth", "1990-05-04"),
            ("place_of_birth", "Bologna"),
            ("foreign_address", "12 Holland Park Ave, London"),
            ("marital_status", "single"),
            ("multiple_citizenships", "no"),
        ],
    };
    for (name, value) in extra {
        fields.insert((*name).to_string(), (*value).to_string());
    }
    fields
}

fn demo_request(service: ServiceKind, resume: Option<String>) -> IntakeRequest {
    IntakeRequest {
        service,
        fields: sample_fields(service),
        consent: true,
        locale: "it".to_string(),
        attachments: vec![AttachmentUpload {
            filename: "id-scan.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            declared_bytes: 4,
            data: b"%PDF".to_vec(),
        }],
        resume,
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        service,
        redirect,
        simulate_rejection,
    } = args;

    let intake = IntakeService::new(
        SubmissionValidator::new(ServiceRegistry::standard(DEFAULT_ATTACHMENT_CAP_BYTES)),
        Arc::new(DemoRecorder {
            reject_first: AtomicBool::new(simulate_rejection),
        }),
        Arc::new(DemoPreparer { redirect }),
        Arc::new(DemoConfirmer),
        Arc::new(InMemorySagaLedger::default()),
    );

    println!("Submitting a '{}' intake...", service.label());
    let receipt = match intake.submit(demo_request(service, None)).await {
        Ok(receipt) => receipt,
        Err(err) => {
            let booking_id = match err.booking_id {
                Some(id) => id,
                None => return Err(AppError::Intake(err.error)),
            };
            println!(
                "  attempt failed at {}: {}; resuming booking {booking_id}",
                err.error.stage().label(),
                err.error
            );
            intake
                .submit(demo_request(service, Some(booking_id.as_str().to_string())))
                .await
                .map_err(|retry| AppError::Intake(retry.error))?
        }
    };

    println!("Booking {} recorded.", receipt.booking_id);
    match receipt.next {
        PaymentPreparation::Redirect { url } => {
            println!("Hosted checkout: redirect the applicant to {url}");
        }
        PaymentPreparation::Embedded { client_secret } => {
            println!("Embedded payment prepared; confirming...");
            let outcome = intake
                .confirm(&client_secret)
                .await
                .map_err(AppError::Intake)?;
            println!("Payment outcome: {}", outcome.label());
        }
    }

    Ok(())
}
