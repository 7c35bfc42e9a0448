use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;

use super::attachments::{AttachmentCodec, FileError};
use super::booking::BookingId;
use super::domain::{
    IntakeReceipt, IntakeRequest, IntakeStage, PaymentOutcome, PaymentPreparation, SagaRecord,
    Submission,
};
use super::ledger::{LedgerError, SagaLedger};
use super::payment::{
    PaymentConfirmationError, PaymentConfirmer, PaymentPreparationError, PaymentPreparationRequest,
    PaymentPreparer,
};
use super::record::{RecordKeeper, RecordingError};
use super::validator::{SubmissionValidator, ValidationError};

/// Failure of one intake attempt, tagged with the stage that failed.
///
/// Upstream messages surface verbatim: there is no server-side retry queue,
/// so the user (reading the message) is the only retry mechanism, and a
/// paraphrased error would only obscure what support staff later find in
/// the record-keeping log.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    File(#[from] FileError),
    #[error(transparent)]
    Recording(#[from] RecordingError),
    #[error(transparent)]
    PaymentPreparation(#[from] PaymentPreparationError),
    #[error(transparent)]
    PaymentConfirmation(#[from] PaymentConfirmationError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("booking '{booking_id}' is not known to this service; submit again without a resume id")]
    StaleResume { booking_id: BookingId },
    #[error("booking '{booking_id}' belongs to a different service")]
    ResumeServiceMismatch { booking_id: BookingId },
}

/// A failed `submit`, carrying the booking identifier when one was already
/// allocated so the frontend can resume the attempt instead of starting a
/// fresh saga.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct SubmitError {
    pub booking_id: Option<BookingId>,
    pub error: IntakeError,
}

impl SubmitError {
    fn before_booking(error: impl Into<IntakeError>) -> Self {
        Self {
            booking_id: None,
            error: error.into(),
        }
    }

    fn for_booking(booking_id: BookingId, error: impl Into<IntakeError>) -> Self {
        Self {
            booking_id: Some(booking_id),
            error: error.into(),
        }
    }
}

impl IntakeError {
    /// The saga stage this failure belongs to.
    pub fn stage(&self) -> IntakeStage {
        match self {
            IntakeError::Validation(_) => IntakeStage::Validating,
            IntakeError::File(_) => IntakeStage::EncodingAttachments,
            IntakeError::Recording(_)
            | IntakeError::Ledger(_)
            | IntakeError::StaleResume { .. }
            | IntakeError::ResumeServiceMismatch { .. } => IntakeStage::Recording,
            IntakeError::PaymentPreparation(_) => IntakeStage::PreparingPayment,
            IntakeError::PaymentConfirmation(_) => IntakeStage::ConfirmingEmbeddedPayment,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IntakeError::Validation(_) | IntakeError::File(_) => StatusCode::UNPROCESSABLE_ENTITY,
            IntakeError::Recording(_)
            | IntakeError::PaymentPreparation(_)
            | IntakeError::PaymentConfirmation(_) => StatusCode::BAD_GATEWAY,
            IntakeError::Ledger(LedgerError::Conflict) | IntakeError::Ledger(LedgerError::Busy) => {
                StatusCode::CONFLICT
            }
            IntakeError::StaleResume { .. } | IntakeError::ResumeServiceMismatch { .. } => {
                StatusCode::CONFLICT
            }
            IntakeError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The single saga engine behind every service form.
///
/// Drives validate → encode → record → prepare-payment strictly forward,
/// awaiting each stage fully before the next. The ledger decides, on retry,
/// whether the booking identifier is reused (no ack ever seen) or the
/// recording stage is skipped entirely (ack seen: re-recording would
/// silently overwrite the booking downstream).
pub struct IntakeService<R, P, C, L> {
    validator: SubmissionValidator,
    recorder: Arc<R>,
    preparer: Arc<P>,
    confirmer: Arc<C>,
    ledger: Arc<L>,
}

impl<R, P, C, L> IntakeService<R, P, C, L>
where
    R: RecordKeeper + 'static,
    P: PaymentPreparer + 'static,
    C: PaymentConfirmer + 'static,
    L: SagaLedger + 'static,
{
    pub fn new(
        validator: SubmissionValidator,
        recorder: Arc<R>,
        preparer: Arc<P>,
        confirmer: Arc<C>,
        ledger: Arc<L>,
    ) -> Self {
        Self {
            validator,
            recorder,
            preparer,
            confirmer,
            ledger,
        }
    }

    pub fn validator(&self) -> &SubmissionValidator {
        &self.validator
    }

    /// Run one submission attempt end to end.
    pub async fn submit(&self, request: IntakeRequest) -> Result<IntakeReceipt, SubmitError> {
        let mut submission = self
            .validator
            .validate(&request)
            .map_err(SubmitError::before_booking)?;

        let codec = AttachmentCodec::new(
            self.validator
                .registry()
                .attachment_cap_bytes(request.service),
        );
        let mut attachments = Vec::with_capacity(request.attachments.len());
        for upload in &request.attachments {
            attachments.push(codec.encode(upload).map_err(SubmitError::before_booking)?);
        }
        submission.attachments = attachments;

        let mut saga = self.open_or_resume(&request)?;
        let booking_id = saga.booking_id.clone();

        self.ledger
            .acquire(&booking_id)
            .map_err(|err| SubmitError::for_booking(booking_id.clone(), err))?;

        // Re-read under the busy mark: a concurrent submit may have
        // advanced the row between the resume lookup and the acquire, and
        // driving from that stale snapshot could record the booking twice.
        match self.ledger.fetch(&booking_id) {
            Ok(Some(fresh)) => saga = fresh,
            Ok(None) => {}
            Err(err) => {
                self.release_quietly(&booking_id);
                return Err(SubmitError::for_booking(booking_id, err));
            }
        }

        // A row that already holds a payment handoff is a replay; hand the
        // stored result back without touching either downstream system.
        if let Some(handoff) = saga.handoff.clone() {
            self.release_quietly(&booking_id);
            return Ok(IntakeReceipt {
                booking_id,
                next: handoff,
            });
        }

        let outcome = self.drive(&submission, &mut saga).await;

        saga.updated_at = Utc::now();
        let persisted = self.ledger.update(saga);
        self.release_quietly(&booking_id);

        match (outcome, persisted) {
            (Ok(handoff), Ok(())) => Ok(IntakeReceipt {
                booking_id,
                next: handoff,
            }),
            // A receipt must not claim progress the ledger did not persist:
            // a lost `recorded` flag would let a later resume record the
            // booking a second time.
            (Ok(_), Err(err)) => Err(SubmitError::for_booking(booking_id, err)),
            (Err(error), persisted) => {
                if let Err(err) = persisted {
                    tracing::warn!(booking = %booking_id, error = %err, "failed to persist saga state");
                }
                Err(SubmitError {
                    booking_id: Some(booking_id),
                    error,
                })
            }
        }
    }

    fn release_quietly(&self, booking_id: &BookingId) {
        if let Err(err) = self.ledger.release(booking_id) {
            tracing::warn!(booking = %booking_id, error = %err, "failed to release saga row");
        }
    }

    /// Query the provider for the verdict on an embedded payment.
    pub async fn confirm(&self, client_secret: &str) -> Result<PaymentOutcome, IntakeError> {
        let outcome = self.confirmer.confirm(client_secret).await?;
        Ok(outcome)
    }

    pub fn status(&self, booking_id: &BookingId) -> Result<Option<SagaRecord>, IntakeError> {
        let record = self.ledger.fetch(booking_id)?;
        Ok(record)
    }

    /// Booking-identifier policy (see the ledger docs): fresh submissions
    /// mint a new id and open a row; resumes must match a known row of the
    /// same service.
    fn open_or_resume(&self, request: &IntakeRequest) -> Result<SagaRecord, SubmitError> {
        match &request.resume {
            Some(raw) => {
                let booking_id = BookingId::from(raw.as_str());
                let saga = self
                    .ledger
                    .fetch(&booking_id)
                    .map_err(|err| SubmitError::for_booking(booking_id.clone(), err))?
                    .ok_or_else(|| {
                        SubmitError::for_booking(
                            booking_id.clone(),
                            IntakeError::StaleResume {
                                booking_id: booking_id.clone(),
                            },
                        )
                    })?;
                if saga.service != request.service {
                    return Err(SubmitError::for_booking(
                        booking_id.clone(),
                        IntakeError::ResumeServiceMismatch { booking_id },
                    ));
                }
                Ok(saga)
            }
            None => {
                let saga = SagaRecord::open(BookingId::create(), request.service);
                self.ledger
                    .begin(saga.clone())
                    .map_err(|err| SubmitError::for_booking(saga.booking_id.clone(), err))?;
                Ok(saga)
            }
        }
    }

    async fn drive(
        &self,
        submission: &Submission,
        saga: &mut SagaRecord,
    ) -> Result<PaymentPreparation, IntakeError> {
        if !saga.recorded {
            tracing::info!(booking = %saga.booking_id, service = submission.service.label(), "recording submission");
            match self.recorder.record(submission, &saga.booking_id).await {
                Ok(ack) if ack.ok => {
                    saga.recorded = true;
                    saga.last_error = None;
                }
                Ok(ack) => {
                    let err = RecordingError::rejected(ack.error);
                    saga.last_error = Some(err.to_string());
                    return Err(err.into());
                }
                Err(err) => {
                    saga.last_error = Some(err.to_string());
                    return Err(err.into());
                }
            }
        }

        let prepare_request = PaymentPreparationRequest {
            booking_id: saga.booking_id.clone(),
            service: submission.service,
            email: submission.applicant.email.clone(),
            name: submission.applicant.full_name.clone(),
        };

        tracing::info!(booking = %saga.booking_id, "preparing payment");
        match self.preparer.prepare(&prepare_request).await {
            Ok(handoff) => {
                saga.handoff = Some(handoff.clone());
                saga.last_error = None;
                Ok(handoff)
            }
            Err(err) => {
                saga.last_error = Some(err.to_string());
                Err(err.into())
            }
        }
    }
}
