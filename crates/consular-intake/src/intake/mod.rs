//! The service-intake-to-payment saga.
//!
//! Control flow: validator → attachment codec → booking identifier →
//! record-keeping client → payment-preparation client → hosted-checkout
//! redirect or embedded confirmation. [`IntakeService`] sequences the
//! stages; every network collaborator sits behind a trait.

pub mod attachments;
pub mod booking;
pub mod domain;
pub mod ledger;
pub mod payment;
pub mod record;
pub mod router;
pub mod schema;
pub mod service;
pub mod validator;

#[cfg(test)]
mod tests;

pub use attachments::{AttachmentCodec, FileError};
pub use booking::BookingId;
pub use domain::{
    Applicant, Attachment, AttachmentUpload, IntakeReceipt, IntakeRequest, IntakeStage,
    PaymentOutcome, PaymentPreparation, RecordAck, SagaRecord, SagaStatusView, ServiceKind,
    Submission,
};
pub use ledger::{LedgerError, SagaLedger};
pub use payment::{
    HttpPaymentConfirmer, HttpPaymentPreparer, PaymentConfirmationError, PaymentConfirmer,
    PaymentPreparationError, PaymentPreparationRequest, PaymentPreparer,
};
pub use record::{HttpRecordKeeper, RecordKeeper, RecordingError};
pub use router::intake_router;
pub use schema::{FieldRequirement, FieldRule, FieldSchema, ServiceRegistry};
pub use service::{IntakeError, IntakeService, SubmitError};
pub use validator::{SubmissionValidator, ValidationError};
