use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consular services that share the intake-to-payment lifecycle.
///
/// Each variant carries its own field schema (see [`super::schema`]) but the
/// submit saga is identical across all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Passport,
    IdCard,
    Visa,
    Benefits,
    Housing,
    Citizenship,
    AireRegistration,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 7] = [
        ServiceKind::Passport,
        ServiceKind::IdCard,
        ServiceKind::Visa,
        ServiceKind::Benefits,
        ServiceKind::Housing,
        ServiceKind::Citizenship,
        ServiceKind::AireRegistration,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ServiceKind::Passport => "passport",
            ServiceKind::IdCard => "id_card",
            ServiceKind::Visa => "visa",
            ServiceKind::Benefits => "benefits",
            ServiceKind::Housing => "housing",
            ServiceKind::Citizenship => "citizenship",
            ServiceKind::AireRegistration => "aire_registration",
        }
    }
}

/// Identity fields every service collects, lifted out of the raw field map
/// by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub full_name: String,
    pub email: String,
    pub telephone: String,
}

/// Raw form payload as received from a frontend, prior to validation.
#[derive(Debug, Clone, Deserialize)]
pub struct IntakeRequest {
    pub service: ServiceKind,
    /// Flat field map in the service schema's vocabulary, values untrimmed.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub consent: bool,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
    /// Booking identifier from a previous failed attempt, when the frontend
    /// is retrying rather than starting fresh.
    #[serde(default)]
    pub resume: Option<String>,
}

fn default_locale() -> String {
    "it".to_string()
}

/// An attachment as uploaded: declared metadata plus the raw bytes.
///
/// The declared MIME type and size are what the codec judges before it looks
/// at a single byte; the byte stream is only consulted afterwards. On the
/// wire the bytes travel as base64 text, decoded on the way in.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentUpload {
    pub filename: String,
    pub mime_type: String,
    pub declared_bytes: u64,
    #[serde(default, deserialize_with = "deserialize_base64")]
    pub data: Vec<u8>,
}

fn deserialize_base64<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let raw = String::deserialize(deserializer)?;
    STANDARD
        .decode(raw.as_bytes())
        .map_err(serde::de::Error::custom)
}

/// A validated, transport-encoded attachment. Produced only by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: String,
    pub byte_size: u64,
    /// Base64 payload; always a total encoding of the source bytes.
    pub data: String,
}

/// The immutable, validated submission handed through the saga.
///
/// Constructed only by the validator; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub service: ServiceKind,
    pub applicant: Applicant,
    pub details: BTreeMap<String, String>,
    pub attachments: Vec<Attachment>,
    pub locale: String,
}

/// Acknowledgment from the record-keeping backend. Anything that does not
/// parse into this shape is a failure, never a success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAck {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Payment handoff prepared for a recorded booking. Exactly one mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PaymentPreparation {
    Redirect {
        url: String,
    },
    Embedded {
        #[serde(rename = "clientSecret")]
        client_secret: String,
    },
}

impl PaymentPreparation {
    pub const fn stage(&self) -> IntakeStage {
        match self {
            PaymentPreparation::Redirect { .. } => IntakeStage::RedirectingToCheckout,
            PaymentPreparation::Embedded { .. } => IntakeStage::ConfirmingEmbeddedPayment,
        }
    }
}

/// Terminal verdict of the payment-confirmation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Confirmed,
    RequiresAction {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        redirect_url: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl PaymentOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            PaymentOutcome::Confirmed => "confirmed",
            PaymentOutcome::RequiresAction { .. } => "requires_action",
            PaymentOutcome::Failed { .. } => "failed",
        }
    }
}

/// Stages of the intake saga, strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStage {
    Idle,
    Validating,
    EncodingAttachments,
    Recording,
    PreparingPayment,
    RedirectingToCheckout,
    ConfirmingEmbeddedPayment,
    Succeeded,
    Failed,
}

impl IntakeStage {
    pub const fn label(self) -> &'static str {
        match self {
            IntakeStage::Idle => "idle",
            IntakeStage::Validating => "validating",
            IntakeStage::EncodingAttachments => "encoding_attachments",
            IntakeStage::Recording => "recording",
            IntakeStage::PreparingPayment => "preparing_payment",
            IntakeStage::RedirectingToCheckout => "redirecting_to_checkout",
            IntakeStage::ConfirmingEmbeddedPayment => "confirming_embedded_payment",
            IntakeStage::Succeeded => "succeeded",
            IntakeStage::Failed => "failed",
        }
    }
}

/// Ledger row tracking how far one booking attempt progressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaRecord {
    pub booking_id: super::booking::BookingId,
    pub service: ServiceKind,
    /// True once the record-keeping backend acknowledged `ok:true`. A
    /// recorded booking must never be recorded again under the same id.
    pub recorded: bool,
    pub handoff: Option<PaymentPreparation>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaRecord {
    pub fn open(booking_id: super::booking::BookingId, service: ServiceKind) -> Self {
        let now = Utc::now();
        Self {
            booking_id,
            service,
            recorded: false,
            handoff: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stage(&self) -> IntakeStage {
        match (&self.handoff, self.recorded, &self.last_error) {
            (Some(handoff), _, _) => handoff.stage(),
            (None, true, Some(_)) => IntakeStage::Failed,
            (None, true, None) => IntakeStage::PreparingPayment,
            (None, false, Some(_)) => IntakeStage::Failed,
            (None, false, None) => IntakeStage::Recording,
        }
    }

    pub fn status_view(&self) -> SagaStatusView {
        SagaStatusView {
            booking_id: self.booking_id.clone(),
            service: self.service.label(),
            stage: self.stage().label(),
            recorded: self.recorded,
            last_error: self.last_error.clone(),
        }
    }
}

/// Sanitized status exposed over HTTP: never includes the client secret or
/// any applicant data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaStatusView {
    pub booking_id: super::booking::BookingId,
    pub service: &'static str,
    pub stage: &'static str,
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// What a successful `submit` hands back to the form frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeReceipt {
    pub booking_id: super::booking::BookingId,
    pub next: PaymentPreparation,
}
