use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::IntakeConfig;

use super::booking::BookingId;
use super::domain::{RecordAck, Submission};

/// Record-keeping call failed or was rejected. Never retried automatically:
/// the payload carries attachments and a blind retry could double-submit a
/// large upload, so the user is the retry mechanism.
#[derive(Debug, thiserror::Error)]
pub enum RecordingError {
    #[error("record-keeping request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },
    #[error("record-keeping endpoint answered HTTP {status}")]
    Status { status: u16 },
    #[error("record-keeping endpoint returned an unreadable acknowledgment")]
    MalformedAck,
    #[error("{message}")]
    Rejected { message: String },
}

impl RecordingError {
    /// Failure for an `ok:false` ack, carrying the server's own wording
    /// when it gave any.
    pub fn rejected(server_error: Option<String>) -> Self {
        Self::Rejected {
            message: server_error
                .filter(|msg| !msg.trim().is_empty())
                .unwrap_or_else(|| "record-keeping backend rejected the submission".to_string()),
        }
    }
}

/// Seam over the record-keeping backend so the saga engine can be exercised
/// without a network.
#[async_trait]
pub trait RecordKeeper: Send + Sync {
    async fn record(
        &self,
        submission: &Submission,
        booking_id: &BookingId,
    ) -> Result<RecordAck, RecordingError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordRequestBody<'a> {
    token: &'a str,
    action: &'static str,
    booking_id: &'a str,
    service: &'static str,
    name: &'a str,
    email: &'a str,
    telephone: &'a str,
    files: Vec<WireFile<'a>>,
    data: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireFile<'a> {
    filename: &'a str,
    mime_type: &'a str,
    data: &'a str,
}

/// Production client. Holds the shared secret; frontends never see it.
#[derive(Debug, Clone)]
pub struct HttpRecordKeeper {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl HttpRecordKeeper {
    pub fn from_config(config: &IntakeConfig) -> Result<Self, RecordingError> {
        let client = reqwest::Client::builder()
            // Generous: submissions carry base64 attachments.
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: config.record_url.clone(),
            token: config.record_token.clone(),
        })
    }
}

#[async_trait]
impl RecordKeeper for HttpRecordKeeper {
    async fn record(
        &self,
        submission: &Submission,
        booking_id: &BookingId,
    ) -> Result<RecordAck, RecordingError> {
        let body = RecordRequestBody {
            token: &self.token,
            action: "submit",
            booking_id: booking_id.as_str(),
            service: submission.service.label(),
            name: &submission.applicant.full_name,
            email: &submission.applicant.email,
            telephone: &submission.applicant.telephone,
            files: submission
                .attachments
                .iter()
                .map(|attachment| WireFile {
                    filename: &attachment.filename,
                    mime_type: &attachment.mime_type,
                    data: &attachment.data,
                })
                .collect(),
            data: &submission.details,
        };

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RecordingError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json::<RecordAck>()
            .await
            .map_err(|_| RecordingError::MalformedAck)
    }
}
