use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::IntakeConfig;
use crate::intake::booking::BookingId;
use crate::intake::domain::{PaymentPreparation, ServiceKind};

/// Identifying fields the payment-preparation endpoint needs. No payment
/// amount travels here; the endpoint derives pricing from the service key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPreparationRequest {
    pub booking_id: BookingId,
    pub service: ServiceKind,
    pub email: String,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentPreparationError {
    #[error("payment-preparation request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },
    #[error("payment-preparation endpoint answered HTTP {status}")]
    Status { status: u16 },
    #[error("payment-preparation endpoint returned an unreadable response")]
    MalformedResponse,
    #[error("payment-preparation endpoint returned no usable checkout url or client secret")]
    NoUsableResult,
}

/// Seam over the internal payment-preparation endpoint. Invoked only after
/// the record-keeping backend acknowledged the booking; a payment must
/// never be prepared for an unrecorded booking.
#[async_trait]
pub trait PaymentPreparer: Send + Sync {
    async fn prepare(
        &self,
        request: &PaymentPreparationRequest,
    ) -> Result<PaymentPreparation, PaymentPreparationError>;
}

/// Outgoing wire body: the preparation fields plus the url the hosted
/// checkout should send the applicant back to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreparationRequestBody<'a> {
    #[serde(flatten)]
    request: &'a PaymentPreparationRequest,
    return_url: &'a str,
}

/// Loose response shape: the endpoint answers with either a hosted-checkout
/// url or an embedded-flow client secret. Exactly one must be present.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreparationResponseBody {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpPaymentPreparer {
    client: reqwest::Client,
    url: String,
    return_url: String,
}

impl HttpPaymentPreparer {
    pub fn from_config(config: &IntakeConfig) -> Result<Self, PaymentPreparationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: config.payment_preparation_url.clone(),
            return_url: config.payment_return_url.clone(),
        })
    }
}

#[async_trait]
impl PaymentPreparer for HttpPaymentPreparer {
    async fn prepare(
        &self,
        request: &PaymentPreparationRequest,
    ) -> Result<PaymentPreparation, PaymentPreparationError> {
        let body = PreparationRequestBody {
            request,
            return_url: &self.return_url,
        };
        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PaymentPreparationError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .json::<PreparationResponseBody>()
            .await
            .map_err(|_| PaymentPreparationError::MalformedResponse)?;

        match (body.url, body.client_secret) {
            (Some(url), None) if !url.trim().is_empty() => Ok(PaymentPreparation::Redirect { url }),
            (None, Some(client_secret)) if !client_secret.trim().is_empty() => {
                Ok(PaymentPreparation::Embedded { client_secret })
            }
            _ => Err(PaymentPreparationError::NoUsableResult),
        }
    }
}
