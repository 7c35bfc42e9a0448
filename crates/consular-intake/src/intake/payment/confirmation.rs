use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::IntakeConfig;
use crate::intake::domain::PaymentOutcome;

#[derive(Debug, thiserror::Error)]
pub enum PaymentConfirmationError {
    #[error("client secret is not in the provider's expected shape")]
    MalformedClientSecret,
    #[error("payment-provider request failed: {source}")]
    Transport {
        #[from]
        source: reqwest::Error,
    },
    #[error("payment provider answered HTTP {status}")]
    Status { status: u16 },
    #[error("payment provider returned an unreadable intent")]
    MalformedResponse,
}

/// Seam over the provider's confirmation surface. The only contract this
/// system owns is handing over a valid client secret and reporting the
/// provider's verdict; success is never implied before the provider
/// affirmatively reports it.
#[async_trait]
pub trait PaymentConfirmer: Send + Sync {
    async fn confirm(&self, client_secret: &str) -> Result<PaymentOutcome, PaymentConfirmationError>;
}

#[derive(Debug, Deserialize)]
struct IntentBody {
    status: String,
    #[serde(default)]
    last_payment_error: Option<IntentErrorBody>,
    #[serde(default)]
    next_action: Option<NextActionBody>,
}

#[derive(Debug, Deserialize)]
struct IntentErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NextActionBody {
    #[serde(default)]
    redirect_to_url: Option<RedirectToUrlBody>,
}

#[derive(Debug, Deserialize)]
struct RedirectToUrlBody {
    #[serde(default)]
    url: Option<String>,
}

/// Client secrets look like `<intent-id>_secret_<nonce>`. The intent id is
/// needed for the status lookup; a secret without that shape fails here,
/// before any network call.
fn intent_id(client_secret: &str) -> Option<&str> {
    let (id, rest) = client_secret.split_once("_secret_")?;
    if id.is_empty() || rest.is_empty() {
        return None;
    }
    Some(id)
}

#[derive(Debug, Clone)]
pub struct HttpPaymentConfirmer {
    client: reqwest::Client,
    provider_url: String,
    publishable_key: String,
}

impl HttpPaymentConfirmer {
    pub fn from_config(config: &IntakeConfig) -> Result<Self, PaymentConfirmationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            provider_url: config.provider_url.trim_end_matches('/').to_string(),
            publishable_key: config.provider_publishable_key.clone(),
        })
    }

    fn map_intent(intent: IntentBody) -> PaymentOutcome {
        match intent.status.as_str() {
            "succeeded" => PaymentOutcome::Confirmed,
            // Strong-authentication challenge in progress; the frontend
            // follows the redirect and re-queries after return.
            "requires_action" | "requires_source_action" | "processing" => {
                PaymentOutcome::RequiresAction {
                    redirect_url: intent
                        .next_action
                        .and_then(|action| action.redirect_to_url)
                        .and_then(|redirect| redirect.url),
                }
            }
            other => PaymentOutcome::Failed {
                reason: intent
                    .last_payment_error
                    .and_then(|err| err.message)
                    .unwrap_or_else(|| format!("payment was not completed (status: {other})")),
            },
        }
    }
}

#[async_trait]
impl PaymentConfirmer for HttpPaymentConfirmer {
    async fn confirm(
        &self,
        client_secret: &str,
    ) -> Result<PaymentOutcome, PaymentConfirmationError> {
        let id = intent_id(client_secret)
            .ok_or(PaymentConfirmationError::MalformedClientSecret)?;

        let url = format!("{}/v1/payment_intents/{id}", self.provider_url);
        let response = self
            .client
            .get(url)
            .query(&[
                ("client_secret", client_secret),
                ("key", self.publishable_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PaymentConfirmationError::Status {
                status: status.as_u16(),
            });
        }

        let intent = response
            .json::<IntentBody>()
            .await
            .map_err(|_| PaymentConfirmationError::MalformedResponse)?;

        Ok(Self::map_intent(intent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_id_requires_the_secret_shape() {
        assert_eq!(intent_id("pi_123_secret_abc"), Some("pi_123"));
        assert_eq!(intent_id("pi_123"), None);
        assert_eq!(intent_id("_secret_abc"), None);
        assert_eq!(intent_id("pi_123_secret_"), None);
    }

    #[test]
    fn only_an_affirmative_succeeded_maps_to_confirmed() {
        let confirmed = HttpPaymentConfirmer::map_intent(IntentBody {
            status: "succeeded".to_string(),
            last_payment_error: None,
            next_action: None,
        });
        assert_eq!(confirmed, PaymentOutcome::Confirmed);

        let challenged = HttpPaymentConfirmer::map_intent(IntentBody {
            status: "requires_action".to_string(),
            last_payment_error: None,
            next_action: Some(NextActionBody {
                redirect_to_url: Some(RedirectToUrlBody {
                    url: Some("https://provider.example/3ds".to_string()),
                }),
            }),
        });
        assert_eq!(
            challenged,
            PaymentOutcome::RequiresAction {
                redirect_url: Some("https://provider.example/3ds".to_string()),
            }
        );

        let declined = HttpPaymentConfirmer::map_intent(IntentBody {
            status: "requires_payment_method".to_string(),
            last_payment_error: Some(IntentErrorBody {
                message: Some("card declined".to_string()),
            }),
            next_action: None,
        });
        assert_eq!(
            declined,
            PaymentOutcome::Failed {
                reason: "card declined".to_string(),
            }
        );
    }
}
