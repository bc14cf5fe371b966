//! Messaging gateway client.
//!
//! The [`Gateway`] trait is the seam between the queue processor and the
//! external WhatsApp bridge, so delivery can be exercised against a mock
//! server or a test double.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::property::WhatsappConfig;
use crate::{AppError, Result};

/// Outcome of an accepted send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// Canonical id assigned by the provider, if it returned one.
    pub provider_message_id: Option<String>,
}

/// Outbound delivery contract.
pub trait Gateway: Send + Sync {
    /// Send `body` to `number` through the tenant's gateway.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Gateway`] when the provider rejects the request
    /// or cannot be reached in time.
    fn send<'a>(
        &'a self,
        target: &'a WhatsappConfig,
        number: &'a str,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SendReceipt>> + Send + 'a>>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    number: &'a str,
    message: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    message_id: Option<String>,
}

/// Gateway implementation speaking the bridge's HTTP API.
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
}

impl HttpGateway {
    /// Build a client whose requests are bounded by `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(timeout.min(Duration::from_secs(10)))
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

impl Gateway for HttpGateway {
    fn send<'a>(
        &'a self,
        target: &'a WhatsappConfig,
        number: &'a str,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SendReceipt>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/api/send", target.api_url.trim_end_matches('/'));
            let response = self
                .client
                .post(&url)
                .header("x-api-key", &target.token)
                .json(&SendRequest {
                    number,
                    message: body,
                })
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                let detail = if text.trim().is_empty() {
                    status.to_string()
                } else {
                    text
                };
                return Err(AppError::Gateway(detail));
            }

            let provider_message_id = match serde_json::from_str::<SendResponse>(&text) {
                Ok(parsed) => parsed.message_id.filter(|id| !id.is_empty()),
                Err(err) => {
                    warn!(%err, "gateway accepted send but response was not recognised");
                    None
                }
            };
            debug!(number, ?provider_message_id, "gateway accepted message");
            Ok(SendReceipt {
                provider_message_id,
            })
        })
    }
}
