//! Outbound delivery of build payloads to webhook targets

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{StatusCode, redirect};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::DeliverySettings;
use crate::error::{Result, WebhookError};

/// Outcome counts of one dispatch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// POSTs a JSON body to each target in turn.
///
/// A failing target is logged and skipped; it never stops the remaining
/// targets and never surfaces as an error to the caller.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(settings: &DeliverySettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| WebhookError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub async fn dispatch(&self, body: &[u8], targets: &[String]) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for url in targets {
            summary.attempted += 1;
            match self.post_json(url, body).await {
                Ok(status) => {
                    summary.delivered += 1;
                    debug!("Delivered webhook to {} ({})", url, status);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("{}", e);
                }
            }
        }

        if summary.attempted > 0 {
            info!(
                "Webhook dispatch finished: {} delivered, {} failed",
                summary.delivered, summary.failed
            );
        }
        summary
    }

    async fn post_json(&self, url: &str, body: &[u8]) -> Result<StatusCode> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, body.len())
            .body(body.to_vec())
            .send()
            .await
            .map_err(|source| WebhookError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(status)
    }
}
