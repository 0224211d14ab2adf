//! HTTP scoring dispatcher.

use super::{ScoringDispatcher, ScoringPayload};
use crate::error::{Error, Result};
use crate::types::{Minutia, VerificationOutcome};
use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for [`HttpDispatcher`].
#[derive(Debug, Clone)]
pub struct HttpDispatcherConfig {
    /// Scoring engine URL receiving `POST` comparisons.
    pub endpoint: String,
    /// Bound on a single comparison, connect time included.
    pub timeout: Duration,
}

impl Default for HttpDispatcherConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000/compare".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Posts comparisons to the scoring engine as JSON.
///
/// - 2xx with a JSON body: successful outcome
/// - 4xx with a JSON body: the engine answered and rejected the comparison
/// - anything else: [`Error::Dispatch`]
#[derive(Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    config: HttpDispatcherConfig,
}

impl HttpDispatcher {
    /// Create a dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Dispatch`] if the HTTP client cannot be built.
    pub fn new(config: HttpDispatcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Dispatch(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// The configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl ScoringDispatcher for HttpDispatcher {
    async fn compare(
        &self,
        candidate: &[Minutia],
        reference: &[Minutia],
    ) -> Result<VerificationOutcome> {
        let start = Instant::now();
        let payload = ScoringPayload {
            candidate,
            reference,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("scoring engine timed out after {:?}", self.config.timeout)
                } else {
                    format!("scoring engine unreachable: {e}")
                };
                warn!(endpoint = %self.config.endpoint, error = %e, "Scoring dispatch failed");
                Error::Dispatch(reason)
            })?;

        let status = response.status();
        if status.is_server_error() || status.is_informational() || status.is_redirection() {
            return Err(Error::Dispatch(format!(
                "scoring engine returned status {status}"
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Dispatch(format!("Failed to read scoring response: {e}")))?;
        let payload: Value = serde_json::from_slice(&body)
            .map_err(|e| Error::Dispatch(format!("Undecodable scoring response: {e}")))?;

        debug!(
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis(),
            "Scoring dispatch completed"
        );

        Ok(VerificationOutcome {
            success: status.is_success(),
            payload,
        })
    }
}
