//! SDP offer/answer exchange with the realtime speech service.

use crate::backend::ensure_success;
use crate::broker::Credential;
use crate::config::VoiceConfig;
use crate::error::VoiceError;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, warn};

const SDP_CONTENT_TYPE: &str = "application/sdp";

/// Posts the local offer and returns the remote answer SDP.
#[derive(Debug, Clone)]
pub struct Negotiator {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl Negotiator {
    pub fn new(http: reqwest::Client, config: &VoiceConfig) -> Self {
        Self {
            http,
            endpoint: config.realtime_url.clone(),
            model: config.model.clone(),
            timeout: config.negotiation_timeout(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends `offer_sdp` with the credential as bearer token.
    ///
    /// The whole round-trip is bounded by the configured negotiation timeout.
    pub async fn exchange(
        &self,
        offer_sdp: &str,
        credential: &Credential,
    ) -> Result<String, VoiceError> {
        debug!(endpoint = %self.endpoint, model = %self.model, "posting SDP offer");

        let request = self
            .http
            .post(&self.endpoint)
            .query(&[("model", self.model.as_str())])
            .bearer_auth(credential.secret())
            .header(CONTENT_TYPE, SDP_CONTENT_TYPE)
            .body(offer_sdp.to_string());

        let round_trip = async {
            let response = ensure_success(request.send().await?).await?;
            Ok::<_, VoiceError>(response.text().await?)
        };

        let answer = tokio::time::timeout(self.timeout, round_trip)
            .await
            .map_err(|_| {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "SDP negotiation timed out"
                );
                VoiceError::Timeout(self.timeout.as_secs())
            })?
            .map_err(|e| match e {
                VoiceError::Http { status, body } => {
                    VoiceError::Negotiation(format!("realtime endpoint returned {}: {}", status, body))
                }
                other => other,
            })?;

        if answer.trim().is_empty() {
            return Err(VoiceError::Negotiation(
                "realtime endpoint returned an empty answer".to_string(),
            ));
        }

        Ok(answer)
    }
}
