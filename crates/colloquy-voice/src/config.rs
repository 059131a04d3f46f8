use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_REALTIME_URL: &str = "https://api.openai.com/v1/realtime";
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";
pub const DEFAULT_DATA_CHANNEL_LABEL: &str = "oai-events";

fn default_realtime_url() -> String {
    DEFAULT_REALTIME_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_REALTIME_MODEL.to_string()
}

fn default_data_channel_label() -> String {
    DEFAULT_DATA_CHANNEL_LABEL.to_string()
}

fn default_negotiation_timeout_secs() -> u64 {
    15
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Base URL of the study backend, e.g. `http://localhost:8000/api`.
    pub api_url: String,
    /// Realtime negotiation endpoint (without the `model` query).
    #[serde(default = "default_realtime_url")]
    pub realtime_url: String,
    /// Realtime model identifier passed as `?model=`.
    #[serde(default = "default_model")]
    pub model: String,
    /// Label of the event data channel.
    #[serde(default = "default_data_channel_label")]
    pub data_channel_label: String,
    /// Upper bound for the SDP offer/answer round-trip. Default: 15 seconds.
    #[serde(default = "default_negotiation_timeout_secs")]
    pub negotiation_timeout_secs: u64,
    /// Per-request timeout for backend REST calls. Default: 30 seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self::new("http://localhost:8000/api")
    }
}

impl VoiceConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            realtime_url: default_realtime_url(),
            model: default_model(),
            data_channel_label: default_data_channel_label(),
            negotiation_timeout_secs: default_negotiation_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Joins a backend path onto `api_url`, tolerating a trailing slash.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_secs(self.negotiation_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
