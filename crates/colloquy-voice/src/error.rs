use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Microphone permission denied: {0}")]
    Permission(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed event frame: {0}")]
    Parse(String),

    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("Invalid credential: {0}")]
    Credential(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("A voice session is already active")]
    AlreadyActive,

    #[error("Session start was cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for VoiceError {
    fn from(e: reqwest::Error) -> Self {
        VoiceError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for VoiceError {
    fn from(e: serde_json::Error) -> Self {
        VoiceError::Parse(e.to_string())
    }
}
