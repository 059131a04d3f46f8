//! Ephemeral credential acquisition.

use crate::backend::BackendClient;
use crate::error::VoiceError;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt;
use tracing::info;

/// Short-lived bearer token authorizing one realtime negotiation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Credential {
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// The bearer token value.
    pub fn secret(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Obtains credentials from the backend's session endpoint.
#[derive(Debug, Clone)]
pub struct SessionBroker {
    backend: BackendClient,
}

impl SessionBroker {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Issues a single `GET /session/`. No retry; the caller aborts on error.
    ///
    /// Transport failures and non-2xx replies are both `Network` errors.
    /// Replies carrying an unusable secret are `Credential` errors.
    pub async fn obtain_credential(&self) -> Result<Credential, VoiceError> {
        let reply = self.backend.fetch_session().await.map_err(|e| match e {
            VoiceError::Http { status, body } => {
                VoiceError::Network(format!("session endpoint returned {}: {}", status, body))
            }
            other => other,
        })?;
        let secret = reply.client_secret;

        if secret.value.trim().is_empty() {
            return Err(VoiceError::Credential(
                "session endpoint returned an empty client secret".to_string(),
            ));
        }

        let expires_at = match secret.expires_at {
            Some(ts) => Some(Utc.timestamp_opt(ts, 0).single().ok_or_else(|| {
                VoiceError::Credential(format!("invalid expires_at timestamp: {}", ts))
            })?),
            None => None,
        };

        let credential = Credential::new(secret.value, expires_at);
        if credential.is_expired_at(Utc::now()) {
            return Err(VoiceError::Credential(
                "session endpoint returned an expired client secret".to_string(),
            ));
        }

        info!(expires_at = ?credential.expires_at, "obtained ephemeral credential");
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn debug_redacts_secret() {
        let credential = Credential::new("ek_live_123", None);
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("ek_live_123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn expiry_check() {
        let now = Utc::now();
        let expired = Credential::new("a", Some(now - Duration::seconds(1)));
        let fresh = Credential::new("b", Some(now + Duration::seconds(60)));
        let open = Credential::new("c", None);

        assert!(expired.is_expired_at(now));
        assert!(!fresh.is_expired_at(now));
        assert!(!open.is_expired_at(now));
    }
}
