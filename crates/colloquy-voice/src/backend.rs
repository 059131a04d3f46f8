//! REST client for the study backend.
//!
//! Three endpoints are consumed: the realtime session broker, conversation
//! initialization, and voice utterance upload. None of them are retried.

use crate::config::VoiceConfig;
use crate::error::VoiceError;
use colloquy_types::{
    ConversationContext, InitializeConversationReply, Speaker, Utterance,
};
use reqwest::multipart;
use serde::Deserialize;
use tracing::debug;

/// Body of `GET /session/`.
#[derive(Debug, Deserialize)]
pub(crate) struct SessionReply {
    pub client_secret: ClientSecret,
}

#[derive(Deserialize)]
pub(crate) struct ClientSecret {
    pub value: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl std::fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecret")
            .field("value", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    config: VoiceConfig,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: VoiceConfig) -> Result<Self, VoiceError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) async fn fetch_session(&self) -> Result<SessionReply, VoiceError> {
        let url = self.config.endpoint("/session/");
        debug!(%url, "requesting realtime session");
        let response = self.http.get(&url).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<SessionReply>().await?)
    }

    /// Registers the conversation with the backend and returns its greeting.
    pub async fn initialize_conversation(
        &self,
        context: &ConversationContext,
    ) -> Result<InitializeConversationReply, VoiceError> {
        let url = self.config.endpoint("/initialize_conversation/");
        debug!(%url, conversation_id = %context.conversation_id, "initializing conversation");
        let response = self
            .http
            .post(&url)
            .json(&context.initialize_request())
            .send()
            .await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<InitializeConversationReply>().await?)
    }

    /// Uploads one finalized utterance as a multipart form.
    ///
    /// User turns carry `participant_id`, assistant turns carry `bot_name`.
    pub async fn upload_utterance(
        &self,
        utterance: &Utterance,
        context: &ConversationContext,
    ) -> Result<serde_json::Value, VoiceError> {
        let url = self.config.endpoint("/upload_voice_utterance/");
        let form = utterance_form(utterance, context);
        let response = self.http.post(&url).multipart(form).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json::<serde_json::Value>().await?)
    }
}

pub(crate) fn utterance_form(
    utterance: &Utterance,
    context: &ConversationContext,
) -> multipart::Form {
    let form = multipart::Form::new()
        .text("transcript", utterance.text.clone())
        .text("conversation_id", context.conversation_id.clone())
        .text("is_voice", if utterance.is_voice { "true" } else { "false" });

    match utterance.speaker {
        Speaker::User => form.text("participant_id", context.participant_id.clone()),
        Speaker::Assistant => form.text("bot_name", context.bot_name.clone()),
    }
}

/// Turns a non-2xx response into `VoiceError::Http`.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, VoiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(VoiceError::Http {
        status: status.as_u16(),
        body,
    })
}
