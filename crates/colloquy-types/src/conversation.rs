//! Conversation identity and the backend's initialization exchange.

use serde::{Deserialize, Serialize};

/// The identifiers that tie every utterance of one browser session together.
///
/// Built once before the session starts and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    /// Opaque conversation identifier.
    pub conversation_id: String,
    /// Bot the participant is talking to. Sent with assistant turns.
    pub bot_name: String,
    /// Participant identifier. Sent with user turns.
    pub participant_id: String,
    /// Study the conversation belongs to, if any.
    #[serde(default)]
    pub study_name: Option<String>,
    /// Experimental group of the participant, if any.
    #[serde(default)]
    pub user_group: Option<String>,
    /// Survey that embedded the conversation, if any.
    #[serde(default)]
    pub survey_id: Option<String>,
    /// Free-form survey metadata (the embedding page URL in practice).
    #[serde(default)]
    pub survey_meta_data: Option<String>,
}

impl ConversationContext {
    /// Creates a context for the given bot and participant.
    ///
    /// When `conversation_id` is `None` a fresh UUID v4 is assigned.
    pub fn new(
        bot_name: impl Into<String>,
        participant_id: impl Into<String>,
        conversation_id: Option<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            bot_name: bot_name.into(),
            participant_id: participant_id.into(),
            study_name: None,
            user_group: None,
            survey_id: None,
            survey_meta_data: None,
        }
    }

    /// Builds the `initialize_conversation` request body for this context.
    pub fn initialize_request(&self) -> InitializeConversation {
        InitializeConversation {
            bot_name: self.bot_name.clone(),
            conversation_id: self.conversation_id.clone(),
            participant_id: self.participant_id.clone(),
            study_name: self.study_name.clone(),
            user_group: self.user_group.clone(),
            survey_id: self.survey_id.clone(),
            survey_meta_data: self.survey_meta_data.clone(),
        }
    }
}

/// Body of `POST /initialize_conversation/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeConversation {
    pub bot_name: String,
    pub conversation_id: String,
    pub participant_id: String,
    pub study_name: Option<String>,
    pub user_group: Option<String>,
    pub survey_id: Option<String>,
    pub survey_meta_data: Option<String>,
}

/// Reply of `POST /initialize_conversation/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeConversationReply {
    /// Greeting the bot opens the conversation with, if configured.
    #[serde(default)]
    pub initial_utterance: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_conversation_id_is_generated() {
        let ctx = ConversationContext::new("coach", "p-1", None);
        assert!(uuid::Uuid::parse_str(&ctx.conversation_id).is_ok());
    }

    #[test]
    fn blank_conversation_id_is_replaced() {
        let ctx = ConversationContext::new("coach", "p-1", Some("  ".to_string()));
        assert_ne!(ctx.conversation_id.trim(), "");
    }

    #[test]
    fn explicit_conversation_id_is_kept() {
        let ctx = ConversationContext::new("coach", "p-1", Some("conv-9".to_string()));
        assert_eq!(ctx.conversation_id, "conv-9");
    }

    #[test]
    fn initialize_request_carries_study_fields() {
        let mut ctx = ConversationContext::new("coach", "p-1", Some("conv-9".to_string()));
        ctx.study_name = Some("pilot".to_string());
        ctx.survey_meta_data = Some("https://survey.example/?a=1".to_string());

        let value = serde_json::to_value(ctx.initialize_request()).unwrap();
        assert_eq!(value["bot_name"], "coach");
        assert_eq!(value["conversation_id"], "conv-9");
        assert_eq!(value["participant_id"], "p-1");
        assert_eq!(value["study_name"], "pilot");
        assert!(value["user_group"].is_null());
        assert_eq!(value["survey_meta_data"], "https://survey.example/?a=1");
    }

    #[test]
    fn reply_without_greeting_parses() {
        let reply: InitializeConversationReply = serde_json::from_str("{}").unwrap();
        assert_eq!(reply.initial_utterance, None);
    }
}
