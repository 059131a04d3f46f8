//! Shared types for the Colloquy voice-conversation client.
//!
//! This crate holds the data model exchanged between the pipeline crates and
//! the study backend: who is speaking, what was said, and which conversation
//! it belongs to. It carries no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod conversation;

pub use conversation::{ConversationContext, InitializeConversation, InitializeConversationReply};

/// The party that produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The human participant.
    User,
    /// The remotely hosted chatbot.
    Assistant,
}

impl Speaker {
    /// Returns the string label for this speaker.
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One speaker turn of text.
///
/// Produced when a user transcription is finalized or when the assistant's
/// content part is marked done. Once persisted the local copy is display
/// state only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Who spoke.
    pub speaker: Speaker,
    /// The finalized text of the turn.
    pub text: String,
    /// Whether the text came from the voice pipeline (as opposed to a typed
    /// or backend-provided message).
    pub is_voice: bool,
    /// When the utterance was finalized locally.
    pub spoken_at: DateTime<Utc>,
}

impl Utterance {
    /// Creates a voice utterance stamped with the current time.
    pub fn voice(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            is_voice: true,
            spoken_at: Utc::now(),
        }
    }

    /// Creates a non-voice utterance, such as the backend greeting.
    pub fn text(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            is_voice: false,
            spoken_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_labels() {
        assert_eq!(Speaker::User.label(), "user");
        assert_eq!(Speaker::Assistant.to_string(), "assistant");
    }

    #[test]
    fn speaker_serializes_snake_case() {
        let json = serde_json::to_value(Speaker::Assistant).unwrap();
        assert_eq!(json, "assistant");
    }

    #[test]
    fn voice_and_text_constructors_set_flag() {
        assert!(Utterance::voice(Speaker::User, "hi").is_voice);
        assert!(!Utterance::text(Speaker::Assistant, "welcome").is_voice);
    }
}
