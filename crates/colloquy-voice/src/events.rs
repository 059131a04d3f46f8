//! Classification of data-channel frames into semantic events.
//!
//! Every frame is a UTF-8 JSON object with a `type` discriminator. Only the
//! fields the transcript needs are read; everything else is ignored so new
//! server fields never break decoding.

use crate::error::VoiceError;
use serde::Deserialize;
use serde_json::Value;

pub const TYPE_TRANSCRIPT: &str = "transcript";
pub const TYPE_INPUT_TRANSCRIPTION_COMPLETED: &str =
    "conversation.item.input_audio_transcription.completed";
pub const TYPE_CONTENT_PART: &str = "response.content_part";
pub const TYPE_CONTENT_PART_DONE: &str = "response.content_part.done";

/// A classified data-channel event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// The user's speech for one turn, recognized in full.
    UserTranscriptFinal { text: String },
    /// A partial fragment of the assistant's in-progress turn.
    AssistantPartial {
        response_id: Option<String>,
        text: String,
    },
    /// The final fragment of the assistant's turn. `text` is `None` when the
    /// marker carries no usable text.
    AssistantPartDone {
        response_id: Option<String>,
        text: Option<String>,
    },
    /// A well-formed frame whose type is not handled.
    Ignored { kind: String },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default, rename = "final")]
    is_final: bool,
    #[serde(default)]
    response_id: Option<String>,
    #[serde(default)]
    part: Option<ContentPart>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentPart {
    #[serde(default)]
    transcript: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl ContentPart {
    fn into_text(self) -> Option<String> {
        self.transcript.or(self.text)
    }
}

/// Decodes one raw frame.
///
/// Unknown discriminators yield [`RealtimeEvent::Ignored`] without looking
/// at the rest of the frame. Frames that are not JSON objects with a string
/// `type`, or known types with mistyped fields, are errors.
pub fn classify(frame: &str) -> Result<RealtimeEvent, VoiceError> {
    let value: Value = serde_json::from_str(frame)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| VoiceError::Parse("frame has no string `type` field".to_string()))?;

    if !is_handled(kind) {
        return Ok(RealtimeEvent::Ignored {
            kind: kind.to_string(),
        });
    }

    let envelope = Envelope::deserialize(&value)?;
    let event = match kind {
        TYPE_TRANSCRIPT if envelope.is_final => RealtimeEvent::UserTranscriptFinal {
            text: envelope.text.or(envelope.transcript).unwrap_or_default(),
        },
        TYPE_INPUT_TRANSCRIPTION_COMPLETED => RealtimeEvent::UserTranscriptFinal {
            text: envelope.transcript.or(envelope.text).unwrap_or_default(),
        },
        TYPE_CONTENT_PART => RealtimeEvent::AssistantPartial {
            response_id: envelope.response_id,
            text: envelope
                .part
                .and_then(ContentPart::into_text)
                .unwrap_or_default(),
        },
        TYPE_CONTENT_PART_DONE => RealtimeEvent::AssistantPartDone {
            response_id: envelope.response_id,
            text: envelope
                .part
                .and_then(ContentPart::into_text)
                .filter(|t| !t.trim().is_empty()),
        },
        _ => RealtimeEvent::Ignored {
            kind: kind.to_string(),
        },
    };

    Ok(event)
}

fn is_handled(kind: &str) -> bool {
    matches!(
        kind,
        TYPE_TRANSCRIPT
            | TYPE_INPUT_TRANSCRIPTION_COMPLETED
            | TYPE_CONTENT_PART
            | TYPE_CONTENT_PART_DONE
    )
}
