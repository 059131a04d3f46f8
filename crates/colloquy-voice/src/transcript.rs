//! The transcript reconciler.
//!
//! [`Transcript::apply`] is the single reducer for data-channel events. It
//! runs synchronously per event, so its transitions are serialized by
//! construction. The user track goes straight from idle to finalized; the
//! assistant track accumulates partial fragments until the done marker.
//!
//! Only one assistant turn is tracked at a time. A partial tagged with a
//! different `response_id` than the buffered one clears the stale buffer
//! before accumulating.

use crate::events::RealtimeEvent;
use colloquy_types::{Speaker, Utterance};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct AssistantBuffer {
    response_id: Option<String>,
    text: String,
}

impl AssistantBuffer {
    fn belongs_to(&self, response_id: Option<&str>) -> bool {
        match (self.response_id.as_deref(), response_id) {
            (Some(ours), Some(theirs)) => ours == theirs,
            _ => true,
        }
    }
}

/// Display snapshot of a transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranscriptView {
    pub utterances: Vec<Utterance>,
    /// True after a user turn until the assistant's reply is finalized.
    pub assistant_pending: bool,
    /// Text accumulated so far for the in-flight assistant turn.
    pub partial: Option<String>,
}

#[derive(Debug, Default)]
pub struct Transcript {
    utterances: Vec<Utterance>,
    buffer: Option<AssistantBuffer>,
    assistant_pending: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a transcript from a published snapshot. The in-flight
    /// assistant buffer is not carried over.
    pub fn from_view(view: TranscriptView) -> Self {
        Self {
            utterances: view.utterances,
            buffer: None,
            assistant_pending: view.assistant_pending,
        }
    }

    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    pub fn is_accumulating(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn assistant_pending(&self) -> bool {
        self.assistant_pending
    }

    /// Appends the backend's opening line as an assistant entry.
    ///
    /// The greeting is display-only and is not handed out for persistence.
    pub fn seed_greeting(&mut self, text: impl Into<String>) {
        self.utterances
            .push(Utterance::text(Speaker::Assistant, text));
    }

    /// Applies one event. Returns the utterance finalized by it, if any; the
    /// caller persists exactly what is returned here.
    pub fn apply(&mut self, event: RealtimeEvent) -> Option<Utterance> {
        match event {
            RealtimeEvent::UserTranscriptFinal { text } => {
                self.assistant_pending = true;
                Some(self.finalize(Speaker::User, text))
            }
            RealtimeEvent::AssistantPartial { response_id, text } => {
                self.accumulate(response_id, &text);
                None
            }
            RealtimeEvent::AssistantPartDone { response_id, text } => {
                let buffered = match self.buffer.take() {
                    Some(buffer) if buffer.belongs_to(response_id.as_deref()) => Some(buffer.text),
                    Some(stale) => {
                        warn!(
                            buffered = ?stale.response_id,
                            done = ?response_id,
                            "done marker for a different response, dropping buffered text"
                        );
                        None
                    }
                    None => None,
                };
                self.assistant_pending = false;

                match text.or_else(|| buffered.filter(|b| !b.is_empty())) {
                    Some(text) => Some(self.finalize(Speaker::Assistant, text)),
                    None => {
                        warn!(response_id = ?response_id, "assistant turn finished without text");
                        None
                    }
                }
            }
            RealtimeEvent::Ignored { kind } => {
                debug!(%kind, "ignoring event");
                None
            }
        }
    }

    /// Clears an in-flight assistant buffer without finalizing it.
    pub fn clear_partial(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            debug!(chars = buffer.text.len(), "cleared assistant buffer");
        }
    }

    pub fn view(&self) -> TranscriptView {
        TranscriptView {
            utterances: self.utterances.clone(),
            assistant_pending: self.assistant_pending,
            partial: self.buffer.as_ref().map(|b| b.text.clone()),
        }
    }

    fn accumulate(&mut self, response_id: Option<String>, fragment: &str) {
        if let Some(buffer) = &self.buffer {
            if !buffer.belongs_to(response_id.as_deref()) {
                warn!(
                    buffered = ?buffer.response_id,
                    incoming = ?response_id,
                    "new assistant turn before the previous one finished, clearing buffer"
                );
                self.buffer = None;
            }
        }

        let buffer = self.buffer.get_or_insert_with(|| AssistantBuffer {
            response_id: response_id.clone(),
            text: String::new(),
        });
        if buffer.response_id.is_none() {
            buffer.response_id = response_id;
        }
        buffer.text.push_str(fragment);
    }

    fn finalize(&mut self, speaker: Speaker, text: String) -> Utterance {
        let utterance = Utterance::voice(speaker, text);
        self.utterances.push(utterance.clone());
        utterance
    }
}
