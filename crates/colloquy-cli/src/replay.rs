//! Offline replay of a recorded data channel.
//!
//! Each non-blank line of the input is one raw frame, exactly as it arrived
//! on the event channel. Frames go through the same reducer and persistence
//! queue a live session uses.

use async_trait::async_trait;
use colloquy_types::{ConversationContext, Utterance};
use colloquy_voice::{
    handle_frame, PersistQueue, PersistStats, Transcript, TranscriptView, UtteranceSink,
    VoiceError,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub conversation_id: String,
    pub frames: usize,
    pub transcript: TranscriptView,
    pub persisted: PersistStats,
}

/// Sink for `--dry-run`: logs each utterance instead of uploading it.
pub struct LogSink;

#[async_trait]
impl UtteranceSink for LogSink {
    async fn persist(
        &self,
        utterance: &Utterance,
        context: &ConversationContext,
    ) -> Result<(), VoiceError> {
        info!(
            conversation_id = %context.conversation_id,
            speaker = %utterance.speaker,
            text = %utterance.text,
            "dry run, not uploading"
        );
        Ok(())
    }
}

pub async fn replay(
    input: &str,
    context: ConversationContext,
    greeting: Option<String>,
    sink: Arc<dyn UtteranceSink>,
) -> ReplayReport {
    let conversation_id = context.conversation_id.clone();
    let (queue, worker) = PersistQueue::spawn(sink, context);

    let mut transcript = Transcript::new();
    if let Some(greeting) = greeting {
        transcript.seed_greeting(greeting);
    }

    let mut frames = 0;
    for line in input.lines().map(str::trim).filter(|l| !l.is_empty()) {
        frames += 1;
        if let Some(utterance) = handle_frame(&mut transcript, line) {
            queue.enqueue(utterance);
        }
    }

    drop(queue);
    let persisted = worker.close().await;
    info!(frames, utterances = transcript.utterances().len(), "replay finished");

    ReplayReport {
        conversation_id,
        frames,
        transcript: transcript.view(),
        persisted,
    }
}
