//! The event channel reader loop.

use crate::events::classify;
use crate::peer::DataChannel;
use crate::persist::PersistQueue;
use crate::transcript::{Transcript, TranscriptView};
use colloquy_types::Utterance;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Classifies one frame and folds it into `transcript`.
///
/// Malformed frames are logged and skipped. Returns the utterance the frame
/// finalized, if any.
pub fn handle_frame(transcript: &mut Transcript, frame: &str) -> Option<Utterance> {
    match classify(frame) {
        Ok(event) => {
            debug!(?event, "data channel event");
            transcript.apply(event)
        }
        Err(e) => {
            warn!(error = %e, frame_len = frame.len(), "skipping malformed data channel frame");
            None
        }
    }
}

/// Drains `channel` until it closes or the stop generation moves past
/// `generation`, persisting every finalized utterance exactly once and
/// publishing a snapshot after each frame. Frames already queued when the
/// stop arrives are still handled. Hands the transcript back when done.
pub(crate) async fn run(
    mut channel: DataChannel,
    mut transcript: Transcript,
    queue: PersistQueue,
    view: Arc<watch::Sender<TranscriptView>>,
    mut stop: watch::Receiver<u64>,
    generation: u64,
) -> Transcript {
    info!(label = %channel.label, "event reader started");

    loop {
        let frame = tokio::select! {
            biased;
            _ = stop.wait_for(|current| *current != generation) => break,
            frame = channel.frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        process(&mut transcript, &queue, &view, &frame);
    }

    let mut drained = 0usize;
    while let Ok(frame) = channel.frames.try_recv() {
        process(&mut transcript, &queue, &view, &frame);
        drained += 1;
    }

    info!(label = %channel.label, drained, "event reader stopped");
    transcript
}

fn process(
    transcript: &mut Transcript,
    queue: &PersistQueue,
    view: &watch::Sender<TranscriptView>,
    frame: &str,
) {
    if let Some(utterance) = handle_frame(transcript, frame) {
        info!(speaker = %utterance.speaker, chars = utterance.text.len(), "utterance finalized");
        queue.enqueue(utterance);
    }
    view.send_replace(transcript.view());
}
