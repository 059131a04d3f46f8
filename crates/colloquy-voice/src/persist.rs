//! Fire-and-forget utterance persistence.
//!
//! Finalized utterances are pushed onto an unbounded queue drained by a
//! single worker task. Uploads are never retried: a failure is logged and
//! counted, and the utterance stays in the local transcript regardless.

use crate::backend::BackendClient;
use crate::error::VoiceError;
use async_trait::async_trait;
use colloquy_types::{ConversationContext, Utterance};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Destination for finalized utterances.
#[async_trait]
pub trait UtteranceSink: Send + Sync {
    async fn persist(
        &self,
        utterance: &Utterance,
        context: &ConversationContext,
    ) -> Result<(), VoiceError>;
}

#[async_trait]
impl UtteranceSink for BackendClient {
    async fn persist(
        &self,
        utterance: &Utterance,
        context: &ConversationContext,
    ) -> Result<(), VoiceError> {
        let ack = self.upload_utterance(utterance, context).await?;
        debug!(?ack, "utterance saved");
        Ok(())
    }
}

/// Counters describing the queue's progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistStats {
    pub queued: u64,
    pub delivered: u64,
    pub failed: u64,
}

impl PersistStats {
    /// Utterances accepted but not yet attempted.
    pub fn pending(&self) -> u64 {
        self.queued
            .saturating_sub(self.delivered)
            .saturating_sub(self.failed)
    }
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PersistStats {
        PersistStats {
            queued: self.queued.load(Ordering::SeqCst),
            delivered: self.delivered.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// Handle for enqueueing utterances. Cloning shares the same worker.
#[derive(Debug, Clone)]
pub struct PersistQueue {
    tx: mpsc::UnboundedSender<Utterance>,
    counters: Arc<Counters>,
}

/// Owns the worker task; [`close`](PersistWorker::close) drains it.
#[derive(Debug)]
pub struct PersistWorker {
    handle: JoinHandle<()>,
    counters: Arc<Counters>,
}

impl PersistQueue {
    /// Spawns the worker on the current Tokio runtime.
    pub fn spawn(
        sink: Arc<dyn UtteranceSink>,
        context: ConversationContext,
    ) -> (Self, PersistWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let handle = tokio::spawn(run_worker(rx, sink, context, Arc::clone(&counters)));
        let worker = PersistWorker {
            handle,
            counters: Arc::clone(&counters),
        };
        (Self { tx, counters }, worker)
    }

    /// Queues one utterance. Never blocks and never fails the caller.
    pub fn enqueue(&self, utterance: Utterance) {
        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(utterance).is_err() {
            warn!("persistence worker has stopped, utterance not uploaded");
            self.counters.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn stats(&self) -> PersistStats {
        self.counters.snapshot()
    }
}

impl PersistWorker {
    /// Waits for every queued upload to be attempted and returns the final
    /// counters.
    ///
    /// Completes once all [`PersistQueue`] handles have been dropped.
    pub async fn close(self) -> PersistStats {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "persistence worker ended abnormally");
        }
        self.counters.snapshot()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<Utterance>,
    sink: Arc<dyn UtteranceSink>,
    context: ConversationContext,
    counters: Arc<Counters>,
) {
    while let Some(utterance) = rx.recv().await {
        match sink.persist(&utterance, &context).await {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::SeqCst);
                debug!(speaker = %utterance.speaker, "utterance persisted");
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::SeqCst);
                warn!(
                    speaker = %utterance.speaker,
                    conversation_id = %context.conversation_id,
                    error = %e,
                    "failed to persist utterance"
                );
            }
        }
    }
    info!("persistence queue drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::Speaker;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        seen: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl UtteranceSink for RecordingSink {
        async fn persist(
            &self,
            utterance: &Utterance,
            _context: &ConversationContext,
        ) -> Result<(), VoiceError> {
            self.seen.lock().unwrap().push(utterance.text.clone());
            if self.fail_on == Some(utterance.text.as_str()) {
                return Err(VoiceError::Network("connection reset".to_string()));
            }
            Ok(())
        }
    }

    fn context() -> ConversationContext {
        ConversationContext::new("coach", "p-1", Some("conv-1".to_string()))
    }

    #[tokio::test]
    async fn uploads_in_order_and_counts_failures() {
        let sink = Arc::new(RecordingSink {
            fail_on: Some("two"),
            ..Default::default()
        });
        let (queue, worker) = PersistQueue::spawn(sink.clone(), context());

        for text in ["one", "two", "three"] {
            queue.enqueue(Utterance::voice(Speaker::User, text));
        }
        // Dropping the last sender lets the worker finish.
        drop(queue);
        let stats = worker.close().await;

        assert_eq!(*sink.seen.lock().unwrap(), vec!["one", "two", "three"]);
        assert_eq!(
            stats,
            PersistStats {
                queued: 3,
                delivered: 2,
                failed: 1
            }
        );
        assert_eq!(stats.pending(), 0);
    }

    #[tokio::test]
    async fn enqueue_after_worker_stopped_counts_as_failure() {
        let sink = Arc::new(RecordingSink::default());
        let (queue, worker) = PersistQueue::spawn(sink, context());
        worker.abort();
        worker.close().await;

        queue.enqueue(Utterance::voice(Speaker::Assistant, "lost"));
        let stats = queue.stats();
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending(), 0);
    }
}
