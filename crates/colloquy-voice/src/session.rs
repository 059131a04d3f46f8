//! One voice conversation: credential, transport, reader, and persistence
//! owned together behind an explicit `start`/`stop` lifecycle.

use crate::backend::BackendClient;
use crate::broker::SessionBroker;
use crate::config::VoiceConfig;
use crate::error::VoiceError;
use crate::negotiate::Negotiator;
use crate::peer::{MediaHost, PeerManager, PeerState};
use crate::persist::{PersistQueue, PersistStats, PersistWorker, UtteranceSink};
use crate::reader;
use crate::transcript::{Transcript, TranscriptView};
use colloquy_types::ConversationContext;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Cancels a `start` in progress.
///
/// Obtained from [`VoiceSession::stop_handle`] so a caller can interrupt
/// setup while `start` holds the mutable borrow. Every `start` triggered
/// before the call is cancelled, even one not yet polled. On a streaming
/// session it halts the reader and the session stops reporting itself
/// active; the media is released by the next [`VoiceSession::stop`] or
/// [`VoiceSession::start`].
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<u64>>,
}

impl StopHandle {
    pub fn stop(&self) {
        bump(&self.tx);
    }
}

fn bump(generation: &watch::Sender<u64>) {
    generation.send_modify(|current| *current = current.wrapping_add(1));
}

pub struct VoiceSession {
    context: ConversationContext,
    backend: BackendClient,
    broker: SessionBroker,
    peer: PeerManager,
    sink: Arc<dyn UtteranceSink>,
    transcript: Option<Transcript>,
    view: Arc<watch::Sender<TranscriptView>>,
    stop: Arc<watch::Sender<u64>>,
    reader: Option<JoinHandle<Transcript>>,
    reader_generation: u64,
    persist: Option<(PersistQueue, PersistWorker)>,
}

impl std::fmt::Debug for VoiceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSession")
            .field("conversation_id", &self.context.conversation_id)
            .field("peer", &self.peer)
            .field("reading", &self.reader.is_some())
            .finish()
    }
}

impl VoiceSession {
    pub fn new(
        config: VoiceConfig,
        context: ConversationContext,
        host: Arc<dyn MediaHost>,
    ) -> Result<Self, VoiceError> {
        let backend = BackendClient::new(config)?;
        let sink: Arc<dyn UtteranceSink> = Arc::new(backend.clone());
        Ok(Self::with_sink(backend, context, host, sink))
    }

    /// Builds a session that hands finalized utterances to `sink` instead of
    /// the backend's upload endpoint.
    pub fn with_sink(
        backend: BackendClient,
        context: ConversationContext,
        host: Arc<dyn MediaHost>,
        sink: Arc<dyn UtteranceSink>,
    ) -> Self {
        let config = backend.config();
        let negotiator = Negotiator::new(backend.http().clone(), config);
        let peer = PeerManager::new(host, negotiator, config.data_channel_label.clone());
        let broker = SessionBroker::new(backend.clone());
        let (view, _) = watch::channel(TranscriptView::default());
        let (stop, _) = watch::channel(0u64);

        Self {
            context,
            backend,
            broker,
            peer,
            sink,
            transcript: Some(Transcript::new()),
            view: Arc::new(view),
            stop: Arc::new(stop),
            reader: None,
            reader_generation: 0,
            persist: None,
        }
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<TranscriptView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> TranscriptView {
        self.view.borrow().clone()
    }

    pub fn peer_state(&self) -> PeerState {
        self.peer.state()
    }

    /// True while events are being read. A reader halted by a
    /// [`StopHandle`] no longer counts.
    pub fn is_active(&self) -> bool {
        self.reader.is_some() && *self.stop.borrow() == self.reader_generation
    }

    /// True while the microphone, playback sink, or peer is still held.
    pub fn holds_media(&self) -> bool {
        self.peer.holds_resources()
    }

    pub fn persist_stats(&self) -> PersistStats {
        self.persist
            .as_ref()
            .map(|(queue, _)| queue.stats())
            .unwrap_or_default()
    }

    /// Registers the conversation with the backend and seeds its greeting.
    pub async fn initialize(&mut self) -> Result<Option<String>, VoiceError> {
        let reply = self.backend.initialize_conversation(&self.context).await?;
        info!(
            conversation_id = %self.context.conversation_id,
            greeting = reply.initial_utterance.is_some(),
            "conversation initialized"
        );

        if let Some(greeting) = &reply.initial_utterance {
            match self.transcript.as_mut() {
                Some(transcript) => {
                    transcript.seed_greeting(greeting.clone());
                    self.view.send_replace(transcript.view());
                }
                None => warn!("session already streaming, greeting not shown"),
            }
        }
        Ok(reply.initial_utterance)
    }

    /// Fetches a credential, opens the transport, and starts reading events.
    ///
    /// Fails with `AlreadyActive` while a previous start is streaming. Any
    /// failure, or a [`StopHandle::stop`] issued after this call, releases
    /// everything acquired so far and yields `Cancelled`.
    pub fn start(&mut self) -> impl Future<Output = Result<(), VoiceError>> + '_ {
        let generation = *self.stop.borrow();
        async move {
            if self.is_active() {
                return Err(VoiceError::AlreadyActive);
            }
            // A reader halted through a StopHandle still holds the media.
            if self.reader.is_some() || self.peer.holds_resources() {
                self.release().await;
            }

            let mut stop_rx = self.stop.subscribe();
            let broker = &self.broker;
            let peer = &mut self.peer;
            let connect = async {
                let credential = broker.obtain_credential().await?;
                peer.start(&credential).await
            };

            let outcome = tokio::select! {
                biased;
                _ = stop_rx.wait_for(|current| *current != generation) => Err(VoiceError::Cancelled),
                result = connect => result,
            };

            let channel = match outcome {
                Ok(channel) => channel,
                Err(e) => {
                    warn!(error = %e, "voice session failed to start");
                    self.peer.stop();
                    return Err(e);
                }
            };

            let queue = match &self.persist {
                Some((queue, _)) => queue.clone(),
                None => {
                    let (queue, worker) =
                        PersistQueue::spawn(Arc::clone(&self.sink), self.context.clone());
                    self.persist = Some((queue.clone(), worker));
                    queue
                }
            };

            let transcript = self.transcript.take().unwrap_or_default();
            self.reader = Some(tokio::spawn(reader::run(
                channel,
                transcript,
                queue,
                Arc::clone(&self.view),
                self.stop.subscribe(),
                generation,
            )));
            self.reader_generation = generation;

            info!(conversation_id = %self.context.conversation_id, "voice session started");
            Ok(())
        }
    }

    /// Tears down the transport and the reader. Safe at any state.
    ///
    /// Frames that arrived before the call are still reconciled and
    /// persisted.
    pub async fn stop(&mut self) {
        bump(&self.stop);
        self.release().await;
    }

    async fn release(&mut self) {
        self.peer.stop();

        if let Some(reader) = self.reader.take() {
            match reader.await {
                Ok(transcript) => self.transcript = Some(transcript),
                Err(e) => {
                    warn!(error = %e, "event reader ended abnormally, restoring last snapshot");
                    let snapshot = self.view.borrow().clone();
                    self.transcript = Some(Transcript::from_view(snapshot));
                }
            }
            info!(conversation_id = %self.context.conversation_id, "voice session stopped");
        }
    }

    /// Stops the session and waits for queued uploads to be attempted.
    pub async fn close(mut self) -> PersistStats {
        self.stop().await;
        match self.persist.take() {
            Some((queue, worker)) => {
                // The worker finishes once the last sender is gone.
                drop(queue);
                worker.close().await
            }
            None => PersistStats::default(),
        }
    }
}
