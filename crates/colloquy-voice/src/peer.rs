//! Peer connection management.
//!
//! The host media engine (microphone capture, audio playback, and the peer
//! connection primitive itself) sits behind the [`MediaHost`] seam. The
//! [`PeerManager`] drives the offer/answer sequence over it and owns every
//! resource it acquires until [`PeerManager::stop`] releases them.

use crate::broker::Credential;
use crate::error::VoiceError;
use crate::negotiate::Negotiator;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// An outbound media track produced by microphone capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    pub id: String,
}

/// An inbound media track carrying the remote synthesized speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
}

/// The event side channel opened alongside the audio.
///
/// Frames are delivered in arrival order. The channel ends when the peer
/// connection closes and drops its sender.
#[derive(Debug)]
pub struct DataChannel {
    pub label: String,
    pub frames: mpsc::UnboundedReceiver<String>,
}

pub type RemoteTrackHandler = Box<dyn Fn(RemoteTrack) + Send + Sync>;

/// A live microphone capture.
pub trait AudioCapture: Send {
    fn tracks(&self) -> Vec<LocalTrack>;

    /// Stops every capture track. Must be idempotent.
    fn stop(&mut self);
}

/// A playback sink for remote audio.
pub trait AudioPlayback: Send + Sync {
    fn attach(&self, track: RemoteTrack);

    /// Pauses playback, detaches the source, and removes the sink.
    fn release(&self);
}

/// The peer connection primitive of the host.
#[async_trait]
pub trait PeerConnection: Send {
    fn on_remote_track(&mut self, handler: RemoteTrackHandler);

    fn add_track(&mut self, track: &LocalTrack) -> Result<(), VoiceError>;

    fn open_data_channel(&mut self, label: &str) -> Result<DataChannel, VoiceError>;

    /// Creates the local offer, applies it as the local description, and
    /// returns its SDP.
    async fn create_offer(&mut self) -> Result<String, VoiceError>;

    /// Applies the remote answer SDP.
    async fn apply_answer(&mut self, answer_sdp: &str) -> Result<(), VoiceError>;

    fn close(&mut self);
}

/// Factory for host media resources.
#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Requests microphone access. Fails with `VoiceError::Permission` when
    /// the user denies it.
    async fn capture_microphone(&self) -> Result<Box<dyn AudioCapture>, VoiceError>;

    fn create_playback(&self) -> Result<Arc<dyn AudioPlayback>, VoiceError>;

    fn create_peer(&self) -> Result<Box<dyn PeerConnection>, VoiceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Idle,
    Negotiating,
    Connected,
    Closed,
}

pub struct PeerManager {
    host: Arc<dyn MediaHost>,
    negotiator: Negotiator,
    channel_label: String,
    state: PeerState,
    capture: Option<Box<dyn AudioCapture>>,
    playback: Option<Arc<dyn AudioPlayback>>,
    peer: Option<Box<dyn PeerConnection>>,
}

impl std::fmt::Debug for PeerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerManager")
            .field("state", &self.state)
            .field("channel_label", &self.channel_label)
            .field("has_capture", &self.capture.is_some())
            .field("has_playback", &self.playback.is_some())
            .field("has_peer", &self.peer.is_some())
            .finish()
    }
}

impl PeerManager {
    pub fn new(
        host: Arc<dyn MediaHost>,
        negotiator: Negotiator,
        channel_label: impl Into<String>,
    ) -> Self {
        Self {
            host,
            negotiator,
            channel_label: channel_label.into(),
            state: PeerState::Idle,
            capture: None,
            playback: None,
            peer: None,
        }
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == PeerState::Connected
    }

    /// True while any media resource is still held.
    pub fn holds_resources(&self) -> bool {
        self.capture.is_some() || self.playback.is_some() || self.peer.is_some()
    }

    /// Opens the transport and returns the event data channel.
    ///
    /// On failure every resource acquired so far is released before the
    /// error is returned. If the returned future is dropped mid-way the
    /// acquired resources stay owned by `self` and [`stop`](Self::stop)
    /// releases them.
    pub async fn start(&mut self, credential: &Credential) -> Result<DataChannel, VoiceError> {
        if matches!(self.state, PeerState::Negotiating | PeerState::Connected) {
            return Err(VoiceError::AlreadyActive);
        }
        self.state = PeerState::Negotiating;

        match self.negotiate(credential).await {
            Ok(channel) => {
                self.state = PeerState::Connected;
                info!(label = %channel.label, "peer connection established");
                Ok(channel)
            }
            Err(e) => {
                warn!(error = %e, "peer connection setup failed, releasing resources");
                self.stop();
                Err(e)
            }
        }
    }

    async fn negotiate(&mut self, credential: &Credential) -> Result<DataChannel, VoiceError> {
        let capture = self.host.capture_microphone().await?;
        let tracks = capture.tracks();
        self.capture = Some(capture);

        let playback = self.host.create_playback()?;
        self.playback = Some(Arc::clone(&playback));

        let peer = self.peer.insert(self.host.create_peer()?);
        peer.on_remote_track(Box::new(move |track| {
            debug!(track = %track.id, "remote audio track received");
            playback.attach(track);
        }));

        for track in &tracks {
            peer.add_track(track)?;
        }
        if tracks.is_empty() {
            warn!("microphone capture produced no tracks");
        }

        let channel = peer.open_data_channel(&self.channel_label)?;

        let offer = peer.create_offer().await?;
        let answer = self.negotiator.exchange(&offer, credential).await?;
        peer.apply_answer(&answer).await?;

        Ok(channel)
    }

    /// Closes the connection and releases the microphone and playback sink.
    ///
    /// Safe at any state and idempotent.
    pub fn stop(&mut self) {
        let had_resources = self.holds_resources();

        if let Some(mut peer) = self.peer.take() {
            peer.close();
        }
        if let Some(mut capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(playback) = self.playback.take() {
            playback.release();
        }

        if self.state != PeerState::Idle || had_resources {
            info!("peer connection stopped");
        }
        self.state = PeerState::Closed;
    }
}

impl Drop for PeerManager {
    fn drop(&mut self) {
        if self.holds_resources() {
            self.stop();
        }
    }
}
