//! Realtime voice-conversation pipeline for Colloquy.
//!
//! A participant talks to a remotely hosted chatbot through a third-party
//! realtime speech service. This crate obtains an ephemeral credential from
//! the study backend, negotiates the peer-to-peer audio session (SDP offer
//! and answer), reads the JSON event side channel, reconciles it into an
//! ordered transcript, and persists every finalized utterance.
//!
//! The host media engine (microphone, playback, peer connection) is
//! supplied by the embedder through [`MediaHost`]; everything above it is
//! implemented here.
//!
//! # Flow
//!
//! [`SessionBroker`] → [`PeerManager`] → [`reader`] ([`classify`] then
//! [`Transcript::apply`]) → [`PersistQueue`], all owned by one
//! [`VoiceSession`].

pub mod backend;
pub mod broker;
pub mod config;
pub mod error;
pub mod events;
pub mod negotiate;
pub mod peer;
pub mod persist;
pub mod reader;
pub mod session;
pub mod transcript;

pub use backend::BackendClient;
pub use broker::{Credential, SessionBroker};
pub use config::{
    VoiceConfig, DEFAULT_DATA_CHANNEL_LABEL, DEFAULT_REALTIME_MODEL, DEFAULT_REALTIME_URL,
};
pub use error::VoiceError;
pub use events::{classify, RealtimeEvent};
pub use negotiate::Negotiator;
pub use peer::{
    AudioCapture, AudioPlayback, DataChannel, LocalTrack, MediaHost, PeerConnection, PeerManager,
    PeerState, RemoteTrack, RemoteTrackHandler,
};
pub use persist::{PersistQueue, PersistStats, PersistWorker, UtteranceSink};
pub use reader::handle_frame;
pub use session::{StopHandle, VoiceSession};
pub use transcript::{Transcript, TranscriptView};
