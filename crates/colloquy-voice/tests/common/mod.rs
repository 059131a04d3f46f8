#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use colloquy_types::ConversationContext;
use colloquy_voice::{
    AudioCapture, AudioPlayback, DataChannel, LocalTrack, MediaHost, PeerConnection,
    RemoteTrack, RemoteTrackHandler, VoiceConfig, VoiceError,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const EPHEMERAL_KEY: &str = "ek_test_123";
pub const ANSWER_SDP: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=answer\r\n";
pub const OFFER_SDP: &str = "v=0\r\no=- 3 4 IN IP4 127.0.0.1\r\ns=offer\r\n";

// ---------------------------------------------------------------------------
// Mock backend + realtime endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecordedOffer {
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub model: Option<String>,
    pub body: String,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    pub session_status: Option<StatusCode>,
    pub greeting: Option<String>,
    pub fail_uploads: bool,
    pub answer_status: Option<StatusCode>,
    pub answer_delay: Option<Duration>,
    pub uploads: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub inits: Arc<Mutex<Vec<Value>>>,
    pub offers: Arc<Mutex<Vec<RecordedOffer>>>,
    pub session_requests: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn uploads(&self) -> Vec<HashMap<String, String>> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn offers(&self) -> Vec<RecordedOffer> {
        self.offers.lock().unwrap().clone()
    }
}

async fn session(State(mock): State<MockBackend>) -> (StatusCode, Json<Value>) {
    mock.session_requests.fetch_add(1, Ordering::SeqCst);
    match mock.session_status {
        Some(status) => (status, Json(json!({"error": "Failed to get session"}))),
        None => (
            StatusCode::OK,
            Json(json!({
                "id": "sess_1",
                "object": "realtime.session",
                "client_secret": { "value": EPHEMERAL_KEY, "expires_at": 4_102_444_800i64 }
            })),
        ),
    }
}

async fn initialize(State(mock): State<MockBackend>, Json(body): Json<Value>) -> Json<Value> {
    mock.inits.lock().unwrap().push(body);
    match &mock.greeting {
        Some(greeting) => Json(json!({ "initial_utterance": greeting })),
        None => Json(json!({})),
    }
}

async fn upload(State(mock): State<MockBackend>, mut multipart: Multipart) -> (StatusCode, Json<Value>) {
    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let value = field.text().await.unwrap();
        fields.insert(name, value);
    }
    mock.uploads.lock().unwrap().push(fields);

    if mock.fail_uploads {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "database unavailable"})),
        )
    } else {
        (StatusCode::OK, Json(json!({"status": "saved"})))
    }
}

async fn realtime(
    State(mock): State<MockBackend>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    mock.offers.lock().unwrap().push(RecordedOffer {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        content_type: headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        model: query.get("model").cloned(),
        body,
    });

    if let Some(delay) = mock.answer_delay {
        tokio::time::sleep(delay).await;
    }

    match mock.answer_status {
        Some(status) => (status, "invalid ephemeral key".to_string()),
        None => (StatusCode::CREATED, ANSWER_SDP.to_string()),
    }
}

/// Serves the mock on an ephemeral port and returns a config pointing at it.
pub async fn serve(mock: MockBackend) -> VoiceConfig {
    let app = Router::new()
        .route("/api/session/", get(session))
        .route("/api/initialize_conversation/", post(initialize))
        .route("/api/upload_voice_utterance/", post(upload))
        .route("/v1/realtime", post(realtime))
        .with_state(mock);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut config = VoiceConfig::new(format!("http://{}/api", addr));
    config.realtime_url = format!("http://{}/v1/realtime", addr);
    config
}

pub fn context() -> ConversationContext {
    let mut ctx = ConversationContext::new("coach-voice", "participant-7", Some("conv-42".to_string()));
    ctx.study_name = Some("pilot".to_string());
    ctx
}

// ---------------------------------------------------------------------------
// Fake media host
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct HostProbe {
    pub mic_requests: AtomicUsize,
    pub mic_stopped: AtomicUsize,
    pub playback_released: AtomicUsize,
    pub peers_closed: AtomicUsize,
    pub remote_attached: AtomicUsize,
    pub tracks_added: AtomicUsize,
    pub answers: Mutex<Vec<String>>,
    frames: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

pub fn load(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

impl HostProbe {
    /// Delivers a frame on the open data channel.
    pub fn send_frame(&self, frame: &str) {
        let guard = self.frames.lock().unwrap();
        let tx = guard.as_ref().expect("data channel is not open");
        tx.send(frame.to_string()).unwrap();
    }
}

#[derive(Clone, Default)]
pub struct FakeHost {
    pub probe: Arc<HostProbe>,
    pub deny_microphone: bool,
    pub reject_answer: bool,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }
}

struct FakeCapture {
    probe: Arc<HostProbe>,
    stopped: bool,
}

impl AudioCapture for FakeCapture {
    fn tracks(&self) -> Vec<LocalTrack> {
        vec![LocalTrack {
            id: "mic-0".to_string(),
        }]
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.probe.mic_stopped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

struct FakePlayback {
    probe: Arc<HostProbe>,
}

impl AudioPlayback for FakePlayback {
    fn attach(&self, _track: RemoteTrack) {
        self.probe.remote_attached.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.probe.playback_released.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakePeer {
    probe: Arc<HostProbe>,
    reject_answer: bool,
    on_track: Option<RemoteTrackHandler>,
}

#[async_trait]
impl PeerConnection for FakePeer {
    fn on_remote_track(&mut self, handler: RemoteTrackHandler) {
        self.on_track = Some(handler);
    }

    fn add_track(&mut self, _track: &LocalTrack) -> Result<(), VoiceError> {
        self.probe.tracks_added.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn open_data_channel(&mut self, label: &str) -> Result<DataChannel, VoiceError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.probe.frames.lock().unwrap() = Some(tx);
        Ok(DataChannel {
            label: label.to_string(),
            frames: rx,
        })
    }

    async fn create_offer(&mut self) -> Result<String, VoiceError> {
        Ok(OFFER_SDP.to_string())
    }

    async fn apply_answer(&mut self, answer_sdp: &str) -> Result<(), VoiceError> {
        self.probe.answers.lock().unwrap().push(answer_sdp.to_string());
        if self.reject_answer {
            return Err(VoiceError::Negotiation("remote description rejected".to_string()));
        }
        if let Some(handler) = &self.on_track {
            handler(RemoteTrack {
                id: "remote-audio".to_string(),
                stream_id: "stream-0".to_string(),
            });
        }
        Ok(())
    }

    fn close(&mut self) {
        self.on_track = None;
        self.probe.frames.lock().unwrap().take();
        self.probe.peers_closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaHost for FakeHost {
    async fn capture_microphone(&self) -> Result<Box<dyn AudioCapture>, VoiceError> {
        self.probe.mic_requests.fetch_add(1, Ordering::SeqCst);
        if self.deny_microphone {
            return Err(VoiceError::Permission("NotAllowedError".to_string()));
        }
        Ok(Box::new(FakeCapture {
            probe: Arc::clone(&self.probe),
            stopped: false,
        }))
    }

    fn create_playback(&self) -> Result<Arc<dyn AudioPlayback>, VoiceError> {
        Ok(Arc::new(FakePlayback {
            probe: Arc::clone(&self.probe),
        }))
    }

    fn create_peer(&self) -> Result<Box<dyn PeerConnection>, VoiceError> {
        Ok(Box::new(FakePeer {
            probe: Arc::clone(&self.probe),
            reject_answer: self.reject_answer,
            on_track: None,
        }))
    }
}
