#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use p2p_session::config::{AnswerOptions, MediaConstraints, OfferOptions, SessionConfig};
use p2p_session::error::{CaptureError, EngineError};
use p2p_session::media::{CapturedStream, LocalTrack, MediaCapture, Track, TrackKind};
use p2p_session::peer::{
    ConnectionEngine, EngineEventSink, EngineFactory, IceCandidate, SdpType, SessionDescription,
};
use p2p_session::{Session, SessionEvent, SignalPayload};
use tokio::sync::mpsc::UnboundedReceiver;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateOffer { ice_restart: bool },
    CreateAnswer,
    SetLocal(SdpType),
    SetRemote(SdpType),
    AddTrack { kind: TrackKind, sender: String },
    RemoveTrack(String),
    ReplaceTrack { sender: String, kind: Option<TrackKind> },
    AddIceCandidate(String),
    Close,
}

/// What the fake engine saw, shared with the test after the engine moved
/// into its session
#[derive(Default)]
pub struct EngineLog {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<&'static str>>,
    remote_set: AtomicBool,
    next_sender: AtomicUsize,
    pub sink: Mutex<Option<EngineEventSink>>,
}

impl EngineLog {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    /// Makes the named operation fail from now on
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: &'static str) -> Result<(), EngineError> {
        if self.failing.lock().unwrap().contains(op) {
            Err(EngineError::Rejected(format!("{op} rejected by test")))
        } else {
            Ok(())
        }
    }
}

/// Engine that accepts everything and records each call
pub struct FakeEngine {
    log: Arc<EngineLog>,
}

impl FakeEngine {
    pub fn new() -> (Self, Arc<EngineLog>) {
        let log = Arc::new(EngineLog::default());
        (Self { log: log.clone() }, log)
    }
}

#[async_trait]
impl ConnectionEngine for FakeEngine {
    type Sender = String;

    async fn create_offer(&self, options: &OfferOptions) -> Result<SessionDescription, EngineError> {
        self.log.record(Call::CreateOffer {
            ice_restart: options.ice_restart,
        });
        self.log.check("create_offer")?;
        Ok(SessionDescription::offer(format!(
            "v=0\r\na=ice-restart:{}\r\n",
            options.ice_restart
        )))
    }

    async fn create_answer(&self, _options: &AnswerOptions) -> Result<SessionDescription, EngineError> {
        self.log.record(Call::CreateAnswer);
        self.log.check("create_answer")?;
        Ok(SessionDescription::answer("v=0\r\n"))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), EngineError> {
        self.log.record(Call::SetLocal(description.sdp_type));
        self.log.check("set_local_description")
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), EngineError> {
        self.log.record(Call::SetRemote(description.sdp_type));
        self.log.check("set_remote_description")?;
        self.log.remote_set.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.log.remote_set.load(Ordering::SeqCst)
    }

    async fn add_track(&self, track: Arc<LocalTrack>, _stream_id: &str) -> Result<String, EngineError> {
        self.log.check("add_track")?;
        let sender = format!("sender-{}", self.log.next_sender.fetch_add(1, Ordering::SeqCst));
        self.log.record(Call::AddTrack {
            kind: track.kind(),
            sender: sender.clone(),
        });
        Ok(sender)
    }

    async fn remove_track(&self, sender: &String) -> Result<(), EngineError> {
        self.log.record(Call::RemoveTrack(sender.clone()));
        self.log.check("remove_track")
    }

    async fn replace_track(
        &self,
        sender: &String,
        track: Option<Arc<LocalTrack>>,
    ) -> Result<(), EngineError> {
        self.log.record(Call::ReplaceTrack {
            sender: sender.clone(),
            kind: track.map(|t| t.kind()),
        });
        self.log.check("replace_track")
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        self.log.record(Call::AddIceCandidate(candidate.candidate));
        self.log.check("add_ice_candidate")
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.log.record(Call::Close);
        Ok(())
    }
}

pub type EngineLogs = Arc<Mutex<Vec<Arc<EngineLog>>>>;

/// Hands out one [`FakeEngine`] per session and keeps the logs around
pub struct FakeEngineFactory {
    logs: EngineLogs,
}

impl FakeEngineFactory {
    pub fn new() -> (Self, EngineLogs) {
        let logs = EngineLogs::default();
        (Self { logs: logs.clone() }, logs)
    }
}

#[async_trait]
impl EngineFactory for FakeEngineFactory {
    type Engine = FakeEngine;

    async fn create(&self, _config: &SessionConfig, events: EngineEventSink) -> Result<FakeEngine, EngineError> {
        let (engine, log) = FakeEngine::new();
        *log.sink.lock().unwrap() = Some(events);
        self.logs.lock().unwrap().push(log);
        Ok(engine)
    }
}

/// Capture layer resolving with plain tracks for whatever is asked, or
/// refusing every request
#[derive(Default)]
pub struct ScriptedCapture {
    deny: AtomicBool,
    requests: AtomicUsize,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denying() -> Self {
        let capture = Self::default();
        capture.deny.store(true, Ordering::SeqCst);
        capture
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaCapture for ScriptedCapture {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<CapturedStream, CaptureError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.deny.load(Ordering::SeqCst) {
            return Err(CaptureError::PermissionDenied("camera blocked".into()));
        }

        let stream_id = format!("capture-{}", self.requests());
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(Arc::new(LocalTrack::new(TrackKind::Audio, stream_id.clone())));
        }
        if constraints.video.is_requested() {
            tracks.push(Arc::new(LocalTrack::new(TrackKind::Video, stream_id.clone())));
        }
        Ok(CapturedStream::new(stream_id, tracks))
    }
}

pub type FakeSession = Session<FakeEngine, ScriptedCapture>;

pub fn session(config: SessionConfig) -> (Arc<FakeSession>, Arc<EngineLog>) {
    session_with_capture(config, ScriptedCapture::new())
}

pub fn session_with_capture(
    config: SessionConfig,
    capture: ScriptedCapture,
) -> (Arc<FakeSession>, Arc<EngineLog>) {
    init_logger();
    let (engine, log) = FakeEngine::new();
    (Arc::new(Session::new(config, engine, Arc::new(capture))), log)
}

pub fn initiator() -> SessionConfig {
    SessionConfig {
        initiator: true,
        ..Default::default()
    }
}

pub fn responder() -> SessionConfig {
    SessionConfig::default()
}

/// Everything emitted so far
pub fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn descriptions(events: &[SessionEvent], sdp_type: SdpType) -> Vec<SessionDescription> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Signal(SignalPayload::Description(d)) if d.sdp_type == sdp_type => Some(d.clone()),
            _ => None,
        })
        .collect()
}

pub fn negotiation_signals(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Signal(SignalPayload::Description(_))))
        .count()
}

pub fn errors(events: &[SessionEvent]) -> Vec<p2p_session::SessionFailure> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Error(f) => Some(f.clone()),
            _ => None,
        })
        .collect()
}
