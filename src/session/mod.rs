//! One two-party media session: local capture, negotiation, inbound
//! signaling and the events that report on all of it.

mod factory;
mod negotiation;
mod store;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::error::{Operation, SessionError, SessionResult};
use crate::events::{EventEmitter, EventKind, ListenerId, SessionEvent};
use crate::logger::analyze_candidates;
use crate::media::{request_local_stream, LocalStream, MediaCapture, RemoteStream, TrackKind};
use crate::peer::{ConnectionEngine, EngineEvent, IceCandidate};
use crate::signaling::{Route, SignalPayload, SignalRouter};
use crate::utils::random_id;

pub use factory::{webrtc_factory, SessionFactory};
pub use negotiation::{NegotiationController, NegotiationPhase};
pub use store::TrackStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

pub struct Session<E: ConnectionEngine, C: MediaCapture> {
    id: String,
    role: Role,
    config: SessionConfig,
    engine: Arc<E>,
    capture: Arc<C>,
    events: Arc<EventEmitter>,
    store: TrackStore<E>,
    negotiation: Arc<NegotiationController<E>>,
    router: SignalRouter<E>,
    capture_settled: watch::Sender<bool>,
    initialized: AtomicBool,
    /// Local candidates gathered in the current round
    gathered: Mutex<Vec<IceCandidate>>,
}

impl<E: ConnectionEngine, C: MediaCapture> Session<E, C> {
    /// Builds a session around an engine it owns from now on.
    ///
    /// Nothing is captured until [`initialize`](Self::initialize).
    pub fn new(config: SessionConfig, engine: E, capture: Arc<C>) -> Self {
        let id = random_id();
        let role = if config.initiator {
            Role::Initiator
        } else {
            Role::Responder
        };
        let engine = Arc::new(engine);
        let events = Arc::new(EventEmitter::new());
        let (capture_settled, settled_rx) = watch::channel(false);

        let negotiation = Arc::new(NegotiationController::new(
            engine.clone(),
            events.clone(),
            config.initiator,
            config.offer_options.clone(),
            config.answer_options.clone(),
            settled_rx,
        ));
        let router = SignalRouter::new(engine.clone(), negotiation.clone(), events.clone());
        let store = TrackStore::new(&id, engine.clone(), events.clone());

        log::info!("session {id} created as {role:?}");
        Self {
            id,
            role,
            config,
            engine,
            capture,
            events,
            store,
            negotiation,
            router,
            capture_settled,
            initialized: AtomicBool::new(false),
            gathered: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.negotiation.is_closed()
    }

    pub fn negotiation_phase(&self) -> NegotiationPhase {
        self.negotiation.phase()
    }

    pub async fn local_stream(&self) -> LocalStream {
        self.store.local_stream().await
    }

    pub fn remote_stream(&self) -> RemoteStream {
        self.store.remote_stream()
    }

    /// Sender currently registered for `kind`
    pub async fn sender(&self, kind: TrackKind) -> Option<E::Sender> {
        self.store.sender(kind).await
    }

    pub async fn registered_kinds(&self) -> Vec<TrackKind> {
        self.store.registered_kinds().await
    }

    pub fn pending_remote_candidates(&self) -> usize {
        self.router.pending_candidates()
    }

    fn ensure_open(&self) -> SessionResult<()> {
        if self.is_closed() {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    /// Acquires the local stream (or adopts the pre-supplied one) and attaches
    /// its tracks.
    ///
    /// Capture or attach failures are returned and also emitted as `error`;
    /// the session stays usable without local tracks. Either way the
    /// initiator's first offer is released once this returns.
    pub async fn initialize(&self) -> SessionResult<()> {
        self.ensure_open()?;
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(SessionError::PreconditionFailure(
                "session is already initialized".into(),
            ));
        }

        let result = self.acquire_local_stream().await;
        self.capture_settled.send_replace(true);
        result
    }

    async fn acquire_local_stream(&self) -> SessionResult<()> {
        let stream = match &self.config.local_stream {
            Some(stream) => stream.clone(),
            None if self.config.constraints.is_empty() => {
                log::info!("no local media requested, session {} is receive-only", self.id);
                return Ok(());
            }
            None => match request_local_stream(self.capture.as_ref(), &self.config.constraints).await {
                Ok(stream) => stream,
                Err(e) => {
                    self.events.emit_error(Operation::Capture, e.clone());
                    return Err(e.into());
                }
            },
        };

        if let Err(e) = self.store.add_local_tracks(&stream).await {
            self.events.emit_error(Operation::AddTrack, e.clone());
            return Err(e.into());
        }
        Ok(())
    }

    /// Feeds one inbound signaling payload
    pub async fn signal(&self, payload: SignalPayload) -> SessionResult<Route> {
        self.ensure_open()?;
        Ok(self.router.route(payload).await)
    }

    /// Feeds a raw JSON payload; unrecognized shapes are ignored
    pub async fn signal_value(&self, value: &Value) -> SessionResult<Route> {
        self.ensure_open()?;
        Ok(self.router.route_value(value).await)
    }

    /// Soft-mutes audio in place; detaches video and renegotiates.
    pub async fn mute(&self, kind: &str) -> SessionResult<()> {
        let kind: TrackKind = kind.parse()?;
        self.ensure_open()?;

        match kind {
            TrackKind::Audio => {
                let track = self.store.local_track(TrackKind::Audio).await.ok_or_else(|| {
                    SessionError::PreconditionFailure("local stream has no audio track".into())
                })?;
                track.set_enabled(false);
                log::info!("audio muted");
                Ok(())
            }
            TrackKind::Video => {
                if self.store.local_track(TrackKind::Video).await.is_none() {
                    return Err(SessionError::PreconditionFailure(
                        "local stream has no video track".into(),
                    ));
                }
                if let Err(e) = self.store.remove_local_track(TrackKind::Video).await {
                    // sender set unchanged, nothing to renegotiate
                    self.events.emit_error(Operation::RemoveTrack, e);
                    return Ok(());
                }
                log::info!("video muted, renegotiating");
                self.negotiation.create_offer(true).await;
                Ok(())
            }
        }
    }

    /// Re-enables audio; re-captures and re-attaches video, then renegotiates.
    pub async fn unmute(&self, kind: &str) -> SessionResult<()> {
        let kind: TrackKind = kind.parse()?;
        self.ensure_open()?;

        match kind {
            TrackKind::Audio => {
                let track = self.store.local_track(TrackKind::Audio).await.ok_or_else(|| {
                    SessionError::PreconditionFailure("local stream has no audio track".into())
                })?;
                track.set_enabled(true);
                log::info!("audio unmuted");
                Ok(())
            }
            TrackKind::Video => {
                if self.store.local_track(TrackKind::Video).await.is_some() {
                    return Err(SessionError::PreconditionFailure(
                        "video track is already active".into(),
                    ));
                }
                let constraints = self.config.constraints.video_only();
                if !constraints.video.is_requested() {
                    return Err(SessionError::PreconditionFailure(
                        "video is disabled by the capture constraints".into(),
                    ));
                }

                let stream = match request_local_stream(self.capture.as_ref(), &constraints).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        self.events.emit_error(Operation::Capture, e);
                        return Ok(());
                    }
                };
                if let Err(e) = self.store.add_local_tracks(&stream).await {
                    self.events.emit_error(Operation::AddTrack, e);
                    return Ok(());
                }
                log::info!("video unmuted, renegotiating");
                self.negotiation.create_offer(true).await;
                Ok(())
            }
        }
    }

    /// Stops all local tracks and closes the engine. The session is unusable
    /// afterwards; calling this twice is a no-op.
    pub async fn leave(&self) -> SessionResult<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.negotiation.close();
        self.capture_settled.send_replace(true);

        let stopped = self.store.release_local().await;
        if let Err(e) = self.engine.close().await {
            log::warn!("closing connection engine failed: {e}");
        }
        log::info!("session {} left, {stopped} local track(s) stopped", self.id);
        Ok(())
    }

    /// Reacts to one engine callback
    pub async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::ConnectionState(state) => {
                self.events.emit(SessionEvent::ConnectionState(state));
            }
            _ if self.is_closed() => {
                log::debug!("session {} closed, dropping engine event", self.id);
            }
            EngineEvent::Track(bundle) => {
                self.store.apply_remote_track_bundle(bundle);
            }
            EngineEvent::IceCandidate(Some(candidate)) => {
                self.gathered
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(candidate.clone());
                self.events
                    .emit(SessionEvent::Signal(SignalPayload::Candidate(candidate)));
            }
            EngineEvent::IceCandidate(None) => {
                let gathered: Vec<IceCandidate> = self
                    .gathered
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .drain(..)
                    .collect();
                analyze_candidates(&gathered);
            }
        }
    }

    /// Forwards engine callbacks into the session until either side goes away
    pub fn spawn_event_pump(
        session: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
    ) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(session);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(session) = weak.upgrade() else {
                    break;
                };
                session.handle_engine_event(event).await;
            }
        })
    }
}

impl<E: ConnectionEngine, C: MediaCapture> fmt::Debug for Session<E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("phase", &self.negotiation.phase())
            .field("closed", &self.is_closed())
            .finish()
    }
}
