use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;

use crate::error::EngineError;
use crate::events::{EventEmitter, SessionEvent};
use crate::media::{CapturedStream, LocalStream, LocalTrack, RemoteStream, Track, TrackKind};
use crate::peer::{ConnectionEngine, RemoteTrackBundle};

struct LocalState<S> {
    stream: LocalStream,
    /// kind -> sender currently carrying that kind
    senders: HashMap<TrackKind, S>,
}

/// Local/remote aggregate streams and the sender registry.
///
/// A kind is in the registry iff a local track of that kind is attached to
/// the engine.
pub struct TrackStore<E: ConnectionEngine> {
    engine: Arc<E>,
    events: Arc<EventEmitter>,
    local: AsyncMutex<LocalState<E::Sender>>,
    remote: Mutex<RemoteStream>,
}

impl<E: ConnectionEngine> TrackStore<E> {
    pub fn new(session_id: &str, engine: Arc<E>, events: Arc<EventEmitter>) -> Self {
        Self {
            engine,
            events,
            local: AsyncMutex::new(LocalState {
                stream: LocalStream::new(format!("{session_id}-local")),
                senders: HashMap::new(),
            }),
            remote: Mutex::new(RemoteStream::new(format!("{session_id}-remote"))),
        }
    }

    /// Attaches every track of `captured` and emits `localStream`.
    ///
    /// A kind that already has a sender gets its track swapped in place. On
    /// the first engine failure the remaining tracks are stopped unattached;
    /// `localStream` is emitted either way.
    pub async fn add_local_tracks(&self, captured: &CapturedStream) -> Result<(), EngineError> {
        let mut local = self.local.lock().await;
        let mut result = Ok(());

        for track in &captured.tracks {
            if result.is_err() {
                track.stop();
                continue;
            }

            let kind = track.kind();
            let attached = match local.senders.get(&kind) {
                Some(sender) => self
                    .engine
                    .replace_track(sender, Some(track.clone()))
                    .await
                    .map(|_| None),
                None => self
                    .engine
                    .add_track(track.clone(), &captured.id)
                    .await
                    .map(Some),
            };

            match attached {
                Ok(new_sender) => {
                    if let Some(sender) = new_sender {
                        local.senders.insert(kind, sender);
                    }
                    if let Some(previous) = local.stream.add(track.clone()) {
                        previous.stop();
                    }
                    log::debug!("local {kind} track {} attached", track.id());
                }
                Err(e) => {
                    track.stop();
                    result = Err(e);
                }
            }
        }

        let snapshot = local.stream.clone();
        drop(local);
        self.events.emit(SessionEvent::LocalStream(snapshot));
        result
    }

    /// Detaches the local track of `kind`; `Ok(false)` when there is none.
    ///
    /// The engine detaches first. If that fails, the track stays live and
    /// registered.
    pub async fn remove_local_track(&self, kind: TrackKind) -> Result<bool, EngineError> {
        let mut local = self.local.lock().await;

        let Some(track) = local.stream.track(kind).cloned() else {
            return Ok(false);
        };
        let sender = local.senders.get(&kind).cloned();
        if let Some(sender) = &sender {
            self.engine.remove_track(sender).await?;
        } else {
            log::warn!("local {kind} track {} had no sender", track.id());
        }

        local.stream.remove(kind);
        local.senders.remove(&kind);
        track.stop();

        // nothing goes out on this sender until renegotiation completes
        if let Some(sender) = &sender {
            if let Err(e) = self.engine.replace_track(sender, None).await {
                log::debug!("clearing {kind} sender failed: {e}");
            }
        }
        log::debug!("local {kind} track {} detached", track.id());
        Ok(true)
    }

    /// Applies the tracks of an arrived remote stream and emits `remoteStream`.
    ///
    /// Each incoming kind evicts the current track of that kind first.
    pub fn apply_remote_track_bundle(&self, bundle: Option<RemoteTrackBundle>) -> bool {
        let Some(bundle) = bundle else {
            return false;
        };

        let snapshot = {
            let mut remote = self.remote.lock().unwrap_or_else(PoisonError::into_inner);
            for track in &bundle.tracks {
                if let Some(evicted) = remote.remove(track.kind()) {
                    log::debug!("remote {} track {} replaced", evicted.kind(), evicted.id());
                }
            }
            for track in bundle.tracks {
                remote.add(track);
            }
            remote.clone()
        };

        self.events.emit(SessionEvent::RemoteStream(snapshot));
        true
    }

    /// Stops and forgets every local track, returning how many there were
    pub async fn release_local(&self) -> usize {
        let mut local = self.local.lock().await;
        local.senders.clear();
        let tracks = local.stream.clear();
        for track in &tracks {
            track.stop();
        }
        tracks.len()
    }

    pub async fn local_track(&self, kind: TrackKind) -> Option<Arc<LocalTrack>> {
        self.local.lock().await.stream.track(kind).cloned()
    }

    pub async fn local_stream(&self) -> LocalStream {
        self.local.lock().await.stream.clone()
    }

    pub fn remote_stream(&self) -> RemoteStream {
        self.remote
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn sender(&self, kind: TrackKind) -> Option<E::Sender> {
        self.local.lock().await.senders.get(&kind).cloned()
    }

    pub async fn registered_kinds(&self) -> Vec<TrackKind> {
        let local = self.local.lock().await;
        let mut kinds: Vec<TrackKind> = local.senders.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}
