use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use super::{MalformedSignal, SignalPayload};
use crate::error::{EngineError, Operation};
use crate::events::EventEmitter;
use crate::peer::{ConnectionEngine, IceCandidate};
use crate::session::NegotiationController;

/// Where an inbound payload went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Ready,
    Description,
    Candidate,
    Ignored,
}

/// Dispatches inbound signaling payloads to the negotiation controller or
/// straight to the engine.
pub struct SignalRouter<E: ConnectionEngine> {
    engine: Arc<E>,
    negotiation: Arc<NegotiationController<E>>,
    events: Arc<EventEmitter>,
    /// Remote candidates received before any remote description
    pending: Mutex<Vec<IceCandidate>>,
}

impl<E: ConnectionEngine> SignalRouter<E> {
    pub fn new(
        engine: Arc<E>,
        negotiation: Arc<NegotiationController<E>>,
        events: Arc<EventEmitter>,
    ) -> Self {
        Self {
            engine,
            negotiation,
            events,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub async fn route_value(&self, value: &Value) -> Route {
        match SignalPayload::classify(value) {
            Ok(Some(payload)) => self.route(payload).await,
            Ok(None) => {
                log::debug!("ignoring unrecognized signaling payload");
                Route::Ignored
            }
            Err(MalformedSignal::DescriptionType(raw)) => {
                self.events.emit_error(
                    Operation::SetRemoteDescription,
                    EngineError::UnsupportedDescription(raw),
                );
                Route::Description
            }
            Err(e @ MalformedSignal::Candidate(_)) => {
                log::debug!("dropping remote candidate: {e}");
                Route::Candidate
            }
        }
    }

    pub async fn route(&self, payload: SignalPayload) -> Route {
        match payload {
            SignalPayload::Ready => {
                self.negotiation.start().await;
                Route::Ready
            }
            SignalPayload::Description(description) => {
                if self.negotiation.apply_remote_description(description).await {
                    self.flush_pending().await;
                }
                Route::Description
            }
            SignalPayload::Candidate(candidate) => {
                self.add_candidate(candidate).await;
                Route::Candidate
            }
        }
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Candidate intake failures are not fatal: the peer may trickle after
    /// the connection has gone away.
    async fn add_candidate(&self, candidate: IceCandidate) {
        if !self.engine.has_remote_description().await {
            log::debug!("remote description not set yet, queuing candidate");
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(candidate);
            return;
        }

        if let Err(e) = self.engine.add_ice_candidate(candidate).await {
            log::debug!("failed to add remote ICE candidate: {e}");
        }
    }

    async fn flush_pending(&self) {
        let candidates: Vec<IceCandidate> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        for candidate in candidates {
            log::debug!("applying pending candidate: {}", candidate.candidate);
            if let Err(e) = self.engine.add_ice_candidate(candidate).await {
                log::debug!("failed to apply pending candidate: {e}");
            }
        }
    }
}
