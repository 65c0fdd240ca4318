use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{watch, Mutex as AsyncMutex};

use crate::config::{AnswerOptions, OfferOptions};
use crate::error::Operation;
use crate::events::{EventEmitter, SessionEvent};
use crate::peer::{ConnectionEngine, SdpType, SessionDescription};
use crate::signaling::SignalPayload;

/// Controller's view of the offer/answer exchange.
///
/// The engine keeps the authoritative signaling state; this only tracks
/// which step the controller last drove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    Idle,
    AwaitingLocalCapture,
    OfferPending,
    AnswerPending,
    Negotiated,
}

/// Drives offers and answers against the engine.
///
/// Every engine negotiation call goes through `serial`, so applying a remote
/// offer and answering it cannot interleave with an offer of our own.
/// Failures are reported as `error` events and leave the session usable.
pub struct NegotiationController<E: ConnectionEngine> {
    engine: Arc<E>,
    events: Arc<EventEmitter>,
    initiator: bool,
    offer_options: OfferOptions,
    answer_options: AnswerOptions,
    phase: Mutex<NegotiationPhase>,
    serial: AsyncMutex<()>,
    capture_settled: watch::Receiver<bool>,
    closed: AtomicBool,
}

impl<E: ConnectionEngine> NegotiationController<E> {
    pub fn new(
        engine: Arc<E>,
        events: Arc<EventEmitter>,
        initiator: bool,
        offer_options: OfferOptions,
        answer_options: AnswerOptions,
        capture_settled: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            events,
            initiator,
            offer_options,
            answer_options,
            phase: Mutex::new(NegotiationPhase::Idle),
            serial: AsyncMutex::new(()),
            capture_settled,
            closed: AtomicBool::new(false),
        }
    }

    pub fn phase(&self) -> NegotiationPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: NegotiationPhase) -> NegotiationPhase {
        let mut current = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        log::debug!("negotiation {:?} -> {:?}", *current, phase);
        std::mem::replace(&mut *current, phase)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.set_phase(NegotiationPhase::Idle);
    }

    /// Initiator side of `"ready"`: waits for local capture to settle, then
    /// sends the first offer. Returns whether an offer went out.
    pub async fn start(&self) -> bool {
        if !self.initiator {
            log::debug!("peer is ready, waiting for its offer");
            return false;
        }

        let mut settled = self.capture_settled.clone();
        if !*settled.borrow() {
            self.set_phase(NegotiationPhase::AwaitingLocalCapture);
            if settled.wait_for(|done| *done).await.is_err() {
                log::warn!("session dropped before local capture settled");
                return false;
            }
        }

        self.create_offer(false).await
    }

    /// Creates an offer, applies it locally and emits it. Returns whether the
    /// offer was emitted.
    pub async fn create_offer(&self, ice_restart: bool) -> bool {
        let _serial = self.serial.lock().await;
        if self.is_closed() {
            return false;
        }

        let previous = self.set_phase(NegotiationPhase::OfferPending);
        let options = OfferOptions {
            ice_restart,
            ..self.offer_options.clone()
        };

        let offer = match self.engine.create_offer(&options).await {
            Ok(offer) => offer,
            Err(e) => {
                self.set_phase(previous);
                self.events.emit_error(Operation::CreateOffer, e);
                return false;
            }
        };

        if let Err(e) = self.engine.set_local_description(offer.clone()).await {
            self.set_phase(previous);
            self.events.emit_error(Operation::SetLocalDescription, e);
            return false;
        }

        log::info!("sending offer (ice_restart={ice_restart})");
        self.events.emit(SessionEvent::Signal(SignalPayload::Description(offer)));
        true
    }

    /// Applies a remote description and, for an offer, answers it within the
    /// same sequenced step. Returns whether the description was applied.
    pub async fn apply_remote_description(&self, description: SessionDescription) -> bool {
        let _serial = self.serial.lock().await;
        if self.is_closed() {
            return false;
        }

        let sdp_type = description.sdp_type;
        if let Err(e) = self.engine.set_remote_description(description).await {
            self.events.emit_error(Operation::SetRemoteDescription, e);
            return false;
        }
        log::debug!("remote {sdp_type} applied");

        match sdp_type {
            SdpType::Offer => {
                self.set_phase(NegotiationPhase::AnswerPending);
                self.answer_locked().await;
            }
            SdpType::Answer => {
                self.set_phase(NegotiationPhase::Negotiated);
            }
            SdpType::Pranswer | SdpType::Rollback => {}
        }
        true
    }

    /// Caller holds `serial` and has just applied a remote offer
    async fn answer_locked(&self) -> bool {
        let answer = match self.engine.create_answer(&self.answer_options).await {
            Ok(answer) => answer,
            Err(e) => {
                self.events.emit_error(Operation::CreateAnswer, e);
                return false;
            }
        };

        if let Err(e) = self.engine.set_local_description(answer.clone()).await {
            self.events.emit_error(Operation::SetLocalDescription, e);
            return false;
        }

        self.set_phase(NegotiationPhase::Negotiated);
        log::info!("sending answer");
        self.events.emit(SessionEvent::Signal(SignalPayload::Description(answer)));
        true
    }
}

impl<E: ConnectionEngine> std::fmt::Debug for NegotiationController<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiationController")
            .field("initiator", &self.initiator)
            .field("phase", &self.phase())
            .finish()
    }
}
