//! Seam between the session core and the connection engine that does the
//! actual ICE/DTLS/SRTP work.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{ConnectionState, IceCandidate, SessionDescription};
use crate::config::{AnswerOptions, OfferOptions, SessionConfig};
use crate::error::EngineError;
use crate::media::{LocalTrack, RemoteTrack};

/// Tracks of one remote stream, as delivered with a track-arrival callback
#[derive(Debug, Clone)]
pub struct RemoteTrackBundle {
    pub stream_id: String,
    pub tracks: Vec<Arc<RemoteTrack>>,
}

/// Callbacks raised by the engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// `None` when the arrival carried no stream
    Track(Option<RemoteTrackBundle>),
    /// `None` marks the end of local candidate gathering
    IceCandidate(Option<IceCandidate>),
    ConnectionState(ConnectionState),
}

pub type EngineEventSink = mpsc::UnboundedSender<EngineEvent>;

#[async_trait]
pub trait ConnectionEngine: Send + Sync + 'static {
    /// Handle for one outbound track attached to the connection
    type Sender: Clone + Send + Sync + 'static;

    async fn create_offer(&self, options: &OfferOptions) -> Result<SessionDescription, EngineError>;

    async fn create_answer(
        &self,
        options: &AnswerOptions,
    ) -> Result<SessionDescription, EngineError>;

    async fn set_local_description(&self, description: SessionDescription)
        -> Result<(), EngineError>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError>;

    async fn has_remote_description(&self) -> bool;

    async fn add_track(
        &self,
        track: Arc<LocalTrack>,
        stream_id: &str,
    ) -> Result<Self::Sender, EngineError>;

    async fn remove_track(&self, sender: &Self::Sender) -> Result<(), EngineError>;

    /// Swaps the sender's outbound track; `None` sends nothing until renegotiated
    async fn replace_track(
        &self,
        sender: &Self::Sender,
        track: Option<Arc<LocalTrack>>,
    ) -> Result<(), EngineError>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}

/// Builds one engine per session
#[async_trait]
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: ConnectionEngine;

    async fn create(
        &self,
        config: &SessionConfig,
        events: EngineEventSink,
    ) -> Result<Self::Engine, EngineError>;
}
