//! Two-party WebRTC media session orchestration.
//!
//! A [`Session`] owns one connection engine. It captures local media,
//! drives the offer/answer exchange and routes inbound signaling payloads.
//! It also keeps the local and remote aggregate streams consistent while
//! tracks are muted, re-captured or replaced. Everything observable is
//! reported through [`SessionEvent`]s.
//!
//! ```no_run
//! use std::sync::Arc;
//! use p2p_session::{webrtc_factory, EventKind, SessionConfig, SessionEvent, SyntheticCapture};
//!
//! # async fn run() -> Result<(), p2p_session::SessionError> {
//! let factory = webrtc_factory(Arc::new(SyntheticCapture::new()));
//! let session = factory.create(SessionConfig { initiator: true, ..Default::default() }).await?;
//! session.on(EventKind::Signal, |event| {
//!     if let SessionEvent::Signal(payload) = event {
//!         // hand `payload` to the signaling channel
//!         let _ = payload.to_value();
//!     }
//! });
//! session.initialize().await?;
//! session.signal_value(&serde_json::json!("ready")).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod logger;
pub mod media;
pub mod peer;
pub mod session;
pub mod signaling;
pub mod utils;

pub use config::{AnswerOptions, MediaConstraints, OfferOptions, RtcConfiguration, ServerConfig, SessionConfig};
pub use error::{CaptureError, ConfigError, EngineError, ErrorKind, Operation, SessionError, SessionResult};
pub use events::{EventEmitter, EventKind, ListenerId, SessionEvent, SessionFailure};
pub use media::{CapturedStream, MediaCapture, SyntheticCapture, TrackKind};
pub use peer::{ConnectionEngine, ConnectionState, EngineFactory, IceCandidate, SessionDescription};
pub use session::{webrtc_factory, NegotiationPhase, Role, Session, SessionFactory};
pub use signaling::{Route, SignalPayload};
