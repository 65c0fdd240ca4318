pub mod connection;
pub mod engine;
pub mod types;

pub use connection::{WebrtcEngine, WebrtcEngineFactory};
pub use engine::{ConnectionEngine, EngineEvent, EngineEventSink, EngineFactory, RemoteTrackBundle};
pub use types::{ConnectionState, IceCandidate, SdpType, SessionDescription};
