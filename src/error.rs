use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("capture failed: {0}")]
    CaptureFailure(#[from] CaptureError),
    #[error("negotiation failed: {0}")]
    NegotiationFailure(#[from] EngineError),
    #[error("precondition failed: {0}")]
    PreconditionFailure(String),
    #[error("session is closed")]
    Closed,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Coarse classification of a [`SessionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    CaptureFailure,
    NegotiationFailure,
    PreconditionFailure,
    Closed,
    Config,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SessionError::CaptureFailure(_) => ErrorKind::CaptureFailure,
            SessionError::NegotiationFailure(_) => ErrorKind::NegotiationFailure,
            SessionError::PreconditionFailure(_) => ErrorKind::PreconditionFailure,
            SessionError::Closed => ErrorKind::Closed,
            SessionError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Failure reported by the connection engine
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error(transparent)]
    Webrtc(Arc<webrtc::Error>),
    #[error("unsupported session description type: {0}")]
    UnsupportedDescription(String),
    #[error("track {0} has no media source to attach")]
    MissingSource(String),
    #[error("connection is closed")]
    Closed,
    #[error("{0}")]
    Rejected(String),
}

impl From<webrtc::Error> for EngineError {
    fn from(e: webrtc::Error) -> Self {
        EngineError::Webrtc(Arc::new(e))
    }
}

/// Failure reported by the capture layer
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("no device satisfies the constraints: {0}")]
    Unavailable(String),
    #[error("no audio or video requested")]
    NothingRequested,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed options: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("ice server {0:?} has an empty url")]
    EmptyServerUrl(String),
    #[error("turn server {0} requires username and credential")]
    MissingTurnCredentials(String),
}

/// Step of the session that produced an asynchronous failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Capture,
    AddTrack,
    RemoveTrack,
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Capture => "capture",
            Operation::AddTrack => "add_track",
            Operation::RemoveTrack => "remove_track",
            Operation::CreateOffer => "create_offer",
            Operation::CreateAnswer => "create_answer",
            Operation::SetLocalDescription => "set_local_description",
            Operation::SetRemoteDescription => "set_remote_description",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(
            SessionError::InvalidArgument("bogus".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            SessionError::from(CaptureError::NothingRequested).kind(),
            ErrorKind::CaptureFailure
        );
        assert_eq!(
            SessionError::from(EngineError::Closed).kind(),
            ErrorKind::NegotiationFailure
        );
        assert_eq!(
            SessionError::PreconditionFailure("no audio".into()).kind(),
            ErrorKind::PreconditionFailure
        );
    }

    #[test]
    fn messages_name_the_cause() {
        let err = SessionError::from(CaptureError::PermissionDenied("camera".into()));
        assert_eq!(err.to_string(), "capture failed: permission denied: camera");
        assert_eq!(Operation::SetRemoteDescription.to_string(), "set_remote_description");
    }
}
