pub mod capture;
pub mod stream;
pub mod track;

pub use capture::{request_local_stream, CapturedStream, MediaCapture, SyntheticCapture};
pub use stream::{LocalStream, MediaStream, RemoteStream};
pub use track::{LocalTrack, RemoteTrack, Track, TrackKind};
