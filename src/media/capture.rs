use std::sync::Arc;

use async_trait::async_trait;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use super::track::{LocalTrack, Track, TrackKind};
use crate::config::MediaConstraints;
use crate::error::CaptureError;
use crate::utils::random_id;

/// Tracks handed over by the capture layer, all from one originating stream
#[derive(Debug, Clone)]
pub struct CapturedStream {
    pub id: String,
    pub tracks: Vec<Arc<LocalTrack>>,
}

impl CapturedStream {
    pub fn new(id: impl Into<String>, tracks: Vec<Arc<LocalTrack>>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }
}

/// Device capture layer
#[async_trait]
pub trait MediaCapture: Send + Sync + 'static {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<CapturedStream, CaptureError>;
}

/// Requests a stream and trims it to what `constraints` asked for.
///
/// Extra tracks (unrequested kinds, second track of a kind) are stopped so the
/// device is released.
pub async fn request_local_stream<C: MediaCapture + ?Sized>(
    capture: &C,
    constraints: &MediaConstraints,
) -> Result<CapturedStream, CaptureError> {
    if constraints.is_empty() {
        return Err(CaptureError::NothingRequested);
    }

    let stream = match capture.get_user_media(constraints).await {
        Ok(stream) => stream,
        Err(e) => {
            log::warn!("get_user_media failed: {e}");
            return Err(e);
        }
    };

    let mut kept: Vec<Arc<LocalTrack>> = Vec::with_capacity(2);
    for track in stream.tracks {
        let requested = match track.kind() {
            TrackKind::Audio => constraints.audio,
            TrackKind::Video => constraints.video.is_requested(),
        };
        if requested && !kept.iter().any(|t| t.kind() == track.kind()) {
            kept.push(track);
        } else {
            log::debug!("dropping surplus {} track {}", track.kind(), track.id());
            track.stop();
        }
    }

    log::info!(
        "captured stream {} with {} track(s): {:?}",
        stream.id,
        kept.len(),
        kept.iter().map(|t| t.kind()).collect::<Vec<_>>()
    );
    Ok(CapturedStream::new(stream.id, kept))
}

/// Capture layer producing sample-writable `webrtc` tracks (Opus, VP8) without
/// touching real devices.
#[derive(Debug, Clone, Default)]
pub struct SyntheticCapture {
    deny: Option<String>,
}

impl SyntheticCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture that always fails as if the user refused access
    pub fn denying(reason: impl Into<String>) -> Self {
        Self {
            deny: Some(reason.into()),
        }
    }

    fn track(kind: TrackKind, stream_id: &str) -> Arc<LocalTrack> {
        let codec = match kind {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        };
        let source = Arc::new(TrackLocalStaticSample::new(
            codec,
            format!("{kind}-{}", random_id()),
            stream_id.to_owned(),
        ));
        match LocalTrack::from_sample_track(source) {
            Some(track) => Arc::new(track),
            // codecs above always carry a kind
            None => Arc::new(LocalTrack::new(kind, stream_id)),
        }
    }
}

#[async_trait]
impl MediaCapture for SyntheticCapture {
    async fn get_user_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<CapturedStream, CaptureError> {
        if let Some(reason) = &self.deny {
            return Err(CaptureError::PermissionDenied(reason.clone()));
        }

        let stream_id = random_id();
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(Self::track(TrackKind::Audio, &stream_id));
        }
        if constraints.video.is_requested() {
            tracks.push(Self::track(TrackKind::Video, &stream_id));
        }
        Ok(CapturedStream::new(stream_id, tracks))
    }
}
