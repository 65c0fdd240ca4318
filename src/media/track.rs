use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::error::{EngineError, SessionError};
use crate::utils::random_id;

/// Media category of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        }
    }

    pub fn from_codec_type(codec_type: RTPCodecType) -> Option<Self> {
        match codec_type {
            RTPCodecType::Audio => Some(TrackKind::Audio),
            RTPCodecType::Video => Some(TrackKind::Video),
            _ => None,
        }
    }

    pub fn codec_type(&self) -> RTPCodecType {
        match self {
            TrackKind::Audio => RTPCodecType::Audio,
            TrackKind::Video => RTPCodecType::Video,
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackKind {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(TrackKind::Audio),
            "video" => Ok(TrackKind::Video),
            other => Err(SessionError::InvalidArgument(format!(
                "track kind must be audio or video, got {other:?}"
            ))),
        }
    }
}

/// Anything a [`MediaStream`](super::MediaStream) can hold
pub trait Track {
    fn id(&self) -> &str;
    fn kind(&self) -> TrackKind;
}

/// Locally captured track.
///
/// `enabled` is the soft mute flag: a disabled track stays attached to its
/// sender but [`write_sample`](Self::write_sample) strips every payload.
/// `stop` ends the track for good and releases the device.
pub struct LocalTrack {
    id: String,
    kind: TrackKind,
    stream_id: String,
    enabled: AtomicBool,
    live: AtomicBool,
    source: Option<Arc<dyn TrackLocal + Send + Sync>>,
    writer: Option<Arc<TrackLocalStaticSample>>,
}

impl LocalTrack {
    /// Track without an RTP source, for engines that do not carry media
    pub fn new(kind: TrackKind, stream_id: impl Into<String>) -> Self {
        Self {
            id: format!("{kind}-{}", random_id()),
            kind,
            stream_id: stream_id.into(),
            enabled: AtomicBool::new(true),
            live: AtomicBool::new(true),
            source: None,
            writer: None,
        }
    }

    /// Wraps a `webrtc` local track; `None` when its codec kind is unspecified
    pub fn from_source(source: Arc<dyn TrackLocal + Send + Sync>) -> Option<Self> {
        let kind = TrackKind::from_codec_type(source.kind())?;
        Some(Self {
            id: source.id().to_owned(),
            kind,
            stream_id: source.stream_id().to_owned(),
            enabled: AtomicBool::new(true),
            live: AtomicBool::new(true),
            source: Some(source),
            writer: None,
        })
    }

    /// Wraps a sample track; media must then go through [`write_sample`](Self::write_sample)
    pub fn from_sample_track(track: Arc<TrackLocalStaticSample>) -> Option<Self> {
        let mut local = Self::from_source(track.clone())?;
        local.writer = Some(track);
        Some(local)
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn source(&self) -> Option<&Arc<dyn TrackLocal + Send + Sync>> {
        self.source.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        if self.live.swap(false, Ordering::AcqRel) {
            log::debug!("stopped local {} track {}", self.kind, self.id);
        }
    }

    /// Feeds one captured sample to the sender. Returns whether media went out.
    ///
    /// A disabled track writes the sample with an empty payload: no RTP
    /// packet is sent but the RTP clock keeps advancing by its duration.
    /// Samples for a stopped track are dropped.
    pub async fn write_sample(&self, sample: &Sample) -> Result<bool, EngineError> {
        let writer = self
            .writer
            .as_ref()
            .ok_or_else(|| EngineError::MissingSource(self.id.clone()))?;
        if !self.is_live() {
            return Ok(false);
        }
        if self.is_enabled() {
            writer.write_sample(sample).await?;
            return Ok(true);
        }

        let silent = Sample {
            data: Default::default(),
            timestamp: sample.timestamp,
            duration: sample.duration,
            packet_timestamp: sample.packet_timestamp,
            prev_dropped_packets: sample.prev_dropped_packets,
            prev_padding_packets: sample.prev_padding_packets,
        };
        writer.write_sample(&silent).await?;
        Ok(false)
    }
}

impl Track for LocalTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stream_id", &self.stream_id)
            .field("enabled", &self.is_enabled())
            .field("live", &self.is_live())
            .finish()
    }
}

/// Track received from the peer
pub struct RemoteTrack {
    id: String,
    kind: TrackKind,
    stream_id: String,
    handle: Option<Arc<TrackRemote>>,
}

impl RemoteTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind, stream_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            stream_id: stream_id.into(),
            handle: None,
        }
    }

    pub fn from_remote(track: Arc<TrackRemote>) -> Option<Self> {
        let kind = TrackKind::from_codec_type(track.kind())?;
        Some(Self {
            id: track.id(),
            kind,
            stream_id: track.stream_id(),
            handle: Some(track),
        })
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// RTP reader for the received media, when the engine provides one
    pub fn handle(&self) -> Option<&Arc<TrackRemote>> {
        self.handle.as_ref()
    }
}

impl Track for RemoteTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("stream_id", &self.stream_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use webrtc::api::media_engine::MIME_TYPE_OPUS;
    use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
    use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

    #[test]
    fn kind_parsing_rejects_unknown_strings() {
        assert_eq!("audio".parse::<TrackKind>().unwrap(), TrackKind::Audio);
        assert_eq!("video".parse::<TrackKind>().unwrap(), TrackKind::Video);
        for bad in ["bogus", "Audio", "", "audio ", "videox"] {
            let err = bad.parse::<TrackKind>().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{bad:?}");
        }
    }

    #[test]
    fn stop_is_sticky_and_independent_of_enabled() {
        let track = LocalTrack::new(TrackKind::Audio, "local");
        assert!(track.is_live() && track.is_enabled());
        track.set_enabled(false);
        assert!(track.is_live());
        track.stop();
        track.stop();
        assert!(!track.is_live());
        track.set_enabled(true);
        assert!(!track.is_live());
    }

    #[test]
    fn source_kind_and_ids_are_adopted() {
        let source = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            "mic".to_owned(),
            "cam-stream".to_owned(),
        ));
        let track = LocalTrack::from_source(source).unwrap();
        assert_eq!(track.kind(), TrackKind::Audio);
        assert_eq!(track.id(), "mic");
        assert_eq!(track.stream_id(), "cam-stream");
        assert!(track.source().is_some());
    }

    fn opus_track() -> LocalTrack {
        let source = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            "mic".to_owned(),
            "local".to_owned(),
        ));
        LocalTrack::from_sample_track(source).unwrap()
    }

    fn frame() -> Sample {
        Sample {
            data: vec![0xfc; 40].into(),
            duration: std::time::Duration::from_millis(20),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn disabled_track_sends_no_media() {
        let track = opus_track();
        assert!(track.write_sample(&frame()).await.unwrap());

        track.set_enabled(false);
        assert!(!track.write_sample(&frame()).await.unwrap());

        track.set_enabled(true);
        assert!(track.write_sample(&frame()).await.unwrap());

        track.stop();
        assert!(!track.write_sample(&frame()).await.unwrap());
    }

    #[tokio::test]
    async fn writing_needs_a_sample_track() {
        let track = LocalTrack::new(TrackKind::Audio, "local");
        let err = track.write_sample(&frame()).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingSource(id) if id == track.id()));
    }
}
