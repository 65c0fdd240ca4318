//! Construction options for a [`Session`](crate::Session).
//!
//! The JSON shape mirrors what a browser-side peer would pass in:
//!
//! ```json
//! {
//!   "initiator": true,
//!   "rtcConfiguration": { "iceServers": [{ "id": "a", "type": "stun", "url": "stun.l.google.com:19302" }] },
//!   "offerOptions": { "offerToReceiveAudio": true, "offerToReceiveVideo": true },
//!   "answerOptions": {},
//!   "constraints": { "audio": true, "video": { "width": 640, "height": 480 } }
//! }
//! ```

use crate::error::ConfigError;
use crate::media::CapturedStream;
use serde::{Deserialize, Serialize};

const DEFAULT_STUN_URLS: [&str; 2] = ["stun:stun.l.google.com:19302", "stun:stun1.l.google.com:19302"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub initiator: bool,
    /// `None` means the default public STUN servers
    pub rtc_configuration: Option<RtcConfiguration>,
    pub offer_options: OfferOptions,
    pub answer_options: AnswerOptions,
    pub constraints: MediaConstraints,
    /// Stream adopted instead of capturing on initialization
    #[serde(skip)]
    pub local_stream: Option<CapturedStream>,
}

impl SessionConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_local_stream(mut self, stream: CapturedStream) -> Self {
        self.local_stream = Some(stream);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(rtc) = &self.rtc_configuration {
            for server in &rtc.ice_servers {
                server.validate()?;
            }
        }
        Ok(())
    }

    /// ICE servers to hand to the connection engine
    pub fn ice_servers(&self) -> Vec<ServerConfig> {
        match &self.rtc_configuration {
            Some(rtc) if !rtc.ice_servers.is_empty() => rtc.ice_servers.clone(),
            _ => default_ice_servers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RtcConfiguration {
    pub ice_servers: Vec<ServerConfig>,
    pub ice_candidate_pool_size: u8,
    pub bundle_policy: BundlePolicy,
    pub ice_transport_policy: IceTransportPolicy,
}

impl Default for RtcConfiguration {
    fn default() -> Self {
        Self {
            ice_servers: Vec::new(),
            ice_candidate_pool_size: 10,
            bundle_policy: BundlePolicy::MaxBundle,
            ice_transport_policy: IceTransportPolicy::All,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BundlePolicy {
    Balanced,
    MaxCompat,
    #[default]
    MaxBundle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IceTransportPolicy {
    #[default]
    All,
    Relay,
}

/// ICE server entry
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ServerKind,
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::EmptyServerUrl(self.id.clone()));
        }
        if self.kind == ServerKind::Turn && (self.username.is_none() || self.credential.is_none()) {
            return Err(ConfigError::MissingTurnCredentials(self.url.clone()));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    Stun,
    Turn,
}

pub fn default_ice_servers() -> Vec<ServerConfig> {
    DEFAULT_STUN_URLS
        .iter()
        .enumerate()
        .map(|(i, url)| ServerConfig {
            id: format!("default-stun-{i}"),
            kind: ServerKind::Stun,
            url: (*url).to_owned(),
            username: None,
            credential: None,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct OfferOptions {
    pub offer_to_receive_audio: bool,
    pub offer_to_receive_video: bool,
    pub voice_activity_detection: bool,
    pub ice_restart: bool,
}

impl Default for OfferOptions {
    fn default() -> Self {
        Self {
            offer_to_receive_audio: true,
            offer_to_receive_video: true,
            voice_activity_detection: false,
            ice_restart: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnswerOptions {
    pub voice_activity_detection: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: VideoConstraints,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: VideoConstraints::Enabled(true),
        }
    }
}

impl MediaConstraints {
    /// Constraints used to re-acquire the camera on video unmute
    pub fn video_only(&self) -> Self {
        Self {
            audio: false,
            video: self.video.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.audio && !self.video.is_requested()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum VideoConstraints {
    Enabled(bool),
    Detailed(VideoSettings),
}

impl VideoConstraints {
    pub fn is_requested(&self) -> bool {
        !matches!(self, VideoConstraints::Enabled(false))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoSettings {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
}
