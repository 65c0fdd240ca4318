use std::sync::Arc;

use async_trait::async_trait;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::{RTCAnswerOptions, RTCOfferOptions};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_remote::TrackRemote;

use super::engine::{ConnectionEngine, EngineEvent, EngineEventSink, EngineFactory, RemoteTrackBundle};
use super::types::{IceCandidate, SdpType, SessionDescription};
use crate::config::{AnswerOptions, BundlePolicy, IceTransportPolicy, OfferOptions, SessionConfig};
use crate::error::EngineError;
use crate::logger::{dump_candidate, dump_selected_pair};
use crate::media::{LocalTrack, RemoteTrack, Track};
use crate::utils::add_ice_url_scheme;

/// Connection engine backed by a webrtc-rs `RTCPeerConnection`
pub struct WebrtcEngine {
    pc: Arc<RTCPeerConnection>,
}

impl WebrtcEngine {
    pub async fn new(config: &SessionConfig, events: EngineEventSink) -> Result<Self, EngineError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(api.new_peer_connection(rtc_config(config)).await?);
        attach_handlers(&pc, events);
        Ok(Self { pc })
    }

    pub fn peer_connection(&self) -> Arc<RTCPeerConnection> {
        self.pc.clone()
    }

    /// Legacy `offerToReceive*`: a recv-only transceiver for every wanted kind
    /// that has no transceiver yet
    async fn ensure_receive_transceivers(&self, options: &OfferOptions) -> Result<(), EngineError> {
        let transceivers = self.pc.get_transceivers().await;
        for (wanted, kind) in [
            (options.offer_to_receive_audio, RTPCodecType::Audio),
            (options.offer_to_receive_video, RTPCodecType::Video),
        ] {
            if wanted && !transceivers.iter().any(|t| t.kind() == kind) {
                log::debug!("adding recvonly transceiver for {kind:?}");
                self.pc
                    .add_transceiver_from_kind(
                        kind,
                        Some(RTCRtpTransceiverInit {
                            direction: RTCRtpTransceiverDirection::Recvonly,
                            send_encodings: vec![],
                        }),
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

fn rtc_config(config: &SessionConfig) -> RTCConfiguration {
    let ice_servers = config
        .ice_servers()
        .into_iter()
        .map(|server| RTCIceServer {
            urls: vec![add_ice_url_scheme(&server)],
            username: server.username.unwrap_or_default(),
            credential: server.credential.unwrap_or_default(),
        })
        .collect();

    let rtc = config.rtc_configuration.clone().unwrap_or_default();
    RTCConfiguration {
        ice_servers,
        ice_candidate_pool_size: rtc.ice_candidate_pool_size,
        bundle_policy: match rtc.bundle_policy {
            BundlePolicy::Balanced => RTCBundlePolicy::Balanced,
            BundlePolicy::MaxCompat => RTCBundlePolicy::MaxCompat,
            BundlePolicy::MaxBundle => RTCBundlePolicy::MaxBundle,
        },
        ice_transport_policy: match rtc.ice_transport_policy {
            IceTransportPolicy::All => RTCIceTransportPolicy::All,
            IceTransportPolicy::Relay => RTCIceTransportPolicy::Relay,
        },
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

fn attach_handlers(pc: &Arc<RTCPeerConnection>, events: EngineEventSink) {
    let candidate_events = events.clone();
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        let event = match cand {
            Some(c) => {
                dump_candidate("LOCAL", &c);
                match c.to_json() {
                    Ok(init) => Some(EngineEvent::IceCandidate(Some(IceCandidate::from(init)))),
                    Err(e) => {
                        log::warn!("dropping local candidate that failed to serialize: {e}");
                        None
                    }
                }
            }
            None => {
                log::debug!("ICE candidate gathering completed (null candidate received)");
                Some(EngineEvent::IceCandidate(None))
            }
        };
        if let Some(event) = event {
            let _ = candidate_events.send(event);
        }
        Box::pin(async {})
    }));

    let track_events = events.clone();
    pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
        let bundle = remote_bundle(track);
        let _ = track_events.send(EngineEvent::Track(bundle));
        Box::pin(async {})
    }));

    pc.on_ice_gathering_state_change(Box::new(move |state| {
        log::debug!("ICE gathering state changed to: {state:?}");
        Box::pin(async {})
    }));

    pc.on_ice_connection_state_change(Box::new(move |state| {
        log::debug!("ICE connection state changed to: {state:?}");
        Box::pin(async {})
    }));

    pc.on_signaling_state_change(Box::new(move |state| {
        log::debug!("signaling state changed to: {state:?}");
        Box::pin(async {})
    }));

    let pc_stats = Arc::downgrade(pc);
    pc.on_peer_connection_state_change(Box::new(move |st: RTCPeerConnectionState| {
        log::info!("peer connection state changed to: {st:?}");
        if st == RTCPeerConnectionState::Failed {
            if let Some(pc) = pc_stats.upgrade() {
                tokio::spawn(async move {
                    dump_selected_pair(&pc, "FAILED").await;
                });
            }
        }
        let _ = events.send(EngineEvent::ConnectionState(st.into()));
        Box::pin(async {})
    }));
}

fn remote_bundle(track: Arc<TrackRemote>) -> Option<RemoteTrackBundle> {
    let stream_id = track.stream_id();
    if stream_id.is_empty() {
        log::debug!("remote track {} arrived without a stream", track.id());
        return None;
    }
    let remote = RemoteTrack::from_remote(track)?;
    log::info!("remote {} track {} on stream {stream_id}", remote.kind(), remote.id());
    Some(RemoteTrackBundle {
        stream_id,
        tracks: vec![Arc::new(remote)],
    })
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription, EngineError> {
    let rtc = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
        SdpType::Rollback => return Err(EngineError::UnsupportedDescription("rollback".into())),
    };
    Ok(rtc)
}

fn from_rtc_description(desc: RTCSessionDescription) -> Result<SessionDescription, EngineError> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        other => return Err(EngineError::UnsupportedDescription(other.to_string())),
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: desc.sdp,
    })
}

#[async_trait]
impl ConnectionEngine for WebrtcEngine {
    type Sender = Arc<RTCRtpSender>;

    async fn create_offer(&self, options: &OfferOptions) -> Result<SessionDescription, EngineError> {
        self.ensure_receive_transceivers(options).await?;
        let offer = self
            .pc
            .create_offer(Some(RTCOfferOptions {
                voice_activity_detection: options.voice_activity_detection,
                ice_restart: options.ice_restart,
            }))
            .await?;
        from_rtc_description(offer)
    }

    async fn create_answer(
        &self,
        options: &AnswerOptions,
    ) -> Result<SessionDescription, EngineError> {
        let answer = self
            .pc
            .create_answer(Some(RTCAnswerOptions {
                voice_activity_detection: options.voice_activity_detection,
            }))
            .await?;
        from_rtc_description(answer)
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        self.pc
            .set_local_description(to_rtc_description(description)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), EngineError> {
        self.pc
            .set_remote_description(to_rtc_description(description)?)
            .await?;
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.pc.remote_description().await.is_some()
    }

    async fn add_track(
        &self,
        track: Arc<LocalTrack>,
        stream_id: &str,
    ) -> Result<Self::Sender, EngineError> {
        let source = track
            .source()
            .cloned()
            .ok_or_else(|| EngineError::MissingSource(track.id().to_owned()))?;
        log::debug!("attaching {} track {} from stream {stream_id}", track.kind(), track.id());
        Ok(self.pc.add_track(source).await?)
    }

    async fn remove_track(&self, sender: &Self::Sender) -> Result<(), EngineError> {
        self.pc.remove_track(sender).await?;
        Ok(())
    }

    async fn replace_track(
        &self,
        sender: &Self::Sender,
        track: Option<Arc<LocalTrack>>,
    ) -> Result<(), EngineError> {
        let source = match track {
            Some(track) => Some(
                track
                    .source()
                    .cloned()
                    .ok_or_else(|| EngineError::MissingSource(track.id().to_owned()))?,
            ),
            None => None,
        };
        sender.replace_track(source).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        self.pc.add_ice_candidate(candidate.into()).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.pc.close().await?;
        Ok(())
    }
}

/// Builds a [`WebrtcEngine`] per session
#[derive(Debug, Clone, Copy, Default)]
pub struct WebrtcEngineFactory;

#[async_trait]
impl EngineFactory for WebrtcEngineFactory {
    type Engine = WebrtcEngine;

    async fn create(
        &self,
        config: &SessionConfig,
        events: EngineEventSink,
    ) -> Result<Self::Engine, EngineError> {
        WebrtcEngine::new(config, events).await
    }
}
