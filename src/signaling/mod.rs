//! Signaling payload shapes exchanged with the peer.
//!
//! Payloads are classified by shape, not by a type tag:
//! the literal `"ready"`, an object carrying `sdp`, or an object carrying
//! `candidate`, checked in that order.

pub mod router;
pub mod wire;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::peer::{IceCandidate, SdpType, SessionDescription};

pub use router::{Route, SignalRouter};

pub const READY: &str = "ready";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalPayload {
    /// Peer is connected and ready to negotiate
    Ready,
    Description(SessionDescription),
    Candidate(IceCandidate),
}

/// Payload that matched a shape but could not be read as it
#[derive(Debug, Error)]
pub enum MalformedSignal {
    #[error("session description with unsupported type {0:?}")]
    DescriptionType(String),
    #[error("unreadable ice candidate: {0}")]
    Candidate(#[source] serde_json::Error),
}

impl SignalPayload {
    /// `Ok(None)` for shapes that are not signaling payloads at all
    pub fn classify(value: &Value) -> Result<Option<Self>, MalformedSignal> {
        if value.as_str() == Some(READY) {
            return Ok(Some(SignalPayload::Ready));
        }

        let Some(object) = value.as_object() else {
            return Ok(None);
        };

        if let Some(sdp) = object.get("sdp").filter(|v| is_truthy(v)) {
            let raw_type = object.get("type").and_then(Value::as_str).unwrap_or_default();
            let sdp_type = SdpType::parse(raw_type)
                .ok_or_else(|| MalformedSignal::DescriptionType(raw_type.to_owned()))?;
            let sdp = match sdp {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(Some(SignalPayload::Description(SessionDescription { sdp_type, sdp })));
        }

        if let Some(candidate) = object.get("candidate").filter(|v| is_truthy(v)) {
            // browsers forward the whole icecandidate event: {candidate: {candidate, sdpMid, ...}}
            let source = if candidate.is_object() { candidate } else { value };
            let candidate = IceCandidate::deserialize(source).map_err(MalformedSignal::Candidate)?;
            return Ok(Some(SignalPayload::Candidate(candidate)));
        }

        Ok(None)
    }

    pub fn to_value(&self) -> Value {
        match self {
            SignalPayload::Ready => Value::String(READY.to_owned()),
            SignalPayload::Description(desc) => {
                serde_json::json!({ "type": desc.sdp_type, "sdp": desc.sdp })
            }
            SignalPayload::Candidate(candidate) => {
                serde_json::to_value(candidate).unwrap_or(Value::Null)
            }
        }
    }

    pub fn is_offer(&self) -> bool {
        matches!(self, SignalPayload::Description(desc) if desc.is_offer())
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, SignalPayload::Description(desc) if desc.sdp_type == SdpType::Answer)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl Serialize for SignalPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SignalPayload::Ready => serializer.serialize_str(READY),
            SignalPayload::Description(desc) => desc.serialize(serializer),
            SignalPayload::Candidate(candidate) => candidate.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SignalPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SignalPayload::classify(&value)
            .map_err(de::Error::custom)?
            .ok_or_else(|| de::Error::custom("unrecognized signaling payload"))
    }
}

impl From<SessionDescription> for SignalPayload {
    fn from(desc: SessionDescription) -> Self {
        SignalPayload::Description(desc)
    }
}

impl From<IceCandidate> for SignalPayload {
    fn from(candidate: IceCandidate) -> Self {
        SignalPayload::Candidate(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ready_literal() {
        assert_eq!(
            SignalPayload::classify(&json!("ready")).unwrap(),
            Some(SignalPayload::Ready)
        );
        assert_eq!(SignalPayload::classify(&json!("READY")).unwrap(), None);
        assert_eq!(serde_json::to_string(&SignalPayload::Ready).unwrap(), "\"ready\"");
    }

    #[test]
    fn sdp_wins_over_candidate() {
        let payload = SignalPayload::classify(&json!({
            "type": "offer",
            "sdp": "v=0",
            "candidate": "candidate:1 1 udp 1 10.0.0.1 9 typ host"
        }))
        .unwrap()
        .unwrap();
        assert!(payload.is_offer());
    }

    #[test]
    fn empty_sdp_falls_through() {
        let payload = SignalPayload::classify(&json!({
            "type": "offer",
            "sdp": "",
            "candidate": "candidate:1 1 udp 1 10.0.0.1 9 typ host",
            "sdpMid": "0"
        }))
        .unwrap();
        assert!(matches!(payload, Some(SignalPayload::Candidate(c)) if c.sdp_mid.as_deref() == Some("0")));
    }

    #[test]
    fn unknown_description_type_is_malformed() {
        let err = SignalPayload::classify(&json!({ "type": "bogus", "sdp": "v=0" })).unwrap_err();
        assert!(matches!(err, MalformedSignal::DescriptionType(t) if t == "bogus"));
    }

    #[test]
    fn nested_candidate_event() {
        let payload = SignalPayload::classify(&json!({
            "type": "icecandidate",
            "candidate": {
                "candidate": "candidate:2 1 udp 1 10.0.0.2 9 typ host",
                "sdpMid": "1",
                "sdpMLineIndex": 1
            }
        }))
        .unwrap()
        .unwrap();
        match payload {
            SignalPayload::Candidate(c) => {
                assert_eq!(c.sdp_mline_index, Some(1));
                assert!(c.candidate.ends_with("typ host"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_shapes_are_ignored() {
        for value in [json!(null), json!(42), json!("hello"), json!({}), json!({ "candidate": null }), json!([1, 2])] {
            assert_eq!(SignalPayload::classify(&value).unwrap(), None, "{value}");
        }
        assert!(serde_json::from_value::<SignalPayload>(json!({})).is_err());
    }

    #[test]
    fn outbound_shapes_parse_back() {
        let answer = SignalPayload::from(SessionDescription::answer("v=0\r\n"));
        let parsed: SignalPayload = serde_json::from_value(answer.to_value()).unwrap();
        assert!(parsed.is_answer());
        assert_eq!(parsed, answer);
    }
}
