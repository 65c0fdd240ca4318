//! Compact text form of a signaling payload for copy/paste or QR transports:
//! JSON envelope, gzip, base64.

use std::io::{Read, Write};

use base64::{engine::general_purpose, Engine as _};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::SignalPayload;

/// Upper bound for decompressed envelopes, guards against zip bombs
pub const MAX_DECOMPRESSED_SIZE: u64 = 256 * 1024;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub payload: SignalPayload,
    /// Id of the sending session
    pub id: String,
    pub ts: i64,
}

impl Envelope {
    pub fn new(payload: SignalPayload, id: impl Into<String>) -> Self {
        Self {
            payload,
            id: id.into(),
            ts: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("compression failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("envelope exceeds {MAX_DECOMPRESSED_SIZE} bytes once decompressed")]
    TooLarge,
}

pub fn encode(envelope: &Envelope) -> Result<String, WireError> {
    let json = serde_json::to_vec(envelope)?;

    let mut gz = GzEncoder::new(Vec::new(), Compression::fast());
    gz.write_all(&json)?;
    let compressed = gz.finish()?;

    Ok(general_purpose::STANDARD.encode(compressed))
}

pub fn decode(encoded: &str) -> Result<Envelope, WireError> {
    let compressed = general_purpose::STANDARD.decode(encoded.trim())?;

    let mut json = Vec::new();
    GzDecoder::new(&compressed[..])
        .take(MAX_DECOMPRESSED_SIZE + 1)
        .read_to_end(&mut json)?;
    if json.len() as u64 > MAX_DECOMPRESSED_SIZE {
        return Err(WireError::TooLarge);
    }

    Ok(serde_json::from_slice(&json)?)
}
