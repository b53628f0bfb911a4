//! Wire codec.
//!
//! Payloads are self-describing JSON; the contract is the field set, not
//! the byte format. Framing is the broker's concern, so only the size
//! ceiling and serde plumbing live here. Decode failures are a distinct
//! error from transport failures: the bridge turns them into visible
//! diagnostic messages instead of dropping the event.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Maximum payload size (16 MB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// A payload that could not be encoded or decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload too large: {size} bytes (max {MAX_PAYLOAD_SIZE})")]
    TooLarge { size: usize },
}

/// Encodes a value to a JSON payload, enforcing the size ceiling.
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, DecodeError> {
    let data = serde_json::to_vec(value)?;
    if data.len() > MAX_PAYLOAD_SIZE {
        return Err(DecodeError::TooLarge { size: data.len() });
    }
    Ok(data)
}

/// Decodes a JSON payload, enforcing the size ceiling.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, DecodeError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(DecodeError::TooLarge {
            size: payload.len(),
        });
    }
    Ok(serde_json::from_slice(payload)?)
}
