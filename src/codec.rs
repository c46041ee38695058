//! Canonical JSON encoding of a box's mapping.
//!
//! The encoded document is a single JSON object: user keys plus the header
//! under [`HEADER_KEY`]. Keys are emitted in sorted order, so equal mappings
//! always encode to equal bytes.

use serde_json::Value;
use tracing::warn;

use crate::models::header::Header;
use crate::models::header::HeaderError;
use crate::models::header::HEADER_KEY;
use crate::models::value::ValueMap;

/// Why a payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Syntax(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("invalid header: {0}")]
    Header(#[from] HeaderError),
}

/// Serialize a mapping.
pub fn encode(mapping: &ValueMap) -> Vec<u8> {
    // string keys and json values cannot fail to serialize
    serde_json::to_vec(mapping).unwrap_or_default()
}

/// Parse a mapping. Either the whole payload parses or nothing is returned.
pub fn decode(bytes: &[u8]) -> Result<ValueMap, DecodeError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Syntax(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(DecodeError::NotAnObject),
    }
}

/// Encode user data together with its header.
pub fn encode_with_header(data: &ValueMap, header: &Header) -> Vec<u8> {
    let mut mapping = data.clone();
    mapping.insert(HEADER_KEY.to_string(), header.to_value());
    encode(&mapping)
}

/// Decode a payload and split off its header.
///
/// A payload without a header is accepted and given a fresh one.
pub fn decode_with_header(bytes: &[u8]) -> Result<(ValueMap, Header), DecodeError> {
    let mut mapping = decode(bytes)?;
    let header = match mapping.remove(HEADER_KEY) {
        Some(value) => Header::from_value(value)?,
        None => {
            warn!("Decoded box has no {} entry; starting a fresh header", HEADER_KEY);
            Header::new()
        }
    };
    Ok((mapping, header))
}
