//! Base64 armour for encrypted payloads, so box files are plain text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::CryptoError;

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Surrounding whitespace (e.g. a trailing newline added by an editor) is
/// ignored.
pub fn decode(text: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(STANDARD.decode(text.trim())?)
}
