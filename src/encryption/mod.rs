//! Box encryption pipeline: SHA-512 key digest + AES-256 + base64
//!
//! ## Architecture
//!
//! ```text
//! User Password (UTF-8)
//!     ↓ SHA-512
//! Key Digest (512 bits, first 256 bits are the AES key)
//!     ↓ AES-256-GCM (default) or AES-256-ECB (legacy) or identity
//! Ciphertext
//!     ↓ base64
//! Box File
//! ```
//!
//! The stages are exposed separately so the store can compose them and so
//! [`seal`] / [`open`] can be used on their own.

pub use cipher::Algorithm;
pub use cipher::CipherEngine;
pub use cipher::IdentityEngine;
#[cfg(feature = "crypto")]
pub use cipher::{AesEcbEngine, AesGcmEngine};
pub use key_digest::KeyDigest;

pub mod cipher;
pub mod key_digest;
pub mod transport;


/// Errors of the key derivation, cipher and transport stages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CryptoError {
    #[error("password cannot be empty")]
    EmptyPassword,

    #[error("a key is required for this algorithm")]
    MissingKey,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("invalid ciphertext format: {0}")]
    InvalidCiphertext(String),

    #[error("base64 decode error: {0}")]
    Transport(String),
}

impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::Transport(err.to_string())
    }
}

/// Encrypt and armour a payload.
pub fn seal(
    plaintext: &[u8],
    key: Option<&KeyDigest>,
    engine: &dyn CipherEngine,
) -> Result<String, CryptoError> {
    let ciphertext = engine.encrypt(plaintext, key)?;
    Ok(transport::encode(&ciphertext))
}

/// Undo [`seal`].
pub fn open(
    text: &str,
    key: Option<&KeyDigest>,
    engine: &dyn CipherEngine,
) -> Result<Vec<u8>, CryptoError> {
    let ciphertext = transport::decode(text)?;
    engine.decrypt(&ciphertext, key)
}
