//! Symmetric ciphers for box payloads
//!
//! Every engine implements [`CipherEngine`]. Which one a box uses is decided
//! once, at construction, from its [`Algorithm`].

#[cfg(feature = "crypto")]
use aes::cipher::generic_array::GenericArray;
#[cfg(feature = "crypto")]
use aes::cipher::BlockDecrypt;
#[cfg(feature = "crypto")]
use aes::cipher::BlockEncrypt;
#[cfg(feature = "crypto")]
use aes::Aes256;
#[cfg(feature = "crypto")]
use aes_gcm::aead::Aead;
#[cfg(feature = "crypto")]
use aes_gcm::aead::KeyInit;
#[cfg(feature = "crypto")]
use aes_gcm::Aes256Gcm;
#[cfg(feature = "crypto")]
use aes_gcm::Nonce;
#[cfg(feature = "crypto")]
use rand::Rng;

use super::key_digest::KeyDigest;
use super::CryptoError;

/// Identifies a cipher and mode. Parsed from and displayed as the identifier
/// strings used in configuration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString,
)]
pub enum Algorithm {
    /// AES-256-GCM with a random nonce stored in front of the ciphertext.
    #[default]
    #[strum(serialize = "aes-256-gcm")]
    Aes256Gcm,

    /// AES-256 in ECB mode with PKCS#7 padding and no IV.
    ///
    /// Kept for reading and writing files made by older boxes. Identical
    /// plaintext blocks produce identical ciphertext blocks, and nothing
    /// detects tampering.
    #[strum(serialize = "aes-256-ecb")]
    Aes256Ecb,

    /// No encryption.
    #[strum(serialize = "none")]
    Identity,
}

impl Algorithm {
    /// Whether this build carries a backend for the algorithm.
    pub fn is_available(self) -> bool {
        match self {
            Algorithm::Identity => true,
            Algorithm::Aes256Gcm | Algorithm::Aes256Ecb => cfg!(feature = "crypto"),
        }
    }

    /// The engine implementing this algorithm, or the identity engine when
    /// no backend is compiled in.
    pub fn engine(self) -> Box<dyn CipherEngine> {
        match self {
            #[cfg(feature = "crypto")]
            Algorithm::Aes256Gcm => Box::new(AesGcmEngine),
            #[cfg(feature = "crypto")]
            Algorithm::Aes256Ecb => Box::new(AesEcbEngine),
            _ => Box::new(IdentityEngine),
        }
    }
}

/// Encrypts and decrypts whole payloads.
pub trait CipherEngine: Send + Sync + std::fmt::Debug {
    /// Encrypt a payload. Keyed engines fail with [`CryptoError::MissingKey`]
    /// when `key` is `None`.
    fn encrypt(&self, plaintext: &[u8], key: Option<&KeyDigest>) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt a payload. A wrong key yields an error, never a panic.
    fn decrypt(&self, ciphertext: &[u8], key: Option<&KeyDigest>)
        -> Result<Vec<u8>, CryptoError>;

    /// The algorithm actually applied.
    fn algorithm(&self) -> Algorithm;

    fn requires_key(&self) -> bool {
        true
    }
}

/// Encrypt `plaintext` under `algorithm`.
pub fn encrypt(
    plaintext: &[u8],
    key: Option<&KeyDigest>,
    algorithm: Algorithm,
) -> Result<Vec<u8>, CryptoError> {
    algorithm.engine().encrypt(plaintext, key)
}

/// Decrypt `ciphertext` under `algorithm`.
pub fn decrypt(
    ciphertext: &[u8],
    key: Option<&KeyDigest>,
    algorithm: Algorithm,
) -> Result<Vec<u8>, CryptoError> {
    algorithm.engine().decrypt(ciphertext, key)
}

/// Pass-through engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityEngine;

impl CipherEngine for IdentityEngine {
    fn encrypt(&self, plaintext: &[u8], _key: Option<&KeyDigest>) -> Result<Vec<u8>, CryptoError> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        _key: Option<&KeyDigest>,
    ) -> Result<Vec<u8>, CryptoError> {
        Ok(ciphertext.to_vec())
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Identity
    }

    fn requires_key(&self) -> bool {
        false
    }
}

/// AES-256-GCM authenticated encryption.
///
/// # Ciphertext Format
///
/// ```text
/// [nonce: 12 bytes][ciphertext + tag: variable]
/// ```
#[cfg(feature = "crypto")]
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmEngine;

#[cfg(feature = "crypto")]
impl AesGcmEngine {
    pub const NONCE_SIZE: usize = 12;
    pub const TAG_SIZE: usize = 16;

    fn cipher(key: Option<&KeyDigest>) -> Result<Aes256Gcm, CryptoError> {
        let key = key.ok_or(CryptoError::MissingKey)?;
        Aes256Gcm::new_from_slice(key.cipher_key())
            .map_err(|e| CryptoError::EncryptionFailed(format!("Invalid AES key: {}", e)))
    }

    /// Generate random 96-bit nonce
    pub fn generate_nonce() -> [u8; 12] {
        let mut nonce = [0u8; 12];
        rand::rng().fill(&mut nonce);
        nonce
    }
}

#[cfg(feature = "crypto")]
impl CipherEngine for AesGcmEngine {
    fn encrypt(&self, plaintext: &[u8], key: Option<&KeyDigest>) -> Result<Vec<u8>, CryptoError> {
        let cipher = Self::cipher(key)?;
        let nonce_bytes = Self::generate_nonce();

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let mut result = Vec::with_capacity(Self::NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: Option<&KeyDigest>,
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Self::cipher(key)?;
        if ciphertext.len() < Self::NONCE_SIZE + Self::TAG_SIZE {
            return Err(CryptoError::InvalidCiphertext(
                "ciphertext too short".to_string(),
            ));
        }

        let (nonce_bytes, encrypted) = ciphertext.split_at(Self::NONCE_SIZE);
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), encrypted)
            .map_err(|e| {
                CryptoError::DecryptionFailed(format!(
                    "wrong password or corrupted data: {}",
                    e
                ))
            })
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Aes256Gcm
    }
}

/// AES-256-ECB with PKCS#7 padding. See [`Algorithm::Aes256Ecb`].
#[cfg(feature = "crypto")]
#[derive(Debug, Clone, Copy, Default)]
pub struct AesEcbEngine;

#[cfg(feature = "crypto")]
impl AesEcbEngine {
    pub const BLOCK_SIZE: usize = 16;

    fn cipher(key: Option<&KeyDigest>) -> Result<Aes256, CryptoError> {
        let key = key.ok_or(CryptoError::MissingKey)?;
        Aes256::new_from_slice(key.cipher_key())
            .map_err(|e| CryptoError::EncryptionFailed(format!("Invalid AES key: {}", e)))
    }
}

#[cfg(feature = "crypto")]
impl CipherEngine for AesEcbEngine {
    fn encrypt(&self, plaintext: &[u8], key: Option<&KeyDigest>) -> Result<Vec<u8>, CryptoError> {
        let cipher = Self::cipher(key)?;

        // pkcs#7: always 1..=16 bytes of padding, each holding the pad length
        let pad_len = Self::BLOCK_SIZE - plaintext.len() % Self::BLOCK_SIZE;
        let mut buffer = Vec::with_capacity(plaintext.len() + pad_len);
        buffer.extend_from_slice(plaintext);
        buffer.resize(plaintext.len() + pad_len, pad_len as u8);

        for block in buffer.chunks_exact_mut(Self::BLOCK_SIZE) {
            cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }
        Ok(buffer)
    }

    fn decrypt(
        &self,
        ciphertext: &[u8],
        key: Option<&KeyDigest>,
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Self::cipher(key)?;
        if ciphertext.is_empty() || ciphertext.len() % Self::BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidCiphertext(format!(
                "length {} is not a positive multiple of the block size",
                ciphertext.len()
            )));
        }

        let mut buffer = ciphertext.to_vec();
        for block in buffer.chunks_exact_mut(Self::BLOCK_SIZE) {
            cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }

        let pad_len = usize::from(buffer[buffer.len() - 1]);
        let padding_ok = (1..=Self::BLOCK_SIZE).contains(&pad_len)
            && buffer[buffer.len() - pad_len..]
                .iter()
                .all(|&b| usize::from(b) == pad_len);
        if !padding_ok {
            return Err(CryptoError::DecryptionFailed(
                "bad padding (wrong password or corrupted data)".to_string(),
            ));
        }

        buffer.truncate(buffer.len() - pad_len);
        Ok(buffer)
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::Aes256Ecb
    }
}
