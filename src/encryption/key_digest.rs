//! SHA-512 key derivation for box encryption

use sha2::Digest;
use sha2::Sha512;
use zeroize::Zeroize;
use zeroize::Zeroizing;

use super::CryptoError;

/// Size of the password digest in bytes.
pub const DIGEST_SIZE: usize = 64;

/// Size of the AES-256 key taken from the front of the digest.
pub const CIPHER_KEY_SIZE: usize = 32;

/// One-way digest of a box password, used directly as cipher key material.
///
/// The password itself is never retained. The digest is zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyDigest {
    digest: Zeroizing<[u8; DIGEST_SIZE]>,
}

impl std::fmt::Debug for KeyDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyDigest([REDACTED])")
    }
}

impl KeyDigest {
    /// Derive a key digest from a password.
    ///
    /// Blank passwords are rejected rather than hashed.
    pub fn derive(password: &str) -> Result<Self, CryptoError> {
        if password.is_empty() {
            return Err(CryptoError::EmptyPassword);
        }

        let mut hash = Sha512::digest(password.as_bytes());
        let mut digest = Zeroizing::new([0u8; DIGEST_SIZE]);
        digest.copy_from_slice(hash.as_slice());
        hash.as_mut_slice().zeroize();

        Ok(Self { digest })
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.digest
    }

    /// Key material for 256-bit ciphers.
    pub(crate) fn cipher_key(&self) -> &[u8] {
        &self.digest[..CIPHER_KEY_SIZE]
    }
}
