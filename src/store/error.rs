//! provides error types related to box operations.

use std::path::PathBuf;

use tracing::error;
use tracing::warn;

use crate::encryption::CryptoError;
use crate::models::value::ValueType;

/// How loudly an error is reported on the diagnostic channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// enumerates possible box errors
///
/// Apart from [`BoxError::MissingName`], which prevents a box from being
/// constructed at all, every error leaves the box usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum BoxError {
    #[error("box name cannot be empty")]
    MissingName,

    #[error("missing key: {0}")]
    MissingKey(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("key did not verify: {0}")]
    DecryptFailure(String),

    #[error("malformed box data: {0}")]
    DecodeFailure(String),

    #[error("could not write {}: {reason}", path.display())]
    WriteFailure { path: PathBuf, reason: String },

    #[error("could not read {}: {reason}", path.display())]
    ReadFailure { path: PathBuf, reason: String },

    #[error("value of '{key}' is a {found}, not a number")]
    TypeMismatch { key: String, found: ValueType },

    #[error("key '{0}' is not set")]
    NotFound(String),

    #[error("box '{0}' has been destroyed")]
    UseAfterDestroy(String),
}

impl BoxError {
    pub fn severity(&self) -> Severity {
        match self {
            BoxError::InvalidInput(_) | BoxError::TypeMismatch { .. } | BoxError::NotFound(_) => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }

    /// Emit this error on the diagnostic channel at its severity.
    pub fn report(&self) {
        match self.severity() {
            Severity::Warning => warn!("{}", self),
            Severity::Error => error!("{}", self),
        }
    }
}

// an empty password is invalid input at the crypto layer. construction
// reports it as MissingKey instead, see `CryptBox::construct`.
impl From<CryptoError> for BoxError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::EmptyPassword => Self::InvalidInput(e.to_string()),
            CryptoError::MissingKey => Self::MissingKey(e.to_string()),
            CryptoError::Transport(_) => Self::DecodeFailure(e.to_string()),
            CryptoError::DecryptionFailed(_) | CryptoError::InvalidCiphertext(_) => {
                Self::DecryptFailure(e.to_string())
            }
            _ => Self::InvalidInput(e.to_string()),
        }
    }
}

pub type BoxResult<T> = Result<T, BoxError>;
