//! Box metadata, persisted in-band under [`HEADER_KEY`].

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::timestamp::Timestamp;

/// Reserved mapping key holding the serialized [`Header`].
pub const HEADER_KEY: &str = "_header";

/// Current on-disk format version.
pub const HEADER_VERSION: u32 = 1;

/// Why a stored header was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum HeaderError {
    #[error("malformed header: {0}")]
    Malformed(String),

    #[error("unsupported box format version {found} (newest known is {newest})")]
    UnsupportedVersion { found: u32, newest: u32 },
}

/// Timestamps and format version of a box.
///
/// `created` is fixed when the header is first made. Every other timestamp
/// only moves forward, see [`Timestamp::now_after`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    created: Timestamp,
    #[serde(default)]
    saved: Option<Timestamp>,
    #[serde(default)]
    loaded: Option<Timestamp>,
    #[serde(default)]
    accessed: Option<Timestamp>,
    #[serde(default)]
    modified: Option<Timestamp>,
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

impl Header {
    pub fn new() -> Self {
        Self {
            version: HEADER_VERSION,
            created: Timestamp::now(),
            saved: None,
            loaded: None,
            accessed: None,
            modified: None,
        }
    }

    pub fn created(&self) -> Timestamp {
        self.created
    }

    pub fn saved(&self) -> Option<Timestamp> {
        self.saved
    }

    pub fn loaded(&self) -> Option<Timestamp> {
        self.loaded
    }

    pub fn accessed(&self) -> Option<Timestamp> {
        self.accessed
    }

    pub fn modified(&self) -> Option<Timestamp> {
        self.modified
    }

    pub(crate) fn mark_saved(&mut self) {
        self.saved = Some(Timestamp::now_after(self.saved));
    }

    pub(crate) fn mark_loaded(&mut self) {
        self.loaded = Some(Timestamp::now_after(self.loaded));
    }

    pub(crate) fn mark_accessed(&mut self) {
        self.accessed = Some(Timestamp::now_after(self.accessed));
    }

    pub(crate) fn mark_modified(&mut self) {
        self.modified = Some(Timestamp::now_after(self.modified));
    }

    /// Carry over every timestamp of `other` that is newer than ours.
    /// `created` and `version` stay as they are.
    pub(crate) fn absorb_newer(&mut self, other: &Header) {
        self.saved = self.saved.max(other.saved);
        self.loaded = self.loaded.max(other.loaded);
        self.accessed = self.accessed.max(other.accessed);
        self.modified = self.modified.max(other.modified);
    }

    /// Serialized form, as stored under [`HEADER_KEY`].
    pub fn to_value(&self) -> Value {
        // a struct of integers and options always serializes
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Parse a header read from a decoded mapping.
    pub fn from_value(value: Value) -> Result<Self, HeaderError> {
        let header: Header =
            serde_json::from_value(value).map_err(|e| HeaderError::Malformed(e.to_string()))?;
        if header.version > HEADER_VERSION {
            return Err(HeaderError::UnsupportedVersion {
                found: header.version,
                newest: HEADER_VERSION,
            });
        }
        Ok(header)
    }
}
