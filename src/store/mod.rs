//! The box itself: a named, encrypted key-value store persisted to one file.
//!
//! A [`CryptBox`] keeps its data in memory and reads or writes the whole
//! file at once. The key `_header` is reserved for the
//! [`Header`](crate::models::header::Header) metadata written alongside the
//! data.

mod crypt_box;
pub mod error;
pub mod lifecycle;

pub use crypt_box::BoxState;
pub use crypt_box::CryptBox;
pub use crypt_box::LoadOutcome;
pub use error::BoxError;
pub use error::BoxResult;
pub use error::Severity;
