//! An encrypted, persistent key-value box.
//!
//! ```text
//! CryptBox ──► codec (JSON + header) ──► encryption (AES-256 + base64) ──► <name>.crypt
//! ```
//!
//! See [`store::CryptBox`] for the operations and [`config_models`] for how
//! a box is configured.

pub mod codec;
pub mod config_models;
pub mod encryption;
pub mod models;
pub mod store;

pub use config_models::box_config::BoxConfig;
pub use config_models::data_directory::DataDirectory;
pub use encryption::Algorithm;
pub use models::header::Header;
pub use models::value::ValueMap;
pub use models::value::ValueType;
pub use store::lifecycle::LifecycleEvent;
pub use store::lifecycle::LifecycleHost;
pub use store::lifecycle::LifecycleHub;
pub use store::BoxError;
pub use store::BoxState;
pub use store::CryptBox;
pub use store::LoadOutcome;
