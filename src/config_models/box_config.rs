use std::path::PathBuf;

use tracing::info;
use zeroize::Zeroizing;

use super::cli_args;
use super::data_directory::DataDirectory;
use super::data_directory::BOX_FILE_EXTENSION;
use crate::encryption::Algorithm;
use crate::store::BoxError;
use crate::store::BoxResult;

/// Construction parameters of a [`CryptBox`](crate::store::CryptBox).
///
/// Built with [`BoxConfig::new`] and refined with the self-consuming helpers.
/// Often downstream from CLI arguments, see [`BoxConfig::absorb_options`].
#[derive(Clone)]
pub struct BoxConfig {
    pub(crate) name: String,

    /// Password, if known at construction. It can also be supplied on load.
    pub(crate) key: Option<Zeroizing<String>>,

    pub(crate) algorithm: Algorithm,

    /// Where the box file is stored
    pub(crate) directory: PathBuf,

    pub(crate) extension: String,
}

impl std::fmt::Debug for BoxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxConfig")
            .field("name", &self.name)
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("algorithm", &self.algorithm)
            .field("directory", &self.directory)
            .field("extension", &self.extension)
            .finish()
    }
}

impl BoxConfig {
    /// A box called `name` in `data_dir`, keyless, with the default algorithm.
    pub fn new(name: impl Into<String>, data_dir: &DataDirectory) -> Self {
        Self {
            name: name.into(),
            key: None,
            algorithm: Algorithm::default(),
            directory: data_dir.root_dir_path(),
            extension: BOX_FILE_EXTENSION.to_string(),
        }
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = Some(Zeroizing::new(key.to_string()));
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// [`BoxConfig::with_algorithm`] from an identifier such as `"aes-256-ecb"`.
    pub fn with_algorithm_name(self, identifier: &str) -> BoxResult<Self> {
        let algorithm = identifier.parse::<Algorithm>().map_err(|_| {
            BoxError::InvalidInput(format!("unknown algorithm '{}'", identifier))
        })?;
        Ok(self.with_algorithm(algorithm))
    }

    pub fn in_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Self-consuming constructor-helper for [`BoxConfig`].
    ///
    /// Extract those configuration options from the CLI arguments that are
    /// relevant for opening a box.
    pub fn absorb_options(mut self, cli_args: &cli_args::Args) -> Self {
        self.name = cli_args.name.clone();
        self.algorithm = cli_args.algorithm;
        if let Some(password) = cli_args.resolve_password() {
            self.key = Some(password);
        } else {
            info!("No password given; box '{}' must be unlocked on load.", self.name);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref().map(String::as_str)
    }

    pub fn file_name(&self) -> String {
        DataDirectory::box_file_name(&self.name, &self.extension)
    }

    pub fn file_path(&self) -> PathBuf {
        self.directory.join(self.file_name())
    }
}
