use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use tracing::warn;
use zeroize::Zeroizing;

use crate::encryption::Algorithm;

/// Environment variable for the box password (INSECURE - only for testing/automation)
pub const BOX_PASSWORD_ENV_VAR: &str = "CRYPTBOX_PASSWORD";

/// Decalarative specification of command-line arguments
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct Args {
    /// Directory holding box files. Defaults to the platform data directory.
    #[clap(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Name of the box. Its file is `<name>.crypt`.
    #[clap(long, short, default_value = "default")]
    pub name: String,

    /// Cipher and mode: `aes-256-gcm`, `aes-256-ecb` (legacy) or `none`.
    #[clap(long, default_value = "aes-256-gcm")]
    pub algorithm: Algorithm,

    /// Box password. Visible in the process list; prefer the
    /// CRYPTBOX_PASSWORD environment variable.
    #[clap(long)]
    pub password: Option<String>,

    /// What to do with the box. Prints its contents if omitted.
    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the value stored under a key.
    Get { key: String },

    /// Store a value. The value is parsed as JSON, falling back to a string.
    Set { key: String, value: String },

    /// Remove a key.
    Unset { key: String },

    /// Add to a numeric value.
    Increment {
        key: String,
        #[clap(default_value = "1", allow_negative_numbers = true)]
        amount: i64,
    },

    /// Subtract from a numeric value.
    Decrement {
        key: String,
        #[clap(default_value = "1", allow_negative_numbers = true)]
        amount: i64,
    },

    /// Check the password against the box file without loading it.
    Verify,

    /// Print the box header.
    Header,

    /// Print every key and value.
    Dump,

    /// Remove all values, keeping the file.
    Clear,

    /// Remove all values and delete the file.
    Wipe,
}

impl Args {
    /// Get password from the best available source
    ///
    /// Priority order:
    /// 1. CLI argument (if provided)
    /// 2. Environment variable (if set)
    /// 3. None; the box stays locked, or unencrypted with `--algorithm none`
    pub fn resolve_password(&self) -> Option<Zeroizing<String>> {
        if let Some(password) = &self.password {
            warn!("Using password from CLI argument (INSECURE! Visible in process list)");
            return Some(Zeroizing::new(password.clone()));
        }

        if let Ok(env_password) = std::env::var(BOX_PASSWORD_ENV_VAR) {
            warn!(
                "Using password from environment variable {} (INSECURE!)",
                BOX_PASSWORD_ENV_VAR
            );
            return Some(Zeroizing::new(env_password));
        }

        None
    }
}

impl Default for Args {
    fn default() -> Self {
        let empty: Vec<String> = vec![];
        Self::parse_from(empty)
    }
}
