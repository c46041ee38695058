use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use directories::ProjectDirs;

/// Extension of box files.
pub const BOX_FILE_EXTENSION: &str = "crypt";

/// Application-private directory holding box files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirectory {
    data_dir: PathBuf,
}

impl DataDirectory {
    ///////////////////////////////////////////////////////////////////////////
    ///
    /// The data directory that contains box files
    ///
    /// The default varies by operating system, e.g.
    ///
    /// - Linux:   /home/alice/.local/share/cryptbox
    /// - Windows: C:\Users\Alice\AppData\Roaming\cryptbox\cryptbox\data
    /// - macOS:   /Users/Alice/Library/Application Support/org.cryptbox.cryptbox
    ///
    /// An explicit `root_dir` is used as-is.
    pub fn get(root_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match root_dir {
            Some(dir) => dir,
            None => ProjectDirs::from("org", "cryptbox", "cryptbox")
                .context("Could not determine data directory")?
                .data_dir()
                .to_path_buf(),
        };

        Ok(DataDirectory { data_dir })
    }

    /// Create directory if it does not exist
    pub fn create_dir_if_not_exists(dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create data directory {}", dir.to_string_lossy()))
    }

    /// Create the parent directory of `file_path` if it does not exist
    pub fn ensure_parent_dir_exists(file_path: &Path) -> Result<()> {
        let parent_dir = file_path
            .parent()
            .with_context(|| format!("The parent directory of {:?}", file_path))?;
        Self::create_dir_if_not_exists(parent_dir)
    }

    /// The root data directory path
    pub fn root_dir_path(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// File name of the box called `name`.
    pub fn box_file_name(name: &str, extension: &str) -> String {
        format!("{name}.{extension}")
    }

    /// The file path of the box called `name`.
    ///
    /// This file lives within `DataDirectory::root_dir_path()`.
    pub fn box_file_path(&self, name: &str) -> PathBuf {
        self.data_dir
            .join(Self::box_file_name(name, BOX_FILE_EXTENSION))
    }
}

impl std::fmt::Display for DataDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.data_dir.display())
    }
}
