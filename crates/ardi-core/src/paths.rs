//! On-disk locations of a project
//!
//! A project is rooted at a single directory:
//! ```text
//! [project]/
//! ├── ardi.json                 # Project config
//! └── .ardi/                    # Toolchain data directory
//!     ├── arduino-cli.yaml      # Toolchain config
//!     ├── packages/             # Platforms (managed by toolchain)
//!     ├── Arduino/libraries/    # Libraries (managed by toolchain)
//!     └── staging/              # Downloads (managed by toolchain)
//! ```

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{ArdiError, Result};

/// Project config file name
pub const PROJECT_CONFIG_FILE: &str = "ardi.json";

/// Data directory name
pub const DATA_DIR: &str = ".ardi";

/// Toolchain config file name, inside the data directory
pub const TOOLCHAIN_CONFIG_FILE: &str = "arduino-cli.yaml";

/// Absolute paths of the files that make up a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    root: PathBuf,
    project_config: PathBuf,
    data_dir: PathBuf,
    toolchain_config: PathBuf,
}

impl ProjectPaths {
    /// Resolve paths for the current working directory
    pub fn from_cwd() -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| ArdiError::io(".", e))?;
        Ok(Self::from_absolute(cwd))
    }

    /// Resolve paths for a project rooted at `root`
    ///
    /// Relative roots are resolved against the current working directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if root.is_absolute() {
            return Ok(Self::from_absolute(root.to_path_buf()));
        }
        let cwd = env::current_dir().map_err(|e| ArdiError::io(root, e))?;
        Ok(Self::from_absolute(cwd.join(root)))
    }

    fn from_absolute(root: PathBuf) -> Self {
        let data_dir = root.join(DATA_DIR);
        Self {
            project_config: root.join(PROJECT_CONFIG_FILE),
            toolchain_config: data_dir.join(TOOLCHAIN_CONFIG_FILE),
            data_dir,
            root,
        }
    }

    /// Project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/ardi.json`
    pub fn project_config(&self) -> &Path {
        &self.project_config
    }

    /// `<root>/.ardi`
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `<root>/.ardi/arduino-cli.yaml`
    pub fn toolchain_config(&self) -> &Path {
        &self.toolchain_config
    }

    /// `<root>/.ardi/staging`
    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("staging")
    }

    /// `<root>/.ardi/Arduino`
    pub fn user_dir(&self) -> PathBuf {
        self.data_dir.join("Arduino")
    }

    /// Whether the root is an ardi project (presence of `ardi.json` only)
    pub fn is_project(&self) -> bool {
        self.project_config.is_file()
    }

    /// Fail with `NotAProject` unless the root holds an `ardi.json`
    pub fn require_project(&self) -> Result<()> {
        if self.is_project() {
            Ok(())
        } else {
            Err(ArdiError::NotAProject(self.root.clone()))
        }
    }
}
