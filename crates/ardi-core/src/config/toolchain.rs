//! `arduino-cli.yaml` handle

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::types::{Daemon, Directories, Logging, Metrics, ToolchainSettings};
use super::{read_config, write_atomic};
use crate::error::{ArdiError, Result};
use crate::paths::ProjectPaths;

/// Port the toolchain daemon listens on when started
const DEFAULT_DAEMON_PORT: &str = "50051";

/// Metrics endpoint, disabled by default
const DEFAULT_METRICS_ADDR: &str = ":9090";

/// Owner of the toolchain's YAML settings
///
/// Mutators take `&self` and serialize on an internal lock, so helpers
/// sharing one handle cannot interleave their writes.
#[derive(Debug)]
pub struct ToolchainConfig {
    path: PathBuf,
    settings: Mutex<ToolchainSettings>,
}

impl ToolchainConfig {
    /// Load an existing `arduino-cli.yaml`
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = read_config(&path)?;

        let settings = if raw.trim().is_empty() {
            ToolchainSettings::default()
        } else {
            serde_yaml::from_str(&raw).map_err(|e| ArdiError::ConfigParse {
                path: path.clone(),
                message: e.to_string(),
            })?
        };

        debug!(path = %path.display(), "Loaded toolchain config");
        Ok(Self {
            path,
            settings: Mutex::new(settings),
        })
    }

    /// Settings a fresh project starts with; every directory lives under `.ardi`
    pub fn default_settings(paths: &ProjectPaths) -> ToolchainSettings {
        ToolchainSettings {
            daemon: Daemon {
                port: DEFAULT_DAEMON_PORT.to_string(),
                ..Daemon::default()
            },
            directories: Directories {
                data: paths.data_dir().to_string_lossy().into_owned(),
                downloads: paths.downloads_dir().to_string_lossy().into_owned(),
                user: paths.user_dir().to_string_lossy().into_owned(),
                ..Directories::default()
            },
            logging: Logging {
                format: "text".to_string(),
                level: "info".to_string(),
                ..Logging::default()
            },
            metrics: Metrics {
                addr: DEFAULT_METRICS_ADDR.to_string(),
                enabled: Some(false),
                ..Metrics::default()
            },
            ..ToolchainSettings::default()
        }
    }

    /// Write the default settings for `paths`, replacing whatever is there
    pub fn create_default(paths: &ProjectPaths) -> Result<Self> {
        Self::create_with_urls(paths, &[])
    }

    /// Write the default settings with `urls` as the additional board URLs
    ///
    /// Used when the data directory is rebuilt for a project that already
    /// declares board URLs.
    pub fn create_with_urls(paths: &ProjectPaths, urls: &[String]) -> Result<Self> {
        let mut settings = Self::default_settings(paths);
        settings.board_manager.additional_urls = urls.to_vec();

        let config = Self {
            path: paths.toolchain_config().to_path_buf(),
            settings: Mutex::new(settings),
        };
        config.save(&config.lock())?;
        Ok(config)
    }

    /// Location of `arduino-cli.yaml`
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current settings
    pub fn settings(&self) -> ToolchainSettings {
        self.lock().clone()
    }

    /// `board_manager.additional_urls`
    pub fn board_urls(&self) -> Vec<String> {
        self.lock().board_manager.additional_urls.clone()
    }

    /// Append `url` unless already present
    pub fn add_board_url(&self, url: &str) -> Result<()> {
        self.update(|settings| {
            let urls = &mut settings.board_manager.additional_urls;
            if urls.iter().any(|u| u == url) {
                debug!(url, "Board url already in toolchain config");
                return false;
            }
            urls.push(url.to_string());
            true
        })
    }

    /// Remove `url` if present
    pub fn remove_board_url(&self, url: &str) -> Result<()> {
        self.update(|settings| {
            let urls = &mut settings.board_manager.additional_urls;
            let before = urls.len();
            urls.retain(|u| u != url);
            urls.len() != before
        })
    }

    /// Apply `change` to a copy, persist it, then publish it
    ///
    /// `change` returns false when nothing changed. The lock is held
    /// throughout, and a failed write leaves the handle untouched.
    fn update(&self, change: impl FnOnce(&mut ToolchainSettings) -> bool) -> Result<()> {
        let mut settings = self.lock();
        let mut next = settings.clone();
        if !change(&mut next) {
            return Ok(());
        }
        self.save(&next)?;
        *settings = next;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ToolchainSettings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self, settings: &ToolchainSettings) -> Result<()> {
        let data = serde_yaml::to_string(settings).map_err(|e| ArdiError::ConfigParse {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        write_atomic(&self.path, data.as_bytes())
    }
}
