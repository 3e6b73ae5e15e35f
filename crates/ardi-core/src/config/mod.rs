//! Config Files
//!
//! Typed handles over the two files a project keeps on disk:
//! - `ardi.json`: what the project declares (platforms, libraries, board
//!   URLs, builds)
//! - `.ardi/arduino-cli.yaml`: the toolchain's own settings, of which only
//!   `board_manager.additional_urls` is mutated after init
//!
//! Each mutation rewrites the whole file atomically (temp file + rename).

mod project;
mod toolchain;
pub mod types;

pub use project::ProjectConfig;
pub use toolchain::ToolchainConfig;
pub use types::{ArdiBuild, ArdiConfig, ToolchainSettings};

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{ArdiError, Result};

/// Read a config file, mapping "not found" to `ConfigMissing`
pub(crate) fn read_config(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ArdiError::ConfigMissing(path.to_path_buf()),
        _ => ArdiError::io(path, e),
    })
}

/// Replace `path` with `contents` so readers see either the old or the new file
///
/// An existing file keeps its permissions; new files get the usual `0644`.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ArdiError::io(dir, e))?;
    if let Some(permissions) = target_permissions(path) {
        tmp.as_file()
            .set_permissions(permissions)
            .map_err(|e| ArdiError::io(tmp.path(), e))?;
    }
    tmp.write_all(contents)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ArdiError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| ArdiError::io(path, e.error))?;

    Ok(())
}

fn target_permissions(path: &Path) -> Option<fs::Permissions> {
    match fs::metadata(path) {
        Ok(existing) => Some(existing.permissions()),
        Err(_) => new_file_permissions(),
    }
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}
