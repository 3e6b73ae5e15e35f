//! Project initialization and cleanup

use std::fs;
use std::io;

use tracing::{debug, info};

use crate::config::{ProjectConfig, ToolchainConfig};
use crate::error::{ArdiError, Result};
use crate::paths::ProjectPaths;

/// What `init` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// At least one of the project files was written
    Created,
    /// Every file already existed and was left alone
    AlreadyInitialized,
}

/// Create `ardi.json`, the data directory and `arduino-cli.yaml`
///
/// Existing files are never overwritten, so running this twice is harmless.
pub fn init(paths: &ProjectPaths) -> Result<InitOutcome> {
    let mut created = false;

    if !paths.data_dir().is_dir() {
        fs::create_dir_all(paths.data_dir()).map_err(|e| ArdiError::io(paths.data_dir(), e))?;
        debug!(dir = %paths.data_dir().display(), "Created data directory");
        created = true;
    }

    if !paths.project_config().exists() {
        ProjectConfig::create_default(paths.project_config())?;
        info!(path = %paths.project_config().display(), "Wrote project config");
        created = true;
    }

    if !paths.toolchain_config().exists() {
        ToolchainConfig::create_default(paths)?;
        info!(path = %paths.toolchain_config().display(), "Wrote toolchain config");
        created = true;
    }

    Ok(if created {
        InitOutcome::Created
    } else {
        InitOutcome::AlreadyInitialized
    })
}

/// Delete the data directory, keeping `ardi.json`
pub fn clean(paths: &ProjectPaths) -> Result<()> {
    match fs::remove_dir_all(paths.data_dir()) {
        Ok(()) => {
            info!(dir = %paths.data_dir().display(), "Removed data directory");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ArdiError::io(paths.data_dir(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_init_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(temp.path()).unwrap();

        assert_eq!(init(&paths).unwrap(), InitOutcome::Created);
        assert!(paths.is_project());
        assert!(paths.toolchain_config().is_file());

        fs::write(paths.project_config(), "{\"platforms\":{\"a:b\":\"1\"}}").unwrap();
        assert_eq!(init(&paths).unwrap(), InitOutcome::AlreadyInitialized);
        assert_eq!(
            fs::read_to_string(paths.project_config()).unwrap(),
            "{\"platforms\":{\"a:b\":\"1\"}}"
        );
    }

    #[test]
    fn test_clean_keeps_project_config() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(temp.path()).unwrap();
        init(&paths).unwrap();

        clean(&paths).unwrap();
        assert!(!paths.data_dir().exists());
        assert!(paths.project_config().is_file());

        clean(&paths).unwrap();
    }

    #[test]
    fn test_init_after_clean_restores_data_dir() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(temp.path()).unwrap();
        init(&paths).unwrap();
        clean(&paths).unwrap();

        assert_eq!(init(&paths).unwrap(), InitOutcome::Created);
        assert!(paths.toolchain_config().is_file());
    }
}
