//! Error types for project and build operations

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::toolchain::ToolchainError;

/// Result alias used throughout the core
pub type Result<T, E = ArdiError> = std::result::Result<T, E>;

/// Errors that can occur while managing an ardi project
#[derive(Error, Debug)]
pub enum ArdiError {
    #[error("Not an ardi project directory: {0} (run 'ardi init' first)")]
    NotAProject(PathBuf),

    #[error("Config file not found: {0}")]
    ConfigMissing(PathBuf),

    #[error("Failed to parse {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Invalid platform spec '{0}': expected package:architecture[@version]")]
    InvalidPlatformSpec(String),

    #[error("Invalid library spec '{0}': expected name[@version]")]
    InvalidLibrarySpec(String),

    #[error("No sketch found at {0}")]
    SketchMissing(PathBuf),

    #[error("Expected exactly one .ino file in {directory}, found {count}")]
    AmbiguousSketch { directory: PathBuf, count: usize },

    #[error("No build named '{0}' in ardi.json")]
    UnknownBuild(String),

    #[error("Invalid build: {0} must not be empty")]
    InvalidBuild(&'static str),

    #[error("Invalid build property '{0}': expected key=value")]
    InvalidBuildProperty(String),

    #[error("Refusing to store '{0}' without a pinned version")]
    UnpinnedVersion(String),

    #[error("A board FQBN is required to compile {0}")]
    FqbnRequired(PathBuf),

    #[error("Toolchain error: {0}")]
    Toolchain(#[from] ToolchainError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write output: {0}")]
    Output(#[source] io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ArdiError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ArdiError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error only says the dependency was already absent
    pub fn is_not_installed(&self) -> bool {
        matches!(self, ArdiError::Toolchain(ToolchainError::NotInstalled(_)))
    }

    /// Whether this error came from a cancelled toolchain call
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ArdiError::Cancelled | ArdiError::Toolchain(ToolchainError::Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_installed_detection() {
        let err = ArdiError::from(ToolchainError::NotInstalled("arduino:avr".into()));
        assert!(err.is_not_installed());
        assert!(!ArdiError::UnknownBuild("x".into()).is_not_installed());
    }

    #[test]
    fn test_messages_name_the_input() {
        let err = ArdiError::InvalidPlatformSpec(":avr".to_string());
        assert!(err.to_string().contains(":avr"));

        let err = ArdiError::UnknownBuild("blink".to_string());
        assert_eq!(err.to_string(), "No build named 'blink' in ardi.json");
    }
}
