//! Toolchain errors

use std::io;

use thiserror::Error;

/// Errors surfaced by a toolchain client
#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("{0} is not installed")]
    NotInstalled(String),

    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Unexpected toolchain output: {0}")]
    Decode(String),

    #[error("Toolchain operation cancelled")]
    Cancelled,
}
