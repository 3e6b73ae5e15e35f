//! Toolchain Interface
//!
//! The narrow set of capabilities the core needs from the external build
//! toolchain: index refresh, platform and library management, and compile.
//! Everything behind this trait may block on disk, subprocesses or the
//! network; the core awaits each call and never runs two at once.
//!
//! [`ArduinoCli`] drives the real `arduino-cli` executable. Tests substitute
//! their own implementation.

mod arduino_cli;
mod error;
pub mod spec;

pub use arduino_cli::ArduinoCli;
pub use error::ToolchainError;
pub use spec::{LibrarySpec, PlatformSpec};

use async_trait::async_trait;
use std::path::PathBuf;

/// Result of a toolchain call
pub type ToolchainResult<T> = Result<T, ToolchainError>;

/// A platform known to the toolchain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Platform {
    /// `package:architecture`
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Installed version, empty if not installed
    pub installed: String,
    /// Latest available version
    pub latest: String,
}

/// A library available from the library index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Library {
    /// Library name as the index lists it
    pub name: String,
    /// Latest release
    pub latest: String,
    /// All known releases
    pub releases: Vec<String>,
}

/// A library installed in the project data directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstalledLibrary {
    /// Library name
    pub name: String,
    /// Installed version
    pub version: String,
}

/// Outcome of a platform install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPlatform {
    /// `package:architecture`
    pub id: String,
    /// Version actually installed
    pub version: String,
}

/// A fully resolved compile invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileRequest {
    /// Absolute path to the `.ino` file
    pub sketch_path: PathBuf,
    /// Absolute directory receiving build artifacts
    pub export_dir: PathBuf,
    /// Fully qualified board name
    pub fqbn: String,
    /// `key=value` pairs, sorted by key
    pub build_properties: Vec<String>,
    /// Print the resolved build properties instead of compiling
    pub show_properties: bool,
    /// Ask the toolchain for verbose output
    pub verbose: bool,
}

/// Operations the core consumes from the toolchain
#[async_trait]
pub trait ToolchainClient: Send + Sync {
    /// Refresh the platform package index
    async fn update_platform_index(&self) -> ToolchainResult<()>;

    /// Refresh the library index
    async fn update_library_index(&self) -> ToolchainResult<()>;

    /// Install a platform, returning its id and the version that landed on disk
    async fn install_platform(&self, spec: &PlatformSpec) -> ToolchainResult<InstalledPlatform>;

    /// Uninstall a platform, returning its id
    async fn uninstall_platform(&self, spec: &PlatformSpec) -> ToolchainResult<String>;

    /// All platforms in the index
    async fn search_platforms(&self) -> ToolchainResult<Vec<Platform>>;

    /// Platforms installed in the data directory
    async fn installed_platforms(&self) -> ToolchainResult<Vec<Platform>>;

    /// Install a library; an empty `version` installs the latest release
    ///
    /// Returns the installed version.
    async fn install_library(&self, name: &str, version: &str) -> ToolchainResult<String>;

    /// Uninstall a library by exact name
    async fn uninstall_library(&self, name: &str) -> ToolchainResult<()>;

    /// Search the library index; an empty query lists everything
    async fn search_libraries(&self, query: &str) -> ToolchainResult<Vec<Library>>;

    /// Libraries installed in the sketchbook
    async fn installed_libraries(&self) -> ToolchainResult<Vec<InstalledLibrary>>;

    /// Compile one sketch
    async fn compile(&self, request: &CompileRequest) -> ToolchainResult<()>;

    /// Toolchain version string
    async fn version(&self) -> ToolchainResult<String>;

    /// Run a raw toolchain command against the project's toolchain config
    async fn exec(&self, args: &[String]) -> ToolchainResult<()>;
}
