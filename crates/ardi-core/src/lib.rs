//! # ardi Core Library
//!
//! Project configuration and dependency orchestration for Arduino sketches.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! A project is a directory holding `ardi.json`, which pins the platforms and
//! libraries a project needs and names its builds. This library provides:
//! - Typed, atomically persisted handles over `ardi.json` and the toolchain's
//!   `arduino-cli.yaml`
//! - Sketch resolution and baud detection
//! - Dependency install/remove/reconcile against the toolchain
//! - Build selection and compile dispatch
//!
//! The toolchain sits behind [`toolchain::ToolchainClient`]; the
//! [`toolchain::ArduinoCli`] client drives the `arduino-cli` executable.
//!
//! ## Example
//!
//! ```rust,ignore
//! use ardi_core::prelude::*;
//!
//! let paths = ProjectPaths::from_cwd()?;
//! ArdiCore::init(&paths)?;
//!
//! let client = ArduinoCli::new(paths.toolchain_config());
//! let mut core = ArdiCore::open(paths, Box::new(client), CoreOptions::default())?;
//! core.add_platforms(&["arduino:avr".to_string()]).await?;
//! core.build(&["blink".to_string()], &CompileFlags::default(), false).await?;
//! ```

pub mod build;
pub mod config;
pub mod core;
pub mod deps;
pub mod error;
pub mod paths;
pub mod project;
pub mod render;
pub mod sketch;
pub mod toolchain;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::build::{CompileFlags, CompileOpts, ResolvedBuild};
    pub use crate::config::{ArdiBuild, ArdiConfig, ProjectConfig, ToolchainConfig};
    pub use crate::core::{write_version, ArdiCore, CoreOptions};
    pub use crate::deps::DependencyOrchestrator;
    pub use crate::error::ArdiError;
    pub use crate::paths::ProjectPaths;
    pub use crate::project::InitOutcome;
    pub use crate::sketch::Sketch;
    pub use crate::toolchain::{
        ArduinoCli, CompileRequest, LibrarySpec, PlatformSpec, ToolchainClient, ToolchainError,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
