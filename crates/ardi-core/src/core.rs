//! ArdiCore: one value per command invocation
//!
//! Owns both config handles, the toolchain client and the cancellation token,
//! and exposes one method per command. Nothing here is global; the binary
//! builds an `ArdiCore`, runs one method and exits.

use std::io::Write;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::build::{self, CompileFlags};
use crate::config::{ArdiBuild, ProjectConfig, ToolchainConfig};
use crate::deps::DependencyOrchestrator;
use crate::error::{ArdiError, Result};
use crate::paths::ProjectPaths;
use crate::project::{self, InitOutcome};
use crate::render;
use crate::toolchain::{LibrarySpec, PlatformSpec, ToolchainClient};
use crate::VERSION;

/// Program name dropped from the front of `exec` arguments
const TOOLCHAIN_PROGRAM: &str = "arduino-cli";

/// Settings chosen by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoreOptions {
    /// Ask the toolchain for verbose compile output
    pub verbose: bool,
}

/// An opened project
pub struct ArdiCore {
    paths: ProjectPaths,
    project: ProjectConfig,
    toolchain: ToolchainConfig,
    client: Box<dyn ToolchainClient>,
    options: CoreOptions,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ArdiCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArdiCore")
            .field("paths", &self.paths)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ArdiCore {
    /// Initialize a project at `paths`; safe to repeat
    pub fn init(paths: &ProjectPaths) -> Result<InitOutcome> {
        project::init(paths)
    }

    /// Delete the data directory of the project at `paths`
    pub fn clean(paths: &ProjectPaths) -> Result<()> {
        project::clean(paths)
    }

    /// Open the project at `paths`
    ///
    /// Fails with `NotAProject` when there is no `ardi.json`. A missing data
    /// directory (after `clean`) is recreated with a default toolchain config
    /// that already lists the project's board URLs.
    pub fn open(
        paths: ProjectPaths,
        client: Box<dyn ToolchainClient>,
        options: CoreOptions,
    ) -> Result<Self> {
        paths.require_project()?;
        let project = ProjectConfig::load(paths.project_config())?;

        let toolchain = if paths.toolchain_config().exists() {
            ToolchainConfig::load(paths.toolchain_config())?
        } else {
            info!("Restoring toolchain config");
            std::fs::create_dir_all(paths.data_dir())
                .map_err(|e| ArdiError::io(paths.data_dir(), e))?;
            ToolchainConfig::create_with_urls(&paths, &project.board_urls())?
        };

        Ok(Self {
            paths,
            project,
            toolchain,
            client,
            options,
            cancel: CancellationToken::new(),
        })
    }

    /// Use `token` to abort long running toolchain calls
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Locations of the project's files
    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Handle over `ardi.json`
    pub fn project(&self) -> &ProjectConfig {
        &self.project
    }

    /// Handle over `arduino-cli.yaml`
    pub fn toolchain(&self) -> &ToolchainConfig {
        &self.toolchain
    }

    /// Options the core was opened with
    pub fn options(&self) -> CoreOptions {
        self.options
    }

    fn deps(&mut self) -> DependencyOrchestrator<'_> {
        DependencyOrchestrator::new(
            self.client.as_ref(),
            &mut self.project,
            &self.toolchain,
            &self.cancel,
        )
    }

    // ========================================================================
    // add / remove
    // ========================================================================

    /// Install platforms given as `package:arch[@version]`
    pub async fn add_platforms(&mut self, specs: &[String]) -> Result<()> {
        let specs = specs
            .iter()
            .map(|s| s.parse::<PlatformSpec>())
            .collect::<Result<Vec<_>>>()?;
        for spec in &specs {
            self.deps().add_platform(spec).await?;
        }
        Ok(())
    }

    /// Install libraries given as `name[@version]`
    pub async fn add_libraries(&mut self, specs: &[String]) -> Result<()> {
        let specs = specs
            .iter()
            .map(|s| s.parse::<LibrarySpec>())
            .collect::<Result<Vec<_>>>()?;
        for spec in &specs {
            self.deps().add_library(spec).await?;
        }
        Ok(())
    }

    /// Record board URLs in both configs
    pub fn add_board_urls(&mut self, urls: &[String]) -> Result<()> {
        for url in urls {
            self.deps().add_board_url(url)?;
        }
        Ok(())
    }

    /// Add or replace a named build
    pub fn add_build(
        &mut self,
        name: &str,
        sketch: &std::path::Path,
        fqbn: &str,
        baud: u32,
        props: &[String],
    ) -> Result<ArdiBuild> {
        self.project.add_build(name, sketch, fqbn, baud, props)
    }

    /// Uninstall platforms and forget them
    pub async fn remove_platforms(&mut self, specs: &[String]) -> Result<()> {
        let specs = specs
            .iter()
            .map(|s| s.parse::<PlatformSpec>())
            .collect::<Result<Vec<_>>>()?;
        for spec in &specs {
            self.deps().remove_platform(spec).await?;
        }
        Ok(())
    }

    /// Uninstall libraries and forget them
    pub async fn remove_libraries(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            self.deps().remove_library(name).await?;
        }
        Ok(())
    }

    /// Forget named builds
    pub fn remove_builds(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            self.project.remove_build(name)?;
            info!(build = %name, "Build removed");
        }
        Ok(())
    }

    /// Forget board URLs in both configs
    pub fn remove_board_urls(&mut self, urls: &[String]) -> Result<()> {
        for url in urls {
            self.deps().remove_board_url(url)?;
        }
        Ok(())
    }

    // ========================================================================
    // list / search
    // ========================================================================

    /// Declared and installed platforms
    pub async fn list_platforms(&mut self, out: &mut dyn Write) -> Result<()> {
        self.deps().list_platforms(out).await
    }

    /// Declared and installed libraries
    pub async fn list_libraries(&mut self, out: &mut dyn Write) -> Result<()> {
        self.deps().list_libraries(out).await
    }

    /// Builds, optionally restricted to `names`
    pub fn list_builds(&self, names: &[String], out: &mut dyn Write) -> Result<()> {
        self.project.list_builds(names, out)
    }

    /// Declared board URLs
    pub fn list_board_urls(&self, out: &mut dyn Write) -> Result<()> {
        self.project.list_board_urls(out)
    }

    /// Platforms in the index matching `query`
    pub async fn search_platforms(&mut self, query: &str, out: &mut dyn Write) -> Result<()> {
        self.deps().search_platforms(query, out).await
    }

    /// Libraries in the index matching `query`
    pub async fn search_libraries(&mut self, query: &str, out: &mut dyn Write) -> Result<()> {
        self.deps().search_libraries(query, out).await
    }

    // ========================================================================
    // install / build / exec
    // ========================================================================

    /// Install every dependency declared in `ardi.json`
    pub async fn install(&mut self) -> Result<()> {
        self.deps().install_all().await
    }

    /// Compile the builds selected by `args` and `flags`, or all of them
    pub async fn build(&self, args: &[String], flags: &CompileFlags, all: bool) -> Result<()> {
        let builds = if all {
            build::resolve_all(&self.project, flags)?
        } else {
            build::resolve(&self.project, args, flags, self.paths.root())?
        };

        build::dispatch(
            self.client.as_ref(),
            &builds,
            self.options.verbose,
            &self.cancel,
        )
        .await
    }

    /// Run a raw toolchain command against this project's toolchain config
    pub async fn exec(&self, args: &[String]) -> Result<()> {
        let args = match args.split_first() {
            Some((first, rest)) if first == TOOLCHAIN_PROGRAM => rest,
            _ => args,
        };
        self.client.exec(args).await?;
        Ok(())
    }

    /// Print ardi's and the toolchain's versions
    pub async fn version(&self, out: &mut dyn Write) -> Result<()> {
        write_version(self.client.as_ref(), out).await
    }
}

/// Print ardi's version, then the toolchain's
///
/// Usable outside a project. A toolchain that cannot report its version is
/// logged and skipped.
pub async fn write_version(client: &dyn ToolchainClient, out: &mut dyn Write) -> Result<()> {
    render::line(out, format!("ardi {VERSION}"))?;
    match client.version().await {
        Ok(version) => render::line(out, format!("{TOOLCHAIN_PROGRAM} {version}")),
        Err(e) => {
            warn!("Could not read toolchain version: {e}");
            Ok(())
        }
    }
}
