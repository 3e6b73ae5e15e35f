//! Dependency orchestration
//!
//! Keeps `ardi.json` and the toolchain's installed state in step. Adding
//! installs first and records second, so a failed install leaves no trace in
//! the config. Removing uninstalls first and always forgets the dependency,
//! even when the toolchain says it was already gone. [`install_all`]
//! reconciles the toolchain with whatever `ardi.json` declares.
//!
//! [`install_all`]: DependencyOrchestrator::install_all

use std::io::Write;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ProjectConfig, ToolchainConfig};
use crate::error::{ArdiError, Result};
use crate::render::{self, Table};
use crate::toolchain::{InstalledPlatform, LibrarySpec, PlatformSpec, ToolchainClient};

/// Releases shown per library in search output, besides the latest
const SEARCH_RELEASES_SHOWN: usize = 4;

/// Drives the toolchain on behalf of the project configs
pub struct DependencyOrchestrator<'a> {
    client: &'a dyn ToolchainClient,
    project: &'a mut ProjectConfig,
    toolchain: &'a ToolchainConfig,
    cancel: &'a CancellationToken,
}

impl<'a> DependencyOrchestrator<'a> {
        /// Borrow everything one command needs
    pub fn new(
        client: &'a dyn ToolchainClient,
        project: &'a mut ProjectConfig,
        toolchain: &'a ToolchainConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            client,
            project,
            toolchain,
            cancel,
        }
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ArdiError::Cancelled);
        }
        Ok(())
    }

    // ========================================================================
    // Platforms
    // ========================================================================

    /// Install a platform and pin the installed version in `ardi.json`
    pub async fn add_platform(&mut self, spec: &PlatformSpec) -> Result<InstalledPlatform> {
        self.checkpoint()?;
        self.client.update_platform_index().await?;

        self.checkpoint()?;
        info!(platform = %spec, "Installing platform");
        let installed = self.client.install_platform(spec).await?;

        self.project
            .add_platform(&installed.id, &installed.version)?;
        info!(
            platform = %installed.id,
            version = %installed.version,
            "Platform installed"
        );
        Ok(installed)
    }

    /// Uninstall a platform and drop it from `ardi.json`
    pub async fn remove_platform(&mut self, spec: &PlatformSpec) -> Result<()> {
        let id = spec.id();
        let uninstalled = self
            .client
            .uninstall_platform(&spec.unversioned())
            .await
            .map_err(ArdiError::from);

        self.project.remove_platform(&id)?;
        forgive_not_installed(uninstalled.map(|_| ()), &id)?;
        info!(platform = %id, "Platform removed");
        Ok(())
    }

    // ========================================================================
    // Libraries
    // ========================================================================

    /// Install a library and pin the installed version in `ardi.json`
    pub async fn add_library(&mut self, spec: &LibrarySpec) -> Result<String> {
        self.checkpoint()?;
        self.client.update_library_index().await?;

        self.checkpoint()?;
        info!(library = %spec, "Installing library");
        let version = self
            .client
            .install_library(&spec.name, &spec.version)
            .await?;

        self.project.add_library(&spec.name, &version)?;
        info!(library = %spec.name, version = %version, "Library installed");
        Ok(version)
    }

    /// Uninstall a library and drop it from `ardi.json`
    ///
    /// The name is passed through exactly as stored.
    pub async fn remove_library(&mut self, name: &str) -> Result<()> {
        let uninstalled = self
            .client
            .uninstall_library(name)
            .await
            .map_err(ArdiError::from);

        self.project.remove_library(name)?;
        forgive_not_installed(uninstalled, name)?;
        info!(library = %name, "Library removed");
        Ok(())
    }

    // ========================================================================
    // Board URLs
    // ========================================================================

    /// Record a board URL in both configs
    ///
    /// The toolchain config is written first so `ardi.json` never lists a URL
    /// the toolchain does not know about.
    pub fn add_board_url(&mut self, url: &str) -> Result<()> {
        self.toolchain.add_board_url(url)?;
        self.project.add_board_url(url)?;
        info!(url, "Board url added");
        Ok(())
    }

    /// Forget a board URL in both configs
    pub fn remove_board_url(&mut self, url: &str) -> Result<()> {
        self.project.remove_board_url(url)?;
        self.toolchain.remove_board_url(url)?;
        info!(url, "Board url removed");
        Ok(())
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Install everything `ardi.json` declares
    ///
    /// Stops at the first failure; whatever was installed so far stays.
    pub async fn install_all(&mut self) -> Result<()> {
        for url in self.project.board_urls() {
            self.toolchain.add_board_url(&url)?;
        }

        let platforms = self.project.platforms();
        if !platforms.is_empty() {
            self.checkpoint()?;
            self.client.update_platform_index().await?;
        }
        for (id, version) in &platforms {
            self.checkpoint()?;
            let spec: PlatformSpec = format!("{id}@{version}").parse()?;
            info!(platform = %spec, "Installing platform");
            self.client.install_platform(&spec).await?;
        }

        let libraries = self.project.libraries();
        if !libraries.is_empty() {
            self.checkpoint()?;
            self.client.update_library_index().await?;
        }
        for (name, version) in &libraries {
            self.checkpoint()?;
            info!(library = %name, version = %version, "Installing library");
            self.client.install_library(name, version).await?;
        }

        info!(
            platforms = platforms.len(),
            libraries = libraries.len(),
            "Project dependencies installed"
        );
        Ok(())
    }

    // ========================================================================
    // Listing and search
    // ========================================================================

    /// Declared platforms followed by the ones actually installed
    pub async fn list_platforms(&self, out: &mut dyn Write) -> Result<()> {
        render::line(out, "Declared in ardi.json")?;
        self.project.list_platforms(out)?;

        let mut installed = self.client.installed_platforms().await?;
        installed.sort_by(|a, b| a.id.cmp(&b.id));

        let mut table = Table::new(["Platform", "Installed", "Name"]);
        for p in &installed {
            table.push_row([p.id.as_str(), p.installed.as_str(), p.name.as_str()]);
        }
        render::line(out, "")?;
        render::line(out, "Installed")?;
        table.write_to(out)
    }

    /// Declared libraries followed by the ones actually installed
    pub async fn list_libraries(&self, out: &mut dyn Write) -> Result<()> {
        render::line(out, "Declared in ardi.json")?;
        self.project.list_libraries(out)?;

        let mut installed = self.client.installed_libraries().await?;
        installed.sort_by(|a, b| a.name.cmp(&b.name));

        let mut table = Table::new(["Library", "Version"]);
        for lib in &installed {
            table.push_row([lib.name.as_str(), lib.version.as_str()]);
        }
        render::line(out, "")?;
        render::line(out, "Installed")?;
        table.write_to(out)
    }

    /// Platforms available from the index, optionally filtered by id or name
    pub async fn search_platforms(&self, query: &str, out: &mut dyn Write) -> Result<()> {
        self.checkpoint()?;
        self.client.update_platform_index().await?;

        self.checkpoint()?;
        let query = query.to_lowercase();
        let mut platforms = self.client.search_platforms().await?;
        platforms.retain(|p| {
            query.is_empty()
                || p.id.to_lowercase().contains(&query)
                || p.name.to_lowercase().contains(&query)
        });
        platforms.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        debug!(count = platforms.len(), "Platform search finished");

        let mut table = Table::new(["Platform", "Name", "Latest"]);
        for p in &platforms {
            table.push_row([p.id.as_str(), p.name.as_str(), p.latest.as_str()]);
        }
        table.write_to(out)
    }

    /// Libraries matching `query`, with a short release history
    pub async fn search_libraries(&self, query: &str, out: &mut dyn Write) -> Result<()> {
        self.checkpoint()?;
        self.client.update_library_index().await?;

        self.checkpoint()?;
        let mut libraries = self.client.search_libraries(query).await?;
        libraries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = libraries.len(), "Library search finished");

        let mut table = Table::new(["Library", "Latest", "Other Releases"]);
        for lib in &libraries {
            let others: Vec<&str> = lib
                .releases
                .iter()
                .map(String::as_str)
                .filter(|r| *r != lib.latest)
                .collect();
            let mut releases = others
                .iter()
                .take(SEARCH_RELEASES_SHOWN)
                .copied()
                .collect::<Vec<_>>()
                .join(", ");
            if others.len() > SEARCH_RELEASES_SHOWN {
                releases.push_str(", ...");
            }
            table.push_row([lib.name.clone(), lib.latest.clone(), releases]);
        }
        table.write_to(out)
    }
}

/// Surface an uninstall error unless it only says the dependency is absent
fn forgive_not_installed(result: Result<()>, subject: &str) -> Result<()> {
    match result {
        Err(e) if e.is_not_installed() => {
            warn!(dependency = %subject, "Was not installed");
            Ok(())
        }
        other => other,
    }
}
