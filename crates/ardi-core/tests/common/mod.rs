//! Shared fixtures: a recording toolchain and throwaway projects
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use ardi_core::prelude::*;
use ardi_core::toolchain::{
    InstalledLibrary, InstalledPlatform, Library, Platform, ToolchainResult,
};
use async_trait::async_trait;
use tempfile::TempDir;

/// One recorded toolchain call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    UpdatePlatformIndex,
    UpdateLibraryIndex,
    InstallPlatform {
        package: String,
        architecture: String,
        version: String,
    },
    UninstallPlatform(String),
    SearchPlatforms,
    InstalledPlatforms,
    InstallLibrary {
        name: String,
        version: String,
    },
    UninstallLibrary(String),
    SearchLibraries(String),
    InstalledLibraries,
    Compile(CompileRequest),
    Version,
    Exec(Vec<String>),
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    fail_on: Option<&'static str>,
    uninstall_not_installed: bool,
    platforms: Vec<Platform>,
    libraries: Vec<Library>,
    installed_libraries: Vec<InstalledLibrary>,
}

/// Toolchain double that records every call
///
/// Clones share state, so a test keeps one clone and hands another to the
/// code under test.
#[derive(Clone, Default)]
pub struct MockToolchain {
    state: Arc<Mutex<State>>,
}

/// Version reported when a platform is installed without one
pub const LATEST_PLATFORM: &str = "1.8.6";

/// Version reported when a library is installed without one
pub const LATEST_LIBRARY: &str = "2.0.1";

impl MockToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call to the named operation (e.g. `"install_platform"`)
    pub fn failing_on(self, operation: &'static str) -> Self {
        self.lock().fail_on = Some(operation);
        self
    }

    /// Make uninstalls report that nothing was installed
    pub fn uninstall_reports_not_installed(self) -> Self {
        self.lock().uninstall_not_installed = true;
        self
    }

    pub fn with_platforms(self, platforms: Vec<Platform>) -> Self {
        self.lock().platforms = platforms;
        self
    }

    pub fn with_libraries(self, libraries: Vec<Library>) -> Self {
        self.lock().libraries = libraries;
        self
    }

    pub fn with_installed_libraries(self, libraries: Vec<InstalledLibrary>) -> Self {
        self.lock().installed_libraries = libraries;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear(&self) {
        self.lock().calls.clear();
    }

    pub fn compiles(&self) -> Vec<CompileRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Compile(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn record(&self, operation: &str, call: Call) -> ToolchainResult<()> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.fail_on == Some(operation) {
            return Err(ToolchainError::CommandFailed {
                command: format!("arduino-cli {operation}"),
                status: "exit status: 1".to_string(),
                stderr: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ToolchainClient for MockToolchain {
    async fn update_platform_index(&self) -> ToolchainResult<()> {
        self.record("update_platform_index", Call::UpdatePlatformIndex)
    }

    async fn update_library_index(&self) -> ToolchainResult<()> {
        self.record("update_library_index", Call::UpdateLibraryIndex)
    }

    async fn install_platform(&self, spec: &PlatformSpec) -> ToolchainResult<InstalledPlatform> {
        self.record(
            "install_platform",
            Call::InstallPlatform {
                package: spec.package.clone(),
                architecture: spec.architecture.clone(),
                version: spec.version.clone(),
            },
        )?;
        let version = if spec.version.is_empty() {
            LATEST_PLATFORM.to_string()
        } else {
            spec.version.clone()
        };
        Ok(InstalledPlatform {
            id: spec.id(),
            version,
        })
    }

    async fn uninstall_platform(&self, spec: &PlatformSpec) -> ToolchainResult<String> {
        self.record("uninstall_platform", Call::UninstallPlatform(spec.id()))?;
        if self.lock().uninstall_not_installed {
            return Err(ToolchainError::NotInstalled(spec.id()));
        }
        Ok(spec.id())
    }

    async fn search_platforms(&self) -> ToolchainResult<Vec<Platform>> {
        self.record("search_platforms", Call::SearchPlatforms)?;
        Ok(self.lock().platforms.clone())
    }

    async fn installed_platforms(&self) -> ToolchainResult<Vec<Platform>> {
        self.record("installed_platforms", Call::InstalledPlatforms)?;
        Ok(self
            .lock()
            .platforms
            .iter()
            .filter(|p| !p.installed.is_empty())
            .cloned()
            .collect())
    }

    async fn install_library(&self, name: &str, version: &str) -> ToolchainResult<String> {
        self.record(
            "install_library",
            Call::InstallLibrary {
                name: name.to_string(),
                version: version.to_string(),
            },
        )?;
        Ok(if version.is_empty() {
            LATEST_LIBRARY.to_string()
        } else {
            version.to_string()
        })
    }

    async fn uninstall_library(&self, name: &str) -> ToolchainResult<()> {
        self.record("uninstall_library", Call::UninstallLibrary(name.to_string()))?;
        if self.lock().uninstall_not_installed {
            return Err(ToolchainError::NotInstalled(name.to_string()));
        }
        Ok(())
    }

    async fn search_libraries(&self, query: &str) -> ToolchainResult<Vec<Library>> {
        self.record("search_libraries", Call::SearchLibraries(query.to_string()))?;
        Ok(self.lock().libraries.clone())
    }

    async fn installed_libraries(&self) -> ToolchainResult<Vec<InstalledLibrary>> {
        self.record("installed_libraries", Call::InstalledLibraries)?;
        Ok(self.lock().installed_libraries.clone())
    }

    async fn compile(&self, request: &CompileRequest) -> ToolchainResult<()> {
        self.record("compile", Call::Compile(request.clone()))
    }

    async fn version(&self) -> ToolchainResult<String> {
        self.record("version", Call::Version)?;
        Ok("1.1.1".to_string())
    }

    async fn exec(&self, args: &[String]) -> ToolchainResult<()> {
        self.record("exec", Call::Exec(args.to_vec()))
    }
}

/// An initialized project in a temporary directory
pub struct TestProject {
    pub temp: TempDir,
    pub paths: ProjectPaths,
    pub mock: MockToolchain,
}

impl TestProject {
    pub fn new() -> Self {
        Self::with_mock(MockToolchain::new())
    }

    pub fn with_mock(mock: MockToolchain) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let paths = ProjectPaths::new(temp.path()).unwrap();
        ArdiCore::init(&paths).unwrap();
        Self { temp, paths, mock }
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    /// Open the project with the shared mock
    pub fn core(&self) -> ArdiCore {
        self.core_with(CoreOptions::default())
    }

    pub fn core_with(&self, options: CoreOptions) -> ArdiCore {
        ArdiCore::open(self.paths.clone(), Box::new(self.mock.clone()), options).unwrap()
    }

    /// Write `<root>/<dir>/<name>.ino`, `name` being the last path component
    pub fn write_sketch(&self, dir: &str, body: &str) -> PathBuf {
        let sketch_dir = self.root().join(dir);
        fs::create_dir_all(&sketch_dir).unwrap();
        let name = sketch_dir.file_name().unwrap().to_string_lossy().into_owned();
        fs::write(sketch_dir.join(format!("{name}.ino")), body).unwrap();
        sketch_dir
    }

    /// `ardi.json` as a JSON value
    pub fn project_json(&self) -> serde_json::Value {
        let raw = fs::read_to_string(self.paths.project_config()).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    pub fn write_project_json(&self, raw: &str) {
        fs::write(self.paths.project_config(), raw).unwrap();
    }

    /// Board URLs currently in `arduino-cli.yaml`
    pub fn toolchain_urls(&self) -> Vec<String> {
        ToolchainConfig::load(self.paths.toolchain_config())
            .unwrap()
            .board_urls()
    }
}

pub fn platform(id: &str, name: &str, installed: &str, latest: &str) -> Platform {
    Platform {
        id: id.to_string(),
        name: name.to_string(),
        installed: installed.to_string(),
        latest: latest.to_string(),
    }
}
