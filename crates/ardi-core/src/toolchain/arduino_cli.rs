//! `arduino-cli` subprocess adapter
//!
//! Every invocation is pinned to the project's toolchain config with
//! `--config-file`, so installs land in the project data directory. Queries
//! ask for `--format json` and are decoded into the typed records of
//! [`super`]. Both the 0.x (bare arrays) and 1.x (wrapped objects) output
//! shapes are accepted.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    CompileRequest, InstalledLibrary, InstalledPlatform, Library, Platform, PlatformSpec,
    ToolchainClient, ToolchainError, ToolchainResult,
};

/// Default executable name, looked up on `PATH`
pub const DEFAULT_PROGRAM: &str = "arduino-cli";

/// Toolchain client backed by the `arduino-cli` executable
#[derive(Debug, Clone)]
pub struct ArduinoCli {
    program: PathBuf,
    config_file: PathBuf,
    cancel: CancellationToken,
}

impl ArduinoCli {
    /// Create a client bound to the given `arduino-cli.yaml`
    pub fn new(config_file: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            config_file: config_file.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a specific `arduino-cli` executable
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Abort running subprocesses when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Config file passed to every invocation
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    fn command<I, S>(&self, args: I) -> (Command, String)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        let command_line = std::iter::once(self.program.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .arg("--config-file")
            .arg(&self.config_file)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        (cmd, command_line)
    }

    /// Run to completion capturing stdout
    async fn output<I, S>(&self, args: I) -> ToolchainResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (mut cmd, command_line) = self.command(args);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        debug!(command = %command_line, "Running toolchain");

        let output = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ToolchainError::Cancelled),
            output = cmd.output() => output.map_err(|source| self.spawn_error(source))?,
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(command_failed(
                command_line,
                output.status,
                &String::from_utf8_lossy(&output.stderr),
            ))
        }
    }

    /// Run to completion with the terminal attached
    async fn run_attached<I, S>(&self, args: I) -> ToolchainResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (mut cmd, command_line) = self.command(args);
        cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        debug!(command = %command_line, "Running toolchain");

        let mut child = cmd.spawn().map_err(|source| self.spawn_error(source))?;
        let status = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ToolchainError::Cancelled),
            status = child.wait() => status.map_err(|source| self.spawn_error(source))?,
        };

        if status.success() {
            Ok(())
        } else {
            Err(command_failed(command_line, status, ""))
        }
    }

    fn spawn_error(&self, source: std::io::Error) -> ToolchainError {
        ToolchainError::Spawn {
            program: self.program.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl ToolchainClient for ArduinoCli {
    async fn update_platform_index(&self) -> ToolchainResult<()> {
        debug!("Updating platform index...");
        self.output(["core", "update-index"]).await.map(|_| ())
    }

    async fn update_library_index(&self) -> ToolchainResult<()> {
        debug!("Updating library index...");
        self.output(["lib", "update-index"]).await.map(|_| ())
    }

    async fn install_platform(&self, spec: &PlatformSpec) -> ToolchainResult<InstalledPlatform> {
        self.output(["core".to_string(), "install".to_string(), spec.to_string()])
            .await?;

        let id = spec.id();
        let installed = self.installed_platforms().await?;
        let version = installed
            .into_iter()
            .find(|p| p.id == id)
            .map(|p| p.installed)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| spec.version.clone());

        if version.is_empty() {
            return Err(ToolchainError::Decode(format!(
                "could not determine installed version of {id}"
            )));
        }

        Ok(InstalledPlatform { id, version })
    }

    async fn uninstall_platform(&self, spec: &PlatformSpec) -> ToolchainResult<String> {
        let id = spec.id();
        self.output(["core", "uninstall", id.as_str()])
            .await
            .map_err(|e| not_installed(e, &id))?;
        Ok(id)
    }

    async fn search_platforms(&self) -> ToolchainResult<Vec<Platform>> {
        let out = self.output(["core", "search", "--format", "json"]).await?;
        parse_platforms(&out)
    }

    async fn installed_platforms(&self) -> ToolchainResult<Vec<Platform>> {
        let out = self.output(["core", "list", "--format", "json"]).await?;
        parse_platforms(&out)
    }

    async fn install_library(&self, name: &str, version: &str) -> ToolchainResult<String> {
        let target = if version.is_empty() {
            name.to_string()
        } else {
            format!("{name}@{version}")
        };
        self.output(["lib", "install", target.as_str()]).await?;

        let installed = self.installed_libraries().await?;
        let found = installed
            .into_iter()
            .find(|l| l.name == name)
            .map(|l| l.version)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| version.to_string());

        if found.is_empty() {
            return Err(ToolchainError::Decode(format!(
                "could not determine installed version of {name}"
            )));
        }

        Ok(found)
    }

    async fn uninstall_library(&self, name: &str) -> ToolchainResult<()> {
        self.output(["lib", "uninstall", name])
            .await
            .map(|_| ())
            .map_err(|e| not_installed(e, name))
    }

    async fn search_libraries(&self, query: &str) -> ToolchainResult<Vec<Library>> {
        let mut args = vec!["lib", "search"];
        if !query.is_empty() {
            args.push(query);
        }
        args.extend(["--format", "json"]);

        let out = self.output(args).await?;
        parse_library_search(&out)
    }

    async fn installed_libraries(&self) -> ToolchainResult<Vec<InstalledLibrary>> {
        let out = self.output(["lib", "list", "--format", "json"]).await?;
        parse_installed_libraries(&out)
    }

    async fn compile(&self, request: &CompileRequest) -> ToolchainResult<()> {
        self.run_attached(compile_args(request)).await
    }

    async fn version(&self) -> ToolchainResult<String> {
        let out = self.output(["version", "--format", "json"]).await?;
        Ok(parse_version(&out))
    }

    async fn exec(&self, args: &[String]) -> ToolchainResult<()> {
        self.run_attached(args).await
    }
}

/// Command line for a compile request
fn compile_args(request: &CompileRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "compile".into(),
        "--fqbn".into(),
        request.fqbn.clone().into(),
        "--export-dir".into(),
        request.export_dir.clone().into(),
    ];
    for prop in &request.build_properties {
        args.push("--build-property".into());
        args.push(prop.into());
    }
    if request.show_properties {
        args.push("--show-properties".into());
    }
    if request.verbose {
        args.push("--verbose".into());
    }
    args.push(request.sketch_path.clone().into());
    args
}

fn command_failed(command: String, status: ExitStatus, stderr: &str) -> ToolchainError {
    ToolchainError::CommandFailed {
        command,
        status: status.to_string(),
        stderr: stderr.trim().to_string(),
    }
}

/// Reclassify "X is not installed" failures
fn not_installed(err: ToolchainError, subject: &str) -> ToolchainError {
    match err {
        ToolchainError::CommandFailed { ref stderr, .. }
            if stderr.to_lowercase().contains("not installed") =>
        {
            ToolchainError::NotInstalled(subject.to_string())
        }
        other => other,
    }
}

fn is_empty_output(out: &str) -> bool {
    let out = out.trim();
    out.is_empty() || out == "null"
}

fn decode<'a, T: Deserialize<'a>>(out: &'a str) -> ToolchainResult<T> {
    serde_json::from_str(out).map_err(|e| ToolchainError::Decode(e.to_string()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlatformListing {
    Bare(Vec<RawPlatform>),
    Wrapped {
        #[serde(default)]
        platforms: Vec<RawPlatform>,
    },
}

#[derive(Deserialize)]
struct RawPlatform {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, alias = "installed")]
    installed_version: String,
    #[serde(default, alias = "latest")]
    latest_version: String,
    #[serde(default)]
    releases: BTreeMap<String, RawPlatformRelease>,
}

#[derive(Deserialize)]
struct RawPlatformRelease {
    #[serde(default)]
    name: String,
}

fn parse_platforms(out: &str) -> ToolchainResult<Vec<Platform>> {
    if is_empty_output(out) {
        return Ok(Vec::new());
    }

    let raw = match decode::<PlatformListing>(out)? {
        PlatformListing::Bare(platforms) => platforms,
        PlatformListing::Wrapped { platforms } => platforms,
    };

    Ok(raw
        .into_iter()
        .map(|p| {
            let name = if p.name.is_empty() {
                p.releases
                    .get(&p.latest_version)
                    .or_else(|| p.releases.get(&p.installed_version))
                    .map(|r| r.name.clone())
                    .unwrap_or_default()
            } else {
                p.name
            };
            Platform {
                id: p.id,
                name,
                installed: p.installed_version,
                latest: p.latest_version,
            }
        })
        .collect())
}

#[derive(Deserialize)]
struct LibrarySearchOutput {
    #[serde(default)]
    libraries: Vec<RawSearchedLibrary>,
}

#[derive(Deserialize)]
struct RawSearchedLibrary {
    name: String,
    #[serde(default)]
    latest: Option<RawLibraryRelease>,
    #[serde(default)]
    releases: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    available_versions: Vec<String>,
}

#[derive(Deserialize)]
struct RawLibraryRelease {
    #[serde(default)]
    version: String,
}

fn parse_library_search(out: &str) -> ToolchainResult<Vec<Library>> {
    if is_empty_output(out) {
        return Ok(Vec::new());
    }

    let search: LibrarySearchOutput = decode(out)?;
    Ok(search
        .libraries
        .into_iter()
        .map(|l| {
            let releases = if l.available_versions.is_empty() {
                l.releases.into_keys().collect()
            } else {
                l.available_versions
            };
            Library {
                name: l.name,
                latest: l.latest.map(|r| r.version).unwrap_or_default(),
                releases,
            }
        })
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LibraryListing {
    Bare(Vec<RawInstalledLibrary>),
    Wrapped {
        #[serde(default)]
        installed_libraries: Vec<RawInstalledLibrary>,
    },
}

#[derive(Deserialize)]
struct RawInstalledLibrary {
    library: RawLibrary,
}

#[derive(Deserialize)]
struct RawLibrary {
    name: String,
    #[serde(default)]
    version: String,
}

fn parse_installed_libraries(out: &str) -> ToolchainResult<Vec<InstalledLibrary>> {
    if is_empty_output(out) {
        return Ok(Vec::new());
    }

    let raw = match decode::<LibraryListing>(out)? {
        LibraryListing::Bare(libs) => libs,
        LibraryListing::Wrapped {
            installed_libraries,
        } => installed_libraries,
    };

    Ok(raw
        .into_iter()
        .map(|l| InstalledLibrary {
            name: l.library.name,
            version: l.library.version,
        })
        .collect())
}

#[derive(Deserialize)]
struct RawVersion {
    #[serde(rename = "VersionString")]
    version_string: String,
}

fn parse_version(out: &str) -> String {
    serde_json::from_str::<RawVersion>(out)
        .map(|v| v.version_string)
        .unwrap_or_else(|_| out.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_platforms_legacy_shape() {
        let out = r#"[{"id":"arduino:avr","installed":"1.8.2","latest":"1.8.3","name":"Arduino AVR Boards"}]"#;
        let platforms = parse_platforms(out).unwrap();
        assert_eq!(
            platforms,
            vec![Platform {
                id: "arduino:avr".into(),
                name: "Arduino AVR Boards".into(),
                installed: "1.8.2".into(),
                latest: "1.8.3".into(),
            }]
        );
    }

    #[test]
    fn test_parse_platforms_wrapped_shape() {
        let out = r#"{
            "platforms": [{
                "id": "esp8266:esp8266",
                "installed_version": "3.1.2",
                "latest_version": "3.1.2",
                "releases": {"3.1.2": {"name": "esp8266", "version": "3.1.2"}}
            }]
        }"#;
        let platforms = parse_platforms(out).unwrap();
        assert_eq!(platforms[0].id, "esp8266:esp8266");
        assert_eq!(platforms[0].name, "esp8266");
        assert_eq!(platforms[0].installed, "3.1.2");
    }

    #[test]
    fn test_parse_empty_outputs() {
        assert!(parse_platforms("").unwrap().is_empty());
        assert!(parse_platforms("null").unwrap().is_empty());
        assert!(parse_platforms("{}").unwrap().is_empty());
        assert!(parse_installed_libraries("{}\n").unwrap().is_empty());
        assert!(parse_library_search("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage_is_decode_error() {
        assert!(matches!(
            parse_platforms("not json"),
            Err(ToolchainError::Decode(_))
        ));
    }

    #[test]
    fn test_parse_installed_libraries() {
        let legacy = r#"[{"library":{"name":"Adafruit Pixie","version":"1.0.0"}}]"#;
        let wrapped =
            r#"{"installed_libraries":[{"library":{"name":"Adafruit Pixie","version":"1.0.0"}}]}"#;
        let expected = vec![InstalledLibrary {
            name: "Adafruit Pixie".into(),
            version: "1.0.0".into(),
        }];
        assert_eq!(parse_installed_libraries(legacy).unwrap(), expected);
        assert_eq!(parse_installed_libraries(wrapped).unwrap(), expected);
    }

    #[test]
    fn test_parse_library_search() {
        let out = r#"{"libraries":[{
            "name": "Servo",
            "latest": {"version": "1.2.1"},
            "releases": {"1.1.8": {}, "1.2.1": {}}
        }]}"#;
        let libs = parse_library_search(out).unwrap();
        assert_eq!(libs[0].name, "Servo");
        assert_eq!(libs[0].latest, "1.2.1");
        assert_eq!(libs[0].releases, vec!["1.1.8", "1.2.1"]);
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(
            parse_version(r#"{"Application":"arduino-cli","VersionString":"1.1.1"}"#),
            "1.1.1"
        );
        assert_eq!(parse_version("arduino-cli Version: 0.35.3\n"), "arduino-cli Version: 0.35.3");
    }

    #[test]
    fn test_compile_args() {
        let request = CompileRequest {
            sketch_path: PathBuf::from("/p/blink/blink.ino"),
            export_dir: PathBuf::from("/p/blink/build"),
            fqbn: "arduino:avr:mega".into(),
            build_properties: vec!["build.extra_flags=-DA".into(), "compiler.x=1".into()],
            show_properties: true,
            verbose: false,
        };
        let args: Vec<String> = compile_args(&request)
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "compile",
                "--fqbn",
                "arduino:avr:mega",
                "--export-dir",
                "/p/blink/build",
                "--build-property",
                "build.extra_flags=-DA",
                "--build-property",
                "compiler.x=1",
                "--show-properties",
                "/p/blink/blink.ino",
            ]
        );
    }

    #[test]
    fn test_not_installed_reclassification() {
        let err = ToolchainError::CommandFailed {
            command: "arduino-cli core uninstall arduino:avr".into(),
            status: "exit status: 1".into(),
            stderr: "Error uninstalling arduino:avr: platform not installed".into(),
        };
        assert!(matches!(
            not_installed(err, "arduino:avr"),
            ToolchainError::NotInstalled(id) if id == "arduino:avr"
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let cli = ArduinoCli::new("/tmp/arduino-cli.yaml")
            .with_program("/nonexistent/ardi-test/arduino-cli");
        assert!(matches!(
            cli.version().await,
            Err(ToolchainError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let cli = ArduinoCli::new("/tmp/arduino-cli.yaml")
            .with_program("/nonexistent/ardi-test/arduino-cli")
            .with_cancellation(token);
        assert!(matches!(
            cli.update_platform_index().await,
            Err(ToolchainError::Cancelled)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_program_with_config_file() {
        let cli = ArduinoCli::new("/tmp/arduino-cli.yaml").with_program("echo");
        assert_eq!(
            cli.version().await.unwrap(),
            "version --format json --config-file /tmp/arduino-cli.yaml"
        );

        let cli = ArduinoCli::new("/tmp/arduino-cli.yaml").with_program("true");
        cli.exec(&["board".to_string(), "list".to_string()])
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_command_failed() {
        let cli = ArduinoCli::new("/tmp/arduino-cli.yaml").with_program("false");
        assert!(matches!(
            cli.version().await,
            Err(ToolchainError::CommandFailed { .. })
        ));
        assert!(matches!(
            cli.exec(&[]).await,
            Err(ToolchainError::CommandFailed { .. })
        ));
    }
}
