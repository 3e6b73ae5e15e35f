//! `ardi.json` handle

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::types::{ArdiBuild, ArdiConfig};
use super::{read_config, write_atomic};
use crate::build::{parse_props, render_props, CompileOpts};
use crate::error::{ArdiError, Result};
use crate::render::{self, Table};
use crate::sketch;

/// Versions that do not pin anything
const UNPINNED_VERSIONS: [&str; 2] = ["", "*"];

/// Owner of the in-memory copy of `ardi.json`
///
/// Every mutator persists the whole document before returning.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    path: PathBuf,
    config: ArdiConfig,
}

impl ProjectConfig {
    /// Load an existing `ardi.json`
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = read_config(&path)?;
        let config = serde_json::from_str(&raw).map_err(|e| ArdiError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        debug!(path = %path.display(), "Loaded project config");
        Ok(Self { path, config })
    }

    /// Write an empty config to `path`, replacing whatever is there
    pub fn create_default(path: impl Into<PathBuf>) -> Result<Self> {
        let project = Self {
            path: path.into(),
            config: ArdiConfig::default(),
        };
        project.save()?;
        Ok(project)
    }

    /// Location of `ardi.json`
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current in-memory state
    pub fn config(&self) -> &ArdiConfig {
        &self.config
    }

    /// Serialize with two-space indentation and replace the file atomically
    pub fn save(&self) -> Result<()> {
        write_config(&self.path, &self.config)
    }

    /// Apply `change` to a copy, persist it, then adopt it
    ///
    /// `change` returns false when there is nothing to write. A failed write
    /// leaves the in-memory state as it was.
    fn update(&mut self, change: impl FnOnce(&mut ArdiConfig) -> bool) -> Result<()> {
        let mut next = self.config.clone();
        if !change(&mut next) {
            return Ok(());
        }
        write_config(&self.path, &next)?;
        self.config = next;
        Ok(())
    }

    // ========================================================================
    // Platforms
    // ========================================================================

    /// Pin platform `id` at `version`
    pub fn add_platform(&mut self, id: &str, version: &str) -> Result<()> {
        require_pinned(id, version)?;
        self.update(|config| {
            config.platforms.insert(id.to_string(), version.to_string());
            true
        })
    }

    /// Remove a platform; absent ids are fine
    pub fn remove_platform(&mut self, id: &str) -> Result<()> {
        self.update(|config| {
            config.platforms.remove(id);
            true
        })
    }

    /// Declared platforms, id to version
    pub fn platforms(&self) -> BTreeMap<String, String> {
        self.config.platforms.clone()
    }

    // ========================================================================
    // Libraries
    // ========================================================================

    /// Pin library `name` at `version`
    pub fn add_library(&mut self, name: &str, version: &str) -> Result<()> {
        require_pinned(name, version)?;
        self.update(|config| {
            config.libraries.insert(name.to_string(), version.to_string());
            true
        })
    }

    /// Remove a library; absent names are fine
    pub fn remove_library(&mut self, name: &str) -> Result<()> {
        self.update(|config| {
            config.libraries.remove(name);
            true
        })
    }

    /// Declared libraries, name to version
    pub fn libraries(&self) -> BTreeMap<String, String> {
        self.config.libraries.clone()
    }

    // ========================================================================
    // Board URLs
    // ========================================================================

    /// Append `url` unless already present
    pub fn add_board_url(&mut self, url: &str) -> Result<()> {
        self.update(|config| {
            if config.board_urls.iter().any(|u| u == url) {
                debug!(url, "Board url already in ardi.json");
                return false;
            }
            config.board_urls.push(url.to_string());
            true
        })
    }

    /// Remove `url` if present
    pub fn remove_board_url(&mut self, url: &str) -> Result<()> {
        self.update(|config| {
            let before = config.board_urls.len();
            config.board_urls.retain(|u| u != url);
            if config.board_urls.len() == before {
                debug!(url, "Board url not in ardi.json");
                return false;
            }
            true
        })
    }

    /// Declared board URLs in insertion order
    pub fn board_urls(&self) -> Vec<String> {
        self.config.board_urls.clone()
    }

    // ========================================================================
    // Builds
    // ========================================================================

    /// Add or replace a named build
    ///
    /// The sketch is resolved now and stored as absolute paths. A `baud` of 0
    /// is replaced by the rate detected in the sketch. `props` are `key=value`
    /// strings.
    pub fn add_build(
        &mut self,
        name: &str,
        sketch_path: &Path,
        fqbn: &str,
        baud: u32,
        props: &[String],
    ) -> Result<ArdiBuild> {
        if name.trim().is_empty() {
            return Err(ArdiError::InvalidBuild("name"));
        }
        if fqbn.trim().is_empty() {
            return Err(ArdiError::InvalidBuild("fqbn"));
        }
        if sketch_path.as_os_str().is_empty() {
            return Err(ArdiError::InvalidBuild("sketch"));
        }

        let props = parse_props(props)?;
        let resolved = sketch::resolve(sketch_path)?;
        let baud = if baud == 0 { resolved.baud } else { baud };

        let build = ArdiBuild {
            directory: resolved.directory.to_string_lossy().into_owned(),
            sketch: resolved.sketch.to_string_lossy().into_owned(),
            baud,
            fqbn: fqbn.to_string(),
            props,
            extra: BTreeMap::new(),
        };

        let replaced = self.has_build(name);
        self.update(|config| {
            config.builds.insert(name.to_string(), build.clone());
            true
        })?;

        if replaced {
            warn!(build = %name, "Replaced existing build");
        } else {
            info!(build = %name, "Added build");
        }
        Ok(build)
    }

    /// Remove a build; absent names are fine
    pub fn remove_build(&mut self, name: &str) -> Result<()> {
        self.update(|config| {
            config.builds.remove(name);
            true
        })
    }

    /// Every build, keyed by name
    pub fn builds(&self) -> BTreeMap<String, ArdiBuild> {
        self.config.builds.clone()
    }

    /// Copy of one build
    pub fn build(&self, name: &str) -> Option<ArdiBuild> {
        self.config.builds.get(name).cloned()
    }

    /// Whether `name` is a declared build
    pub fn has_build(&self, name: &str) -> bool {
        self.config.builds.contains_key(name)
    }

    /// Compile options for a named build, properties sorted by key
    pub fn get_compile_opts(&self, name: &str) -> Result<CompileOpts> {
        let build = self
            .config
            .builds
            .get(name)
            .ok_or_else(|| ArdiError::UnknownBuild(name.to_string()))?;

        Ok(CompileOpts {
            fqbn: build.fqbn.clone(),
            sketch_dir: PathBuf::from(&build.directory),
            sketch_path: PathBuf::from(&build.sketch),
            build_props: render_props(&build.props),
            show_props: false,
        })
    }

    // ========================================================================
    // Listing
    // ========================================================================

    /// Render declared platforms as a table
    pub fn list_platforms(&self, out: &mut dyn Write) -> Result<()> {
        version_table("Platform", &self.config.platforms).write_to(out)
    }

    /// Render declared libraries as a table
    pub fn list_libraries(&self, out: &mut dyn Write) -> Result<()> {
        version_table("Library", &self.config.libraries).write_to(out)
    }

    /// Render declared board URLs, one per line under a header
    pub fn list_board_urls(&self, out: &mut dyn Write) -> Result<()> {
        let mut table = Table::new(["Board URL"]);
        for url in &self.config.board_urls {
            table.push_row([url.as_str()]);
        }
        table.write_to(out)
    }

    /// Render builds; a non-empty `names` restricts the output to those builds
    pub fn list_builds(&self, names: &[String], out: &mut dyn Write) -> Result<()> {
        if names.is_empty() {
            for (name, build) in &self.config.builds {
                write_build(out, name, build)?;
            }
            return Ok(());
        }

        for name in names {
            match self.config.builds.get(name) {
                Some(build) => write_build(out, name, build)?,
                None => warn!(build = %name, "No such build in ardi.json"),
            }
        }
        Ok(())
    }
}

fn write_config(path: &Path, config: &ArdiConfig) -> Result<()> {
    let mut data = serde_json::to_vec_pretty(config).map_err(|e| ArdiError::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    data.push(b'\n');
    write_atomic(path, &data)
}

fn require_pinned(name: &str, version: &str) -> Result<()> {
    if UNPINNED_VERSIONS.contains(&version.trim()) {
        return Err(ArdiError::UnpinnedVersion(name.to_string()));
    }
    Ok(())
}

fn version_table(kind: &str, entries: &BTreeMap<String, String>) -> Table {
    let mut table = Table::new([kind, "Version"]);
    for (name, version) in entries {
        table.push_row([name.as_str(), version.as_str()]);
    }
    table
}

fn write_build(out: &mut dyn Write, name: &str, build: &ArdiBuild) -> Result<()> {
    render::line(out, format!("{name}:"))?;
    render::line(out, format!("  Directory: {}", build.directory))?;
    render::line(out, format!("  Sketch: {}", build.sketch))?;
    render::line(out, format!("  Baud: {}", build.baud))?;
    render::line(out, format!("  FQBN: {}", build.fqbn))?;
    render::line(out, "  Props:")?;
    for (key, value) in &build.props {
        render::line(out, format!("    {key}: {value}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn empty_project(dir: &Path) -> ProjectConfig {
        ProjectConfig::create_default(dir.join("ardi.json")).unwrap()
    }

    fn blink_sketch(dir: &Path) -> PathBuf {
        let sketch_dir = dir.join("blink");
        fs::create_dir_all(&sketch_dir).unwrap();
        fs::write(sketch_dir.join("blink.ino"), "void setup() { Serial.begin(9600); }\n").unwrap();
        sketch_dir
    }

    #[test]
    fn test_default_file_shape() {
        let temp = tempfile::tempdir().unwrap();
        let project = empty_project(temp.path());

        let raw = fs::read_to_string(project.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"platforms": {}, "boardUrls": [], "libraries": {}, "builds": {}})
        );
        assert!(raw.contains("\n  \"platforms\""));
    }

    #[test]
    fn test_load_malformed() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ardi.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            ProjectConfig::load(&path),
            Err(ArdiError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_rejects_unpinned_versions() {
        let temp = tempfile::tempdir().unwrap();
        let mut project = empty_project(temp.path());

        assert!(matches!(
            project.add_platform("arduino:avr", ""),
            Err(ArdiError::UnpinnedVersion(_))
        ));
        assert!(matches!(
            project.add_library("Servo", "*"),
            Err(ArdiError::UnpinnedVersion(_))
        ));
        assert!(project.platforms().is_empty());
    }

    #[test]
    fn test_remove_absent_is_ok() {
        let temp = tempfile::tempdir().unwrap();
        let mut project = empty_project(temp.path());

        project.remove_platform("arduino:avr").unwrap();
        project.remove_library("Servo").unwrap();
        project.remove_build("blink").unwrap();
        project.remove_board_url("https://x").unwrap();
    }

    #[test]
    fn test_add_build_detects_baud() {
        let temp = tempfile::tempdir().unwrap();
        let mut project = empty_project(temp.path());
        let sketch_dir = blink_sketch(temp.path());

        let build = project
            .add_build("blink", &sketch_dir, "arduino:avr:uno", 0, &[])
            .unwrap();
        assert_eq!(build.baud, 9600);
        assert_eq!(build.sketch, sketch_dir.join("blink.ino").to_string_lossy());

        let build = project
            .add_build("blink", &sketch_dir, "arduino:avr:uno", 115200, &[])
            .unwrap();
        assert_eq!(build.baud, 115200);
        assert_eq!(project.builds().len(), 1);
    }

    #[test]
    fn test_add_build_requires_fields() {
        let temp = tempfile::tempdir().unwrap();
        let mut project = empty_project(temp.path());
        let sketch_dir = blink_sketch(temp.path());

        assert!(matches!(
            project.add_build("", &sketch_dir, "arduino:avr:uno", 0, &[]),
            Err(ArdiError::InvalidBuild("name"))
        ));
        assert!(matches!(
            project.add_build("blink", &sketch_dir, " ", 0, &[]),
            Err(ArdiError::InvalidBuild("fqbn"))
        ));
        assert!(matches!(
            project.add_build("blink", Path::new(""), "arduino:avr:uno", 0, &[]),
            Err(ArdiError::InvalidBuild("sketch"))
        ));
        assert!(matches!(
            project.add_build("blink", &sketch_dir, "arduino:avr:uno", 0, &["novalue".into()]),
            Err(ArdiError::InvalidBuildProperty(_))
        ));
    }

    #[test]
    fn test_compile_opts_sorted_props() {
        let temp = tempfile::tempdir().unwrap();
        let mut project = empty_project(temp.path());
        let sketch_dir = blink_sketch(temp.path());

        let props = vec![
            "compiler.cpp.extra_flags=-DX=1".to_string(),
            "build.extra_flags=-DDEBUG".to_string(),
        ];
        project
            .add_build("blink", &sketch_dir, "arduino:avr:uno", 0, &props)
            .unwrap();

        let opts = project.get_compile_opts("blink").unwrap();
        assert_eq!(
            opts.build_props,
            vec!["build.extra_flags=-DDEBUG", "compiler.cpp.extra_flags=-DX=1"]
        );
        assert_eq!(opts.sketch_dir, sketch_dir);
        assert!(!opts.show_props);

        assert!(matches!(
            project.get_compile_opts("nope"),
            Err(ArdiError::UnknownBuild(_))
        ));
    }

    #[test]
    fn test_list_builds_filters_names() {
        let temp = tempfile::tempdir().unwrap();
        let mut project = empty_project(temp.path());
        let sketch_dir = blink_sketch(temp.path());
        project
            .add_build("blink", &sketch_dir, "arduino:avr:uno", 0, &[])
            .unwrap();
        project
            .add_build("other", &sketch_dir, "arduino:avr:mega", 0, &[])
            .unwrap();

        let mut out = Vec::new();
        project
            .list_builds(&["other".to_string(), "missing".to_string()], &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("other:\n"));
        assert!(text.contains("  FQBN: arduino:avr:mega"));
        assert!(!text.contains("blink:"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_write_leaves_state_unchanged() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("proj");
        fs::create_dir_all(&dir).unwrap();
        let mut project = empty_project(&dir);
        project.add_platform("arduino:avr", "1.8.2").unwrap();

        fs::set_permissions(&dir, fs::Permissions::from_mode(0o500)).unwrap();
        let writable = tempfile::NamedTempFile::new_in(&dir).is_ok();
        let result = project.add_platform("esp8266:esp8266", "3.1.2");
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();

        // Root ignores directory permissions
        if writable {
            return;
        }
        assert!(result.is_err());
        assert!(!project.platforms().contains_key("esp8266:esp8266"));

        project.add_library("Servo", "1.2.1").unwrap();
        let reloaded = ProjectConfig::load(project.path()).unwrap();
        assert_eq!(reloaded.config(), project.config());
        assert!(!reloaded.platforms().contains_key("esp8266:esp8266"));
    }
}
