//! Build selection and compile dispatch
//!
//! [`resolve`] turns the user's build arguments into compile options:
//!
//! | args            | outcome                                             |
//! |-----------------|-----------------------------------------------------|
//! | none            | the only build, else `default`, else the sketch in the working directory |
//! | one             | the named build, else an existing sketch path       |
//! | several         | every arg must name a build                         |
//!
//! Command line FQBN and properties only apply to sketch paths; named builds
//! carry their own. [`dispatch`] then compiles each result in order and stops
//! at the first failure.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProjectConfig;
use crate::error::{ArdiError, Result};
use crate::sketch;
use crate::toolchain::{CompileRequest, ToolchainClient};

/// Name of the build used when several exist and none is requested
pub const DEFAULT_BUILD: &str = "default";

/// Directory, inside the sketch directory, receiving build artifacts
pub const EXPORT_DIR: &str = "build";

/// Compile options for one sketch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOpts {
    /// Fully qualified board name
    pub fqbn: String,
    /// Absolute sketch directory
    pub sketch_dir: PathBuf,
    /// Absolute path to the `.ino` file
    pub sketch_path: PathBuf,
    /// `key=value` pairs sorted by key
    pub build_props: Vec<String>,
    /// Print build properties instead of compiling
    pub show_props: bool,
}

/// Options given on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileFlags {
    /// `--fqbn`, used for bare sketch paths
    pub fqbn: String,
    /// Unsorted `key=value` strings
    pub build_props: Vec<String>,
    /// `--show-props`
    pub show_props: bool,
}

/// A compile to run, with the build name it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBuild {
    /// `None` when compiling a bare sketch path
    pub name: Option<String>,
    /// What to compile
    pub opts: CompileOpts,
}

impl ResolvedBuild {
    /// Name for log output
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self.opts.sketch_path.display().to_string(),
        }
    }
}

/// Decide what to compile from `args` and `flags`
///
/// `cwd` is the sketch directory used when no build applies.
pub fn resolve(
    project: &ProjectConfig,
    args: &[String],
    flags: &CompileFlags,
    cwd: &Path,
) -> Result<Vec<ResolvedBuild>> {
    match args {
        [] => {
            let builds = project.config().builds.keys().collect::<Vec<_>>();
            if let [only] = builds.as_slice() {
                debug!(build = %only, "Using the only build in ardi.json");
                return Ok(vec![named(project, only, flags.show_props)?]);
            }
            if project.has_build(DEFAULT_BUILD) {
                debug!("Using the default build");
                return Ok(vec![named(project, DEFAULT_BUILD, flags.show_props)?]);
            }
            Ok(vec![from_sketch(cwd, flags)?])
        }
        [arg] => {
            if project.has_build(arg) {
                return Ok(vec![named(project, arg, flags.show_props)?]);
            }
            // Neither a build nor anything on disk: report the build name
            if !Path::new(arg).exists() {
                return Err(ArdiError::UnknownBuild(arg.clone()));
            }
            Ok(vec![from_sketch(Path::new(arg), flags)?])
        }
        names => names
            .iter()
            .map(|name| named(project, name, false))
            .collect(),
    }
}

/// Every build in `ardi.json`, in name order
pub fn resolve_all(project: &ProjectConfig, flags: &CompileFlags) -> Result<Vec<ResolvedBuild>> {
    let builds = project
        .config()
        .builds
        .keys()
        .map(|name| named(project, name, flags.show_props))
        .collect::<Result<Vec<_>>>()?;

    if builds.is_empty() {
        warn!("No builds defined in ardi.json");
    }
    Ok(builds)
}

fn named(project: &ProjectConfig, name: &str, show_props: bool) -> Result<ResolvedBuild> {
    let mut opts = project.get_compile_opts(name)?;
    opts.show_props = show_props;
    Ok(ResolvedBuild {
        name: Some(name.to_string()),
        opts,
    })
}

fn from_sketch(path: &Path, flags: &CompileFlags) -> Result<ResolvedBuild> {
    let sketch = sketch::resolve(path)?;
    Ok(ResolvedBuild {
        name: None,
        opts: CompileOpts {
            fqbn: flags.fqbn.clone(),
            sketch_dir: sketch.directory,
            sketch_path: sketch.sketch,
            build_props: render_props(&parse_props(&flags.build_props)?),
            show_props: flags.show_props,
        },
    })
}

/// Parse `key=value` strings; the value may itself contain `=`
pub(crate) fn parse_props(props: &[String]) -> Result<BTreeMap<String, String>> {
    props
        .iter()
        .map(|prop| match prop.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(ArdiError::InvalidBuildProperty(prop.clone())),
        })
        .collect()
}

/// `key=value` strings in key order
pub(crate) fn render_props(props: &BTreeMap<String, String>) -> Vec<String> {
    props.iter().map(|(k, v)| format!("{k}={v}")).collect()
}

/// The toolchain request for `opts`
pub fn compile_request(opts: &CompileOpts, verbose: bool) -> Result<CompileRequest> {
    if opts.fqbn.trim().is_empty() {
        return Err(ArdiError::FqbnRequired(opts.sketch_path.clone()));
    }

    Ok(CompileRequest {
        sketch_path: opts.sketch_path.clone(),
        export_dir: opts.sketch_dir.join(EXPORT_DIR),
        fqbn: opts.fqbn.clone(),
        build_properties: opts.build_props.clone(),
        show_properties: opts.show_props,
        verbose,
    })
}

/// Compile each build in order, stopping at the first failure
pub async fn dispatch(
    client: &dyn ToolchainClient,
    builds: &[ResolvedBuild],
    verbose: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    for build in builds {
        if cancel.is_cancelled() {
            return Err(ArdiError::Cancelled);
        }

        let request = compile_request(&build.opts, verbose)?;
        info!(
            build = %build.label(),
            fqbn = %request.fqbn,
            "Compiling"
        );
        client.compile(&request).await?;
        debug!(export_dir = %request.export_dir.display(), "Compile finished");
    }
    Ok(())
}
