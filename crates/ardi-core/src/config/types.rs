//! Wire-level shapes of `ardi.json` and `arduino-cli.yaml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Contents of `ardi.json`
///
/// Maps are ordered so the file serializes the same way every time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArdiConfig {
    /// Platform id (`package:architecture`) to pinned version
    #[serde(default)]
    pub platforms: BTreeMap<String, String>,

    /// Additional package index URLs, in insertion order
    #[serde(default, rename = "boardUrls")]
    pub board_urls: Vec<String>,

    /// Library name to pinned version
    #[serde(default)]
    pub libraries: BTreeMap<String, String>,

    /// Named compile targets
    #[serde(default)]
    pub builds: BTreeMap<String, ArdiBuild>,

    /// Unknown fields, kept so hand edits survive a rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A named, fully parameterized compile target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArdiBuild {
    /// Sketch directory
    pub directory: String,

    /// Absolute path to the `.ino` file, resolved when the build was added
    pub sketch: String,

    /// Serial baud rate, 0 when unknown
    #[serde(default)]
    pub baud: u32,

    /// Fully qualified board name
    pub fqbn: String,

    /// Build properties passed to the compiler
    #[serde(default)]
    pub props: BTreeMap<String, String>,

    /// Keys no field covers
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Typed view over `arduino-cli.yaml`
///
/// Every section keeps the keys it does not model, and empty values are left
/// out on write, so a rewrite only changes what was mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolchainSettings {
    /// Package index settings
    #[serde(default, skip_serializing_if = "BoardManager::is_empty")]
    pub board_manager: BoardManager,

    /// gRPC daemon settings
    #[serde(default, skip_serializing_if = "Daemon::is_empty")]
    pub daemon: Daemon,

    /// Where the toolchain keeps its files
    #[serde(default, skip_serializing_if = "Directories::is_empty")]
    pub directories: Directories,

    /// Installation identity
    #[serde(default, skip_serializing_if = "Installation::is_empty")]
    pub installation: Installation,

    /// Library install policy
    #[serde(default, skip_serializing_if = "Library::is_empty")]
    pub library: Library,

    /// Toolchain log output
    #[serde(default, skip_serializing_if = "Logging::is_empty")]
    pub logging: Logging,

    /// Metrics endpoint
    #[serde(default, skip_serializing_if = "Metrics::is_empty")]
    pub metrics: Metrics,

    /// Sections this crate does not model
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Keys of a section that no typed field covers
pub type ExtraKeys = BTreeMap<String, serde_yaml::Value>;

macro_rules! impl_is_empty {
    ($($section:ty),+ $(,)?) => {
        $(
            impl $section {
                /// True when the section holds nothing worth writing
                pub fn is_empty(&self) -> bool {
                    *self == Self::default()
                }
            }
        )+
    };
}

impl_is_empty!(BoardManager, Daemon, Directories, Installation, Library, Logging, Metrics);

/// `board_manager` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardManager {
    /// Third-party package index URLs
    #[serde(default)]
    pub additional_urls: Vec<String>,

    /// Keys no field covers
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

/// `daemon` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Daemon {
    /// Listen port
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port: String,

    /// Keys no field covers
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

/// `directories` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Directories {
    /// Platforms and index files
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub data: String,

    /// Download staging area
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub downloads: String,

    /// Sketchbook; libraries are installed under `<user>/libraries`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    /// Keys no field covers
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

/// `installation` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Installation {
    /// Installation id
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Installation secret
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret: String,

    /// Keys no field covers
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

/// `library` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    /// Allow installing libraries from git URLs and zip files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_unsafe_install: Option<bool>,

    /// Keys no field covers
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

/// `logging` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Logging {
    /// Log file, empty for stderr
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file: String,

    /// `text` or `json`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub format: String,

    /// Minimum level
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub level: String,

    /// Keys no field covers
    #[serde(flatten)]
    pub extra: ExtraKeys,
}

/// `metrics` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Listen address
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub addr: String,

    /// Whether the endpoint is served
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Keys no field covers
    #[serde(flatten)]
    pub extra: ExtraKeys,
}
