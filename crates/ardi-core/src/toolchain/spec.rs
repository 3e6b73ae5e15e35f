//! Dependency specs given on the command line
//!
//! - platforms: `package:architecture[@version]`
//! - libraries: `name[@version]`
//!
//! The version is split off at the rightmost `@`.

use std::fmt;
use std::str::FromStr;

use crate::error::ArdiError;

/// A platform to install or remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSpec {
    /// Package (vendor) name
    pub package: String,
    /// Architecture within the package
    pub architecture: String,
    /// Empty when the latest version should be used
    pub version: String,
}

impl PlatformSpec {
    /// Build a spec from its parts
    pub fn new(package: &str, architecture: &str, version: &str) -> Self {
        Self {
            package: package.to_string(),
            architecture: architecture.to_string(),
            version: version.to_string(),
        }
    }

    /// Platform identifier, `package:architecture`
    pub fn id(&self) -> String {
        format!("{}:{}", self.package, self.architecture)
    }

    /// The same platform without a version
    pub fn unversioned(&self) -> Self {
        Self {
            version: String::new(),
            ..self.clone()
        }
    }
}

impl FromStr for PlatformSpec {
    type Err = ArdiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ArdiError::InvalidPlatformSpec(s.to_string());

        let (platform, version) = split_version(s).ok_or_else(invalid)?;
        let (package, architecture) = platform.split_once(':').ok_or_else(invalid)?;

        if package.is_empty() || architecture.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(package, architecture, version))
    }
}

impl fmt::Display for PlatformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package, self.architecture)?;
        if !self.version.is_empty() {
            write!(f, "@{}", self.version)?;
        }
        Ok(())
    }
}

/// A library to install or remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySpec {
    /// Library name, spaces allowed
    pub name: String,
    /// Empty when the latest version should be used
    pub version: String,
}

impl LibrarySpec {
    /// Build a spec from its parts
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

impl FromStr for LibrarySpec {
    type Err = ArdiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ArdiError::InvalidLibrarySpec(s.to_string());

        let (name, version) = split_version(s).ok_or_else(invalid)?;
        if name.trim().is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(name, version))
    }
}

impl fmt::Display for LibrarySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.version.is_empty() {
            write!(f, "@{}", self.version)?;
        }
        Ok(())
    }
}

/// Split `s` at its rightmost `@`; `None` if a version marker has nothing after it
fn split_version(s: &str) -> Option<(&str, &str)> {
    match s.rsplit_once('@') {
        Some((_, "")) => None,
        Some((rest, version)) => Some((rest, version)),
        None => Some((s, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_platform_with_version() {
        let spec: PlatformSpec = "foo:bar@1.2.3".parse().unwrap();
        assert_eq!(spec, PlatformSpec::new("foo", "bar", "1.2.3"));
        assert_eq!(spec.id(), "foo:bar");
        assert_eq!(spec.to_string(), "foo:bar@1.2.3");
    }

    #[test]
    fn test_platform_without_version() {
        let spec: PlatformSpec = "foo:bar".parse().unwrap();
        assert_eq!(spec, PlatformSpec::new("foo", "bar", ""));
        assert_eq!(spec.to_string(), "foo:bar");
    }

    #[test]
    fn test_platform_splits_rightmost_at() {
        let spec: PlatformSpec = "foo@x:bar@2.0".parse().unwrap();
        assert_eq!(spec.package, "foo@x");
        assert_eq!(spec.architecture, "bar");
        assert_eq!(spec.version, "2.0");
    }

    #[test]
    fn test_platform_splits_first_colon() {
        let spec: PlatformSpec = "esp32:esp32:extra@1.0".parse().unwrap();
        assert_eq!(spec.package, "esp32");
        assert_eq!(spec.architecture, "esp32:extra");
    }

    #[test]
    fn test_invalid_platform_specs() {
        for bad in ["", "foo", ":bar", "foo:", "foo:bar@", "@1.0"] {
            assert!(
                matches!(bad.parse::<PlatformSpec>(), Err(ArdiError::InvalidPlatformSpec(_))),
                "{bad:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_library_specs() {
        let spec: LibrarySpec = "Adafruit Pixie@1.0.0".parse().unwrap();
        assert_eq!(spec, LibrarySpec::new("Adafruit Pixie", "1.0.0"));

        let spec: LibrarySpec = "Servo".parse().unwrap();
        assert_eq!(spec.version, "");
        assert_eq!(spec.to_string(), "Servo");

        for bad in ["", "@1.0", "Servo@", "  "] {
            assert!(bad.parse::<LibrarySpec>().is_err(), "{bad:?} should be invalid");
        }
    }
}
