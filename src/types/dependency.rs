use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::MalformedCoordinate;

/// A `group:artifact:version` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl Coordinate {
    /// Parse a literal `group:artifact:version`.
    ///
    /// Exactly three non-empty segments are accepted; anything else is
    /// reported rather than coerced.
    pub fn parse(raw: &str) -> Result<Self, MalformedCoordinate> {
        let segments: Vec<&str> = raw.split(':').collect();
        let malformed = || MalformedCoordinate {
            raw: raw.to_string(),
            segments: segments.len(),
        };

        match segments.as_slice() {
            [group, artifact, version]
                if !group.is_empty() && !artifact.is_empty() && !version.is_empty() =>
            {
                Ok(Self {
                    group: group.to_string(),
                    artifact: artifact.to_string(),
                    version: version.to_string(),
                })
            }
            _ => Err(malformed()),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// Version of a resolved dependency.
///
/// Serializes as a plain string when known, or as `{"unresolved": "<raw>"}`
/// when an interpolated reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Version {
    Known(String),
    Unresolved { unresolved: String },
}

impl Version {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Version::Known(_))
    }

    /// The text used in identity keys: the value, or the raw placeholder.
    pub fn as_str(&self) -> &str {
        match self {
            Version::Known(v) => v,
            Version::Unresolved { unresolved } => unresolved,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Known(v) => write!(f, "{}", v),
            Version::Unresolved { unresolved } => write!(f, "<unresolved {}>", unresolved),
        }
    }
}

/// A `(group, module)` pair removed from a dependency's transitive set.
///
/// Either side may be absent (`exclude module: 'x'` excludes `x` from any group).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Exclusion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.group.as_deref().unwrap_or("*"),
            self.module.as_deref().unwrap_or("*")
        )
    }
}

/// A call classified as a dependency declaration (real or ignored), before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDeclaration {
    pub configuration: String,
    pub raw_coordinate: String,
    pub exclusions: BTreeSet<Exclusion>,
    pub source_file: PathBuf,
    pub source_line: usize,
    pub ignored: bool,
}

/// Identity used to deduplicate the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyKey {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub configuration: String,
}

impl DependencyKey {
    pub fn new(coordinate: &Coordinate, configuration: &str) -> Self {
        Self {
            group: coordinate.group.clone(),
            artifact: coordinate.artifact.clone(),
            version: coordinate.version.clone(),
            configuration: configuration.to_string(),
        }
    }
}

/// A dependency in the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDependency {
    pub group: String,
    pub artifact: String,
    pub version: Version,
    pub configuration: String,
    /// Group matched a configured first-party pattern.
    pub excluded: bool,
    pub exclusions: BTreeSet<Exclusion>,
    pub source_file: PathBuf,
    pub source_line: usize,
}

impl ResolvedDependency {
    pub fn key(&self) -> DependencyKey {
        DependencyKey {
            group: self.group.clone(),
            artifact: self.artifact.clone(),
            version: self.version.as_str().to_string(),
            configuration: self.configuration.clone(),
        }
    }
}

impl fmt::Display for ResolvedDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_coordinate(f, &self.group, &self.artifact, &self.version)
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_coordinate(f, &self.group, &self.artifact, &self.version)?;
        write!(f, " ({})", self.configuration)
    }
}

/// `group:artifact:version`, or `name:version` for ecosystems without groups
/// (unscoped npm packages, crates).
fn write_coordinate(
    f: &mut fmt::Formatter<'_>,
    group: &str,
    artifact: &str,
    version: &dyn fmt::Display,
) -> fmt::Result {
    if group.is_empty() {
        write!(f, "{}:{}", artifact, version)
    } else {
        write!(f, "{}:{}:{}", group, artifact, version)
    }
}
