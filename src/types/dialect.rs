use std::path::Path;

use serde::{Deserialize, Serialize};

/// Manifest dialects we extract dependencies from.
///
/// # Dialect ↔ File Mapping
/// - Gradle → `*.gradle` (Groovy DSL), `*.gradle.kts` (Kotlin DSL)
/// - Maven → `pom.xml`
/// - Npm → `package.json` (pinned from `package-lock.json`)
/// - Cargo → `Cargo.toml` (pinned from `Cargo.lock`)
/// - Go → `go.mod`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Gradle,
    Maven,
    Npm,
    Cargo,
    Go,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Gradle => "gradle",
            Dialect::Maven => "maven",
            Dialect::Npm => "npm",
            Dialect::Cargo => "cargo",
            Dialect::Go => "go",
        }
    }

    /// Detect the dialect from a file name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        match name {
            "pom.xml" => Some(Dialect::Maven),
            "package.json" => Some(Dialect::Npm),
            "Cargo.toml" => Some(Dialect::Cargo),
            "go.mod" => Some(Dialect::Go),
            _ if name.ends_with(".gradle") || name.ends_with(".gradle.kts") => Some(Dialect::Gradle),
            _ => None,
        }
    }

    /// Name of the sibling file holding `key=value` substitutions, if the dialect has one.
    pub fn properties_file(&self) -> Option<&'static str> {
        match self {
            Dialect::Gradle => Some("gradle.properties"),
            _ => None,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
