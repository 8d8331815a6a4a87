//! npm manifests (package.json).
//!
//! Only DIRECT dependencies are extracted, not transitive.
//! Uses pinned versions from the nearest package-lock.json if available,
//! otherwise cleans exact and caret/tilde requirements.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use super::loader::{RawManifest, ScanRoot};
use super::{FileResult, PackageDependency};
use crate::config::ExtractorConfig;
use crate::types::{DiagnosticKind, Dialect, Version};

const LOCKFILE: &str = "package-lock.json";

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PackageJson {
    dependencies: BTreeMap<String, String>,
    dev_dependencies: BTreeMap<String, String>,
    peer_dependencies: BTreeMap<String, String>,
    optional_dependencies: BTreeMap<String, String>,
}

impl PackageJson {
    /// Dependency maps keyed by their section name in package.json.
    fn sections(self) -> [(&'static str, BTreeMap<String, String>); 4] {
        [
            ("dependencies", self.dependencies),
            ("devDependencies", self.dev_dependencies),
            ("peerDependencies", self.peer_dependencies),
            ("optionalDependencies", self.optional_dependencies),
        ]
    }
}

/// Extract direct dependencies from a package.json.
pub fn extract_npm(manifest: &RawManifest, root: &ScanRoot, config: &ExtractorConfig) -> FileResult {
    let file = manifest.display_path.clone();
    let mut result = FileResult::new(file.clone(), Dialect::Npm);

    let package: PackageJson = match serde_json::from_str(&manifest.text) {
        Ok(package) => package,
        Err(e) => {
            warn!(file = %file.display(), line = e.line(), "{}", e);
            result.diagnose(
                DiagnosticKind::SyntaxImbalance,
                e.line().max(1),
                format!("invalid package.json: {}", e),
            );
            return result;
        }
    };

    let lock_versions = match root.find_upwards(&manifest.path, LOCKFILE) {
        Some(path) => build_lock_version_map(&path).unwrap_or_else(|e| {
            warn!(lockfile = %path.display(), "{:#}", e);
            HashMap::new()
        }),
        None => HashMap::new(),
    };

    for (section, deps) in package.sections() {
        let section_key = format!("\"{}\"", section);
        let section_line = manifest
            .find_line(1, |l| l.starts_with(&section_key))
            .unwrap_or(1);

        for (name, spec) in deps {
            let key = format!("\"{}\"", name);
            let line = manifest
                .find_line(section_line, |l| l.starts_with(&key))
                .unwrap_or(section_line);

            if !is_registry_spec(&spec) {
                result.diagnose(
                    DiagnosticKind::Skipped,
                    line,
                    format!("`{}`: `{}` is not a registry dependency", name, spec),
                );
                continue;
            }

            // Prefer lockfile, fall back to cleaned manifest version
            let version = match lock_versions.get(&name).cloned().or_else(|| clean_version(&spec)) {
                Some(v) => Version::Known(v),
                None => {
                    result.diagnose(
                        DiagnosticKind::UnresolvedVariable,
                        line,
                        format!("`{}`: range `{}` is not pinned by {}", name, spec, LOCKFILE),
                    );
                    Version::Unresolved {
                        unresolved: spec.clone(),
                    }
                }
            };

            let (group, short_name) = split_scope(&name);
            result.push_package(
                PackageDependency {
                    group,
                    name: short_name,
                    requirement: spec,
                    version,
                    configuration: section.to_string(),
                    line,
                },
                config,
            );
        }
    }

    debug!(
        file = %file.display(),
        locked = lock_versions.len(),
        records = result.dependencies.len(),
        "extracted npm manifest"
    );
    result
}

/// `@scope/name` splits into (`@scope`, `name`); unscoped names have no group.
fn split_scope(name: &str) -> (String, String) {
    match name.split_once('/') {
        Some((scope, rest)) if scope.starts_with('@') => (scope.to_string(), rest.to_string()),
        _ => (String::new(), name.to_string()),
    }
}

/// Git, file, link, URL and workspace specs do not come from the registry.
fn is_registry_spec(spec: &str) -> bool {
    let spec = spec.trim();
    !(spec.starts_with("git")
        || spec.starts_with("file:")
        || spec.starts_with("link:")
        || spec.starts_with("workspace:")
        || spec.starts_with("http")
        || spec.contains("github:"))
}

#[derive(Deserialize)]
struct PackageLock {
    packages: Option<HashMap<String, PackageLockEntry>>,
}

#[derive(Deserialize)]
struct PackageLockEntry {
    version: Option<String>,
}

/// Build a name -> version map from package-lock.json (top-level packages only).
fn build_lock_version_map(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path).context("Failed to read package-lock.json")?;
    let lock: PackageLock =
        serde_json::from_str(&content).context("Failed to parse package-lock.json")?;

    let mut map = HashMap::new();

    for (key, entry) in lock.packages.unwrap_or_default() {
        // Skip root
        if key.is_empty() || key == "." {
            continue;
        }

        // Keys: "node_modules/axios" or "node_modules/@types/node"
        let Some(name) = key.strip_prefix("node_modules/") else {
            continue;
        };

        // Skip nested deps (transitive)
        if name.contains("node_modules/") {
            continue;
        }

        if let Some(version) = entry.version {
            map.insert(name.to_string(), version);
        }
    }

    Ok(map)
}

fn clean_version(version: &str) -> Option<String> {
    let v = version
        .trim()
        .trim_start_matches('^')
        .trim_start_matches('~')
        .trim_start_matches('=')
        .trim_start_matches('v');

    // Skip ranges, tags and wildcards
    if !v.starts_with(|c: char| c.is_ascii_digit())
        || v.contains(' ')
        || v.contains("||")
        || v.split('.').any(|part| matches!(part, "x" | "X" | "*"))
    {
        return None;
    }

    Some(v.to_string())
}
