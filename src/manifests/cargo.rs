//! Cargo manifests (Cargo.toml).
//!
//! Only DIRECT dependencies are extracted, from `[dependencies]`,
//! `[dev-dependencies]`, `[build-dependencies]` and their `[target.*]`
//! variants. Uses pinned versions from the nearest Cargo.lock if available,
//! otherwise cleans the version requirement. `workspace = true` entries take
//! their requirement from the enclosing workspace manifest.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::loader::{RawManifest, ScanRoot, line_at};
use super::{FileResult, PackageDependency};
use crate::config::ExtractorConfig;
use crate::types::{DiagnosticKind, Dialect, Version};

const MANIFEST: &str = "Cargo.toml";
const LOCKFILE: &str = "Cargo.lock";
const SECTIONS: &[&str] = &["dependencies", "dev-dependencies", "build-dependencies"];

/// A dependency table, possibly under `[target.<cfg>]`.
struct Section<'a> {
    name: &'static str,
    target: Option<&'a str>,
    table: &'a toml::Table,
}

/// Extract direct dependencies from a Cargo.toml.
pub fn extract_cargo(manifest: &RawManifest, root: &ScanRoot, config: &ExtractorConfig) -> FileResult {
    let file = manifest.display_path.clone();
    let mut result = FileResult::new(file.clone(), Dialect::Cargo);

    let doc: toml::Table = match toml::from_str(&manifest.text) {
        Ok(doc) => doc,
        Err(e) => {
            let line = e
                .span()
                .map(|span| line_at(&manifest.text, span.start))
                .unwrap_or(1);
            warn!(file = %file.display(), line, "{}", e.message());
            result.diagnose(
                DiagnosticKind::SyntaxImbalance,
                line,
                format!("invalid Cargo.toml: {}", e.message()),
            );
            return result;
        }
    };

    let workspace = workspace_dependencies(&doc, manifest, root);
    let locked = match root.find_upwards(&manifest.path, LOCKFILE) {
        Some(path) => build_version_map(&path).unwrap_or_else(|e| {
            warn!(lockfile = %path.display(), "{:#}", e);
            HashMap::new()
        }),
        None => HashMap::new(),
    };

    for section in sections(&doc) {
        let header = section_line(manifest, &section);

        for (key, value) in section.table {
            let line = entry_line(manifest, &section, key, header);

            let inherited = value.get("workspace").and_then(|v| v.as_bool()) == Some(true);
            let spec = if inherited { workspace.get(key) } else { Some(value) };
            let Some(spec) = spec else {
                result.diagnose(
                    DiagnosticKind::UnresolvedVariable,
                    line,
                    format!("`{}` is not in [workspace.dependencies]", key),
                );
                push(&mut result, key, key, "workspace".to_string(), unresolved("workspace"), &section, line, config);
                continue;
            };

            // Skip path/git deps
            if let Some(kind) = ["path", "git"].into_iter().find(|k| spec.get(*k).is_some()) {
                result.diagnose(
                    DiagnosticKind::Skipped,
                    line,
                    format!("`{}` is a {} dependency", key, kind),
                );
                continue;
            }

            let name = value
                .get("package")
                .or_else(|| spec.get("package"))
                .and_then(|v| v.as_str())
                .unwrap_or(key);

            let Some(requirement) = extract_version(spec) else {
                result.diagnose(
                    DiagnosticKind::UnresolvedVariable,
                    line,
                    format!("`{}` has no version requirement", key),
                );
                push(&mut result, key, name, "*".to_string(), unresolved("*"), &section, line, config);
                continue;
            };

            let version = match pin(&locked, name, &requirement) {
                Some(v) => Version::Known(v),
                None => {
                    result.diagnose(
                        DiagnosticKind::UnresolvedVariable,
                        line,
                        format!("`{}`: requirement `{}` is not pinned by {}", key, requirement, LOCKFILE),
                    );
                    unresolved(&requirement)
                }
            };
            push(&mut result, key, name, requirement, version, &section, line, config);
        }
    }

    debug!(
        file = %file.display(),
        locked = locked.len(),
        workspace = workspace.len(),
        records = result.dependencies.len(),
        "extracted cargo manifest"
    );
    result
}

#[allow(clippy::too_many_arguments)]
fn push(
    result: &mut FileResult,
    key: &str,
    name: &str,
    requirement: String,
    version: Version,
    section: &Section<'_>,
    line: usize,
    config: &ExtractorConfig,
) {
    debug!(key, name, "cargo dependency");
    result.push_package(
        PackageDependency {
            group: String::new(),
            name: name.to_string(),
            requirement,
            version,
            configuration: section.name.to_string(),
            line,
        },
        config,
    );
}

fn unresolved(raw: &str) -> Version {
    Version::Unresolved {
        unresolved: raw.to_string(),
    }
}

/// Every dependency table, top-level first, then per target.
fn sections(doc: &toml::Table) -> Vec<Section<'_>> {
    let mut out = Vec::new();

    for &name in SECTIONS {
        if let Some(table) = doc.get(name).and_then(|v| v.as_table()) {
            out.push(Section {
                name,
                target: None,
                table,
            });
        }
    }

    if let Some(targets) = doc.get("target").and_then(|v| v.as_table()) {
        for (target, value) in targets {
            for &name in SECTIONS {
                if let Some(table) = value.get(name).and_then(|v| v.as_table()) {
                    out.push(Section {
                        name,
                        target: Some(target.as_str()),
                        table,
                    });
                }
            }
        }
    }

    out
}

fn section_line(manifest: &RawManifest, section: &Section<'_>) -> usize {
    let header = format!("[{}]", section.name);
    let target_suffix = format!(".{}]", section.name);

    manifest
        .find_line(1, |l| match section.target {
            None => l == header,
            Some(target) => {
                l.starts_with("[target.") && l.contains(target) && l.ends_with(&target_suffix)
            }
        })
        .unwrap_or(1)
}

/// Line of `key = ..` after the section header, or of a `[section.key]` table.
fn entry_line(manifest: &RawManifest, section: &Section<'_>, key: &str, header: usize) -> usize {
    let table_suffix = format!("{}.{}]", section.name, key);

    manifest
        .find_line(header, |l| {
            l.strip_prefix(key)
                .is_some_and(|rest| rest.starts_with(|c: char| c == '=' || c == '.' || c.is_whitespace()))
        })
        .or_else(|| manifest.find_line(1, |l| l.starts_with('[') && l.ends_with(&table_suffix)))
        .unwrap_or(header)
}

/// `[workspace.dependencies]` of this manifest, or of the nearest enclosing
/// workspace manifest within the scan root.
fn workspace_dependencies(doc: &toml::Table, manifest: &RawManifest, root: &ScanRoot) -> toml::Table {
    if let Some(deps) = workspace_table(doc) {
        return deps.clone();
    }

    let mut from = manifest.path.parent().map(Path::to_path_buf);
    while let Some(found) = from.as_deref().and_then(|dir| root.find_upwards(dir, MANIFEST)) {
        let parsed = std::fs::read_to_string(&found)
            .ok()
            .and_then(|text| toml::from_str::<toml::Table>(&text).ok());
        if let Some(doc) = parsed
            && doc.contains_key("workspace")
        {
            return workspace_table(&doc).cloned().unwrap_or_default();
        }
        from = found.parent().map(Path::to_path_buf);
    }

    toml::Table::new()
}

fn workspace_table(doc: &toml::Table) -> Option<&toml::Table> {
    doc.get("workspace")?.get("dependencies")?.as_table()
}

/// Extract version string from a dependency value.
fn extract_version(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(v) => Some(v.clone()),
        toml::Value::Table(t) => t.get("version").and_then(|v| v.as_str()).map(String::from),
        _ => None,
    }
}

/// Build a name -> versions map from Cargo.lock.
fn build_version_map(path: &Path) -> Result<HashMap<String, Vec<String>>> {
    let lockfile = cargo_lock::Lockfile::load(path).context("Failed to parse Cargo.lock")?;

    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for pkg in lockfile.packages {
        map.entry(pkg.name.as_str().to_string())
            .or_default()
            .push(pkg.version.to_string());
    }

    Ok(map)
}

/// Locked version of `name`. With several locked versions, the one matching
/// the cleaned requirement wins.
fn pin(locked: &HashMap<String, Vec<String>>, name: &str, requirement: &str) -> Option<String> {
    let cleaned = clean_version(requirement);
    match locked.get(name).map(Vec::as_slice) {
        Some([only]) => Some(only.clone()),
        Some(candidates) => cleaned
            .as_deref()
            .and_then(|c| candidates.iter().find(|v| v.starts_with(c)).cloned())
            .or(cleaned),
        None => cleaned,
    }
}

/// Clean a version range to a usable version.
/// "^1.2.3" -> "1.2.3", "~1.0" -> "1.0", etc.
fn clean_version(version: &str) -> Option<String> {
    let v = version
        .trim()
        .trim_start_matches('^')
        .trim_start_matches('~')
        .trim_start_matches('=')
        .trim_start_matches('>')
        .trim_start_matches('<');

    // Skip complex ranges we can't resolve
    if v.is_empty() || v.contains(',') || v.contains(' ') || v.contains('*') {
        return None;
    }

    Some(v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifests::loader::load_manifest;
    use std::fs;
    use tempfile::TempDir;

    const WORKSPACE: &str = r#"[workspace]
members = ["crates/*"]

[workspace.dependencies]
serde = { version = "1.0", features = ["derive"] }
"#;

    const MEMBER: &str = r#"[package]
name = "app"
version = "0.1.0"

[dependencies]
serde = { workspace = true }
anyhow = "1"
local = { path = "../local" }
tokio-rt = { package = "tokio", version = "1.36" }

[dev-dependencies]
tempfile = ">=3, <4"

[target.'cfg(unix)'.dependencies]
libc = "0.2"
"#;

    const LOCK: &str = r#"version = 3

[[package]]
name = "anyhow"
version = "1.0.80"

[[package]]
name = "serde"
version = "1.0.197"

[[package]]
name = "tokio"
version = "1.36.0"
"#;

    fn workspace() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join(MANIFEST), WORKSPACE).unwrap();
        fs::write(root.join(LOCKFILE), LOCK).unwrap();
        fs::create_dir_all(root.join("crates/app")).unwrap();
        fs::write(root.join("crates/app/Cargo.toml"), MEMBER).unwrap();
        tmp
    }

    fn extract(root: &Path, path: &Path) -> FileResult {
        let root = ScanRoot::new(root);
        let manifest = load_manifest(path, Dialect::Cargo, &root).unwrap();
        extract_cargo(&manifest, &root, &ExtractorConfig::default())
    }

    fn find<'a>(result: &'a FileResult, name: &str) -> &'a crate::types::ResolvedDependency {
        result.dependencies.iter().find(|d| d.artifact == name).unwrap()
    }

    #[test]
    fn test_clean_version() {
        assert_eq!(clean_version("^1.2"), Some("1.2".to_string()));
        assert_eq!(clean_version("1.2.3"), Some("1.2.3".to_string()));
        assert_eq!(clean_version("~1.0.0"), Some("1.0.0".to_string()));
        assert_eq!(clean_version(">=1.0, <2.0"), None);
        assert_eq!(clean_version("*"), None);
    }

    #[test]
    fn test_member_with_workspace_and_lockfile() {
        let tmp = workspace();
        let result = extract(tmp.path(), &tmp.path().join("crates/app/Cargo.toml"));

        // Pinned from Cargo.lock
        assert_eq!(find(&result, "serde").version, Version::Known("1.0.197".into()));
        assert_eq!(find(&result, "serde").source_line, 6);
        assert_eq!(find(&result, "anyhow").version, Version::Known("1.0.80".into()));
        // Renamed dependency is reported under the real crate name
        assert_eq!(find(&result, "tokio").version, Version::Known("1.36.0".into()));
        // Not locked: cleaned requirement
        let libc = find(&result, "libc");
        assert_eq!(libc.version, Version::Known("0.2".into()));
        assert_eq!(libc.configuration, "dependencies");
        assert_eq!(libc.source_line, 15);

        let tempfile = find(&result, "tempfile");
        assert_eq!(tempfile.configuration, "dev-dependencies");
        assert_eq!(
            tempfile.version,
            Version::Unresolved {
                unresolved: ">=3, <4".into()
            }
        );

        assert_eq!(result.dependencies.len(), 5);
        assert!(result.dependencies.iter().all(|d| d.group.is_empty()));
        let kinds: Vec<_> = result.diagnostics.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds.iter().filter(|k| **k == DiagnosticKind::Skipped).count(),
            1
        );
        assert_eq!(
            kinds.iter().filter(|k| **k == DiagnosticKind::UnresolvedVariable).count(),
            1
        );
    }

    #[test]
    fn test_virtual_workspace_has_no_dependencies() {
        let tmp = workspace();
        let result = extract(tmp.path(), &tmp.path().join(MANIFEST));
        assert!(result.dependencies.is_empty());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_missing_workspace_entry() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(MANIFEST),
            "[package]\nname = \"solo\"\n\n[dependencies]\nrand = { workspace = true }\n",
        )
        .unwrap();

        let result = extract(tmp.path(), &tmp.path().join(MANIFEST));
        assert_eq!(
            result.dependencies[0].version,
            Version::Unresolved {
                unresolved: "workspace".into()
            }
        );
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::UnresolvedVariable);
        assert_eq!(result.diagnostics[0].location.line, 5);
    }

    #[test]
    fn test_invalid_toml_is_fatal() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST), "[package]\nname = \"x\"\n[dependencies\nserde = \"1\"\n").unwrap();

        let result = extract(tmp.path(), &tmp.path().join(MANIFEST));
        assert!(result.dependencies.is_empty());
        assert_eq!(result.diagnostics[0].kind, DiagnosticKind::SyntaxImbalance);
        assert!(result.diagnostics[0].location.line >= 3);
    }
}
