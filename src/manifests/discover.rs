//! Manifest discovery.
//!
//! Walks the directory tree to find manifest files of every known dialect,
//! skipping build/cache directories. `[discovery]` in the config can pin
//! explicit roots or add excludes.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Dialect;

/// Directories to skip during manifest discovery.
const SKIP_DIRS: &[&str] = &[
    // Build artifacts
    "build",
    "target",
    "out",
    "bin",
    ".gradle",
    ".kotlin",
    // Dependencies
    "node_modules",
    "vendor",
    // VCS
    ".git",
    ".svn",
    ".hg",
    // IDE
    ".idea",
    ".vscode",
    ".fleet",
];

/// `[discovery]` section of the config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Explicit roots to scan, relative to the scan root (disables auto-discovery).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<Vec<PathBuf>>,
    /// Additional directory names or glob patterns (relative paths) to exclude.
    pub exclude: Vec<String>,
}

/// Discover all manifest files under `root`.
///
/// A file path is returned as-is when its dialect is recognized. The result is
/// sorted and free of duplicates.
pub fn discover_manifests(root: &Path, config: &DiscoveryConfig) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(Dialect::from_path(root)
            .map(|_| vec![root.to_path_buf()])
            .unwrap_or_default());
    }

    let excludes = Excludes::new(&config.exclude);
    let mut found = BTreeSet::new();

    match &config.roots {
        Some(roots) => {
            for sub in roots {
                let dir = root.join(sub);
                if dir.is_dir() {
                    discover_recursive(root, &dir, &mut found, &excludes)?;
                } else if dir.is_file() && Dialect::from_path(&dir).is_some() {
                    found.insert(dir);
                }
            }
        }
        None => discover_recursive(root, root, &mut found, &excludes)?,
    }

    debug!(root = %root.display(), manifests = found.len(), "discovered manifests");
    Ok(found.into_iter().collect())
}

struct Excludes {
    names: BTreeSet<String>,
    patterns: Vec<glob::Pattern>,
}

impl Excludes {
    fn new(entries: &[String]) -> Self {
        let mut names = BTreeSet::new();
        let mut patterns = Vec::new();
        for entry in entries {
            if entry.contains(['*', '?', '[', '/']) {
                if let Ok(p) = glob::Pattern::new(entry) {
                    patterns.push(p);
                }
            } else {
                names.insert(entry.clone());
            }
        }
        Self { names, patterns }
    }

    fn should_skip(&self, name: &str, relative: &Path) -> bool {
        // Check standard excludes
        if SKIP_DIRS.contains(&name) {
            return true;
        }

        // Check user-configured excludes
        if self.names.contains(name) {
            return true;
        }

        self.patterns.iter().any(|p| p.matches_path(relative))
    }
}

fn discover_recursive(
    root: &Path,
    dir: &Path,
    found: &mut BTreeSet<PathBuf>,
    excludes: &Excludes,
) -> Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Ok(()), // Skip unreadable directories
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_file() {
            if Dialect::from_path(&path).is_some() {
                found.insert(path);
            }
            continue;
        }

        if !path.is_dir() {
            continue;
        }

        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };

        let relative = path.strip_prefix(root).unwrap_or(&path);
        if excludes.should_skip(name, relative) {
            continue;
        }

        discover_recursive(root, &path, found, excludes)?;
    }

    Ok(())
}
