//! Manifest discovery and dependency extraction.
//!
//! Each manifest is extracted independently into a [`FileResult`]; files are
//! processed in parallel and merged afterwards by the inventory builder.

mod cargo;
mod discover;
mod go;
mod gradle;
mod loader;
mod maven;
mod npm;

pub use discover::{DiscoveryConfig, discover_manifests};
pub use loader::ScanRoot;

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::ExtractorConfig;
use crate::types::{
    DependencyDeclaration, Diagnostic, DiagnosticKind, Dialect, ResolvedDependency, Version,
};

/// Everything extracted from one manifest file.
#[derive(Debug, Clone)]
pub struct FileResult {
    /// Path as reported (relative to the scan root when possible).
    pub path: PathBuf,
    pub dialect: Dialect,
    pub declarations: Vec<DependencyDeclaration>,
    pub dependencies: Vec<ResolvedDependency>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileResult {
    pub fn new(path: PathBuf, dialect: Dialect) -> Self {
        Self {
            path,
            dialect,
            declarations: Vec::new(),
            dependencies: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn diagnose(&mut self, kind: DiagnosticKind, line: usize, message: String) {
        let diagnostic = Diagnostic::new(kind, &self.path, line, message);
        self.diagnostics.push(diagnostic);
    }

    /// Record a direct dependency of a package-manager manifest (npm, Cargo, Go).
    fn push_package(&mut self, dep: PackageDependency, config: &ExtractorConfig) {
        let raw_coordinate = if dep.group.is_empty() {
            format!("{}:{}", dep.name, dep.requirement)
        } else {
            format!("{}:{}:{}", dep.group, dep.name, dep.requirement)
        };

        self.declarations.push(DependencyDeclaration {
            configuration: dep.configuration.clone(),
            raw_coordinate,
            exclusions: Default::default(),
            source_file: self.path.clone(),
            source_line: dep.line,
            ignored: false,
        });
        self.dependencies.push(ResolvedDependency {
            excluded: config.inventory.is_excluded(&dep.group),
            group: dep.group,
            artifact: dep.name,
            version: dep.version,
            configuration: dep.configuration,
            exclusions: Default::default(),
            source_file: self.path.clone(),
            source_line: dep.line,
        });
    }
}

/// A direct dependency read from a package-manager manifest.
struct PackageDependency {
    /// npm scope or Go module path prefix; empty when the ecosystem has none.
    group: String,
    name: String,
    /// Version requirement as written.
    requirement: String,
    version: Version,
    /// Section the dependency was declared in.
    configuration: String,
    line: usize,
}

/// Extract one manifest. Never fails: unreadable files become an `Unreadable`
/// diagnostic on an otherwise empty result.
pub fn extract_manifest(path: &Path, root: &ScanRoot, config: &ExtractorConfig) -> FileResult {
    let dialect = Dialect::from_path(path).unwrap_or(Dialect::Gradle);

    let manifest = match loader::load_manifest(path, dialect, root) {
        Ok(m) => m,
        Err(e) => {
            warn!(file = %path.display(), "{}", e);
            let display = root.display_path(path);
            let mut result = FileResult::new(display.clone(), dialect);
            result
                .diagnostics
                .push(Diagnostic::new(DiagnosticKind::Unreadable, &display, 1, e.to_string()));
            return result;
        }
    };

    match dialect {
        Dialect::Gradle => {
            let properties = loader::load_properties(&manifest, root);
            gradle::extract_gradle(&manifest, config, &properties)
        }
        Dialect::Maven => maven::extract_maven(&manifest, config),
        Dialect::Npm => npm::extract_npm(&manifest, root, config),
        Dialect::Cargo => cargo::extract_cargo(&manifest, root, config),
        Dialect::Go => go::extract_go(&manifest, config),
    }
}

/// Extract every file in parallel. Results come back in input order.
pub fn extract_files(paths: &[PathBuf], root: &ScanRoot, config: &ExtractorConfig) -> Vec<FileResult> {
    let results: Vec<FileResult> = paths
        .par_iter()
        .map(|path| extract_manifest(path, root, config))
        .collect();

    debug!(
        root = %root.path().display(),
        files = results.len(),
        records = results.iter().map(|r| r.dependencies.len()).sum::<usize>(),
        "extracted manifests"
    );
    results
}
