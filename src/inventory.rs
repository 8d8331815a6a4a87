//! Inventory builder: merges per-file results into one deduplicated inventory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::RunMode;
use crate::manifests::FileResult;
use crate::types::{
    Coordinate, DependencyKey, Diagnostic, DiagnosticKind, Dialect, ExtractError, Location,
    ResolvedDependency, Severity,
};

/// A processed manifest and its findings.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub dialect: Dialect,
    pub records: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Deduplicated dependencies of a run, with every finding.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    dependencies: Vec<ResolvedDependency>,
    files: Vec<FileReport>,
}

enum Entry {
    Record(ResolvedDependency),
    /// An ignored declaration whose coordinate parses.
    Ignored { key: DependencyKey, line: usize },
}

impl Entry {
    fn line(&self) -> usize {
        match self {
            Entry::Record(dep) => dep.source_line,
            Entry::Ignored { line, .. } => *line,
        }
    }
}

impl Inventory {
    /// Merge per-file results in (file path, source line) order.
    ///
    /// The first occurrence of a (group, artifact, version, configuration) key
    /// wins; later ones add a `DuplicateDeclaration` pointing back at it.
    pub fn merge(mut results: Vec<FileResult>) -> Self {
        results.sort_by(|a, b| a.path.cmp(&b.path));

        let mut seen: HashMap<DependencyKey, Location> = HashMap::new();
        let mut inventory = Inventory::default();

        for result in results {
            let mut entries: Vec<Entry> = result
                .dependencies
                .into_iter()
                .map(Entry::Record)
                .collect();
            entries.extend(
                result
                    .declarations
                    .iter()
                    .filter(|d| d.ignored)
                    .filter_map(|d| {
                        let coordinate = Coordinate::parse(&d.raw_coordinate).ok()?;
                        Some(Entry::Ignored {
                            key: DependencyKey::new(&coordinate, &d.configuration),
                            line: d.source_line,
                        })
                    }),
            );
            entries.sort_by_key(Entry::line);

            let mut diagnostics = result.diagnostics;
            let mut records = 0;
            for entry in entries {
                let line = entry.line();
                let key = match &entry {
                    Entry::Record(dep) => dep.key(),
                    Entry::Ignored { key, .. } => key.clone(),
                };

                if let Some(first) = seen.get(&key) {
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::DuplicateDeclaration,
                            &result.path,
                            line,
                            format!("{} is already declared", key),
                        )
                        .with_related(first.clone()),
                    );
                    continue;
                }

                seen.insert(key, Location::new(&result.path, line));
                if let Entry::Record(dep) = entry {
                    records += 1;
                    inventory.dependencies.push(dep);
                }
            }

            diagnostics.sort_by_key(|d| d.location.line);
            inventory.files.push(FileReport {
                path: result.path,
                dialect: result.dialect,
                records,
                diagnostics,
            });
        }

        info!(
            files = inventory.files.len(),
            records = inventory.dependencies.len(),
            diagnostics = inventory.diagnostics().count(),
            "built inventory"
        );
        inventory
    }

    pub fn dependencies(&self) -> &[ResolvedDependency] {
        &self.dependencies
    }

    /// Every processed file, in merge order.
    pub fn files(&self) -> &[FileReport] {
        &self.files
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.files.iter().flat_map(|f| f.diagnostics.iter())
    }

    pub fn diagnostics_for(&self, path: &Path) -> &[Diagnostic] {
        self.files
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.diagnostics.as_slice())
            .unwrap_or_default()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics().filter(|d| d.severity == severity).count()
    }

    /// In strict mode, fail on any fatal or warning finding. Informational
    /// findings never fail a run.
    pub fn check_strict(&self, mode: RunMode) -> Result<(), ExtractError> {
        if mode != RunMode::Strict {
            return Ok(());
        }

        let mut failing = self.diagnostics().filter(|d| d.severity >= Severity::Warning);
        match failing.next() {
            Some(first) => Err(ExtractError::Strict {
                count: 1 + failing.count(),
                first: first.to_string(),
            }),
            None => Ok(()),
        }
    }
}
