//! Rendering of the inventory and the diagnostics report.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::inventory::Inventory;
use crate::types::{Diagnostic, Dialect, ResolvedDependency, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DiagnosticsReport<'a> {
    files: Vec<FileEntry<'a>>,
    summary: Summary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry<'a> {
    path: &'a Path,
    dialect: Dialect,
    records: usize,
    diagnostics: &'a [Diagnostic],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    files: usize,
    records: usize,
    fatal: usize,
    warning: usize,
    info: usize,
}

impl Summary {
    fn of(inventory: &Inventory) -> Self {
        Self {
            files: inventory.files().len(),
            records: inventory.dependencies().len(),
            fatal: inventory.count(Severity::Fatal),
            warning: inventory.count(Severity::Warning),
            info: inventory.count(Severity::Info),
        }
    }
}

/// Render the deduplicated inventory.
pub fn render_inventory(inventory: &Inventory, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(inventory.dependencies())
                .context("Failed to serialize inventory")?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Text => Ok(inventory_text(inventory.dependencies())),
    }
}

/// Render the per-file diagnostics report.
pub fn render_diagnostics(inventory: &Inventory, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let report = DiagnosticsReport {
                files: inventory
                    .files()
                    .iter()
                    .map(|f| FileEntry {
                        path: &f.path,
                        dialect: f.dialect,
                        records: f.records,
                        diagnostics: &f.diagnostics,
                    })
                    .collect(),
                summary: Summary::of(inventory),
            };
            let mut out =
                serde_json::to_string_pretty(&report).context("Failed to serialize diagnostics")?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Text => Ok(diagnostics_text(inventory)),
    }
}

fn inventory_text(dependencies: &[ResolvedDependency]) -> String {
    let mut out = String::new();

    for dep in dependencies {
        let flag = if dep.excluded { " [excluded]" } else { "" };
        let _ = write!(
            out,
            "{} ({}){}  {}:{}",
            dep,
            dep.configuration,
            flag,
            dep.source_file.display(),
            dep.source_line
        );
        if !dep.exclusions.is_empty() {
            let exclusions: Vec<String> = dep.exclusions.iter().map(|e| e.to_string()).collect();
            let _ = write!(out, "  excludes {}", exclusions.join(", "));
        }
        out.push('\n');
    }

    let _ = writeln!(out, "\n{} dependencies", dependencies.len());
    out
}

fn diagnostics_text(inventory: &Inventory) -> String {
    let mut out = String::new();

    for file in inventory.files() {
        let _ = writeln!(
            out,
            "{} ({}, {} records)",
            file.path.display(),
            file.dialect,
            file.records
        );
        if file.diagnostics.is_empty() {
            let _ = writeln!(out, "  no findings");
        }
        for d in &file.diagnostics {
            let _ = write!(out, "  {:>4}  {:<7}  {:<21} {}", d.location.line, d.severity, d.kind, d.message);
            if let Some(related) = &d.related {
                let _ = write!(out, " (see {})", related);
            }
            out.push('\n');
        }
    }

    let summary = Summary::of(inventory);
    let _ = writeln!(out);
    let _ = writeln!(out, "Files:     {}", summary.files);
    let _ = writeln!(out, "Records:   {}", summary.records);
    let _ = writeln!(out, "Fatal:     {}", summary.fatal);
    let _ = writeln!(out, "Warnings:  {}", summary.warning);
    let _ = writeln!(out, "Info:      {}", summary.info);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifests::FileResult;
    use crate::types::{Coordinate, DiagnosticKind, Version};
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn inventory() -> Inventory {
        let c = Coordinate::parse("ns_a:c_a:1.0.0").unwrap();
        let mut result = FileResult::new(PathBuf::from("build.gradle"), Dialect::Gradle);
        result.dependencies.push(ResolvedDependency {
            group: c.group,
            artifact: c.artifact,
            version: Version::Unresolved {
                unresolved: "$version".into(),
            },
            configuration: "implementation".into(),
            excluded: false,
            exclusions: BTreeSet::new(),
            source_file: PathBuf::from("build.gradle"),
            source_line: 9,
        });
        result.diagnostics.push(Diagnostic::new(
            DiagnosticKind::UnresolvedVariable,
            Path::new("build.gradle"),
            9,
            "cannot resolve `version`",
        ));
        let empty = FileResult::new(PathBuf::from("lib/pom.xml"), Dialect::Maven);
        Inventory::merge(vec![result, empty])
    }

    #[test]
    fn test_inventory_json_fields() {
        let json = render_inventory(&inventory(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let record = &value[0];
        assert_eq!(record["group"], "ns_a");
        assert_eq!(record["version"]["unresolved"], "$version");
        assert_eq!(record["sourceFile"], "build.gradle");
        assert_eq!(record["sourceLine"], 9);
        assert_eq!(record["excluded"], false);
        assert!(record["exclusions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_diagnostics_json_lists_every_file() {
        let json = render_diagnostics(&inventory(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["files"].as_array().unwrap().len(), 2);
        assert_eq!(value["files"][0]["diagnostics"][0]["kind"], "UnresolvedVariable");
        assert_eq!(value["files"][0]["diagnostics"][0]["severity"], "warning");
        assert!(value["files"][1]["diagnostics"].as_array().unwrap().is_empty());
        assert_eq!(value["summary"]["warning"], 1);
    }

    #[test]
    fn test_text_output() {
        let text = render_inventory(&inventory(), OutputFormat::Text).unwrap();
        assert!(text.starts_with("ns_a:c_a:<unresolved $version> (implementation)  build.gradle:9"));
        assert!(text.contains("1 dependencies"));

        let report = render_diagnostics(&inventory(), OutputFormat::Text).unwrap();
        assert!(report.contains("lib/pom.xml (maven, 0 records)\n  no findings"));
        assert!(report.contains("Warnings:  1"));
    }
}
