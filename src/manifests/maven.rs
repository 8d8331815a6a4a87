//! Maven manifests (pom.xml).
//!
//! Only DIRECT dependencies are extracted, from `<project><dependencies>`.
//! `<dependencyManagement>` only pins versions and is skipped. The scope
//! becomes the configuration (`compile` when absent).

use std::collections::{BTreeMap, BTreeSet};

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};

use super::FileResult;
use super::loader::{RawManifest, line_at};
use crate::config::ExtractorConfig;
use crate::types::{
    DependencyDeclaration, Diagnostic, DiagnosticKind, Dialect, Exclusion, MalformedCoordinate,
    ResolvedDependency, Version,
};

const DEFAULT_SCOPE: &str = "compile";

/// Marker for a version left to the parent POM or `<dependencyManagement>`.
const MANAGED_VERSION: &str = "(managed)";

/// Property references are followed at most this deep.
const MAX_PROPERTY_DEPTH: usize = 8;

/// Extract direct dependencies from a pom.xml.
pub fn extract_maven(manifest: &RawManifest, config: &ExtractorConfig) -> FileResult {
    let file = manifest.display_path.clone();
    let mut result = FileResult::new(file.clone(), Dialect::Maven);

    let properties = parse_properties(&manifest.text);
    let resolver = PropertyResolver {
        properties: &properties,
        external: &config.substitutions,
    };

    let pending = match parse_dependencies(&manifest.text) {
        Ok(pending) => pending,
        Err((line, message)) => {
            warn!(file = %file.display(), line, "{}", message);
            result.diagnostics.push(Diagnostic::new(
                DiagnosticKind::SyntaxImbalance,
                &file,
                line,
                message,
            ));
            return result;
        }
    };

    for dep in pending {
        dep.resolve(&resolver, config, &mut result);
    }

    debug!(
        file = %file.display(),
        properties = properties.len(),
        records = result.dependencies.len(),
        "extracted maven manifest"
    );
    result
}

/// Whether `path` below the root element is exactly `expected`.
fn at(path: &[String], expected: &[&str]) -> bool {
    path.len() == expected.len() + 1 && path[1..].iter().zip(expected).all(|(a, b)| a == b)
}

/// Parse `<properties>` plus the project's own coordinates for `${...}` resolution.
fn parse_properties(content: &str) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    let mut parent = BTreeMap::new();
    let mut reader = Reader::from_str(content);
    let mut path: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).to_string());
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(e)) if path.len() >= 2 => {
                if let Ok(text) = e.unescape()
                    && let Some(name) = path.last()
                    && !text.trim().is_empty()
                {
                    let text = text.trim().to_string();
                    if path.len() == 3 && path[1] == "properties" {
                        props.insert(name.clone(), text);
                    } else if at(&path, &["version"])
                        || at(&path, &["groupId"])
                        || at(&path, &["artifactId"])
                    {
                        props.insert(format!("project.{}", name), text);
                    } else if at(&path, &["parent", "version"]) || at(&path, &["parent", "groupId"]) {
                        parent.insert(name.clone(), text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    // A module without its own groupId/version inherits the parent's
    for (name, value) in parent {
        props.insert(format!("project.parent.{}", name), value.clone());
        props.entry(format!("project.{}", name)).or_insert(value);
    }
    if let Some(version) = props.get("project.version").cloned() {
        props.entry("pom.version".to_string()).or_insert(version);
    }

    props
}

/// A `<dependency>` element as written.
#[derive(Debug, Default)]
struct PendingDependency {
    line: usize,
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    scope: Option<String>,
    exclusions: BTreeSet<Exclusion>,
}

/// Parse the direct `<dependencies>` section.
///
/// Errors carry the line and a description of the malformed XML.
fn parse_dependencies(content: &str) -> Result<Vec<PendingDependency>, (usize, String)> {
    let mut deps = Vec::new();
    let mut reader = Reader::from_str(content);
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<PendingDependency> = None;
    let mut exclusion: Option<Exclusion> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf);
        let line = line_at(content, reader.buffer_position() as usize);

        match event {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).to_string());

                if at(&path, &["dependencies", "dependency"]) {
                    current = Some(PendingDependency {
                        line,
                        ..Default::default()
                    });
                } else if at(&path, &["dependencies", "dependency", "exclusions", "exclusion"]) {
                    exclusion = Some(Exclusion {
                        group: None,
                        module: None,
                    });
                }
            }
            Ok(Event::End(_)) => {
                if at(&path, &["dependencies", "dependency"]) {
                    deps.extend(current.take());
                } else if at(&path, &["dependencies", "dependency", "exclusions", "exclusion"])
                    && let (Some(dep), Some(excl)) = (current.as_mut(), exclusion.take())
                    && (excl.group.is_some() || excl.module.is_some())
                {
                    dep.exclusions.insert(excl);
                }
                path.pop();
            }
            Ok(Event::Text(e)) => {
                if let Some(dep) = current.as_mut()
                    && let Ok(text) = e.unescape()
                    && !text.trim().is_empty()
                {
                    let text = text.trim().to_string();
                    let field = path.last().map(String::as_str);
                    if path.len() == 4 {
                        match field {
                            Some("groupId") => dep.group_id = Some(text),
                            Some("artifactId") => dep.artifact_id = Some(text),
                            Some("version") => dep.version = Some(text),
                            Some("scope") => dep.scope = Some(text),
                            _ => {}
                        }
                    } else if path.len() == 6
                        && let Some(excl) = exclusion.as_mut()
                    {
                        match field {
                            Some("groupId") => excl.group = Some(text),
                            Some("artifactId") => excl.module = Some(text),
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::Eof) => {
                if let Some(open) = path.last() {
                    return Err((line, format!("element <{}> is never closed", open)));
                }
                break;
            }
            Err(e) => return Err((line, format!("malformed XML: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(deps)
}

struct PropertyResolver<'a> {
    properties: &'a BTreeMap<String, String>,
    external: &'a BTreeMap<String, String>,
}

impl PropertyResolver<'_> {
    /// Substitute `${name}` references. Returns the text and the names that
    /// could not be resolved.
    fn resolve(&self, value: &str) -> (String, Vec<String>) {
        let mut unresolved = Vec::new();
        let text = self.resolve_depth(value, 0, &mut unresolved);
        (text, unresolved)
    }

    fn resolve_depth(&self, value: &str, depth: usize, unresolved: &mut Vec<String>) -> String {
        let mut out = String::with_capacity(value.len());
        let mut rest = value;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let Some(len) = rest[start + 2..].find('}') else {
                break;
            };
            let name = &rest[start + 2..start + 2 + len];
            let raw = &rest[start..start + 3 + len];

            match self.lookup(name) {
                Some(v) if depth < MAX_PROPERTY_DEPTH => {
                    out.push_str(&self.resolve_depth(v, depth + 1, unresolved))
                }
                _ => {
                    out.push_str(raw);
                    unresolved.push(name.to_string());
                }
            }
            rest = &rest[start + 3 + len..];
        }

        out.push_str(rest);
        out
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.properties
            .get(name)
            .or_else(|| self.external.get(name))
            .map(String::as_str)
    }
}

impl PendingDependency {
    fn resolve(self, resolver: &PropertyResolver, config: &ExtractorConfig, result: &mut FileResult) {
        let file = result.path.clone();
        let configuration = self.scope.unwrap_or_else(|| DEFAULT_SCOPE.to_string());
        let raw = [&self.group_id, &self.artifact_id, &self.version]
            .iter()
            .map(|s| s.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(":");

        result.declarations.push(DependencyDeclaration {
            configuration: configuration.clone(),
            raw_coordinate: raw.clone(),
            exclusions: self.exclusions.clone(),
            source_file: file.clone(),
            source_line: self.line,
            ignored: false,
        });

        let (Some(group_id), Some(artifact_id)) = (self.group_id, self.artifact_id) else {
            let err = MalformedCoordinate {
                segments: raw.split(':').filter(|s| !s.is_empty()).count(),
                raw,
            };
            result.diagnostics.push(Diagnostic::new(
                DiagnosticKind::MalformedCoordinate,
                &file,
                self.line,
                format!("<dependency>: {}", err),
            ));
            return;
        };

        let (group, mut unresolved) = resolver.resolve(&group_id);
        let (artifact, artifact_unresolved) = resolver.resolve(&artifact_id);
        unresolved.extend(artifact_unresolved);
        if !unresolved.is_empty() {
            result.diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnresolvedVariable,
                &file,
                self.line,
                format!(
                    "{}:{}: cannot resolve {} in groupId or artifactId; declaration dropped",
                    group_id,
                    artifact_id,
                    unresolved.join(", ")
                ),
            ));
            return;
        }

        let version = match self.version {
            None => {
                result.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnresolvedVariable,
                    &file,
                    self.line,
                    format!(
                        "{}:{}: no version; it is managed by a parent or <dependencyManagement>",
                        group, artifact
                    ),
                ));
                Version::Unresolved {
                    unresolved: MANAGED_VERSION.to_string(),
                }
            }
            Some(raw_version) => match resolver.resolve(&raw_version) {
                (text, missing) if missing.is_empty() => Version::Known(text),
                (_, missing) => {
                    result.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::UnresolvedVariable,
                        &file,
                        self.line,
                        format!(
                            "{}:{}: cannot resolve {}; version kept unresolved",
                            group,
                            artifact,
                            missing.join(", ")
                        ),
                    ));
                    Version::Unresolved {
                        unresolved: raw_version,
                    }
                }
            },
        };

        result.dependencies.push(ResolvedDependency {
            excluded: config.inventory.is_excluded(&group),
            group,
            artifact,
            version,
            configuration,
            exclusions: self.exclusions,
            source_file: file,
            source_line: self.line,
        });
    }
}
