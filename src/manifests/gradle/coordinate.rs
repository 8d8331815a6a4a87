//! Coordinate parsing for classified declaration calls.
//!
//! Accepted shapes:
//! - `conf 'group:artifact:version'` (after interpolation)
//! - `conf group: 'g', name: 'a', version: 'v'` (Kotlin: `group = ..`)
//! - either of the above wrapped in a helper such as `platform(..)`
//!
//! plus an optional `{ exclude group: .., module: .. }` block.

use std::collections::BTreeSet;
use std::path::Path;

use super::ast::{Argument, CallNode};
use super::classify::Classifier;
use super::resolver::Resolver;
use crate::config::InventoryConfig;
use crate::types::{
    Coordinate, DependencyDeclaration, Diagnostic, DiagnosticKind, Exclusion, MalformedCoordinate,
    ResolvedDependency, Version,
};

/// Everything produced by one declaration call.
#[derive(Debug, Default)]
pub struct Parsed {
    pub declarations: Vec<DependencyDeclaration>,
    pub dependencies: Vec<ResolvedDependency>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct CoordinateParser<'a> {
    classifier: &'a Classifier<'a>,
    inventory: &'a InventoryConfig,
    file: &'a Path,
}

/// One declaration being parsed.
struct Declared<'n> {
    node: &'n CallNode,
    exclusions: BTreeSet<Exclusion>,
}

impl<'a> CoordinateParser<'a> {
    pub fn new(classifier: &'a Classifier<'a>, inventory: &'a InventoryConfig, file: &'a Path) -> Self {
        Self {
            classifier,
            inventory,
            file,
        }
    }

    /// Parse a real declaration. Each positional coordinate yields its own record.
    pub fn parse_declaration(&self, node: &CallNode, resolver: &Resolver) -> Parsed {
        let mut out = Parsed::default();
        let decl = Declared {
            node,
            exclusions: collect_exclusions(node, resolver),
        };

        if node.named("name").is_some() {
            self.parse_map(&decl, node, resolver, &mut out);
            return out;
        }

        let positional: Vec<&Argument> = node.positional().collect();
        if positional.is_empty() {
            let err = MalformedCoordinate {
                raw: node.arguments_text(),
                segments: 0,
            };
            self.diagnose(&mut out, DiagnosticKind::MalformedCoordinate, node, format!("`{}`: {}", node, err));
            return out;
        }

        for arg in positional {
            self.parse_argument(&decl, arg, resolver, &mut out);
        }
        out
    }

    /// Record an ignored call: one declaration flagged `ignored`, one `Ignored`
    /// diagnostic, nothing in the inventory.
    pub fn parse_ignored(&self, node: &CallNode, resolver: &Resolver) -> Parsed {
        let raw_coordinate = match node.arguments.as_slice() {
            [Argument::StringLiteral { text, .. }] => text.clone(),
            _ => node.arguments_text(),
        };

        let exclusions = collect_exclusions(node, resolver);
        let mut message = format!("`{}` matches ignore keyword `{}`", node, node.name);
        if !exclusions.is_empty() {
            let listed: Vec<String> = exclusions.iter().map(|e| e.to_string()).collect();
            message.push_str(&format!(" (excludes {})", listed.join(", ")));
        }

        let mut out = Parsed::default();
        out.declarations.push(DependencyDeclaration {
            configuration: node.name.clone(),
            raw_coordinate,
            exclusions,
            source_file: self.file.to_path_buf(),
            source_line: node.source_line,
            ignored: true,
        });
        self.diagnose(&mut out, DiagnosticKind::Ignored, node, message);
        out
    }

    fn parse_argument(&self, decl: &Declared, arg: &Argument, resolver: &Resolver, out: &mut Parsed) {
        let node = decl.node;
        match arg {
            Argument::StringLiteral {
                text,
                has_interpolation,
            } => self.parse_string(decl, text, *has_interpolation, resolver, out),
            Argument::Reference(name) => match resolver.lookup(name) {
                Some(value) => self.parse_resolved(decl, name, &value, out),
                None => self.diagnose(
                    out,
                    DiagnosticKind::UnresolvedVariable,
                    node,
                    format!("`{}`: cannot resolve `{}`; declaration dropped", node, name),
                ),
            },
            Argument::Call(call) if self.classifier.is_wrapper(&call.name) => {
                if call.named("name").is_some() {
                    self.parse_map(decl, call, resolver, out);
                    return;
                }
                match call.positional().next() {
                    Some(inner) => self.parse_argument(decl, inner, resolver, out),
                    None => {
                        let err = MalformedCoordinate {
                            raw: call.arguments_text(),
                            segments: 0,
                        };
                        self.diagnose(out, DiagnosticKind::MalformedCoordinate, node, format!("`{}`: {}", node, err));
                    }
                }
            }
            Argument::Call(call) if self.classifier.is_skipped(&call.name) => self.diagnose(
                out,
                DiagnosticKind::Skipped,
                node,
                format!("`{}` does not reference an external module", node),
            ),
            Argument::List(items) => {
                for item in items {
                    self.parse_argument(decl, item, resolver, out);
                }
            }
            other => self.diagnose(
                out,
                DiagnosticKind::UnsupportedConstruct,
                node,
                format!("`{}`: cannot interpret argument `{}`", node, other),
            ),
        }
    }

    fn parse_string(
        &self,
        decl: &Declared,
        raw: &str,
        interpolating: bool,
        resolver: &Resolver,
        out: &mut Parsed,
    ) {
        let node = decl.node;
        out.declarations.push(self.declaration(decl, raw));

        if !interpolating {
            self.emit_literal(decl, raw, raw, out);
            return;
        }

        let full = resolver.interpolate(raw);
        if full.is_resolved() {
            self.emit_literal(decl, raw, &full.text, out);
            return;
        }

        let segments = split_segments(raw);
        let [group, artifact, version] = segments.as_slice() else {
            self.diagnose(
                out,
                DiagnosticKind::UnresolvedVariable,
                node,
                format!(
                    "`{}`: cannot resolve {}; declaration dropped",
                    node,
                    quoted_names(&full.unresolved)
                ),
            );
            return;
        };

        let group = resolver.interpolate(group);
        let artifact = resolver.interpolate(artifact);
        if !group.is_resolved() || !artifact.is_resolved() {
            let mut names = group.unresolved;
            names.extend(artifact.unresolved);
            self.diagnose(
                out,
                DiagnosticKind::UnresolvedVariable,
                node,
                format!(
                    "`{}`: cannot resolve {} in group or artifact; declaration dropped",
                    node,
                    quoted_names(&names)
                ),
            );
            return;
        }
        if group.text.is_empty() || artifact.text.is_empty() {
            let err = MalformedCoordinate {
                raw: raw.to_string(),
                segments: segments.len(),
            };
            self.diagnose(out, DiagnosticKind::MalformedCoordinate, node, format!("`{}`: {}", node, err));
            return;
        }

        self.diagnose(
            out,
            DiagnosticKind::UnresolvedVariable,
            node,
            format!(
                "`{}`: cannot resolve {}; version kept unresolved",
                node,
                quoted_names(&full.unresolved)
            ),
        );
        out.dependencies.push(self.record(
            decl,
            group.text,
            artifact.text,
            Version::Unresolved {
                unresolved: version.to_string(),
            },
        ));
    }

    /// A Reference argument that resolved to a literal coordinate.
    fn parse_resolved(&self, decl: &Declared, name: &str, value: &str, out: &mut Parsed) {
        out.declarations.push(self.declaration(decl, name));
        self.emit_literal(decl, name, value, out);
    }

    fn parse_map(&self, decl: &Declared, call: &CallNode, resolver: &Resolver, out: &mut Parsed) {
        let node = decl.node;
        let field = |key: &str| call.named(key).map(|arg| (arg, resolver.evaluate(arg)));
        let (group, artifact, version) = (field("group"), field("name"), field("version"));

        let raw = [&group, &artifact, &version]
            .iter()
            .map(|f| match f {
                Some((_, Some(value))) => value.clone(),
                Some((arg, None)) => arg.to_string(),
                None => String::new(),
            })
            .collect::<Vec<_>>()
            .join(":");
        out.declarations.push(self.declaration(decl, &raw));

        let present = [&group, &artifact, &version].iter().filter(|f| f.is_some()).count();
        let (Some((_, group_value)), Some((_, artifact_value)), Some((version_arg, version_value))) =
            (group, artifact, version)
        else {
            let err = MalformedCoordinate {
                raw,
                segments: present,
            };
            self.diagnose(out, DiagnosticKind::MalformedCoordinate, node, format!("`{}`: {}", node, err));
            return;
        };

        let (Some(group_value), Some(artifact_value)) = (group_value, artifact_value) else {
            self.diagnose(
                out,
                DiagnosticKind::UnresolvedVariable,
                node,
                format!("`{}`: cannot resolve group or name; declaration dropped", node),
            );
            return;
        };
        if group_value.is_empty() || artifact_value.is_empty() {
            let err = MalformedCoordinate {
                raw,
                segments: present,
            };
            self.diagnose(out, DiagnosticKind::MalformedCoordinate, node, format!("`{}`: {}", node, err));
            return;
        }

        let version = match version_value {
            Some(v) if !v.is_empty() => Version::Known(v),
            Some(_) => {
                let err = MalformedCoordinate {
                    raw,
                    segments: present,
                };
                self.diagnose(out, DiagnosticKind::MalformedCoordinate, node, format!("`{}`: {}", node, err));
                return;
            }
            None => {
                let raw_version = match version_arg {
                    Argument::StringLiteral { text, .. } => text.clone(),
                    other => other.to_string(),
                };
                self.diagnose(
                    out,
                    DiagnosticKind::UnresolvedVariable,
                    node,
                    format!("`{}`: cannot resolve version `{}`; version kept unresolved", node, raw_version),
                );
                Version::Unresolved {
                    unresolved: raw_version,
                }
            }
        };

        out.dependencies
            .push(self.record(decl, group_value, artifact_value, version));
    }

    /// Split a fully known coordinate; `raw` is what the manifest wrote.
    fn emit_literal(&self, decl: &Declared, raw: &str, text: &str, out: &mut Parsed) {
        match Coordinate::parse(text) {
            Ok(c) => out
                .dependencies
                .push(self.record(decl, c.group, c.artifact, Version::Known(c.version))),
            Err(err) => {
                let message = if raw == text {
                    format!("`{}`: {}", decl.node, err)
                } else {
                    format!("`{}`: {} (from `{}`)", decl.node, err, raw)
                };
                self.diagnose(out, DiagnosticKind::MalformedCoordinate, decl.node, message);
            }
        }
    }

    fn declaration(&self, decl: &Declared, raw: &str) -> DependencyDeclaration {
        DependencyDeclaration {
            configuration: decl.node.name.clone(),
            raw_coordinate: raw.to_string(),
            exclusions: decl.exclusions.clone(),
            source_file: self.file.to_path_buf(),
            source_line: decl.node.source_line,
            ignored: false,
        }
    }

    fn record(&self, decl: &Declared, group: String, artifact: String, version: Version) -> ResolvedDependency {
        ResolvedDependency {
            excluded: self.inventory.is_excluded(&group),
            group,
            artifact,
            version,
            configuration: decl.node.name.clone(),
            exclusions: decl.exclusions.clone(),
            source_file: self.file.to_path_buf(),
            source_line: decl.node.source_line,
        }
    }

    fn diagnose(&self, out: &mut Parsed, kind: DiagnosticKind, node: &CallNode, message: String) {
        out.diagnostics
            .push(Diagnostic::new(kind, self.file, node.source_line, message));
    }
}

/// `exclude` entries of the call's nested block, deduplicated.
pub fn collect_exclusions(node: &CallNode, resolver: &Resolver) -> BTreeSet<Exclusion> {
    let Some(block) = &node.nested_block else {
        return BTreeSet::new();
    };

    block
        .iter()
        .filter(|entry| entry.name == "exclude")
        .filter_map(|entry| {
            let exclusion = Exclusion {
                group: entry.named("group").and_then(|arg| resolver.evaluate(arg)),
                module: entry.named("module").and_then(|arg| resolver.evaluate(arg)),
            };
            (exclusion.group.is_some() || exclusion.module.is_some()).then_some(exclusion)
        })
        .collect()
}

/// Split a template on `:` outside `${ .. }`.
fn split_segments(template: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '$' if chars.peek() == Some(&'{') => {
                depth += 1;
                current.push(c);
            }
            '}' if depth > 0 => {
                depth -= 1;
                current.push(c);
            }
            ':' if depth == 0 => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    segments.push(current);
    segments
}

fn quoted_names(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("`{}`", n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeywordConfig;
    use crate::manifests::gradle::ast::CallForm;
    use crate::manifests::gradle::scanner::scan;
    use std::collections::BTreeMap;

    struct Fixture {
        keywords: KeywordConfig,
        inventory: InventoryConfig,
        external: BTreeMap<String, String>,
        properties: BTreeMap<String, String>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                keywords: KeywordConfig::default(),
                inventory: InventoryConfig::default(),
                external: BTreeMap::new(),
                properties: BTreeMap::new(),
            }
        }

        fn parse(&self, source: &str) -> Parsed {
            let node = scan(source).unwrap().remove(0);
            let classifier = Classifier::new(&self.keywords);
            let parser = CoordinateParser::new(&classifier, &self.inventory, Path::new("build.gradle"));
            let resolver = Resolver::new(&self.external, &self.properties);
            parser.parse_declaration(&node, &resolver)
        }
    }

    #[test]
    fn test_literal_coordinate() {
        let parsed = Fixture::new().parse("implementation 'ns_a:c_a:1.0.0'\n");

        assert_eq!(parsed.dependencies.len(), 1);
        let dep = &parsed.dependencies[0];
        assert_eq!(dep.group, "ns_a");
        assert_eq!(dep.artifact, "c_a");
        assert_eq!(dep.version, Version::Known("1.0.0".into()));
        assert_eq!(dep.configuration, "implementation");
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(parsed.declarations[0].raw_coordinate, "ns_a:c_a:1.0.0");
    }

    #[test]
    fn test_malformed_dropped() {
        let parsed = Fixture::new().parse("implementation 'ns:c'\n");

        assert!(parsed.dependencies.is_empty());
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::MalformedCoordinate);
    }

    #[test]
    fn test_unresolved_version_kept_with_marker() {
        let parsed = Fixture::new().parse("implementation \"ns_b:c_b:$version\"\n");

        assert_eq!(parsed.dependencies.len(), 1);
        assert_eq!(
            parsed.dependencies[0].version,
            Version::Unresolved {
                unresolved: "$version".into()
            }
        );
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::UnresolvedVariable);
    }

    #[test]
    fn test_substituted_version() {
        let mut fixture = Fixture::new();
        fixture.external.insert("version".into(), "4.8.0".into());
        let parsed = fixture.parse("api \"ns_d:c_d:${version}\"\n");

        assert_eq!(parsed.dependencies[0].version, Version::Known("4.8.0".into()));
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn test_unresolved_group_drops_declaration() {
        let parsed = Fixture::new().parse("implementation \"$group:core:1.0\"\n");

        assert!(parsed.dependencies.is_empty());
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::UnresolvedVariable);
    }

    #[test]
    fn test_variable_holding_whole_coordinate() {
        let mut fixture = Fixture::new();
        fixture.properties.insert("okhttp".into(), "com.squareup.okhttp3:okhttp:4.12.0".into());

        let parsed = fixture.parse("implementation \"$okhttp\"\n");
        assert_eq!(parsed.dependencies[0].artifact, "okhttp");

        let parsed = fixture.parse("implementation okhttp\n");
        assert_eq!(parsed.dependencies[0].version, Version::Known("4.12.0".into()));

        let parsed = fixture.parse("implementation libs.missing\n");
        assert!(parsed.dependencies.is_empty());
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::UnresolvedVariable);
    }

    #[test]
    fn test_map_notation() {
        let parsed = Fixture::new()
            .parse("implementation group: 'org.slf4j', name: 'slf4j-api', version: '2.0.9'\n");
        assert_eq!(parsed.dependencies[0].to_string(), "org.slf4j:slf4j-api:2.0.9");

        let parsed = Fixture::new()
            .parse("implementation(group = \"org.slf4j\", name = \"slf4j-api\", version = \"2.0.9\")\n");
        assert_eq!(parsed.dependencies[0].artifact, "slf4j-api");

        let parsed = Fixture::new().parse("implementation group: 'org.slf4j', name: 'slf4j-api'\n");
        assert!(parsed.dependencies.is_empty());
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::MalformedCoordinate);
    }

    #[test]
    fn test_wrappers_and_helpers() {
        let parsed = Fixture::new().parse("implementation platform('io.grpc:grpc-bom:1.60.0')\n");
        assert_eq!(parsed.dependencies[0].artifact, "grpc-bom");

        let parsed = Fixture::new().parse("implementation project(':core')\n");
        assert!(parsed.dependencies.is_empty());
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::Skipped);

        let parsed = Fixture::new().parse("implementation kotlin('stdlib')\n");
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::UnsupportedConstruct);
    }

    #[test]
    fn test_concatenated_version() {
        let mut fixture = Fixture::new();
        fixture.external.insert("okhttpVersion".into(), "4.12.0".into());
        let parsed = fixture.parse("implementation 'com.squareup.okhttp3:okhttp:' + okhttpVersion\n");

        assert_eq!(parsed.dependencies[0].version, Version::Known("4.12.0".into()));
    }

    #[test]
    fn test_multiple_coordinates() {
        let parsed = Fixture::new().parse("implementation 'a:b:1', 'c:d:2'\n");
        assert_eq!(parsed.dependencies.len(), 2);
        assert_eq!(parsed.declarations.len(), 2);
    }

    #[test]
    fn test_no_arguments_malformed() {
        let parsed = Fixture::new().parse("implementation()\n");
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::MalformedCoordinate);
    }

    #[test]
    fn test_duplicate_exclusions_collapse() {
        let parsed = Fixture::new().parse(
            "implementation('ns:c:0.0.0') {\n    exclude group: 'ns', module: 'c'\n    exclude group: 'ns', module: 'c'\n    exclude module: 'commons-logging'\n}\n",
        );

        let exclusions = &parsed.dependencies[0].exclusions;
        assert_eq!(exclusions.len(), 2);
        assert!(exclusions.contains(&Exclusion {
            group: Some("ns".into()),
            module: Some("c".into())
        }));
        assert!(exclusions.contains(&Exclusion {
            group: None,
            module: Some("commons-logging".into())
        }));
    }

    #[test]
    fn test_excluded_group_flagged() {
        let mut fixture = Fixture::new();
        fixture.inventory.excluded_groups.push("com.example*".into());

        let parsed = fixture.parse("implementation 'com.example.core:core:1.0'\n");
        assert!(parsed.dependencies[0].excluded);
    }

    #[test]
    fn test_parse_ignored() {
        let keywords = KeywordConfig::default();
        let inventory = InventoryConfig::default();
        let empty = BTreeMap::new();
        let classifier = Classifier::new(&keywords);
        let parser = CoordinateParser::new(&classifier, &inventory, Path::new("build.gradle"));
        let resolver = Resolver::new(&empty, &empty);

        let node = scan("to_ignore('ns:c:0.0.0') {\n    exclude group: 'ns', module: 'c'\n}\n")
            .unwrap()
            .remove(0);
        let parsed = parser.parse_ignored(&node, &resolver);

        assert!(parsed.dependencies.is_empty());
        assert_eq!(parsed.declarations.len(), 1);
        assert!(parsed.declarations[0].ignored);
        assert_eq!(parsed.declarations[0].raw_coordinate, "ns:c:0.0.0");
        assert_eq!(parsed.declarations[0].exclusions.len(), 1);
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::Ignored);
        assert!(parsed.diagnostics[0].message.ends_with("(excludes ns:c)"));

        let helper = CallNode::new("to_ignore", CallForm::Command, 3);
        assert_eq!(parser.parse_ignored(&helper, &resolver).diagnostics.len(), 1);
    }

    #[test]
    fn test_split_segments() {
        assert_eq!(split_segments("g:a:${v}"), vec!["g", "a", "${v}"]);
        assert_eq!(split_segments("g:a:${map['k:x']}"), vec!["g", "a", "${map['k:x']}"]);
        assert_eq!(split_segments("g:a"), vec!["g", "a"]);
    }
}
