//! Gradle build scripts (Groovy `.gradle` and Kotlin `.gradle.kts`).
//!
//! Pipeline: comment stripping, statement scanning, then a single walk of the
//! call tree that tracks variable scopes, classifies each call and parses the
//! coordinates of declarations.

mod ast;
mod classify;
mod comments;
mod coordinate;
mod resolver;
mod scanner;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use self::ast::{CallForm, CallNode};
use self::classify::{Classification, Classifier, Context};
use self::comments::strip_comments;
use self::coordinate::{CoordinateParser, Parsed};
use self::resolver::{Resolver, ext_binding_name};
use self::scanner::scan;
use super::FileResult;
use super::loader::RawManifest;
use crate::config::ExtractorConfig;
use crate::types::{Diagnostic, DiagnosticKind, Dialect};

/// Block whose assignments define project-wide `ext` properties.
const EXT_BLOCK: &str = "ext";

/// Extract dependency declarations from one Gradle build script.
///
/// `properties` holds the `gradle.properties` values visible to the script.
pub fn extract_gradle(
    manifest: &RawManifest,
    config: &ExtractorConfig,
    properties: &BTreeMap<String, String>,
) -> FileResult {
    let file = manifest.display_path.as_path();
    let mut result = FileResult::new(manifest.display_path.clone(), Dialect::Gradle);

    let stripped = strip_comments(&manifest.text);
    if let Some(open) = stripped.unterminated {
        warn!(file = %file.display(), line = open.line(), "{}", open.describe());
        result.diagnostics.push(Diagnostic::new(
            DiagnosticKind::SyntaxImbalance,
            file,
            open.line(),
            open.describe(),
        ));
        return result;
    }

    let nodes = match scan(&stripped.text) {
        Ok(nodes) => nodes,
        Err(imbalance) => {
            warn!(file = %file.display(), line = imbalance.line(), "{}", imbalance.describe());
            result.diagnostics.push(Diagnostic::new(
                DiagnosticKind::SyntaxImbalance,
                file,
                imbalance.line(),
                imbalance.describe(),
            ));
            return result;
        }
    };

    let classifier = Classifier::new(&config.keywords);
    let parser = CoordinateParser::new(&classifier, &config.inventory, file);
    let mut walker = Walker {
        classifier: &classifier,
        parser,
        resolver: Resolver::new(&config.substitutions, properties),
        result: &mut result,
    };
    walker.walk(&nodes, Context::TopLevel, false);

    debug!(
        file = %file.display(),
        comments = stripped.spans.len(),
        records = result.dependencies.len(),
        diagnostics = result.diagnostics.len(),
        "extracted gradle manifest"
    );
    result
}

struct Walker<'a, 'r> {
    classifier: &'a Classifier<'a>,
    parser: CoordinateParser<'a>,
    resolver: Resolver<'a>,
    result: &'r mut FileResult,
}

impl Walker<'_, '_> {
    /// Walk one block in source order. `in_ext` marks the body of an `ext { }`
    /// block, whose assignments bind at file level.
    fn walk(&mut self, nodes: &[CallNode], context: Context, in_ext: bool) {
        for node in nodes {
            if node.form == CallForm::Assignment {
                self.bind(node, in_ext);
                continue;
            }

            if node.name == EXT_BLOCK && !self.resolver.is_bound(EXT_BLOCK) {
                self.descend(node, context, true);
                continue;
            }

            match self.classifier.classify(node, context, &self.resolver) {
                Classification::Declaration => {
                    let parsed = self.parser.parse_declaration(node, &self.resolver);
                    self.absorb(parsed);
                }
                Classification::Ignored => {
                    let parsed = self.parser.parse_ignored(node, &self.resolver);
                    self.absorb(parsed);
                }
                Classification::Skipped => self.diagnose(
                    DiagnosticKind::Skipped,
                    node,
                    format!("`{}` is not an external dependency", node),
                ),
                Classification::Block => self.descend(node, Context::Dependencies, false),
                Classification::Unsupported => {
                    let message = if self.resolver.is_bound(&node.name) {
                        format!(
                            "`{}` is not a dependency declaration (`{}` is shadowed by a local binding)",
                            node, node.name
                        )
                    } else {
                        format!("`{}` is not a dependency declaration", node)
                    };
                    self.diagnose(DiagnosticKind::UnsupportedConstruct, node, message);
                    self.descend(node, context, false);
                }
                Classification::Unrelated => self.descend(node, Context::Other, false),
            }
        }
    }

    fn descend(&mut self, node: &CallNode, context: Context, in_ext: bool) {
        let Some(block) = &node.nested_block else {
            return;
        };
        self.resolver.enter_scope();
        self.walk(block, context, in_ext);
        self.resolver.exit_scope();
    }

    fn bind(&mut self, node: &CallNode, in_ext: bool) {
        let value = node
            .arguments
            .first()
            .and_then(|arg| self.resolver.evaluate(arg));

        match ext_binding_name(&node.name) {
            Some(name) => self.resolver.bind_root(name, value),
            None if in_ext => self.resolver.bind_root(&node.name, value),
            None => self.resolver.bind(&node.name, value),
        }
    }

    fn absorb(&mut self, parsed: Parsed) {
        self.result.declarations.extend(parsed.declarations);
        self.result.dependencies.extend(parsed.dependencies);
        self.result.diagnostics.extend(parsed.diagnostics);
    }

    fn diagnose(&mut self, kind: DiagnosticKind, node: &CallNode, message: String) {
        self.result.diagnostics.push(Diagnostic::new(
            kind,
            &self.result.path,
            node.source_line,
            message,
        ));
    }
}
