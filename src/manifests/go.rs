//! Go module manifests (go.mod).
//!
//! Only DIRECT dependencies are extracted, not transitive.
//! Go modules use paths like github.com/user/repo; the part before the last
//! `/` is reported as the group.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::loader::RawManifest;
use super::{FileResult, PackageDependency};
use crate::config::ExtractorConfig;
use crate::types::{DiagnosticKind, Dialect, Version};

/// A `require` line.
#[derive(Debug, PartialEq)]
struct Require<'a> {
    module: &'a str,
    version: &'a str,
    line: usize,
}

/// Right-hand side of a `replace` directive.
#[derive(Debug, PartialEq)]
struct Replacement<'a> {
    module: &'a str,
    version: Option<&'a str>,
}

#[derive(Debug, Default)]
struct GoMod<'a> {
    requires: Vec<Require<'a>>,
    replaces: HashMap<&'a str, Replacement<'a>>,
}

/// Extract direct dependencies from a go.mod.
pub fn extract_go(manifest: &RawManifest, config: &ExtractorConfig) -> FileResult {
    let file = manifest.display_path.clone();
    let mut result = FileResult::new(file.clone(), Dialect::Go);

    let go_mod = match parse_go_mod(&manifest.text) {
        Ok(go_mod) => go_mod,
        Err(open_line) => {
            warn!(file = %file.display(), line = open_line, "unclosed directive block");
            result.diagnose(
                DiagnosticKind::SyntaxImbalance,
                open_line,
                "directive block opened here is never closed".to_string(),
            );
            return result;
        }
    };

    for require in &go_mod.requires {
        let (module, version) = match go_mod.replaces.get(require.module) {
            Some(replacement) if is_local_path(replacement.module) => {
                result.diagnose(
                    DiagnosticKind::Skipped,
                    require.line,
                    format!(
                        "`{}` is replaced by local path `{}`",
                        require.module, replacement.module
                    ),
                );
                continue;
            }
            Some(replacement) => (
                replacement.module,
                replacement.version.unwrap_or(require.version),
            ),
            None => (require.module, require.version),
        };

        let (group, name) = match module.rsplit_once('/') {
            Some((group, name)) => (group.to_string(), name.to_string()),
            None => (String::new(), module.to_string()),
        };

        result.push_package(
            PackageDependency {
                group,
                name,
                requirement: version.to_string(),
                // Drop the v prefix for consistency with other ecosystems
                version: Version::Known(version.trim_start_matches('v').to_string()),
                configuration: "require".to_string(),
                line: require.line,
            },
            config,
        );
    }

    debug!(
        file = %file.display(),
        replaces = go_mod.replaces.len(),
        records = result.dependencies.len(),
        "extracted go module"
    );
    result
}

/// Parse go.mod content. An unclosed `directive (` block returns the line it
/// was opened on.
fn parse_go_mod(content: &str) -> Result<GoMod<'_>, usize> {
    let mut go_mod = GoMod::default();
    let mut block: Option<(&str, usize)> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;

        // Skip indirect dependencies
        if raw.contains("// indirect") {
            continue;
        }
        let line = raw.split("//").next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        if let Some((directive, _)) = block {
            if line == ")" {
                block = None;
            } else {
                go_mod.apply(directive, line, line_no);
            }
            continue;
        }

        let (directive, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        if rest == "(" {
            block = Some((directive, line_no));
        } else {
            go_mod.apply(directive, rest, line_no);
        }
    }

    match block {
        Some((_, open_line)) => Err(open_line),
        None => Ok(go_mod),
    }
}

impl<'a> GoMod<'a> {
    fn apply(&mut self, directive: &str, entry: &'a str, line: usize) {
        match directive {
            "require" => {
                if let Some(require) = parse_require_line(entry, line) {
                    self.requires.push(require);
                }
            }
            "replace" => {
                if let Some((old, replacement)) = parse_replace_line(entry) {
                    self.replaces.insert(old, replacement);
                }
            }
            // module, go, toolchain, exclude, retract
            _ => {}
        }
    }
}

/// Parse a single require line like "github.com/gin-gonic/gin v1.9.1"
fn parse_require_line(entry: &str, line: usize) -> Option<Require<'_>> {
    let mut parts = entry.split_whitespace();
    let module = parts.next()?;
    let version = parts.next()?;
    Some(Require {
        module,
        version,
        line,
    })
}

/// Parse "old [v] => new [v]". The old version is ignored.
fn parse_replace_line(entry: &str) -> Option<(&str, Replacement<'_>)> {
    let (old, new) = entry.split_once("=>")?;
    let old = old.split_whitespace().next()?;
    let mut new = new.split_whitespace();
    let module = new.next()?;
    Some((
        old,
        Replacement {
            module,
            version: new.next(),
        },
    ))
}

fn is_local_path(module: &str) -> bool {
    module.starts_with("./") || module.starts_with("../") || module.starts_with('/')
}
