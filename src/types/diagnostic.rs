use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Expected, informational (ignored or skipped declarations).
    Info,
    Warning,
    /// The declaration or the whole file could not be extracted.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Fatal => "fatal",
        })
    }
}

/// Kinds of findings recorded during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DiagnosticKind {
    /// Unterminated string, comment, brace or XML element. Abandons the file.
    SyntaxImbalance,
    /// The manifest could not be read. Abandons the file.
    Unreadable,
    /// Coordinate did not have three non-empty segments. Drops the declaration.
    MalformedCoordinate,
    UnresolvedVariable,
    DuplicateDeclaration,
    UnsupportedConstruct,
    Ignored,
    Skipped,
}

impl DiagnosticKind {
    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::SyntaxImbalance
            | DiagnosticKind::Unreadable
            | DiagnosticKind::MalformedCoordinate => Severity::Fatal,
            DiagnosticKind::UnresolvedVariable
            | DiagnosticKind::DuplicateDeclaration
            | DiagnosticKind::UnsupportedConstruct => Severity::Warning,
            DiagnosticKind::Ignored | DiagnosticKind::Skipped => Severity::Info,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{:?}", self))
    }
}

/// A position in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// A finding recorded against a file and line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    /// Second location involved, e.g. the first occurrence of a duplicate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<Location>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, file: &Path, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            location: Location::new(file, line),
            message: message.into(),
            related: None,
        }
    }

    pub fn with_related(mut self, related: Location) -> Self {
        self.related = Some(related);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} [{}] {}",
            self.location, self.severity, self.kind, self.message
        )?;
        if let Some(related) = &self.related {
            write!(f, " (see {})", related)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_by_kind() {
        assert_eq!(DiagnosticKind::SyntaxImbalance.severity(), Severity::Fatal);
        assert_eq!(DiagnosticKind::MalformedCoordinate.severity(), Severity::Fatal);
        assert_eq!(DiagnosticKind::UnresolvedVariable.severity(), Severity::Warning);
        assert_eq!(DiagnosticKind::Ignored.severity(), Severity::Info);
        assert_eq!(DiagnosticKind::Skipped.severity(), Severity::Info);
    }

    #[test]
    fn test_display_with_related() {
        let d = Diagnostic::new(
            DiagnosticKind::DuplicateDeclaration,
            Path::new("build.gradle"),
            34,
            "duplicate of ns:c:1.0.0",
        )
        .with_related(Location::new("build.gradle", 6));
        assert_eq!(
            d.to_string(),
            "build.gradle:34: warning [DuplicateDeclaration] duplicate of ns:c:1.0.0 (see build.gradle:6)"
        );
    }
}
