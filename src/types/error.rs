use std::path::PathBuf;

use thiserror::Error;

/// Infrastructure failures of an extraction run.
///
/// Findings inside a manifest are `Diagnostic`s, not errors. These variants
/// cover what stops a file (or, in strict mode, the whole run) from being
/// processed at all.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no manifest files found under {}", .0.display())]
    NoManifests(PathBuf),

    #[error("strict mode: {count} diagnostic(s) are fatal to the run, first: {first}")]
    Strict { count: usize, first: String },
}

/// A coordinate literal that does not split into exactly three non-empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected group:artifact:version, found '{raw}' ({segments} segment(s))")]
pub struct MalformedCoordinate {
    pub raw: String,
    pub segments: usize,
}
