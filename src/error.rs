//! Error types for the git-search-replace crate.

use std::path::PathBuf;

/// Search-and-replace error types.
///
/// `Configuration` and `Pattern` are fatal and surface before any file is
/// touched. `Replacement` and `Io` are local to one file; the pipeline
/// reports them and moves on. `FileAccess` marks a file that is skipped
/// without being counted as a failure.
#[derive(Debug, thiserror::Error)]
pub enum GsrError {
    /// Bad argument list: no expressions, missing separator, odd pair count.
    #[error("{0}")]
    Configuration(String),

    /// A FROM expression failed to compile.
    #[error("invalid FROM expression #{index} `{expression}`: {source}")]
    Pattern {
        index: usize,
        expression: String,
        #[source]
        source: regex::Error,
    },

    /// A `\G{...}` replacement failed to evaluate for a specific match.
    #[error("expression #{index}: cannot evaluate replacement for match `{matched}`: {message}")]
    Replacement {
        index: usize,
        matched: String,
        message: String,
    },

    /// File vanished, is not a regular file, or is not text.
    #[error("skipping {path}: {reason}")]
    FileAccess { path: PathBuf, reason: String },

    /// Subprocess execution failed.
    #[error("subprocess failed: {command}: {reason}")]
    Subprocess { command: String, reason: String },

    /// I/O error with context.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result type for git-search-replace operations.
pub type GsrResult<T> = Result<T, GsrError>;
