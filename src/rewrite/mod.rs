//! Rewrite pipeline.
//!
//! One run walks the filtered tracked files twice:
//!
//! 1. **Content pass**: every expression is applied, in order, to each
//!    text file. A changed file is either reported grep-style, shown as a
//!    unified diff, or written back (`fix`).
//! 2. **Rename pass**: the same expressions are applied to each path in
//!    filename context. A changed path is reported and, with `fix`, moved
//!    through the [`Repository`].
//!
//! Compilation problems abort before any file is read. Anything that goes
//! wrong for a single file is recorded in the [`RunSummary`] and the run
//! carries on.

pub mod diff;
pub mod grep;
pub mod lines;

use std::io::{Read as _, Write};
use std::path::Path;

use anyhow::Result;
use tracing::{debug, info};

use crate::error::{GsrError, GsrResult};
use crate::expr::{CompiledExpression, RewriteContext, SeparatorPolicy, apply_all, compile_expressions};
use crate::filter::{FileFilter, FilterRule};
use crate::repo::Repository;

/// Max bytes to check for binary content detection.
const BINARY_CHECK_BYTES: usize = 8192;

/// Everything a run needs besides the repository.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Raw FROM/TO arguments.
    pub expressions: Vec<String>,
    pub separator: SeparatorPolicy,
    /// Write changes and perform renames.
    pub fix: bool,
    /// Print unified diffs of content changes.
    pub diff: bool,
    /// Run the rename pass.
    pub renames: bool,
    /// Include/exclude rules in command-line order.
    pub filters: Vec<FilterRule>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            expressions: Vec::new(),
            separator: SeparatorPolicy::default(),
            fix: false,
            diff: false,
            renames: true,
            filters: Vec::new(),
        }
    }
}

/// A path change computed by the rename pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub source: String,
    pub destination: String,
}

/// A file whose processing failed.
#[derive(Debug)]
pub struct FileFailure {
    pub path: String,
    pub error: anyhow::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    PreviewedOnly,
    Applied,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunSummary {
    pub state: RunState,
    /// Files whose content would change (or did, with `fix`).
    pub changed_files: Vec<String>,
    pub renames: Vec<RenamePlan>,
    pub failures: Vec<FileFailure>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Compiled, ready-to-run search and replace.
pub struct SearchReplace<'r, R: Repository> {
    repo: &'r R,
    options: RunOptions,
    expressions: Vec<CompiledExpression>,
    filter: FileFilter,
}

impl<'r, R: Repository> SearchReplace<'r, R> {
    /// Compile expressions and filters. Nothing is read yet.
    pub fn new(repo: &'r R, options: RunOptions) -> GsrResult<Self> {
        let expressions = compile_expressions(&options.expressions, &options.separator)?;
        let filter = FileFilter::new(&options.filters)?;
        Ok(Self {
            repo,
            options,
            expressions,
            filter,
        })
    }

    /// Run both passes, writing the report to `out`.
    ///
    /// Only a failure to enumerate files is returned as an error.
    pub fn run(&self, out: &mut impl Write) -> GsrResult<RunSummary> {
        let tracked = self.repo.list_tracked_files()?;
        let total = tracked.len();
        let files = self.filter.apply(tracked);
        debug!(total, selected = files.len(), "enumerated tracked files");

        let mut summary = RunSummary {
            state: if self.options.fix {
                RunState::Applied
            } else {
                RunState::PreviewedOnly
            },
            changed_files: Vec::new(),
            renames: Vec::new(),
            failures: Vec::new(),
        };

        for filename in &files {
            match self.process_file(filename, out) {
                Ok(true) => summary.changed_files.push(filename.clone()),
                Ok(false) => {}
                Err(error) => {
                    debug!(file = %filename, error = %error, "file failed");
                    summary.failures.push(FileFailure {
                        path: filename.clone(),
                        error,
                    });
                }
            }
        }

        if self.options.renames {
            for filename in &files {
                match self.rename_file(filename, out) {
                    Ok(Some(plan)) => summary.renames.push(plan),
                    Ok(None) => {}
                    Err(error) => summary.failures.push(FileFailure {
                        path: filename.clone(),
                        error,
                    }),
                }
            }
        }

        Ok(summary)
    }

    /// Content pass for one file. Returns whether its content changes.
    fn process_file(&self, filename: &str, out: &mut impl Write) -> Result<bool> {
        let path = self.repo.root().join(filename);
        let content = match read_text(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(error = %e, "not applicable");
                return Ok(false);
            }
        };

        let new_content = apply_all(&self.expressions, &content, RewriteContext::Content)?;
        if new_content == content {
            return Ok(false);
        }

        if self.options.diff {
            let rendered = diff::render_diff(&path, filename, &new_content)?;
            writeln!(out, "{filename}")?;
            out.write_all(rendered.as_bytes())?;
        }

        if self.options.fix {
            crate::util::atomic::atomic_write(&path, &new_content)?;
            info!(file = %filename, "rewrote file");
        } else if !self.options.diff {
            for line in grep::grep_report(filename, &content, &self.expressions)? {
                writeln!(out, "{line}")?;
            }
        }

        Ok(true)
    }

    /// Rename pass for one path.
    fn rename_file(&self, filename: &str, out: &mut impl Write) -> Result<Option<RenamePlan>> {
        let destination = apply_all(&self.expressions, filename, RewriteContext::Filename)?;
        if destination == filename {
            return Ok(None);
        }

        writeln!(out)?;
        writeln!(out, "rename-src-file: {filename}")?;
        writeln!(out, "rename-dst-file: {destination}")?;

        if self.options.fix {
            let target = self.repo.root().join(&destination);
            if let Some(parent) = target.parent().filter(|p| !p.exists()) {
                std::fs::create_dir_all(parent).map_err(|source| GsrError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            self.repo.move_path(filename, &destination)?;
            info!(from = %filename, to = %destination, "renamed file");
        }

        Ok(Some(RenamePlan {
            source: filename.to_owned(),
            destination,
        }))
    }
}

/// Read a file as UTF-8 text.
///
/// Missing files, non-regular files (symlinks too: a tracked link is never
/// read through), files with a NUL byte in their first [`BINARY_CHECK_BYTES`],
/// and non-UTF-8 files come back as [`GsrError::FileAccess`].
pub fn read_text(path: &Path) -> GsrResult<String> {
    let skip = |reason: String| GsrError::FileAccess {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = std::fs::symlink_metadata(path).map_err(|e| skip(e.to_string()))?;
    if !metadata.is_file() {
        return Err(skip("not a regular file".to_owned()));
    }

    let file = std::fs::File::open(path).map_err(|e| skip(e.to_string()))?;

    let mut bytes = Vec::new();
    (&file)
        .read_to_end(&mut bytes)
        .map_err(|e| skip(e.to_string()))?;

    let head = &bytes[..bytes.len().min(BINARY_CHECK_BYTES)];
    if head.contains(&0) {
        return Err(skip("binary file".to_owned()));
    }

    String::from_utf8(bytes).map_err(|_| skip("not valid UTF-8".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_text_skips_binary_and_missing() {
        let dir = tempfile::tempdir().expect("tempdir");

        let text = dir.path().join("a.txt");
        std::fs::write(&text, "hi\n").expect("seed");
        assert_eq!(read_text(&text).expect("text"), "hi\n");

        let binary = dir.path().join("b.bin");
        std::fs::write(&binary, b"ab\0cd").expect("seed");
        assert!(matches!(read_text(&binary), Err(GsrError::FileAccess { .. })));

        let latin1 = dir.path().join("c.txt");
        std::fs::write(&latin1, b"caf\xe9").expect("seed");
        assert!(matches!(read_text(&latin1), Err(GsrError::FileAccess { .. })));

        assert!(matches!(
            read_text(&dir.path().join("gone.txt")),
            Err(GsrError::FileAccess { .. })
        ));
        assert!(matches!(read_text(dir.path()), Err(GsrError::FileAccess { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_read_text_skips_symlinks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("target.txt");
        std::fs::write(&target, "hi\n").expect("seed");
        let link = dir.path().join("link.txt");
        std::os::unix::fs::symlink(&target, &link).expect("symlink");

        assert!(matches!(read_text(&link), Err(GsrError::FileAccess { .. })));
        assert_eq!(read_text(&target).expect("text"), "hi\n");
    }
}
