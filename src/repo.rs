//! Version-control collaborator: lists tracked files and moves them.
//!
//! The pipeline only talks to [`Repository`], so tests can swap in an
//! in-memory implementation instead of a real checkout.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::error::{GsrError, GsrResult};

/// File lister + mover capability.
pub trait Repository {
    /// Worktree root; tracked paths are relative to it.
    fn root(&self) -> &Path;

    /// Tracked paths, in the order the version-control system reports them.
    fn list_tracked_files(&self) -> GsrResult<Vec<String>>;

    /// Move `src` to `dst` and record the move. Parent directories of
    /// `dst` already exist when this is called.
    fn move_path(&self, src: &str, dst: &str) -> GsrResult<()>;
}

/// [`Repository`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
    git: PathBuf,
}

impl GitRepository {
    /// Locate `git` on `PATH` and bind it to `root`.
    pub fn new(root: PathBuf) -> GsrResult<Self> {
        let git = which::which("git").map_err(|e| GsrError::Subprocess {
            command: "git".to_owned(),
            reason: format!("git not found on PATH: {e}"),
        })?;
        Ok(Self { root, git })
    }

    fn run(&self, args: &[&str]) -> GsrResult<Vec<u8>> {
        let command = format!("git {}", args.join(" "));
        debug!(%command, root = %self.root.display(), "running git");

        let output = Command::new(&self.git)
            .args(args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| GsrError::Subprocess {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(GsrError::Subprocess {
                command,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(output.stdout)
    }
}

impl Repository for GitRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list_tracked_files(&self) -> GsrResult<Vec<String>> {
        let stdout = self.run(&["ls-files", "-z"])?;
        Ok(parse_nul_separated(&stdout))
    }

    fn move_path(&self, src: &str, dst: &str) -> GsrResult<()> {
        self.run(&["mv", "--", src, dst]).map(drop)
    }
}

/// Split `git ls-files -z` output. Non-UTF-8 paths are dropped since
/// they cannot be rewritten as text.
fn parse_nul_separated(stdout: &[u8]) -> Vec<String> {
    stdout
        .split(|&b| b == 0)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| std::str::from_utf8(entry).ok())
        .map(str::to_owned)
        .collect()
}
