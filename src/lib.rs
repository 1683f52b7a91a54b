//! `git-search-replace`: multi-pattern search and replace across the
//! tracked files of a git worktree.
//!
//! The same ordered list of `FROM///TO` expressions rewrites file contents
//! and file paths. Without `--fix` the changes are only previewed, either
//! grep-style or as unified diffs.
//!
//! # Modules
//!
//! - `expr`: compiles FROM/TO pairs; evaluates `\G{...}` replacements
//! - `filter`: `--include` / `--exclude` glob rules
//! - `rewrite`: content and rename passes, grep report, diff rendering
//! - `repo`: tracked-file listing and moves via `git`
//!
//! # Architecture
//!
//! ```text
//! args → compile_expressions ─┐
//! git ls-files → FileFilter ──┼→ SearchReplace::run → stdout (grep | diff)
//!                             │        ↓ (fix)
//!                             └── atomic_write / git mv
//! ```

pub mod cli;
pub mod error;
pub mod expr;
pub mod filter;
pub mod repo;
pub mod rewrite;
pub mod util;

pub use error::{GsrError, GsrResult};
pub use repo::{GitRepository, Repository};
pub use rewrite::{RunOptions, RunSummary, SearchReplace};
