//! Atomic file writing via tempfile + rename.
//!
//! Writes to a [`tempfile::NamedTempFile`] in the target's directory and
//! renames it over the target, so a rewritten file is either complete or
//! untouched.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Atomically replace the contents of the existing file at `path`.
///
/// The original file's permissions are carried over to the replacement
/// (a fresh temp file would otherwise be created `0600`).
///
/// # Errors
///
/// Returns an error if `path` has no parent, its metadata cannot be read,
/// writing fails, or the rename fails (e.g., cross-device).
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("no parent directory for {}", path.display()))?;
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };

    let permissions = std::fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?
        .permissions();

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;

    tmp.write_all(content.as_bytes())
        .with_context(|| format!("failed to write to temp file for {}", path.display()))?;

    tmp.flush()
        .with_context(|| format!("failed to flush temp file for {}", path.display()))?;

    tmp.as_file()
        .set_permissions(permissions)
        .with_context(|| format!("failed to copy permissions for {}", path.display()))?;

    tmp.persist(path)
        .with_context(|| format!("failed to atomically replace {}", path.display()))?;

    Ok(())
}
