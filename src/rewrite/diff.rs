//! Unified diff rendering.
//!
//! Shells out to `diff -urN` against a scratch copy of the new content and
//! rewrites the first `---`/`+++` headers to `a/<path>` and `b/<path>`.
//! Falls back to the `similar` crate if no `diff` binary is installed.

use std::io::Write;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use similar::{Algorithm, TextDiff};
use tracing::debug;

/// Diff the file at `original` (shown as `filename`) against `new_content`.
pub fn render_diff(original: &Path, filename: &str, new_content: &str) -> Result<String> {
    match which::which("diff") {
        Ok(diff) => external_diff(&diff, original, filename, new_content),
        Err(_) => {
            debug!("diff not found on PATH, using in-process diff");
            let old = std::fs::read_to_string(original)
                .with_context(|| format!("failed to read {}", original.display()))?;
            Ok(unified_diff(filename, &old, new_content))
        }
    }
}

/// Run `diff -urN` between `original` and a temp file holding `new_content`.
/// The temp file is unique per call and removed when this returns.
fn external_diff(diff: &Path, original: &Path, filename: &str, new_content: &str) -> Result<String> {
    let mut scratch = tempfile::Builder::new()
        .prefix("gsr-")
        .tempfile()
        .context("failed to create diff scratch file")?;
    scratch
        .write_all(new_content.as_bytes())
        .context("failed to write diff scratch file")?;
    scratch.flush().context("failed to flush diff scratch file")?;

    let output = Command::new(diff)
        .arg("-urN")
        .arg(original)
        .arg(scratch.path())
        .output()
        .context("failed to execute diff")?;

    // diff exit code: 0 = same, 1 = different, 2 = trouble.
    if output.status.code() == Some(2) || output.status.code().is_none() {
        bail!("diff failed: {}", String::from_utf8_lossy(&output.stderr).trim());
    }

    Ok(normalize_headers(&String::from_utf8_lossy(&output.stdout), filename))
}

/// Replace the path in the first `---` and first `+++` header lines,
/// keeping whatever follows it (usually a timestamp). Everything else
/// passes through unchanged.
pub fn normalize_headers(diff: &str, filename: &str) -> String {
    let mut minus_done = false;
    let mut plus_done = false;
    let mut out = String::with_capacity(diff.len());

    for line in diff.split_inclusive('\n') {
        if !minus_done && line.starts_with("--- ") {
            minus_done = true;
            out.push_str(&rewrite_header(line, "--- a/", filename));
        } else if !plus_done && line.starts_with("+++ ") {
            plus_done = true;
            out.push_str(&rewrite_header(line, "+++ b/", filename));
        } else {
            out.push_str(line);
        }
    }

    out
}

fn rewrite_header(line: &str, prefix: &str, filename: &str) -> String {
    let rest = &line[4..];
    let (body, newline) = rest
        .strip_suffix('\n')
        .map_or((rest, ""), |body| (body, "\n"));
    let suffix = body
        .split_once('\t')
        .map(|(_, stamp)| format!("\t{stamp}"))
        .or_else(|| body.split_once(' ').map(|(_, stamp)| format!(" {stamp}")))
        .unwrap_or_default();
    format!("{prefix}{filename}{suffix}{newline}")
}

/// In-process unified diff between old and new content.
///
/// Uses the Patience diff algorithm which produces cleaner diffs
/// for source code by preserving structure.
pub fn unified_diff(file_name: &str, old: &str, new: &str) -> String {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Patience)
        .diff_lines(old, new);

    diff.unified_diff()
        .header(&format!("a/{file_name}"), &format!("b/{file_name}"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tab_separated_headers() {
        let raw = "--- /work/foo.txt\t2024-01-01 10:00:00.000000000 +0000\n\
                   +++ /tmp/gsr-abc123\t2024-01-01 10:00:01.000000000 +0000\n\
                   @@ -1 +1 @@\n\
                   --- not a header\n\
                   -old\n\
                   +new\n";
        let out = normalize_headers(raw, "foo.txt");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "--- a/foo.txt\t2024-01-01 10:00:00.000000000 +0000");
        assert_eq!(lines[1], "+++ b/foo.txt\t2024-01-01 10:00:01.000000000 +0000");
        assert_eq!(lines[3], "--- not a header");
        assert_eq!(lines[5], "+new");
    }

    #[test]
    fn test_normalize_space_separated_headers() {
        let out = normalize_headers("--- x 2024\n+++ y 2024\n", "dir/foo.txt");
        assert_eq!(out, "--- a/dir/foo.txt 2024\n+++ b/dir/foo.txt 2024\n");
    }

    #[test]
    fn test_unified_diff_fallback() {
        let old = "line1\nline2\nline3\n";
        let new = "line1\nmodified\nline3\n";
        let result = unified_diff("foo.txt", old, new);
        assert!(result.starts_with("--- a/foo.txt"));
        assert!(result.contains("+++ b/foo.txt"));
        assert!(result.contains("-line2"));
        assert!(result.contains("+modified"));
    }

    #[test]
    fn test_render_diff_headers_and_cleanup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let original = dir.path().join("foo.txt");
        std::fs::write(&original, "hello\nworld\n").expect("seed");

        let rendered = render_diff(&original, "foo.txt", "hello\nthere\n").expect("diff");
        let mut lines = rendered.lines();
        assert!(lines.next().expect("minus header").starts_with("--- a/foo.txt"));
        assert!(lines.next().expect("plus header").starts_with("+++ b/foo.txt"));
        assert!(rendered.contains("-world"));
        assert!(rendered.contains("+there"));
        assert!(!rendered.contains("gsr-"));
    }
}
