//! git-search-replace -- multi-pattern search and replace over a git worktree.
//!
//! Usage: git-search-replace [OPTIONS] FROM///TO...

use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use git_search_replace::cli::{self, Invocation};
use git_search_replace::{GitRepository, SearchReplace};

const PROGRAM: &str = "git-search-replace";

fn main() -> ExitCode {
    let invocation = match cli::parse_from(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(e) => e.exit(),
    };

    // Logs go to stderr so they never mix with the report on stdout.
    let default_filter = if invocation.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(invocation) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{PROGRAM}: error: {e:#}");
            ExitCode::from(2)
        }
    }
}

/// Returns `Ok(false)` when the run completed but some files failed.
fn run(invocation: Invocation) -> anyhow::Result<bool> {
    let root = invocation
        .directory
        .canonicalize()
        .with_context(|| format!("cannot enter {}", invocation.directory.display()))?;
    let repo = GitRepository::new(root)?;
    let engine = SearchReplace::new(&repo, invocation.options)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let summary = engine.run(&mut out)?;
    out.flush().context("failed to flush stdout")?;

    for failure in &summary.failures {
        eprintln!("{PROGRAM}: {}: {:#}", failure.path, failure.error);
    }

    Ok(summary.is_success())
}
