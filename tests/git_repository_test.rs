//! `GitRepository` against a real scratch repository.
//!
//! Skipped when `git` is not on PATH.

use std::path::Path;
use std::process::Command;

use git_search_replace::{GitRepository, Repository, RunOptions, SearchReplace};

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .expect("git should run");
    assert!(status.success(), "git {args:?} failed");
}

fn scratch_repo() -> Option<tempfile::TempDir> {
    which::which("git").ok()?;
    let dir = tempfile::tempdir().expect("tempdir");
    git(dir.path(), &["init", "--quiet"]);
    std::fs::create_dir_all(dir.path().join("src")).expect("mkdir");
    std::fs::write(dir.path().join("src/widget.rs"), "pub struct Widget;\n").expect("seed");
    std::fs::write(dir.path().join("README"), "Widget docs\n").expect("seed");
    std::fs::write(dir.path().join("untracked.txt"), "Widget\n").expect("seed");
    git(dir.path(), &["add", "src/widget.rs", "README"]);
    Some(dir)
}

#[test]
fn test_lists_only_tracked_files() {
    let Some(dir) = scratch_repo() else {
        return;
    };
    let repo = GitRepository::new(dir.path().to_path_buf()).expect("git available");

    let files = repo.list_tracked_files().expect("ls-files");

    assert_eq!(files, vec!["README".to_owned(), "src/widget.rs".to_owned()]);
}

#[test]
fn test_fix_rewrites_and_moves_through_git() {
    let Some(dir) = scratch_repo() else {
        return;
    };
    let repo = GitRepository::new(dir.path().to_path_buf()).expect("git available");
    let options = RunOptions {
        expressions: vec!["Widget///Gadget".to_owned(), "widget///gadget".to_owned()],
        fix: true,
        ..RunOptions::default()
    };

    let engine = SearchReplace::new(&repo, options).expect("should compile");
    let mut out = Vec::new();
    let summary = engine.run(&mut out).expect("run");

    assert!(summary.is_success());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/gadget.rs")).expect("moved file"),
        "pub struct Gadget;\n"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("README")).expect("readme"),
        "Gadget docs\n"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("untracked.txt")).expect("untracked"),
        "Widget\n"
    );
    assert_eq!(
        repo.list_tracked_files().expect("ls-files"),
        vec!["README".to_owned(), "src/gadget.rs".to_owned()]
    );
}
