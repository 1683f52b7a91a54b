//! Include/exclude filtering of tracked paths via globset patterns.
//!
//! Rules are evaluated left to right and the last matching rule decides.
//! As soon as one `Include` rule exists, an implicit "exclude everything"
//! rule sits in front of the list, so inclusion is opt-in.

use globset::{Glob, GlobBuilder, GlobMatcher};

use crate::error::{GsrError, GsrResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Include,
    Exclude,
}

/// One `--include` / `--exclude` rule, in command-line order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRule {
    pub mode: FilterMode,
    pub glob: String,
}

impl FilterRule {
    pub fn include(glob: impl Into<String>) -> Self {
        Self {
            mode: FilterMode::Include,
            glob: glob.into(),
        }
    }

    pub fn exclude(glob: impl Into<String>) -> Self {
        Self {
            mode: FilterMode::Exclude,
            glob: glob.into(),
        }
    }
}

/// Compiled rule list.
#[derive(Debug, Clone)]
pub struct FileFilter {
    rules: Vec<(FilterMode, GlobMatcher)>,
}

impl FileFilter {
    /// Compile `rules`. Globs use shell semantics against the whole
    /// relative path: `*` also crosses `/`.
    pub fn new(rules: &[FilterRule]) -> GsrResult<Self> {
        let mut compiled = Vec::with_capacity(rules.len() + 1);

        if rules.iter().any(|rule| rule.mode == FilterMode::Include) {
            compiled.push((FilterMode::Exclude, compile_glob("*")?));
        }

        for rule in rules {
            compiled.push((rule.mode, compile_glob(&rule.glob)?));
        }

        Ok(Self { rules: compiled })
    }

    /// Whether `path` survives the rules. No matching rule means included.
    pub fn is_included(&self, path: &str) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|(_, matcher)| matcher.is_match(path))
            .is_none_or(|(mode, _)| *mode == FilterMode::Include)
    }

    /// Keep the included paths, preserving their order.
    pub fn apply(&self, paths: Vec<String>) -> Vec<String> {
        paths.into_iter().filter(|path| self.is_included(path)).collect()
    }
}

fn compile_glob(pattern: &str) -> GsrResult<GlobMatcher> {
    let glob: Glob = GlobBuilder::new(pattern)
        .literal_separator(false)
        .build()
        .map_err(|e| GsrError::Configuration(format!("invalid glob pattern `{pattern}`: {e}")))?;
    Ok(glob.compile_matcher())
}
