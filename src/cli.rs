//! Command-line surface.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};

use crate::expr::{DEFAULT_SEPARATOR, SeparatorPolicy};
use crate::filter::{FilterMode, FilterRule};
use crate::rewrite::RunOptions;

#[derive(Debug, Parser)]
#[command(name = "git-search-replace", version)]
#[command(about = "Search and replace across git-tracked file contents and paths")]
#[command(
    long_about = "Applies FROM///TO regular expression pairs, in order, to the contents and \
        paths of every tracked file. Without --fix, matches are previewed grep-style (or as \
        diffs with --diff). TO may use $1 / ${name} backreferences or \\G{...} expressions."
)]
pub struct Cli {
    /// The separator string that separates FROM and TO regexes
    #[arg(
        short = 's',
        long,
        value_name = "STRING",
        default_value = DEFAULT_SEPARATOR,
        conflicts_with = "pair_arguments"
    )]
    pub separator: String,

    /// Take FROM and TO as separate, alternating arguments
    #[arg(short = 'p', long)]
    pub pair_arguments: bool,

    /// Perform changes in-place
    #[arg(short = 'f', long)]
    pub fix: bool,

    /// Use 'diff' util to show differences
    #[arg(short = 'd', long)]
    pub diff: bool,

    /// Skip paths matching this glob (repeatable, order matters)
    #[arg(short = 'e', long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// Only process paths matching this glob (repeatable, order matters)
    #[arg(short = 'i', long, value_name = "PATTERN")]
    pub include: Vec<String>,

    /// Do not rename files whose paths match
    #[arg(long)]
    pub no_renames: bool,

    /// Run as if started in PATH
    #[arg(short = 'C', long, value_name = "PATH", default_value = ".")]
    pub directory: PathBuf,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// FROM///TO expressions (or FROM TO pairs with --pair-arguments)
    #[arg(value_name = "EXPRESSION")]
    pub expressions: Vec<String>,
}

/// Parsed command line.
#[derive(Debug)]
pub struct Invocation {
    pub options: RunOptions,
    pub directory: PathBuf,
    pub verbose: bool,
}

/// Parse `args` (including the program name).
pub fn parse_from<I, T>(args: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = Cli::command().try_get_matches_from(args)?;
    let filters = ordered_filters(&matches);
    let cli = Cli::from_arg_matches(&matches)?;

    let separator = if cli.pair_arguments {
        SeparatorPolicy::Paired
    } else {
        SeparatorPolicy::Token(cli.separator)
    };

    Ok(Invocation {
        options: RunOptions {
            expressions: cli.expressions,
            separator,
            fix: cli.fix,
            diff: cli.diff,
            renames: !cli.no_renames,
            filters,
        },
        directory: cli.directory,
        verbose: cli.verbose,
    })
}

/// Interleave `--include` and `--exclude` values by their position on the
/// command line; clap stores each flag's values separately.
fn ordered_filters(matches: &ArgMatches) -> Vec<FilterRule> {
    let mut positioned = Vec::new();

    for (id, mode) in [("include", FilterMode::Include), ("exclude", FilterMode::Exclude)] {
        let (Some(values), Some(indices)) = (matches.get_many::<String>(id), matches.indices_of(id))
        else {
            continue;
        };
        positioned.extend(indices.zip(values).map(|(position, glob)| {
            (
                position,
                FilterRule {
                    mode,
                    glob: glob.clone(),
                },
            )
        }));
    }

    positioned.sort_by_key(|(position, _)| *position);
    positioned.into_iter().map(|(_, rule)| rule).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Invocation {
        parse_from(std::iter::once("git-search-replace").chain(args.iter().copied()))
            .expect("should parse")
    }

    #[test]
    fn test_defaults() {
        let inv = parse(&["foo///bar"]);
        assert_eq!(inv.options.expressions, vec!["foo///bar".to_owned()]);
        assert_eq!(inv.options.separator, SeparatorPolicy::Token("///".to_owned()));
        assert!(!inv.options.fix);
        assert!(!inv.options.diff);
        assert!(inv.options.renames);
        assert!(inv.options.filters.is_empty());
        assert_eq!(inv.directory, PathBuf::from("."));
    }

    #[test]
    fn test_flags() {
        let inv = parse(&["-f", "-d", "--no-renames", "-s", "=>", "a=>b"]);
        assert!(inv.options.fix);
        assert!(inv.options.diff);
        assert!(!inv.options.renames);
        assert_eq!(inv.options.separator, SeparatorPolicy::Token("=>".to_owned()));
    }

    #[test]
    fn test_pair_mode() {
        let inv = parse(&["--pair-arguments", "a", "b"]);
        assert_eq!(inv.options.separator, SeparatorPolicy::Paired);
        assert_eq!(inv.options.expressions.len(), 2);
    }

    #[test]
    fn test_separator_conflicts_with_pair_mode() {
        let result = parse_from(["git-search-replace", "-p", "-s", "::", "a", "b"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_filters_keep_command_line_order() {
        let inv = parse(&[
            "--exclude",
            "a/*",
            "--include",
            "*.py",
            "--exclude",
            "test_*.py",
            "x///y",
        ]);
        assert_eq!(
            inv.options.filters,
            vec![
                FilterRule::exclude("a/*"),
                FilterRule::include("*.py"),
                FilterRule::exclude("test_*.py"),
            ]
        );
    }
}
