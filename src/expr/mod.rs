//! Expression compiler.
//!
//! Turns raw `FROM<SEP>TO` arguments (or `FROM TO` pairs) into an ordered
//! list of [`CompiledExpression`]s. A TO half containing the `\G{` marker
//! becomes a [`Replacement::Computed`] interpolation; anything else is a
//! literal template in the regex crate's `$1` / `${name}` syntax.
//!
//! Expressions are applied in argument order, each one consuming the
//! output of the previous one.

pub mod eval;
pub mod parse;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{GsrError, GsrResult};

/// Marker that opens an embedded expression inside a TO string.
pub const INTERPOLATION_MARKER: &str = r"\G{";

/// Default FROM/TO separator.
pub const DEFAULT_SEPARATOR: &str = "///";

/// What is being rewritten. Only affects the `sep` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteContext {
    /// File contents: `sep` is `.`.
    Content,
    /// File paths: `sep` is `/`.
    Filename,
}

impl RewriteContext {
    pub const fn separator(self) -> &'static str {
        match self {
            Self::Content => ".",
            Self::Filename => "/",
        }
    }
}

/// How FROM and TO halves are found in the argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeparatorPolicy {
    /// Every argument is `FROM<token>TO`, split at the first occurrence.
    Token(String),
    /// Arguments alternate `FROM TO FROM TO ...`.
    Paired,
}

impl Default for SeparatorPolicy {
    fn default() -> Self {
        Self::Token(DEFAULT_SEPARATOR.to_owned())
    }
}

/// One piece of a computed replacement.
#[derive(Debug, Clone)]
enum Segment {
    /// Expanded with the regex template syntax.
    Literal(String),
    /// A `\G{...}` body. Syntax errors are kept and reported per match.
    Embedded {
        source: String,
        parsed: Result<parse::Expr, String>,
    },
}

/// A TO string that contains at least one `\G{...}` block.
#[derive(Debug, Clone)]
pub struct Interpolation {
    segments: Vec<Segment>,
}

impl Interpolation {
    /// Split `to` on the marker. Each segment after the first runs up to
    /// its first closing brace not preceded by a backslash.
    pub fn parse(to: &str) -> Result<Self, String> {
        let mut parts = to.split(INTERPOLATION_MARKER);
        let mut segments = Vec::new();

        if let Some(head) = parts.next().filter(|head| !head.is_empty()) {
            segments.push(Segment::Literal(head.to_owned()));
        }

        for part in parts {
            let (body, tail) = split_at_closing_brace(part)
                .ok_or_else(|| format!("unterminated {INTERPOLATION_MARKER} in `{to}`"))?;
            let parsed = parse::parse(&body);
            segments.push(Segment::Embedded {
                source: body,
                parsed,
            });
            if !tail.is_empty() {
                segments.push(Segment::Literal(tail.to_owned()));
            }
        }

        Ok(Self { segments })
    }

    /// Produce the substitution text for one match.
    fn render(
        &self,
        regex: &Regex,
        captures: &Captures<'_>,
        context: RewriteContext,
    ) -> Result<String, String> {
        let scope = eval::Scope {
            regex,
            captures,
            context,
        };
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(template) => captures.expand(template, &mut out),
                Segment::Embedded { source, parsed } => {
                    let expr = parsed
                        .as_ref()
                        .map_err(|e| format!("in \\G{{{source}}}: {e}"))?;
                    let text = scope
                        .render(expr)
                        .map_err(|e| format!("in \\G{{{source}}}: {e}"))?;
                    out.push_str(&text);
                }
            }
        }
        Ok(out)
    }
}

/// Returns the unescaped body and the text after the closing brace.
fn split_at_closing_brace(part: &str) -> Option<(String, &str)> {
    let mut body = String::new();
    let mut chars = part.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                body.push('}');
            }
            '}' => return Some((body, &part[i + 1..])),
            c => body.push(c),
        }
    }

    None
}

/// Replacement strategy for one expression.
#[derive(Debug, Clone)]
pub enum Replacement {
    Literal(String),
    Computed(Interpolation),
}

/// A compiled FROM/TO pair. Immutable once built.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    /// Position in argument order, starting at 0.
    pub index: usize,
    pub pattern: Regex,
    pub replacement: Replacement,
}

impl CompiledExpression {
    /// Compile one FROM/TO pair.
    pub fn new(index: usize, from: &str, to: &str) -> GsrResult<Self> {
        let pattern = Regex::new(from).map_err(|source| GsrError::Pattern {
            index,
            expression: from.to_owned(),
            source,
        })?;

        let replacement = if to.contains(INTERPOLATION_MARKER) {
            Replacement::Computed(Interpolation::parse(to).map_err(|e| {
                GsrError::Configuration(format!("expression #{index}: {e}"))
            })?)
        } else {
            Replacement::Literal(to.to_owned())
        };

        Ok(Self {
            index,
            pattern,
            replacement,
        })
    }

    /// Replace every match of this expression in `haystack`.
    pub fn apply(&self, haystack: &str, context: RewriteContext) -> GsrResult<String> {
        let interpolation = match &self.replacement {
            Replacement::Literal(template) => {
                return Ok(self
                    .pattern
                    .replace_all(haystack, template.as_str())
                    .into_owned());
            }
            Replacement::Computed(interpolation) => interpolation,
        };

        let mut result = String::with_capacity(haystack.len());
        let mut last = 0;
        for captures in self.pattern.captures_iter(haystack) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let text = interpolation
                .render(&self.pattern, &captures, context)
                .map_err(|message| GsrError::Replacement {
                    index: self.index,
                    matched: whole.as_str().to_owned(),
                    message,
                })?;
            result.push_str(&haystack[last..whole.start()]);
            result.push_str(&text);
            last = whole.end();
        }
        result.push_str(&haystack[last..]);
        Ok(result)
    }
}

/// Apply every expression in order, each to the previous one's output.
pub fn apply_all(
    expressions: &[CompiledExpression],
    input: &str,
    context: RewriteContext,
) -> GsrResult<String> {
    let mut current = input.to_owned();
    for expression in expressions {
        current = expression.apply(&current, context)?;
    }
    Ok(current)
}

/// Compile the raw argument list under `policy`.
///
/// Fails before anything is compiled if the list is empty or does not fit
/// the policy, so a bad argument never leaves a partial run behind.
pub fn compile_expressions(
    args: &[String],
    policy: &SeparatorPolicy,
) -> GsrResult<Vec<CompiledExpression>> {
    if args.is_empty() {
        return Err(GsrError::Configuration(
            "no FROM-TO expressions specified".to_owned(),
        ));
    }

    let pairs: Vec<(&str, &str)> = match policy {
        SeparatorPolicy::Token(separator) => args
            .iter()
            .map(|arg| {
                arg.split_once(separator.as_str()).ok_or_else(|| {
                    GsrError::Configuration(format!(
                        "expression `{arg}` does not contain the separator `{separator}`"
                    ))
                })
            })
            .collect::<GsrResult<_>>()?,
        SeparatorPolicy::Paired => {
            if args.len() % 2 != 0 {
                return Err(GsrError::Configuration(format!(
                    "paired arguments require an even count, got {}",
                    args.len()
                )));
            }
            args.chunks_exact(2)
                .map(|pair| (pair[0].as_str(), pair[1].as_str()))
                .collect()
        }
    };

    pairs
        .into_iter()
        .enumerate()
        .map(|(index, (from, to))| {
            let expression = CompiledExpression::new(index, from, to)?;
            debug!(
                index,
                from,
                computed = matches!(expression.replacement, Replacement::Computed(_)),
                "compiled expression"
            );
            Ok(expression)
        })
        .collect()
}
