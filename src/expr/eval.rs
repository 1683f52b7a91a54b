//! Sandboxed evaluator for `\G{...}` expression trees.
//!
//! Evaluation never touches the filesystem or the process. The only names
//! in scope are the current match, the group accessor, the two naming
//! helpers, the separator token and a handful of conversions.

use std::cmp::Ordering;
use std::fmt;

use heck::{ToSnakeCase, ToUpperCamelCase};
use regex::{Captures, Regex};

use super::RewriteContext;
use super::parse::{BinaryOp, Expr};

/// Runtime value of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    /// The current match object (`m`).
    Match,
}

impl Value {
    const fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "str",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
            Self::Match => "match",
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Self::Str(s) => !s.is_empty(),
            Self::Int(i) => *i != 0,
            Self::Bool(b) => *b,
            Self::Match => true,
        }
    }
}

/// Everything an expression can see while rendering one match.
pub struct Scope<'a, 'h> {
    pub regex: &'a Regex,
    pub captures: &'a Captures<'h>,
    pub context: RewriteContext,
}

impl Scope<'_, '_> {
    /// Render an expression to its substitution text.
    pub fn render(&self, expr: &Expr) -> Result<String, String> {
        let value = self.eval(expr)?;
        Ok(self.display(&value))
    }

    fn display(&self, value: &Value) -> String {
        match value {
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Bool(true) => "True".to_owned(),
            Value::Bool(false) => "False".to_owned(),
            Value::Match => self.whole_match().to_owned(),
        }
    }

    fn whole_match(&self) -> &str {
        self.captures.get(0).map_or("", |m| m.as_str())
    }

    fn eval(&self, expr: &Expr) -> Result<Value, String> {
        match expr {
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Name(name) => self.lookup(name),
            Expr::Call { name, args } => {
                let args = self.eval_args(args)?;
                self.call(name, &args)
            }
            Expr::Method {
                receiver,
                name,
                args,
            } => {
                let receiver = self.eval(receiver)?;
                let args = self.eval_args(args)?;
                self.method(&receiver, name, &args)
            }
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                self.index(&target, &index)
            }
            Expr::Neg(operand) => match self.eval(operand)? {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| "integer overflow".to_owned()),
                other => Err(format!("bad operand type for unary -: {}", other.type_name())),
            },
            Expr::Not(operand) => Ok(Value::Bool(!self.eval(operand)?.truthy())),
            Expr::And(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.truthy() { self.eval(rhs) } else { Ok(lhs) }
            }
            Expr::Or(lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                if lhs.truthy() { Ok(lhs) } else { self.eval(rhs) }
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.eval(condition)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, lhs, rhs)
            }
        }
    }

    fn eval_args(&self, args: &[Expr]) -> Result<Vec<Value>, String> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    fn lookup(&self, name: &str) -> Result<Value, String> {
        match name {
            "m" => Ok(Value::Match),
            "sep" => Ok(Value::Str(self.context.separator().to_owned())),
            _ if FUNCTIONS.contains(&name) => Err(format!("`{name}` is a function; call it")),
            _ => Err(format!("name `{name}` is not defined")),
        }
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, String> {
        match (name, args) {
            ("g", [group]) => self.group(group),
            ("underscore_to_titlecase", [Value::Str(s)]) => {
                Ok(Value::Str(convert_words(s, |word| word.to_upper_camel_case())))
            }
            ("titlecase_to_underscore", [Value::Str(s)]) => {
                Ok(Value::Str(convert_words(s, |word| word.to_snake_case())))
            }
            ("str", [value]) => Ok(Value::Str(self.display(value))),
            ("len", [Value::Str(s)]) => i64::try_from(s.chars().count())
                .map(Value::Int)
                .map_err(|e| e.to_string()),
            ("int", [Value::Int(i)]) => Ok(Value::Int(*i)),
            ("int", [Value::Bool(b)]) => Ok(Value::Int(i64::from(*b))),
            ("int", [Value::Str(s)]) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| format!("invalid literal for int(): {s:?}")),
            _ if FUNCTIONS.contains(&name) => Err(format!(
                "bad arguments to {name}(): ({})",
                args.iter().map(Value::type_name).collect::<Vec<_>>().join(", ")
            )),
            _ => Err(format!("name `{name}` is not defined")),
        }
    }

    fn method(&self, receiver: &Value, name: &str, args: &[Value]) -> Result<Value, String> {
        match (receiver, name, args) {
            (Value::Match, "group", []) => Ok(Value::Str(self.whole_match().to_owned())),
            (Value::Match, "group", [group]) => self.group(group),
            (Value::Match, "start", []) => {
                offset(self.captures.get(0).map_or(0, |m| m.start()))
            }
            (Value::Match, "end", []) => offset(self.captures.get(0).map_or(0, |m| m.end())),
            (Value::Str(s), "upper", []) => Ok(Value::Str(s.to_uppercase())),
            (Value::Str(s), "lower", []) => Ok(Value::Str(s.to_lowercase())),
            (Value::Str(s), "strip", []) => Ok(Value::Str(s.trim().to_owned())),
            (Value::Str(s), "capitalize", []) => Ok(Value::Str(capitalize(s))),
            (Value::Str(s), "replace", [Value::Str(from), Value::Str(to)]) => {
                Ok(Value::Str(s.replace(from.as_str(), to)))
            }
            _ => Err(format!(
                "{} has no method {name}() taking ({})",
                receiver.type_name(),
                args.iter().map(Value::type_name).collect::<Vec<_>>().join(", ")
            )),
        }
    }

    fn index(&self, target: &Value, index: &Value) -> Result<Value, String> {
        match (target, index) {
            (Value::Match, group) => self.group(group),
            (Value::Str(s), Value::Int(i)) => {
                let len = i64::try_from(s.chars().count()).map_err(|e| e.to_string())?;
                let position = if *i < 0 { len + i } else { *i };
                usize::try_from(position)
                    .ok()
                    .and_then(|p| s.chars().nth(p))
                    .map(|c| Value::Str(c.to_string()))
                    .ok_or_else(|| format!("string index {i} out of range"))
            }
            _ => Err(format!(
                "{} cannot be indexed by {}",
                target.type_name(),
                index.type_name()
            )),
        }
    }

    /// Group text by index or by name. A group that exists but did not
    /// participate in the match yields an empty string.
    fn group(&self, group: &Value) -> Result<Value, String> {
        match group {
            Value::Int(i) => {
                let index = usize::try_from(*i)
                    .ok()
                    .filter(|&n| n < self.captures.len())
                    .ok_or_else(|| format!("no such group: {i}"))?;
                Ok(Value::Str(
                    self.captures
                        .get(index)
                        .map_or_else(String::new, |m| m.as_str().to_owned()),
                ))
            }
            Value::Str(name) => {
                if !self.regex.capture_names().flatten().any(|n| n == name) {
                    return Err(format!("no such group: {name:?}"));
                }
                Ok(Value::Str(
                    self.captures
                        .name(name)
                        .map_or_else(String::new, |m| m.as_str().to_owned()),
                ))
            }
            other => Err(format!("group index must be int or str, not {}", other.type_name())),
        }
    }
}

/// Callable names visible to expressions.
const FUNCTIONS: &[&str] = &[
    "g",
    "underscore_to_titlecase",
    "titlecase_to_underscore",
    "str",
    "int",
    "len",
];

/// Longest string `*` may produce.
const MAX_REPEAT_BYTES: usize = 16 * 1024 * 1024;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Apply a naming conversion to each run of word characters, leaving all
/// other characters (`/`, `.`, `-`, ...) and the run's leading or trailing
/// underscores in place.
fn convert_words(s: &str, convert: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find(is_word_char) {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        let end = rest.find(|c| !is_word_char(c)).unwrap_or(rest.len());
        let run = &rest[..end];
        let core = run.trim_matches('_');
        if core.is_empty() {
            out.push_str(run);
        } else {
            let lead = run.len() - run.trim_start_matches('_').len();
            out.push_str(&run[..lead]);
            out.push_str(&convert(core));
            out.push_str(&run[lead + core.len()..]);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

fn repeat(s: &str, count: i64) -> Result<Value, String> {
    // Negative counts give an empty string.
    let count = usize::try_from(count).unwrap_or(0);
    match s.len().checked_mul(count) {
        Some(total) if total <= MAX_REPEAT_BYTES => Ok(Value::Str(s.repeat(count))),
        _ => Err(format!("repeated string too long (limit {MAX_REPEAT_BYTES} bytes)")),
    }
}

/// Integer view used by `==` and ordering: `True`/`False` compare as 1/0.
const fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Bool(true) => Some(1),
        Value::Bool(false) => Some(0),
        _ => None,
    }
}

fn equal(lhs: &Value, rhs: &Value) -> bool {
    match (as_int(lhs), as_int(rhs)) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn offset(value: usize) -> Result<Value, String> {
    i64::try_from(value).map(Value::Int).map_err(|e| e.to_string())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
    })
}

fn binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, String> {
    let overflow = || "integer overflow".to_owned();
    match (op, &lhs, &rhs) {
        (BinaryOp::Eq, _, _) => Ok(Value::Bool(equal(&lhs, &rhs))),
        (BinaryOp::Ne, _, _) => Ok(Value::Bool(!equal(&lhs, &rhs))),
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (BinaryOp::Mul, Value::Str(s), Value::Int(n)) | (BinaryOp::Mul, Value::Int(n), Value::Str(s)) => {
            repeat(s, *n)
        }
        (BinaryOp::Add, Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
        (BinaryOp::Sub, Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
        (BinaryOp::Mul, Value::Int(a), Value::Int(b)) => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
        (BinaryOp::Div | BinaryOp::Rem, Value::Int(_), Value::Int(0)) => {
            Err("integer division or modulo by zero".to_owned())
        }
        (BinaryOp::Div, Value::Int(a), Value::Int(b)) => {
            a.checked_div_euclid(*b).map(Value::Int).ok_or_else(overflow)
        }
        (BinaryOp::Rem, Value::Int(a), Value::Int(b)) => {
            a.checked_rem_euclid(*b).map(Value::Int).ok_or_else(overflow)
        }
        (BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge, _, _) => {
            let ordering = match (&lhs, &rhs) {
                (Value::Str(a), Value::Str(b)) => a.cmp(b),
                _ => match (as_int(&lhs), as_int(&rhs)) {
                    (Some(a), Some(b)) => a.cmp(&b),
                    _ => return Err(type_error(op, &lhs, &rhs)),
                },
            };
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        _ => Err(type_error(op, &lhs, &rhs)),
    }
}

fn type_error(op: BinaryOp, lhs: &Value, rhs: &Value) -> String {
    format!(
        "unsupported operand types for {op}: {} and {}",
        lhs.type_name(),
        rhs.type_name()
    )
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parse::parse;

    fn render_with(pattern: &str, haystack: &str, source: &str, context: RewriteContext) -> Result<String, String> {
        let regex = Regex::new(pattern).expect("valid regex");
        let captures = regex.captures(haystack).expect("pattern should match");
        let scope = Scope {
            regex: &regex,
            captures: &captures,
            context,
        };
        scope.render(&parse(source)?)
    }

    fn render(pattern: &str, haystack: &str, source: &str) -> Result<String, String> {
        render_with(pattern, haystack, source, RewriteContext::Content)
    }

    #[test]
    fn test_group_accessors() {
        assert_eq!(render(r"(\w+)_(\w+)", "foo_bar", "g(2)").as_deref(), Ok("bar"));
        assert_eq!(render(r"(\w+)_(\w+)", "foo_bar", "m.group(1)").as_deref(), Ok("foo"));
        assert_eq!(render(r"(\w+)_(\w+)", "foo_bar", "m[0]").as_deref(), Ok("foo_bar"));
        assert_eq!(render(r"(?P<head>\w+)_\w+", "foo_bar", "g('head')").as_deref(), Ok("foo"));
        assert_eq!(render(r"a(b)?", "a", "'[' + g(1) + ']'").as_deref(), Ok("[]"));
    }

    #[test]
    fn test_missing_group_is_error() {
        assert!(render(r"(\w+)", "foo", "g(2)").is_err());
        assert!(render(r"(\w+)", "foo", "g('nope')").is_err());
    }

    #[test]
    fn test_naming_helpers() {
        assert_eq!(
            render(r"\w+", "foo_bar_baz", "underscore_to_titlecase(g(0))").as_deref(),
            Ok("FooBarBaz")
        );
        assert_eq!(
            render(r"\w+", "FooBarBaz", "titlecase_to_underscore(g(0))").as_deref(),
            Ok("foo_bar_baz")
        );
        assert_eq!(
            render(r"\w+", "fooBar", "titlecase_to_underscore(g(0))").as_deref(),
            Ok("foo_bar")
        );
    }

    #[test]
    fn test_naming_helpers_keep_separators() {
        assert_eq!(
            render(r".+", "pkg/FooBar.rs", "titlecase_to_underscore(g(0))").as_deref(),
            Ok("pkg/foo_bar.rs")
        );
        assert_eq!(
            render(r".+", "foo_bar/baz_qux", "underscore_to_titlecase(g(0))").as_deref(),
            Ok("FooBar/BazQux")
        );
        assert_eq!(
            render(r".+", "foo_bar.baz", "underscore_to_titlecase(g(0))").as_deref(),
            Ok("FooBar.Baz")
        );
        assert_eq!(
            render(r".+", "__init__-x", "underscore_to_titlecase(g(0))").as_deref(),
            Ok("__Init__-X")
        );
    }

    #[test]
    fn test_separator_depends_on_context() {
        assert_eq!(render_with("x", "x", "'a' + sep + 'b'", RewriteContext::Content).as_deref(), Ok("a.b"));
        assert_eq!(render_with("x", "x", "'a' + sep + 'b'", RewriteContext::Filename).as_deref(), Ok("a/b"));
    }

    #[test]
    fn test_string_methods_and_arithmetic() {
        assert_eq!(render("(ab)", "ab", "g(1).upper() * 2").as_deref(), Ok("ABAB"));
        assert_eq!(render("(ab)", "ab", "g(1).capitalize()").as_deref(), Ok("Ab"));
        assert_eq!(render("(a_b)", "a_b", "g(1).replace('_', sep)").as_deref(), Ok("a.b"));
        assert_eq!(render(r"(\d+)", "41", "int(g(1)) + 1").as_deref(), Ok("42"));
        assert_eq!(render(r"(\d+)", "7", "str(int(g(1)) % 4)").as_deref(), Ok("3"));
        assert_eq!(render("(abc)", "abc", "g(1)[-1]").as_deref(), Ok("c"));
        assert_eq!(render("(abc)", "abc", "len(g(1))").as_deref(), Ok("3"));
    }

    #[test]
    fn test_conditionals_and_logic() {
        assert_eq!(render("(x)", "x", "'yes' if g(1) == 'x' else 'no'").as_deref(), Ok("yes"));
        assert_eq!(render("(x)", "x", "g(1) != 'x' or 'fallback'").as_deref(), Ok("fallback"));
        assert_eq!(render("(x)", "x", "not g(1)").as_deref(), Ok("False"));
        assert_eq!(render("(x)", "x", "1 < 2 and 'ok'").as_deref(), Ok("ok"));
    }

    #[test]
    fn test_runtime_errors() {
        assert!(render("x", "x", "1 / 0").is_err());
        assert!(render("x", "x", "'a' - 1").is_err());
        assert!(render("x", "x", "open('f')").is_err());
        assert!(render("x", "x", "g").is_err());
        assert!(render("x", "x", "undefined").is_err());
        assert!(render("x", "x", "int('nope')").is_err());
    }

    #[test]
    fn test_integer_overflow_is_error() {
        assert!(render("x", "x", "int('-9223372036854775808') / -1").is_err());
        assert!(render("x", "x", "(-9223372036854775807 - 1) % -1").is_err());
        assert!(render("x", "x", "9223372036854775807 + 1").is_err());
        assert_eq!(render("x", "x", "-7 / 2").as_deref(), Ok("-4"));
    }

    #[test]
    fn test_string_repeat_is_bounded() {
        assert!(render("x", "x", "'abc' * 9223372036854775807").is_err());
        assert!(render("x", "x", "'a' * 100000000").is_err());
        assert_eq!(render("x", "x", "'ab' * -3").as_deref(), Ok(""));
        assert_eq!(render("x", "x", "3 * 'ab'").as_deref(), Ok("ababab"));
    }

    #[test]
    fn test_bool_compares_as_int() {
        assert_eq!(render("x", "x", "True == 1").as_deref(), Ok("True"));
        assert_eq!(render("x", "x", "False != 0").as_deref(), Ok("False"));
        assert_eq!(render("x", "x", "True > False").as_deref(), Ok("True"));
        assert_eq!(render("x", "x", "'1' == 1").as_deref(), Ok("False"));
    }
}
