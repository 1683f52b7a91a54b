//! Tokenizer and recursive-descent parser for `\G{...}` bodies.
//!
//! The grammar is expression-only. Lowest to highest precedence:
//!
//! ```text
//! conditional := or ["if" or "else" conditional]
//! or          := and ("or" and)*
//! and         := not ("and" not)*
//! not         := "not" not | comparison
//! comparison  := sum [("==" | "!=" | "<" | "<=" | ">" | ">=") sum]
//! sum         := term (("+" | "-") term)*
//! term        := unary (("*" | "/" | "%") unary)*
//! unary       := "-" unary | postfix
//! postfix     := primary ("." IDENT "(" args ")" | "[" conditional "]")*
//! primary     := INT | STRING | "True" | "False" | IDENT ["(" args ")"]
//!              | "(" conditional ")"
//! ```

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Str(String),
    Int(i64),
    Bool(bool),
    Name(String),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Method {
        receiver: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Neg(Box<Expr>),
    Not(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Int(i64),
    Str(String),
    Ident(String),
    Op(&'static str),
}

/// Deepest nesting of parentheses, brackets, calls and unary operators.
const MAX_DEPTH: usize = 128;

/// Longest body, in tokens. Bounds the depth of left-leaning chains like
/// `1 + 1 + ...` that the nesting limit does not see.
const MAX_TOKENS: usize = 2048;

/// Operators, longest first so `<=` wins over `<`.
const OPERATORS: &[&str] = &[
    "==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/", "%", "(", ")", "[", "]", ",", ".",
];

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut rest = source;

    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            rest = &rest[c.len_utf8()..];
            continue;
        }

        if c.is_ascii_digit() {
            let end = rest.find(|ch: char| !ch.is_ascii_digit()).unwrap_or(rest.len());
            let value = rest[..end]
                .parse::<i64>()
                .map_err(|e| format!("bad integer literal `{}`: {e}", &rest[..end]))?;
            tokens.push(Token::Int(value));
            rest = &rest[end..];
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let end = rest
                .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
                .unwrap_or(rest.len());
            tokens.push(Token::Ident(rest[..end].to_owned()));
            rest = &rest[end..];
            continue;
        }

        if c == '\'' || c == '"' {
            let (literal, consumed) = scan_string(rest, c)?;
            tokens.push(Token::Str(literal));
            rest = &rest[consumed..];
            continue;
        }

        let Some(op) = OPERATORS.iter().copied().find(|op| rest.starts_with(*op)) else {
            return Err(format!("unexpected character `{c}`"));
        };
        tokens.push(Token::Op(op));
        rest = &rest[op.len()..];
    }

    Ok(tokens)
}

/// Scan a quoted string starting at `input[0] == quote`.
/// Returns the unescaped text and the number of bytes consumed.
fn scan_string(input: &str, quote: char) -> Result<(String, usize), String> {
    let mut out = String::new();
    let mut chars = input.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            c if c == quote => return Ok((out, i + c.len_utf8())),
            c => out.push(c),
        }
    }

    Err("unterminated string literal".to_owned())
}

/// Parse a complete expression body.
pub fn parse(source: &str) -> Result<Expr, String> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err("empty expression".to_owned());
    }
    if tokens.len() > MAX_TOKENS {
        return Err(format!("expression too long (more than {MAX_TOKENS} tokens)"));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.conditional()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(format!("unexpected trailing {}", describe(token))),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Int(i) => format!("integer `{i}`"),
        Token::Str(s) => format!("string {s:?}"),
        Token::Ident(name) => format!("name `{name}`"),
        Token::Op(op) => format!("`{op}`"),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(name)) if name == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), String> {
        if self.eat_op(op) {
            return Ok(());
        }
        match self.peek() {
            Some(token) => Err(format!("expected `{op}`, found {}", describe(token))),
            None => Err(format!("expected `{op}`, found end of expression")),
        }
    }

    /// Run `f` one nesting level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, String>) -> Result<T, String> {
        if self.depth >= MAX_DEPTH {
            return Err("expression nested too deeply".to_owned());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn conditional(&mut self) -> Result<Expr, String> {
        self.nested(Self::conditional_body)
    }

    fn conditional_body(&mut self) -> Result<Expr, String> {
        let then = self.or()?;
        if !self.eat_keyword("if") {
            return Ok(then);
        }
        let condition = self.or()?;
        if !self.eat_keyword("else") {
            return Err("expected `else` in conditional expression".to_owned());
        }
        let otherwise = self.conditional()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.and()?;
        while self.eat_keyword("or") {
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.not()?;
        while self.eat_keyword("and") {
            let rhs = self.not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, String> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.nested(Self::not)?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let lhs = self.sum()?;
        let op = match self.peek() {
            Some(Token::Op("==")) => BinaryOp::Eq,
            Some(Token::Op("!=")) => BinaryOp::Ne,
            Some(Token::Op("<")) => BinaryOp::Lt,
            Some(Token::Op("<=")) => BinaryOp::Le,
            Some(Token::Op(">")) => BinaryOp::Gt,
            Some(Token::Op(">=")) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.sum()?;
        Ok(binary(op, lhs, rhs))
    }

    fn sum(&mut self) -> Result<Expr, String> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("+")) => BinaryOp::Add,
                Some(Token::Op("-")) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Expr, String> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("*")) => BinaryOp::Mul,
                Some(Token::Op("/")) => BinaryOp::Div,
                Some(Token::Op("%")) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, String> {
        if self.eat_op("-") {
            return Ok(Expr::Neg(Box::new(self.nested(Self::unary)?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_op(".") {
                let name = match self.next() {
                    Some(Token::Ident(name)) => name,
                    _ => return Err("expected method name after `.`".to_owned()),
                };
                self.expect_op("(")?;
                let args = self.args()?;
                expr = Expr::Method {
                    receiver: Box::new(expr),
                    name,
                    args,
                };
            } else if self.eat_op("[") {
                let index = self.conditional()?;
                self.expect_op("]")?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated arguments; the opening `(` is already consumed.
    fn args(&mut self) -> Result<Vec<Expr>, String> {
        let mut args = Vec::new();
        if self.eat_op(")") {
            return Ok(args);
        }
        loop {
            args.push(self.conditional()?);
            if self.eat_op(")") {
                return Ok(args);
            }
            self.expect_op(",")?;
        }
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Expr::Int(i)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::Ident(name)) => self.name(name),
            Some(Token::Op("(")) => {
                let inner = self.conditional()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Some(token) => Err(format!("unexpected {}", describe(&token))),
            None => Err("unexpected end of expression".to_owned()),
        }
    }

    fn name(&mut self, name: String) -> Result<Expr, String> {
        match name.as_str() {
            "True" => return Ok(Expr::Bool(true)),
            "False" => return Ok(Expr::Bool(false)),
            "if" | "else" | "and" | "or" | "not" => {
                return Err(format!("unexpected keyword `{name}`"));
            }
            _ => {}
        }
        if self.eat_op("(") {
            let args = self.args()?;
            return Ok(Expr::Call { name, args });
        }
        Ok(Expr::Name(name))
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_with_method_chain() {
        let expr = parse("g(1).upper()").expect("should parse");
        assert_eq!(
            expr,
            Expr::Method {
                receiver: Box::new(Expr::Call {
                    name: "g".to_owned(),
                    args: vec![Expr::Int(1)],
                }),
                name: "upper".to_owned(),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_precedence() {
        let expr = parse("1 + 2 * 3").expect("should parse");
        assert_eq!(
            expr,
            binary(
                BinaryOp::Add,
                Expr::Int(1),
                binary(BinaryOp::Mul, Expr::Int(2), Expr::Int(3)),
            )
        );
    }

    #[test]
    fn test_conditional() {
        let expr = parse("'a' if m.start() == 0 else 'b'").expect("should parse");
        assert!(matches!(expr, Expr::Conditional { .. }));
    }

    #[test]
    fn test_string_escapes() {
        let expr = parse(r#""x\"y" + 'it\'s'"#).expect("should parse");
        assert_eq!(
            expr,
            binary(
                BinaryOp::Add,
                Expr::Str("x\"y".to_owned()),
                Expr::Str("it's".to_owned()),
            )
        );
    }

    #[test]
    fn test_errors() {
        assert!(parse("").is_err());
        assert!(parse("g(1").is_err());
        assert!(parse("1 +").is_err());
        assert!(parse("'open").is_err());
        assert!(parse("a b").is_err());
        assert!(parse("import os; os.system('x')").is_err());
        assert!(parse("x if y").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        let too_deep = Err("expression nested too deeply".to_owned());
        assert!(parse(&nested(50)).is_ok());
        assert_eq!(parse(&nested(500)), too_deep);
        assert_eq!(parse(&format!("{}1", "-".repeat(1000))), too_deep);
        assert_eq!(parse(&format!("{}x", "not ".repeat(1000))), too_deep);
        assert!(parse(&nested(50_000)).is_err());
    }

    #[test]
    fn test_token_limit() {
        let chain = vec!["1"; 1000].join(" + ");
        assert!(parse(&chain).is_ok());
        let long = vec!["1"; 20_000].join(" + ");
        assert!(parse(&long).is_err());
    }
}
