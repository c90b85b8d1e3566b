// probeflow-core/src/domain/rules/expr.rs
//
// The restricted boolean expression language used inside `evidence[...]` and
// `findings[...]` match selectors. The pipeline is tokenize -> parse into a
// typed AST holding exactly the permitted nodes -> evaluate by structural
// recursion over the record-as-map. There is no host-language eval and no
// environment beyond the record itself, so the attack surface is bounded by
// the grammar below: or/and/not, == != in, constants, list and tuple
// literals, names, grouping parentheses. Everything else is rejected.

use crate::domain::error::DomainError;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    EqEq,
    NotEq,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        lhs: Box<Expr>,
        op: CmpOp,
        rhs: Box<Expr>,
    },
    Literal(Value),
    Sequence(Vec<Expr>),
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    In,
}

fn rejected(msg: impl Into<String>) -> DomainError {
    DomainError::ExpressionRejected(msg.into())
}

// --- TOKENIZER ---

fn tokenize(src: &str) -> Result<Vec<Token>, DomainError> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::EqEq);
                } else {
                    return Err(rejected("assignment '=' is not permitted (use '==')"));
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEq);
                } else {
                    return Err(rejected("'!' is not permitted (use 'not')"));
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut out = String::new();
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    match ch {
                        '\\' => match chars.next() {
                            Some('n') => out.push('\n'),
                            Some('t') => out.push('\t'),
                            Some(esc @ ('\\' | '\'' | '"')) => out.push(esc),
                            _ => return Err(rejected("unsupported string escape")),
                        },
                        ch if ch == quote => {
                            closed = true;
                            break;
                        }
                        ch => out.push(ch),
                    }
                }
                if !closed {
                    return Err(rejected("unterminated string literal"));
                }
                tokens.push(Token::Str(out));
            }
            '0'..='9' => {
                let mut num = String::new();
                let mut is_float = false;
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        num.push(d);
                        chars.next();
                    } else if d == '.' && !is_float {
                        is_float = true;
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if is_float {
                    let v: f64 = num
                        .parse()
                        .map_err(|_| rejected(format!("invalid number literal '{num}'")))?;
                    tokens.push(Token::Float(v));
                } else {
                    let v: i64 = num
                        .parse()
                        .map_err(|_| rejected(format!("invalid number literal '{num}'")))?;
                    tokens.push(Token::Int(v));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(rejected(format!(
                    "unsupported character '{other}' in match expression"
                )));
            }
        }
    }

    Ok(tokens)
}

// --- PARSER ---

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(id)) if id == kw)
    }

    fn or_expr(&mut self) -> Result<Expr, DomainError> {
        let mut lhs = self.and_expr()?;
        while self.peek_keyword("or") {
            self.next();
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, DomainError> {
        let mut lhs = self.not_expr()?;
        while self.peek_keyword("and") {
            self.next();
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, DomainError> {
        if self.peek_keyword("not") {
            self.next();
            let inner = self.not_expr()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, DomainError> {
        let lhs = self.primary()?;
        let op = match self.peek() {
            Some(Token::EqEq) => CmpOp::Eq,
            Some(Token::NotEq) => CmpOp::Ne,
            Some(Token::Ident(id)) if id == "in" => CmpOp::In,
            _ => return Ok(lhs),
        };
        self.next();
        let rhs = self.primary()?;
        // A second comparator would be a chained comparison, which the
        // grammar does not include.
        match self.peek() {
            Some(Token::EqEq) | Some(Token::NotEq) => {
                Err(rejected("chained comparisons are not permitted"))
            }
            Some(Token::Ident(id)) if id == "in" => {
                Err(rejected("chained comparisons are not permitted"))
            }
            _ => Ok(Expr::Compare {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            }),
        }
    }

    fn primary(&mut self) -> Result<Expr, DomainError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::from(n))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::from(f))),
            Some(Token::Ident(id)) => match id.as_str() {
                "true" | "True" => Ok(Expr::Literal(Value::Bool(true))),
                "false" | "False" => Ok(Expr::Literal(Value::Bool(false))),
                "null" | "None" => Ok(Expr::Literal(Value::Null)),
                "and" | "or" | "not" | "in" => {
                    Err(rejected(format!("unexpected keyword '{id}'")))
                }
                _ => Ok(Expr::Name(id)),
            },
            Some(Token::LBracket) => {
                let items = self.sequence_items(Token::RBracket)?;
                Ok(Expr::Sequence(items))
            }
            Some(Token::LParen) => {
                let first = self.or_expr()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.next();
                        // Plain grouping parentheses.
                        Ok(first)
                    }
                    Some(Token::Comma) => {
                        self.next();
                        let mut items = vec![first];
                        if self.peek() != Some(&Token::RParen) {
                            items.extend(self.sequence_items(Token::RParen)?);
                        } else {
                            self.next();
                        }
                        Ok(Expr::Sequence(items))
                    }
                    _ => Err(rejected("expected ')' or ',' in parenthesized expression")),
                }
            }
            Some(other) => Err(rejected(format!("unexpected token {other:?}"))),
            None => Err(rejected("unexpected end of expression")),
        }
    }

    /// Parse comma-separated elements up to (and including) `closer`.
    /// Consumes the closer. A trailing comma is accepted.
    fn sequence_items(&mut self, closer: Token) -> Result<Vec<Expr>, DomainError> {
        let mut items = Vec::new();
        if self.peek() == Some(&closer) {
            self.next();
            return Ok(items);
        }
        loop {
            items.push(self.or_expr()?);
            match self.next() {
                Some(Token::Comma) => {
                    if self.peek() == Some(&closer) {
                        self.next();
                        return Ok(items);
                    }
                }
                Some(tok) if tok == closer => return Ok(items),
                _ => return Err(rejected("expected ',' or a closing bracket")),
            }
        }
    }
}

/// Parse the inner expression of an `evidence[...]`/`findings[...]` selector.
pub fn parse_match_expr(src: &str) -> Result<Expr, DomainError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(rejected("empty match expression"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(rejected("trailing tokens after expression"));
    }
    Ok(expr)
}

// --- EVALUATION ---

impl Expr {
    /// Evaluate against one record. A name referenced anywhere in the tree
    /// but absent from the record makes the whole expression false.
    pub fn matches(&self, record: &Map<String, Value>) -> Result<bool, DomainError> {
        let mut names = BTreeSet::new();
        self.collect_names(&mut names);
        if names.iter().any(|n| !record.contains_key(n.as_str())) {
            return Ok(false);
        }
        Ok(truthy(&self.eval(record)?))
    }

    fn collect_names(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Or(a, b) | Expr::And(a, b) => {
                a.collect_names(out);
                b.collect_names(out);
            }
            Expr::Not(inner) => inner.collect_names(out),
            Expr::Compare { lhs, rhs, .. } => {
                lhs.collect_names(out);
                rhs.collect_names(out);
            }
            Expr::Sequence(items) => {
                for item in items {
                    item.collect_names(out);
                }
            }
            Expr::Name(name) => {
                out.insert(name.clone());
            }
            Expr::Literal(_) => {}
        }
    }

    fn eval(&self, record: &Map<String, Value>) -> Result<Value, DomainError> {
        match self {
            Expr::Or(a, b) => {
                if truthy(&a.eval(record)?) {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(truthy(&b.eval(record)?)))
            }
            Expr::And(a, b) => {
                if !truthy(&a.eval(record)?) {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(truthy(&b.eval(record)?)))
            }
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&inner.eval(record)?))),
            Expr::Compare { lhs, op, rhs } => {
                let left = lhs.eval(record)?;
                let right = rhs.eval(record)?;
                let result = match op {
                    CmpOp::Eq => values_equal(&left, &right),
                    CmpOp::Ne => !values_equal(&left, &right),
                    CmpOp::In => contains(&left, &right)?,
                };
                Ok(Value::Bool(result))
            }
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Sequence(items) => {
                let values: Result<Vec<Value>, DomainError> =
                    items.iter().map(|item| item.eval(record)).collect();
                Ok(Value::Array(values?))
            }
            Expr::Name(name) => Ok(record.get(name).cloned().unwrap_or(Value::Null)),
        }
    }
}

/// Equality with numeric coercion: 443 and 443.0 compare equal.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(fx), Some(fy)) => fx == fy,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Membership: element of a sequence, or substring of a string.
fn contains(needle: &Value, haystack: &Value) -> Result<bool, DomainError> {
    match haystack {
        Value::Array(items) => Ok(items.iter().any(|item| values_equal(needle, item))),
        Value::String(s) => match needle {
            Value::String(sub) => Ok(s.contains(sub.as_str())),
            _ => Err(rejected("'in' on a string needs a string on the left")),
        },
        _ => Err(rejected("'in' needs a sequence on the right")),
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
