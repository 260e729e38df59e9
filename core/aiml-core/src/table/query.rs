//! Row filter expressions.
//!
//! A small row-filter expression language, evaluated row by row:
//!
//! ```text
//! price > 500 and cut == 'Ideal'
//! `sale price` * 2 >= 10 | color in ['D', 'E']
//! not (age < 18) & 0 < fare <= 100
//! ```
//!
//! Precedence from loosest to tightest: `or`/`|`, `and`/`&`, `not`/`~`,
//! comparisons (chainable, including `in` and `not in`), `+ -`, `* / %`,
//! unary minus. Comparisons involving null are false, except `!=`.

use super::{truthy, Table};
use crate::error::{AimlError, Result};
use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Returns the rows of `table` for which `expr` is truthy.
///
/// A blank expression keeps every row.
pub fn filter(table: &Table, expr: &str) -> Result<Table> {
    let positions = matching_rows(table, expr)?;
    table.take_rows(&positions)
}

/// Positions of the rows for which `expr` is truthy.
pub fn matching_rows(table: &Table, expr: &str) -> Result<Vec<usize>> {
    if expr.trim().is_empty() {
        return Ok((0..table.n_rows()).collect());
    }

    let ast = parse(expr)?;
    let mut referenced = Vec::new();
    ast.columns(&mut referenced);
    let resolved = referenced
        .into_iter()
        .map(|name| {
            table
                .column_position(name)
                .map(|pos| (name.to_string(), pos))
                .ok_or_else(|| AimlError::ColumnNotFound(name.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut matches = Vec::new();
    for (pos, row) in table.rows().iter().enumerate() {
        let scope = RowScope {
            row,
            columns: &resolved,
        };
        if truthy(&ast.eval(&scope)?) {
            matches.push(pos);
        }
    }
    Ok(matches)
}

// ─────────────────────────────────────────────────────────────────────────────
// Lexer
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Quoted(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Amp,
    Pipe,
    Tilde,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => push(&mut tokens, Token::LParen, &mut i, 1),
            ')' => push(&mut tokens, Token::RParen, &mut i, 1),
            '[' => push(&mut tokens, Token::LBracket, &mut i, 1),
            ']' => push(&mut tokens, Token::RBracket, &mut i, 1),
            ',' => push(&mut tokens, Token::Comma, &mut i, 1),
            '+' => push(&mut tokens, Token::Plus, &mut i, 1),
            '-' => push(&mut tokens, Token::Minus, &mut i, 1),
            '*' => push(&mut tokens, Token::Star, &mut i, 1),
            '/' => push(&mut tokens, Token::Slash, &mut i, 1),
            '%' => push(&mut tokens, Token::Percent, &mut i, 1),
            '&' => push(&mut tokens, Token::Amp, &mut i, 1),
            '|' => push(&mut tokens, Token::Pipe, &mut i, 1),
            '~' => push(&mut tokens, Token::Tilde, &mut i, 1),
            '=' if next == Some('=') => push(&mut tokens, Token::Eq, &mut i, 2),
            '!' if next == Some('=') => push(&mut tokens, Token::Ne, &mut i, 2),
            '<' if next == Some('=') => push(&mut tokens, Token::Le, &mut i, 2),
            '>' if next == Some('=') => push(&mut tokens, Token::Ge, &mut i, 2),
            '<' => push(&mut tokens, Token::Lt, &mut i, 1),
            '>' => push(&mut tokens, Token::Gt, &mut i, 1),
            '\'' | '"' => {
                let (text, end) = lex_string(&chars, i)?;
                tokens.push(Token::Str(text));
                i = end;
            }
            '`' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == '`')
                    .map(|off| start + off)
                    .ok_or_else(|| AimlError::InvalidQuery("unterminated backtick".to_string()))?;
                tokens.push(Token::Quoted(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let (token, end) = lex_number(&chars, i)?;
                tokens.push(token);
                i = end;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(AimlError::InvalidQuery(format!(
                    "unexpected character '{}' at position {}",
                    other, i
                )))
            }
        }
    }
    Ok(tokens)
}

fn push(tokens: &mut Vec<Token>, token: Token, i: &mut usize, width: usize) {
    tokens.push(token);
    *i += width;
}

fn lex_string(chars: &[char], start: usize) -> Result<(String, usize)> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                out.push(match chars[i + 1] {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(AimlError::InvalidQuery("unterminated string literal".to_string()))
}

fn lex_number(chars: &[char], start: usize) -> Result<(Token, usize)> {
    let mut i = start;
    let mut is_float = false;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && matches!(chars[i], 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j], '+' | '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text: String = chars[start..i].iter().collect();
    let invalid = || AimlError::InvalidQuery(format!("invalid number '{}'", text));
    let token = if is_float {
        Token::Float(text.parse().map_err(|_| invalid())?)
    } else {
        match text.parse::<i64>() {
            Ok(n) => Token::Int(n),
            Err(_) => Token::Float(text.parse().map_err(|_| invalid())?),
        }
    };
    Ok((token, i))
}

// ─────────────────────────────────────────────────────────────────────────────
// AST
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Column(String),
    List(Vec<Expr>),
    Neg(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    /// `a < b <= c` is stored as operands `[a, b, c]` and ops `[<, <=]`.
    Compare(Vec<Expr>, Vec<CmpOp>),
}

impl Expr {
    fn columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Expr::Literal(_) => {}
            Expr::List(items) | Expr::Compare(items, _) => {
                items.iter().for_each(|e| e.columns(out));
            }
            Expr::Neg(inner) | Expr::Not(inner) => inner.columns(out),
            Expr::And(l, r) | Expr::Or(l, r) | Expr::Arith(_, l, r) => {
                l.columns(out);
                r.columns(out);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────────────────────

fn parse(input: &str) -> Result<Expr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(AimlError::InvalidQuery(format!(
            "unexpected token {:?} after expression",
            token
        ))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word == keyword)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(AimlError::InvalidQuery(format!(
                "expected {:?}, found {:?}",
                token,
                self.peek()
            )))
        }
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Pipe) || self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.not_expr()?;
        while self.eat(&Token::Amp) || self.eat_keyword("and") {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.eat(&Token::Tilde) || self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let first = self.additive()?;
        let mut operands = vec![first];
        let mut ops = Vec::new();
        while let Some(op) = self.comparison_op() {
            ops.push(op);
            operands.push(self.additive()?);
        }
        if ops.is_empty() {
            Ok(operands.remove(0))
        } else {
            Ok(Expr::Compare(operands, ops))
        }
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let (op, width) = match self.peek()? {
            Token::Eq => (CmpOp::Eq, 1),
            Token::Ne => (CmpOp::Ne, 1),
            Token::Lt => (CmpOp::Lt, 1),
            Token::Le => (CmpOp::Le, 1),
            Token::Gt => (CmpOp::Gt, 1),
            Token::Ge => (CmpOp::Ge, 1),
            Token::Ident(word) if word == "in" => (CmpOp::In, 1),
            Token::Ident(word) if word == "not" => match self.tokens.get(self.pos + 1) {
                Some(Token::Ident(next)) if next == "in" => (CmpOp::NotIn, 2),
                _ => return None,
            },
            _ => return None,
        };
        self.pos += width;
        Some(op)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.eat(&Token::Plus) {
                ArithOp::Add
            } else if self.eat(&Token::Minus) {
                ArithOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.multiplicative()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat(&Token::Star) {
                ArithOp::Mul
            } else if self.eat(&Token::Slash) {
                ArithOp::Div
            } else if self.eat(&Token::Percent) {
                ArithOp::Mod
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::from(n))),
            Some(Token::Float(f)) => Ok(Expr::Literal(float_value(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Quoted(name)) => Ok(Expr::Column(name)),
            Some(Token::Ident(word)) => Ok(match word.to_lowercase().as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "none" | "null" => Expr::Literal(Value::Null),
                "and" | "or" | "not" | "in" if word.chars().all(|c| c.is_lowercase()) => {
                    return Err(AimlError::InvalidQuery(format!(
                        "unexpected keyword '{}'",
                        word
                    )))
                }
                _ => Expr::Column(word),
            }),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.or_expr()?);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                    }
                }
                Ok(Expr::List(items))
            }
            Some(token) => Err(AimlError::InvalidQuery(format!(
                "unexpected token {:?}",
                token
            ))),
            None => Err(AimlError::InvalidQuery(
                "unexpected end of expression".to_string(),
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation
// ─────────────────────────────────────────────────────────────────────────────

struct RowScope<'a> {
    row: &'a [Value],
    columns: &'a [(String, usize)],
}

impl RowScope<'_> {
    fn lookup(&self, name: &str) -> Result<Value> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, pos)| self.row[*pos].clone())
            .ok_or_else(|| AimlError::ColumnNotFound(name.to_string()))
    }
}

impl Expr {
    fn eval(&self, scope: &RowScope<'_>) -> Result<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Column(name) => scope.lookup(name),
            Expr::List(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|e| e.eval(scope))
                    .collect::<Result<Vec<_>>>()?,
            )),
            Expr::Neg(inner) => negate(inner.eval(scope)?),
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&inner.eval(scope)?))),
            Expr::And(l, r) => Ok(Value::Bool(
                truthy(&l.eval(scope)?) && truthy(&r.eval(scope)?),
            )),
            Expr::Or(l, r) => Ok(Value::Bool(
                truthy(&l.eval(scope)?) || truthy(&r.eval(scope)?),
            )),
            Expr::Arith(op, l, r) => arith(*op, &l.eval(scope)?, &r.eval(scope)?),
            Expr::Compare(operands, ops) => {
                let mut left = operands[0].eval(scope)?;
                for (op, operand) in ops.iter().zip(&operands[1..]) {
                    let right = operand.eval(scope)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
        }
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Numeric view of a value; booleans count as 0/1.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn negate(value: Value) -> Result<Value> {
    match &value {
        Value::Null => Ok(Value::Null),
        _ => match (as_int(&value), as_number(&value)) {
            (Some(i), _) => Ok(i
                .checked_neg()
                .map(Value::from)
                .unwrap_or_else(|| float_value(-(i as f64)))),
            (None, Some(f)) => Ok(float_value(-f)),
            _ => Err(AimlError::InvalidQuery(format!(
                "cannot negate a {}",
                type_name(&value)
            ))),
        },
    }
}

fn arith(op: ArithOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if let (ArithOp::Add, Value::String(a), Value::String(b)) = (op, left, right) {
        return Ok(Value::String(format!("{}{}", a, b)));
    }

    let (Some(a), Some(b)) = (as_number(left), as_number(right)) else {
        return Err(AimlError::InvalidQuery(format!(
            "unsupported operand types: {} and {}",
            type_name(left),
            type_name(right)
        )));
    };

    if let (Some(x), Some(y)) = (as_int(left), as_int(right)) {
        let exact = match op {
            ArithOp::Add => x.checked_add(y),
            ArithOp::Sub => x.checked_sub(y),
            ArithOp::Mul => x.checked_mul(y),
            ArithOp::Mod if y == 0 => return Ok(Value::Null),
            ArithOp::Mod => x.checked_rem(y).map(|r| if r != 0 && (r < 0) != (y < 0) { r + y } else { r }),
            ArithOp::Div => None,
        };
        if let Some(n) = exact {
            return Ok(Value::from(n));
        }
    }

    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div | ArithOp::Mod if b == 0.0 => return Ok(Value::Null),
        ArithOp::Div => a / b,
        ArithOp::Mod => {
            let r = a % b;
            if r != 0.0 && (r < 0.0) != (b < 0.0) {
                r + b
            } else {
                r
            }
        }
    };
    Ok(float_value(result))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(_), _) | (_, Value::Array(_)) | (Value::Object(_), _) | (_, Value::Object(_)) => {
            left == right
        }
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => match (as_int(left), as_int(right)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
            _ => false,
        },
    }
}

fn order(left: &Value, right: &Value) -> Result<Option<Ordering>> {
    if left.is_null() || right.is_null() {
        return Ok(None);
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => Ok(match (as_int(left), as_int(right)) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.partial_cmp(&b),
            }),
            _ => Err(AimlError::InvalidQuery(format!(
                "cannot order {} and {}",
                type_name(left),
                type_name(right)
            ))),
        },
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool> {
    let ordered = |accept: fn(Ordering) -> bool| -> Result<bool> {
        Ok(order(left, right)?.is_some_and(accept))
    };
    match op {
        CmpOp::Eq => Ok(values_equal(left, right)),
        CmpOp::Ne => Ok(!values_equal(left, right)),
        CmpOp::Lt => ordered(|o| o == Ordering::Less),
        CmpOp::Le => ordered(|o| o != Ordering::Greater),
        CmpOp::Gt => ordered(|o| o == Ordering::Greater),
        CmpOp::Ge => ordered(|o| o != Ordering::Less),
        CmpOp::In => Ok(contains(right, left)),
        CmpOp::NotIn => Ok(!contains(right, left)),
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| values_equal(needle, item)),
        scalar => values_equal(needle, scalar),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn people() -> Table {
        Table::from_columns(vec![
            ("name", vec![json!("ann"), json!("bob"), json!("cy"), json!("dee")]),
            ("age", vec![json!(34), json!(17), json!(null), json!(52)]),
            ("score", vec![json!(1.5), json!(3.0), json!(2.25), json!(0.5)]),
            ("member", vec![json!(true), json!(false), json!(true), json!(false)]),
            ("home town", vec![json!("Oslo"), json!("Rome"), json!("Oslo"), json!("Lima")]),
        ])
        .unwrap()
    }

    fn names(table: &Table) -> Vec<String> {
        table
            .column("name")
            .unwrap()
            .into_iter()
            .map(|v| v.as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn run(expr: &str) -> Vec<String> {
        names(&filter(&people(), expr).unwrap())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Comparison Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_simple_comparison() {
        assert_eq!(run("age > 20"), vec!["ann", "dee"]);
    }

    #[test]
    fn test_string_equality() {
        assert_eq!(run("name == 'bob'"), vec!["bob"]);
        assert_eq!(run("name != \"bob\""), vec!["ann", "cy", "dee"]);
    }

    #[test]
    fn test_chained_comparison() {
        assert_eq!(run("1 < score <= 2.25"), vec!["ann", "cy"]);
    }

    #[test]
    fn test_null_comparisons_are_false_except_not_equal() {
        assert_eq!(run("age < 100"), vec!["ann", "bob", "dee"]);
        assert_eq!(run("age != 17"), vec!["ann", "cy", "dee"]);
        assert_eq!(run("age == None"), Vec::<String>::new());
    }

    #[test]
    fn test_bool_literals_compare_with_bool_column() {
        assert_eq!(run("member == True"), vec!["ann", "cy"]);
        assert_eq!(run("member == false"), vec!["bob", "dee"]);
    }

    #[test]
    fn test_membership() {
        assert_eq!(run("name in ['ann', 'dee']"), vec!["ann", "dee"]);
        assert_eq!(run("name not in ['ann', 'dee']"), vec!["bob", "cy"]);
    }

    #[test]
    fn test_backtick_column() {
        assert_eq!(run("`home town` == 'Oslo'"), vec!["ann", "cy"]);
    }

    #[test]
    fn test_ordering_string_against_number_is_an_error() {
        let err = filter(&people(), "name > 3").unwrap_err();
        assert!(matches!(err, AimlError::InvalidQuery(_)));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Boolean & Arithmetic Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_and_binds_tighter_than_or() {
        assert_eq!(
            run("name == 'bob' or age > 30 and member"),
            vec!["ann", "bob"]
        );
    }

    #[test]
    fn test_symbolic_operators() {
        assert_eq!(run("(age > 20) & ~member"), vec!["dee"]);
        assert_eq!(run("age < 18 | score < 1"), vec!["bob", "dee"]);
    }

    #[test]
    fn test_arithmetic_precedence() {
        assert_eq!(run("score * 2 + 1 > 6"), vec!["bob"]);
        assert_eq!(run("-score < -2"), vec!["bob", "cy"]);
        assert_eq!(run("age % 2 == 0"), vec!["ann", "dee"]);
    }

    #[test]
    fn test_division_by_zero_is_null() {
        assert_eq!(run("age / 0 > 0"), Vec::<String>::new());
    }

    #[test]
    fn test_truthiness_of_bare_column() {
        assert_eq!(run("member"), vec!["ann", "cy"]);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Error Tests
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_blank_expression_keeps_all_rows() {
        assert_eq!(run("   ").len(), 4);
    }

    #[test]
    fn test_unknown_column() {
        let err = filter(&people(), "height > 2").unwrap_err();
        assert!(matches!(err, AimlError::ColumnNotFound(name) if name == "height"));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["age >", "(age > 1", "age > 1 2", "name == 'open", "age $ 3"] {
            assert!(
                matches!(filter(&people(), bad), Err(AimlError::InvalidQuery(_))),
                "expected syntax error for {bad}"
            );
        }
    }
}
