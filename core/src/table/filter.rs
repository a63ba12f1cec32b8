//! Boolean row filters over column names and literal values.
//!
//! ```text
//! edad >= 60 and resultado == "normal"
//! `Fecha estudio` >= '2025-08-01' or not (tipo in ["venoso", "arterial"])
//! diagnostico contains "estenosis"
//! ```
//!
//! Column references are resolved when the filter is compiled, so a filter
//! naming an unknown column is rejected before any row is read.

use crate::error::DataAccessError;
use crate::table::{CellValue, Table, resolve_column};
use std::cmp::Ordering;

const MAX_FILTER_LEN: usize = 4096;
const MAX_NESTING: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Quoted(String),
    Str(String),
    Num(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Cmp(CmpOp),
    And,
    Or,
    Not,
    In,
    True,
    False,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Column(usize),
    Literal(CellValue),
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Operand, CmpOp, Operand),
    InList {
        operand: Operand,
        values: Vec<CellValue>,
        negated: bool,
    },
    Truthy(Operand),
}

/// A compiled filter bound to one table's column layout.
#[derive(Debug, Clone)]
pub struct Filter {
    expr: Expr,
}

impl Filter {
    pub fn compile(source: &str, columns: &[String]) -> Result<Filter, DataAccessError> {
        if source.len() > MAX_FILTER_LEN {
            return Err(invalid(format!(
                "filter is longer than {} bytes",
                MAX_FILTER_LEN
            )));
        }
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Err(invalid("empty filter expression"));
        }
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            columns,
        };
        let expr = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(invalid(format!("unexpected {}", describe(tok))));
        }
        Ok(Filter { expr })
    }

    pub fn matches(&self, table: &Table, row: usize) -> bool {
        eval(&self.expr, table, row)
    }

    /// Indices of every matching row, in table order.
    pub fn apply(&self, table: &Table) -> Vec<usize> {
        (0..table.num_rows())
            .filter(|&row| self.matches(table, row))
            .collect()
    }
}

fn invalid(message: impl Into<String>) -> DataAccessError {
    DataAccessError::InvalidFilter(message.into())
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(s) | Token::Quoted(s) => format!("identifier '{}'", s),
        Token::Str(s) => format!("string '{}'", s),
        Token::Num(n) => format!("number {}", n),
        other => format!("token {:?}", other),
    }
}

fn keyword(word: &str) -> Option<Token> {
    match word.to_lowercase().as_str() {
        "and" => Some(Token::And),
        "or" => Some(Token::Or),
        "not" => Some(Token::Not),
        "in" => Some(Token::In),
        "contains" => Some(Token::Cmp(CmpOp::Contains)),
        "true" => Some(Token::True),
        "false" => Some(Token::False),
        "null" | "none" => Some(Token::Null),
        _ => None,
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, DataAccessError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();

        match ch {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Cmp(CmpOp::Eq));
                i += if next == Some('=') { 2 } else { 1 };
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Ne));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Le));
                i += 2;
            }
            '<' if next == Some('>') => {
                tokens.push(Token::Cmp(CmpOp::Ne));
                i += 2;
            }
            '<' => {
                tokens.push(Token::Cmp(CmpOp::Lt));
                i += 1;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::Cmp(CmpOp::Ge));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Cmp(CmpOp::Gt));
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '"' | '\'' | '`' => {
                let quote = ch;
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&c| c == quote)
                    .map(|offset| start + offset)
                    .ok_or_else(|| invalid(format!("unterminated {} quote", quote)))?;
                let text: String = chars[start..end].iter().collect();
                tokens.push(if quote == '`' {
                    Token::Quoted(text)
                } else {
                    Token::Str(text)
                });
                i = end + 1;
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '.') && next.is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < chars.len()
                    && (chars[i].is_ascii_digit()
                        || chars[i] == '.'
                        || chars[i] == 'e'
                        || chars[i] == 'E'
                        || ((chars[i] == '-' || chars[i] == '+')
                            && matches!(chars[i - 1], 'e' | 'E')))
                {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| invalid(format!("malformed number '{}'", text)))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(keyword(&word).unwrap_or(Token::Ident(word)));
            }
            other => return Err(invalid(format!("unexpected character '{}'", other))),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    columns: &'a [String],
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), DataAccessError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(match self.peek() {
                Some(tok) => invalid(format!("expected {}, found {}", what, describe(tok))),
                None => invalid(format!("expected {}, found end of expression", what)),
            })
        }
    }

    /// Parentheses and `not` recurse; bound how deep they may go.
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, DataAccessError>,
    ) -> Result<T, DataAccessError> {
        if self.depth >= MAX_NESTING {
            return Err(invalid(format!(
                "filter nested too deeply (more than {} levels)",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_or(&mut self) -> Result<Expr, DataAccessError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, DataAccessError> {
        let mut left = self.parse_not()?;
        while self.eat(&Token::And) {
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, DataAccessError> {
        if self.eat(&Token::Not) {
            return self.nested(|p| Ok(Expr::Not(Box::new(p.parse_not()?))));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, DataAccessError> {
        if self.eat(&Token::LParen) {
            return self.nested(|p| {
                let inner = p.parse_or()?;
                p.expect(Token::RParen, "')'")?;
                Ok(inner)
            });
        }

        let left = self.parse_operand()?;

        match self.peek() {
            Some(Token::Cmp(op)) => {
                let op = *op;
                self.pos += 1;
                let right = self.parse_operand()?;
                Ok(Expr::Compare(left, op, right))
            }
            Some(Token::In) => {
                self.pos += 1;
                self.parse_in_list(left, false)
            }
            Some(Token::Not) if self.tokens.get(self.pos + 1) == Some(&Token::In) => {
                self.pos += 2;
                self.parse_in_list(left, true)
            }
            _ => Ok(Expr::Truthy(left)),
        }
    }

    fn parse_in_list(&mut self, operand: Operand, negated: bool) -> Result<Expr, DataAccessError> {
        self.expect(Token::LBracket, "'['")?;
        let mut values = Vec::new();
        if !self.eat(&Token::RBracket) {
            loop {
                values.push(self.parse_literal()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(Token::RBracket, "']'")?;
                break;
            }
        }
        Ok(Expr::InList {
            operand,
            values,
            negated,
        })
    }

    fn parse_literal(&mut self) -> Result<CellValue, DataAccessError> {
        match self.parse_operand()? {
            Operand::Literal(value) => Ok(value),
            Operand::Column(idx) => Err(invalid(format!(
                "expected a literal value, found column '{}'",
                self.columns[idx]
            ))),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, DataAccessError> {
        match self.advance() {
            Some(Token::Ident(name)) | Some(Token::Quoted(name)) => {
                resolve_column(self.columns, &name)
                    .map(Operand::Column)
                    .ok_or_else(|| {
                        invalid(format!(
                            "unknown column '{}'; available columns: {}",
                            name,
                            self.columns.join(", ")
                        ))
                    })
            }
            Some(Token::Str(s)) => Ok(Operand::Literal(CellValue::Text(s))),
            Some(Token::Num(n)) => Ok(Operand::Literal(number_literal(n))),
            Some(Token::True) => Ok(Operand::Literal(CellValue::Bool(true))),
            Some(Token::False) => Ok(Operand::Literal(CellValue::Bool(false))),
            Some(Token::Null) => Ok(Operand::Literal(CellValue::Empty)),
            Some(other) => Err(invalid(format!(
                "expected a column or value, found {}",
                describe(&other)
            ))),
            None => Err(invalid("expected a column or value, found end of expression")),
        }
    }
}

fn number_literal(n: f64) -> CellValue {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        CellValue::Int(n as i64)
    } else {
        CellValue::Float(n)
    }
}

fn resolve<'a>(operand: &'a Operand, table: &'a Table, row: usize) -> &'a CellValue {
    match operand {
        Operand::Column(idx) => table.cell(row, *idx),
        Operand::Literal(value) => value,
    }
}

fn eval(expr: &Expr, table: &Table, row: usize) -> bool {
    match expr {
        Expr::And(a, b) => eval(a, table, row) && eval(b, table, row),
        Expr::Or(a, b) => eval(a, table, row) || eval(b, table, row),
        Expr::Not(inner) => !eval(inner, table, row),
        Expr::Truthy(operand) => resolve(operand, table, row).is_truthy(),
        Expr::Compare(left, op, right) => {
            compare(resolve(left, table, row), *op, resolve(right, table, row))
        }
        Expr::InList {
            operand,
            values,
            negated,
        } => {
            let value = resolve(operand, table, row);
            let found = values
                .iter()
                .any(|v| value.compare(v) == Some(Ordering::Equal));
            found != *negated
        }
    }
}

fn compare(left: &CellValue, op: CmpOp, right: &CellValue) -> bool {
    if op == CmpOp::Contains {
        if left.is_empty() {
            return false;
        }
        return left
            .to_text()
            .to_lowercase()
            .contains(&right.to_text().to_lowercase());
    }

    let ordering = left.compare(right);
    match op {
        CmpOp::Eq => ordering == Some(Ordering::Equal),
        CmpOp::Ne => ordering != Some(Ordering::Equal),
        CmpOp::Lt => ordering == Some(Ordering::Less),
        CmpOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => ordering == Some(Ordering::Greater),
        CmpOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        CmpOp::Contains => false,
    }
}
