// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Parser for filter expressions.
//!
//! Parses expressions like `user = "u1" && is_read = false` into a
//! [`FilterExpr`] tree. `&&` binds tighter than `||`; parentheses group.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{Error, Result};

use super::expr::{CompareOp, FilterExpr, FilterValue};

/// Parse a filter expression from a string.
///
/// # Examples
///
/// ```
/// use lc_core::filter::parse_filter;
///
/// let expr = parse_filter("status = \"open\" && score >= 3").unwrap();
/// # let _ = expr;
/// ```
///
/// # Errors
///
/// Returns [`Error::InvalidFilter`] describing the first problem found.
pub fn parse_filter(input: &str) -> Result<FilterExpr> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::filter("empty filter expression"));
    }

    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;

    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(Error::filter(format!(
            "unexpected {} in \"{input}\"",
            token.describe()
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Op(CompareOp),
    Ident(String),
    Str(String),
    Num(f64),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::And => "'&&'".to_string(),
            Token::Or => "'||'".to_string(),
            Token::Op(_) => "operator".to_string(),
            Token::Ident(name) => format!("'{name}'"),
            Token::Str(s) => format!("string \"{s}\""),
            Token::Num(n) => format!("number {n}"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
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
            '&' | '|' => {
                chars.next();
                match chars.next() {
                    Some((_, next)) if next == c => {
                        tokens.push(if c == '&' { Token::And } else { Token::Or });
                    }
                    _ => {
                        return Err(Error::filter(format!(
                            "expected '{c}{c}' at position {start}"
                        )))
                    }
                }
            }
            '=' | '!' | '<' | '>' | '~' => {
                tokens.push(Token::Op(lex_operator(&mut chars, start)?));
            }
            '"' | '\'' => {
                chars.next();
                tokens.push(Token::Str(lex_string(&mut chars, c, start)?));
            }
            c if c.is_ascii_digit() || c == '-' => {
                tokens.push(Token::Num(lex_number(input, &mut chars, start)?));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(input[start..end].to_string()));
            }
            other => {
                return Err(Error::filter(format!(
                    "unexpected character '{other}' at position {start}"
                )))
            }
        }
    }

    Ok(tokens)
}

fn lex_operator(chars: &mut Peekable<CharIndices<'_>>, start: usize) -> Result<CompareOp> {
    let first = chars.next().map(|(_, c)| c).unwrap_or_default();
    let second = chars.peek().map(|&(_, c)| c);

    let (op, consumed_second) = match (first, second) {
        ('!', Some('=')) => (CompareOp::Ne, true),
        ('!', Some('~')) => (CompareOp::NotLike, true),
        ('<', Some('=')) => (CompareOp::Le, true),
        ('>', Some('=')) => (CompareOp::Ge, true),
        ('=', Some('=')) | ('<', Some('<')) | ('>', Some('>')) => {
            return Err(Error::filter(format!(
                "unknown operator '{first}{}' at position {start}. Valid operators: {}",
                second.unwrap_or_default(),
                CompareOp::valid_symbols()
            )))
        }
        ('=', _) => (CompareOp::Eq, false),
        ('<', _) => (CompareOp::Lt, false),
        ('>', _) => (CompareOp::Gt, false),
        ('~', _) => (CompareOp::Like, false),
        _ => {
            return Err(Error::filter(format!(
                "unknown operator '{first}' at position {start}. Valid operators: {}",
                CompareOp::valid_symbols()
            )))
        }
    };

    if consumed_second {
        chars.next();
    }
    Ok(op)
}

fn lex_string(chars: &mut Peekable<CharIndices<'_>>, quote: char, start: usize) -> Result<String> {
    let mut out = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            c if c == quote => return Ok(out),
            c => out.push(c),
        }
    }
    Err(Error::filter(format!(
        "unterminated string starting at position {start}"
    )))
}

fn lex_number(input: &str, chars: &mut Peekable<CharIndices<'_>>, start: usize) -> Result<f64> {
    let mut end = start;
    let mut prev = None;
    while let Some(&(i, c)) = chars.peek() {
        let sign_ok = (c == '-' || c == '+') && (i == start || matches!(prev, Some('e' | 'E')));
        if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || sign_ok {
            end = i + c.len_utf8();
            prev = Some(c);
            chars.next();
        } else {
            break;
        }
    }

    let text = &input[start..end];
    text.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| Error::filter(format!("invalid number '{text}' at position {start}")))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<FilterExpr> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.parse_and()?;
            left = left.or(right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<FilterExpr> {
        let mut left = self.parse_unary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.parse_unary()?;
            left = left.and(right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<FilterExpr> {
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let inner = self.parse_or()?;
            return match self.next() {
                Some(Token::RParen) => Ok(inner),
                Some(other) => Err(Error::filter(format!(
                    "expected ')', found {}",
                    other.describe()
                ))),
                None => Err(Error::filter("missing closing ')'")),
            };
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<FilterExpr> {
        let field = match self.next() {
            Some(Token::Ident(name)) => name,
            Some(other) => {
                return Err(Error::filter(format!(
                    "expected field name, found {}",
                    other.describe()
                )))
            }
            None => return Err(Error::filter("expected field name, found end of input")),
        };

        let op = match self.next() {
            Some(Token::Op(op)) => op,
            Some(other) => {
                return Err(Error::filter(format!(
                    "expected operator after '{field}', found {}. Valid operators: {}",
                    other.describe(),
                    CompareOp::valid_symbols()
                )))
            }
            None => return Err(Error::filter(format!("missing operator after '{field}'"))),
        };

        let value = match self.next() {
            Some(Token::Str(s)) => FilterValue::String(s),
            Some(Token::Num(n)) => FilterValue::Number(n),
            Some(Token::Ident(word)) => match word.as_str() {
                "true" => FilterValue::Bool(true),
                "false" => FilterValue::Bool(false),
                "null" => FilterValue::Null,
                _ => {
                    return Err(Error::filter(format!(
                        "expected value after '{field}', found '{word}' (quote strings)"
                    )))
                }
            },
            Some(other) => {
                return Err(Error::filter(format!(
                    "expected value after '{field}', found {}",
                    other.describe()
                )))
            }
            None => return Err(Error::filter(format!("missing value after '{field}'"))),
        };

        Ok(FilterExpr::compare(field, op, value))
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
