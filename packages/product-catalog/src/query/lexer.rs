//! Criteria tokenizer
//!
//! Splits a WHERE clause into connectives, parentheses and leaf expressions
//! of the form `key <op> 'value'`. Literals are single-quoted and cannot
//! contain a quote; there is no escape sequence.

use crate::domain::query::QueryCriteria;
use crate::error::{CatalogError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "==" | "=" => Some(Comparison::Eq),
            "!=" => Some(Comparison::Ne),
            "<" => Some(Comparison::Lt),
            "<=" => Some(Comparison::Le),
            ">" => Some(Comparison::Gt),
            ">=" => Some(Comparison::Ge),
            _ => None,
        }
    }
}

/// `key <op> 'value'`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Expression {
    pub key: String,
    pub op: Comparison,
    pub value: String,
}

impl Expression {
    pub fn into_criteria(self) -> Result<QueryCriteria> {
        let Expression { key, op, value } = self;
        match op {
            Comparison::Eq => Ok(QueryCriteria::term(key, value)),
            Comparison::Ne => Ok(QueryCriteria::not(QueryCriteria::term(key, value))),
            Comparison::Lt => QueryCriteria::range(key, None, Some(value), false),
            Comparison::Le => QueryCriteria::range(key, None, Some(value), true),
            Comparison::Gt => QueryCriteria::range(key, Some(value), None, false),
            Comparison::Ge => QueryCriteria::range(key, Some(value), None, true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    And,
    Or,
    Not,
    LParen,
    RParen,
    Expr(Expression),
}

fn is_key_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '\'' | '=' | '!' | '<' | '>')
}

fn is_op_char(c: char) -> bool {
    matches!(c, '=' | '!' | '<' | '>')
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            _ if is_key_char(c) => {
                let start = i;
                while i < chars.len() && is_key_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "AND" => tokens.push(Token::And),
                    "OR" => tokens.push(Token::Or),
                    "NOT" => tokens.push(Token::Not),
                    _ => {
                        let (expr, next) = read_expression(&chars, i, word)?;
                        tokens.push(Token::Expr(expr));
                        i = next;
                    }
                }
            }
            other => {
                return Err(CatalogError::query_formulation(format!(
                    "unexpected '{}' at position {} in '{}'",
                    other, i, input
                )))
            }
        }
    }

    Ok(tokens)
}

/// Read `<op> 'value'` following `key`; returns the expression and the next position
fn read_expression(chars: &[char], mut i: usize, key: String) -> Result<(Expression, usize)> {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    let op_start = i;
    while i < chars.len() && is_op_char(chars[i]) {
        i += 1;
    }
    let op_text: String = chars[op_start..i].iter().collect();
    let op = Comparison::parse(&op_text).ok_or_else(|| {
        CatalogError::query_formulation(format!(
            "expected comparison operator after '{}', found '{}'",
            key, op_text
        ))
    })?;

    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    if i >= chars.len() || chars[i] != '\'' {
        return Err(CatalogError::query_formulation(format!(
            "expected quoted value after '{} {}'",
            key, op_text
        )));
    }
    i += 1;
    let value_start = i;
    while i < chars.len() && chars[i] != '\'' {
        i += 1;
    }
    if i >= chars.len() {
        return Err(CatalogError::query_formulation(format!(
            "unterminated literal for '{}'",
            key
        )));
    }
    let value: String = chars[value_start..i].iter().collect();

    Ok((Expression { key, op, value }, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(key: &str, op: Comparison, value: &str) -> Token {
        Token::Expr(Expression {
            key: key.to_string(),
            op,
            value: value.to_string(),
        })
    }

    #[test]
    fn test_tokenize_connectives_and_literals() {
        let tokens = tokenize("x == '1' AND (y>='a b' OR NOT(z != ')'))").unwrap();
        assert_eq!(
            tokens,
            vec![
                expr("x", Comparison::Eq, "1"),
                Token::And,
                Token::LParen,
                expr("y", Comparison::Ge, "a b"),
                Token::Or,
                Token::Not,
                Token::LParen,
                expr("z", Comparison::Ne, ")"),
                Token::RParen,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_dotted_keys() {
        let tokens = tokenize("CAS.ProductName = 'foo'").unwrap();
        assert_eq!(tokens, vec![expr("CAS.ProductName", Comparison::Eq, "foo")]);
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("x == 1").is_err());
        assert!(tokenize("x == 'open").is_err());
        assert!(tokenize("x ~ 'a'").is_err());
        assert!(tokenize("== 'a'").is_err());
    }
}
