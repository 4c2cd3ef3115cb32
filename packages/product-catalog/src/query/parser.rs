//! Query DSL parser
//!
//! ```text
//! SQL (FORMAT='..', SORT_BY='..', FILTER='start,end,priority,algorithm[,epsilon]') {
//!     SELECT f1,f2 FROM type1,type2 WHERE elem == 'v' AND (other > 'x' OR other <= 'y')
//! }
//! ```
//!
//! The WHERE clause goes through the shunting-yard algorithm: `(` pushes,
//! `)` pops to the matching `(` and then pops a pending NOT, AND pops pending
//! ANDs, OR pops pending ANDs and ORs. Mixed AND/OR without parentheses
//! therefore groups AND first; NOT without parentheses applies to everything
//! after it.

use crate::domain::query::{
    BooleanOperator, ComplexQuery, FilterAlgorithm, FilterAlgorithmKind, Query, QueryCriteria,
    QueryFilter,
};
use crate::error::{CatalogError, Result};
use crate::query::lexer::{tokenize, Token};

/// Parse a full query (`SQL (...) { SELECT ... }` or a bare `SELECT ...`)
pub fn parse_query(text: &str) -> Result<ComplexQuery> {
    let text = text.trim();
    let (args, body) = split_method(text)?;

    let mut complex = parse_select(body)?;
    for (name, value) in parse_args(args)? {
        match name.as_str() {
            "FORMAT" => complex.output_format = Some(value),
            "SORT_BY" => complex.sort_by = Some(value),
            "FILTER" => complex.filter = Some(parse_filter(&value)?),
            other => {
                return Err(CatalogError::query_formulation(format!(
                    "unknown query argument '{}'",
                    other
                )))
            }
        }
    }
    Ok(complex)
}

/// Parse a WHERE clause into one criterion
pub fn parse_criteria(text: &str) -> Result<QueryCriteria> {
    let postfix = to_postfix(tokenize(text)?)?;
    if postfix.is_empty() {
        return Err(CatalogError::query_formulation("empty criteria"));
    }

    let mut stack: Vec<QueryCriteria> = Vec::new();
    for token in postfix {
        match token {
            Token::Expr(expr) => stack.push(expr.into_criteria()?),
            Token::And => push_binary(&mut stack, BooleanOperator::And)?,
            Token::Or => push_binary(&mut stack, BooleanOperator::Or)?,
            Token::Not => {
                let term = pop_operand(&mut stack, BooleanOperator::Not)?;
                stack.push(QueryCriteria::not(term));
            }
            Token::LParen | Token::RParen => {
                return Err(CatalogError::query_formulation("unbalanced parentheses"))
            }
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(criteria), true) => Ok(criteria),
        _ => Err(CatalogError::query_formulation(format!(
            "criteria '{}' does not reduce to a single expression",
            text
        ))),
    }
}

/// Operands keep their left-to-right order
fn push_binary(stack: &mut Vec<QueryCriteria>, operator: BooleanOperator) -> Result<()> {
    let right = pop_operand(stack, operator)?;
    let left = pop_operand(stack, operator)?;
    stack.push(QueryCriteria::boolean(operator, vec![left, right])?);
    Ok(())
}

fn pop_operand(stack: &mut Vec<QueryCriteria>, operator: BooleanOperator) -> Result<QueryCriteria> {
    stack.pop().ok_or_else(|| {
        CatalogError::query_formulation(format!("{} is missing an operand", operator))
    })
}

/// Infix -> postfix (shunting-yard)
pub(crate) fn to_postfix(tokens: Vec<Token>) -> Result<Vec<Token>> {
    let mut output = Vec::with_capacity(tokens.len());
    let mut stack: Vec<Token> = Vec::new();

    for token in tokens {
        match token {
            Token::Expr(_) => output.push(token),
            Token::LParen | Token::Not => stack.push(token),
            Token::RParen => {
                loop {
                    match stack.pop() {
                        Some(Token::LParen) => break,
                        Some(op) => output.push(op),
                        None => {
                            return Err(CatalogError::query_formulation(
                                "unbalanced parentheses: unexpected ')'",
                            ))
                        }
                    }
                }
                if stack.last() == Some(&Token::Not) {
                    output.extend(stack.pop());
                }
            }
            Token::And => {
                while stack.last() == Some(&Token::And) {
                    output.extend(stack.pop());
                }
                stack.push(token);
            }
            Token::Or => {
                while matches!(stack.last(), Some(Token::And) | Some(Token::Or)) {
                    output.extend(stack.pop());
                }
                stack.push(token);
            }
        }
    }

    while let Some(op) = stack.pop() {
        if op == Token::LParen {
            return Err(CatalogError::query_formulation(
                "unbalanced parentheses: missing ')'",
            ));
        }
        output.push(op);
    }
    Ok(output)
}

/// Split `SQL (args) { body }` into its argument list and body
fn split_method(text: &str) -> Result<(&str, &str)> {
    if !starts_with_keyword(text, "SQL") {
        return Ok(("", text));
    }
    let rest = text[3..].trim_start();

    let (args, rest) = if rest.starts_with('(') {
        let close = matching_paren(rest).ok_or_else(|| {
            CatalogError::query_formulation("unterminated argument list")
        })?;
        (&rest[1..close], rest[close + 1..].trim_start())
    } else {
        ("", rest)
    };

    let body = rest
        .strip_prefix('{')
        .and_then(|r| r.trim_end().strip_suffix('}'))
        .ok_or_else(|| {
            CatalogError::query_formulation("query body must be enclosed in '{ ... }'")
        })?;
    Ok((args, body.trim()))
}

/// Byte index of the `)` closing the `(` at index 0, skipping quoted text
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_args(args: &str) -> Result<Vec<(String, String)>> {
    let mut parsed = Vec::new();
    for piece in split_unquoted(args, ',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let (name, value) = piece.split_once('=').ok_or_else(|| {
            CatalogError::query_formulation(format!("malformed query argument '{}'", piece))
        })?;
        let value = value.trim();
        let value = value
            .strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .unwrap_or(value);
        parsed.push((name.trim().to_ascii_uppercase(), value.to_string()));
    }
    Ok(parsed)
}

fn parse_filter(value: &str) -> Result<QueryFilter> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 4 && parts.len() != 5 {
        return Err(CatalogError::query_formulation(format!(
            "FILTER needs 'start,end,priority,algorithm[,epsilon]', got '{}'",
            value
        )));
    }
    let epsilon = match parts.get(4) {
        Some(eps) => eps.parse::<i64>().map_err(|_| {
            CatalogError::query_formulation(format!("FILTER epsilon '{}' is not an integer", eps))
        })?,
        None => 0,
    };
    Ok(QueryFilter {
        start_key: parts[0].to_string(),
        end_key: parts[1].to_string(),
        priority_key: parts[2].to_string(),
        algorithm: FilterAlgorithm {
            kind: FilterAlgorithmKind::parse(parts[3])?,
            epsilon,
        },
    })
}

/// `SELECT <fields|*> FROM <types|*> [WHERE <criteria>]`
fn parse_select(body: &str) -> Result<ComplexQuery> {
    if !starts_with_keyword(body, "SELECT") {
        return Err(CatalogError::query_formulation(format!(
            "expected SELECT in '{}'",
            body
        )));
    }
    let from = find_keyword(body, "FROM").ok_or_else(|| {
        CatalogError::query_formulation(format!("missing FROM in '{}'", body))
    })?;
    let where_at = find_keyword(body, "WHERE").filter(|w| *w > from);

    let fields = &body["SELECT".len()..from];
    let (types, criteria) = match where_at {
        Some(w) => (&body[from + "FROM".len()..w], Some(&body[w + "WHERE".len()..])),
        None => (&body[from + "FROM".len()..], None),
    };

    let mut query = Query::new();
    if let Some(criteria) = criteria {
        query.add_criterion(parse_criteria(criteria)?);
    }

    Ok(ComplexQuery {
        query,
        reduced_metadata: parse_list(fields),
        reduced_product_types: parse_list(types),
        ..Default::default()
    })
}

/// Comma list; `*` means no restriction
fn parse_list(text: &str) -> Option<Vec<String>> {
    let text = text.trim();
    if text == "*" {
        return None;
    }
    Some(
        text.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn split_unquoted(text: &str, sep: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == '\'' {
            quoted = !quoted;
        } else if c == sep && !quoted {
            pieces.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    pieces.push(&text[start..]);
    pieces
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    text.len() >= keyword.len()
        && text.is_char_boundary(keyword.len())
        && text[..keyword.len()].eq_ignore_ascii_case(keyword)
        && text[keyword.len()..]
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace() || c == '(' || c == '{')
}

/// Byte offset of a whole-word, case-insensitive keyword outside quotes
fn find_keyword(text: &str, keyword: &str) -> Option<usize> {
    let mut quoted = false;
    let mut prev_boundary = true;
    for (i, c) in text.char_indices() {
        if c == '\'' {
            quoted = !quoted;
        }
        if !quoted && prev_boundary && starts_with_keyword(&text[i..], keyword) {
            return Some(i);
        }
        prev_boundary = c.is_whitespace();
    }
    None
}
