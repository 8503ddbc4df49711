//! Nom grammar for generator expressions
//!
//! ```text
//! expr     := term (('+' | '-') term)*
//! term     := unary ('*' unary)*
//! unary    := '-' unary | postfix
//! postfix  := primary ('[' subscript ']' | '.' ident | '(' args ')')*
//! primary  := integer | string | list | '(' expr ')' | ident
//! ```

use super::ast::{BinOp, Expr};
use std::fmt;
use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    error::ErrorKind,
    multi::{many0, many0_count, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

/// Deepest allowed nesting of brackets, calls and unary minus
pub const MAX_NESTING: usize = 32;

/// Longest allowed run of binary operators or postfix operations
pub const MAX_CHAIN: usize = 128;

/// Deepest expression tree the interpreter will walk
pub const MAX_HEIGHT: usize = 256;

/// Where and why an expression failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.message, self.offset)
    }
}

/// Parse a complete generator expression
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let parsed = match all_consuming(ws(|i| expr(i, 0)))(source) {
        Ok((_, parsed)) => parsed,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = source.len() - e.input.len();
            let message = if e.code == ErrorKind::TooLarge {
                "expression nested too deeply".to_string()
            } else if e.input.trim().is_empty() {
                "unexpected end of expression".to_string()
            } else {
                format!("syntax error near `{}`", snippet(e.input))
            };
            return Err(SyntaxError { offset, message });
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(SyntaxError {
                offset: source.len(),
                message: "unexpected end of expression".to_string(),
            })
        }
    };

    if parsed.height() > MAX_HEIGHT {
        return Err(SyntaxError {
            offset: 0,
            message: "expression nested too deeply".to_string(),
        });
    }

    Ok(parsed)
}

fn snippet(input: &str) -> &str {
    match input.char_indices().nth(12) {
        Some((end, _)) => &input[..end],
        None => input,
    }
}

fn too_deep(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, ErrorKind::TooLarge))
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn expr(input: &str, depth: usize) -> IResult<&str, Expr> {
    if depth > MAX_NESTING {
        return Err(too_deep(input));
    }

    let (input, first) = term(input, depth)?;
    let (rest_input, rest) = many0(pair(
        ws(alt((value(BinOp::Add, char('+')), value(BinOp::Sub, char('-'))))),
        |i| term(i, depth),
    ))(input)?;
    if rest.len() > MAX_CHAIN {
        return Err(too_deep(input));
    }

    Ok((rest_input, fold_binary(first, rest)))
}

fn term(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, first) = unary(input, depth)?;
    let (rest_input, rest) =
        many0(pair(ws(value(BinOp::Mul, char('*'))), |i| unary(i, depth)))(input)?;
    if rest.len() > MAX_CHAIN {
        return Err(too_deep(input));
    }

    Ok((rest_input, fold_binary(first, rest)))
}

fn fold_binary(first: Expr, rest: Vec<(BinOp, Expr)>) -> Expr {
    rest.into_iter().fold(first, |left, (op, right)| Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn unary(input: &str, depth: usize) -> IResult<&str, Expr> {
    if depth > MAX_NESTING {
        return Err(too_deep(input));
    }

    alt((
        map(preceded(ws(char('-')), |i| unary(i, depth + 1)), |inner| {
            Expr::Neg(Box::new(inner))
        }),
        |i| postfix(i, depth),
    ))(input)
}

enum Postfix {
    Index(Expr),
    Slice(Option<Expr>, Option<Expr>, Option<Expr>),
    Attr(String),
    Call(Vec<Expr>),
}

fn postfix(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (mut input, mut target) = primary(input, depth)?;

    for _ in 0..=MAX_CHAIN {
        match postfix_op(input, depth + 1) {
            Ok((rest, op)) => {
                target = apply_postfix(target, op);
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, target)),
            Err(e) => return Err(e),
        }
    }

    Err(too_deep(input))
}

fn apply_postfix(target: Expr, op: Postfix) -> Expr {
    let target = Box::new(target);
    match op {
        Postfix::Index(index) => Expr::Index {
            target,
            index: Box::new(index),
        },
        Postfix::Slice(start, stop, step) => Expr::Slice {
            target,
            start: start.map(Box::new),
            stop: stop.map(Box::new),
            step: step.map(Box::new),
        },
        Postfix::Attr(name) => Expr::Attr { target, name },
        Postfix::Call(args) => Expr::Call {
            callee: target,
            args,
        },
    }
}

fn postfix_op(input: &str, depth: usize) -> IResult<&str, Postfix> {
    alt((
        delimited(ws(char('[')), |i| subscript(i, depth), ws(char(']'))),
        map(preceded(ws(char('.')), identifier), |name| {
            Postfix::Attr(name.to_string())
        }),
        map(
            delimited(ws(char('(')), |i| comma_list(i, depth), ws(char(')'))),
            Postfix::Call,
        ),
    ))(input)
}

fn subscript(input: &str, depth: usize) -> IResult<&str, Postfix> {
    alt((
        map(
            tuple((
                opt(|i| expr(i, depth)),
                ws(char(':')),
                opt(|i| expr(i, depth)),
                opt(preceded(ws(char(':')), opt(|i| expr(i, depth)))),
            )),
            |(start, _, stop, step)| Postfix::Slice(start, stop, step.flatten()),
        ),
        map(|i| expr(i, depth), Postfix::Index),
    ))(input)
}

/// Comma separated expressions, trailing comma allowed
fn comma_list(input: &str, depth: usize) -> IResult<&str, Vec<Expr>> {
    terminated(
        separated_list0(ws(char(',')), |i| expr(i, depth)),
        opt(ws(char(','))),
    )(input)
}

fn primary(input: &str, depth: usize) -> IResult<&str, Expr> {
    ws(alt((
        integer,
        map(string_literal, Expr::Str),
        map(
            delimited(char('['), |i| comma_list(i, depth + 1), ws(char(']'))),
            Expr::List,
        ),
        delimited(char('('), ws(|i| expr(i, depth + 1)), char(')')),
        map(identifier, |name| Expr::Name(name.to_string())),
    )))(input)
}

fn integer(input: &str) -> IResult<&str, Expr> {
    map_res(digit1, |digits: &str| digits.parse::<i64>().map(Expr::Int))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        quoted('\'', "\\'"),
        quoted('"', "\\\""),
    ))(input)
}

fn quoted<'a>(
    quote: char,
    stop_chars: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    map(
        delimited(
            char(quote),
            opt(escaped_transform(is_not(stop_chars), '\\', escape_sequence)),
            char(quote),
        ),
        Option::unwrap_or_default,
    )
}

fn escape_sequence(input: &str) -> IResult<&str, &str> {
    alt((
        value("\\", char('\\')),
        value("'", char('\'')),
        value("\"", char('"')),
        value("\n", char('n')),
        value("\t", char('t')),
        value("\r", char('r')),
        value("\0", char('0')),
    ))(input)
}
