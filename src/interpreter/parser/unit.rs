use std::iter::Peekable;

use crate::{
    ast::{Expr, ExprKind},
    error::ParseError,
    interpreter::{
        lexer::Token,
        parser::{
            core::ParseResult,
            utils::{expect, peek_line},
        },
    },
    quantity::{Quantity, QuantityError, lookup_unit},
    util::num::i64_to_f64_checked,
};

/// Parses a unit expression into a [`ExprKind::Unit`] node.
///
/// Grammar:
/// ```text
///     unit   := factor (("*" | "/") factor)*
///     factor := (symbol | "(" unit ")") (("^" | "**") ["-" | "+"] integer)?
/// ```
/// A `*` or `/` only continues the unit when a unit symbol, or a
/// parenthesised unit, follows it; `2 mm / s` is a velocity while
/// `2 mm / x` divides by `x`.
///
/// The text of the node is the unit as written without spaces, such as
/// `kg*mm/s^2`.
///
/// # Errors
/// `UnknownUnit` for an unknown symbol, or `Other` when the exponents
/// overflow.
pub fn parse_unit_expression<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let line = peek_line(tokens);
    let (quantity, text) = parse_unit_term(tokens)?;
    Ok(Expr::new(ExprKind::Unit { quantity, text }, line))
}

/// Whether `token` is a known unit symbol.
pub(in crate::interpreter::parser) fn is_unit_symbol(token: Option<&Token>) -> bool {
    matches!(token, Some(Token::Identifier(name)) if lookup_unit(name).is_some())
}

/// Whether the tokens start a unit: a symbol or `(` and a symbol.
pub(in crate::interpreter::parser) fn starts_unit<'a, I>(tokens: &Peekable<I>) -> bool
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut ahead = tokens.clone();
    loop {
        match ahead.next().map(|(t, _)| t) {
            Some(Token::LParen) => {},
            token => return is_unit_symbol(token),
        }
    }
}

fn parse_unit_term<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<(Quantity, String)>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let (mut quantity, mut text) = parse_unit_factor(tokens)?;
    loop {
        let divide = match tokens.peek() {
            Some((Token::Star, _)) => false,
            Some((Token::Slash, _)) => true,
            _ => break,
        };
        let mut ahead = tokens.clone();
        ahead.next();
        if !starts_unit(&ahead) {
            break;
        }
        let line = peek_line(tokens);
        tokens.next();

        let (rhs, rhs_text) = parse_unit_factor(tokens)?;
        quantity = if divide {
                       quantity.checked_div(&rhs)
                   } else {
                       quantity.checked_mul(&rhs)
                   }.map_err(|e| unit_error(&e, line))?;
        text.push(if divide { '/' } else { '*' });
        text.push_str(&rhs_text);
    }
    Ok((quantity, text))
}

fn parse_unit_factor<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<(Quantity, String)>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let (quantity, mut text) = match tokens.next() {
        Some((Token::Identifier(symbol), line)) => {
            let quantity = Quantity::from_symbol(symbol).ok_or_else(|| ParseError::UnknownUnit {
                                                             unit: symbol.clone(),
                                                             line: *line,
                                                         })?;
            (quantity, symbol.clone())
        },
        // `in` only reaches here when it was already judged to be the inch
        // after a number.
        Some((Token::In, line)) => {
            let quantity = Quantity::from_symbol("in").ok_or(ParseError::UnknownUnit {
                                                                 unit: "in".to_string(),
                                                                 line: *line,
                                                             })?;
            (quantity, "in".to_string())
        },
        Some((Token::LParen, _)) => {
            let (quantity, inner) = parse_unit_term(tokens)?;
            expect(tokens, &Token::RParen)?;
            (quantity, format!("({inner})"))
        },
        Some((tok, line)) => {
            return Err(ParseError::UnexpectedToken { token: format!("Expected unit, found {tok:?}"),
                                                     line:  *line, });
        },
        None => return Err(ParseError::UnexpectedEndOfInput { line: 0 }),
    };

    let spelling = match tokens.peek() {
        Some((Token::Caret, _)) => "^",
        Some((Token::DoubleStar, _)) => "**",
        _ => return Ok((quantity, text)),
    };
    let line = peek_line(tokens);
    tokens.next();
    let negative = match tokens.peek() {
        Some((Token::Minus, _)) => {
            tokens.next();
            true
        },
        Some((Token::Plus, _)) => {
            tokens.next();
            false
        },
        _ => false,
    };
    let exponent = match tokens.next() {
        Some((Token::Integer(n), _)) => *n,
        Some((tok, line)) => {
            return Err(ParseError::UnexpectedToken { token: format!("Expected integer exponent, found {tok:?}"),
                                                     line:  *line, });
        },
        None => return Err(ParseError::UnexpectedEndOfInput { line: 0 }),
    };
    let exponent = if negative { -exponent } else { exponent };
    let power = i64_to_f64_checked(exponent, ParseError::LiteralTooLarge { line })?;
    let quantity = quantity.checked_pow(&Quantity::dimensionless(power))
                           .map_err(|e| unit_error(&e, line))?;
    text.push_str(spelling);
    text.push_str(&exponent.to_string());
    Ok((quantity, text))
}

fn unit_error(error: &QuantityError, line: usize) -> ParseError {
    ParseError::Other { message: error.to_string(),
                        line }
}
