use std::iter::Peekable;

use crate::{
    ast::{Expr, ExprKind, Item},
    error::ParseError,
    interpreter::{
        lexer::Token,
        parser::{
            binary::parse_logical_or,
            utils::{accept, expect, parse_parameters},
        },
    },
};

pub type ParseResult<T> = Result<T, ParseError>;

/// Parses a full expression.
///
/// This is the entry point for expression parsing. It handles the forms
/// binding looser than `or`: lambdas and both conditional spellings, then
/// descends through the precedence hierarchy.
///
/// Grammar:
/// ```text
///     expression := "lambda" params ":" expression
///                 | logical_or "?" expression ":" expression
///                 | logical_or "if" logical_or "else" expression
///                 | logical_or
/// ```
///
/// # Parameters
/// - `tokens`: Token iterator providing `(Token, line)` pairs.
///
/// # Returns
/// The parsed expression node.
pub fn parse_expression<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    if let Some((Token::Lambda, line)) = tokens.peek() {
        let line = *line;
        tokens.next();
        return parse_lambda(tokens, line);
    }

    let first = parse_logical_or(tokens)?;
    match tokens.peek() {
        Some((Token::Question, line)) => {
            let line = *line;
            tokens.next();
            let then_branch = parse_expression(tokens)?;
            expect(tokens, &Token::Colon)?;
            let else_branch = parse_expression(tokens)?;
            Ok(Expr::new(ExprKind::Conditional { condition:   Box::new(first),
                                                 then_branch: Box::new(then_branch),
                                                 else_branch: Box::new(else_branch),
                                                 python_form: false, },
                         line))
        },
        Some((Token::If, line)) => {
            let line = *line;
            tokens.next();
            let condition = parse_logical_or(tokens)?;
            expect(tokens, &Token::Else)?;
            let else_branch = parse_expression(tokens)?;
            Ok(Expr::new(ExprKind::Conditional { condition:   Box::new(condition),
                                                 then_branch: Box::new(first),
                                                 else_branch: Box::new(else_branch),
                                                 python_form: true, },
                         line))
        },
        _ => Ok(first),
    }
}

/// Parses `lambda params : body` after the `lambda` keyword.
///
/// Defaults are parsed at `or` level so that the `:` ending the parameter
/// list is never taken for a conditional.
///
/// # Errors
/// Parameter list errors as reported by
/// [`parse_parameters`](crate::interpreter::parser::utils::parse_parameters).
pub fn parse_lambda<'a, I>(tokens: &mut Peekable<I>, line: usize) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let params = parse_parameters(tokens, &Token::Colon, parse_logical_or)?;
    let body = parse_expression(tokens)?;
    Ok(Expr::new(ExprKind::Lambda { params,
                                    body: Box::new(body) },
                 line))
}

/// Parses one expression or a bare comma-separated list, which forms a
/// tuple: `1, 2` or `x,`.
///
/// Items may be splatted with `*`.
pub fn parse_expression_list<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let line = tokens.peek().map_or(0, |(_, l)| *l);
    let first = parse_list_item(tokens)?;
    if !matches!(tokens.peek(), Some((Token::Comma, _))) && !first.splat {
        return Ok(first.expr);
    }
    let mut items = vec![first];
    while accept(tokens, &Token::Comma) {
        if !starts_expression(tokens.peek().map(|(t, _)| t)) {
            break;
        }
        items.push(parse_list_item(tokens)?);
    }
    Ok(Expr::new(ExprKind::Tuple(items), line))
}

/// Parses an expression optionally preceded by `*`.
pub fn parse_list_item<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Item>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let splat = accept(tokens, &Token::Star);
    Ok(Item { expr: parse_expression(tokens)?,
              splat })
}

/// Whether `token` can begin an expression.
#[must_use]
pub fn starts_expression(token: Option<&Token>) -> bool {
    matches!(token,
             Some(Token::Real(_)
                  | Token::Integer(_)
                  | Token::Str(_)
                  | Token::Label(_)
                  | Token::DocumentName(_)
                  | Token::CellRef(_)
                  | Token::Range(_)
                  | Token::TrueLiteral
                  | Token::FalseLiteral
                  | Token::NoneLiteral
                  | Token::Not
                  | Token::Lambda
                  | Token::Identifier(_)
                  | Token::Plus
                  | Token::Minus
                  | Token::Star
                  | Token::LParen
                  | Token::LBrace
                  | Token::LBracket
                  | Token::Dot))
}
