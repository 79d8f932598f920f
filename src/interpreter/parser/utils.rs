use std::{collections::HashSet, iter::Peekable};

use crate::{
    ast::{Expr, Parameter, ParameterKind},
    error::ParseError,
    interpreter::{
        lexer::Token,
        parser::{core::ParseResult, unary::parse_postfix_expression},
    },
};

/// Consumes the next token, which must equal `expected`.
///
/// # Returns
/// The line of the consumed token.
///
/// # Errors
/// `ExpectedClosing` for a missing bracket, `UnexpectedToken` for anything
/// else, `UnexpectedEndOfInput` when the stream is exhausted.
pub(in crate::interpreter::parser) fn expect<'a, I>(tokens: &mut Peekable<I>,
                                                    expected: &Token)
                                                    -> ParseResult<usize>
    where I: Iterator<Item = &'a (Token, usize)>
{
    match tokens.next() {
        Some((tok, line)) if tok == expected => Ok(*line),
        Some((tok, line)) => {
            let closing = match expected {
                Token::RParen => Some(')'),
                Token::RBracket => Some(']'),
                Token::RBrace => Some('}'),
                _ => None,
            };
            Err(match closing {
                Some(expected) => ParseError::ExpectedClosing { expected,
                                                                line: *line },
                None => ParseError::UnexpectedToken { token: format!("Expected {expected:?}, found {tok:?}"),
                                                      line:  *line, },
            })
        },
        None => Err(ParseError::UnexpectedEndOfInput { line: 0 }),
    }
}

/// Consumes the next token if it equals `token`.
pub(in crate::interpreter::parser) fn accept<'a, I>(tokens: &mut Peekable<I>, token: &Token) -> bool
    where I: Iterator<Item = &'a (Token, usize)>
{
    tokens.next_if(|(t, _)| t == token).is_some()
}

/// Whether the next token equals `token`.
pub(in crate::interpreter::parser) fn peek_is<'a, I>(tokens: &mut Peekable<I>, token: &Token) -> bool
    where I: Iterator<Item = &'a (Token, usize)>
{
    matches!(tokens.peek(), Some((t, _)) if t == token)
}

/// The next token, borrowed from the token buffer rather than the
/// iterator so the stream can advance while it is held.
pub(in crate::interpreter::parser) fn peek_token<'a, I>(tokens: &Peekable<I>) -> Option<&'a Token>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    tokens.clone().next().map(|(t, _)| t)
}

/// The token after the next one.
pub(in crate::interpreter::parser) fn peek_second<'a, I>(tokens: &Peekable<I>) -> Option<&'a Token>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut ahead = tokens.clone();
    ahead.next();
    ahead.next().map(|(t, _)| t)
}

/// Line of the next token, `0` at the end of input.
pub(in crate::interpreter::parser) fn peek_line<'a, I>(tokens: &mut Peekable<I>) -> usize
    where I: Iterator<Item = &'a (Token, usize)>
{
    tokens.peek().map_or(0, |(_, line)| *line)
}

/// Whether the next token ends a simple statement.
pub(in crate::interpreter::parser) fn at_statement_end<'a, I>(tokens: &mut Peekable<I>) -> bool
    where I: Iterator<Item = &'a (Token, usize)>
{
    matches!(tokens.peek(),
             None | Some((Token::NewLine | Token::Semicolon | Token::Comment(_) | Token::Dedent, _)))
}

/// Parses a plain identifier and returns its name.
///
/// # Errors
/// Returns a `ParseError` if the next token is not an identifier or the
/// input ends unexpectedly.
pub(in crate::interpreter::parser) fn parse_identifier<'a, I>(tokens: &mut Peekable<I>)
                                                              -> ParseResult<String>
    where I: Iterator<Item = &'a (Token, usize)>
{
    match tokens.next() {
        Some((Token::Identifier(s), _)) => Ok(s.clone()),
        Some((tok, line)) => {
            Err(ParseError::UnexpectedToken { token: format!("Expected identifier, found {tok:?}"),
                                              line:  *line, })
        },
        None => Err(ParseError::UnexpectedEndOfInput { line: 0 }),
    }
}

/// Parses a dotted module name such as `os.path`.
pub(in crate::interpreter::parser) fn parse_dotted_name<'a, I>(tokens: &mut Peekable<I>)
                                                               -> ParseResult<String>
    where I: Iterator<Item = &'a (Token, usize)>
{
    let mut name = parse_identifier(tokens)?;
    while accept(tokens, &Token::Dot) {
        name.push('.');
        name.push_str(&parse_identifier(tokens)?);
    }
    Ok(name)
}

/// Parses a comma-separated list of items until a closing token.
///
/// A trailing comma before the closing token is allowed and an immediately
/// encountered closing token produces an empty list. The closing token is
/// consumed.
///
/// Grammar (simplified): `list := (item ("," item)* ","?)?`
///
/// # Parameters
/// - `tokens`: Token iterator positioned at the first item or closing token.
/// - `parse_item`: Function used to parse each list element.
/// - `closing`: The token that terminates the list (e.g., `]` or `)`).
///
/// # Returns
/// A vector of parsed items.
pub(in crate::interpreter::parser) fn parse_comma_separated<'a, I, T>(
    tokens: &mut Peekable<I>,
    mut parse_item: impl FnMut(&mut Peekable<I>) -> ParseResult<T>,
    closing: &Token)
    -> ParseResult<Vec<T>>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut items = Vec::new();
    loop {
        if accept(tokens, closing) {
            return Ok(items);
        }
        items.push(parse_item(tokens)?);
        if !accept(tokens, &Token::Comma) {
            expect(tokens, closing)?;
            return Ok(items);
        }
    }
}

/// Parses assignment or loop targets: `a, *b, c.x`.
///
/// Targets are postfix expressions, so the list stops before `in` and `=`.
///
/// # Returns
/// The targets and the index of the `*` target, if any.
///
/// # Errors
/// A second `*` target is rejected.
pub(in crate::interpreter::parser) fn parse_target_list<'a, I>(tokens: &mut Peekable<I>)
                                                               -> ParseResult<(Vec<Expr>, Option<usize>)>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut targets = Vec::new();
    let mut catch_all = None;
    loop {
        let line = peek_line(tokens);
        if accept(tokens, &Token::Star) {
            if catch_all.is_some() {
                return Err(ParseError::Other { message: "Multiple catch-all targets".to_string(),
                                               line });
            }
            catch_all = Some(targets.len());
        }
        targets.push(parse_postfix_expression(tokens)?);
        let continues = peek_is(tokens, &Token::Comma)
                        && !matches!(peek_second(tokens), Some(Token::In | Token::Equals | Token::Colon));
        if !continues {
            accept(tokens, &Token::Comma);
            return Ok((targets, catch_all));
        }
        tokens.next();
    }
}

/// Parses the parameters of a `def` or `lambda` up to `closing`, which is
/// consumed.
///
/// # Parameters
/// - `tokens`: Token iterator positioned after `(` or `lambda`.
/// - `closing`: `)` for `def`, `:` for `lambda`.
/// - `parse_default`: Parser of default values.
///
/// # Errors
/// `InvalidArguments` with one of:
/// - "Duplicate arg 'x'"
/// - "Multiple tuple arg" for a second `*args`
/// - "Multiple dict arg" for a second `**kwargs`
/// - "Invalid positional arg" for a plain parameter after a defaulted one
/// - "Invalid arg" for anything after `**kwargs` or a plain parameter after
///   `*args`
pub(in crate::interpreter::parser) fn parse_parameters<'a, I>(
    tokens: &mut Peekable<I>,
    closing: &Token,
    parse_default: fn(&mut Peekable<I>) -> ParseResult<Expr>)
    -> ParseResult<Vec<Parameter>>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut params: Vec<Parameter> = Vec::new();
    let mut seen = HashSet::new();
    let mut has_default = false;
    let mut has_varargs = false;
    let mut has_kwargs = false;

    loop {
        if accept(tokens, closing) {
            return Ok(params);
        }
        let line = peek_line(tokens);
        let invalid = |details: &str| ParseError::InvalidArguments { details: details.to_string(),
                                                                     line };
        let kind = if accept(tokens, &Token::DoubleStar) {
            ParameterKind::KwArgs
        } else if accept(tokens, &Token::Star) {
            ParameterKind::VarArgs
        } else {
            ParameterKind::Plain
        };
        let name = parse_identifier(tokens)?;
        if !seen.insert(name.clone()) {
            return Err(invalid(&format!("Duplicate arg '{name}'")));
        }

        let mut default = None;
        match kind {
            ParameterKind::KwArgs if has_kwargs => return Err(invalid("Multiple dict arg")),
            ParameterKind::KwArgs => has_kwargs = true,
            ParameterKind::VarArgs if has_varargs => return Err(invalid("Multiple tuple arg")),
            ParameterKind::VarArgs if has_kwargs => return Err(invalid("Invalid arg")),
            ParameterKind::VarArgs => has_varargs = true,
            ParameterKind::Plain => {
                if has_varargs || has_kwargs {
                    return Err(invalid("Invalid arg"));
                }
                if accept(tokens, &Token::Equals) {
                    default = Some(parse_default(tokens)?);
                    has_default = true;
                } else if has_default {
                    return Err(invalid("Invalid positional arg"));
                }
            },
        }
        params.push(Parameter { name,
                                kind,
                                default });

        if !accept(tokens, &Token::Comma) {
            expect(tokens, closing)?;
            return Ok(params);
        }
    }
}
