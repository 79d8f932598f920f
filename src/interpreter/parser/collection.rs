use std::iter::Peekable;

use crate::{
    ast::{ComprehensionClause, ComprehensionKind, DictEntry, Expr, ExprKind, IDictEntry, Item},
    error::ParseError,
    interpreter::{
        lexer::Token,
        parser::{
            binary::parse_logical_or,
            core::{ParseResult, parse_expression, parse_list_item},
            utils::{
                accept, expect, parse_comma_separated, parse_identifier, parse_target_list,
                peek_line, peek_second, peek_token,
            },
        },
    },
};

/// Parses `( ... )`: grouping, or a tuple when a comma appears.
///
/// - `()` is the empty tuple,
/// - `(x)` is `x` itself,
/// - `(x,)` and `(x, y)` are tuples.
///
/// # Parameters
/// - `tokens`: Token iterator positioned at `(`.
///
/// # Returns
/// The inner expression or an [`ExprKind::Tuple`].
pub fn parse_parenthesized<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let line = expect(tokens, &Token::LParen)?;
    if accept(tokens, &Token::RParen) {
        return Ok(Expr::new(ExprKind::Tuple(Vec::new()), line));
    }

    let first = parse_list_item(tokens)?;
    if !first.splat && accept(tokens, &Token::RParen) {
        return Ok(first.expr);
    }
    let items = parse_rest(tokens, first, &Token::RParen)?;
    Ok(Expr::new(ExprKind::Tuple(items), line))
}

/// Parses `[ ... ]`: a list display or a list comprehension.
///
/// Grammar:
/// ```text
///     list := "[" (item ("," item)* ","?)? "]"
///           | "[" expression comprehension "]"
/// ```
pub fn parse_list_display<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let line = expect(tokens, &Token::LBracket)?;
    if accept(tokens, &Token::RBracket) {
        return Ok(Expr::new(ExprKind::List(Vec::new()), line));
    }

    let first = parse_list_item(tokens)?;
    if !first.splat && matches!(tokens.peek(), Some((Token::For, _))) {
        let clauses = parse_comprehension_clauses(tokens)?;
        expect(tokens, &Token::RBracket)?;
        return Ok(comprehension(ComprehensionKind::List, first.expr, None, clauses, line));
    }
    let items = parse_rest(tokens, first, &Token::RBracket)?;
    Ok(Expr::new(ExprKind::List(items), line))
}

/// Parses `{ ... }`: a dict, set, or `{name=value}` display, or a dict or
/// set comprehension.
///
/// `{}` is an empty dict. The form is decided by the first entry: `name =`
/// starts the named form, `key:` or `**` a dict, anything else a set.
pub fn parse_brace_display<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let line = expect(tokens, &Token::LBrace)?;
    if accept(tokens, &Token::RBrace) {
        return Ok(Expr::new(ExprKind::Dict(Vec::new()), line));
    }

    match peek_token(tokens) {
        Some(Token::Identifier(_)) if peek_second(tokens) == Some(&Token::Equals) => {
            let entries = parse_comma_separated(tokens, parse_idict_entry, &Token::RBrace)?;
            return Ok(Expr::new(ExprKind::IDict(entries), line));
        },
        Some(Token::DoubleStar) => {
            let entries = parse_comma_separated(tokens, parse_dict_entry, &Token::RBrace)?;
            return Ok(Expr::new(ExprKind::Dict(entries), line));
        },
        _ => {},
    }

    let first = parse_list_item(tokens)?;
    if !first.splat && accept(tokens, &Token::Colon) {
        let value = parse_expression(tokens)?;
        if matches!(tokens.peek(), Some((Token::For, _))) {
            let clauses = parse_comprehension_clauses(tokens)?;
            expect(tokens, &Token::RBrace)?;
            return Ok(comprehension(ComprehensionKind::Dict,
                                    first.expr,
                                    Some(value),
                                    clauses,
                                    line));
        }
        let mut entries = vec![DictEntry { key: Some(first.expr),
                                           value }];
        if accept(tokens, &Token::Comma) {
            entries.extend(parse_comma_separated(tokens, parse_dict_entry, &Token::RBrace)?);
        } else {
            expect(tokens, &Token::RBrace)?;
        }
        return Ok(Expr::new(ExprKind::Dict(entries), line));
    }

    if !first.splat && matches!(tokens.peek(), Some((Token::For, _))) {
        let clauses = parse_comprehension_clauses(tokens)?;
        expect(tokens, &Token::RBrace)?;
        return Ok(comprehension(ComprehensionKind::Set, first.expr, None, clauses, line));
    }
    let items = parse_rest(tokens, first, &Token::RBrace)?;
    Ok(Expr::new(ExprKind::Set(items), line))
}

/// Parses the items after the first one of a display, through `closing`.
fn parse_rest<'a, I>(tokens: &mut Peekable<I>, first: Item, closing: &Token) -> ParseResult<Vec<Item>>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut items = vec![first];
    if accept(tokens, &Token::Comma) {
        items.extend(parse_comma_separated(tokens, parse_list_item, closing)?);
    } else {
        expect(tokens, closing)?;
    }
    Ok(items)
}

fn parse_dict_entry<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<DictEntry>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    if accept(tokens, &Token::DoubleStar) {
        return Ok(DictEntry { key:   None,
                              value: parse_expression(tokens)?, });
    }
    let key = parse_expression(tokens)?;
    expect(tokens, &Token::Colon)?;
    Ok(DictEntry { key:   Some(key),
                   value: parse_expression(tokens)?, })
}

fn parse_idict_entry<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<IDictEntry>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    if accept(tokens, &Token::DoubleStar) {
        return Ok(IDictEntry { name:  None,
                               value: parse_expression(tokens)?, });
    }
    let name = parse_identifier(tokens)?;
    expect(tokens, &Token::Equals)?;
    Ok(IDictEntry { name:  Some(name),
                    value: parse_expression(tokens)?, })
}

/// Parses the `for` and `if` clauses of a comprehension.
///
/// Grammar:
/// ```text
///     comprehension := ("for" targets "in" logical_or) ("for" ... | "if" logical_or)*
/// ```
///
/// # Errors
/// `UnexpectedToken` when the clauses do not start with `for`.
pub fn parse_comprehension_clauses<'a, I>(tokens: &mut Peekable<I>)
                                          -> ParseResult<Vec<ComprehensionClause>>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut clauses = Vec::new();
    loop {
        match tokens.peek() {
            Some((Token::For, _)) => {
                tokens.next();
                let (targets, catch_all) = parse_target_list(tokens)?;
                expect(tokens, &Token::In)?;
                let iter = parse_logical_or(tokens)?;
                clauses.push(ComprehensionClause::For { targets,
                                                        catch_all,
                                                        iter });
            },
            Some((Token::If, _)) if !clauses.is_empty() => {
                tokens.next();
                clauses.push(ComprehensionClause::If(parse_logical_or(tokens)?));
            },
            _ => break,
        }
    }
    if clauses.is_empty() {
        let line = peek_line(tokens);
        return Err(ParseError::UnexpectedToken { token: "Expected 'for' in comprehension".to_string(),
                                                 line });
    }
    Ok(clauses)
}

fn comprehension(kind: ComprehensionKind,
                 element: Expr,
                 value: Option<Expr>,
                 clauses: Vec<ComprehensionClause>,
                 line: usize)
                 -> Expr {
    Expr::new(ExprKind::Comprehension { kind,
                                        element: Box::new(element),
                                        value: value.map(Box::new),
                                        clauses },
              line)
}
