use std::iter::Peekable;

use crate::{
    ast::{Expr, ExprKind},
    error::ParseError,
    interpreter::{
        lexer::Token,
        parser::{
            core::ParseResult,
            statement::{parse_compound_statement, parse_simple_line},
            utils::{expect, peek_line},
        },
    },
};

/// Parses a whole program.
///
/// A program of one statement is that statement; several statements form
/// an [`ExprKind::Block`]. Comments after the last statement have nothing
/// to attach to and are dropped.
///
/// # Errors
/// `UnexpectedEndOfInput` for a program without statements, plus any error
/// of the statements themselves.
pub fn parse_program<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let line = peek_line(tokens);
    let mut statements = parse_statements(tokens)?;
    if let Some((token, line)) = tokens.next() {
        return Err(match token {
            Token::Dedent | Token::Indent => ParseError::Indentation { line: *line },
            other => ParseError::UnexpectedTrailingTokens { token: format!("{other:?}"),
                                                            line:  *line, },
        });
    }
    match statements.len() {
        0 => Err(ParseError::UnexpectedEndOfInput { line: 0 }),
        1 => Ok(statements.remove(0)),
        _ => Ok(Expr::new(ExprKind::Block(statements), line)),
    }
}

/// Parses statements until the end of input or of the enclosing suite.
///
/// Comment lines are collected and attached to the statement after them.
///
/// Grammar: `statements := (comment* statement)* comment*`
///
/// # Returns
/// The statements, leaving the `Dedent` that ends a suite unconsumed.
///
/// # Errors
/// `Indentation` for an indented line that does not start a suite.
pub fn parse_statements<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Vec<Expr>>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut statements = Vec::new();
    loop {
        let comments = parse_comment_lines(tokens);
        match tokens.peek() {
            None | Some((Token::Dedent, _)) => break,
            Some((Token::Indent, line)) => return Err(ParseError::Indentation { line: *line }),
            Some((Token::NewLine, _)) => {
                tokens.next();
                continue;
            },
            _ => {},
        }
        let mut statement = parse_statement(tokens)?;
        if let Some(comments) = comments {
            attach_comment(&mut statement, comments, true);
        }
        statements.push(statement);
    }
    Ok(statements)
}

/// Parses one statement: a compound statement or a line of simple ones.
pub fn parse_statement<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    match parse_compound_statement(tokens)? {
        Some(statement) => Ok(statement),
        None => parse_simple_line(tokens),
    }
}

/// Parses the body of a compound statement after its `:`.
///
/// The body is either the rest of the line, `if x: y = 1`, or an indented
/// block on the following lines, which always yields an
/// [`ExprKind::Block`]. A comment after the `:` attaches to the first
/// statement of the block.
///
/// # Errors
/// `Indentation` when the next line is not indented.
pub fn parse_suite<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let header_comment = match tokens.peek() {
        Some((Token::Comment(text), _)) => {
            let text = text.clone();
            tokens.next();
            Some(text)
        },
        _ => None,
    };
    if !matches!(tokens.peek(), Some((Token::NewLine, _))) {
        let statement = parse_simple_line(tokens)?;
        // A commented body has to move to its own line to print back.
        if statement.comment.is_some() {
            let line = statement.line;
            return Ok(Expr::new(ExprKind::Block(vec![statement]), line));
        }
        return Ok(statement);
    }

    let line = expect(tokens, &Token::NewLine)?;
    match tokens.next() {
        Some((Token::Indent, _)) => {},
        Some((_, line)) => return Err(ParseError::Indentation { line: *line }),
        None => return Err(ParseError::UnexpectedEndOfInput { line: 0 }),
    }
    let mut statements = parse_statements(tokens)?;
    match tokens.next() {
        Some((Token::Dedent, _)) | None => {},
        Some((token, line)) => {
            return Err(ParseError::UnexpectedToken { token: format!("{token:?}"),
                                                     line:  *line, });
        },
    }
    let Some(first) = statements.first_mut() else {
        return Err(ParseError::Indentation { line });
    };
    if let Some(comment) = header_comment {
        attach_comment(first, comment, true);
    }
    let line = first.line;
    Ok(Expr::new(ExprKind::Block(statements), line))
}

/// Consumes `# comment` lines, joining their text.
///
/// The text of several lines is joined with `\n#`, so it renders back as
/// one comment line per source line.
fn parse_comment_lines<'a, I>(tokens: &mut Peekable<I>) -> Option<String>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut lines: Vec<String> = Vec::new();
    while let Some((Token::Comment(text), _)) = tokens.peek() {
        lines.push(text.clone());
        tokens.next();
        if matches!(tokens.peek(), Some((Token::NewLine, _))) {
            tokens.next();
        }
    }
    (!lines.is_empty()).then(|| lines.join("\n#"))
}

/// Attaches `comment` to `statement`, before or after any comment it
/// already has.
pub(in crate::interpreter::parser) fn attach_comment(statement: &mut Expr, comment: String, leading: bool) {
    statement.comment = Some(match statement.comment.take() {
        None => comment,
        Some(existing) if leading => format!("{comment}\n#{existing}"),
        Some(existing) => format!("{existing}\n#{comment}"),
    });
}

/// Consumes the clause keyword `keyword` when it is the next token,
/// skipping comment lines before it.
///
/// Comment lines are only consumed when the clause is found; otherwise
/// they stay for the next statement.
pub fn next_clause<'a, I>(tokens: &mut Peekable<I>, keyword: &Token) -> bool
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut ahead = tokens.clone();
    loop {
        match ahead.peek() {
            Some((Token::Comment(_) | Token::NewLine, _)) => {
                ahead.next();
            },
            Some((token, _)) if token == keyword => {
                ahead.next();
                *tokens = ahead;
                return true;
            },
            _ => return false,
        }
    }
}
