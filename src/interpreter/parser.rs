/// Core parsing entry points.
///
/// Declares the parse result type and the expression entry point handling
/// lambdas and both ternary spellings.
pub mod core;

/// Unary operators, postfix components and primary expressions.
///
/// Handles prefix `-`, `+` and `not`, identifiers with their static paths,
/// calls, subscripts and every literal.
pub mod unary;

/// Binary operator parsing.
///
/// One function per priority level, from `or` down to `**`, including the
/// unit juxtaposition levels.
pub mod binary;

/// Unit expressions such as `mm`, `m/s^2` or `kg*mm/(s^2)`.
pub mod unit;

/// List, tuple, set and dict literals and comprehensions.
pub mod collection;

/// Statement sequences and indented suites.
///
/// Parses whole programs, the suites of compound statements and attaches
/// comments to the statements that follow them.
pub mod block;

/// Shared parsing helpers.
///
/// Token expectations, lookahead, target lists and parameter lists.
pub mod utils;

/// Statement parsing.
///
/// Simple statements, assignments and the compound `if`, `while`, `for`,
/// `try` and `def` statements.
pub mod statement;

use crate::{
    ast::Expr,
    error::ParseError,
    interpreter::{
        lexer::{Token, tokenize},
        parser::core::ParseResult,
    },
};

/// Parses source text into an expression tree.
///
/// A single statement is returned as is; several statements form a
/// [`ExprKind::Block`](crate::ast::ExprKind::Block). The parser keeps no
/// state between calls, so it may be re-entered while another parse is
/// being evaluated.
///
/// # Errors
/// Any lexical or syntax error, located at its line.
///
/// # Example
/// ```
/// use cadexpr::parse;
///
/// let expr = parse("Box.Length * 2 + 10 mm").unwrap();
/// assert_eq!(expr.to_string(), "Box.Length * 2 + 10 mm");
///
/// assert!(parse("1 +").is_err());
/// ```
pub fn parse(text: &str) -> ParseResult<Expr> {
    let tokens = tokenize(text)?;
    check_nesting(&tokens)?;
    let mut iter = tokens.iter().peekable();
    block::parse_program(&mut iter).map_err(|e| locate_end(e, &tokens))
}

/// Parses a unit-only expression such as `kg*m/s^2`.
///
/// # Example
/// ```
/// use cadexpr::{ast::ExprKind, interpreter::parser::parse_unit, quantity::{Quantity, Unit}};
///
/// let unit = parse_unit("m/s").unwrap();
/// let ExprKind::Unit { quantity, text } = unit.kind else { panic!() };
/// assert_eq!(quantity, Quantity::new(1000.0, Unit::VELOCITY));
/// assert_eq!(text, "m/s");
///
/// assert!(parse_unit("m + 1").is_err());
/// ```
pub fn parse_unit(text: &str) -> ParseResult<Expr> {
    let tokens = tokenize(text)?;
    check_nesting(&tokens)?;
    let mut iter = tokens.iter().peekable();
    let unit = unit::parse_unit_expression(&mut iter).map_err(|e| locate_end(e, &tokens))?;
    while let Some((Token::NewLine, _)) = iter.peek() {
        iter.next();
    }
    match iter.next() {
        None => Ok(unit),
        Some((token, line)) => Err(ParseError::UnexpectedTrailingTokens { token: format!("{token:?}"),
                                                                          line:  *line, }),
    }
}

/// Deepest nesting accepted by [`parse`].
pub const MAX_NESTING: usize = 100;

/// Rejects token streams the recursive-descent parser would nest deeper
/// than [`MAX_NESTING`].
///
/// Open brackets, indented suites, runs of prefix operators and chained
/// conditionals or lambdas each add a level. A comma or the end of a
/// statement closes the conditionals of the current bracket.
fn check_nesting(tokens: &[(Token, usize)]) -> ParseResult<()> {
    // Conditionals and lambdas open at each bracket level.
    let mut chained = vec![0_usize];
    let mut indent = 0_usize;
    let mut prefix = 0_usize;
    for (token, line) in tokens {
        match token {
            Token::LParen | Token::LBracket | Token::LBrace => chained.push(0),
            Token::RParen | Token::RBracket | Token::RBrace if chained.len() > 1 => {
                chained.pop();
            },
            Token::Indent => indent += 1,
            Token::Dedent => indent = indent.saturating_sub(1),
            Token::Question | Token::Else | Token::Lambda => {
                if let Some(open) = chained.last_mut() {
                    *open += 1;
                }
            },
            Token::Comma | Token::Semicolon | Token::NewLine => {
                if let Some(open) = chained.last_mut() {
                    *open = 0;
                }
            },
            _ => {},
        }
        prefix = if matches!(token, Token::Minus | Token::Plus | Token::Not) {
            prefix + 1
        } else {
            0
        };
        let depth = chained.len() + chained.iter().sum::<usize>() + indent + prefix;
        if depth > MAX_NESTING {
            return Err(ParseError::TooDeeplyNested { line: *line });
        }
    }
    Ok(())
}

/// Points end-of-input errors at the last line of the source.
fn locate_end(error: ParseError, tokens: &[(Token, usize)]) -> ParseError {
    match error {
        ParseError::UnexpectedEndOfInput { line: 0 } => {
            ParseError::UnexpectedEndOfInput { line: tokens.last().map_or(1, |(_, l)| *l) }
        },
        other => other,
    }
}
