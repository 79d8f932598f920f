use std::iter::Peekable;

use crate::{
    ast::{BinaryOperator, ExceptHandler, Expr, ExprKind, ImportItem, Item, JumpKind},
    error::ParseError,
    interpreter::{
        lexer::Token,
        parser::{
            block::{attach_comment, next_clause, parse_suite},
            core::{ParseResult, parse_expression, parse_expression_list},
            unary::parse_postfix_expression,
            utils::{
                accept, at_statement_end, expect, parse_dotted_name, parse_identifier,
                parse_parameters, parse_target_list, peek_line,
            },
        },
    },
};

/// Parses a compound statement if one starts at the current token.
///
/// Compound statements are `if`, `while`, `for`, `try` and `def`; each
/// owns one or more suites.
///
/// # Returns
/// - `Ok(Some(statement))` if a compound statement was parsed,
/// - `Ok(None)` without consuming input otherwise.
pub fn parse_compound_statement<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Option<Expr>>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let Some((token, line)) = tokens.peek() else {
        return Ok(None);
    };
    let line = *line;
    let kind = match token {
        Token::If => {
            tokens.next();
            parse_if_statement(tokens)?
        },
        Token::While => {
            tokens.next();
            parse_while_statement(tokens)?
        },
        Token::For => {
            tokens.next();
            parse_for_statement(tokens)?
        },
        Token::Try => {
            tokens.next();
            parse_try_statement(tokens, line)?
        },
        Token::Def => {
            tokens.next();
            parse_function_definition(tokens)?
        },
        _ => return Ok(None),
    };
    Ok(Some(Expr::new(kind, line)))
}

/// Parses `if cond: body (elif cond: body)* (else: body)?` after `if`.
fn parse_if_statement<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<ExprKind>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut branches = Vec::new();
    loop {
        let condition = parse_expression(tokens)?;
        expect(tokens, &Token::Colon)?;
        branches.push((condition, parse_suite(tokens)?));
        if !next_clause(tokens, &Token::Elif) {
            break;
        }
    }
    let else_body = parse_else_clause(tokens)?;
    Ok(ExprKind::If { branches, else_body })
}

/// Parses `while cond: body (else: body)?` after `while`.
fn parse_while_statement<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<ExprKind>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let condition = parse_expression(tokens)?;
    expect(tokens, &Token::Colon)?;
    let body = parse_suite(tokens)?;
    Ok(ExprKind::While { condition: Box::new(condition),
                         body:      Box::new(body),
                         else_body: parse_else_clause(tokens)?, })
}

/// Parses `for targets in iterable: body (else: body)?` after `for`.
///
/// The loop targets follow the same rules as assignment targets, so
/// `for a, *rest in rows:` unpacks every row.
fn parse_for_statement<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<ExprKind>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let (targets, catch_all) = parse_target_list(tokens)?;
    expect(tokens, &Token::In)?;
    let iter = parse_expression_list(tokens)?;
    expect(tokens, &Token::Colon)?;
    let body = parse_suite(tokens)?;
    Ok(ExprKind::For { targets,
                       catch_all,
                       iter: Box::new(iter),
                       body: Box::new(body),
                       else_body: parse_else_clause(tokens)? })
}

fn parse_else_clause<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Option<Box<Expr>>>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    if !next_clause(tokens, &Token::Else) {
        return Ok(None);
    }
    expect(tokens, &Token::Colon)?;
    Ok(Some(Box::new(parse_suite(tokens)?)))
}

/// Parses a `try` statement after `try`.
///
/// Grammar:
/// ```text
///     try := "try" ":" suite
///            ("except" [expression ["as" name]] ":" suite)*
///            ["else" ":" suite]
///            ["finally" ":" suite]
/// ```
///
/// # Errors
/// `Other` with one of:
/// - "Invalid try statement" when neither a handler nor `finally` follows,
///   or when an `else` comes without handlers or clauses are out of order
/// - "Multiple 'else' in try statement"
/// - "Multiple 'finally' in try statement"
fn parse_try_statement<'a, I>(tokens: &mut Peekable<I>, line: usize) -> ParseResult<ExprKind>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let invalid = |message: &str, line: usize| ParseError::Other { message: message.to_string(),
                                                                    line };
    expect(tokens, &Token::Colon)?;
    let body = parse_suite(tokens)?;

    let mut handlers = Vec::new();
    let mut else_body = None;
    let mut finally_body = None;
    loop {
        let clause_line = peek_line(tokens);
        if next_clause(tokens, &Token::Except) {
            if else_body.is_some() || finally_body.is_some() {
                return Err(invalid("Invalid try statement", clause_line));
            }
            handlers.push(parse_except_clause(tokens)?);
        } else if next_clause(tokens, &Token::Else) {
            if else_body.is_some() {
                return Err(invalid("Multiple 'else' in try statement", clause_line));
            }
            if handlers.is_empty() || finally_body.is_some() {
                return Err(invalid("Invalid try statement", clause_line));
            }
            expect(tokens, &Token::Colon)?;
            else_body = Some(Box::new(parse_suite(tokens)?));
        } else if next_clause(tokens, &Token::Finally) {
            if finally_body.is_some() {
                return Err(invalid("Multiple 'finally' in try statement", clause_line));
            }
            expect(tokens, &Token::Colon)?;
            finally_body = Some(Box::new(parse_suite(tokens)?));
        } else {
            break;
        }
    }

    if handlers.is_empty() && finally_body.is_none() {
        return Err(invalid("Invalid try statement", line));
    }
    Ok(ExprKind::Try { body: Box::new(body),
                       handlers,
                       else_body,
                       finally_body })
}

fn parse_except_clause<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<ExceptHandler>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let types = if matches!(tokens.peek(), Some((Token::Colon, _))) {
        None
    } else {
        Some(parse_expression(tokens)?)
    };
    let name = if accept(tokens, &Token::As) {
        Some(parse_identifier(tokens)?)
    } else {
        None
    };
    expect(tokens, &Token::Colon)?;
    Ok(ExceptHandler { types,
                       name,
                       body: parse_suite(tokens)? })
}

/// Parses `def name(params): body` after `def`.
fn parse_function_definition<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<ExprKind>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let name = parse_identifier(tokens)?;
    expect(tokens, &Token::LParen)?;
    let params = parse_parameters(tokens, &Token::RParen, parse_expression)?;
    expect(tokens, &Token::Colon)?;
    let body = parse_suite(tokens)?;
    Ok(ExprKind::FunctionDef { name,
                               params,
                               body: Box::new(body) })
}

/// Parses a line of simple statements separated by `;`, with an optional
/// trailing comment, through the end of the line.
///
/// A single statement is returned as is; several form an
/// [`ExprKind::Simple`]. The trailing comment attaches to the result.
///
/// Grammar: `simple_line := simple (";" simple)* [";"] [comment] NEWLINE`
pub fn parse_simple_line<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let line = peek_line(tokens);
    let mut statements = vec![parse_simple_statement(tokens)?];
    while accept(tokens, &Token::Semicolon) {
        if at_statement_end(tokens) {
            break;
        }
        statements.push(parse_simple_statement(tokens)?);
    }

    let mut statement = if statements.len() == 1 {
        statements.remove(0)
    } else {
        Expr::new(ExprKind::Simple(statements), line)
    };
    if let Some((Token::Comment(text), _)) = tokens.peek() {
        let text = text.clone();
        tokens.next();
        attach_comment(&mut statement, text, false);
    }
    match tokens.peek() {
        Some((Token::NewLine, _)) => {
            tokens.next();
        },
        None | Some((Token::Dedent, _)) => {},
        Some((token, line)) => {
            return Err(ParseError::UnexpectedTrailingTokens { token: format!("{token:?}"),
                                                              line:  *line, });
        },
    }
    Ok(statement)
}

/// Parses one simple statement.
///
/// Supported forms:
/// - `pass`, `break`, `continue`
/// - `return [values]`, `raise [value]`
/// - `del targets`
/// - `global names`, `nonlocal names`
/// - `import modules`, `from module import names`
/// - assignments and expression statements
pub fn parse_simple_statement<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let Some((token, line)) = tokens.peek() else {
        return Err(ParseError::UnexpectedEndOfInput { line: 0 });
    };
    let line = *line;
    let jump = |kind| ExprKind::Jump { kind, value: None };

    let kind = match token {
        Token::Pass => {
            tokens.next();
            ExprKind::Pass
        },
        Token::Break => {
            tokens.next();
            jump(JumpKind::Break)
        },
        Token::Continue => {
            tokens.next();
            jump(JumpKind::Continue)
        },
        Token::Return | Token::Raise => {
            let kind = if matches!(token, Token::Return) {
                JumpKind::Return
            } else {
                JumpKind::Raise
            };
            tokens.next();
            let value = if at_statement_end(tokens) {
                None
            } else {
                Some(Box::new(parse_expression_list(tokens)?))
            };
            ExprKind::Jump { kind, value }
        },
        Token::Del => {
            tokens.next();
            let mut targets = vec![parse_postfix_expression(tokens)?];
            while accept(tokens, &Token::Comma) {
                targets.push(parse_postfix_expression(tokens)?);
            }
            ExprKind::Del(targets)
        },
        Token::Global | Token::Nonlocal => {
            let global = matches!(token, Token::Global);
            tokens.next();
            let mut names = vec![parse_identifier(tokens)?];
            while accept(tokens, &Token::Comma) {
                names.push(parse_identifier(tokens)?);
            }
            ExprKind::Scope { global, names }
        },
        Token::Import => {
            tokens.next();
            let mut items = vec![parse_import_item(tokens, true)?];
            while accept(tokens, &Token::Comma) {
                items.push(parse_import_item(tokens, true)?);
            }
            ExprKind::Import(items)
        },
        Token::From => {
            tokens.next();
            let module = parse_dotted_name(tokens)?;
            expect(tokens, &Token::Import)?;
            ExprKind::From { module,
                             names: parse_import_names(tokens)? }
        },
        _ => return parse_expression_statement(tokens),
    };
    Ok(Expr::new(kind, line))
}

fn parse_import_item<'a, I>(tokens: &mut Peekable<I>, dotted: bool) -> ParseResult<ImportItem>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let name = if dotted {
        parse_dotted_name(tokens)?
    } else {
        parse_identifier(tokens)?
    };
    let alias = if accept(tokens, &Token::As) {
        Some(parse_identifier(tokens)?)
    } else {
        None
    };
    Ok(ImportItem { name, alias })
}

/// Parses the names of `from module import ...`: `*`, a list, or a
/// parenthesised list.
fn parse_import_names<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Vec<ImportItem>>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    if accept(tokens, &Token::Star) {
        return Ok(vec![ImportItem { name:  "*".to_string(),
                                    alias: None, }]);
    }
    let parenthesised = accept(tokens, &Token::LParen);
    let mut names = vec![parse_import_item(tokens, false)?];
    while accept(tokens, &Token::Comma) {
        if parenthesised && matches!(tokens.peek(), Some((Token::RParen, _))) {
            break;
        }
        names.push(parse_import_item(tokens, false)?);
    }
    if parenthesised {
        expect(tokens, &Token::RParen)?;
    }
    Ok(names)
}

/// Parses an expression statement, which may turn out to be an
/// assignment.
///
/// The statement starts as an expression list. A following `=` turns it
/// into the targets of an assignment, `a, *b = ...`; chained assignments
/// nest, so `a = b = 1` assigns `b = 1` first and `a` from its value. An
/// augmented operator such as `+=` needs exactly one target.
///
/// # Errors
/// - `Other` for targets that cannot be assigned to, or several `*`
///   targets.
/// - `Other` for augmented assignment to several targets.
fn parse_expression_statement<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let line = peek_line(tokens);
    let first = parse_expression_list(tokens)?;

    if let Some(op) = augmented_operator(tokens.peek().map(|(t, _)| t)) {
        let op_line = peek_line(tokens);
        tokens.next();
        let (targets, catch_all) = into_targets(first)?;
        if targets.len() != 1
           || catch_all.is_some()
           || matches!(targets[0].kind, ExprKind::Tuple(_) | ExprKind::List(_))
        {
            return Err(ParseError::Other { message: "Invalid augmented assignment target".to_string(),
                                           line:    op_line, });
        }
        let value = parse_expression_list(tokens)?;
        return Ok(Expr::new(ExprKind::Assignment { targets,
                                                   catch_all,
                                                   op: Some(op),
                                                   values: vec![value] },
                            line));
    }

    if !matches!(tokens.peek(), Some((Token::Equals, _))) {
        return Ok(first);
    }
    parse_assignment(tokens, first, line)
}

/// Parses the `= values` part of an assignment to `lhs`.
fn parse_assignment<'a, I>(tokens: &mut Peekable<I>, lhs: Expr, line: usize) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    expect(tokens, &Token::Equals)?;
    let (targets, catch_all) = into_targets(lhs)?;
    let value_line = peek_line(tokens);
    let rhs = parse_expression_list(tokens)?;
    let rhs = if matches!(tokens.peek(), Some((Token::Equals, _))) {
        parse_assignment(tokens, rhs, value_line)?
    } else {
        rhs
    };

    let values = match rhs.kind {
        ExprKind::Tuple(items)
            if items.len() > 1 && rhs.components.is_empty() && items.iter().all(|i| !i.splat) =>
        {
            items.into_iter().map(|item| item.expr).collect()
        },
        kind => vec![Expr { kind, ..rhs }],
    };
    Ok(Expr::new(ExprKind::Assignment { targets,
                                        catch_all,
                                        op: None,
                                        values },
                 line))
}

/// Splits the left side of an assignment into its targets.
///
/// A tuple spreads into several targets; a `*` item marks the catch-all
/// target.
fn into_targets(lhs: Expr) -> ParseResult<(Vec<Expr>, Option<usize>)> {
    let line = lhs.line;
    let items = match lhs.kind {
        ExprKind::Tuple(items) if lhs.components.is_empty() => items,
        kind => vec![Item { expr:  Expr { kind, ..lhs },
                            splat: false, }],
    };

    let mut catch_all = None;
    let mut targets = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if item.splat {
            if catch_all.is_some() {
                return Err(ParseError::Other { message: "Multiple catch-all targets".to_string(),
                                               line });
            }
            catch_all = Some(index);
        }
        if !is_assignable(&item.expr) {
            return Err(ParseError::Other { message: format!("Cannot assign to '{}'", item.expr),
                                           line });
        }
        targets.push(item.expr);
    }
    Ok((targets, catch_all))
}

fn is_assignable(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Variable(_) => true,
        ExprKind::Tuple(items) | ExprKind::List(items) if expr.components.is_empty() => {
            items.iter().all(|item| is_assignable(&item.expr))
        },
        _ => !expr.components.is_empty(),
    }
}

fn augmented_operator(token: Option<&Token>) -> Option<BinaryOperator> {
    Some(match token? {
        Token::PlusAssign => BinaryOperator::Add,
        Token::MinusAssign => BinaryOperator::Sub,
        Token::MulAssign => BinaryOperator::Mul,
        Token::DivAssign => BinaryOperator::Div,
        Token::FloorDivAssign => BinaryOperator::FloorDiv,
        Token::ModAssign => BinaryOperator::Mod,
        Token::PowAssign => BinaryOperator::Pow,
        Token::CaretAssign => BinaryOperator::PowCaret,
        _ => return None,
    })
}
