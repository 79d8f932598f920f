use std::iter::Peekable;

use crate::{
    ast::{
        Argument, ArgumentKind, Component, Constant, Expr, ExprKind, QuoteStyle, StringLiteral,
        UnaryOperator,
    },
    error::ParseError,
    identifier::{ObjectIdentifier, ObjectName, PathComponent},
    interpreter::{
        evaluator::function::core::FunctionKind,
        lexer::Token,
        parser::{
            binary::parse_unit_add,
            collection::{parse_brace_display, parse_list_display, parse_parenthesized},
            core::{ParseResult, parse_expression, parse_expression_list},
            unit::starts_unit,
            utils::{
                accept, expect, parse_comma_separated, parse_identifier, peek_line, peek_second,
                peek_token,
            },
        },
    },
    quantity::Quantity,
};

/// Parses a unary expression.
///
/// Supports prefix operators:
/// - `-`   (negation)
/// - `+`   (identity)
/// - `not` (logical not)
///
/// All three bind at the same level, tighter than `*` and looser than
/// unit juxtaposition, so `-10 mm` negates the quantity and `not a == b`
/// compares `not a` with `b`. Unary operators are right-associative.
///
/// Grammar:
/// ```text
///     unary := ("-" | "+" | "not") unary
///            | unit_add
/// ```
/// # Parameters
/// - `tokens`: Token iterator with lookahead.
///
/// # Returns
/// An [`ExprKind::UnaryOp`] or the operand expression.
pub(crate) fn parse_unary<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let (op, line) = match tokens.peek() {
        Some((Token::Minus, line)) => (UnaryOperator::Neg, *line),
        Some((Token::Plus, line)) => (UnaryOperator::Pos, *line),
        Some((Token::Not, line)) => (UnaryOperator::Not, *line),
        _ => return parse_unit_add(tokens),
    };
    tokens.next();
    let operand = parse_unary(tokens)?;
    Ok(Expr::new(ExprKind::UnaryOp { op,
                                     operand: Box::new(operand) },
                 line))
}

/// Parses a primary expression followed by any number of accessors and
/// calls.
///
/// Grammar:
/// ```text
///     postfix := primary ("." name | "[" subscript "]" | "(" arguments ")")*
/// ```
pub(crate) fn parse_postfix_expression<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let primary = parse_primary(tokens)?;
    parse_postfix(tokens, primary)
}

/// Parses a primary (atomic) expression.
///
/// Primary expressions form the base of the expression grammar and include:
/// - numeric, string and constant literals
/// - identifiers, with the static part of their path
/// - document and label qualified identifiers
/// - cell references and ranges
/// - built-in function calls
/// - parenthesized expressions and tuples
/// - list, set and dict displays and comprehensions
///
/// This function does not handle unary operators. Accessors that cannot be
/// folded into an identifier are left to [`parse_postfix`].
///
/// Grammar (simplified):
/// ```text
///     primary := literal
///              | [document "#"] (name | label) path
///              | "." name path
///              | cell | range
///              | function "(" arguments ")"
///              | "(" expression_list? ")"
///              | "[" elements "]"
///              | "{" elements "}"
/// ```
/// # Parameters
/// - `tokens`: Token iterator positioned at the start of a primary expression.
///
/// # Returns
/// The parsed primary [`Expr`] or a `ParseError` on failure.
pub(crate) fn parse_primary<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let (tok, line) = match peek_token(tokens) {
        Some(tok) => (tok, peek_line(tokens)),
        None => return Err(ParseError::UnexpectedEndOfInput { line: 0 }),
    };

    match tok {
        Token::LParen => return parse_parenthesized(tokens),
        Token::LBracket => return parse_list_display(tokens),
        Token::LBrace => return parse_brace_display(tokens),
        _ => {},
    }

    tokens.next();
    let expr = match tok {
        Token::Real(n) => Expr::number(Quantity::dimensionless(*n), line),
        Token::Integer(n) => Expr::new(ExprKind::Integer(*n), line),
        Token::Str(literal) => Expr::new(ExprKind::String(literal.clone()), line),
        Token::TrueLiteral => Expr::new(ExprKind::Constant(Constant::True), line),
        Token::FalseLiteral => Expr::new(ExprKind::Constant(Constant::False), line),
        Token::NoneLiteral => Expr::new(ExprKind::Constant(Constant::None), line),
        Token::Range((begin, end)) => Expr::new(ExprKind::Range { begin: begin.clone(),
                                                                  end:   end.clone(), },
                                                line),
        Token::CellRef(cell) => parse_identifier_path(tokens, ObjectIdentifier::simple(cell), line),
        Token::Label(label) => {
            if matches!(tokens.peek(), Some((Token::Dot, _))) {
                let id = ObjectIdentifier::qualified(None, ObjectName::label(label), Vec::new());
                parse_identifier_path(tokens, id, line)
            } else {
                Expr::new(ExprKind::String(StringLiteral { text:   label.clone(),
                                                           raw:    label.clone(),
                                                           quote:  QuoteStyle::Label,
                                                           prefix: None, }),
                          line)
            }
        },
        Token::DocumentName(document) => {
            let object = match tokens.next() {
                Some((Token::Identifier(name), _)) => ObjectName::internal(name),
                Some((Token::Label(label), _)) => ObjectName::label(label),
                Some((tok, line)) => {
                    return Err(ParseError::UnexpectedToken { token: format!("Expected object name, found {tok:?}"),
                                                             line:  *line, });
                },
                None => return Err(ParseError::UnexpectedEndOfInput { line: 0 }),
            };
            let id = ObjectIdentifier::qualified(Some(document.as_str()), object, Vec::new());
            parse_identifier_path(tokens, id, line)
        },
        Token::Dot => {
            let name = parse_identifier(tokens)?;
            parse_identifier_path(tokens, ObjectIdentifier::local(name), line)
        },
        Token::Identifier(name) => {
            match FunctionKind::from_name(name) {
                Some(kind) if accept(tokens, &Token::LParen) => {
                    let args = parse_arguments(tokens)?;
                    Expr::new(ExprKind::Function { kind, args }, line)
                },
                _ => parse_identifier_path(tokens, ObjectIdentifier::simple(name), line),
            }
        },
        tok => {
            return Err(ParseError::UnexpectedToken { token: format!("{tok:?}"),
                                                     line });
        },
    };
    Ok(expr)
}

/// Extends `id` with the accessors that are known while parsing: `.name`,
/// integer or string subscripts and integer slices.
///
/// Anything computed, such as `a[i]`, ends the static path; it and every
/// accessor after it become components of the node instead.
fn parse_identifier_path<'a, I>(tokens: &mut Peekable<I>,
                                mut id: ObjectIdentifier,
                                line: usize)
                                -> Expr
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    loop {
        match tokens.peek() {
            Some((Token::Dot, _)) => {
                let Some(Token::Identifier(name)) = peek_second(tokens) else {
                    break;
                };
                tokens.next();
                tokens.next();
                id.components.push(PathComponent::Name(name.clone()));
            },
            Some((Token::LBracket, _)) => {
                let mut ahead = tokens.clone();
                let Some(component) = static_subscript(&mut ahead) else {
                    break;
                };
                *tokens = ahead;
                id.components.push(component);
            },
            _ => break,
        }
    }
    Expr::variable(id, line)
}

/// Reads a subscript made of literals only, `[0]`, `[-1]`, `['key']` or
/// `[1:-1:2]`, from a lookahead copy of the stream.
fn static_subscript<'a, I>(ahead: &mut Peekable<I>) -> Option<PathComponent>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    if !accept(ahead, &Token::LBracket) {
        return None;
    }
    if let Some(Token::Str(key)) = peek_token(ahead) {
        ahead.next();
        return accept(ahead, &Token::RBracket).then(|| PathComponent::Key(key.text.clone()));
    }

    let start = static_int(ahead);
    if start.is_some() && accept(ahead, &Token::RBracket) {
        return start.map(PathComponent::Index);
    }
    if !accept(ahead, &Token::Colon) {
        return None;
    }
    let stop = static_int(ahead);
    let step = if accept(ahead, &Token::Colon) { static_int(ahead) } else { None };
    accept(ahead, &Token::RBracket).then_some(PathComponent::Range { start, stop, step })
}

fn static_int<'a, I>(ahead: &mut Peekable<I>) -> Option<i64>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let negative = matches!(ahead.peek(), Some((Token::Minus, _)))
                   && matches!(peek_second(ahead), Some(Token::Integer(_)));
    if negative {
        ahead.next();
    }
    match peek_token(ahead) {
        Some(Token::Integer(n)) => {
            ahead.next();
            Some(if negative { -n } else { *n })
        },
        _ => None,
    }
}

/// Parses accessors and calls applied to an expression.
///
/// Handles three postfix constructs, chained freely:
///
/// 1. **Attributes** `expr.name`
/// 2. **Subscripts and slices** `expr[i]`, `expr[a:b:c]`
/// 3. **Calls** `expr(args)`
///
/// Attributes and subscripts are recorded as components of the node; a
/// call wraps everything parsed so far as its callee.
///
/// # Parameters
/// - `tokens`: Token iterator after a primary expression.
/// - `node`: The expression to which postfix operators will be applied.
///
/// # Returns
/// An updated [`Expr`] with all postfix operators folded in.
///
/// # Errors
/// Returns a `ParseError` if a bracket is not closed or an inner
/// expression fails to parse.
fn parse_postfix<'a, I>(tokens: &mut Peekable<I>, mut node: Expr) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    loop {
        // `2 (mm/s)` is a quantity, not a call on the literal.
        if node.is_number() && matches!(tokens.peek(), Some((Token::LParen, _))) && starts_unit(tokens) {
            return Ok(node);
        }
        match tokens.peek() {
            Some((Token::Dot, _)) => {
                tokens.next();
                let name = parse_identifier(tokens)?;
                node.components.push(Component::Attribute(name));
            },
            Some((Token::LBracket, _)) => {
                tokens.next();
                let component = parse_subscript(tokens)?;
                node.components.push(component);
            },
            Some((Token::LParen, line)) => {
                let line = *line;
                tokens.next();
                let args = parse_arguments(tokens)?;
                node = Expr::new(ExprKind::Call { callee: Box::new(node),
                                                  args },
                                 line);
            },
            _ => return Ok(node),
        }
    }
}

/// Parses the inside of `[...]` after the opening bracket.
fn parse_subscript<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Component>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let bound = |tokens: &mut Peekable<I>| -> ParseResult<Option<Box<Expr>>> {
        match tokens.peek() {
            Some((Token::Colon | Token::RBracket, _)) => Ok(None),
            _ => Ok(Some(Box::new(parse_expression(tokens)?))),
        }
    };

    let start = match tokens.peek() {
        Some((Token::Colon, _)) => None,
        _ => {
            let index = parse_expression_list(tokens)?;
            if accept(tokens, &Token::RBracket) {
                return Ok(Component::Index(Box::new(index)));
            }
            Some(Box::new(index))
        },
    };
    expect(tokens, &Token::Colon)?;
    let stop = bound(tokens)?;
    let step = if accept(tokens, &Token::Colon) { bound(tokens)? } else { None };
    expect(tokens, &Token::RBracket)?;
    Ok(Component::Slice { start, stop, step })
}

/// Parses call arguments after the opening parenthesis, up to and
/// including the closing one.
///
/// Grammar:
/// ```text
///     argument := expression | name "=" expression | "*" expression | "**" expression
/// ```
///
/// # Errors
/// `InvalidArguments` when a positional argument follows a keyword
/// argument.
pub(crate) fn parse_arguments<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Vec<Argument>>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let args = parse_comma_separated(tokens, parse_argument, &Token::RParen)?;
    let mut named = false;
    for arg in &args {
        match arg.kind {
            ArgumentKind::Keyword(_) | ArgumentKind::KwSplat => named = true,
            ArgumentKind::Positional if named => {
                return Err(ParseError::InvalidArguments { details: "Positional argument follows keyword argument".to_string(),
                                                          line:    arg.value.line, });
            },
            _ => {},
        }
    }
    Ok(args)
}

fn parse_argument<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Argument>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let kind = match peek_token(tokens) {
        Some(Token::DoubleStar) => {
            tokens.next();
            ArgumentKind::KwSplat
        },
        Some(Token::Star) => {
            tokens.next();
            ArgumentKind::Splat
        },
        Some(Token::Identifier(name)) if peek_second(tokens) == Some(&Token::Equals) => {
            tokens.next();
            tokens.next();
            ArgumentKind::Keyword(name.clone())
        },
        _ => ArgumentKind::Positional,
    };
    Ok(Argument { kind,
                  value: parse_expression(tokens)? })
}
