use std::iter::Peekable;

use crate::{
    ast::{BinaryOperator, Expr, ExprKind, UnaryOperator},
    interpreter::{
        lexer::Token,
        parser::{
            core::ParseResult,
            unary::{parse_postfix_expression, parse_unary},
            unit::{is_unit_symbol, parse_unit_expression, starts_unit},
            utils::{peek_line, peek_second, peek_token},
        },
    },
};

/// Parses a left-associative chain of operators at one priority level.
///
/// # Parameters
/// - `tokens`: Token iterator.
/// - `operand`: Parser of the next tighter level.
/// - `operator`: Maps a token to the operator of this level, if it is one.
///
/// # Returns
/// The operand, or the operators folded to the left over the operands.
fn parse_left_assoc<'a, I>(tokens: &mut Peekable<I>,
                           operand: fn(&mut Peekable<I>) -> ParseResult<Expr>,
                           operator: fn(&Token) -> Option<BinaryOperator>)
                           -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut left = operand(tokens)?;
    while let Some((tok, line)) = tokens.peek() {
        let Some(op) = operator(tok) else {
            break;
        };
        let line = *line;
        tokens.next();
        let right = operand(tokens)?;
        left = binary(op, left, right, line);
    }
    Ok(left)
}

fn binary(op: BinaryOperator, left: Expr, right: Expr, line: usize) -> Expr {
    Expr::new(ExprKind::BinaryOp { op,
                                   left: Box::new(left),
                                   right: Box::new(right) },
              line)
}

/// Parses logical OR expressions.
///
/// Grammar: `logical_or := logical_and ("or" logical_and)*`
pub fn parse_logical_or<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    parse_left_assoc(tokens, parse_logical_and, |t| {
        matches!(t, Token::Or).then_some(BinaryOperator::Or)
    })
}

/// Parses logical AND expressions.
///
/// Grammar: `logical_and := equality ("and" equality)*`
pub fn parse_logical_and<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    parse_left_assoc(tokens, parse_equality, |t| {
        matches!(t, Token::And).then_some(BinaryOperator::And)
    })
}

/// Parses equality, identity and membership tests.
///
/// `is not` and `not in` are two-token operators, so the level looks one
/// token further ahead than the others.
///
/// Grammar:
/// `equality := relational (("==" | "!=" | "is" ["not"] | ["not"] "in") relational)*`
pub fn parse_equality<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut left = parse_relational(tokens)?;
    loop {
        let Some(tok) = peek_token(tokens) else {
            break;
        };
        let line = peek_line(tokens);
        let (op, width) = match tok {
            Token::EqualEqual => (BinaryOperator::Eq, 1),
            Token::BangEqual => (BinaryOperator::Neq, 1),
            Token::In => (BinaryOperator::In, 1),
            Token::Is if peek_second(tokens) == Some(&Token::Not) => (BinaryOperator::IsNot, 2),
            Token::Is => (BinaryOperator::Is, 1),
            Token::Not if peek_second(tokens) == Some(&Token::In) => (BinaryOperator::NotIn, 2),
            _ => break,
        };
        for _ in 0..width {
            tokens.next();
        }
        let right = parse_relational(tokens)?;
        left = binary(op, left, right, line);
    }
    Ok(left)
}

/// Parses ordering comparisons.
///
/// Grammar: `relational := additive (("<" | ">" | "<=" | ">=") additive)*`
pub fn parse_relational<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    parse_left_assoc(tokens, parse_additive, |t| match t {
        Token::Less => Some(BinaryOperator::Lt),
        Token::Greater => Some(BinaryOperator::Gt),
        Token::LessEqual => Some(BinaryOperator::Lte),
        Token::GreaterEqual => Some(BinaryOperator::Gte),
        _ => None,
    })
}

/// Parses addition and subtraction.
///
/// Grammar: `additive := multiplicative (("+" | "-") multiplicative)*`
pub fn parse_additive<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    parse_left_assoc(tokens, parse_multiplicative, |t| match t {
        Token::Plus => Some(BinaryOperator::Add),
        Token::Minus => Some(BinaryOperator::Sub),
        _ => None,
    })
}

/// Parses multiplication, division, floor division and modulo.
///
/// Operands are unary expressions, so `2 * -3` needs no parentheses.
///
/// Grammar: `multiplicative := unary (("*" | "/" | "//" | "%") unary)*`
pub fn parse_multiplicative<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    parse_left_assoc(tokens, parse_unary, |t| match t {
        Token::Star => Some(BinaryOperator::Mul),
        Token::Slash => Some(BinaryOperator::Div),
        Token::DoubleSlash => Some(BinaryOperator::FloorDiv),
        Token::Percent => Some(BinaryOperator::Mod),
        _ => None,
    })
}

/// Parses a sum of quantities written by juxtaposition, `1 ft 2 in`.
///
/// Another term is only taken after a term that carries a unit, and only
/// when a number followed by a unit comes next.
///
/// Grammar: `unit_add := unit_juxtaposition (number unit)*`
pub fn parse_unit_add<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut left = parse_unit_juxtaposition(tokens)?;
    loop {
        let has_unit = matches!(&left.kind,
                                ExprKind::BinaryOp { op: BinaryOperator::Unit | BinaryOperator::UnitAdd,
                                                     .. })
                       && left.components.is_empty();
        let Some((Token::Integer(_) | Token::Real(_), line)) = tokens.peek() else {
            break;
        };
        let line = *line;
        let mut ahead = tokens.clone();
        ahead.next();
        if !has_unit || !unit_follows_number(&ahead) {
            break;
        }
        let right = parse_unit_juxtaposition(tokens)?;
        left = binary(BinaryOperator::UnitAdd, left, right, line);
    }
    Ok(left)
}

/// Parses a value followed by a unit, `10 mm` or `Length m`.
///
/// Only a numeric literal may be followed by a parenthesised unit.
///
/// Grammar: `unit_juxtaposition := power [unit]`
pub fn parse_unit_juxtaposition<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let left = parse_power(tokens)?;
    let unit_next = if left.is_number() {
        unit_follows_number(tokens)
    } else {
        is_unit_symbol(tokens.peek().map(|(t, _)| t))
    };
    if !unit_next {
        return Ok(left);
    }
    let line = left.line;
    let unit = parse_unit_expression(tokens)?;
    Ok(binary(BinaryOperator::Unit, left, unit, line))
}

/// Whether a unit follows a numeric literal.
///
/// Besides the unit symbols this accepts `in`, read as the inch when
/// nothing that could continue a membership test follows it: `1 in` and
/// `1 in + 2 mm` are lengths while `1 in x` tests membership.
fn unit_follows_number<'a, I>(tokens: &Peekable<I>) -> bool
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    if starts_unit(tokens) {
        return true;
    }
    let mut ahead = tokens.clone();
    if !matches!(ahead.next(), Some((Token::In, _))) {
        return false;
    }
    matches!(ahead.next().map(|(t, _)| t),
             None | Some(Token::NewLine
                         | Token::Dedent
                         | Token::Comment(_)
                         | Token::RParen
                         | Token::RBracket
                         | Token::RBrace
                         | Token::Comma
                         | Token::Semicolon
                         | Token::Colon
                         | Token::Integer(_)
                         | Token::Real(_)
                         | Token::Plus
                         | Token::Minus
                         | Token::Star
                         | Token::Slash))
}

/// Parses exponentiation, spelled `**` or `^`.
///
/// Both spellings group to the left, so `2 ^ 3 ^ 2` is `(2 ^ 3) ^ 2`. The
/// exponent may carry a sign, as in `2 ^ -1`.
///
/// Grammar: `power := postfix (("**" | "^") ["-" | "+"] postfix)*`
pub fn parse_power<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let mut left = parse_postfix_expression(tokens)?;
    loop {
        let (op, line) = match tokens.peek() {
            Some((Token::DoubleStar, line)) => (BinaryOperator::Pow, *line),
            Some((Token::Caret, line)) => (BinaryOperator::PowCaret, *line),
            _ => break,
        };
        tokens.next();
        let right = parse_signed_operand(tokens)?;
        left = binary(op, left, right, line);
    }
    Ok(left)
}

fn parse_signed_operand<'a, I>(tokens: &mut Peekable<I>) -> ParseResult<Expr>
    where I: Iterator<Item = &'a (Token, usize)> + Clone
{
    let (op, line) = match tokens.peek() {
        Some((Token::Minus, line)) => (UnaryOperator::Neg, *line),
        Some((Token::Plus, line)) => (UnaryOperator::Pos, *line),
        _ => return parse_postfix_expression(tokens),
    };
    tokens.next();
    let operand = parse_signed_operand(tokens)?;
    Ok(Expr::new(ExprKind::UnaryOp { op,
                                     operand: Box::new(operand) },
                 line))
}
