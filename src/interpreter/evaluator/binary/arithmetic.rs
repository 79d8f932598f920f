use std::rc::Rc;

use crate::{
    ast::BinaryOperator,
    error::RuntimeError,
    interpreter::{
        evaluator::{
            core::{Context, EvalResult},
            utils::{floor_div, floor_mod},
        },
        value::{
            bridge::{try_quantity, value_from_quantity},
            core::Value,
        },
    },
    quantity::Quantity,
};

impl Context {
    /// Evaluates an arithmetic operator.
    ///
    /// Integers stay integers for `+ - * // % **` and fail on overflow
    /// instead of wrapping. Every other numeric combination is computed as a
    /// quantity, so units are checked and a dimensionless result degrades to
    /// an integer when integral. Strings, lists and tuples concatenate and
    /// repeat; geometry values multiply as transforms.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{
    ///     ast::BinaryOperator,
    ///     interpreter::{evaluator::core::Context, value::core::Value},
    /// };
    ///
    /// let r = Context::eval_arithmetic(BinaryOperator::FloorDiv,
    ///                                  &Value::Integer(-7),
    ///                                  &Value::Integer(2),
    ///                                  1).unwrap();
    /// assert_eq!(r, Value::Integer(-4));
    ///
    /// let r = Context::eval_arithmetic(BinaryOperator::Div,
    ///                                  &Value::Integer(4),
    ///                                  &Value::Integer(2),
    ///                                  1).unwrap();
    /// assert!(matches!(r, Value::Integer(2)));
    /// ```
    pub fn eval_arithmetic(op: BinaryOperator,
                           left: &Value,
                           right: &Value,
                           line: usize)
                           -> EvalResult<Value> {
        use BinaryOperator::{Add, Mul, Unit, UnitAdd};

        if let (Some(a), Some(b)) = (integer_operand(left), integer_operand(right))
           && let Some(result) = Self::eval_integer(op, a, b, line)?
        {
            return Ok(result);
        }

        match (left, right) {
            (Value::String(a), Value::String(b)) if op == Add => {
                Ok(Value::string(format!("{a}{b}")))
            },
            (Value::String(s), n) | (n, Value::String(s)) if op == Mul => {
                let count = repeat_count(n, line).ok_or_else(|| Self::unsupported(op, left, right, line))??;
                Ok(Value::string(s.repeat(count)))
            },
            (Value::List(a), Value::List(b)) if op == Add => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Value::list(items))
            },
            (Value::Tuple(a), Value::Tuple(b)) if op == Add => {
                Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
            },
            (Value::List(_) | Value::Tuple(_), n) | (n, Value::List(_) | Value::Tuple(_))
                if op == Mul && !matches!(n, Value::List(_) | Value::Tuple(_)) =>
            {
                let sequence = if matches!(left, Value::List(_) | Value::Tuple(_)) { left } else { right };
                let count = repeat_count(n, line).ok_or_else(|| Self::unsupported(op, left, right, line))??;
                let items = sequence.sequence_items().unwrap_or_default();
                let repeated = (0..count).flat_map(|_| items.iter().cloned()).collect();
                Ok(match sequence {
                    Value::List(_) => Value::list(repeated),
                    _ => Value::tuple(repeated),
                })
            },
            (Value::Vector(_) | Value::Matrix(_) | Value::Rotation(_) | Value::Placement(_), _)
            | (_, Value::Vector(_) | Value::Matrix(_) | Value::Rotation(_) | Value::Placement(_)) => {
                Self::eval_geometry(op, left, right, line)
            },
            _ => match (try_quantity(left), try_quantity(right)) {
                (Some(a), Some(b)) => {
                    let op = match op {
                        Unit => Mul,
                        UnitAdd => Add,
                        other => other,
                    };
                    Self::eval_quantity(op, &a, &b, line).map(value_from_quantity)
                },
                _ => Err(Self::unsupported(op, left, right, line)),
            },
        }
    }

    /// Integer arithmetic; `Ok(None)` defers to quantity arithmetic.
    fn eval_integer(op: BinaryOperator, a: i64, b: i64, line: usize) -> EvalResult<Option<Value>> {
        use BinaryOperator::{Add, FloorDiv, Mod, Mul, Pow, PowCaret, Sub, Unit, UnitAdd};

        let overflow = || RuntimeError::Overflow { line };
        let result = match op {
            Add | UnitAdd => a.checked_add(b).ok_or_else(overflow)?,
            Sub => a.checked_sub(b).ok_or_else(overflow)?,
            Mul | Unit => a.checked_mul(b).ok_or_else(overflow)?,
            FloorDiv => floor_div(a, b, line)?,
            Mod => floor_mod(a, b, line)?,
            Pow | PowCaret if b >= 0 => {
                let exponent = u32::try_from(b).map_err(|_| overflow())?;
                a.checked_pow(exponent).ok_or_else(overflow)?
            },
            _ => return Ok(None),
        };
        Ok(Some(Value::Integer(result)))
    }

    /// Quantity arithmetic with unit checking.
    pub(crate) fn eval_quantity(op: BinaryOperator,
                                a: &Quantity,
                                b: &Quantity,
                                line: usize)
                                -> EvalResult<Quantity> {
        use BinaryOperator::{Add, Div, FloorDiv, Mod, Mul, Pow, PowCaret, Sub};

        let result = match op {
            Add => a.checked_add(b),
            Sub => a.checked_sub(b),
            Mul => a.checked_mul(b),
            Div => a.checked_div(b),
            FloorDiv => a.checked_div(b).map(|q| q.map_value(f64::floor)),
            Mod => a.checked_rem(b).map(|r| r.map_value(|v| floor_adjust(v, b.value()))),
            Pow | PowCaret => a.checked_pow(b),
            other => {
                return Err(RuntimeError::runtime(format!("Unsupported operator '{other}' between quantities"),
                                                 line));
            },
        };
        result.map_err(|e| e.at(line))
    }

    fn eval_geometry(op: BinaryOperator,
                     left: &Value,
                     right: &Value,
                     line: usize)
                     -> EvalResult<Value> {
        use BinaryOperator::{Add, Div, Mul, Sub};

        let scalar = |v: &Value| match v {
            Value::Vector(_) | Value::Matrix(_) | Value::Rotation(_) | Value::Placement(_) => None,
            other => try_quantity(other).filter(Quantity::is_dimensionless)
                                        .map(|q| q.value()),
        };

        let result = match (op, left, right) {
            (Add, Value::Vector(a), Value::Vector(b)) => Value::Vector(*a + *b),
            (Sub, Value::Vector(a), Value::Vector(b)) => Value::Vector(*a - *b),
            (Mul, Value::Vector(a), Value::Vector(b)) => Value::Real(a.dot(b)),
            (Mul, Value::Vector(v), s) | (Mul, s, Value::Vector(v)) if scalar(s).is_some() => {
                Value::Vector(v.scale(scalar(s).unwrap_or(1.0)))
            },
            (Div, Value::Vector(v), s) if scalar(s).is_some() => {
                let divisor = scalar(s).unwrap_or(1.0);
                #[allow(clippy::float_cmp)]
                if divisor == 0.0 {
                    return Err(RuntimeError::DivisionByZero { line });
                }
                Value::Vector(v.scale(1.0 / divisor))
            },
            (Mul, Value::Matrix(a), Value::Matrix(b)) => Value::Matrix(Rc::new(a.multiply(b))),
            (Mul, Value::Matrix(m), Value::Vector(v)) => Value::Vector(m.transform(v)),
            (Mul, Value::Placement(a), Value::Placement(b)) => {
                Value::Placement(Rc::new(a.multiply(b)))
            },
            (Mul, Value::Placement(p), Value::Vector(v)) => Value::Vector(p.transform(v)),
            (Mul, Value::Rotation(a), Value::Rotation(b)) => Value::Rotation(a.multiply(b)),
            (Mul, Value::Rotation(r), Value::Vector(v)) => Value::Vector(r.rotate(v)),
            _ => return Err(Self::unsupported(op, left, right, line)),
        };
        Ok(result)
    }
}

/// Moves a truncated remainder onto the divisor's sign.
fn floor_adjust(remainder: f64, divisor: f64) -> f64 {
    if remainder != 0.0 && (remainder < 0.0) != (divisor < 0.0) {
        remainder + divisor
    } else {
        remainder
    }
}

fn integer_operand(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Integer(i) => Some(*i),
        _ => None,
    }
}

/// The repetition count of `str * n` or `list * n`; `None` when `n` is not
/// an integer.
fn repeat_count(n: &Value, line: usize) -> Option<EvalResult<usize>> {
    let count = integer_operand(n)?;
    Some(usize::try_from(count.max(0)).map_err(|_| RuntimeError::Overflow { line }))
}
