use std::rc::Rc;

use crate::{
    error::RuntimeError,
    interpreter::{evaluator::core::EvalResult, value::core::Value},
    quantity::{Quantity, approx_eq},
    util::num::{as_exact_integer, i64_to_f64_lossy},
};

/// Converts a quantity into the value handed to callers.
///
/// A dimensionless quantity degrades to an integer when integral, otherwise
/// to a float; a quantity with a unit stays a quantity.
///
/// # Example
/// ```
/// use cadexpr::{
///     interpreter::value::{bridge::value_from_quantity, core::Value},
///     quantity::{Quantity, Unit},
/// };
///
/// assert!(matches!(value_from_quantity(Quantity::dimensionless(3.0)), Value::Integer(3)));
/// assert!(matches!(value_from_quantity(Quantity::dimensionless(0.5)), Value::Real(_)));
/// assert!(matches!(value_from_quantity(Quantity::new(3.0, Unit::LENGTH)), Value::Quantity(_)));
/// ```
#[must_use]
pub fn value_from_quantity(q: Quantity) -> Value {
    if !q.is_dimensionless() {
        return Value::Quantity(q);
    }
    as_exact_integer(q.value()).map_or(Value::Real(q.value()), Value::Integer)
}

/// Reads a numeric value as a quantity.
///
/// Booleans, integers and floats become dimensionless quantities; anything
/// else is a type error.
pub fn quantity_from_value(value: &Value, line: usize) -> EvalResult<Quantity> {
    try_quantity(value).ok_or_else(|| {
                           RuntimeError::type_error(format!("Quantity expected, got '{}'",
                                                            value.type_name()),
                                                    line)
                       })
}

/// Like [`quantity_from_value`], without an error.
#[must_use]
pub fn try_quantity(value: &Value) -> Option<Quantity> {
    match value {
        Value::Bool(b) => Some(Quantity::dimensionless(f64::from(u8::from(*b)))),
        Value::Integer(i) => Some(Quantity::dimensionless(i64_to_f64_lossy(*i))),
        Value::Real(r) => Some(Quantity::dimensionless(*r)),
        Value::Quantity(q) => Some(*q),
        _ => None,
    }
}

/// Type-coercing equality.
///
/// Numbers compare across integer, float and quantity representations with
/// the relative tolerance; quantities with different units are unequal.
/// Containers compare element-wise, reference values by identity.
///
/// # Example
/// ```
/// use cadexpr::{
///     interpreter::value::{bridge::values_equal, core::Value},
///     quantity::{Quantity, Unit},
/// };
///
/// assert!(values_equal(&Value::Integer(2), &Value::Real(2.0)));
/// assert!(values_equal(&Value::Real(0.1 + 0.2), &Value::Real(0.3)));
/// assert!(!values_equal(&Value::Quantity(Quantity::new(2.0, Unit::LENGTH)),
///                       &Value::Integer(2)));
/// ```
#[must_use]
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Bool(_) | Value::Integer(_), Value::Bool(_) | Value::Integer(_)) => {
            integer_of(a) == integer_of(b)
        },
        (Value::Bool(_) | Value::Integer(_) | Value::Real(_) | Value::Quantity(_),
         Value::Bool(_) | Value::Integer(_) | Value::Real(_) | Value::Quantity(_)) => {
            match (try_quantity(a), try_quantity(b)) {
                (Some(x), Some(y)) => x.unit() == y.unit() && approx_eq(x.value(), y.value()),
                _ => false,
            }
        },
        (Value::String(x), Value::String(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            Rc::ptr_eq(x, y) || sequences_equal(&x.borrow(), &y.borrow())
        },
        (Value::Tuple(x), Value::Tuple(y)) => sequences_equal(x, y),
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
            && x.iter()
                .all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        },
        (Value::Set(x), Value::Set(y)) => x.len() == y.len() && x.iter().all(|k| y.contains(k)),
        (Value::Vector(x), Value::Vector(y)) => x.approx_eq(y),
        (Value::Matrix(x), Value::Matrix(y)) => x.approx_eq(y),
        (Value::Rotation(x), Value::Rotation(y)) => x.approx_eq(y),
        (Value::Placement(x), Value::Placement(y)) => x.approx_eq(y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Exception(x), Value::Exception(y)) => x == y,
        (Value::ExceptionType(x), Value::ExceptionType(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => x.object_id() == y.object_id(),
        _ => false,
    }
}

fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(b) => Some(i64::from(*b)),
        Value::Integer(i) => Some(*i),
        _ => None,
    }
}

fn sequences_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
}

/// Duck-typed mapping test: dicts, and host objects that enumerate keys.
#[must_use]
pub fn is_mapping_like(value: &Value) -> bool {
    match value {
        Value::Dict(_) => true,
        Value::Object(o) => o.keys().is_some(),
        _ => false,
    }
}

/// Items of a mapping-like value as `(key, value)` pairs.
pub fn mapping_items(value: &Value, line: usize) -> EvalResult<Vec<(Value, Value)>> {
    match value {
        Value::Dict(d) => {
            Ok(d.borrow()
                .iter()
                .map(|(k, v)| (k.value().clone(), v.clone()))
                .collect())
        },
        Value::Object(o) => {
            let keys = o.keys()
                        .ok_or_else(|| RuntimeError::type_error("Expects a mapping.", line))?;
            keys.into_iter()
                .map(|k| {
                    let name = k.as_str()
                                .ok_or_else(|| RuntimeError::type_error("Only accepts string as key.", line))?
                                .to_string();
                    let v = o.get_attr(&name, line)?.unwrap_or_default();
                    Ok((k, v))
                })
                .collect()
        },
        _ => Err(RuntimeError::type_error("Expects a mapping.", line)),
    }
}
