use std::{
    hash::{Hash, Hasher},
    rc::Rc,
};

use ordered_float::OrderedFloat;

use crate::{
    error::RuntimeError,
    interpreter::{evaluator::core::EvalResult, value::core::Value},
    quantity::Unit,
    util::num::as_exact_integer,
};

/// Normalized hashing form of a value.
///
/// Numerically equal keys collapse to the same form, so `1`, `1.0` and `True`
/// address the same dict slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyRepr {
    None,
    Int(i64),
    Float(OrderedFloat<f64>),
    Quantity(OrderedFloat<f64>, Unit),
    Str(Rc<str>),
    Tuple(Vec<KeyRepr>),
    Vector([OrderedFloat<f64>; 3]),
    Identity(usize),
    Exception(&'static str),
}

impl KeyRepr {
    fn from_value(value: &Value, line: usize) -> EvalResult<Self> {
        Ok(match value {
            Value::None => Self::None,
            Value::Bool(b) => Self::Int(i64::from(*b)),
            Value::Integer(i) => Self::Int(*i),
            Value::Real(r) => Self::from_real(*r),
            Value::Quantity(q) if q.is_dimensionless() => Self::from_real(q.value()),
            Value::Quantity(q) => Self::Quantity(OrderedFloat(q.value()), q.unit()),
            Value::String(s) => Self::Str(Rc::clone(s)),
            Value::Tuple(items) => {
                Self::Tuple(items.iter()
                                 .map(|v| Self::from_value(v, line))
                                 .collect::<EvalResult<_>>()?)
            },
            Value::Vector(v) => {
                Self::Vector([OrderedFloat(v.x), OrderedFloat(v.y), OrderedFloat(v.z)])
            },
            Value::ExceptionType(kind) => Self::Exception(kind.name()),
            Value::Function(f) => Self::Identity(Rc::as_ptr(f).addr()),
            Value::Object(o) => Self::Identity(o.object_id()),
            other => {
                return Err(RuntimeError::type_error(format!("unhashable type: '{}'",
                                                            other.type_name()),
                                                    line));
            },
        })
    }

    fn from_real(r: f64) -> Self {
        as_exact_integer(r).map_or(Self::Float(OrderedFloat(r)), Self::Int)
    }
}

/// A value usable as a dict key or set member.
///
/// Equality and hashing use the normalized form; the original value is kept
/// so iteration returns what was inserted.
#[derive(Debug, Clone)]
pub struct HashKey {
    repr:  KeyRepr,
    value: Value,
}

impl HashKey {
    /// Wraps `value`, failing for unhashable (mutable) values.
    ///
    /// # Example
    /// ```
    /// use cadexpr::interpreter::value::{core::Value, key::HashKey};
    ///
    /// let a = HashKey::new(Value::Integer(1), 1).unwrap();
    /// let b = HashKey::new(Value::Real(1.0), 1).unwrap();
    /// assert_eq!(a, b);
    /// assert!(HashKey::new(Value::list(vec![]), 1).is_err());
    /// ```
    pub fn new(value: Value, line: usize) -> EvalResult<Self> {
        let repr = KeyRepr::from_value(&value, line)?;
        Ok(Self { repr, value })
    }

    /// The wrapped value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        self.repr == other.repr
    }
}

impl Eq for HashKey {}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.repr.hash(state);
    }
}

impl From<&str> for HashKey {
    fn from(s: &str) -> Self {
        let text: Rc<str> = Rc::from(s);
        Self { repr:  KeyRepr::Str(Rc::clone(&text)),
               value: Value::String(text), }
    }
}
