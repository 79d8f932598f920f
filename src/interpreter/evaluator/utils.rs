use std::cmp::Ordering;

use crate::{
    error::RuntimeError,
    interpreter::{
        evaluator::core::EvalResult,
        value::{
            bridge::{try_quantity, values_equal},
            core::Value,
            key::HashKey,
        },
    },
    util::num::usize_to_i64,
};

/// Orders two values.
///
/// Numbers compare across representations with the quantity tolerance;
/// strings, lists and tuples compare lexicographically.
///
/// # Returns
/// `Ok(None)` when a NaN is involved; an error for unorderable types or
/// mismatched units.
///
/// ## Example
/// ```
/// use std::cmp::Ordering;
///
/// use cadexpr::interpreter::{evaluator::utils::compare_values, value::core::Value};
///
/// assert_eq!(compare_values(&Value::Integer(1), &Value::Real(1.5), 1).unwrap(),
///            Some(Ordering::Less));
/// assert_eq!(compare_values(&Value::from("b"), &Value::from("a"), 1).unwrap(),
///            Some(Ordering::Greater));
/// assert!(compare_values(&Value::from("a"), &Value::Integer(1), 1).is_err());
/// ```
pub fn compare_values(a: &Value, b: &Value, line: usize) -> EvalResult<Option<Ordering>> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(Some(x.cmp(y))),
        (Value::String(x), Value::String(y)) => Ok(Some(x.cmp(y))),
        (Value::List(x), Value::List(y)) => compare_sequences(&x.borrow(), &y.borrow(), line),
        (Value::Tuple(x), Value::Tuple(y)) => compare_sequences(x, y, line),
        _ => match (try_quantity(a), try_quantity(b)) {
            (Some(x), Some(y)) => x.compare(&y).map_err(|e| e.at(line)),
            _ => {
                Err(RuntimeError::type_error(format!("Cannot compare '{}' with '{}'",
                                                     a.type_name(),
                                                     b.type_name()),
                                             line))
            },
        },
    }
}

fn compare_sequences(a: &[Value], b: &[Value], line: usize) -> EvalResult<Option<Ordering>> {
    for (x, y) in a.iter().zip(b) {
        match compare_values(x, y, line)? {
            Some(Ordering::Equal) => {},
            other => return Ok(other),
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

/// Membership test used by `in`.
///
/// Strings test for a substring, dicts and sets for a key, sequences for an
/// equal element, mapping-like objects for a key name.
pub fn contains(container: &Value, item: &Value, line: usize) -> EvalResult<bool> {
    match container {
        Value::String(s) => {
            let needle = item.as_str().ok_or_else(|| {
                                          RuntimeError::type_error(format!("'in <string>' requires string as left operand, not {}",
                                                                           item.type_name()),
                                                                   line)
                                      })?;
            Ok(s.contains(needle))
        },
        Value::List(l) => Ok(l.borrow().iter().any(|v| values_equal(v, item))),
        Value::Tuple(t) => Ok(t.iter().any(|v| values_equal(v, item))),
        Value::Dict(d) => Ok(d.borrow().contains_key(&HashKey::new(item.clone(), line)?)),
        Value::Set(s) => Ok(s.contains(&HashKey::new(item.clone(), line)?)),
        other => Ok(other.iterate(line)?.iter().any(|v| values_equal(v, item))),
    }
}

/// Resolves a possibly negative index against `len`.
pub fn normalize_index(index: i64, len: usize, what: &str, line: usize) -> EvalResult<usize> {
    let len = usize_to_i64(len);
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).map_err(|_| RuntimeError::Overflow { line })
    } else {
        Err(RuntimeError::index_error(format!("{what} index out of range"), line))
    }
}

/// Positions selected by `[start:stop:step]` on a sequence of `len` items.
///
/// ## Example
/// ```
/// use cadexpr::interpreter::evaluator::utils::slice_indices;
///
/// assert_eq!(slice_indices(5, Some(1), None, None, 1).unwrap(), [1, 2, 3, 4]);
/// assert_eq!(slice_indices(5, None, None, Some(-2), 1).unwrap(), [4, 2, 0]);
/// assert_eq!(slice_indices(5, Some(-2), None, None, 1).unwrap(), [3, 4]);
/// assert!(slice_indices(5, None, None, Some(0), 1).is_err());
/// ```
pub fn slice_indices(len: usize,
                     start: Option<i64>,
                     stop: Option<i64>,
                     step: Option<i64>,
                     line: usize)
                     -> EvalResult<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(RuntimeError::runtime("slice step cannot be zero", line));
    }
    let len = usize_to_i64(len);
    let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
    let clamp = |v: i64| {
        if v < 0 {
            (v + len).max(lower)
        } else {
            v.min(upper)
        }
    };
    let start = start.map_or(if step < 0 { upper } else { lower }, clamp);
    let stop = stop.map_or(if step < 0 { lower } else { upper }, clamp);

    let mut indices = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        if let Ok(index) = usize::try_from(i) {
            indices.push(index);
        }
        i += step;
    }
    Ok(indices)
}

/// Integer division rounding toward negative infinity.
pub fn floor_div(a: i64, b: i64, line: usize) -> EvalResult<i64> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero { line });
    }
    let q = a.checked_div(b).ok_or(RuntimeError::Overflow { line })?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

/// Remainder with the sign of the divisor.
pub fn floor_mod(a: i64, b: i64, line: usize) -> EvalResult<i64> {
    if b == 0 {
        return Err(RuntimeError::DivisionByZero { line });
    }
    let r = a.checked_rem(b).ok_or(RuntimeError::Overflow { line })?;
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

/// Collects the values of numeric arguments, flattening lists and tuples
/// and skipping everything that is not a number.
pub fn flatten_numeric(values: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for value in values {
        match value.sequence_items() {
            Some(items) => out.extend(flatten_numeric(&items)),
            None if value.is_numeric() => out.push(value.clone()),
            None => {},
        }
    }
    out
}
