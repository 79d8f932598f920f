use std::{cmp::Ordering, ops::RangeInclusive, rc::Rc};

use indexmap::{IndexMap, IndexSet};

use crate::{
    error::RuntimeError,
    interpreter::{
        evaluator::{
            core::{Context, EvalResult},
            security::BLOCKED_BUILTINS,
            utils::compare_values,
        },
        value::{
            bridge::{is_mapping_like, mapping_items},
            core::Value,
            exception::{ExceptionKind, ExceptionValue},
            host::{HostFunction, Kwargs},
            key::HashKey,
        },
    },
    util::num::{f64_to_i64_checked, usize_to_i64},
};

/// Module every built-in function declares.
pub const BUILTINS_MODULE: &str = "builtins";

/// Builds the table of built-in names.
///
/// # Example
/// ```
/// use cadexpr::interpreter::evaluator::builtins::core::builtin_table;
///
/// let table = builtin_table();
/// assert!(table.contains_key("len"));
/// assert!(table.contains_key("KeyError"));
/// assert!(table.contains_key("open"));
/// ```
#[must_use]
pub fn builtin_table() -> IndexMap<String, Value> {
    let mut table = IndexMap::new();
    let mut add = |name: &str, f: fn(&mut Context, Vec<Value>, Kwargs, usize) -> EvalResult<Value>| {
        let function = HostFunction::new(name, Some(BUILTINS_MODULE), f);
        table.insert(name.to_string(), Value::Object(Rc::new(function)));
    };

    add("len", len);
    add("range", range);
    add("int", int);
    add("float", float);
    add("bool", boolean);
    add("repr", repr);
    add("enumerate", enumerate);
    add("zip", zip);
    add("sorted", sorted);
    add("isinstance", isinstance);
    add("print", print);
    add("dict", dict);
    add("set", set);
    for &name in BLOCKED_BUILTINS {
        add(name, blocked);
    }

    for kind in ExceptionKind::ALL {
        table.insert(kind.name().to_string(), Value::ExceptionType(*kind));
    }
    table
}

/// Builds the error for a `ValueError`, which has no dedicated
/// [`RuntimeError`] variant.
pub(crate) fn value_error(message: impl Into<String>, line: usize) -> RuntimeError {
    RuntimeError::Raised { exception: Rc::new(ExceptionValue::new(ExceptionKind::ValueError, message)),
                           line }
}

/// Checks the argument count of a built-in that takes no keywords.
pub(crate) fn check_args(name: &str,
                         args: &[Value],
                         kwargs: &Kwargs,
                         counts: RangeInclusive<usize>,
                         line: usize)
                         -> EvalResult<()> {
    if !kwargs.is_empty() {
        return Err(RuntimeError::type_error(format!("{name}() takes no keyword arguments"), line));
    }
    check_count(name, args.len(), counts, line)
}

pub(crate) fn check_count(name: &str,
                          given: usize,
                          counts: RangeInclusive<usize>,
                          line: usize)
                          -> EvalResult<()> {
    if counts.contains(&given) {
        return Ok(());
    }
    let (min, max) = (*counts.start(), *counts.end());
    let details = if min == max {
        let plural = if min == 1 { "" } else { "s" };
        format!("{name}() takes exactly {min} argument{plural} ({given} given)")
    } else if max == usize::MAX {
        format!("{name}() takes at least {min} arguments ({given} given)")
    } else {
        format!("{name}() takes from {min} to {max} arguments ({given} given)")
    };
    Err(RuntimeError::type_error(details, line))
}

fn len(_: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("len", &args, &kwargs, 1..=1, line)?;
    let n = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::List(l) => l.borrow().len(),
        Value::Tuple(t) => t.len(),
        Value::Dict(d) => d.borrow().len(),
        Value::Set(s) => s.len(),
        other => {
            let keys = match other {
                Value::Object(o) => o.keys(),
                _ => None,
            };
            keys.ok_or_else(|| {
                    RuntimeError::type_error(format!("object of type '{}' has no len()",
                                                     other.type_name()),
                                             line)
                })?
                .len()
        },
    };
    Ok(Value::Integer(usize_to_i64(n)))
}

/// `range(stop)`, `range(start, stop[, step])` as a list of integers.
fn range(_: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("range", &args, &kwargs, 1..=3, line)?;
    let bounds = args.iter()
                     .map(|v| v.as_index(line))
                     .collect::<EvalResult<Vec<_>>>()?;
    let (start, stop, step) = match bounds[..] {
        [stop] => (0, stop, 1),
        [start, stop] => (start, stop, 1),
        [start, stop, step] => (start, stop, step),
        _ => return Err(RuntimeError::type_error("range expected at most 3 arguments", line)),
    };
    if step == 0 {
        return Err(value_error("range() arg 3 must not be zero", line));
    }

    let mut items = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        items.push(Value::Integer(current));
        current = current.checked_add(step)
                         .ok_or(RuntimeError::Overflow { line })?;
    }
    Ok(Value::list(items))
}

fn int(_: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("int", &args, &kwargs, 0..=1, line)?;
    let Some(value) = args.first() else {
        return Ok(Value::Integer(0));
    };
    let n = match value {
        Value::Bool(b) => i64::from(*b),
        Value::Integer(i) => *i,
        Value::Real(r) => f64_to_i64_checked(r.trunc(), line)?,
        Value::Quantity(q) => f64_to_i64_checked(q.value().trunc(), line)?,
        Value::String(s) => s.trim().parse().map_err(|_| {
                                                 value_error(format!("invalid literal for int() with base 10: {}",
                                                                     value.repr()),
                                                             line)
                                             })?,
        other => {
            return Err(RuntimeError::type_error(format!("int() argument must be a string or a number, not '{}'",
                                                        other.type_name()),
                                                line));
        },
    };
    Ok(Value::Integer(n))
}

fn float(_: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("float", &args, &kwargs, 0..=1, line)?;
    let Some(value) = args.first() else {
        return Ok(Value::Real(0.0));
    };
    let r = match value {
        Value::String(s) => s.trim().parse().map_err(|_| {
                                                 value_error(format!("could not convert string to float: {}",
                                                                     value.repr()),
                                                             line)
                                             })?,
        other => other.as_real(line)?,
    };
    Ok(Value::Real(r))
}

fn boolean(_: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("bool", &args, &kwargs, 0..=1, line)?;
    Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
}

fn repr(_: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("repr", &args, &kwargs, 1..=1, line)?;
    Ok(Value::string(args[0].repr()))
}

fn enumerate(_: &mut Context, args: Vec<Value>, mut kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    let start = kwargs.shift_remove("start");
    check_args("enumerate", &args, &kwargs, 1..=2, line)?;
    let start = match (args.get(1), start) {
        (Some(_), Some(_)) => {
            return Err(RuntimeError::type_error("enumerate() got multiple values for argument 'start'",
                                                line));
        },
        (Some(v), None) => v.as_index(line)?,
        (None, Some(v)) => v.as_index(line)?,
        (None, None) => 0,
    };
    let items = args[0].iterate(line)?
                       .into_iter()
                       .zip(start..)
                       .map(|(item, i)| Value::tuple(vec![Value::Integer(i), item]))
                       .collect();
    Ok(Value::list(items))
}

fn zip(_: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("zip", &args, &kwargs, 0..=usize::MAX, line)?;
    let columns = args.iter()
                      .map(|v| v.iterate(line))
                      .collect::<EvalResult<Vec<_>>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    let items = (0..rows).map(|i| Value::tuple(columns.iter().map(|c| c[i].clone()).collect()))
                         .collect();
    Ok(Value::list(items))
}

/// `sorted(iterable, key=None, reverse=False)`; the sort is stable.
fn sorted(ctx: &mut Context, args: Vec<Value>, mut kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    let key = kwargs.shift_remove("key").filter(|k| !k.is_none());
    let reverse = kwargs.shift_remove("reverse").is_some_and(|r| r.truthy());
    check_args("sorted", &args, &kwargs, 1..=1, line)?;

    let items = args[0].iterate(line)?;
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let k = match &key {
            Some(key) => ctx.call_value(key, vec![item.clone()], Kwargs::new(), line)?,
            None => item.clone(),
        };
        keyed.push((k, item));
    }

    let mut failure = None;
    keyed.sort_by(|a, b| {
             let (x, y) = if reverse { (&b.0, &a.0) } else { (&a.0, &b.0) };
             match compare_values(x, y, line) {
                 Ok(ordering) => ordering.unwrap_or(Ordering::Equal),
                 Err(err) => {
                     failure.get_or_insert(err);
                     Ordering::Equal
                 },
             }
         });
    if let Some(err) = failure {
        return Err(err);
    }
    Ok(Value::list(keyed.into_iter().map(|(_, item)| item).collect()))
}

/// `isinstance(value, types)`.
///
/// A type is an exception type, a built-in conversion function such as
/// `int`, or a type name string; a tuple matches any of its members.
fn isinstance(_: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("isinstance", &args, &kwargs, 2..=2, line)?;
    Ok(Value::Bool(instance_of(&args[0], &args[1], line)?))
}

fn instance_of(value: &Value, ty: &Value, line: usize) -> EvalResult<bool> {
    match ty {
        Value::Tuple(types) => {
            for ty in types.iter() {
                if instance_of(value, ty, line)? {
                    return Ok(true);
                }
            }
            Ok(false)
        },
        Value::ExceptionType(base) => {
            Ok(matches!(value, Value::Exception(e) if e.kind.is_subclass_of(*base)))
        },
        Value::String(name) => Ok(value.type_name() == name.as_ref()),
        Value::Object(o) => match o.get_attr("__name__", line)? {
            Some(Value::String(name)) => Ok(value.type_name() == name.as_ref()),
            _ => Err(not_a_type(ty, line)),
        },
        _ => Err(not_a_type(ty, line)),
    }
}

fn not_a_type(ty: &Value, line: usize) -> RuntimeError {
    RuntimeError::type_error(format!("isinstance() arg 2 must be a type or tuple of types, not '{}'",
                                     ty.type_name()),
                             line)
}

/// Prints the arguments separated by spaces to standard output.
fn print(_: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("print", &args, &kwargs, 0..=usize::MAX, line)?;
    let text = args.iter().map(ToString::to_string).collect::<Vec<_>>();
    println!("{}", text.join(" "));
    Ok(Value::None)
}

/// `dict(mapping_or_pairs, **kwargs)`.
fn dict(_: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_count("dict", args.len(), 0..=1, line)?;
    let mut entries = IndexMap::new();
    if let Some(source) = args.first() {
        for (k, v) in dict_source(source, line)? {
            entries.insert(HashKey::new(k, line)?, v);
        }
    }
    for (name, value) in kwargs {
        entries.insert(HashKey::from(name.as_str()), value);
    }
    Ok(Value::dict(entries))
}

/// Key/value pairs of a mapping or of an iterable of pairs.
pub(crate) fn dict_source(source: &Value, line: usize) -> EvalResult<Vec<(Value, Value)>> {
    if is_mapping_like(source) {
        return mapping_items(source, line);
    }
    source.iterate(line)?
          .into_iter()
          .enumerate()
          .map(|(i, pair)| match pair.iterate(line)?.as_slice() {
              [k, v] => Ok((k.clone(), v.clone())),
              other => {
                  Err(value_error(format!("dictionary update sequence element #{i} has length {}; 2 is required",
                                          other.len()),
                                  line))
              },
          })
          .collect()
}

fn set(_: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("set", &args, &kwargs, 0..=1, line)?;
    let items = match args.first() {
        Some(source) => source.iterate(line)?,
        None => Vec::new(),
    };
    let set = items.into_iter()
                   .map(|v| HashKey::new(v, line))
                   .collect::<EvalResult<IndexSet<_>>>()?;
    Ok(Value::Set(Rc::new(set)))
}

/// Body of the blocked built-ins. The sandbox rejects them before a call
/// gets here.
fn blocked(_: &mut Context, _: Vec<Value>, _: Kwargs, line: usize) -> EvalResult<Value> {
    Err(RuntimeError::Security { details: "Built-in blocked".to_string(),
                                 line })
}
