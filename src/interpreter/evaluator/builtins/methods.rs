use std::rc::Rc;

use crate::{
    error::RuntimeError,
    interpreter::{
        evaluator::{
            builtins::core::{check_args, check_count, dict_source, value_error},
            core::{Context, EvalResult},
            utils::normalize_index,
        },
        value::{
            bridge::values_equal,
            core::{DictRef, ListRef, Value},
            host::{HostFunction, Kwargs},
            key::HashKey,
        },
    },
    util::num::{i64_to_usize_checked, usize_to_i64},
};

type Method = fn(&Value, Vec<Value>, Kwargs, usize) -> EvalResult<Value>;

/// Looks up a method of a built-in value and binds it to the value.
///
/// # Returns
/// A callable host object, or `None` when the type has no such method.
///
/// # Example
/// ```
/// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
///
/// let mut ctx = Context::new();
/// let v = evaluate_source(&mut ctx, "xs = [3, 1]\nxs.append(2)\nxs.index(2)").unwrap();
/// assert_eq!(v.to_string(), "2");
/// let v = evaluate_source(&mut ctx, "'-'.join('a b c'.split())").unwrap();
/// assert_eq!(v.to_string(), "a-b-c");
/// ```
#[must_use]
pub fn value_method(value: &Value, name: &str) -> Option<Value> {
    let method: Method = match (value, name) {
        (Value::List(_), "append") => list_append,
        (Value::List(_), "extend") => list_extend,
        (Value::List(_), "insert") => list_insert,
        (Value::List(_), "pop") => list_pop,
        (Value::List(_) | Value::Tuple(_), "index") => sequence_index,
        (Value::List(_) | Value::Tuple(_), "count") => sequence_count,
        (Value::Dict(_), "keys") => dict_keys,
        (Value::Dict(_), "values") => dict_values,
        (Value::Dict(_), "items") => dict_items,
        (Value::Dict(_), "get") => dict_get,
        (Value::Dict(_), "update") => dict_update,
        (Value::String(_), "upper") => str_upper,
        (Value::String(_), "lower") => str_lower,
        (Value::String(_), "strip") => str_strip,
        (Value::String(_), "split") => str_split,
        (Value::String(_), "join") => str_join,
        (Value::String(_), "replace") => str_replace,
        (Value::String(_), "startswith") => str_startswith,
        (Value::String(_), "endswith") => str_endswith,
        (Value::String(_), "format") => str_format,
        _ => return None,
    };
    let receiver = value.clone();
    let bound = HostFunction::bound(name, value.clone(), move |_: &mut Context, args, kwargs, line| {
        method(&receiver, args, kwargs, line)
    });
    Some(Value::Object(Rc::new(bound)))
}

fn list_of(value: &Value) -> Option<&ListRef> {
    match value {
        Value::List(list) => Some(list),
        _ => None,
    }
}

fn dict_of(value: &Value) -> Option<&DictRef> {
    match value {
        Value::Dict(dict) => Some(dict),
        _ => None,
    }
}

fn text_of(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn list_append(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("append", &args, &kwargs, 1..=1, line)?;
    if let Some(list) = list_of(receiver) {
        list.borrow_mut().extend(args);
    }
    Ok(Value::None)
}

fn list_extend(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("extend", &args, &kwargs, 1..=1, line)?;
    let items = args[0].iterate(line)?;
    if let Some(list) = list_of(receiver) {
        list.borrow_mut().extend(items);
    }
    Ok(Value::None)
}

/// `list.insert(i, x)`; out-of-range positions clamp to the ends.
fn list_insert(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("insert", &args, &kwargs, 2..=2, line)?;
    let index = args[0].as_index(line)?;
    if let Some(list) = list_of(receiver) {
        let mut list = list.borrow_mut();
        let len = usize_to_i64(list.len());
        let position = if index < 0 { (index + len).max(0) } else { index.min(len) };
        list.insert(i64_to_usize_checked(position, line)?, args[1].clone());
    }
    Ok(Value::None)
}

fn list_pop(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("pop", &args, &kwargs, 0..=1, line)?;
    let index = args.first().map(|v| v.as_index(line)).transpose()?.unwrap_or(-1);
    let Some(list) = list_of(receiver) else {
        return Ok(Value::None);
    };
    let mut list = list.borrow_mut();
    if list.is_empty() {
        return Err(RuntimeError::index_error("pop from empty list", line));
    }
    let position = normalize_index(index, list.len(), "pop", line)?;
    Ok(list.remove(position))
}

fn sequence_index(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("index", &args, &kwargs, 1..=1, line)?;
    let items = receiver.sequence_items().unwrap_or_default();
    items.iter()
         .position(|item| values_equal(item, &args[0]))
         .map(|i| Value::Integer(usize_to_i64(i)))
         .ok_or_else(|| value_error(format!("{} is not in {}", args[0].repr(), receiver.type_name()), line))
}

fn sequence_count(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("count", &args, &kwargs, 1..=1, line)?;
    let items = receiver.sequence_items().unwrap_or_default();
    let n = items.iter().filter(|item| values_equal(item, &args[0])).count();
    Ok(Value::Integer(usize_to_i64(n)))
}

fn dict_keys(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("keys", &args, &kwargs, 0..=0, line)?;
    let keys = dict_of(receiver).map(|d| d.borrow().keys().map(|k| k.value().clone()).collect());
    Ok(Value::list(keys.unwrap_or_default()))
}

fn dict_values(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("values", &args, &kwargs, 0..=0, line)?;
    let values = dict_of(receiver).map(|d| d.borrow().values().cloned().collect());
    Ok(Value::list(values.unwrap_or_default()))
}

fn dict_items(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("items", &args, &kwargs, 0..=0, line)?;
    let items = dict_of(receiver).map(|d| {
                                     d.borrow()
                                      .iter()
                                      .map(|(k, v)| Value::tuple(vec![k.value().clone(), v.clone()]))
                                      .collect()
                                 });
    Ok(Value::list(items.unwrap_or_default()))
}

fn dict_get(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("get", &args, &kwargs, 1..=2, line)?;
    let key = HashKey::new(args[0].clone(), line)?;
    let found = dict_of(receiver).and_then(|d| d.borrow().get(&key).cloned());
    Ok(found.or_else(|| args.get(1).cloned()).unwrap_or_default())
}

fn dict_update(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_count("update", args.len(), 0..=1, line)?;
    let mut entries = match args.first() {
        Some(source) => dict_source(source, line)?,
        None => Vec::new(),
    };
    entries.extend(kwargs.into_iter().map(|(k, v)| (Value::string(k), v)));
    if let Some(dict) = dict_of(receiver) {
        let mut dict = dict.borrow_mut();
        for (k, v) in entries {
            dict.insert(HashKey::new(k, line)?, v);
        }
    }
    Ok(Value::None)
}

fn str_upper(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("upper", &args, &kwargs, 0..=0, line)?;
    Ok(Value::string(text_of(receiver).to_uppercase()))
}

fn str_lower(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("lower", &args, &kwargs, 0..=0, line)?;
    Ok(Value::string(text_of(receiver).to_lowercase()))
}

fn str_strip(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("strip", &args, &kwargs, 0..=1, line)?;
    let text = text_of(receiver);
    let stripped = match args.first() {
        None | Some(Value::None) => text.trim(),
        Some(chars) => {
            let chars = string_arg("strip", chars, line)?;
            text.trim_matches(|c| chars.contains(c))
        },
    };
    Ok(Value::string(stripped))
}

/// `str.split(sep=None, maxsplit=-1)`.
fn str_split(receiver: &Value, args: Vec<Value>, mut kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    let mut args = args.into_iter();
    let sep = args.next().or_else(|| kwargs.shift_remove("sep"));
    let maxsplit = args.next().or_else(|| kwargs.shift_remove("maxsplit"));
    check_args("split", &args.collect::<Vec<_>>(), &kwargs, 0..=0, line)?;

    let text = text_of(receiver);
    let limit = match maxsplit {
        Some(n) => usize::try_from(n.as_index(line)?).ok(),
        None => None,
    };
    let parts: Vec<String> = match sep {
        None | Some(Value::None) => match limit {
            Some(limit) => split_whitespace_n(text, limit),
            None => text.split_whitespace().map(str::to_string).collect(),
        },
        Some(sep) => {
            let sep = string_arg("split", &sep, line)?;
            if sep.is_empty() {
                return Err(value_error("empty separator", line));
            }
            match limit {
                Some(limit) => text.splitn(limit + 1, sep.as_str()).map(str::to_string).collect(),
                None => text.split(sep.as_str()).map(str::to_string).collect(),
            }
        },
    };
    Ok(Value::list(parts.into_iter().map(Value::string).collect()))
}

fn split_whitespace_n(text: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        if parts.len() == limit {
            parts.push(rest.to_string());
            break;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        parts.push(rest[..end].to_string());
        rest = rest[end..].trim_start();
    }
    parts
}

fn str_join(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("join", &args, &kwargs, 1..=1, line)?;
    let pieces = args[0].iterate(line)?
                        .iter()
                        .enumerate()
                        .map(|(i, item)| {
                            item.as_str().map(str::to_string).ok_or_else(|| {
                                RuntimeError::type_error(format!("sequence item {i}: expected str instance, {} found",
                                                                 item.type_name()),
                                                         line)
                            })
                        })
                        .collect::<EvalResult<Vec<_>>>()?;
    Ok(Value::string(pieces.join(text_of(receiver))))
}

fn str_replace(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("replace", &args, &kwargs, 2..=3, line)?;
    let old = string_arg("replace", &args[0], line)?;
    let new = string_arg("replace", &args[1], line)?;
    let text = text_of(receiver);
    let replaced = match args.get(2).map(|n| n.as_index(line)).transpose()? {
        Some(count) if count >= 0 => text.replacen(old.as_str(), &new, i64_to_usize_checked(count, line)?),
        _ => text.replace(old.as_str(), &new),
    };
    Ok(Value::string(replaced))
}

fn str_startswith(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("startswith", &args, &kwargs, 1..=1, line)?;
    affix_match("startswith", &args[0], line, |affix| text_of(receiver).starts_with(affix))
}

fn str_endswith(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    check_args("endswith", &args, &kwargs, 1..=1, line)?;
    affix_match("endswith", &args[0], line, |affix| text_of(receiver).ends_with(affix))
}

/// Matches a string or any string of a tuple.
fn affix_match(method: &str,
               affix: &Value,
               line: usize,
               test: impl Fn(&str) -> bool)
               -> EvalResult<Value> {
    let candidates = match affix {
        Value::Tuple(items) => items.as_ref().clone(),
        other => vec![other.clone()],
    };
    for candidate in &candidates {
        if test(&string_arg(method, candidate, line)?) {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

/// `str.format` with `{}`, `{0}` and `{name}` fields and `{{`/`}}` escapes.
fn str_format(receiver: &Value, args: Vec<Value>, kwargs: Kwargs, line: usize) -> EvalResult<Value> {
    let template = text_of(receiver);
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut next_auto = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            },
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            },
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => return Err(value_error("Single '{' encountered in format string", line)),
                    }
                }
                if field.contains(':') || field.contains('!') {
                    return Err(value_error(format!("Unsupported format field '{{{field}}}'"), line));
                }
                let value = if field.is_empty() {
                    next_auto += 1;
                    args.get(next_auto - 1)
                } else if let Ok(position) = field.parse::<usize>() {
                    args.get(position)
                } else {
                    kwargs.get(&field)
                };
                let value = value.ok_or_else(|| {
                                     RuntimeError::index_error(format!("Replacement field '{{{field}}}' has no argument"),
                                                               line)
                                 })?;
                out.push_str(&value.to_string());
            },
            '}' => return Err(value_error("Single '}' encountered in format string", line)),
            c => out.push(c),
        }
    }
    Ok(Value::string(out))
}

fn string_arg(method: &str, value: &Value, line: usize) -> EvalResult<String> {
    value.as_str().map(str::to_string).ok_or_else(|| {
                                          RuntimeError::type_error(format!("{method}() argument must be str, not '{}'",
                                                                           value.type_name()),
                                                                   line)
                                      })
}
