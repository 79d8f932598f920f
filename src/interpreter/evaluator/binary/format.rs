use std::{iter::Peekable, str::Chars};

use crate::{
    error::RuntimeError,
    interpreter::{
        evaluator::core::{Context, EvalResult},
        value::{core::Value, key::HashKey},
    },
    util::num::f64_to_i64_checked,
};

#[derive(Debug, Default)]
struct Spec {
    left:      bool,
    zero:      bool,
    plus:      bool,
    space:     bool,
    width:     usize,
    precision: Option<usize>,
}

impl Context {
    /// Formats `template % args` the printf way.
    ///
    /// Supports `%s %r %d %i %f %F %e %E %g %G %x %X %o %%` with the `-`,
    /// `+`, space and `0` flags, a width and a precision. A tuple supplies
    /// one argument per conversion, any other value is the single argument;
    /// `%(name)s` looks `name` up in a dict argument.
    ///
    /// # Example
    /// ```
    /// use cadexpr::interpreter::{evaluator::core::Context, value::core::Value};
    ///
    /// let args = Value::tuple(vec![Value::from("x"), Value::Real(3.14159)]);
    /// let text = Context::eval_format(&Value::from("%s=%6.2f"), &args, 1).unwrap();
    /// assert_eq!(text.to_string(), "x=  3.14");
    /// ```
    pub fn eval_format(template: &Value, args: &Value, line: usize) -> EvalResult<Value> {
        let template = template.as_str().unwrap_or_default();
        let positional = match args {
            Value::Tuple(items) => items.as_ref().clone(),
            other => vec![other.clone()],
        };
        let mut next = positional.into_iter();
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            if chars.next_if_eq(&'%').is_some() {
                out.push('%');
                continue;
            }
            let key = mapping_key(&mut chars, line)?;
            let spec = parse_spec(&mut chars);
            let conversion = chars.next()
                                  .ok_or_else(|| RuntimeError::runtime("incomplete format", line))?;
            let value = match key {
                Some(key) => lookup(args, &key, line)?,
                None => next.next().ok_or_else(|| {
                                        RuntimeError::type_error("not enough arguments for format string",
                                                                 line)
                                    })?,
            };
            out.push_str(&convert(conversion, &spec, &value, line)?);
        }

        if next.next().is_some() && !matches!(args, Value::Dict(_)) {
            return Err(RuntimeError::type_error("not all arguments converted during string formatting",
                                                line));
        }
        Ok(Value::string(out))
    }
}

fn mapping_key(chars: &mut Peekable<Chars<'_>>, line: usize) -> EvalResult<Option<String>> {
    if chars.next_if_eq(&'(').is_none() {
        return Ok(None);
    }
    let mut key = String::new();
    for c in chars.by_ref() {
        if c == ')' {
            return Ok(Some(key));
        }
        key.push(c);
    }
    Err(RuntimeError::runtime("incomplete format key", line))
}

fn lookup(args: &Value, key: &str, line: usize) -> EvalResult<Value> {
    let Value::Dict(dict) = args else {
        return Err(RuntimeError::type_error("format requires a mapping", line));
    };
    dict.borrow()
        .get(&HashKey::from(key))
        .cloned()
        .ok_or_else(|| RuntimeError::KeyError { key: format!("'{key}'"),
                                                line })
}

fn parse_spec(chars: &mut Peekable<Chars<'_>>) -> Spec {
    let mut spec = Spec::default();
    while let Some(flag) = chars.next_if(|c| matches!(c, '-' | '+' | ' ' | '0' | '#')) {
        match flag {
            '-' => spec.left = true,
            '+' => spec.plus = true,
            ' ' => spec.space = true,
            '0' => spec.zero = true,
            _ => {},
        }
    }
    spec.width = digits(chars).unwrap_or(0);
    if chars.next_if_eq(&'.').is_some() {
        spec.precision = Some(digits(chars).unwrap_or(0));
    }
    spec
}

fn digits(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut n: Option<usize> = None;
    while let Some(d) = chars.next_if(char::is_ascii_digit) {
        let digit = d.to_digit(10).and_then(|d| usize::try_from(d).ok()).unwrap_or(0);
        n = Some(n.unwrap_or(0).saturating_mul(10).saturating_add(digit));
    }
    n
}

fn convert(conversion: char, spec: &Spec, value: &Value, line: usize) -> EvalResult<String> {
    let body = match conversion {
        's' => return Ok(pad(value.to_string(), spec, false)),
        'r' => return Ok(pad(value.repr(), spec, false)),
        'd' | 'i' => integer_of(value, conversion, line)?.to_string(),
        'x' => format!("{:x}", integer_of(value, conversion, line)?),
        'X' => format!("{:X}", integer_of(value, conversion, line)?),
        'o' => format!("{:o}", integer_of(value, conversion, line)?),
        'f' | 'F' => {
            let precision = spec.precision.unwrap_or(6);
            format!("{:.precision$}", real_of(value, conversion, line)?)
        },
        'e' | 'E' => {
            let text = exponent_format(real_of(value, conversion, line)?, spec.precision.unwrap_or(6));
            if conversion == 'E' { text.to_uppercase() } else { text }
        },
        'g' | 'G' => {
            let text = general_format(real_of(value, conversion, line)?, spec.precision.unwrap_or(6));
            if conversion == 'G' { text.to_uppercase() } else { text }
        },
        other => {
            return Err(RuntimeError::runtime(format!("unsupported format character '{other}'"),
                                             line));
        },
    };
    let signed = if body.starts_with('-') {
        body
    } else if spec.plus {
        format!("+{body}")
    } else if spec.space {
        format!(" {body}")
    } else {
        body
    };
    Ok(pad(signed, spec, true))
}

fn integer_of(value: &Value, conversion: char, line: usize) -> EvalResult<i64> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        _ => f64_to_i64_checked(real_of(value, conversion, line)?.trunc(), line),
    }
}

fn real_of(value: &Value, conversion: char, line: usize) -> EvalResult<f64> {
    value.as_real(line).map_err(|_| {
                           RuntimeError::type_error(format!("%{conversion} format: a number is required, not {}",
                                                            value.type_name()),
                                                    line)
                       })
}

fn pad(text: String, spec: &Spec, numeric: bool) -> String {
    let len = text.chars().count();
    if len >= spec.width {
        return text;
    }
    let fill = spec.width - len;
    if spec.left {
        format!("{text}{}", " ".repeat(fill))
    } else if spec.zero && numeric {
        let split = usize::from(text.starts_with(['-', '+', ' ']));
        format!("{}{}{}", &text[..split], "0".repeat(fill), &text[split..])
    } else {
        format!("{}{text}", " ".repeat(fill))
    }
}

/// `1.500000e+02` style: signed exponent with at least two digits.
fn exponent_format(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return non_finite(value);
    }
    let text = format!("{value:.precision$e}");
    let (mantissa, exponent) = text.split_once('e').unwrap_or((&text, "0"));
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

/// `%g`: the shorter of fixed and exponent notation, trailing zeros removed.
fn general_format(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return non_finite(value);
    }
    let precision = precision.max(1);
    let probe = format!("{value:.prec$e}", prec = precision - 1);
    let exponent = probe.split_once('e')
                        .and_then(|(_, e)| e.parse::<i64>().ok())
                        .unwrap_or(0);
    let limit = i64::try_from(precision).unwrap_or(i64::MAX);
    if (-4..limit).contains(&exponent) {
        let decimals = usize::try_from(limit - 1 - exponent).unwrap_or(0);
        strip_zeros(&format!("{value:.decimals$}"))
    } else {
        let text = exponent_format(value, precision - 1);
        match text.split_once('e') {
            Some((mantissa, exponent)) => format!("{}e{exponent}", strip_zeros(mantissa)),
            None => text,
        }
    }
}

fn strip_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

fn non_finite(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value > 0.0 {
        "inf".to_string()
    } else {
        "-inf".to_string()
    }
}
