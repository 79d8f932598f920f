use crate::{error::RuntimeError, interpreter::evaluator::core::EvalResult};

/// Largest integer value exactly representable as an `f64` (`2^53 - 1`).
pub const MAX_SAFE_U64_INT: u64 = 9_007_199_254_740_991;
/// Largest signed integer exactly representable as an `f64` (`2^53 - 1`).
pub const MAX_SAFE_I64_INT: i64 = 9_007_199_254_740_991;

/// Safely converts an `i64` to `f64` if and only if it is exactly
/// representable.
///
/// ## Errors
/// Returns `Err(error)` if the value exceeds `MAX_SAFE_U64_INT` in absolute
/// value.
///
/// ## Example
/// ```
/// use cadexpr::util::num::{MAX_SAFE_U64_INT, i64_to_f64_checked};
///
/// let result = i64_to_f64_checked(42, "too big!");
/// assert_eq!(result.unwrap(), 42.0);
///
/// let big = MAX_SAFE_U64_INT as i64 + 1;
/// assert!(i64_to_f64_checked(big, "too big!").is_err());
/// ```
#[allow(clippy::cast_precision_loss)]
pub fn i64_to_f64_checked<E>(value: i64, error: E) -> Result<f64, E> {
    if value.unsigned_abs() > MAX_SAFE_U64_INT {
        return Err(error);
    }
    Ok(value as f64)
}

/// Converts an `i64` to `f64`, accepting precision loss for huge magnitudes.
///
/// Used where a value only feeds floating-point arithmetic anyway.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub const fn i64_to_f64_lossy(value: i64) -> f64 {
    value as f64
}

/// Safely converts a `usize` to `f64` if and only if it is exactly
/// representable.
///
/// # Example
/// ```
/// use cadexpr::util::num::usize_to_f64_checked;
///
/// assert_eq!(usize_to_f64_checked(100, 0).unwrap(), 100.0);
/// ```
#[allow(clippy::cast_precision_loss)]
pub const fn usize_to_f64_checked(value: usize, line: usize) -> EvalResult<f64> {
    if value as u64 > MAX_SAFE_U64_INT {
        return Err(RuntimeError::Overflow { line });
    }
    Ok(value as f64)
}

/// Safely converts an `f64` to `i64` if the value is finite, within range, and
/// not fractional.
///
/// # Example
/// ```
/// use cadexpr::{error::RuntimeError, util::num::f64_to_i64_checked};
///
/// assert_eq!(f64_to_i64_checked(1000.0, 1).unwrap(), 1000);
///
/// let err = f64_to_i64_checked(1.5, 123).unwrap_err();
/// assert!(matches!(err, RuntimeError::TypeError { line: 123, .. }));
///
/// let err = f64_to_i64_checked(1e20, 5).unwrap_err();
/// assert!(matches!(err, RuntimeError::Overflow { line: 5 }));
/// ```
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_precision_loss)]
pub fn f64_to_i64_checked(value: f64, line: usize) -> EvalResult<i64> {
    if !value.is_finite() {
        return Err(RuntimeError::type_error(format!("Cannot convert non-finite value {value} to an integer"),
                                            line));
    }
    if value < i64::MIN as f64 || value > i64::MAX as f64 {
        return Err(RuntimeError::Overflow { line });
    }
    if value.fract() != 0.0 {
        return Err(RuntimeError::type_error(format!("Value {value} is fractional"), line));
    }
    Ok(value as i64)
}

/// Returns the integral value of `value` if it is integral and fits an `i64`
/// without loss.
///
/// # Example
/// ```
/// use cadexpr::util::num::as_exact_integer;
///
/// assert_eq!(as_exact_integer(4.0), Some(4));
/// assert_eq!(as_exact_integer(4.5), None);
/// ```
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn as_exact_integer(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_SAFE_I64_INT as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// Safely converts an `i64` to a `usize` if and only if it can be represented
/// exactly.
///
/// ## Example
/// ```
/// use cadexpr::{error::RuntimeError, util::num::i64_to_usize_checked};
///
/// assert_eq!(i64_to_usize_checked(42, 0).unwrap(), 42);
/// assert!(matches!(i64_to_usize_checked(-1, 5).unwrap_err(),
///                  RuntimeError::IndexError { line: 5, .. }));
/// ```
pub fn i64_to_usize_checked(value: i64, line: usize) -> EvalResult<usize> {
    if value < 0 {
        return Err(RuntimeError::index_error(format!("Negative value {value} is not a valid count"),
                                             line));
    }

    usize::try_from(value).map_or(Err(RuntimeError::Overflow { line }), Ok)
}

/// Converts a `usize` to `i64`, saturating at `i64::MAX`.
#[must_use]
pub fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Formats `value` with at most `digits` significant digits, dropping
/// trailing zeros.
///
/// This is the printing rule used for numeric literals so that a value
/// survives a textual round trip.
///
/// # Example
/// ```
/// use cadexpr::util::num::format_significant;
///
/// assert_eq!(format_significant(0.1 + 0.2, 16), "0.3");
/// assert_eq!(format_significant(1500.0, 16), "1500");
/// assert_eq!(format_significant(1.25e-7, 16), "1.25e-07");
/// ```
#[must_use]
pub fn format_significant(value: f64, digits: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return if value.is_nan() {
            "nan".to_string()
        } else if value > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }

    let digits = digits.max(1);
    let sci = format!("{:.*e}", digits - 1, value);
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let max_exp = i32::try_from(digits).unwrap_or(i32::MAX);

    if exponent < -5 || exponent >= max_exp {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs());
    }

    let decimals = usize::try_from(max_exp - 1 - exponent).unwrap_or(0);
    trim_fraction(&format!("{value:.decimals$}")).to_string()
}

/// Removes trailing zeros (and a dangling point) from a decimal string.
fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Formats a float the way it is shown to users: integral values keep a
/// trailing `.0`, very large or small magnitudes switch to exponent form.
///
/// # Example
/// ```
/// use cadexpr::util::num::format_real;
///
/// assert_eq!(format_real(1.0), "1.0");
/// assert_eq!(format_real(0.25), "0.25");
/// assert_eq!(format_real(1e20), "1e+20");
/// assert_eq!(format_real(1.5e-7), "1.5e-07");
/// ```
#[must_use]
pub fn format_real(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let sci = format!("{value:e}");
        let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs());
    }
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
