use std::f64::consts::PI;

use crate::{
    error::RuntimeError,
    interpreter::{
        evaluator::{
            core::{Context, EvalResult},
            function::core::FunctionKind,
        },
        value::{
            bridge::{try_quantity, value_from_quantity},
            core::Value,
        },
    },
    quantity::{Quantity, Unit},
};

const ORDINALS: [&str; 3] = ["first", "second", "third"];

/// Reads argument `index` of a math function as a quantity.
///
/// # Parameters
/// - `values`: The evaluated arguments.
/// - `index`: Zero-based position.
/// - `line`: Line number for error reporting.
///
/// # Returns
/// The argument as a quantity; `None`, strings and containers fail with
/// "Invalid first argument." and the like.
fn argument(values: &[Value], index: usize, line: usize) -> EvalResult<Quantity> {
    let ordinal = ORDINALS.get(index).copied().unwrap_or("next");
    values.get(index)
          .and_then(try_quantity)
          .ok_or_else(|| RuntimeError::type_error(format!("Invalid {ordinal} argument."), line))
}

fn require_empty(q: &Quantity, line: usize) -> EvalResult<()> {
    if q.is_dimensionless() {
        Ok(())
    } else {
        Err(RuntimeError::unit_error("Unit must be empty.", line))
    }
}

fn require_equal(a: &Quantity, b: &Quantity, line: usize) -> EvalResult<()> {
    if a.unit() == b.unit() {
        Ok(())
    } else {
        Err(RuntimeError::unit_error("Units must be equal.", line))
    }
}

/// Applies a unitless real function, e.g. `exp` or `tanh`.
macro_rules! unitless {
    ($q:expr, $line:expr, $f:ident) => {{
        require_empty(&$q, $line)?;
        Quantity::dimensionless($q.value().$f())
    }};
}

/// Applies a real function keeping the argument's unit, e.g. `floor`.
macro_rules! keep_unit {
    ($q:expr, $f:ident) => {
        $q.map_value(f64::$f)
    };
}

impl Context {
    /// Evaluates a unit-aware math function of the catalog.
    ///
    /// Trigonometric functions read dimensionless arguments and angles as
    /// degrees; inverse functions return angles in degrees. Rounding
    /// functions and `abs` keep the argument's unit.
    ///
    /// # Parameters
    /// - `kind`: The function; must satisfy
    ///   [`FunctionKind::is_pure_math`].
    /// - `values`: The evaluated arguments, already arity-checked.
    /// - `line`: Line number for error reporting.
    ///
    /// # Returns
    /// The result, an integer or float when dimensionless.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// assert_eq!(evaluate_source(&mut ctx, "round(sin(30 deg) * 10)").unwrap().to_string(), "5");
    /// assert_eq!(evaluate_source(&mut ctx, "atan2(1 mm, 1 mm)").unwrap().to_string(), "45 deg");
    /// assert_eq!(evaluate_source(&mut ctx, "hypot(3 mm, 4 mm)").unwrap().to_string(), "5 mm");
    ///
    /// let err = evaluate_source(&mut ctx, "exp(2 mm)").unwrap_err();
    /// assert!(err.to_string().contains("Unit must be empty."));
    /// ```
    pub(crate) fn eval_math(kind: FunctionKind, values: &[Value], line: usize) -> EvalResult<Value> {
        let x = argument(values, 0, line)?;
        let result = match kind {
            FunctionKind::Sin | FunctionKind::Cos | FunctionKind::Tan => {
                if !(x.is_dimensionless() || x.unit() == Unit::ANGLE) {
                    return Err(RuntimeError::unit_error("Unit must be either empty or an angle.",
                                                        line));
                }
                let radians = x.value() * PI / 180.0;
                Quantity::dimensionless(match kind {
                                            FunctionKind::Sin => radians.sin(),
                                            FunctionKind::Cos => radians.cos(),
                                            _ => radians.tan(),
                                        })
            },
            FunctionKind::Asin | FunctionKind::Acos | FunctionKind::Atan => {
                require_empty(&x, line)?;
                let radians = match kind {
                    FunctionKind::Asin => x.value().asin(),
                    FunctionKind::Acos => x.value().acos(),
                    _ => x.value().atan(),
                };
                Quantity::new(radians * 180.0 / PI, Unit::ANGLE)
            },
            FunctionKind::Exp => unitless!(x, line, exp),
            FunctionKind::Log => unitless!(x, line, ln),
            FunctionKind::Log10 => unitless!(x, line, log10),
            FunctionKind::Sinh => unitless!(x, line, sinh),
            FunctionKind::Cosh => unitless!(x, line, cosh),
            FunctionKind::Tanh => unitless!(x, line, tanh),
            FunctionKind::Abs => keep_unit!(x, abs),
            FunctionKind::Round => keep_unit!(x, round),
            FunctionKind::Trunc => keep_unit!(x, trunc),
            FunctionKind::Ceil => keep_unit!(x, ceil),
            FunctionKind::Floor => keep_unit!(x, floor),
            FunctionKind::Sqrt => x.checked_sqrt().map_err(|e| e.at(line))?,
            FunctionKind::Atan2 => {
                let y = argument(values, 1, line)?;
                require_equal(&x, &y, line)?;
                Quantity::new(x.value().atan2(y.value()) * 180.0 / PI, Unit::ANGLE)
            },
            FunctionKind::Mod => {
                let y = argument(values, 1, line)?;
                x.checked_rem(&y).map_err(|e| e.at(line))?
            },
            FunctionKind::Pow => {
                let y = argument(values, 1, line)?;
                x.checked_pow(&y).map_err(|e| e.at(line))?
            },
            FunctionKind::Hypot | FunctionKind::Cath => Self::hypot_cath(kind, x, values, line)?,
            other => {
                return Err(RuntimeError::runtime(format!("Unknown function: {}", other.name()),
                                                 line));
            },
        };
        Ok(value_from_quantity(result))
    }

    fn hypot_cath(kind: FunctionKind,
                  x: Quantity,
                  values: &[Value],
                  line: usize)
                  -> EvalResult<Quantity> {
        let y = argument(values, 1, line)?;
        require_equal(&x, &y, line)?;
        let z = if values.len() > 2 {
            let z = argument(values, 2, line)?;
            require_equal(&y, &z, line)?;
            z.value()
        } else {
            0.0
        };
        let squares = if kind == FunctionKind::Cath {
            x.value().powi(2) - y.value().powi(2) - z.powi(2)
        } else {
            x.value().powi(2) + y.value().powi(2) + z.powi(2)
        };
        Ok(Quantity::new(squares.sqrt(), x.unit()))
    }
}

