use std::f64::consts::{E, PI};

use crate::{
    error::RuntimeError,
    interpreter::{
        evaluator::{
            builtins::core::{check_args, value_error},
            core::{Context, EvalResult},
        },
        value::{
            core::Value,
            host::{HostModule, Kwargs},
        },
    },
    util::num::f64_to_i64_checked,
};

/// Creates the `math` module.
///
/// Functions take plain numbers (a quantity contributes its value) and
/// return floats; `floor` and `ceil` return integers.
///
/// # Example
/// ```
/// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
///
/// let mut ctx = Context::new();
/// let v = evaluate_source(&mut ctx, "import math\nmath.floor(math.degrees(math.pi))").unwrap();
/// assert_eq!(v.to_string(), "180");
/// ```
#[must_use]
pub fn math_module() -> HostModule {
    let module = HostModule::new("math");
    module.insert("pi", Value::Real(PI));
    module.insert("e", Value::Real(E));

    module.add_function("sqrt", |_, args, kwargs, line| {
              let x = unary("sqrt", &args, &kwargs, line)?;
              if x < 0.0 {
                  return Err(value_error("math domain error", line));
              }
              Ok(Value::Real(x.sqrt()))
          });
    module.add_function("sin", |_, args, kwargs, line| real(unary("sin", &args, &kwargs, line)?.sin()));
    module.add_function("cos", |_, args, kwargs, line| real(unary("cos", &args, &kwargs, line)?.cos()));
    module.add_function("tan", |_, args, kwargs, line| real(unary("tan", &args, &kwargs, line)?.tan()));
    module.add_function("fabs", |_, args, kwargs, line| real(unary("fabs", &args, &kwargs, line)?.abs()));
    module.add_function("radians", |_, args, kwargs, line| {
              real(unary("radians", &args, &kwargs, line)?.to_radians())
          });
    module.add_function("degrees", |_, args, kwargs, line| {
              real(unary("degrees", &args, &kwargs, line)?.to_degrees())
          });
    module.add_function("floor", |_, args, kwargs, line| {
              let x = unary("floor", &args, &kwargs, line)?;
              Ok(Value::Integer(f64_to_i64_checked(x.floor(), line)?))
          });
    module.add_function("ceil", |_, args, kwargs, line| {
              let x = unary("ceil", &args, &kwargs, line)?;
              Ok(Value::Integer(f64_to_i64_checked(x.ceil(), line)?))
          });
    module.add_function("hypot", hypot);
    module
}

#[allow(clippy::unnecessary_wraps)]
fn real(x: f64) -> EvalResult<Value> {
    Ok(Value::Real(x))
}

fn unary(name: &str,
         args: &[Value],
         kwargs: &Kwargs,
         line: usize)
         -> EvalResult<f64> {
    check_args(name, args, kwargs, 1..=1, line)?;
    args[0].as_real(line)
}

fn hypot(_: &mut Context,
         args: Vec<Value>,
         kwargs: Kwargs,
         line: usize)
         -> EvalResult<Value> {
    check_args("hypot", &args, &kwargs, 0..=usize::MAX, line)?;
    let sum = args.iter()
                  .try_fold(0.0, |acc, v| Ok::<_, RuntimeError>(acc + v.as_real(line)?.powi(2)))?;
    Ok(Value::Real(sum.sqrt()))
}
