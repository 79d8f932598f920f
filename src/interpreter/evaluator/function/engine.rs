use std::rc::Rc;

use tracing::debug;

use crate::{
    ast::{Argument, ArgumentKind, Expr, ExprKind, ParameterKind},
    error::RuntimeError,
    interpreter::{
        evaluator::{
            core::{Context, ControlFlow, EvalResult},
            frame::BindType,
            function::callable::{DefaultArg, FunctionParam, UserFunction},
        },
        parser,
        value::{
            bridge::mapping_items,
            core::Value,
            host::HostObject,
        },
    },
    util::num::{f64_to_i64_checked, i64_to_usize_checked},
};

/// Name of the `n`-th anonymous argument of `eval()` and `func()`.
///
/// # Example
/// ```
/// use cadexpr::interpreter::evaluator::function::engine::argument_name;
///
/// assert_eq!(argument_name(1), "_1_");
/// ```
#[must_use]
pub fn argument_name(index: usize) -> String {
    format!("_{index}_")
}

/// Reads the command text of `eval()`/`func()`: a string, or a sequence of
/// strings run one after another.
fn commands(value: &Value, line: usize) -> EvalResult<Vec<String>> {
    if let Some(text) = value.as_str() {
        return Ok(vec![text.to_string()]);
    }
    value.iterate(line)?
         .iter()
         .map(|item| {
             item.as_str()
                 .map(str::to_string)
                 .ok_or_else(|| RuntimeError::type_error("Non string command in sequence", line))
         })
         .collect()
}

fn parse_commands(value: &Value, line: usize) -> EvalResult<Vec<Expr>> {
    let mut statements = Vec::new();
    for text in commands(value, line)? {
        statements.push(parser::parse(&text)?);
    }
    Ok(statements)
}

impl Context {
    /// Evaluates `eval(source, *extra, **named)`.
    ///
    /// Positional extras are bound as `_1_`, `_2_`, ... and named arguments
    /// by name, all local to a fresh frame the commands run in. A `return`
    /// ends evaluation early with its value; otherwise the value of the last
    /// command is the result.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// let v = evaluate_source(&mut ctx, "eval('_1_ * k', 6, k=7)").unwrap();
    /// assert_eq!(v.to_string(), "42");
    /// ```
    pub(crate) fn eval_source_function(&mut self, args: &[Argument], line: usize) -> EvalResult<Value> {
        let Some((source, rest)) = args.split_first() else {
            return Err(RuntimeError::runtime("Function requires at least one argument.", line));
        };
        if source.kind != ArgumentKind::Positional {
            return Err(RuntimeError::runtime("eval() expects the command as its first argument",
                                             line));
        }
        let statements = parse_commands(&self.eval(&source.value)?, line)?;
        let bindings = self.named_arguments(rest, line)?;

        self.with_frame(None, None, line, |ctx| {
                for (name, value) in bindings {
                    let binding = ctx.frames
                                     .get_var(&name, BindType::LocalOnly, None, line)?
                                     .ok_or_else(|| RuntimeError::runtime("No active frame", line))?;
                    binding.borrow_mut().value = value;
                }
                let mut result = Value::None;
                for statement in &statements {
                    let (value, flow) = ctx.execute(statement)?;
                    if flow == ControlFlow::Return {
                        return Ok(value);
                    }
                    result = Self::finish_block(value, flow, None, statement.line)?;
                }
                Ok(result)
            })
    }

    /// Evaluates trailing arguments into `(name, value)` pairs, naming
    /// positional ones `_1_`, `_2_`, ...
    fn named_arguments(&mut self, args: &[Argument], line: usize) -> EvalResult<Vec<(String, Value)>> {
        let mut bound = Vec::with_capacity(args.len());
        let mut index = 0;
        for arg in args {
            let value = self.eval(&arg.value)?;
            match &arg.kind {
                ArgumentKind::Positional => {
                    index += 1;
                    bound.push((argument_name(index), value));
                },
                ArgumentKind::Splat => {
                    for item in value.iterate(line)? {
                        index += 1;
                        bound.push((argument_name(index), item));
                    }
                },
                ArgumentKind::Keyword(name) => bound.push((name.clone(), value)),
                ArgumentKind::KwSplat => {
                    for (key, item) in mapping_items(&value, line)? {
                        let key = key.as_str()
                                     .ok_or_else(|| RuntimeError::type_error("Only accepts string as key.", line))?
                                     .to_string();
                        bound.push((key, item));
                    }
                },
            }
        }
        Ok(bound)
    }

    /// Builds the function of `func(source, ...)` or `func_d(source, ...)`.
    ///
    /// Every trailing argument declares a parameter with a default: the
    /// positional ones are named `_1_`, `_2_`, ... and keyword ones keep
    /// their name. `func` evaluates the defaults now; `func_d` keeps the
    /// default expressions and evaluates them on every call that omits
    /// the argument. Splatted arguments are always expanded now.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// let src = "f = func('a * _1_', 2, a=10)\n(f(), f(3), f(a=1))";
    /// assert_eq!(evaluate_source(&mut ctx, src).unwrap().to_string(), "(20, 30, 2)");
    /// ```
    pub(crate) fn build_function(&mut self,
                                 args: &[Argument],
                                 deferred: bool,
                                 line: usize)
                                 -> EvalResult<Value> {
        let Some((source, rest)) = args.split_first() else {
            return Err(RuntimeError::runtime("Function requires at least one argument.", line));
        };
        let statements = parse_commands(&self.eval(&source.value)?, line)?;
        let body = match <[Expr; 1]>::try_from(statements) {
            Ok([single]) => single,
            Err(statements) => Expr::new(ExprKind::Block(statements), line),
        };

        let mut params = Vec::with_capacity(rest.len());
        let mut index = 0;
        for arg in rest {
            let name = match &arg.kind {
                ArgumentKind::Positional => {
                    index += 1;
                    argument_name(index)
                },
                ArgumentKind::Keyword(name) => name.clone(),
                ArgumentKind::Splat => {
                    for value in self.eval(&arg.value)?.iterate(line)? {
                        index += 1;
                        params.push(FunctionParam { name:    argument_name(index),
                                                    kind:    ParameterKind::Plain,
                                                    default: Some(DefaultArg::Value(value)), });
                    }
                    continue;
                },
                ArgumentKind::KwSplat => {
                    let mapping = self.eval(&arg.value)?;
                    for (key, value) in mapping_items(&mapping, line)? {
                        let name = key.as_str()
                                      .ok_or_else(|| RuntimeError::type_error("Only accepts string as key.", line))?
                                      .to_string();
                        params.push(FunctionParam { name,
                                                    kind: ParameterKind::Plain,
                                                    default: Some(DefaultArg::Value(value)) });
                    }
                    continue;
                },
            };
            let default = if deferred {
                DefaultArg::Deferred(arg.value.clone())
            } else {
                DefaultArg::Value(self.eval(&arg.value)?)
            };
            params.push(FunctionParam { name,
                                        kind: ParameterKind::Plain,
                                        default: Some(default) });
        }

        let name = if deferred { "func_d" } else { "func" };
        debug!(function = name, params = params.len(), "function built from text");
        Ok(Value::Function(Rc::new(UserFunction { name: name.to_string(),
                                                  params,
                                                  body: Rc::new(body),
                                                  owner: self.scope_owner().as_ref().map(Rc::downgrade),
                                                  is_lambda: true })))
    }

    /// `import_py(name)`: the registered module `name`, if the sandbox
    /// allows it.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// assert_eq!(evaluate_source(&mut ctx, "import_py('math').floor(2.5)").unwrap().to_string(), "2");
    /// let err = evaluate_source(&mut ctx, "import_py('os')").unwrap_err();
    /// assert!(err.to_string().contains("Module 'os' access denied."));
    /// ```
    pub(crate) fn import_module_value(&mut self, name: &Value, line: usize) -> EvalResult<Value> {
        let Some(name) = name.as_str() else {
            return Err(RuntimeError::type_error("Function expects the first argument to be a string.",
                                                line));
        };
        let module = self.import_module(name, line)?;
        Ok(Value::Object(module as Rc<dyn HostObject>))
    }

    /// `pragma(setting[, n])` adjusts the innermost function frame, or the
    /// top-level frame outside functions.
    ///
    /// - `pragma('nowarn'[, code])` silences a warning code; `0` or no code
    ///   silences all.
    /// - `pragma('warn'[, code])` re-enables it.
    /// - `pragma('loop_check', n)` polls for cancellation every `n` loop
    ///   iterations; `0` stops polling.
    pub(crate) fn pragma(&mut self, values: &[Value], line: usize) -> EvalResult<Value> {
        let Some(setting) = values.first().and_then(Value::as_str) else {
            return Err(RuntimeError::type_error("Function expects the first argument to be a string.",
                                                line));
        };
        let argument = match values.get(1) {
            Some(v) if v.is_numeric() => Some(f64_to_i64_checked(v.as_real(line)?, line)?),
            Some(_) => {
                return Err(RuntimeError::type_error("Function expects the second argument to be an integer.",
                                                    line));
            },
            None => None,
        };
        let frame = self.frames
                        .settings_frame_mut()
                        .ok_or_else(|| RuntimeError::runtime("No active frame", line))?;
        match setting {
            "nowarn" | "warn" => {
                let code = u8::try_from(argument.unwrap_or(0)).map_err(|_| {
                               RuntimeError::runtime("Unknown warning code", line)
                           })?;
                frame.set_muted(code, setting == "nowarn");
            },
            "loop_check" => {
                let Some(n) = argument else {
                    return Err(RuntimeError::type_error("Function expects the second argument to be an integer.",
                                                        line));
                };
                frame.loop_check = i64_to_usize_checked(n, line)?;
            },
            other => {
                return Err(RuntimeError::runtime(format!("Unknown pragma '{other}'"), line));
            },
        }
        debug!(setting, ?argument, "pragma applied");
        Ok(Value::None)
    }
}
