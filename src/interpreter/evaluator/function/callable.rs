use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::trace;

use crate::{
    ast::{Argument, ArgumentKind, Expr, Parameter, ParameterKind},
    document::DocumentObject,
    error::RuntimeError,
    interpreter::{
        evaluator::{
            core::{Context, ControlFlow, EvalResult},
            frame::BindType,
        },
        value::{
            bridge::mapping_items,
            core::Value,
            exception::ExceptionValue,
            host::Kwargs,
            key::HashKey,
        },
    },
};

/// The default of an optional parameter.
#[derive(Debug, Clone)]
pub enum DefaultArg {
    /// Evaluated when the function was created.
    Value(Value),
    /// Evaluated on every call that omits the argument (`func_d`).
    Deferred(Expr),
}

/// A declared parameter with its resolved default.
#[derive(Debug, Clone)]
pub struct FunctionParam {
    /// Parameter name.
    pub name:    String,
    /// Plain, `*args` or `**kwargs`.
    pub kind:    ParameterKind,
    /// Default for an optional plain parameter.
    pub default: Option<DefaultArg>,
}

/// A function defined by `def`, `lambda` or `func()`.
///
/// The body is shared with the tree it came from. Names inside the body
/// resolve against the frames of the caller chain and then against the
/// object that owned the defining expression.
#[derive(Debug)]
pub struct UserFunction {
    /// The function name; `<lambda>` for lambdas.
    pub name:      String,
    /// Declared parameters, in order.
    pub params:    Vec<FunctionParam>,
    /// The body statement or expression.
    pub body:      Rc<Expr>,
    /// The object whose expression defined the function.
    pub owner:     Option<Weak<DocumentObject>>,
    /// Whether the body is a bare expression whose value is returned.
    pub is_lambda: bool,
}

impl Context {
    /// Creates a function value, evaluating parameter defaults now.
    pub(crate) fn make_function(&mut self,
                                name: &str,
                                params: &[Parameter],
                                body: &Expr,
                                is_lambda: bool,
                                _line: usize)
                                -> EvalResult<UserFunction> {
        let mut resolved = Vec::with_capacity(params.len());
        for param in params {
            let default = match &param.default {
                Some(expr) => Some(DefaultArg::Value(self.eval(expr)?)),
                None => None,
            };
            resolved.push(FunctionParam { name: param.name.clone(),
                                          kind: param.kind,
                                          default });
        }
        Ok(UserFunction { name: name.to_string(),
                          params: resolved,
                          body: Rc::new(body.clone()),
                          owner: self.scope_owner().as_ref().map(Rc::downgrade),
                          is_lambda })
    }

    /// Evaluates a call of any callable value.
    ///
    /// # Parameters
    /// - `callee`: Expression producing the callable.
    /// - `args`: Argument expressions.
    /// - `line`: Line number for error reporting.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// let src = "def f(a, b=2, *rest, **named):\n    return (a, b, rest, named)\nf(1, 3, 4, k=5)";
    /// let v = evaluate_source(&mut ctx, src).unwrap();
    /// assert_eq!(v.to_string(), "(1, 3, (4,), {'k': 5})");
    ///
    /// let err = evaluate_source(&mut ctx, "def g(a):\n    return a\ng(1, 2)").unwrap_err();
    /// assert!(err.to_string().contains("Too many args when calling 'g'"));
    /// ```
    pub fn eval_call(&mut self, callee: &Expr, args: &[Argument], line: usize) -> EvalResult<Value> {
        let callee = self.eval(callee)?;
        let (positional, keywords) = self.evaluate_arguments(args, line)?;
        self.call_value(&callee, positional, keywords, line)
    }

    /// Evaluates call arguments, expanding `*seq` and `**mapping`.
    pub(crate) fn evaluate_arguments(&mut self,
                                     args: &[Argument],
                                     line: usize)
                                     -> EvalResult<(Vec<Value>, Kwargs)> {
        let mut positional = Vec::with_capacity(args.len());
        let mut keywords = Kwargs::new();
        for arg in args {
            let value = self.eval(&arg.value)?;
            match &arg.kind {
                ArgumentKind::Positional => positional.push(value),
                ArgumentKind::Splat => positional.extend(value.iterate(line)?),
                ArgumentKind::Keyword(name) => {
                    keywords.insert(name.clone(), value);
                },
                ArgumentKind::KwSplat => {
                    for (key, item) in mapping_items(&value, line)? {
                        let key = key.as_str()
                                     .ok_or_else(|| RuntimeError::type_error("Only accepts string as key.", line))?
                                     .to_string();
                        keywords.insert(key, item);
                    }
                },
            }
        }
        Ok((positional, keywords))
    }

    /// Invokes a callable value.
    ///
    /// Host callables pass the sandbox first. Every call fails while a
    /// [`CallDisabler`](crate::interpreter::evaluator::security::CallDisabler)
    /// is alive.
    pub fn call_value(&mut self,
                      callee: &Value,
                      args: Vec<Value>,
                      kwargs: Kwargs,
                      line: usize)
                      -> EvalResult<Value> {
        if self.calls_disabled() {
            return Err(RuntimeError::FunctionCallDisabled { details: "Function call is disabled".to_string(),
                                                            line });
        }
        match callee {
            Value::Function(function) => self.call_user_function(function, args, kwargs, line),
            Value::ExceptionType(kind) => {
                if !kwargs.is_empty() {
                    return Err(RuntimeError::type_error(format!("{kind}() takes no keyword arguments"),
                                                        line));
                }
                let message = args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                Ok(Value::Exception(Rc::new(ExceptionValue::new(*kind, message))))
            },
            Value::Object(object) if object.is_callable() => {
                self.security.check_callable(object.as_ref(), line)?;
                trace!(callable = object.type_name(), "calling host object");
                object.call(self, args, kwargs, line)
            },
            other => Err(RuntimeError::type_error(format!("'{}' object is not callable", other.type_name()),
                                                  line)),
        }
    }

    /// Runs a user function in a frame of its own.
    ///
    /// Parameters are bound fresh in the new frame; a `def` body that ends
    /// without `return` yields `None`, a lambda yields its body's value.
    pub(crate) fn call_user_function(&mut self,
                                     function: &Rc<UserFunction>,
                                     args: Vec<Value>,
                                     kwargs: Kwargs,
                                     line: usize)
                                     -> EvalResult<Value> {
        let name = function.name.clone();
        trace!(function = %name, "calling user function");
        self.with_frame(Some(name.clone()), function.owner.clone(), line, |ctx| {
                ctx.bind_parameters(function, args, kwargs, line)?;
                let (value, flow) = ctx.execute(&function.body)?;
                let value = Self::finish_block(value, flow, Some(&name), line)?;
                Ok(if function.is_lambda || flow == ControlFlow::Return {
                       value
                   } else {
                       Value::None
                   })
            })
    }

    fn bind_parameters(&mut self,
                       function: &UserFunction,
                       args: Vec<Value>,
                       kwargs: Kwargs,
                       line: usize)
                       -> EvalResult<()> {
        let name = &function.name;
        let mut bound: IndexMap<&str, Value> = IndexMap::new();
        let mut extra = Vec::new();
        let mut plain = function.params
                                .iter()
                                .filter(|p| p.kind == ParameterKind::Plain);
        for arg in args {
            match plain.next() {
                Some(param) => {
                    bound.insert(&param.name, arg);
                },
                None => extra.push(arg),
            }
        }

        let var_args = function.params.iter().find(|p| p.kind == ParameterKind::VarArgs);
        let kw_args = function.params.iter().find(|p| p.kind == ParameterKind::KwArgs);
        if !extra.is_empty() && var_args.is_none() {
            return Err(RuntimeError::type_error(format!("Too many args when calling '{name}'"), line));
        }

        let mut collected = IndexMap::new();
        for (key, value) in kwargs {
            let param = function.params
                                .iter()
                                .find(|p| p.kind == ParameterKind::Plain && p.name == key);
            match param {
                Some(param) if bound.contains_key(param.name.as_str()) => {
                    return Err(RuntimeError::type_error(format!("Multiple value of keyword arg '{key}' when calling '{name}'"),
                                                        line));
                },
                Some(param) => {
                    bound.insert(&param.name, value);
                },
                None if kw_args.is_some() => {
                    collected.insert(HashKey::from(key.as_str()), value);
                },
                None => {
                    return Err(RuntimeError::type_error(format!("Unknown keyword arg '{key}' when calling '{name}'"),
                                                        line));
                },
            }
        }

        for param in &function.params {
            let value = match param.kind {
                ParameterKind::VarArgs => Value::tuple(std::mem::take(&mut extra)),
                ParameterKind::KwArgs => Value::dict(std::mem::take(&mut collected)),
                ParameterKind::Plain => match bound.shift_remove(param.name.as_str()) {
                    Some(value) => value,
                    None => match &param.default {
                        Some(DefaultArg::Value(value)) => value.clone(),
                        Some(DefaultArg::Deferred(expr)) => self.eval(expr)?,
                        None => {
                            return Err(RuntimeError::type_error(format!("Missing arg '{}' when calling '{name}'",
                                                                        param.name),
                                                                line));
                        },
                    },
                },
            };
            let binding = self.frames
                              .get_var(&param.name, BindType::LocalOnly, None, line)?
                              .ok_or_else(|| RuntimeError::runtime("No active frame", line))?;
            binding.borrow_mut().value = value;
        }
        Ok(())
    }
}
