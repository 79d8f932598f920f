use std::rc::Rc;

use tracing::debug;

use crate::{
    ast::{ExceptHandler, Expr, ExprKind, ImportItem, JumpKind},
    error::RuntimeError,
    identifier::ObjectIdentifier,
    interpreter::{
        evaluator::{
            component::Access,
            core::{Context, ControlFlow, EvalResult},
            frame::BindType,
        },
        value::{
            core::Value,
            exception::{ExceptionKind, ExceptionValue},
            host::{HostModule, HostObject},
        },
    },
};

impl Context {
    /// Executes a statement node.
    ///
    /// Sequences stop at the first statement reporting a jump and pass the
    /// jump up unchanged; loops absorb `break` and `continue`; `try`
    /// intercepts errors. Nodes that are not statements are evaluated.
    ///
    /// # Returns
    /// The value of the last executed statement and how control left.
    pub fn exec_statement(&mut self, expr: &Expr) -> EvalResult<(Value, ControlFlow)> {
        let line = expr.line;
        match &expr.kind {
            ExprKind::Simple(statements) | ExprKind::Block(statements) => {
                let mut last = Value::None;
                for statement in statements {
                    let (value, flow) = self.execute(statement)?;
                    if flow != ControlFlow::None {
                        return Ok((value, flow));
                    }
                    last = value;
                }
                Ok((last, ControlFlow::None))
            },
            ExprKind::If { branches, else_body } => {
                for (condition, body) in branches {
                    if self.eval(condition)?.truthy() {
                        return self.execute(body);
                    }
                }
                match else_body {
                    Some(body) => self.execute(body),
                    None => Ok((Value::None, ControlFlow::None)),
                }
            },
            ExprKind::While { condition,
                              body,
                              else_body, } => {
                self.exec_while(condition, body, else_body.as_deref(), line)
            },
            ExprKind::For { targets,
                            catch_all,
                            iter,
                            body,
                            else_body, } => {
                self.exec_for(targets, *catch_all, iter, body, else_body.as_deref(), line)
            },
            ExprKind::Try { body,
                            handlers,
                            else_body,
                            finally_body, } => {
                self.exec_try(body, handlers, else_body.as_deref(), finally_body.as_deref())
            },
            ExprKind::Jump { kind, value } => self.exec_jump(*kind, value.as_deref(), line),
            ExprKind::FunctionDef { name, params, body } => {
                let function = Value::Function(Rc::new(self.make_function(name, params, body, false, line)?));
                self.bind_local(name, function.clone(), line)?;
                Ok((function, ControlFlow::None))
            },
            ExprKind::Pass => Ok((Value::None, ControlFlow::None)),
            ExprKind::Del(targets) => {
                for target in targets {
                    self.delete(target)?;
                }
                Ok((Value::None, ControlFlow::None))
            },
            ExprKind::Scope { global, names } => {
                let bind = if *global { BindType::Global } else { BindType::NonLocal };
                for name in names {
                    self.frames.get_var(name, bind, None, line)?;
                }
                Ok((Value::None, ControlFlow::None))
            },
            ExprKind::Import(items) => {
                for item in items {
                    self.exec_import(item, line)?;
                }
                Ok((Value::None, ControlFlow::None))
            },
            ExprKind::From { module, names } => {
                self.exec_from(module, names, line)?;
                Ok((Value::None, ControlFlow::None))
            },
            _ => Ok((self.eval(expr)?, ControlFlow::None)),
        }
    }

    fn exec_while(&mut self,
                  condition: &Expr,
                  body: &Expr,
                  else_body: Option<&Expr>,
                  line: usize)
                  -> EvalResult<(Value, ControlFlow)> {
        let mut iteration = 0usize;
        while self.eval(condition)?.truthy() {
            iteration += 1;
            self.poll_cancel(iteration, line)?;
            match self.execute(body)? {
                (_, ControlFlow::Break) => return Ok((Value::None, ControlFlow::None)),
                (value, ControlFlow::Return) => return Ok((value, ControlFlow::Return)),
                _ => {},
            }
        }
        match else_body {
            Some(else_body) => self.execute(else_body),
            None => Ok((Value::None, ControlFlow::None)),
        }
    }

    /// Executes `try`/`except`/`else`/`finally`.
    ///
    /// The first handler whose type matches catches the error, with the
    /// exception bound to its name and remembered for a bare `raise`. The
    /// `finally` body runs exactly once on every path; a jump it reports
    /// replaces the pending outcome.
    fn exec_try(&mut self,
                body: &Expr,
                handlers: &[ExceptHandler],
                else_body: Option<&Expr>,
                finally_body: Option<&Expr>)
                -> EvalResult<(Value, ControlFlow)> {
        let outcome = match self.execute(body) {
            Ok((value, ControlFlow::None)) => match else_body {
                Some(else_body) => self.execute(else_body),
                None => Ok((value, ControlFlow::None)),
            },
            Ok(jump) => Ok(jump),
            Err(err) => self.handle(handlers, err),
        };

        if let Some(finally_body) = finally_body {
            let (value, flow) = self.execute(finally_body)?;
            if flow != ControlFlow::None {
                return Ok((value, flow));
            }
        }
        outcome
    }

    fn handle(&mut self,
              handlers: &[ExceptHandler],
              err: RuntimeError)
              -> EvalResult<(Value, ControlFlow)> {
        let Some(kind) = err.exception_kind() else {
            return Err(err);
        };
        for handler in handlers {
            if !self.handler_matches(handler, kind)? {
                continue;
            }
            debug!(exception = kind.name(), "exception caught");
            if let Some(name) = &handler.name {
                let exception = err.to_exception()
                                   .unwrap_or_else(|| Rc::new(ExceptionValue::new(kind, err.message())));
                self.bind_local(name, Value::Exception(exception), handler.body.line)?;
            }
            let previous = self.frames
                               .current_mut()
                               .and_then(|f| f.exception.replace(err.clone()));
            let result = self.execute(&handler.body);
            if let Some(frame) = self.frames.current_mut() {
                frame.exception = previous;
            }
            return result;
        }
        Err(err)
    }

    fn handler_matches(&mut self, handler: &ExceptHandler, kind: ExceptionKind) -> EvalResult<bool> {
        let Some(types) = &handler.types else {
            return Ok(true);
        };
        let line = types.line;
        let matches = |value: &Value| match value {
            Value::ExceptionType(base) => Ok(kind.is_subclass_of(*base)),
            _ => {
                Err(RuntimeError::type_error("catching classes that do not inherit from BaseException is not allowed",
                                             line))
            },
        };
        match self.eval(types)? {
            Value::Tuple(items) => {
                for item in items.iter() {
                    if matches(item)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            },
            single => matches(&single),
        }
    }

    fn exec_jump(&mut self,
                 kind: JumpKind,
                 value: Option<&Expr>,
                 line: usize)
                 -> EvalResult<(Value, ControlFlow)> {
        match kind {
            JumpKind::Return => {
                let value = value.map(|v| self.eval(v)).transpose()?.unwrap_or_default();
                Ok((value, ControlFlow::Return))
            },
            JumpKind::Break => Ok((Value::None, ControlFlow::Break)),
            JumpKind::Continue => Ok((Value::None, ControlFlow::Continue)),
            JumpKind::Raise => Err(self.raise(value, line)?),
        }
    }

    /// Builds the error a `raise` statement throws.
    ///
    /// A bare `raise` re-throws the exception being handled in the nearest
    /// frame that has one.
    fn raise(&mut self, value: Option<&Expr>, line: usize) -> EvalResult<RuntimeError> {
        let Some(value) = value else {
            return self.frames
                       .current()
                       .and_then(|f| f.exception.clone())
                       .ok_or_else(|| RuntimeError::runtime("No current exception", line));
        };
        let exception = match self.eval(value)? {
            Value::Exception(exception) => exception,
            Value::ExceptionType(kind) => Rc::new(ExceptionValue::new(kind, "")),
            other => {
                return Err(RuntimeError::type_error(format!("exceptions must derive from BaseException, not '{}'",
                                                            other.type_name()),
                                                    line));
            },
        };
        Ok(RuntimeError::Raised { exception,
                                  line })
    }

    /// Binds `name` in the current frame.
    pub(crate) fn bind_local(&mut self, name: &str, value: Value, line: usize) -> EvalResult<()> {
        let binding = self.frames
                          .get_var(name, BindType::Local, None, line)?
                          .ok_or_else(|| RuntimeError::runtime("No active frame", line))?;
        binding.borrow_mut().value = value;
        Ok(())
    }

    fn delete(&mut self, target: &Expr) -> EvalResult<()> {
        let line = target.line;
        if let ExprKind::Variable(id) = &target.kind {
            if target.components.is_empty() {
                if let Some(name) = id.as_simple_name() {
                    return self.frames.erase(name, line);
                }
                let Some((last, prefix)) = id.components.split_last() else {
                    return Err(RuntimeError::runtime(format!("Cannot delete '{id}'"), line));
                };
                let container_id = ObjectIdentifier { components: prefix.to_vec(),
                                                      ..id.clone() };
                let container = self.eval_variable(&container_id, line)?;
                return Self::delete_access(&container, &Access::from_path(last), line);
            }
        }
        let Some((last, prefix)) = target.components.split_last() else {
            return Err(RuntimeError::runtime(format!("Cannot delete '{}'",
                                                     target.render(false, false, 0)),
                                             line));
        };
        let base = self.eval_kind(target)?;
        let container = self.apply_components(base, prefix, line)?;
        let access = self.eval_access(last, line)?;
        Self::delete_access(&container, &access, line)
    }

    /// Looks a module up in the import registry, subject to the sandbox.
    pub(crate) fn import_module(&mut self, name: &str, line: usize) -> EvalResult<Rc<HostModule>> {
        let known = self.modules.get(name).cloned();
        self.security.check_module(name, known.is_some(), line)?;
        known.ok_or_else(|| RuntimeError::runtime(format!("Module '{name}' not found."), line))
    }

    fn exec_import(&mut self, item: &ImportItem, line: usize) -> EvalResult<()> {
        let module = self.import_module(&item.name, line)?;
        let (name, bound) = match &item.alias {
            Some(alias) => (alias.as_str(), module),
            None => {
                let top = item.name.split('.').next().unwrap_or(&item.name);
                let bound = self.modules.get(top).cloned().unwrap_or(module);
                (top, bound)
            },
        };
        debug!(module = %item.name, name, "module imported");
        self.bind_local(name, Value::Object(bound as Rc<dyn HostObject>), line)
    }

    fn exec_from(&mut self, module: &str, names: &[ImportItem], line: usize) -> EvalResult<()> {
        let module = self.import_module(module, line)?;
        for item in names {
            if item.name == "*" {
                for name in module.public_names() {
                    if let Some(member) = module.member(&name) {
                        self.bind_local(&name, member, line)?;
                    }
                }
                continue;
            }
            let member = module.member(&item.name).ok_or_else(|| {
                                                      RuntimeError::runtime(format!("cannot import name '{}' from '{}'",
                                                                                    item.name,
                                                                                    module.name()),
                                                                            line)
                                                  })?;
            self.bind_local(item.alias.as_deref().unwrap_or(&item.name), member, line)?;
        }
        Ok(())
    }
}
