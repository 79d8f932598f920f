use std::rc::Rc;

use crate::{
    ast::{BinaryOperator, Expr, ExprKind, Item},
    error::RuntimeError,
    identifier::ObjectIdentifier,
    interpreter::{
        evaluator::{
            component::Access,
            core::{Context, EvalResult},
            frame::{BindType, WARN_PROPERTY_WRITE},
        },
        value::{core::Value, host::HostObject},
    },
};

impl Context {
    /// Evaluates an assignment and returns the assigned value.
    ///
    /// A compound assignment reads its single target, applies the operator
    /// and writes the result back; `+=` on a list extends it in place. With
    /// several targets, or a `*` target, the value is unpacked.
    ///
    /// # Parameters
    /// - `targets`: Assignment targets.
    /// - `catch_all`: Index of the `*` target.
    /// - `op`: Operator of a compound assignment.
    /// - `values`: Right-hand side expressions; several form a tuple.
    /// - `line`: Line number for error reporting.
    pub fn eval_assignment(&mut self,
                           targets: &[Expr],
                           catch_all: Option<usize>,
                           op: Option<BinaryOperator>,
                           values: &[Expr],
                           line: usize)
                           -> EvalResult<Value> {
        let value = match values {
            [single] => self.eval(single)?,
            many => {
                let items = many.iter()
                                .map(|v| self.eval(v))
                                .collect::<EvalResult<Vec<_>>>()?;
                Value::tuple(items)
            },
        };

        if let Some(op) = op {
            let [target] = targets else {
                return Err(RuntimeError::runtime("Compound assignment requires a single target",
                                                 line));
            };
            let current = self.eval(target)?;
            let updated = match (&current, &value) {
                // While calls are disabled the list may belong to a host
                // property, so the write below must fail before any change.
                (Value::List(list), _) if op == BinaryOperator::Add && !self.calls_disabled() => {
                    let extra = value.iterate(line)?;
                    list.borrow_mut().extend(extra);
                    current.clone()
                },
                _ => Self::eval_binary(op, &current, &value, line)?,
            };
            self.assign(target, updated.clone(), line)?;
            return Ok(updated);
        }

        match (targets, catch_all) {
            ([target], None) => self.assign(target, value.clone(), line)?,
            _ => self.unpack(targets, catch_all, value.clone(), line)?,
        }
        Ok(value)
    }

    /// Writes `value` to one target expression.
    ///
    /// A bare name binds in the current frame. A path whose first name is
    /// bound in a frame updates that variable's value. Any other path writes
    /// to the host property it resolves to.
    pub fn assign(&mut self, target: &Expr, value: Value, line: usize) -> EvalResult<()> {
        match &target.kind {
            ExprKind::Variable(id) => {
                let extra = target.components
                                  .iter()
                                  .map(|c| self.eval_access(c, line))
                                  .collect::<EvalResult<Vec<_>>>()?;
                self.assign_identifier(id, extra, value, line)
            },
            ExprKind::Tuple(items) | ExprKind::List(items) if target.components.is_empty() => {
                let catch_all = items.iter().position(|item| item.splat);
                let targets = items.iter().map(|Item { expr, .. }| expr.clone()).collect::<Vec<_>>();
                self.unpack(&targets, catch_all, value, line)
            },
            _ if !target.components.is_empty() => {
                let container = self.eval_kind(target)?;
                let path = target.components
                                 .iter()
                                 .map(|c| self.eval_access(c, line))
                                 .collect::<EvalResult<Vec<_>>>()?;
                self.set_path(container, &path, value, line).map(|_| ())
            },
            _ => Err(RuntimeError::runtime(format!("Cannot assign to '{}'",
                                                   target.render(false, false, 0)),
                                           line)),
        }
    }

    fn assign_identifier(&mut self,
                         id: &ObjectIdentifier,
                         extra: Vec<Access>,
                         value: Value,
                         line: usize)
                         -> EvalResult<()> {
        if extra.is_empty()
           && let Some(name) = id.as_simple_name()
        {
            let binding = self.frames
                              .get_var(name, BindType::Local, None, line)?
                              .ok_or_else(|| RuntimeError::runtime("No active frame", line))?;
            binding.borrow_mut().value = value;
            return Ok(());
        }

        if !id.is_qualified()
           && !id.local_property
           && let Some(name) = id.first_name()
           && let Some(binding) = self.frames.lookup(name)
        {
            let path = id.components[1..].iter()
                                         .map(Access::from_path)
                                         .chain(extra)
                                         .collect::<Vec<_>>();
            let root = binding.borrow().value.clone();
            let updated = self.set_path(root, &path, value, line)?;
            binding.borrow_mut().value = updated;
            return Ok(());
        }

        let owner = self.scope_owner();
        let Some(resolved) = id.resolve(owner.as_ref()) else {
            return Err(match id.first_name() {
                           Some(name) if !id.is_qualified() && !id.local_property => {
                               RuntimeError::UnknownVariable { name: name.to_string(),
                                                               line }
                           },
                           _ => RuntimeError::NameError { details: format!("Cannot resolve '{id}'"),
                                                          line },
                       });
        };

        self.check_host_write(line)?;
        let mut path = id.components[resolved.rest..].iter()
                                                     .map(Access::from_path)
                                                     .chain(extra)
                                                     .collect::<Vec<_>>();
        let object = Value::Object(Rc::clone(&resolved.object) as Rc<dyn HostObject>);
        match resolved.property {
            Some(property) => {
                path.insert(0, Access::Attribute(property));
                self.set_path(object, &path, value, line)?;
            },
            None if !path.is_empty() => {
                self.set_path(object, &path, value, line)?;
            },
            None => {
                return Err(RuntimeError::runtime(format!("Cannot assign to object '{id}'"), line));
            },
        }
        Ok(())
    }

    fn check_host_write(&mut self, line: usize) -> EvalResult<()> {
        if self.calls_disabled() {
            return Err(RuntimeError::FunctionCallDisabled { details: "Property assignment is disabled".to_string(),
                                                            line });
        }
        self.warn_property(WARN_PROPERTY_WRITE, line);
        Ok(())
    }

    /// Distributes the items of `value` over `targets`.
    ///
    /// The `*` target, when present, receives a list of the items the other
    /// targets leave over.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// let v = evaluate_source(&mut ctx, "a, *b, c = [1, 2, 3, 4]\n(a, b, c)").unwrap();
    /// assert_eq!(v.to_string(), "(1, [2, 3], 4)");
    ///
    /// let err = evaluate_source(&mut ctx, "a, b = 1, 2, 3").unwrap_err();
    /// assert!(err.to_string().contains("too many values to unpack (expected 2)"));
    /// ```
    pub fn unpack(&mut self,
                  targets: &[Expr],
                  catch_all: Option<usize>,
                  value: Value,
                  line: usize)
                  -> EvalResult<()> {
        let mut items = value.iterate(line)?;
        let expected = targets.len();

        let Some(star) = catch_all else {
            if items.len() > expected {
                return Err(RuntimeError::runtime(format!("too many values to unpack (expected {expected})"),
                                                 line));
            }
            if items.len() < expected {
                return Err(RuntimeError::runtime(format!("not enough values to unpack (expected {expected}, got {})",
                                                         items.len()),
                                                 line));
            }
            for (target, item) in targets.iter().zip(items) {
                self.assign(target, item, line)?;
            }
            return Ok(());
        };

        let fixed = expected.saturating_sub(1);
        if items.len() < fixed {
            return Err(RuntimeError::runtime(format!("not enough values to unpack (expected at least {fixed}, got {})",
                                                     items.len()),
                                             line));
        }
        let tail = items.split_off(items.len() - (fixed - star));
        let middle = items.split_off(star);
        for (target, item) in targets[..star].iter().zip(items) {
            self.assign(target, item, line)?;
        }
        self.assign(&targets[star], Value::list(middle), line)?;
        for (target, item) in targets[star + 1..].iter().zip(tail) {
            self.assign(target, item, line)?;
        }
        Ok(())
    }
}
