use std::rc::Rc;

use tracing::warn;

use crate::{
    document::{DocumentObject, cell::expand_range},
    error::RuntimeError,
    identifier::{ObjectIdentifier, PathComponent},
    interpreter::{
        evaluator::{
            component::Access,
            core::{Context, EvalResult},
            frame::{WARN_PROPERTY_READ, WARN_PROPERTY_WRITE},
        },
        value::{core::Value, host::HostObject},
    },
    quantity::Quantity,
};

impl Context {
    /// Reads an identifier.
    ///
    /// Unqualified paths look in the call frames first, so variables shadow
    /// properties. What is left is resolved against the owner object and its
    /// document. A single unresolved name is then tried as a unit symbol
    /// (`mm` reads as one millimetre), a built-in, and a registered module.
    ///
    /// # Parameters
    /// - `id`: The identifier to read.
    /// - `line`: Line number for error reporting.
    ///
    /// # Returns
    /// The value at the end of the path.
    ///
    /// # Example
    /// ```
    /// use cadexpr::{evaluate_source, interpreter::evaluator::core::Context};
    ///
    /// let mut ctx = Context::new();
    /// assert_eq!(evaluate_source(&mut ctx, "2 * cm").unwrap().to_string(), "20 mm");
    /// assert!(evaluate_source(&mut ctx, "nothing_here").is_err());
    /// ```
    pub fn eval_variable(&mut self, id: &ObjectIdentifier, line: usize) -> EvalResult<Value> {
        if !id.is_qualified()
           && !id.local_property
           && let Some(name) = id.first_name()
           && let Some(value) = self.frames.read(name)
        {
            return Self::follow_path(value, &id.components[1..], line);
        }

        let owner = self.scope_owner();
        if let Some(resolved) = id.resolve(owner.as_ref()) {
            let value = match &resolved.property {
                Some(property) => {
                    self.warn_property(WARN_PROPERTY_READ, line);
                    resolved.object
                            .get_attr(property, line)?
                            .ok_or_else(|| cannot_resolve(id, line))?
                },
                None => Value::Object(resolved.object as Rc<dyn HostObject>),
            };
            return Self::follow_path(value, &id.components[resolved.rest..], line);
        }

        if id.is_qualified() || id.local_property {
            return Err(cannot_resolve(id, line));
        }
        let Some(name) = id.first_name() else {
            return Err(cannot_resolve(id, line));
        };
        if id.components.len() == 1
           && let Some(unit) = Quantity::from_symbol(name)
        {
            return Ok(Value::Quantity(unit));
        }
        let fallback = self.builtins
                           .get(name)
                           .cloned()
                           .or_else(|| {
                               self.modules
                                   .get(name)
                                   .map(|m| Value::Object(Rc::clone(m) as Rc<dyn HostObject>))
                           });
        match fallback {
            Some(value) => Self::follow_path(value, &id.components[1..], line),
            None => Err(RuntimeError::UnknownVariable { name: name.to_string(),
                                                        line }),
        }
    }

    fn follow_path(value: Value, path: &[PathComponent], line: usize) -> EvalResult<Value> {
        path.iter().try_fold(value, |current, component| {
                       Self::get_access(&current, &Access::from_path(component), line)
                   })
    }

    /// The object names resolve against: the owner of the running function,
    /// else the owner of the evaluated expression.
    pub(crate) fn scope_owner(&self) -> Option<Rc<DocumentObject>> {
        self.frames
            .function_frame()
            .and_then(|f| f.owner())
            .or_else(|| self.owner.clone())
    }

    /// Evaluates a cell range such as `A1:B3` to a tuple of cell values.
    ///
    /// Cells are read row by row from the owner; an end point may be an
    /// alias. Empty cells read as `None`.
    pub fn eval_range(&mut self, begin: &str, end: &str, line: usize) -> EvalResult<Value> {
        let owner = self.scope_owner()
                        .ok_or_else(|| RuntimeError::runtime("Range expression requires an owner", line))?;
        let cells = expand_range(begin, end, |alias| owner.alias_target(alias)).ok_or_else(|| {
                        RuntimeError::runtime(format!("Invalid cell range '{begin}:{end}'"), line)
                    })?;
        self.warn_property(WARN_PROPERTY_READ, line);
        let values = cells.iter()
                          .map(|cell| owner.get_property_by_name(&cell.to_string()).unwrap_or_default())
                          .collect();
        Ok(Value::tuple(values))
    }

    /// Emits a dependency-tracking warning once per function and code.
    ///
    /// Only property accesses inside a function body warn: those never
    /// become recompute dependencies.
    pub(crate) fn warn_property(&mut self, code: u8, line: usize) {
        if !self.config.warnings {
            return;
        }
        let Some(frame) = self.frames.function_frame() else {
            return;
        };
        if frame.is_muted(code) {
            return;
        }
        let function = frame.name().unwrap_or_default().to_string();
        if !self.warned.insert((function.clone(), code)) {
            return;
        }
        match code {
            WARN_PROPERTY_WRITE => {
                warn!(function = %function, line, "property assigned inside a function body");
            },
            _ => {
                warn!(function = %function,
                      line,
                      "property read inside a function body is not tracked as a dependency");
            },
        }
    }
}

fn cannot_resolve(id: &ObjectIdentifier, line: usize) -> RuntimeError {
    RuntimeError::NameError { details: format!("Cannot resolve '{id}'"),
                              line }
}
