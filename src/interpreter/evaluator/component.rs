use std::rc::Rc;

use crate::{
    ast::{Component, Expr},
    error::RuntimeError,
    identifier::PathComponent,
    interpreter::{
        evaluator::{
            builtins::methods::value_method,
            core::{Context, EvalResult},
            utils::{normalize_index, slice_indices},
        },
        value::{core::Value, geometry::Placement, key::HashKey},
    },
    quantity::{Quantity, Unit},
};

/// An evaluated trailing accessor.
#[derive(Debug, Clone)]
pub enum Access {
    /// `.name`
    Attribute(String),
    /// `[value]`
    Index(Value),
    /// `[start:stop:step]`
    Slice {
        /// Start position.
        start: Option<i64>,
        /// Stop position.
        stop:  Option<i64>,
        /// Stride.
        step:  Option<i64>,
    },
}

impl Access {
    /// The accessor a static identifier component stands for.
    #[must_use]
    pub fn from_path(component: &PathComponent) -> Self {
        match component {
            PathComponent::Name(name) => Self::Attribute(name.clone()),
            PathComponent::Index(i) => Self::Index(Value::Integer(*i)),
            PathComponent::Key(key) => Self::Index(Value::from(key.as_str())),
            PathComponent::Range { start, stop, step } => Self::Slice { start: *start,
                                                                        stop:  *stop,
                                                                        step:  *step, },
        }
    }
}

impl Context {
    /// Evaluates the expressions inside a trailing component.
    pub fn eval_access(&mut self, component: &Component, line: usize) -> EvalResult<Access> {
        Ok(match component {
            Component::Attribute(name) => Access::Attribute(name.clone()),
            Component::Index(index) => Access::Index(self.eval(index)?),
            Component::Slice { start, stop, step } => {
                Access::Slice { start: self.slice_bound(start.as_deref(), line)?,
                                stop:  self.slice_bound(stop.as_deref(), line)?,
                                step:  self.slice_bound(step.as_deref(), line)?, }
            },
        })
    }

    fn slice_bound(&mut self,
                   bound: Option<&Expr>,
                   line: usize)
                   -> EvalResult<Option<i64>> {
        match bound {
            None => Ok(None),
            Some(expr) => match self.eval(expr)? {
                Value::None => Ok(None),
                value => value.as_index(line).map(Some),
            },
        }
    }

    /// Applies trailing components left to right.
    ///
    /// # Parameters
    /// - `value`: The primary value.
    /// - `components`: Accessors to apply.
    /// - `line`: Line number for error reporting.
    ///
    /// # Returns
    /// The value reached by the last accessor.
    pub fn apply_components(&mut self,
                            value: Value,
                            components: &[Component],
                            line: usize)
                            -> EvalResult<Value> {
        let mut current = value;
        for component in components {
            let access = self.eval_access(component, line)?;
            current = Self::get_access(&current, &access, line)?;
        }
        Ok(current)
    }

    /// Reads one accessor from `value`.
    ///
    /// # Example
    /// ```
    /// use cadexpr::interpreter::{
    ///     evaluator::{component::Access, core::Context},
    ///     value::core::Value,
    /// };
    ///
    /// let list = Value::list(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
    /// let last = Context::get_access(&list, &Access::Index(Value::Integer(-1)), 1).unwrap();
    /// assert_eq!(last, Value::Integer(3));
    ///
    /// let tail = Context::get_access(&list,
    ///                                &Access::Slice { start: Some(1),
    ///                                                 stop:  None,
    ///                                                 step:  None, },
    ///                                1).unwrap();
    /// assert_eq!(tail.to_string(), "[2, 3]");
    /// ```
    pub fn get_access(value: &Value, access: &Access, line: usize) -> EvalResult<Value> {
        match access {
            Access::Attribute(name) => get_attribute(value, name, line),
            Access::Index(index) => get_index(value, index, line),
            Access::Slice { start, stop, step } => get_slice(value, *start, *stop, *step, line),
        }
    }

    /// Writes `new` through one accessor of `container`.
    ///
    /// Lists, dicts and host objects change in place. Value types such as
    /// vectors and placements are copied; the returned value is the
    /// container after the write, which the caller stores back. Host
    /// object attributes are read-only while calls are disabled.
    pub fn set_access(&self,
                      container: Value,
                      access: &Access,
                      new: Value,
                      line: usize)
                      -> EvalResult<Value> {
        self.check_writable(&container, line)?;
        match (&container, access) {
            (Value::List(list), Access::Index(index)) => {
                let len = list.borrow().len();
                let i = normalize_index(index.as_index(line)?, len, "list assignment", line)?;
                list.borrow_mut()[i] = new;
            },
            (Value::List(list), Access::Slice { start, stop, step }) => {
                let items = new.iterate(line)?;
                let len = list.borrow().len();
                let indices = slice_indices(len, *start, *stop, *step, line)?;
                if step.unwrap_or(1) == 1 {
                    let first = indices.first()
                                       .copied()
                                       .unwrap_or_else(|| start_position(*start, len));
                    let last = first + indices.len();
                    list.borrow_mut().splice(first..last, items);
                } else {
                    if items.len() != indices.len() {
                        return Err(RuntimeError::runtime(format!("attempt to assign sequence of size {} to extended slice of size {}",
                                                                 items.len(),
                                                                 indices.len()),
                                                         line));
                    }
                    let mut list = list.borrow_mut();
                    for (i, item) in indices.into_iter().zip(items) {
                        list[i] = item;
                    }
                }
            },
            (Value::Dict(dict), Access::Index(key)) => {
                dict.borrow_mut().insert(HashKey::new(key.clone(), line)?, new);
            },
            (Value::Object(object), Access::Attribute(name)) => object.set_attr(name, new, line)?,
            (Value::Object(object), Access::Index(Value::String(key))) => {
                object.set_attr(key, new, line)?;
            },
            (Value::Vector(v), Access::Attribute(name)) => {
                let x = new.as_real(line)?;
                let mut v = *v;
                match name.as_str() {
                    "x" => v.x = x,
                    "y" => v.y = x,
                    "z" => v.z = x,
                    _ => return Err(read_only(&container, name, line)),
                }
                return Ok(Value::Vector(v));
            },
            (Value::Placement(p), Access::Attribute(name)) => {
                let mut p: Placement = **p;
                match (name.as_str(), new) {
                    ("Base", Value::Vector(base)) => p.base = base,
                    ("Rotation", Value::Rotation(rotation)) => p.rotation = rotation,
                    (_, new) => {
                        return Err(RuntimeError::type_error(format!("Cannot assign '{}' to Placement.{name}",
                                                                    new.type_name()),
                                                            line));
                    },
                }
                return Ok(Value::Placement(Rc::new(p)));
            },
            (_, Access::Attribute(name)) => return Err(read_only(&container, name, line)),
            _ => {
                return Err(RuntimeError::type_error(format!("'{}' object does not support item assignment",
                                                            container.type_name()),
                                                    line));
            },
        }
        Ok(container)
    }

    /// Writes `new` at the end of an accessor path starting at `root`.
    ///
    /// Intermediate values are read, updated recursively, and stored back,
    /// so value types along the path see the change.
    ///
    /// # Returns
    /// The root after the write.
    pub fn set_path(&self, root: Value, path: &[Access], new: Value, line: usize) -> EvalResult<Value> {
        match path {
            [] => Ok(new),
            [last] => self.set_access(root, last, new, line),
            [first, rest @ ..] => {
                self.check_writable(&root, line)?;
                let child = Self::get_access(&root, first, line)?;
                let updated = self.set_path(child, rest, new, line)?;
                self.set_access(root, first, updated, line)
            },
        }
    }

    /// Host objects reject any write, including one to a container held
    /// in their properties, while calls are disabled.
    fn check_writable(&self, container: &Value, line: usize) -> EvalResult<()> {
        if matches!(container, Value::Object(_)) && self.calls_disabled() {
            return Err(RuntimeError::FunctionCallDisabled { details: "Property assignment is disabled".to_string(),
                                                            line });
        }
        Ok(())
    }

    /// Removes what one accessor designates from `container`, in place.
    pub fn delete_access(container: &Value, access: &Access, line: usize) -> EvalResult<()> {
        match (container, access) {
            (Value::List(list), Access::Index(index)) => {
                let len = list.borrow().len();
                let i = normalize_index(index.as_index(line)?, len, "list assignment", line)?;
                list.borrow_mut().remove(i);
            },
            (Value::List(list), Access::Slice { start, stop, step }) => {
                let len = list.borrow().len();
                let mut indices = slice_indices(len, *start, *stop, *step, line)?;
                indices.sort_unstable();
                let mut list = list.borrow_mut();
                for i in indices.into_iter().rev() {
                    list.remove(i);
                }
            },
            (Value::Dict(dict), Access::Index(key)) => {
                dict.borrow_mut()
                    .shift_remove(&HashKey::new(key.clone(), line)?)
                    .ok_or_else(|| RuntimeError::KeyError { key: key.repr(),
                                                            line })?;
            },
            _ => {
                return Err(RuntimeError::type_error(format!("'{}' object does not support item deletion",
                                                            container.type_name()),
                                                    line));
            },
        }
        Ok(())
    }
}

fn start_position(start: Option<i64>, len: usize) -> usize {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let resolved = match start {
        None => 0,
        Some(s) if s < 0 => (s + len_i).max(0),
        Some(s) => s.min(len_i),
    };
    usize::try_from(resolved).unwrap_or(len)
}

fn read_only(value: &Value, name: &str, line: usize) -> RuntimeError {
    RuntimeError::type_error(format!("'{}' object attribute '{name}' is read-only",
                                     value.type_name()),
                             line)
}

fn no_attribute(value: &Value, name: &str, line: usize) -> RuntimeError {
    RuntimeError::runtime(format!("'{}' object has no attribute '{name}'", value.type_name()),
                          line)
}

fn get_attribute(value: &Value, name: &str, line: usize) -> EvalResult<Value> {
    let found = match (value, name) {
        (Value::Vector(v), "x") => Some(Value::Real(v.x)),
        (Value::Vector(v), "y") => Some(Value::Real(v.y)),
        (Value::Vector(v), "z") => Some(Value::Real(v.z)),
        (Value::Vector(v), "Length") => Some(Value::Real(v.length())),
        (Value::Placement(p), "Base") => Some(Value::Vector(p.base)),
        (Value::Placement(p), "Rotation") => Some(Value::Rotation(p.rotation)),
        (Value::Placement(p), "Matrix") => Some(Value::Matrix(Rc::new(p.to_matrix()))),
        (Value::Rotation(r), "Angle") => Some(Value::Quantity(Quantity::new(r.angle(), Unit::ANGLE))),
        (Value::Rotation(r), "Axis") => Some(Value::Vector(r.axis())),
        (Value::Matrix(m), "A") => Some(Value::tuple(m.values().into_iter().map(Value::Real).collect())),
        (Value::Quantity(q), "Value") => Some(Value::Real(q.value())),
        (Value::Quantity(q), "Unit") => Some(Value::string(q.unit().to_string())),
        (Value::Exception(e), "args") => Some(Value::tuple(vec![Value::from(e.message.as_str())])),
        (Value::ExceptionType(kind), "__name__") => Some(Value::from(kind.name())),
        (Value::Function(f), "__name__") => Some(Value::from(f.name.as_str())),
        (Value::Object(object), name) => object.get_attr(name, line)?,
        _ => None,
    };
    found.or_else(|| value_method(value, name))
         .ok_or_else(|| no_attribute(value, name, line))
}

fn get_index(value: &Value, index: &Value, line: usize) -> EvalResult<Value> {
    match value {
        Value::List(list) => {
            let list = list.borrow();
            let i = normalize_index(index.as_index(line)?, list.len(), "list", line)?;
            Ok(list[i].clone())
        },
        Value::Tuple(items) => {
            let i = normalize_index(index.as_index(line)?, items.len(), "tuple", line)?;
            Ok(items[i].clone())
        },
        Value::String(text) => {
            let chars: Vec<char> = text.chars().collect();
            let i = normalize_index(index.as_index(line)?, chars.len(), "string", line)?;
            Ok(Value::string(chars[i].to_string()))
        },
        Value::Vector(v) => {
            let i = normalize_index(index.as_index(line)?, 3, "vector", line)?;
            Ok(Value::Real([v.x, v.y, v.z][i]))
        },
        Value::Dict(dict) => {
            dict.borrow()
                .get(&HashKey::new(index.clone(), line)?)
                .cloned()
                .ok_or_else(|| RuntimeError::KeyError { key: index.repr(),
                                                        line })
        },
        Value::Object(object) => {
            let Some(key) = index.as_str() else {
                return Err(not_subscriptable(value, line));
            };
            object.get_attr(key, line)?
                  .ok_or_else(|| RuntimeError::KeyError { key: index.repr(),
                                                          line })
        },
        _ => Err(not_subscriptable(value, line)),
    }
}

fn not_subscriptable(value: &Value, line: usize) -> RuntimeError {
    RuntimeError::type_error(format!("'{}' object is not subscriptable", value.type_name()),
                             line)
}

fn get_slice(value: &Value,
             start: Option<i64>,
             stop: Option<i64>,
             step: Option<i64>,
             line: usize)
             -> EvalResult<Value> {
    let pick = |items: &[Value]| -> EvalResult<Vec<Value>> {
        Ok(slice_indices(items.len(), start, stop, step, line)?.into_iter()
                                                                .map(|i| items[i].clone())
                                                                .collect())
    };
    match value {
        Value::List(list) => Ok(Value::list(pick(&list.borrow())?)),
        Value::Tuple(items) => Ok(Value::tuple(pick(items)?)),
        Value::String(text) => {
            let chars: Vec<char> = text.chars().collect();
            let picked: String = slice_indices(chars.len(), start, stop, step, line)?.into_iter()
                                                                                      .map(|i| chars[i])
                                                                                      .collect();
            Ok(Value::string(picked))
        },
        _ => Err(not_subscriptable(value, line)),
    }
}
