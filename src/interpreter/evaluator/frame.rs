use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use indexmap::IndexMap;

use crate::{
    document::DocumentObject,
    error::RuntimeError,
    interpreter::{evaluator::core::EvalResult, value::core::Value},
};

/// Warning code for a property read inside a function body.
pub const WARN_PROPERTY_READ: u8 = 1;
/// Warning code for a property write inside a function body.
pub const WARN_PROPERTY_WRITE: u8 = 2;

/// A named slot shared by every frame holding a reference to it.
///
/// The slot is freed when the last frame referencing it is popped.
#[derive(Debug)]
pub struct Binding {
    /// The bound value.
    pub value: Value,
    owner:     usize,
}

impl Binding {
    /// Id of the frame the binding belongs to.
    #[must_use]
    pub const fn owner_frame(&self) -> usize {
        self.owner
    }
}

/// Shared handle to a [`Binding`].
pub type BindingRef = Rc<RefCell<Binding>>;

fn new_binding(value: Value, owner: usize) -> BindingRef {
    Rc::new(RefCell::new(Binding { value, owner }))
}

/// How [`FrameStack::get_var`] resolves a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindType {
    /// Reuse the current frame's binding or create one.
    Local,
    /// Like `Local`, but a binding shared from another frame is replaced by a
    /// fresh one.
    LocalOnly,
    /// Search outward; a binding found in an ancestor is copied into the
    /// current frame. Fails when the name is unknown.
    Exist,
    /// The nearest binding, shared, or nothing. Never creates.
    NonExist,
    /// A detached snapshot of the nearest binding. Never changes any frame.
    Query,
    /// Share the outermost frame's binding.
    Global,
    /// Share the nearest enclosing non-global binding.
    NonLocal,
}

/// One activation of a function, lambda, comprehension or top-level
/// evaluation.
#[derive(Debug)]
pub struct Frame {
    id:                   usize,
    name:                 Option<String>,
    owner:                Option<Weak<DocumentObject>>,
    bindings:             IndexMap<String, BindingRef>,
    /// The exception being handled, re-raised by a bare `raise`.
    pub(crate) exception: Option<RuntimeError>,
    /// Iterations between cancellation polls; `0` disables polling.
    pub loop_check:       usize,
    /// Bit set of silenced warning codes.
    pub(crate) muted:     u8,
}

impl Frame {
    /// The frame's unique id.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// The called function's name; `None` for other frames.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The object owning the called function.
    #[must_use]
    pub fn owner(&self) -> Option<Rc<DocumentObject>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }

    /// Whether the frame belongs to a function call.
    #[must_use]
    pub const fn is_function(&self) -> bool {
        self.name.is_some()
    }

    /// The frame's own binding of `name`.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<&BindingRef> {
        self.bindings.get(name)
    }

    /// Names bound in this frame, in binding order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }

    /// Silences (`muted == true`) or re-enables a warning code; `0` applies
    /// to every code.
    pub fn set_muted(&mut self, code: u8, muted: bool) {
        let mask = match code {
            0 => WARN_PROPERTY_READ | WARN_PROPERTY_WRITE,
            code => code,
        };
        if muted {
            self.muted |= mask;
        } else {
            self.muted &= !mask;
        }
    }

    /// Whether `code` is silenced.
    #[must_use]
    pub const fn is_muted(&self, code: u8) -> bool {
        self.muted & code != 0
    }
}

/// The active call chain.
///
/// Frames form a stack; only the running chain exists at any time, so shared
/// bindings are plain reference counts and never form cycles.
#[derive(Debug, Default)]
pub struct FrameStack {
    frames:  Vec<Frame>,
    next_id: usize,
}

impl FrameStack {
    /// Pushes a frame; `name` is set for function calls.
    pub fn push(&mut self,
                name: Option<String>,
                owner: Option<Weak<DocumentObject>>,
                loop_check: usize) {
        self.next_id += 1;
        self.frames.push(Frame { id: self.next_id,
                                 name,
                                 owner,
                                 bindings: IndexMap::new(),
                                 exception: None,
                                 loop_check,
                                 muted: 0 });
    }

    /// Pops the innermost frame, releasing its references.
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Number of active frames.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The innermost frame.
    #[must_use]
    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// The innermost frame, mutably.
    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// The innermost function frame.
    #[must_use]
    pub fn function_frame(&self) -> Option<&Frame> {
        self.frames.iter().rev().find(|f| f.is_function())
    }

    /// The frame whose settings (`pragma`, loop check) apply: the innermost
    /// function frame, else the outermost frame.
    #[must_use]
    pub fn settings_frame(&self) -> Option<&Frame> {
        self.function_frame().or_else(|| self.frames.first())
    }

    /// Mutable access to [`FrameStack::settings_frame`].
    pub fn settings_frame_mut(&mut self) -> Option<&mut Frame> {
        match self.frames.iter().rposition(Frame::is_function) {
            Some(i) => self.frames.get_mut(i),
            None => self.frames.first_mut(),
        }
    }

    /// The nearest binding of `name`, searching from the innermost frame
    /// outward.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<BindingRef> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.bindings.get(name).cloned())
    }

    /// Reads the nearest binding's value.
    #[must_use]
    pub fn read(&self, name: &str) -> Option<Value> {
        self.lookup(name).map(|b| b.borrow().value.clone())
    }

    /// Resolves `name` in the innermost frame according to `bind`.
    ///
    /// # Parameters
    /// - `name`: Variable name.
    /// - `bind`: Resolution mode.
    /// - `builtin`: Value the name has as a built-in, consulted by `Exist`.
    /// - `line`: Line number for error reporting.
    ///
    /// # Returns
    /// The binding, or `None` where the mode allows a miss.
    ///
    /// # Example
    /// ```
    /// use cadexpr::interpreter::{
    ///     evaluator::frame::{BindType, FrameStack},
    ///     value::core::Value,
    /// };
    ///
    /// let mut frames = FrameStack::default();
    /// frames.push(None, None, 100);
    /// let x = frames.get_var("x", BindType::Local, None, 1).unwrap().unwrap();
    /// x.borrow_mut().value = Value::Integer(1);
    ///
    /// frames.push(Some("f".into()), None, 100);
    /// let g = frames.get_var("x", BindType::Global, None, 2).unwrap().unwrap();
    /// g.borrow_mut().value = Value::Integer(2);
    /// frames.pop();
    ///
    /// assert_eq!(frames.read("x"), Some(Value::Integer(2)));
    /// ```
    pub fn get_var(&mut self,
                   name: &str,
                   bind: BindType,
                   builtin: Option<&Value>,
                   line: usize)
                   -> EvalResult<Option<BindingRef>> {
        let Some(depth) = self.frames.len().checked_sub(1) else {
            return Err(RuntimeError::runtime("No active frame", line));
        };
        let frame_id = self.frames[depth].id;

        if let Some(existing) = self.frames[depth].bindings.get(name).cloned() {
            return match bind {
                BindType::Global | BindType::NonLocal => {
                    Err(RuntimeError::NameError { details: "Invalid variable binding".to_string(),
                                                  line })
                },
                BindType::LocalOnly if existing.borrow().owner != frame_id => {
                    let fresh = new_binding(Value::None, frame_id);
                    self.frames[depth].bindings
                                      .insert(name.to_string(), Rc::clone(&fresh));
                    Ok(Some(fresh))
                },
                BindType::Query => {
                    let value = existing.borrow().value.clone();
                    Ok(Some(new_binding(value, frame_id)))
                },
                _ => Ok(Some(existing)),
            };
        }

        let ancestor = || {
            self.frames[..depth].iter()
                                .rev()
                                .find_map(|f| f.bindings.get(name).cloned())
        };

        match bind {
            BindType::Local | BindType::LocalOnly => Ok(Some(self.bind_new(depth, name, Value::None))),
            BindType::Exist => {
                let value = ancestor().map(|b| b.borrow().value.clone())
                                      .or_else(|| builtin.cloned())
                                      .ok_or_else(|| RuntimeError::UnknownVariable { name: name.to_string(),
                                                                                     line })?;
                Ok(Some(self.bind_new(depth, name, value)))
            },
            BindType::NonExist => Ok(ancestor()),
            BindType::Query => {
                Ok(ancestor().map(|b| new_binding(b.borrow().value.clone(), frame_id)))
            },
            BindType::Global => {
                if depth == 0 {
                    return Ok(Some(self.bind_new(0, name, Value::None)));
                }
                let global = match self.frames[0].bindings.get(name) {
                    Some(b) => Rc::clone(b),
                    None => self.bind_new(0, name, Value::None),
                };
                self.frames[depth].bindings
                                  .insert(name.to_string(), Rc::clone(&global));
                Ok(Some(global))
            },
            BindType::NonLocal => {
                let found = (1..depth).rev()
                                      .find_map(|i| self.frames[i].bindings.get(name).cloned())
                                      .ok_or_else(|| RuntimeError::NameError { details: format!("NonLocal binding of '{name}' not found."),
                                                                               line })?;
                self.frames[depth].bindings
                                  .insert(name.to_string(), Rc::clone(&found));
                Ok(Some(found))
            },
        }
    }

    fn bind_new(&mut self, depth: usize, name: &str, value: Value) -> BindingRef {
        let binding = new_binding(value, self.frames[depth].id);
        self.frames[depth].bindings
                          .insert(name.to_string(), Rc::clone(&binding));
        binding
    }

    /// Removes `name` from the innermost frame.
    ///
    /// When the frame owns the binding it is removed from every frame
    /// sharing it; otherwise only this frame's reference is dropped.
    pub fn erase(&mut self, name: &str, line: usize) -> EvalResult<()> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(RuntimeError::runtime("No active frame", line));
        };
        let binding = frame.bindings
                           .shift_remove(name)
                           .ok_or_else(|| RuntimeError::NameError { details: format!("Name '{name}' not found"),
                                                                    line })?;
        if binding.borrow().owner == frame.id {
            for other in &mut self.frames {
                if other.bindings
                        .get(name)
                        .is_some_and(|b| Rc::ptr_eq(b, &binding))
                {
                    other.bindings.shift_remove(name);
                }
            }
        }
        Ok(())
    }
}
