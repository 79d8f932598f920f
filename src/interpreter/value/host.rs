use std::{
    cell::RefCell,
    fmt,
    rc::Rc,
    sync::atomic::{AtomicUsize, Ordering},
};

use indexmap::IndexMap;

use crate::{
    document::DocumentObject,
    error::RuntimeError,
    interpreter::{
        evaluator::core::{Context, EvalResult},
        value::core::Value,
    },
};

static NEXT_OBJECT_ID: AtomicUsize = AtomicUsize::new(1);

/// Allocates a process-unique object handle.
///
/// Handles are never reused, so they can key caches for the lifetime of the
/// process without the address-reuse hazards of raw pointers.
#[must_use]
pub fn next_object_id() -> usize {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Keyword arguments passed to a host callable, in call order.
pub type Kwargs = IndexMap<String, Value>;

/// A host-native object reachable from expressions.
///
/// This is the opaque-reference arm of [`Value`]: document objects, host
/// functions, bound methods and modules all implement it. The sandbox uses
/// [`HostObject::object_id`], [`HostObject::type_name`],
/// [`HostObject::module`] and [`HostObject::receiver`] to decide whether a
/// callable may run.
pub trait HostObject: fmt::Debug {
    /// A stable handle, unique for the process lifetime.
    fn object_id(&self) -> usize;

    /// Runtime type name, optionally dotted with its module
    /// (`"Part.Shape"`).
    fn type_name(&self) -> &str;

    /// Declared owning module, if the object knows it.
    fn module(&self) -> Option<&str> {
        None
    }

    /// The receiver a bound method was taken from.
    fn receiver(&self) -> Option<Value> {
        None
    }

    /// Whether [`HostObject::call`] is meaningful.
    fn is_callable(&self) -> bool {
        false
    }

    /// Reads an attribute; `Ok(None)` when it does not exist.
    fn get_attr(&self, name: &str, line: usize) -> EvalResult<Option<Value>> {
        let _ = (name, line);
        Ok(None)
    }

    /// Writes an attribute.
    fn set_attr(&self, name: &str, value: Value, line: usize) -> EvalResult<()> {
        let _ = value;
        Err(RuntimeError::type_error(format!("'{}' object has no writable attribute '{name}'",
                                             self.type_name()),
                                     line))
    }

    /// Invokes the object.
    fn call(&self, ctx: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize)
            -> EvalResult<Value> {
        let _ = (ctx, args, kwargs);
        Err(RuntimeError::type_error(format!("'{}' object is not callable", self.type_name()),
                                     line))
    }

    /// Printed form.
    fn repr(&self) -> String {
        format!("<{} object>", self.type_name())
    }

    /// Mapping keys, for objects that behave like a mapping.
    fn keys(&self) -> Option<Vec<Value>> {
        None
    }

    /// Down-cast to a document object.
    fn as_document_object(&self) -> Option<Rc<DocumentObject>> {
        None
    }

    /// Down-cast to a module.
    fn as_module(&self) -> Option<&HostModule> {
        None
    }
}

/// Signature of native functions exposed to expressions.
pub type NativeFn = dyn Fn(&mut Context, Vec<Value>, Kwargs, usize) -> EvalResult<Value>;

/// A callable implemented in Rust.
///
/// Built-in functions (`len`, `range`, ...), methods bound to values
/// (`list.append`) and module members (`math.sqrt`) are all host functions.
#[derive(Clone)]
pub struct HostFunction {
    id:        usize,
    name:      String,
    module:    Option<String>,
    type_name: String,
    receiver:  Option<Value>,
    func:      Rc<NativeFn>,
}

impl HostFunction {
    /// Creates a free function declared in `module`.
    pub fn new(name: impl Into<String>,
               module: Option<&str>,
               func: impl Fn(&mut Context, Vec<Value>, Kwargs, usize) -> EvalResult<Value> + 'static)
               -> Self {
        Self { id:        next_object_id(),
               name:      name.into(),
               module:    module.map(str::to_string),
               type_name: "builtin_function_or_method".to_string(),
               receiver:  None,
               func:      Rc::new(func), }
    }

    /// Creates a method bound to `receiver`.
    ///
    /// The declared module is left empty so the sandbox resolves it through
    /// the receiver.
    pub fn bound(name: impl Into<String>,
                 receiver: Value,
                 func: impl Fn(&mut Context, Vec<Value>, Kwargs, usize) -> EvalResult<Value> + 'static)
                 -> Self {
        Self { id:        next_object_id(),
               name:      name.into(),
               module:    None,
               type_name: "builtin_function_or_method".to_string(),
               receiver:  Some(receiver),
               func:      Rc::new(func), }
    }

    /// Overrides the runtime type name.
    #[must_use]
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// The function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction")
         .field("name", &self.name)
         .field("module", &self.module)
         .finish_non_exhaustive()
    }
}

impl HostObject for HostFunction {
    fn object_id(&self) -> usize {
        self.id
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    fn receiver(&self) -> Option<Value> {
        self.receiver.clone()
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn repr(&self) -> String {
        format!("<built-in function {}>", self.name)
    }

    fn get_attr(&self, name: &str, _line: usize) -> EvalResult<Option<Value>> {
        Ok(match name {
            "__name__" => Some(Value::from(self.name.as_str())),
            "__module__" => self.module.as_deref().map(Value::from),
            _ => None,
        })
    }

    fn call(&self, ctx: &mut Context, args: Vec<Value>, kwargs: Kwargs, line: usize)
            -> EvalResult<Value> {
        (self.func)(ctx, args, kwargs, line)
    }
}

/// A module registered with the import registry.
#[derive(Debug)]
pub struct HostModule {
    id:         usize,
    name:       String,
    attributes: RefCell<IndexMap<String, Value>>,
}

impl HostModule {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self { id:         next_object_id(),
               name:       name.into(),
               attributes: RefCell::new(IndexMap::new()), }
    }

    /// Adds or replaces a member.
    pub fn insert(&self, name: impl Into<String>, value: Value) {
        self.attributes.borrow_mut().insert(name.into(), value);
    }

    /// Registers a native function as a member.
    pub fn add_function(&self,
                        name: &str,
                        func: impl Fn(&mut Context, Vec<Value>, Kwargs, usize) -> EvalResult<Value> + 'static)
    {
        let function = HostFunction::new(name, Some(&self.name), func);
        self.insert(name, Value::Object(Rc::new(function)));
    }

    /// The module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads a member.
    #[must_use]
    pub fn member(&self, name: &str) -> Option<Value> {
        self.attributes.borrow().get(name).cloned()
    }

    /// Names exported by `from module import *`.
    ///
    /// Honors an `__all__` member holding a list or tuple of names; otherwise
    /// every member not starting with an underscore.
    #[must_use]
    pub fn public_names(&self) -> Vec<String> {
        if let Some(all) = self.member("__all__")
           && let Some(items) = all.sequence_items()
        {
            return items.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect();
        }
        self.attributes
            .borrow()
            .keys()
            .filter(|k| !k.starts_with('_'))
            .cloned()
            .collect()
    }
}

impl HostObject for HostModule {
    fn object_id(&self) -> usize {
        self.id
    }

    fn type_name(&self) -> &str {
        "module"
    }

    fn repr(&self) -> String {
        format!("<module '{}'>", self.name)
    }

    fn module(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn get_attr(&self, name: &str, _line: usize) -> EvalResult<Option<Value>> {
        if name == "__name__" {
            return Ok(Some(Value::from(self.name.as_str())));
        }
        Ok(self.member(name))
    }

    fn set_attr(&self, name: &str, value: Value, _line: usize) -> EvalResult<()> {
        self.insert(name, value);
        Ok(())
    }

    fn as_module(&self) -> Option<&HostModule> {
        Some(self)
    }
}
