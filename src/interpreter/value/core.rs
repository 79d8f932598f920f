use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::{IndexMap, IndexSet};

use crate::{
    error::RuntimeError,
    interpreter::{
        evaluator::{core::EvalResult, function::callable::UserFunction},
        value::{
            bridge::values_equal,
            exception::{ExceptionKind, ExceptionValue},
            geometry::{Matrix4, Placement, Rotation, Vector3},
            host::HostObject,
            key::HashKey,
        },
    },
    quantity::Quantity,
    util::num::{as_exact_integer, format_real, format_significant},
};

/// Shared, mutable list storage.
pub type ListRef = Rc<RefCell<Vec<Value>>>;
/// Shared, mutable, insertion-ordered dict storage.
pub type DictRef = Rc<RefCell<IndexMap<HashKey, Value>>>;

/// Represents a runtime value produced by evaluation.
///
/// Scalars are stored inline. Containers are reference counted so that a
/// list bound to two names is one list, as scripting users expect; lists and
/// dicts are mutable through every reference, tuples and sets are not.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absence of a value.
    #[default]
    None,
    /// `True` or `False`.
    Bool(bool),
    /// A 64-bit signed integer.
    Integer(i64),
    /// A double precision float.
    Real(f64),
    /// A number tagged with a physical unit.
    Quantity(Quantity),
    /// Immutable text.
    String(Rc<str>),
    /// A mutable sequence.
    List(ListRef),
    /// An immutable sequence.
    Tuple(Rc<Vec<Self>>),
    /// A mutable mapping.
    Dict(DictRef),
    /// An immutable set.
    Set(Rc<IndexSet<HashKey>>),
    /// A 3D vector.
    Vector(Vector3),
    /// A 4x4 matrix.
    Matrix(Rc<Matrix4>),
    /// A rotation.
    Rotation(Rotation),
    /// A rigid placement.
    Placement(Rc<Placement>),
    /// A function defined in expression code.
    Function(Rc<UserFunction>),
    /// An exception instance.
    Exception(Rc<ExceptionValue>),
    /// An exception type, usable in `except` clauses and callable to build
    /// instances.
    ExceptionType(ExceptionKind),
    /// Any host-native object.
    Object(Rc<dyn HostObject>),
}

impl Value {
    /// Creates a list.
    #[must_use]
    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    /// Creates a tuple.
    #[must_use]
    pub fn tuple(items: Vec<Self>) -> Self {
        Self::Tuple(Rc::new(items))
    }

    /// Creates a dict.
    #[must_use]
    pub fn dict(entries: IndexMap<HashKey, Self>) -> Self {
        Self::Dict(Rc::new(RefCell::new(entries)))
    }

    /// Creates a string.
    #[must_use]
    pub fn string(text: impl AsRef<str>) -> Self {
        Self::String(Rc::from(text.as_ref()))
    }

    /// Runtime type name, as reported in error messages.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "int",
            Self::Real(_) => "float",
            Self::Quantity(_) => "Quantity",
            Self::String(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Set(_) => "set",
            Self::Vector(_) => "Vector",
            Self::Matrix(_) => "Matrix",
            Self::Rotation(_) => "Rotation",
            Self::Placement(_) => "Placement",
            Self::Function(_) => "function",
            Self::Exception(e) => e.kind.name(),
            Self::ExceptionType(_) => "type",
            Self::Object(o) => o.type_name(),
        }
    }

    /// Truth value used by conditions and `and`/`or`.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Real(r) => *r != 0.0,
            Self::Quantity(q) => q.value() != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::List(l) => !l.borrow().is_empty(),
            Self::Tuple(t) => !t.is_empty(),
            Self::Dict(d) => !d.borrow().is_empty(),
            Self::Set(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Returns `true` for [`Value::None`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns `true` for integers, floats, booleans and quantities.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self,
                 Self::Bool(_) | Self::Integer(_) | Self::Real(_) | Self::Quantity(_))
    }

    /// Whether the value can be invoked.
    #[must_use]
    pub fn is_callable(&self) -> bool {
        match self {
            Self::Function(_) | Self::ExceptionType(_) => true,
            Self::Object(o) => o.is_callable(),
            _ => false,
        }
    }

    /// Borrows the text of a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Items of a list or tuple.
    #[must_use]
    pub fn sequence_items(&self) -> Option<Vec<Self>> {
        match self {
            Self::List(l) => Some(l.borrow().clone()),
            Self::Tuple(t) => Some(t.as_ref().clone()),
            _ => None,
        }
    }

    /// Converts a numeric value into an `f64`.
    pub fn as_real(&self, line: usize) -> EvalResult<f64> {
        match self {
            Self::Bool(b) => Ok(f64::from(u8::from(*b))),
            Self::Integer(i) => Ok(crate::util::num::i64_to_f64_lossy(*i)),
            Self::Real(r) => Ok(*r),
            Self::Quantity(q) => Ok(q.value()),
            other => Err(RuntimeError::type_error(format!("Expected a number, got '{}'",
                                                          other.type_name()),
                                                  line)),
        }
    }

    /// Converts a value into an integer index.
    ///
    /// Floats and dimensionless quantities are accepted when integral.
    pub fn as_index(&self, line: usize) -> EvalResult<i64> {
        match self {
            Self::Bool(b) => Ok(i64::from(*b)),
            Self::Integer(i) => Ok(*i),
            Self::Real(r) => as_exact_integer(*r).ok_or_else(|| {
                                                      RuntimeError::type_error("Index must be an integer",
                                                                               line)
                                                  }),
            Self::Quantity(q) if q.is_dimensionless() => {
                as_exact_integer(q.value()).ok_or_else(|| {
                                               RuntimeError::type_error("Index must be an integer",
                                                                        line)
                                           })
            },
            other => Err(RuntimeError::type_error(format!("Indices must be integers, not '{}'",
                                                          other.type_name()),
                                                  line)),
        }
    }

    /// Collects the items produced by iterating the value.
    ///
    /// Dicts and mapping-like objects iterate their keys, strings their
    /// characters.
    pub fn iterate(&self, line: usize) -> EvalResult<Vec<Self>> {
        match self {
            Self::List(l) => Ok(l.borrow().clone()),
            Self::Tuple(t) => Ok(t.as_ref().clone()),
            Self::Set(s) => Ok(s.iter().map(|k| k.value().clone()).collect()),
            Self::Dict(d) => Ok(d.borrow().keys().map(|k| k.value().clone()).collect()),
            Self::String(s) => Ok(s.chars().map(|c| Self::string(c.to_string())).collect()),
            other => {
                let keys = match other {
                    Self::Object(o) => o.keys(),
                    _ => None,
                };
                keys.ok_or_else(|| {
                        RuntimeError::type_error(format!("'{}' object is not iterable",
                                                         other.type_name()),
                                                 line)
                    })
            },
        }
    }

    /// Identity comparison used by `is`.
    ///
    /// Reference values compare by identity, scalars by value.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Dict(a), Self::Dict(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::Set(a), Self::Set(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Exception(a), Self::Exception(b)) => Rc::ptr_eq(a, b),
            (Self::ExceptionType(a), Self::ExceptionType(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.object_id() == b.object_id(),
            (Self::Matrix(a), Self::Matrix(b)) => Rc::ptr_eq(a, b),
            (Self::Placement(a), Self::Placement(b)) => Rc::ptr_eq(a, b),
            (Self::Integer(_) | Self::Real(_) | Self::Quantity(_) | Self::String(_),
             Self::Integer(_) | Self::Real(_) | Self::Quantity(_) | Self::String(_)) => {
                values_equal(self, other)
            },
            _ => false,
        }
    }

    /// The unambiguous printed form, e.g. strings come quoted.
    ///
    /// # Example
    /// ```
    /// use cadexpr::interpreter::value::core::Value;
    ///
    /// let v = Value::list(vec![Value::Integer(1), Value::string("a")]);
    /// assert_eq!(v.repr(), "[1, 'a']");
    /// assert_eq!(v.to_string(), "[1, 'a']");
    /// assert_eq!(Value::string("a").to_string(), "a");
    /// ```
    #[must_use]
    pub fn repr(&self) -> String {
        match self {
            Self::String(s) => quote_string(s),
            Self::Exception(e) => format!("{}({})", e.kind, quote_string(&e.message)),
            other => other.to_string(),
        }
    }

    /// A re-parseable spelling of the value, used when a literal value node
    /// is saved.
    #[must_use]
    pub fn source_repr(&self) -> String {
        match self {
            Self::Real(r) => format_significant(*r, 17),
            Self::Quantity(q) => q.to_source(),
            Self::String(s) => quote_string(s),
            Self::List(l) => format!("[{}]", join(l.borrow().iter(), Self::source_repr)),
            Self::Tuple(t) if t.len() == 1 => format!("({},)", t[0].source_repr()),
            Self::Tuple(t) => format!("({})", join(t.iter(), Self::source_repr)),
            Self::Dict(d) => {
                let entries = d.borrow()
                               .iter()
                               .map(|(k, v)| format!("{}: {}", k.value().source_repr(), v.source_repr()))
                               .collect::<Vec<_>>();
                format!("{{{}}}", entries.join(", "))
            },
            Self::Set(s) if s.is_empty() => "set()".to_string(),
            Self::Set(s) => format!("{{{}}}", join(s.iter().map(HashKey::value), Self::source_repr)),
            Self::Vector(v) => vector_source(v),
            Self::Matrix(m) => {
                let values = m.values().iter().map(|x| format_significant(*x, 17)).collect::<Vec<_>>();
                format!("create('matrix', {})", values.join(", "))
            },
            Self::Rotation(r) => rotation_source(r),
            Self::Placement(p) => {
                format!("create('placement', {}, {})",
                        vector_source(&p.base),
                        rotation_source(&p.rotation))
            },
            Self::ExceptionType(kind) => kind.name().to_string(),
            other => other.repr(),
        }
    }
}

fn vector_source(v: &Vector3) -> String {
    format!("create('vector', {}, {}, {})",
            format_significant(v.x, 17),
            format_significant(v.y, 17),
            format_significant(v.z, 17))
}

fn rotation_source(r: &Rotation) -> String {
    format!("create('rotation', {}, {})",
            vector_source(&r.axis()),
            format_significant(r.angle(), 17))
}

fn join<'a>(items: impl Iterator<Item = &'a Value>, f: fn(&Value) -> String) -> String {
    items.map(f).collect::<Vec<_>>().join(", ")
}

/// Quotes and escapes `text` as a string literal.
///
/// Single quotes are preferred; double quotes are used when the text
/// contains a single quote but no double quote.
///
/// # Example
/// ```
/// use cadexpr::interpreter::value::core::quote_string;
///
/// assert_eq!(quote_string("abc"), "'abc'");
/// assert_eq!(quote_string("it's"), "\"it's\"");
/// assert_eq!(quote_string("a\nb"), "'a\\nb'");
/// ```
#[must_use]
pub fn quote_string(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            },
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => f.write_str(&format_real(*r)),
            Self::Quantity(q) => write!(f, "{q}"),
            Self::String(s) => f.write_str(s),
            Self::List(l) => write!(f, "[{}]", join(l.borrow().iter(), Self::repr)),
            Self::Tuple(t) if t.len() == 1 => write!(f, "({},)", t[0].repr()),
            Self::Tuple(t) => write!(f, "({})", join(t.iter(), Self::repr)),
            Self::Dict(d) => {
                let entries = d.borrow()
                               .iter()
                               .map(|(k, v)| format!("{}: {}", k.value().repr(), v.repr()))
                               .collect::<Vec<_>>();
                write!(f, "{{{}}}", entries.join(", "))
            },
            Self::Set(s) if s.is_empty() => f.write_str("set()"),
            Self::Set(s) => write!(f, "{{{}}}", join(s.iter().map(HashKey::value), Self::repr)),
            Self::Vector(v) => write!(f, "{v}"),
            Self::Matrix(m) => write!(f, "{m}"),
            Self::Rotation(r) => write!(f, "{r}"),
            Self::Placement(p) => write!(f, "{p}"),
            Self::Function(func) => write!(f, "<function {}>", func.name),
            Self::Exception(e) => f.write_str(&e.message),
            Self::ExceptionType(kind) => write!(f, "<class '{kind}'>"),
            Self::Object(o) => f.write_str(&o.repr()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Self::Real(r)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<Quantity> for Value {
    fn from(q: Quantity) -> Self {
        Self::Quantity(q)
    }
}

impl From<Vector3> for Value {
    fn from(v: Vector3) -> Self {
        Self::Vector(v)
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::list(items)
    }
}
