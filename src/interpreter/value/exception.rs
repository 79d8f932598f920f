use std::fmt;

/// Built-in exception types, arranged in a single-inheritance hierarchy.
///
/// `except` clauses match a raised exception against these by subclass test,
/// so `except LookupError` also catches `IndexError` and `KeyError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Root of the hierarchy.
    BaseException,
    /// Base of all ordinary errors.
    Exception,
    /// Unknown name or invalid binding.
    NameError,
    /// Wrong value kind.
    TypeError,
    /// Right kind, wrong value.
    ValueError,
    /// Base of index and key errors.
    LookupError,
    /// Sequence index out of range.
    IndexError,
    /// Mapping key missing.
    KeyError,
    /// Base of arithmetic errors.
    ArithmeticError,
    /// Division or modulo by zero.
    ZeroDivisionError,
    /// Arithmetic overflow.
    OverflowError,
    /// Generic evaluation failure.
    RuntimeError,
    /// Incompatible units.
    UnitError,
    /// Sandbox rejection.
    SecurityError,
    /// Source text passed to `eval()` did not parse.
    SyntaxError,
}

impl ExceptionKind {
    /// Every exception type, in declaration order.
    pub const ALL: &'static [Self] = &[Self::BaseException,
                                       Self::Exception,
                                       Self::NameError,
                                       Self::TypeError,
                                       Self::ValueError,
                                       Self::LookupError,
                                       Self::IndexError,
                                       Self::KeyError,
                                       Self::ArithmeticError,
                                       Self::ZeroDivisionError,
                                       Self::OverflowError,
                                       Self::RuntimeError,
                                       Self::UnitError,
                                       Self::SecurityError,
                                       Self::SyntaxError];

    /// The name the type is bound to in expressions.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BaseException => "BaseException",
            Self::Exception => "Exception",
            Self::NameError => "NameError",
            Self::TypeError => "TypeError",
            Self::ValueError => "ValueError",
            Self::LookupError => "LookupError",
            Self::IndexError => "IndexError",
            Self::KeyError => "KeyError",
            Self::ArithmeticError => "ArithmeticError",
            Self::ZeroDivisionError => "ZeroDivisionError",
            Self::OverflowError => "OverflowError",
            Self::RuntimeError => "RuntimeError",
            Self::UnitError => "UnitError",
            Self::SecurityError => "SecurityError",
            Self::SyntaxError => "SyntaxError",
        }
    }

    /// Resolves a built-in exception name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// The direct base type, `None` for [`ExceptionKind::BaseException`].
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::BaseException => None,
            Self::Exception => Some(Self::BaseException),
            Self::IndexError | Self::KeyError => Some(Self::LookupError),
            Self::ZeroDivisionError | Self::OverflowError => Some(Self::ArithmeticError),
            _ => Some(Self::Exception),
        }
    }

    /// Tests whether `self` is `base` or derives from it.
    ///
    /// # Example
    /// ```
    /// use cadexpr::interpreter::value::exception::ExceptionKind;
    ///
    /// assert!(ExceptionKind::KeyError.is_subclass_of(ExceptionKind::LookupError));
    /// assert!(ExceptionKind::KeyError.is_subclass_of(ExceptionKind::Exception));
    /// assert!(!ExceptionKind::KeyError.is_subclass_of(ExceptionKind::TypeError));
    /// ```
    #[must_use]
    pub fn is_subclass_of(self, base: Self) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == base {
                return true;
            }
            current = kind.parent();
        }
        false
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An exception instance, either raised by user code or converted from an
/// evaluation error when an `except` clause binds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionValue {
    /// The exception type.
    pub kind:    ExceptionKind,
    /// The message given at construction.
    pub message: String,
}

impl ExceptionValue {
    /// Creates an exception.
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self { kind,
               message: message.into() }
    }
}

impl fmt::Display for ExceptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}
