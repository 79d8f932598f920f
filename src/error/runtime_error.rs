use std::rc::Rc;

use thiserror::Error;

use crate::{
    error::ParseError,
    interpreter::value::exception::{ExceptionKind, ExceptionValue},
};

/// The error taxonomy every evaluation failure belongs to.
///
/// This is the coarse classification used by hosts and by `try`/`except`
/// matching; a [`RuntimeError`] variant always maps to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed syntax encountered while evaluating `eval()`/`func()` text.
    Parse,
    /// Unbound or unknown identifier.
    Name,
    /// Wrong value kind for an operation.
    Type,
    /// Incompatible physical units.
    UnitMismatch,
    /// Out-of-range sequence access.
    Index,
    /// Missing mapping key.
    Key,
    /// Generic evaluation failure.
    Runtime,
    /// Division or modulo by zero.
    ZeroDivision,
    /// Arithmetic overflow.
    Overflow,
    /// Callable rejected by the sandbox.
    Security,
    /// Read-only evaluation scope is active.
    FunctionCallDisabled,
    /// Cooperative cancellation requested by the host.
    Cancelled,
    /// User-level `raise`.
    Raise,
}

/// Represents all errors that can occur during evaluation and runtime.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// Tried to use an undefined variable.
    #[error("Error on line {line}: Name '{name}' not defined")]
    UnknownVariable {
        /// The name of the variable.
        name: String,
        /// The source line where the error occurred.
        line: usize,
    },
    /// A binding rule was violated (`nonlocal`, `global`, `del`).
    #[error("Error on line {line}: {details}")]
    NameError {
        /// Details describing the failure.
        details: String,
        /// The source line where the error occurred.
        line:    usize,
    },
    /// A value had an unexpected or incompatible type.
    #[error("Error on line {line}: {details}")]
    TypeError {
        /// Details about the type mismatch.
        details: String,
        /// The source line where the error occurred.
        line:    usize,
    },
    /// Two quantities with incompatible units met in one operation.
    #[error("Error on line {line}: {details} [{left}] vs [{right}]")]
    UnitMismatch {
        /// The failed operation.
        details: String,
        /// Unit of the left operand.
        left:    String,
        /// Unit of the right operand.
        right:   String,
        /// The source line where the error occurred.
        line:    usize,
    },
    /// A unit rule of a function or operator was violated.
    #[error("Error on line {line}: {details}")]
    UnitError {
        /// Details about the unit violation.
        details: String,
        /// The source line where the error occurred.
        line:    usize,
    },
    /// Tried to access an element outside the allowed bounds.
    #[error("Error on line {line}: {details}")]
    IndexError {
        /// Details about the failed access.
        details: String,
        /// The source line where the error occurred.
        line:    usize,
    },
    /// A mapping did not contain the requested key.
    #[error("Error on line {line}: Key '{key}' not found")]
    KeyError {
        /// The printed key.
        key:  String,
        /// The source line where the error occurred.
        line: usize,
    },
    /// Generic evaluation failure.
    #[error("Error on line {line}: {details}")]
    Runtime {
        /// Details about the failure.
        details: String,
        /// The source line where the error occurred.
        line:    usize,
    },
    /// Attempted division by zero.
    #[error("Error on line {line}: Division by zero.")]
    DivisionByZero {
        /// The source line where the error occurred.
        line: usize,
    },
    /// Arithmetic operation overflowed.
    #[error("Error on line {line}: Integer overflow while trying to compute result.")]
    Overflow {
        /// The source line where the error occurred.
        line: usize,
    },
    /// Call frames nested deeper than the configured limit.
    #[error("Error on line {line}: Maximum recursion depth exceeded.")]
    RecursionLimit {
        /// The source line where the error occurred.
        line: usize,
    },
    /// The sandbox rejected a callable or module.
    #[error("Error on line {line}: {details}")]
    Security {
        /// The rejection message, naming the offending module.
        details: String,
        /// The source line where the error occurred.
        line:    usize,
    },
    /// Calls and attribute writes are disabled for the current scope.
    #[error("Error on line {line}: {details}")]
    FunctionCallDisabled {
        /// Which operation was refused.
        details: String,
        /// The source line where the error occurred.
        line:    usize,
    },
    /// The host requested cancellation at a loop poll.
    #[error("Error on line {line}: Evaluation aborted.")]
    Cancelled {
        /// The source line where the error occurred.
        line: usize,
    },
    /// A `raise` statement fired.
    #[error("Error on line {line}: {exception}")]
    Raised {
        /// The raised exception.
        exception: Rc<ExceptionValue>,
        /// The source line where the error occurred.
        line:      usize,
    },
    /// Source text passed to `eval()`/`func()` failed to parse.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The outermost wrapper carrying the failing expression's text.
    #[error("{inner}\n    in expression: {expression}")]
    Located {
        /// The original error.
        #[source]
        inner:      Box<RuntimeError>,
        /// The textual form of the expression being evaluated.
        expression: String,
    },
}

impl RuntimeError {
    /// Creates a generic runtime error.
    pub fn runtime(details: impl Into<String>, line: usize) -> Self {
        Self::Runtime { details: details.into(),
                        line }
    }

    /// Creates a type error.
    pub fn type_error(details: impl Into<String>, line: usize) -> Self {
        Self::TypeError { details: details.into(),
                          line }
    }

    /// Creates a unit error.
    pub fn unit_error(details: impl Into<String>, line: usize) -> Self {
        Self::UnitError { details: details.into(),
                          line }
    }

    /// Creates an index error.
    pub fn index_error(details: impl Into<String>, line: usize) -> Self {
        Self::IndexError { details: details.into(),
                           line }
    }

    /// Returns the coarse classification of the error.
    ///
    /// # Example
    /// ```
    /// use cadexpr::error::{ErrorKind, RuntimeError};
    ///
    /// let err = RuntimeError::UnknownVariable { name: "x".into(),
    ///                                           line: 1, };
    /// assert_eq!(err.kind(), ErrorKind::Name);
    /// ```
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownVariable { .. } | Self::NameError { .. } => ErrorKind::Name,
            Self::TypeError { .. } => ErrorKind::Type,
            Self::UnitMismatch { .. } | Self::UnitError { .. } => ErrorKind::UnitMismatch,
            Self::IndexError { .. } => ErrorKind::Index,
            Self::KeyError { .. } => ErrorKind::Key,
            Self::Runtime { .. } | Self::RecursionLimit { .. } => ErrorKind::Runtime,
            Self::DivisionByZero { .. } => ErrorKind::ZeroDivision,
            Self::Overflow { .. } => ErrorKind::Overflow,
            Self::Security { .. } => ErrorKind::Security,
            Self::FunctionCallDisabled { .. } => ErrorKind::FunctionCallDisabled,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Raised { .. } => ErrorKind::Raise,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Located { inner, .. } => inner.kind(),
        }
    }

    /// Returns the message without the line prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::UnknownVariable { name, .. } => format!("Name '{name}' not defined"),
            Self::NameError { details, .. }
            | Self::TypeError { details, .. }
            | Self::UnitError { details, .. }
            | Self::IndexError { details, .. }
            | Self::Runtime { details, .. }
            | Self::Security { details, .. }
            | Self::FunctionCallDisabled { details, .. } => details.clone(),
            Self::UnitMismatch { details,
                                 left,
                                 right,
                                 .. } => format!("{details} [{left}] vs [{right}]"),
            Self::KeyError { key, .. } => format!("Key '{key}' not found"),
            Self::DivisionByZero { .. } => "Division by zero.".to_string(),
            Self::Overflow { .. } => {
                "Integer overflow while trying to compute result.".to_string()
            },
            Self::RecursionLimit { .. } => "Maximum recursion depth exceeded.".to_string(),
            Self::Cancelled { .. } => "Evaluation aborted.".to_string(),
            Self::Raised { exception, .. } => exception.message.clone(),
            Self::Parse(e) => e.to_string(),
            Self::Located { inner, .. } => inner.message(),
        }
    }

    /// Maps the error onto the exception type `except` clauses match against.
    ///
    /// Returns `None` for errors that must never be intercepted by user code
    /// (cancellation and the disabled-call scope).
    #[must_use]
    pub fn exception_kind(&self) -> Option<ExceptionKind> {
        let kind = match self {
            Self::Raised { exception, .. } => exception.kind,
            Self::Located { inner, .. } => return inner.exception_kind(),
            Self::Cancelled { .. } | Self::FunctionCallDisabled { .. } => return None,
            other => match other.kind() {
                ErrorKind::Name => ExceptionKind::NameError,
                ErrorKind::Type => ExceptionKind::TypeError,
                ErrorKind::UnitMismatch => ExceptionKind::UnitError,
                ErrorKind::Index => ExceptionKind::IndexError,
                ErrorKind::Key => ExceptionKind::KeyError,
                ErrorKind::ZeroDivision => ExceptionKind::ZeroDivisionError,
                ErrorKind::Overflow => ExceptionKind::OverflowError,
                ErrorKind::Security => ExceptionKind::SecurityError,
                ErrorKind::Parse => ExceptionKind::SyntaxError,
                _ => ExceptionKind::RuntimeError,
            },
        };
        Some(kind)
    }

    /// Converts the error into the exception value bound by `except ... as e`.
    #[must_use]
    pub fn to_exception(&self) -> Option<Rc<ExceptionValue>> {
        match self {
            Self::Raised { exception, .. } => Some(Rc::clone(exception)),
            Self::Located { inner, .. } => inner.to_exception(),
            other => other.exception_kind()
                          .map(|kind| Rc::new(ExceptionValue::new(kind, other.message()))),
        }
    }

    /// Wraps the error with the text of the expression that failed.
    ///
    /// Applied once, at the outermost evaluation boundary; an already located
    /// error is returned unchanged.
    #[must_use]
    pub fn located(self, expression: impl Into<String>) -> Self {
        match self {
            located @ Self::Located { .. } => located,
            inner => Self::Located { inner:      Box::new(inner),
                                     expression: expression.into(), },
        }
    }

    /// Strips the [`RuntimeError::Located`] wrapper, if any.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Located { inner, .. } => inner.root(),
            other => other,
        }
    }
}
