//! Error types for the shapeshift cache layer

use std::fmt;
use thiserror::Error;

use crate::runtime::Value;

/// Main error type for shapeshift
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Language-level error - TypeError, ReferenceError, etc.
    #[error("{kind}: {message}")]
    RuntimeError { kind: ErrorKind, message: String },

    /// A narrowed read produced a value of a different representation.
    ///
    /// This is a control-flow signal for the caller, which should retry on
    /// the kind-agnostic path with the boxed `value`. It is never a
    /// language exception.
    #[error("UnexpectedResult: {value:?}")]
    UnexpectedResult { value: Value },

    /// Unreachable specialization state
    #[error("InternalError: {0}")]
    InternalError(String),

    /// Invalid cache configuration
    #[error("ConfigError: {0}")]
    ConfigError(String),
}

/// Language error kinds raised by cache strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ErrorKind {
    /// TypeError - wrong type for operation or proxy invariant violation
    TypeError,
    /// ReferenceError - unresolvable name or binding accessed in its dead zone
    ReferenceError,
    /// RangeError - value out of range
    RangeError,
    /// Generic Error - errors thrown by user callbacks
    GenericError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::TypeError => write!(f, "TypeError"),
            ErrorKind::ReferenceError => write!(f, "ReferenceError"),
            ErrorKind::RangeError => write!(f, "RangeError"),
            ErrorKind::GenericError => write!(f, "Error"),
        }
    }
}

impl Error {
    /// Create a TypeError
    pub fn type_error(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    /// Create a ReferenceError
    pub fn reference_error(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::ReferenceError,
            message: message.into(),
        }
    }

    /// Create a RangeError
    pub fn range_error(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::RangeError,
            message: message.into(),
        }
    }

    /// Create a plain Error, as thrown by user code
    pub fn thrown(message: impl Into<String>) -> Self {
        Error::RuntimeError {
            kind: ErrorKind::GenericError,
            message: message.into(),
        }
    }

    /// Create an UnexpectedResult carrying the boxed value
    pub fn unexpected(value: Value) -> Self {
        Error::UnexpectedResult { value }
    }

    /// The language error kind, if this is a runtime error
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::RuntimeError { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Check if this is a runtime error of the given kind
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == Some(kind)
    }

    /// Recover the boxed value from an UnexpectedResult
    pub fn into_unexpected_value(self) -> Option<Value> {
        match self {
            Error::UnexpectedResult { value } => Some(value),
            _ => None,
        }
    }
}

/// Result type alias for shapeshift
pub type Result<T> = std::result::Result<T, Error>;

/// Standardized error message templates
pub mod messages {
    pub const NOT_A_FUNCTION: &str = "is not a function";
    pub const CANNOT_READ_PROPERTY: &str = "Cannot read property";
    pub const CANNOT_SET_PROPERTY: &str = "Cannot set property";
    pub const CANNOT_ASSIGN_READ_ONLY: &str = "Cannot assign to read only property";
    pub const IS_NOT_DEFINED: &str = "is not defined";
    pub const CANNOT_ACCESS_BEFORE_INIT: &str = "before initialization";
    pub const PROXY_REVOKED: &str = "Cannot perform operation on a revoked proxy";

    /// Format a "X is not a function" error message
    pub fn not_a_function(name: &str) -> String {
        format!("'{}' {}", name, NOT_A_FUNCTION)
    }

    /// Format a "Cannot read property 'X' of Y" error message
    pub fn cannot_read_property(prop: &str, of: &str) -> String {
        format!("{} '{}' of {}", CANNOT_READ_PROPERTY, prop, of)
    }

    /// Format a "Cannot set property 'X' of Y" error message
    pub fn cannot_set_property(prop: &str, of: &str) -> String {
        format!("{} '{}' of {}", CANNOT_SET_PROPERTY, prop, of)
    }

    /// Format a "Cannot assign to read only property 'X' of Y" error message
    pub fn read_only(prop: &str, of: &str) -> String {
        format!("{} '{}' of {}", CANNOT_ASSIGN_READ_ONLY, prop, of)
    }

    /// Format a "X is not defined" error message
    pub fn not_defined(name: &str) -> String {
        format!("{} {}", name, IS_NOT_DEFINED)
    }

    /// Format a "Cannot access 'X' before initialization" error message
    pub fn before_init(name: &str) -> String {
        format!("Cannot access '{}' {}", name, CANNOT_ACCESS_BEFORE_INIT)
    }

    /// Format a "Cannot use 'in' operator" error message
    pub fn cannot_use_in(prop: &str, of: &str) -> String {
        format!("Cannot use 'in' operator to search for '{}' in {}", prop, of)
    }

    /// Format a proxy invariant violation message
    pub fn proxy_invariant(trap: &str, prop: &str, reason: &str) -> String {
        format!("'{}' on proxy: property '{}' {}", trap, prop, reason)
    }
}
