//! Language-level error types.
//!
//! This module provides the exception channel of the runtime. Errors of this
//! kind correspond to the language's built-in error constructors and
//! propagate to the calling frame unchanged; the inline-cache layer never
//! suppresses them.

use std::fmt;

/// The kind of language-level error.
///
/// These correspond to the language's built-in error constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Type error (e.g., calling a non-function)
    TypeError,
    /// Reference to an undefined binding
    ReferenceError,
    /// Value out of allowed range
    RangeError,
    /// Resource exhaustion (allocation or code-memory failure)
    OutOfMemory,
    /// Internal engine error
    InternalError,
}

/// A language-level exception that can be thrown and caught.
#[derive(Debug, Clone, PartialEq)]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl JsError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        JsError {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Shorthand for a `ReferenceError`.
    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReferenceError, message)
    }

    /// Shorthand for a `RangeError`.
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RangeError, message)
    }

    /// Shorthand for an allocation failure surfaced on the exception channel.
    pub fn out_of_memory() -> Self {
        Self::new(ErrorKind::OutOfMemory, "out of memory")
    }
}

impl fmt::Display for JsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for JsError {}

/// Result type for every operation that can throw a language-level error.
pub type EvalResult<T> = Result<T, JsError>;
