//! Script exceptions
//!
//! Engine-raised errors are kept as `(kind, message)` until a handler
//! needs the value, at which point the runtime builds the Error object.

use core_types::ErrorKind;

use crate::value::Value;

/// An exception in flight
#[derive(Debug, Clone, PartialEq)]
pub enum Exception {
    /// Value thrown by script code, or an already materialized error
    Thrown(Value),
    /// Error raised by the engine, not yet an object
    Error {
        /// Error class
        kind: ErrorKind,
        /// Message text
        message: String,
    },
}

impl Exception {
    /// Engine-raised error
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Exception::Error {
            kind,
            message: message.into(),
        }
    }

    /// `TypeError`
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::TypeError, message)
    }

    /// `ReferenceError`
    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::ReferenceError, message)
    }

    /// `ArgumentError`
    pub fn argument_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::ArgumentError, message)
    }

    /// `RangeError`
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::RangeError, message)
    }

    /// `VerifyError`
    pub fn verify_error(message: impl Into<String>) -> Self {
        Self::error(ErrorKind::VerifyError, message)
    }

    /// Kind of an engine-raised error, if not materialized yet
    pub fn pending_kind(&self) -> Option<ErrorKind> {
        match self {
            Exception::Error { kind, .. } => Some(*kind),
            Exception::Thrown(_) => None,
        }
    }
}

/// Result of a script-level operation
pub type ScriptResult<T> = Result<T, Exception>;
