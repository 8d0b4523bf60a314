//! Error taxonomy and host-level faults.
//!
//! [`ErrorKind`] names the builtin error classes a script can catch.
//! [`EngineError`] is what leaves the engine when nothing caught it.

use std::fmt;

use thiserror::Error;

/// The kind of script-visible error.
///
/// Each kind corresponds to a builtin class deriving from `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Base `Error` class
    Error,
    /// Null/undefined coercion, non-callable invocation, bad coercion
    TypeError,
    /// Strict lookup miss, sealed write, const write
    ReferenceError,
    /// Arity mismatch on a typed method
    ArgumentError,
    /// Index out of bounds
    RangeError,
    /// Malformed bytecode detected while interpreting
    VerifyError,
    /// Dynamic evaluation is disabled
    EvalError,
    /// Recursion limit reached
    StackOverflowError,
}

impl ErrorKind {
    /// All error kinds, base class first.
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::ReferenceError,
        ErrorKind::ArgumentError,
        ErrorKind::RangeError,
        ErrorKind::VerifyError,
        ErrorKind::EvalError,
        ErrorKind::StackOverflowError,
    ];

    /// The builtin class name for this kind.
    pub fn class_name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::ArgumentError => "ArgumentError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::VerifyError => "VerifyError",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::StackOverflowError => "StackOverflowError",
        }
    }

    /// Engine-limit errors are raised by the engine itself rather than by
    /// a failed language operation.
    pub fn is_engine_limit(self) -> bool {
        matches!(self, ErrorKind::StackOverflowError | ErrorKind::EvalError)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// A fault reported to the embedding host.
///
/// Script code never sees these; they are produced when an exception
/// escapes the outermost invocation or when the host hands the engine
/// something it cannot run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// An exception escaped every script handler
    #[error("uncaught {}: {}", .kind.map_or("exception", ErrorKind::class_name), .message)]
    Uncaught {
        /// Error class of the thrown value, `None` for non-Error throws
        kind: Option<ErrorKind>,
        /// String form of the thrown value
        message: String,
    },
    /// The bytecode unit is internally inconsistent
    #[error("invalid bytecode: {0}")]
    InvalidBytecode(String),
    /// A method id does not exist in the loaded unit
    #[error("unknown method id {0}")]
    UnknownMethod(u32),
    /// A class id does not exist or is not linked yet
    #[error("unknown class id {0}")]
    UnknownClass(u32),
    /// Runtime configuration could not be read
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Error class carried by an uncaught exception, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            EngineError::Uncaught { kind, .. } => *kind,
            _ => None,
        }
    }
}
