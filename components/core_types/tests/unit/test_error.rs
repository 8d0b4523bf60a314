//! Unit tests for ErrorKind and EngineError

use core_types::{EngineError, ErrorKind};

#[test]
fn test_error_kind_display_is_class_name() {
    assert_eq!(ErrorKind::ReferenceError.to_string(), "ReferenceError");
    assert_eq!(ErrorKind::StackOverflowError.to_string(), "StackOverflowError");
}

#[test]
fn test_all_starts_with_base_error() {
    assert_eq!(ErrorKind::ALL[0], ErrorKind::Error);
}

#[test]
fn test_uncaught_without_kind() {
    let err = EngineError::Uncaught {
        kind: None,
        message: "42".to_string(),
    };
    assert_eq!(err.to_string(), "uncaught exception: 42");
    assert_eq!(err.error_kind(), None);
}

#[test]
fn test_other_faults_have_no_kind() {
    assert_eq!(EngineError::UnknownMethod(3).error_kind(), None);
    assert_eq!(EngineError::UnknownMethod(3).to_string(), "unknown method id 3");
    assert_eq!(
        EngineError::InvalidBytecode("bad jump".to_string()).to_string(),
        "invalid bytecode: bad jump"
    );
}
