//! Constant values stored in descriptors
//!
//! Used for optional-parameter defaults and slot initial values.

use core_types::{Namespace, StringId};

/// Compile-time constant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    /// undefined
    Undefined,
    /// null
    Null,
    /// Boolean literal
    Boolean(bool),
    /// int literal
    Int(i32),
    /// uint literal
    UInt(u32),
    /// Number literal
    Double(f64),
    /// String literal
    String(StringId),
    /// Namespace literal
    Namespace(Namespace),
}

impl ConstValue {
    /// Check if value is numeric
    pub fn is_number(&self) -> bool {
        matches!(self, ConstValue::Int(_) | ConstValue::UInt(_) | ConstValue::Double(_))
    }

    /// Try to get the numeric value
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConstValue::Int(n) => Some(*n as f64),
            ConstValue::UInt(n) => Some(*n as f64),
            ConstValue::Double(n) => Some(*n),
            _ => None,
        }
    }
}
