//! Runtime configuration
//!
//! Engine limits and tuning knobs, loadable from JSON.

use core_types::EngineError;
use serde::{Deserialize, Serialize};

/// Configuration for one [`Runtime`](crate::Runtime).
///
/// # Example
///
/// ```
/// use interpreter::RuntimeConfig;
///
/// let config = RuntimeConfig::from_json(r#"{ "max_recursion_depth": 64 }"#).unwrap();
/// assert_eq!(config.max_recursion_depth, 64);
/// assert_eq!(config.hotness_threshold, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Nested invocations allowed before `StackOverflowError`
    pub max_recursion_depth: usize,
    /// Invocations after which a method is reported hot
    pub hotness_threshold: u64,
    /// Hard cap on any method's operand stack, whatever it declares
    pub max_operand_stack: usize,
    /// Whether the `eval` builtin may run
    pub allow_dynamic_eval: bool,
    /// Largest index an array write may create
    pub dense_array_limit: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 256,
            hotness_threshold: 1000,
            max_operand_stack: 4096,
            allow_dynamic_eval: false,
            dense_array_limit: 1 << 24,
        }
    }
}

impl RuntimeConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, EngineError> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }
}
