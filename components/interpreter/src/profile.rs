//! Per-method profiling
//!
//! Counts invocations so the invoker can tell when a method becomes hot.
//! There is no native tier; hot methods keep running through the
//! interpreter with their binding caches warm.

/// Execution tier of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Fewer invocations than the hotness threshold
    Cold,
    /// Threshold reached
    Hot,
}

/// Profiling data for one compiled method
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileData {
    /// Number of invocations
    pub invocations: u64,
    /// Number of exceptions caught by this method's handlers
    pub handled_exceptions: u64,
}

impl ProfileData {
    /// Create new empty profile data
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation.
    ///
    /// Returns true exactly once, on the call that reaches `threshold`.
    pub fn record_invocation(&mut self, threshold: u64) -> bool {
        self.invocations += 1;
        self.invocations == threshold
    }

    /// Current tier for `threshold`
    pub fn tier(&self, threshold: u64) -> Tier {
        if self.invocations >= threshold {
            Tier::Hot
        } else {
            Tier::Cold
        }
    }
}
