//! Resolved-binding caches
//!
//! Instructions whose resolution cannot change between invocations of the
//! same method record their result in a side table keyed by instruction
//! offset. The code buffer itself is never modified.

use rustc_hash::FxHashMap;
use tracing::trace;

use object_model::{ClassRef, ObjectRef};

/// A resolution result that stays valid for the method's lifetime
#[derive(Debug, Clone)]
pub enum Binding {
    /// Lexical name found on this scope object
    Scope(ObjectRef),
    /// Type operand resolved to a class (`None` = untyped)
    Type(Option<ClassRef>),
}

/// State of one cache entry
#[derive(Debug, Clone, Default)]
pub enum CacheCell {
    /// Not resolved yet
    #[default]
    Unresolved,
    /// Resolved once, reused from then on
    Resolved(Binding),
}

/// Counters for observing cache behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to resolve
    pub misses: u64,
    /// Entries written
    pub fills: u64,
}

/// Side table for one compiled method
#[derive(Debug, Default)]
pub struct BindingCache {
    cells: FxHashMap<usize, CacheCell>,
    stats: CacheStats,
}

impl BindingCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached binding for the instruction at `offset`
    pub fn lookup(&mut self, offset: usize) -> Option<Binding> {
        match self.cells.get(&offset) {
            Some(CacheCell::Resolved(binding)) => {
                self.stats.hits += 1;
                Some(binding.clone())
            }
            _ => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Record a binding; the first write wins.
    ///
    /// Returns false when the entry was already resolved.
    pub fn fill(&mut self, offset: usize, binding: Binding) -> bool {
        let cell = self.cells.entry(offset).or_default();
        if matches!(cell, CacheCell::Resolved(_)) {
            return false;
        }
        *cell = CacheCell::Resolved(binding);
        self.stats.fills += 1;
        trace!(offset, "binding cached");
        true
    }

    /// Counters
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
