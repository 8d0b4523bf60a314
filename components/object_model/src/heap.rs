//! Object allocation with per-class free-lists.
//!
//! Objects are reference-counted and released when their last handle is
//! dropped. Classes marked reusable keep released instances on a
//! free-list so construction can skip a fresh allocation.

use tracing::trace;

use crate::class::BuiltinKind;
use crate::object::{ObjectKind, ScriptObject};
use crate::value::{ClassRef, ObjectRef};

/// Allocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Fresh allocations
    pub allocated: usize,
    /// Allocations served from a free-list
    pub recycled: usize,
    /// Instances returned to a free-list
    pub released: usize,
}

/// Allocator front end
#[derive(Debug, Default)]
pub struct Heap {
    stats: HeapStats,
    /// Upper bound on each class's free-list length
    free_list_limit: usize,
}

/// Default free-list length per class
const FREE_LIST_LIMIT: usize = 64;

impl Heap {
    /// Creates a heap with the default free-list limit.
    pub fn new() -> Self {
        Heap {
            stats: HeapStats::default(),
            free_list_limit: FREE_LIST_LIMIT,
        }
    }

    /// Allocates an unconstructed instance of `class`.
    ///
    /// Reusable classes pop from their free-list first.
    pub fn allocate(&mut self, class: &ClassRef) -> ObjectRef {
        if class.flags.get().reusable {
            if let Some(obj) = class.free_list.borrow_mut().pop() {
                obj.borrow_mut().reset();
                self.stats.recycled += 1;
                trace!(class = class.name.0, "recycled instance from free-list");
                return obj;
            }
        }
        self.stats.allocated += 1;
        let kind = match class.builtin.get() {
            Some(BuiltinKind::Array) => ObjectKind::Array(Vec::new()),
            _ => ObjectKind::Plain,
        };
        ObjectRef::new(ScriptObject::allocated(
            class.clone(),
            Some(class.prototype.clone()),
            kind,
        ))
    }

    /// Allocates a constructed object outside any class factory.
    pub fn allocate_plain(&mut self, object: ScriptObject) -> ObjectRef {
        self.stats.allocated += 1;
        ObjectRef::new(object)
    }

    /// Offers an instance back to its class's free-list.
    ///
    /// Only succeeds when `obj` is the last handle and the class is
    /// reusable; otherwise the handle is simply dropped.
    pub fn release(&mut self, obj: ObjectRef) -> bool {
        if obj.ref_count() != 1 {
            return false;
        }
        let class = match obj.borrow().class.clone() {
            Some(c) if c.flags.get().reusable => c,
            _ => return false,
        };
        let mut free = class.free_list.borrow_mut();
        if free.len() >= self.free_list_limit {
            return false;
        }
        free.push(obj);
        self.stats.released += 1;
        true
    }

    /// Returns the allocation counters.
    pub fn stats(&self) -> HeapStats {
        self.stats
    }
}
