//! Object model - values, trait tables, objects and classes
//!
//! This component provides:
//! - [`Value`], the tagged script value with reference-counted handles
//! - [`TraitTable`], the namespace-aware property multimap
//! - [`ScriptObject`] with lazy instance-variable materialization
//! - [`Class`] descriptors with copied-down inherited members
//! - [`Function`] values with captured scope chains
//! - [`Heap`] allocation with per-class free-lists

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod class;
pub mod exception;
pub mod function;
pub mod heap;
pub mod object;
pub mod traits;
pub mod value;

// Re-export main types
pub use class::{BuiltinKind, Class, ClassFlags, LinkState};
pub use exception::{Exception, ScriptResult};
pub use function::{Function, FunctionKind, NativeId, ScopeChain, ScopeEntry};
pub use heap::{Heap, HeapStats};
pub use object::{ConstructionState, ObjectKind, ScriptObject};
pub use traits::{KindMask, Trait, TraitKind, TraitTable, TypeSlot, VarSlot, Variable};
pub use value::{ClassRef, FunctionRef, ObjectRef, Value};
