//! Execution core for the AVM runtime
//!
//! This crate links a [`bytecode_system::BytecodeUnit`] into live classes and
//! runs its methods:
//! - Class linking with copy-down trait tables and override checks
//! - Multiname property resolution over own, class and prototype layers
//! - Stack-based dispatch loop with exception-range handlers
//! - Per-instruction binding caches for lexical and type lookups
//! - Invocation profiling with a tier-up threshold
//!
//! # Example
//!
//! ```
//! use bytecode_system::{CodeBuilder, MethodBody, MethodInfo, Opcode, ScriptInfo, UnitBuilder};
//! use interpreter::{Runtime, RuntimeConfig};
//! use object_model::Value;
//!
//! let mut unit = UnitBuilder::new();
//! let mut code = CodeBuilder::new();
//! code.push_int(40).push_int(2).op(Opcode::AddI).op(Opcode::ReturnValue);
//! let name = unit.intern("main");
//! let init = unit.method(MethodInfo::new(name).body(MethodBody::new(code.finish())));
//! unit.add_script(ScriptInfo { init, traits: Vec::new() });
//!
//! let mut runtime = Runtime::load(unit.finish(), RuntimeConfig::default()).unwrap();
//! assert_eq!(runtime.run_script(0).unwrap(), Value::Int(42));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod arith;
pub mod binding_cache;
mod builtins;
pub mod call_frame;
pub mod coerce;
pub mod config;
mod dispatch;
mod invoker;
mod linker;
pub mod profile;
pub mod resolver;
pub mod runtime;

// Re-export main types at crate root
pub use binding_cache::{Binding, CacheStats};
pub use builtins::FLASH_PROXY_URI;
pub use call_frame::CallFrame;
pub use coerce::Hint;
pub use config::RuntimeConfig;
pub use profile::{ProfileData, Tier};
pub use resolver::{Holder, Lookup, ResolveMode, Resolved};
pub use runtime::{CallContext, NativeFn, Runtime};
