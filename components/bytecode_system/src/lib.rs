//! Bytecode system for the AVM runtime
//!
//! This crate provides the instruction set and the immutable descriptors
//! the interpreter consumes: methods, classes, traits and scripts, all
//! collected in a [`BytecodeUnit`].
//!
//! # Features
//!
//! - Stack-based instruction set with fixed-size inline operands
//! - [`CodeBuilder`] with label patching for branches
//! - [`decode`] with branch-target validation
//! - Load-time structural [`Verifier`]
//!
//! # Example
//!
//! ```
//! use bytecode_system::{decode_all, CodeBuilder, Opcode};
//!
//! let mut code = CodeBuilder::new();
//! code.push_int(2).push_int(3).op(Opcode::AddI).op(Opcode::ReturnValue);
//! let bytes = code.finish();
//!
//! let ops: Vec<_> = decode_all(&bytes).unwrap().iter().map(|i| i.opcode).collect();
//! assert_eq!(ops, vec![Opcode::PushInt, Opcode::PushInt, Opcode::AddI, Opcode::ReturnValue]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod class_info;
pub mod instruction;
pub mod method;
pub mod opcode;
pub mod unit;
pub mod value;
pub mod verifier;

// Re-export main types at crate root
pub use builder::{CodeBuilder, Label};
pub use class_info::{ClassInfo, InstanceInfo, ScriptInfo, TraitInfo, TraitInfoKind};
pub use instruction::{decode, decode_all, DecodeError, Instruction, Operand};
pub use method::{ExceptionInfo, MethodBody, MethodFlags, MethodInfo, ParamInfo};
pub use opcode::{Opcode, OperandLayout};
pub use unit::{BytecodeUnit, UnitBuilder};
pub use value::ConstValue;
pub use verifier::{operand_pool, Pool, Verifier, VerifyFailure};
