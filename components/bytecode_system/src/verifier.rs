//! Structural verification of bytecode units
//!
//! Runs once at load time so the interpreter can trust pool indices and
//! instruction boundaries. Semantic faults that depend on run-time state
//! (stack depth, local bounds) are still checked while interpreting.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::class_info::TraitInfo;
use crate::instruction::{decode_all, DecodeError};
use crate::method::MethodBody;
use crate::opcode::Opcode;
use crate::unit::BytecodeUnit;

/// Constant pool an inline operand indexes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pool {
    /// String table
    String,
    /// Namespace pool
    Namespace,
    /// Multiname pool
    Multiname,
    /// Method descriptors
    Method,
    /// Class descriptors
    Class,
}

/// Pool referenced by the first operand of `opcode`, if any
pub fn operand_pool(opcode: Opcode) -> Option<Pool> {
    use Opcode::*;
    match opcode {
        PushString | Dxns => Some(Pool::String),
        PushNamespace => Some(Pool::Namespace),
        NewFunction => Some(Pool::Method),
        NewClass => Some(Pool::Class),
        GetSuper | SetSuper | FindPropStrict | FindProperty | GetLex | SetProperty
        | GetProperty | InitProperty | DeleteProperty | Coerce | AsType | IsType | CallSuper
        | CallProperty | ConstructProp | CallSuperVoid | CallPropVoid => Some(Pool::Multiname),
        _ => None,
    }
}

/// A structural defect found in a unit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    /// An instruction failed to decode
    #[error("method {method}: {source}")]
    Decode {
        /// Method id
        method: u32,
        /// Underlying decode error
        source: DecodeError,
    },
    /// A branch lands inside another instruction
    #[error("method {method}: branch at {offset} targets the middle of an instruction ({target})")]
    MisalignedBranch {
        /// Method id
        method: u32,
        /// Branch offset
        offset: usize,
        /// Target offset
        target: usize,
    },
    /// An inline operand indexes past the end of its pool
    #[error("method {method}: operand {index} at {offset} is outside the {pool:?} pool")]
    PoolIndex {
        /// Method id
        method: u32,
        /// Instruction offset
        offset: usize,
        /// Referenced pool
        pool: Pool,
        /// Offending index
        index: u32,
    },
    /// An exception range is empty, out of bounds or has a bad target
    #[error("method {method}: exception handler {handler} is malformed")]
    BadHandler {
        /// Method id
        method: u32,
        /// Handler position in the table
        handler: usize,
    },
    /// A descriptor refers to a method or class that does not exist
    #[error("dangling {what} reference {index}")]
    Dangling {
        /// Kind of reference
        what: &'static str,
        /// Offending index
        index: u32,
    },
}

/// Load-time verifier
pub struct Verifier<'a> {
    unit: &'a BytecodeUnit,
}

impl<'a> Verifier<'a> {
    /// Create a verifier for `unit`
    pub fn new(unit: &'a BytecodeUnit) -> Self {
        Self { unit }
    }

    /// Verify every method body and descriptor reference
    pub fn verify(&self) -> Result<(), VerifyFailure> {
        for (id, method) in self.unit.methods.iter().enumerate() {
            if let Some(body) = &method.body {
                self.verify_body(id as u32, body)?;
            }
            for param in &method.params {
                self.check_multiname(param.type_name)?;
            }
            self.check_multiname(method.return_type)?;
        }

        for (instance, class) in self.unit.instances.iter().zip(&self.unit.classes) {
            self.check_method(instance.init)?;
            self.check_method(class.init)?;
            self.check_multiname(Some(instance.name))?;
            self.check_multiname(instance.super_name)?;
            for iface in &instance.interfaces {
                self.check_multiname(Some(*iface))?;
            }
            self.verify_traits(&instance.traits)?;
            self.verify_traits(&class.traits)?;
        }

        for script in &self.unit.scripts {
            self.check_method(script.init)?;
            self.verify_traits(&script.traits)?;
        }
        Ok(())
    }

    fn verify_traits(&self, traits: &[TraitInfo]) -> Result<(), VerifyFailure> {
        for t in traits {
            self.check_multiname(Some(t.name))?;
            if let Some(method) = t.method_id() {
                self.check_method(method)?;
            }
            if let crate::class_info::TraitInfoKind::Class { class, .. } = t.kind {
                if class as usize >= self.unit.instances.len() {
                    return Err(VerifyFailure::Dangling {
                        what: "class",
                        index: class,
                    });
                }
            }
        }
        Ok(())
    }

    fn verify_body(&self, method: u32, body: &MethodBody) -> Result<(), VerifyFailure> {
        let code = &body.code;
        let instructions =
            decode_all(code).map_err(|source| VerifyFailure::Decode { method, source })?;
        let starts: FxHashSet<usize> = instructions.iter().map(|i| i.offset).collect();

        for inst in &instructions {
            if let Some(target) = inst.target() {
                if !starts.contains(&target) {
                    return Err(VerifyFailure::MisalignedBranch {
                        method,
                        offset: inst.offset,
                        target,
                    });
                }
            }
            if let Some(pool) = operand_pool(inst.opcode) {
                let index = inst.arg();
                if !self.in_pool(pool, index) {
                    return Err(VerifyFailure::PoolIndex {
                        method,
                        offset: inst.offset,
                        pool,
                        index,
                    });
                }
            }
        }

        for (handler, info) in body.exceptions.iter().enumerate() {
            let from = info.from as usize;
            let to = info.to as usize;
            let well_formed = from < to
                && to <= code.len()
                && starts.contains(&from)
                && starts.contains(&(info.target as usize));
            if !well_formed {
                return Err(VerifyFailure::BadHandler { method, handler });
            }
            self.check_multiname(info.exc_type)?;
        }
        Ok(())
    }

    fn in_pool(&self, pool: Pool, index: u32) -> bool {
        let index = index as usize;
        match pool {
            Pool::String => index < self.unit.strings.len(),
            Pool::Namespace => index < self.unit.namespaces.len(),
            Pool::Multiname => index < self.unit.multinames.len(),
            Pool::Method => index < self.unit.methods.len(),
            Pool::Class => index < self.unit.instances.len(),
        }
    }

    fn check_method(&self, id: u32) -> Result<(), VerifyFailure> {
        if self.in_pool(Pool::Method, id) {
            Ok(())
        } else {
            Err(VerifyFailure::Dangling {
                what: "method",
                index: id,
            })
        }
    }

    fn check_multiname(&self, index: Option<u32>) -> Result<(), VerifyFailure> {
        match index {
            Some(i) if !self.in_pool(Pool::Multiname, i) => Err(VerifyFailure::Dangling {
                what: "multiname",
                index: i,
            }),
            _ => Ok(()),
        }
    }
}
