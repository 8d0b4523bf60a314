//! Function objects
//!
//! A function is either a compiled method or a native entry registered
//! with the runtime. Closures capture the scope chain that was active when
//! they were created; method closures also carry a fixed receiver.

use std::rc::Rc;

use core_types::StringId;

use crate::value::{ClassRef, ObjectRef, Value};

/// Index of a native entry in the runtime's native table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeId(pub u32);

/// What runs when the function is called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Compiled method by id
    Script(u32),
    /// Native entry
    Native(NativeId),
}

/// One captured scope chain entry
#[derive(Debug, Clone)]
pub struct ScopeEntry {
    /// Scope object
    pub value: Value,
    /// Pushed by `pushwith`: dynamic properties are visible
    pub with: bool,
}

/// Captured scope chain, outermost first
pub type ScopeChain = Rc<[ScopeEntry]>;

/// A function value
#[derive(Debug, Clone)]
pub struct Function {
    /// Body
    pub kind: FunctionKind,
    /// Debug name
    pub name: StringId,
    /// Fixed receiver of a method closure
    pub bound_this: Option<Value>,
    /// Scope chain captured at creation
    pub scope: ScopeChain,
    /// Class whose trait declared this method (`super` resolves from here)
    pub home: Option<ClassRef>,
    /// Companion object holding the function's own properties
    pub object: ObjectRef,
}

impl Function {
    /// Function with no captured scope and no receiver
    pub fn new(kind: FunctionKind, name: StringId, object: ObjectRef) -> Self {
        Self {
            kind,
            name,
            bound_this: None,
            scope: Rc::from(Vec::new()),
            home: None,
            object,
        }
    }

    /// Set the captured scope chain
    pub fn with_scope(mut self, scope: ScopeChain) -> Self {
        self.scope = scope;
        self
    }

    /// Set the declaring class
    pub fn with_home(mut self, home: Option<ClassRef>) -> Self {
        self.home = home;
        self
    }

    /// Method id of a compiled function
    pub fn method_id(&self) -> Option<u32> {
        match self.kind {
            FunctionKind::Script(id) => Some(id),
            FunctionKind::Native(_) => None,
        }
    }

    /// Copy of this function bound to `receiver`, sharing body and scope
    pub fn bind(&self, receiver: Value, object: ObjectRef) -> Function {
        Function {
            bound_this: Some(receiver),
            object,
            ..self.clone()
        }
    }
}
