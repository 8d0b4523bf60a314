//! Script object representation
//!
//! An object owns its trait table, a back-reference to its class and the
//! prototype link used as the last lookup fallback. Declared instance
//! variables are copied in from the class on first use.

use std::rc::Rc;

use core_types::{Namespace, StringId};

use crate::traits::{TraitKind, TraitTable};
use crate::value::{ClassRef, ObjectRef, Value};

/// Construction progress of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConstructionState {
    /// Identity exists, instance variables not copied in yet
    Allocated,
    /// Instance variables are present
    TraitsMaterialized,
    /// Constructor chain is running
    Constructing,
    /// Constructor chain finished
    Constructed,
}

/// Host-defined payload of an object
#[derive(Debug, Clone, Default)]
pub enum ObjectKind {
    /// Ordinary object
    #[default]
    Plain,
    /// Dense array storage
    Array(Vec<Value>),
    /// Qualified name handed to proxy hooks
    QName {
        /// Local name
        local: StringId,
        /// Namespace set of the original lookup
        namespaces: Rc<[Namespace]>,
    },
}

/// A script object
#[derive(Debug, Clone)]
pub struct ScriptObject {
    /// Own properties
    pub traits: TraitTable,
    /// Class of this object
    pub class: Option<ClassRef>,
    /// Construction progress
    pub state: ConstructionState,
    /// Payload
    pub kind: ObjectKind,
    /// Next object in the prototype chain
    pub proto: Option<ObjectRef>,
}

impl ScriptObject {
    /// Fully constructed object with no own properties
    pub fn plain(class: Option<ClassRef>, proto: Option<ObjectRef>) -> Self {
        Self {
            traits: TraitTable::new(),
            class,
            state: ConstructionState::Constructed,
            kind: ObjectKind::Plain,
            proto,
        }
    }

    /// Freshly allocated instance awaiting construction
    pub fn allocated(class: ClassRef, proto: Option<ObjectRef>, kind: ObjectKind) -> Self {
        Self {
            traits: TraitTable::new(),
            class: Some(class),
            state: ConstructionState::Allocated,
            kind,
            proto,
        }
    }

    /// Array object
    pub fn array(class: Option<ClassRef>, proto: Option<ObjectRef>, elements: Vec<Value>) -> Self {
        Self {
            kind: ObjectKind::Array(elements),
            ..Self::plain(class, proto)
        }
    }

    /// Whether new dynamic properties may be added
    pub fn is_sealed(&self) -> bool {
        self.class.as_ref().is_some_and(|c| c.is_sealed())
    }

    /// Array storage, if any
    pub fn elements(&self) -> Option<&Vec<Value>> {
        match &self.kind {
            ObjectKind::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable array storage, if any
    pub fn elements_mut(&mut self) -> Option<&mut Vec<Value>> {
        match &mut self.kind {
            ObjectKind::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Copy the class's instance variables in, once.
    ///
    /// Returns true when variables were copied by this call.
    pub fn materialize(&mut self) -> bool {
        if self.state != ConstructionState::Allocated {
            return false;
        }
        if let Some(class) = self.class.clone() {
            let template = class.borrowed.borrow();
            for (_, t) in template.iter() {
                if matches!(t.kind, TraitKind::Instance | TraitKind::Constant) {
                    self.traits.insert(t.name, t.kind, t.var.clone());
                }
            }
        }
        self.state = ConstructionState::TraitsMaterialized;
        true
    }

    /// Return a recycled instance to its just-allocated state
    pub fn reset(&mut self) {
        self.traits = TraitTable::new();
        self.state = ConstructionState::Allocated;
        if let ObjectKind::Array(v) = &mut self.kind {
            v.clear();
        }
    }
}
