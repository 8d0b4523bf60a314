//! Class, trait and script descriptors
//!
//! Immutable compile-time descriptions of classes and their members.
//! Names are multiname indices into the owning unit's pool.

use core_types::Namespace;

use crate::value::ConstValue;

/// Kind-specific data of a declared trait
#[derive(Debug, Clone, PartialEq)]
pub enum TraitInfoKind {
    /// Writable variable
    Slot {
        /// 1-based slot id (0 = assign automatically)
        slot_id: u32,
        /// Multiname index of the declared type
        type_name: Option<u32>,
        /// Initial value
        value: Option<ConstValue>,
    },
    /// Write-once variable
    Const {
        /// 1-based slot id (0 = assign automatically)
        slot_id: u32,
        /// Multiname index of the declared type
        type_name: Option<u32>,
        /// Initial value
        value: Option<ConstValue>,
    },
    /// Method
    Method {
        /// Method id
        method: u32,
    },
    /// Getter half of an accessor
    Getter {
        /// Method id
        method: u32,
    },
    /// Setter half of an accessor
    Setter {
        /// Method id
        method: u32,
    },
    /// Slot holding a class
    Class {
        /// 1-based slot id (0 = assign automatically)
        slot_id: u32,
        /// Class id
        class: u32,
    },
    /// Slot holding a function closure
    Function {
        /// 1-based slot id (0 = assign automatically)
        slot_id: u32,
        /// Method id
        method: u32,
    },
}

/// One declared member
#[derive(Debug, Clone, PartialEq)]
pub struct TraitInfo {
    /// Multiname index of the member's qualified name
    pub name: u32,
    /// Kind-specific data
    pub kind: TraitInfoKind,
    /// May not be overridden
    pub is_final: bool,
    /// Overrides an inherited member
    pub is_override: bool,
}

impl TraitInfo {
    /// Trait with default modifiers
    pub fn new(name: u32, kind: TraitInfoKind) -> Self {
        Self {
            name,
            kind,
            is_final: false,
            is_override: false,
        }
    }

    /// Writable variable
    pub fn slot(name: u32, type_name: Option<u32>, value: Option<ConstValue>) -> Self {
        Self::new(
            name,
            TraitInfoKind::Slot {
                slot_id: 0,
                type_name,
                value,
            },
        )
    }

    /// Constant
    pub fn constant(name: u32, type_name: Option<u32>, value: Option<ConstValue>) -> Self {
        Self::new(
            name,
            TraitInfoKind::Const {
                slot_id: 0,
                type_name,
                value,
            },
        )
    }

    /// Method
    pub fn method(name: u32, method: u32) -> Self {
        Self::new(name, TraitInfoKind::Method { method })
    }

    /// Getter
    pub fn getter(name: u32, method: u32) -> Self {
        Self::new(name, TraitInfoKind::Getter { method })
    }

    /// Setter
    pub fn setter(name: u32, method: u32) -> Self {
        Self::new(name, TraitInfoKind::Setter { method })
    }

    /// Class slot
    pub fn class(name: u32, class: u32) -> Self {
        Self::new(name, TraitInfoKind::Class { slot_id: 0, class })
    }

    /// Mark as final
    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Mark as override
    pub fn override_(mut self) -> Self {
        self.is_override = true;
        self
    }

    /// Whether this trait is backed by a method body
    pub fn method_id(&self) -> Option<u32> {
        match self.kind {
            TraitInfoKind::Method { method }
            | TraitInfoKind::Getter { method }
            | TraitInfoKind::Setter { method }
            | TraitInfoKind::Function { method, .. } => Some(method),
            _ => None,
        }
    }
}

/// Instance-side description of a class
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceInfo {
    /// Multiname index of the class name
    pub name: u32,
    /// Multiname index of the super class (`None` only for the root)
    pub super_name: Option<u32>,
    /// Instances reject new dynamic properties
    pub sealed: bool,
    /// Cannot be extended
    pub is_final: bool,
    /// Interface declaration
    pub is_interface: bool,
    /// Instances may be recycled through a free-list
    pub reusable: bool,
    /// Protected namespace declared by this class
    pub protected_ns: Option<Namespace>,
    /// Multiname indices of implemented interfaces
    pub interfaces: Vec<u32>,
    /// Instance constructor method id
    pub init: u32,
    /// Instance traits
    pub traits: Vec<TraitInfo>,
}

impl InstanceInfo {
    /// Sealed, non-final class with no traits
    pub fn new(name: u32, super_name: Option<u32>, init: u32) -> Self {
        Self {
            name,
            super_name,
            sealed: true,
            is_final: false,
            is_interface: false,
            reusable: false,
            protected_ns: None,
            interfaces: Vec::new(),
            init,
            traits: Vec::new(),
        }
    }
}

/// Static-side description of a class
#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    /// Class initializer method id
    pub init: u32,
    /// Static traits
    pub traits: Vec<TraitInfo>,
}

/// Top-level script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptInfo {
    /// Script initializer method id
    pub init: u32,
    /// Global traits
    pub traits: Vec<TraitInfo>,
}
