//! Class descriptors
//!
//! A linked class keeps its own copy of every inherited instance member in
//! `borrowed`, so instance lookups never walk the super chain. Static
//! members live on the class's companion object.

use std::cell::{Cell, RefCell};

use core_types::{ErrorKind, Namespace, StringId};

use crate::traits::TraitTable;
use crate::value::{ClassRef, FunctionRef, ObjectRef};

/// Builtin class identity, used for coercion and instance payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind {
    /// `Object`
    Object,
    /// `Class`
    Class,
    /// `Function`
    Function,
    /// `Namespace`
    Namespace,
    /// `Boolean`
    Boolean,
    /// `Number`
    Number,
    /// `int`
    Int,
    /// `uint`
    UInt,
    /// `String`
    String,
    /// `Array`
    Array,
    /// `Error` and its subclasses
    Error(ErrorKind),
    /// `Proxy`
    Proxy,
    /// `QName`
    QName,
}

/// Class modifier flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassFlags {
    /// Instances reject new dynamic properties
    pub sealed: bool,
    /// Cannot be extended
    pub is_final: bool,
    /// Interface
    pub is_interface: bool,
    /// Instances are recycled through a free-list
    pub reusable: bool,
}

/// Linking progress of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Skeleton declared, waiting for dependencies
    Declared,
    /// Traits copied down and interfaces merged
    Linked,
    /// Class initializer has run
    Initialized,
}

/// A class descriptor
pub struct Class {
    /// Local name
    pub name: StringId,
    /// Declaring namespace
    pub ns: Namespace,
    /// Id in the defining unit, `None` for builtins
    pub unit_id: Option<u32>,
    /// Builtin identity, inherited by subclasses of builtins
    pub builtin: Cell<Option<BuiltinKind>>,
    /// Super class
    pub super_class: RefCell<Option<ClassRef>>,
    /// Instance members, own and copied down from ancestors
    pub borrowed: RefCell<TraitTable>,
    /// Companion object holding static members
    pub object: ObjectRef,
    /// Prototype object
    pub prototype: ObjectRef,
    /// Instance constructor
    pub constructor: RefCell<Option<FunctionRef>>,
    /// Implemented interfaces, transitively
    pub interfaces: RefCell<Vec<ClassRef>>,
    /// Modifier flags
    pub flags: Cell<ClassFlags>,
    /// Protected namespace shared by the lineage
    pub protected_ns: Cell<Option<Namespace>>,
    /// Recycled instances
    pub free_list: RefCell<Vec<ObjectRef>>,
    /// Linking progress
    pub state: Cell<LinkState>,
}

impl Class {
    /// Unlinked class with empty tables
    pub fn new(name: StringId, ns: Namespace, object: ObjectRef, prototype: ObjectRef) -> Self {
        Self {
            name,
            ns,
            unit_id: None,
            builtin: Cell::new(None),
            super_class: RefCell::new(None),
            borrowed: RefCell::new(TraitTable::new()),
            object,
            prototype,
            constructor: RefCell::new(None),
            interfaces: RefCell::new(Vec::new()),
            flags: Cell::new(ClassFlags::default()),
            protected_ns: Cell::new(None),
            free_list: RefCell::new(Vec::new()),
            state: Cell::new(LinkState::Declared),
        }
    }

    /// Instances reject new dynamic properties
    pub fn is_sealed(&self) -> bool {
        self.flags.get().sealed
    }

    /// Interface declaration
    pub fn is_interface(&self) -> bool {
        self.flags.get().is_interface
    }

    /// Super class handle
    pub fn super_class(&self) -> Option<ClassRef> {
        self.super_class.borrow().clone()
    }

    /// Error class carried by instances of this class
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.builtin.get() {
            Some(BuiltinKind::Error(kind)) => Some(kind),
            _ => None,
        }
    }
}

impl ClassRef {
    /// Whether `self` is `other` or derives from it
    pub fn is_subclass_of(&self, other: &ClassRef) -> bool {
        let mut current = Some(self.clone());
        let mut guard = 0;
        while let Some(class) = current {
            if class.ptr_eq(other) {
                return true;
            }
            guard += 1;
            if guard > 1024 {
                return false;
            }
            current = class.super_class();
        }
        false
    }

    /// Whether `self` implements the interface `iface`
    pub fn implements(&self, iface: &ClassRef) -> bool {
        let mut current = Some(self.clone());
        while let Some(class) = current {
            if class.interfaces.borrow().iter().any(|i| i.ptr_eq(iface)) {
                return true;
            }
            current = class.super_class();
        }
        false
    }

    /// Subclass or implementor test used by `is`/`as`/coercion
    pub fn conforms_to(&self, target: &ClassRef) -> bool {
        if target.is_interface() {
            self.ptr_eq(target) || self.implements(target)
        } else {
            self.is_subclass_of(target)
        }
    }
}
