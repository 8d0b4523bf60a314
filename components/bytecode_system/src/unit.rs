//! Bytecode units
//!
//! A [`BytecodeUnit`] is everything one compiled script hands to the
//! runtime: constant pools plus method, class and script descriptors, all
//! addressed by small integer ids from inline operands.

use core_types::{Multiname, Namespace, NamespaceKind, StringId, StringTable};

use crate::class_info::{ClassInfo, InstanceInfo, ScriptInfo};
use crate::method::MethodInfo;

/// Immutable compiled program
#[derive(Debug, Clone, Default)]
pub struct BytecodeUnit {
    /// Interned strings
    pub strings: StringTable,
    /// Namespace pool
    pub namespaces: Vec<Namespace>,
    /// Multiname pool
    pub multinames: Vec<Multiname>,
    /// Method descriptors
    pub methods: Vec<MethodInfo>,
    /// Instance halves of class descriptors
    pub instances: Vec<InstanceInfo>,
    /// Static halves of class descriptors (parallel to `instances`)
    pub classes: Vec<ClassInfo>,
    /// Top-level scripts
    pub scripts: Vec<ScriptInfo>,
}

impl BytecodeUnit {
    /// Multiname by pool index
    pub fn multiname(&self, index: u32) -> Option<&Multiname> {
        self.multinames.get(index as usize)
    }

    /// Namespace by pool index
    pub fn namespace(&self, index: u32) -> Option<&Namespace> {
        self.namespaces.get(index as usize)
    }

    /// Method by id
    pub fn method(&self, id: u32) -> Option<&MethodInfo> {
        self.methods.get(id as usize)
    }

    /// Number of classes
    pub fn class_count(&self) -> usize {
        self.instances.len()
    }
}

/// Incrementally assembles a [`BytecodeUnit`]
///
/// # Example
///
/// ```
/// use bytecode_system::{CodeBuilder, MethodBody, MethodInfo, Opcode, ScriptInfo, UnitBuilder};
///
/// let mut unit = UnitBuilder::new();
/// let mut code = CodeBuilder::new();
/// code.push_int(42).op(Opcode::ReturnValue);
///
/// let name = unit.intern("main");
/// let init = unit.method(MethodInfo::new(name).body(MethodBody::new(code.finish())));
/// unit.add_script(ScriptInfo { init, traits: Vec::new() });
///
/// let unit = unit.finish();
/// assert_eq!(unit.scripts.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct UnitBuilder {
    unit: BytecodeUnit,
}

impl UnitBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string
    pub fn intern(&mut self, s: &str) -> StringId {
        self.unit.strings.intern(s)
    }

    /// Add a namespace to the pool, reusing an identical entry
    pub fn namespace(&mut self, ns: Namespace) -> u32 {
        if let Some(i) = self.unit.namespaces.iter().position(|n| *n == ns) {
            return i as u32;
        }
        self.unit.namespaces.push(ns);
        (self.unit.namespaces.len() - 1) as u32
    }

    /// Namespace of the given kind named by `uri`
    pub fn named_namespace(&mut self, kind: NamespaceKind, uri: &str) -> Namespace {
        let uri = self.intern(uri);
        let ns = Namespace::new(uri, kind);
        self.namespace(ns);
        ns
    }

    /// Add a multiname to the pool, reusing an identical entry
    pub fn multiname(&mut self, mn: Multiname) -> u32 {
        if let Some(i) = self.unit.multinames.iter().position(|m| *m == mn) {
            return i as u32;
        }
        self.unit.multinames.push(mn);
        (self.unit.multinames.len() - 1) as u32
    }

    /// Multiname for `name` in exactly one namespace
    pub fn qname(&mut self, ns: Namespace, name: &str) -> u32 {
        let id = self.intern(name);
        self.multiname(Multiname::qualified(id, ns))
    }

    /// Multiname for `name` in the unnamed public namespace
    pub fn public_name(&mut self, name: &str) -> u32 {
        self.qname(Namespace::public(), name)
    }

    /// Multiname for `name` over an ordered namespace set
    pub fn multi(&mut self, name: &str, namespaces: Vec<Namespace>) -> u32 {
        let id = self.intern(name);
        self.multiname(Multiname::with_namespaces(id, namespaces))
    }

    /// Multiname whose local name is popped at run time
    pub fn runtime_name(&mut self, namespaces: Vec<Namespace>) -> u32 {
        self.multiname(Multiname::runtime(namespaces))
    }

    /// Add a method descriptor, returning its id
    pub fn method(&mut self, method: MethodInfo) -> u32 {
        self.unit.methods.push(method);
        (self.unit.methods.len() - 1) as u32
    }

    /// Add a class, returning its id
    pub fn add_class(&mut self, instance: InstanceInfo, class: ClassInfo) -> u32 {
        self.unit.instances.push(instance);
        self.unit.classes.push(class);
        (self.unit.instances.len() - 1) as u32
    }

    /// Add a script, returning its index
    pub fn add_script(&mut self, script: ScriptInfo) -> u32 {
        self.unit.scripts.push(script);
        (self.unit.scripts.len() - 1) as u32
    }

    /// Mutable access to an already added method
    pub fn method_mut(&mut self, id: u32) -> Option<&mut MethodInfo> {
        self.unit.methods.get_mut(id as usize)
    }

    /// Finish building
    pub fn finish(self) -> BytecodeUnit {
        self.unit
    }
}
