//! Class linking
//!
//! Every unit class is declared as a skeleton first. Classes are then linked
//! once their super class and interfaces are linked, so declaration order in
//! the unit does not matter. Linking copies the parent's instance members
//! down, merges the class's own traits with override checks, aliases
//! interface members onto their public implementations and wires the
//! prototype and static objects.

use std::rc::Rc;

use rustc_hash::FxHashSet;
use tracing::debug;

use bytecode_system::{ConstValue, TraitInfo, TraitInfoKind};
use core_types::{NameKey, Namespace, StringId};
use object_model::{
    Class, ClassFlags, ClassRef, Exception, FunctionKind, FunctionRef, KindMask, LinkState,
    ScopeChain, ScopeEntry, ScriptObject, ScriptResult, TraitKind, TraitTable, TypeSlot, Value,
    VarSlot, Variable,
};

use crate::runtime::{Names, Runtime};

/// Copy of `parent`'s instance members for a new subclass
pub(crate) fn copy_down(parent: &ClassRef) -> TraitTable {
    let mut table = parent.borrowed.borrow().clone();
    let sealed = parent.is_sealed();
    let positions: Vec<u32> = table.iter().map(|(pos, _)| pos).collect();
    for pos in positions {
        if let Some(t) = table.get_mut(pos) {
            t.var.inherited_sealed.get_or_insert(sealed);
        }
    }
    table
}

/// Link `prototype.constructor` and `Class.prototype`
pub(crate) fn wire_class(class: &ClassRef, names: &Names) {
    class.prototype.borrow_mut().traits.insert(
        names.constructor,
        TraitKind::Dynamic,
        Variable::value(Namespace::public(), Value::Class(class.clone())),
    );
    class.object.borrow_mut().traits.insert(
        names.prototype,
        TraitKind::Constant,
        Variable::value(Namespace::public(), Value::Object(class.prototype.clone())),
    );
}

/// Table a trait list is merged into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraitTarget {
    Instance,
    Static,
    Script,
}

impl Runtime {
    /// Declare, order and link every class of the unit
    pub(crate) fn link_unit(&mut self) -> ScriptResult<()> {
        let unit = self.unit.clone();
        for (id, info) in unit.instances.iter().enumerate() {
            let mn = self.pool_multiname(info.name)?;
            let name = mn
                .name
                .as_str()
                .ok_or_else(|| Exception::verify_error(format!("class {} has no name", id)))?;
            let ns = mn.namespaces.first().copied().unwrap_or_else(Namespace::public);
            let statics = self.heap.allocate_plain(ScriptObject::plain(
                Some(self.builtins.class.clone()),
                Some(self.builtins.class.prototype.clone()),
            ));
            let prototype = self
                .heap
                .allocate_plain(ScriptObject::plain(Some(self.builtins.object.clone()), None));
            let class = Class {
                unit_id: Some(id as u32),
                ..Class::new(name, ns, statics, prototype)
            };
            class.flags.set(ClassFlags {
                sealed: info.sealed,
                is_final: info.is_final,
                is_interface: info.is_interface,
                reusable: info.reusable,
            });
            self.classes[id] = Some(ClassRef::new(class));
        }

        let mut pending: Vec<usize> = (0..unit.instances.len()).collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for id in pending {
                if self.dependencies_ready(id)? {
                    self.link_class(id)?;
                } else {
                    waiting.push(id);
                }
            }
            if waiting.len() == before {
                let names: Vec<String> = waiting
                    .iter()
                    .filter_map(|id| self.classes[*id].as_ref())
                    .map(|c| self.strings.get(c.name).to_string())
                    .collect();
                return Err(Exception::verify_error(format!(
                    "Circular inheritance involving {}",
                    names.join(", ")
                )));
            }
            pending = waiting;
        }
        Ok(())
    }

    /// Class named by a pool multiname: `Ok(None)` while it is still unlinked
    fn dependency(&mut self, index: u32) -> ScriptResult<Option<ClassRef>> {
        let mn = self.pool_multiname(index)?;
        let name = mn
            .name
            .as_str()
            .ok_or_else(|| Exception::verify_error("base class names must be strings"))?;
        let local = self
            .classes
            .iter()
            .flatten()
            .find(|c| c.name == name && mn.matches_namespace(&c.ns))
            .cloned();
        if let Some(class) = local {
            return Ok((class.state.get() != LinkState::Declared).then_some(class));
        }
        self.builtins
            .all()
            .into_iter()
            .find(|c| c.name == name && mn.matches_namespace(&c.ns))
            .map(Some)
            .ok_or_else(|| {
                Exception::verify_error(format!(
                    "Class {} could not be found.",
                    self.strings.get(name)
                ))
            })
    }

    fn dependencies_ready(&mut self, id: usize) -> ScriptResult<bool> {
        let unit = self.unit.clone();
        let info = &unit.instances[id];
        if let Some(index) = info.super_name {
            if self.dependency(index)?.is_none() {
                return Ok(false);
            }
        }
        for index in &info.interfaces {
            if self.dependency(*index)?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn linked_dependency(&mut self, index: u32) -> ScriptResult<ClassRef> {
        self.dependency(index)?
            .ok_or_else(|| Exception::verify_error("dependency linked out of order"))
    }

    fn class_scope(&self, class: &ClassRef) -> ScopeChain {
        Rc::from(vec![
            ScopeEntry {
                value: self.global(),
                with: false,
            },
            ScopeEntry {
                value: Value::Class(class.clone()),
                with: false,
            },
        ])
    }

    fn link_class(&mut self, id: usize) -> ScriptResult<()> {
        let unit = self.unit.clone();
        let info = &unit.instances[id];
        let statics = unit
            .classes
            .get(id)
            .ok_or_else(|| Exception::verify_error(format!("class {} has no static part", id)))?;
        let class = self.classes[id]
            .clone()
            .ok_or_else(|| Exception::verify_error(format!("class {} was not declared", id)))?;
        let class_name = self.strings.get(class.name).to_string();

        let super_class = match info.super_name {
            Some(index) => Some(self.linked_dependency(index)?),
            None if class.is_interface() => None,
            None => Some(self.builtins.object.clone()),
        };
        if let Some(sup) = &super_class {
            if sup.flags.get().is_final {
                return Err(Exception::verify_error(format!(
                    "Class {} cannot extend final class {}.",
                    class_name,
                    self.strings.get(sup.name)
                )));
            }
            if sup.is_interface() {
                return Err(Exception::verify_error(format!(
                    "Class {} cannot extend interface {}.",
                    class_name,
                    self.strings.get(sup.name)
                )));
            }
            class.builtin.set(sup.builtin.get());
            *class.borrowed.borrow_mut() = copy_down(sup);
            *class.super_class.borrow_mut() = Some(sup.clone());
        }

        let lineage = super_class.as_ref().and_then(|s| s.protected_ns.get());
        match (info.protected_ns, lineage) {
            (Some(own), Some(shared)) => {
                self.ns_aliases.insert(own, shared);
                class.protected_ns.set(Some(shared));
            }
            (own, shared) => class.protected_ns.set(own.or(shared)),
        }

        let scope = self.class_scope(&class);
        let mut table = std::mem::take(&mut *class.borrowed.borrow_mut());
        let merged = self.merge_traits(&mut table, &info.traits, TraitTarget::Instance, &scope, Some(&class));
        *class.borrowed.borrow_mut() = table;
        merged?;

        let mut interfaces: Vec<ClassRef> = Vec::new();
        for index in &info.interfaces {
            let iface = self.linked_dependency(*index)?;
            if !iface.is_interface() {
                return Err(Exception::verify_error(format!(
                    "{} is not an interface.",
                    self.strings.get(iface.name)
                )));
            }
            let inherited = iface.interfaces.borrow().clone();
            for i in std::iter::once(iface).chain(inherited) {
                if !interfaces.iter().any(|known| known.ptr_eq(&i)) {
                    interfaces.push(i);
                }
            }
        }
        *class.interfaces.borrow_mut() = interfaces;
        if !class.is_interface() {
            self.alias_interface_members(&class)?;
        }

        class.prototype.borrow_mut().proto = Some(
            super_class
                .as_ref()
                .map_or_else(|| self.builtins.object.prototype.clone(), |s| s.prototype.clone()),
        );
        wire_class(&class, &self.names);

        let mut table = std::mem::take(&mut class.object.borrow_mut().traits);
        let merged = self.merge_traits(&mut table, &statics.traits, TraitTarget::Static, &scope, Some(&class));
        class.object.borrow_mut().traits = table;
        merged?;

        if !class.is_interface() {
            let ctor = self.method_closure(info.init, &scope, Some(&class));
            *class.constructor.borrow_mut() = Some(ctor);
        }

        class.state.set(LinkState::Linked);
        self.link_order.push(class.clone());
        self.global.borrow_mut().traits.insert(
            class.name,
            TraitKind::Constant,
            Variable::value(class.ns, Value::Class(class.clone())),
        );
        debug!(
            class = %class_name,
            super_class = %super_class.as_ref().map_or("", |s| self.strings.get(s.name)),
            members = class.borrowed.borrow().len(),
            "class linked"
        );
        Ok(())
    }

    /// Expose each interface member under the interface's namespace,
    /// bound to the class's public implementation
    fn alias_interface_members(&mut self, class: &ClassRef) -> ScriptResult<()> {
        let mut all: Vec<ClassRef> = Vec::new();
        let mut current = Some(class.clone());
        while let Some(c) = current {
            all.extend(c.interfaces.borrow().iter().cloned());
            current = c.super_class();
        }
        for iface in all {
            let members: Vec<(StringId, Namespace)> = iface
                .borrowed
                .borrow()
                .iter()
                .filter(|(_, t)| t.kind == TraitKind::Declared && !t.var.ns.is_empty_public())
                .map(|(_, t)| (t.name, t.var.ns))
                .collect();
            let mut table = class.borrowed.borrow_mut();
            for (name, ns) in members {
                let implementation = table
                    .find(name, &Namespace::public(), KindMask::DECLARED)
                    .and_then(|pos| table.get(pos))
                    .map(|t| t.var.clone());
                let Some(mut var) = implementation else {
                    return Err(Exception::verify_error(format!(
                        "Class {} does not implement {} from interface {}.",
                        self.strings.get(class.name),
                        self.strings.get(name),
                        self.strings.get(iface.name)
                    )));
                };
                var.ns = ns;
                table.insert(name, TraitKind::Declared, var);
            }
        }
        Ok(())
    }

    fn method_closure(&mut self, method: u32, scope: &ScopeChain, home: Option<&ClassRef>) -> FunctionRef {
        let name = self.method_name(method);
        self.new_function(FunctionKind::Script(method), name, scope.clone(), home.cloned())
    }

    fn merge_traits(
        &mut self,
        table: &mut TraitTable,
        traits: &[TraitInfo],
        target: TraitTarget,
        scope: &ScopeChain,
        home: Option<&ClassRef>,
    ) -> ScriptResult<()> {
        let mut accessor_halves: FxHashSet<(StringId, Namespace, bool)> = FxHashSet::default();
        for info in traits {
            let mn = self.pool_multiname(info.name)?;
            let name = mn
                .name
                .as_str()
                .ok_or_else(|| Exception::verify_error("trait names must be strings"))?;
            let ns = mn.namespaces.first().copied().unwrap_or_else(Namespace::public);
            match &info.kind {
                TraitInfoKind::Method { method } => {
                    if target == TraitTarget::Instance {
                        self.check_override(table, name, ns, info)?;
                    }
                    let f = self.method_closure(*method, scope, home);
                    let mut var = Variable::value(ns, Value::Function(f));
                    var.is_final = info.is_final;
                    table.insert(name, TraitKind::Declared, var);
                }
                TraitInfoKind::Getter { method } | TraitInfoKind::Setter { method } => {
                    let is_getter = matches!(info.kind, TraitInfoKind::Getter { .. });
                    let partner_here = accessor_halves.contains(&(name, ns, !is_getter));
                    if !accessor_halves.insert((name, ns, is_getter)) {
                        return Err(Exception::verify_error(format!(
                            "Duplicate accessor {}",
                            self.strings.get(name)
                        )));
                    }
                    if target == TraitTarget::Instance && !partner_here {
                        self.check_override(table, name, ns, info)?;
                    }
                    let existing = table
                        .find(name, &ns, KindMask::DECLARED)
                        .and_then(|pos| table.get(pos))
                        .map(|t| t.var.slot.clone());
                    let (getter, setter) = match existing {
                        Some(VarSlot::Accessor { getter, setter }) => (getter, setter),
                        _ => (None, None),
                    };
                    let f = self.method_closure(*method, scope, home);
                    let mut var = if is_getter {
                        Variable::accessor(ns, Some(f), setter)
                    } else {
                        Variable::accessor(ns, getter, Some(f))
                    };
                    var.is_final = info.is_final;
                    table.insert(name, TraitKind::Declared, var);
                }
                TraitInfoKind::Slot {
                    slot_id,
                    type_name,
                    value,
                }
                | TraitInfoKind::Const {
                    slot_id,
                    type_name,
                    value,
                } => {
                    if target == TraitTarget::Instance && table.find(name, &ns, KindMask::ALL).is_some() {
                        return Err(Exception::verify_error(format!(
                            "Variable {} conflicts with an inherited member",
                            self.strings.get(name)
                        )));
                    }
                    let kind = match (&info.kind, target) {
                        (TraitInfoKind::Const { .. }, _) => TraitKind::Constant,
                        (_, TraitTarget::Instance) => TraitKind::Instance,
                        _ => TraitKind::Declared,
                    };
                    let (ty, default) = self.slot_type(*type_name, value.as_ref())?;
                    let mut var = Variable::value(ns, default).typed(ty);
                    var.slot_id = Self::slot_or_next(table, *slot_id);
                    var.is_final = info.is_final;
                    table.insert(name, kind, var);
                }
                TraitInfoKind::Class { slot_id, class } => {
                    let class = self
                        .classes
                        .get(*class as usize)
                        .cloned()
                        .flatten()
                        .ok_or_else(|| Exception::verify_error(format!("class {} out of range", class)))?;
                    let mut var = Variable::value(ns, Value::Class(class));
                    var.slot_id = Self::slot_or_next(table, *slot_id);
                    table.insert(name, TraitKind::Constant, var);
                }
                TraitInfoKind::Function { slot_id, method } => {
                    let f = self.method_closure(*method, scope, None);
                    let mut var = Variable::value(ns, Value::Function(f));
                    var.slot_id = Self::slot_or_next(table, *slot_id);
                    table.insert(name, TraitKind::Declared, var);
                }
            }
        }
        Ok(())
    }

    fn slot_or_next(table: &TraitTable, slot_id: u32) -> u32 {
        if slot_id == 0 {
            table.max_slot() + 1
        } else {
            slot_id
        }
    }

    /// Method and accessor override rules
    fn check_override(&self, table: &TraitTable, name: StringId, ns: Namespace, info: &TraitInfo) -> ScriptResult<()> {
        let existing = table.find(name, &ns, KindMask::ALL).and_then(|pos| table.get(pos));
        match existing {
            Some(base) if base.kind != TraitKind::Declared => Err(Exception::verify_error(format!(
                "Method {} conflicts with an inherited variable",
                self.strings.get(name)
            ))),
            Some(base) if base.var.is_final => Err(Exception::verify_error(format!(
                "Illegal override of final member {}",
                self.strings.get(name)
            ))),
            Some(_) if !info.is_override => Err(Exception::verify_error(format!(
                "Illegal override of {}: missing override attribute",
                self.strings.get(name)
            ))),
            None if info.is_override => Err(Exception::verify_error(format!(
                "Method {} is marked override but overrides nothing",
                self.strings.get(name)
            ))),
            _ => Ok(()),
        }
    }

    /// Declared type and default value of a slot
    fn slot_type(&mut self, type_name: Option<u32>, value: Option<&ConstValue>) -> ScriptResult<(TypeSlot, Value)> {
        let explicit = value.map(|v| self.const_value(v));
        let Some(index) = type_name else {
            return Ok((TypeSlot::Any, explicit.unwrap_or_default()));
        };
        let mn = self.pool_multiname(index)?;
        if mn.name == NameKey::Any {
            return Ok((TypeSlot::Any, explicit.unwrap_or_default()));
        }
        let default = match explicit {
            Some(v) => v,
            None => self.type_default(mn.name),
        };
        Ok((TypeSlot::Unresolved(mn), default))
    }

    /// Initial value of a typed slot without an explicit default
    fn type_default(&self, name: NameKey) -> Value {
        let b = &self.builtins;
        match name {
            NameKey::Str(id) if id == b.int.name => Value::Int(0),
            NameKey::Str(id) if id == b.uint.name => Value::UInt(0),
            NameKey::Str(id) if id == b.number.name => Value::Double(f64::NAN),
            NameKey::Str(id) if id == b.boolean.name => Value::Boolean(false),
            _ => Value::Null,
        }
    }

    /// Install every script's traits on the global object
    pub(crate) fn install_script_traits(&mut self) -> ScriptResult<()> {
        let unit = self.unit.clone();
        let scope: ScopeChain = Rc::from(vec![ScopeEntry {
            value: self.global(),
            with: false,
        }]);
        let global = self.global.clone();
        for script in &unit.scripts {
            let mut table = std::mem::take(&mut global.borrow_mut().traits);
            let merged = self.merge_traits(&mut table, &script.traits, TraitTarget::Script, &scope, None);
            global.borrow_mut().traits = table;
            merged?;
        }
        Ok(())
    }

    /// Run the class initializer once, super classes first
    pub(crate) fn initialize_class(&mut self, class: &ClassRef) -> ScriptResult<()> {
        if class.state.get() != LinkState::Linked {
            return Ok(());
        }
        if let Some(sup) = class.super_class() {
            self.initialize_class(&sup)?;
        }
        class.state.set(LinkState::Initialized);
        let Some(id) = class.unit_id else {
            return Ok(());
        };
        let init = self
            .unit
            .classes
            .get(id as usize)
            .map(|c| c.init)
            .ok_or_else(|| Exception::verify_error(format!("class {} has no initializer", id)))?;
        debug!(class = %self.strings.get(class.name), "running class initializer");
        let scope = self.class_scope(class);
        let f = self.method_closure(init, &scope, Some(class));
        self.call_function(&f, Value::Class(class.clone()), Vec::new())?;
        Ok(())
    }

    /// `newclass`: the linked class, initialized on first use
    pub(crate) fn new_class(&mut self, id: u32) -> ScriptResult<Value> {
        let class = self
            .classes
            .get(id as usize)
            .cloned()
            .flatten()
            .ok_or_else(|| Exception::verify_error(format!("class {} out of range", id)))?;
        self.initialize_class(&class)?;
        Ok(Value::Class(class))
    }
}
