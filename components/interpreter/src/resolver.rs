//! Property resolution
//!
//! Lookup order for a receiver:
//! 1. the receiver's own trait table (fixed traits, plus dynamic ones when
//!    the mode allows and the multiname can reach the public namespace)
//! 2. the class's borrowed table, declared members only
//! 3. the prototype chain, when requested
//!
//! A miss is not an error here; the property operations decide between
//! `undefined`, `ReferenceError` and `TypeError`.

use core_types::{Multiname, NameKey, NamespaceKind, StringId};
use object_model::{
    ClassRef, ConstructionState, Exception, FunctionRef, KindMask, ObjectKind, ObjectRef,
    ScopeEntry, ScriptResult, TraitKind, TypeSlot, Value, VarSlot, Variable,
};
use tracing::trace;

use crate::call_frame::CallFrame;
use crate::coerce::{canonical_index, to_boolean};
use crate::runtime::Runtime;

/// Longest prototype chain walked before giving up
const MAX_PROTO_DEPTH: usize = 256;

/// Search options for [`Runtime::resolve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveMode {
    /// Dynamic properties may match
    pub consider_dynamic: bool,
    /// Walk the prototype chain after the class
    pub consider_prototype: bool,
    /// Never call Proxy hooks on a miss
    pub skip_interception: bool,
}

impl ResolveMode {
    /// Reads and calls
    pub const GET: ResolveMode = ResolveMode {
        consider_dynamic: true,
        consider_prototype: true,
        skip_interception: false,
    };

    /// Writes: prototype properties are never written through
    pub const SET: ResolveMode = ResolveMode {
        consider_dynamic: true,
        consider_prototype: false,
        skip_interception: false,
    };

    /// Fixed traits only
    pub const FIXED: ResolveMode = ResolveMode {
        consider_dynamic: false,
        consider_prototype: false,
        skip_interception: true,
    };
}

/// Where a resolved property is stored
#[derive(Debug, Clone)]
pub enum Holder {
    /// The receiver's own table
    Own(ObjectRef),
    /// The class's borrowed table
    Borrowed(ClassRef),
    /// A prototype object
    Prototype(ObjectRef),
}

/// A resolved property
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Table holding the trait
    pub holder: Holder,
    /// Position in that table
    pub pos: u32,
    /// Local name
    pub name: StringId,
    /// Trait kind
    pub kind: TraitKind,
    /// Copy of the property record
    pub var: Variable,
}

impl Resolved {
    /// Declared method: a slotless function-valued declared trait
    pub fn is_method(&self) -> bool {
        self.kind == TraitKind::Declared
            && self.var.slot_id == 0
            && matches!(self.var.slot, VarSlot::Value(Value::Function(_)))
    }
}

/// Result of [`Runtime::resolve`]
#[derive(Debug, Clone)]
pub enum Lookup {
    /// Property found
    Found(Resolved),
    /// No property matched
    NotFound,
}

impl Lookup {
    /// Whether a property matched
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

/// Script-level hooks of `Proxy` subclasses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProxyHook {
    Get,
    Set,
    Call,
    Delete,
    Has,
}

impl ProxyHook {
    pub(crate) const ALL: [ProxyHook; 5] = [
        ProxyHook::Get,
        ProxyHook::Set,
        ProxyHook::Call,
        ProxyHook::Delete,
        ProxyHook::Has,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            ProxyHook::Get => "getProperty",
            ProxyHook::Set => "setProperty",
            ProxyHook::Call => "callProperty",
            ProxyHook::Delete => "deleteProperty",
            ProxyHook::Has => "hasProperty",
        }
    }
}

/// Tables a lookup walks for one receiver
struct Target {
    own: Option<ObjectRef>,
    class: Option<ClassRef>,
    proto: Option<ObjectRef>,
}

impl Runtime {
    fn target(&self, value: &Value) -> Target {
        match value.shell() {
            Some(obj) => {
                let (class, proto) = {
                    let o = obj.borrow();
                    (o.class.clone(), o.proto.clone())
                };
                Target {
                    own: Some(obj),
                    class,
                    proto,
                }
            }
            None => {
                let class = self.class_of(value);
                let proto = class.as_ref().map(|c| c.prototype.clone());
                Target {
                    own: None,
                    class,
                    proto,
                }
            }
        }
    }

    pub(crate) fn local_name(&mut self, mn: &Multiname) -> Option<StringId> {
        match mn.name {
            NameKey::Str(id) => Some(id),
            NameKey::Index(i) => Some(self.strings.intern(&i.to_string())),
            NameKey::Any => None,
        }
    }

    pub(crate) fn name_text(&self, mn: &Multiname) -> String {
        match mn.name {
            NameKey::Str(id) => self.strings.get(id).to_string(),
            NameKey::Index(i) => i.to_string(),
            NameKey::Any => "*".to_string(),
        }
    }

    /// Find the property `mn` names on `value`
    ///
    /// # Arguments
    ///
    /// * `value` - Receiver; primitives resolve through their builtin class
    /// * `mn` - Lookup key, namespace candidates tried in order
    /// * `mode` - Whether dynamic properties and the prototype chain count
    pub fn resolve(&mut self, value: &Value, mn: &Multiname, mode: ResolveMode) -> Lookup {
        let Some(name) = self.local_name(mn) else {
            return Lookup::NotFound;
        };
        let target = self.target(value);
        let dynamic_ok = mode.consider_dynamic && mn.can_match_dynamic();

        if let Some(obj) = &target.own {
            obj.borrow_mut().materialize();
            let mask = if dynamic_ok {
                KindMask::FIXED.with(KindMask::DYNAMIC)
            } else {
                KindMask::FIXED
            };
            let o = obj.borrow();
            if let Some((pos, t)) = o
                .traits
                .find_multiname(name, mn, mask)
                .and_then(|pos| o.traits.get(pos).map(|t| (pos, t)))
            {
                return Lookup::Found(Resolved {
                    holder: Holder::Own(obj.clone()),
                    pos,
                    name,
                    kind: t.kind,
                    var: t.var.clone(),
                });
            }
        }

        if let Some(class) = &target.class {
            let table = class.borrowed.borrow();
            if let Some((pos, t)) = table
                .find_multiname(name, mn, KindMask::DECLARED)
                .and_then(|pos| table.get(pos).map(|t| (pos, t)))
            {
                return Lookup::Found(Resolved {
                    holder: Holder::Borrowed(class.clone()),
                    pos,
                    name,
                    kind: t.kind,
                    var: t.var.clone(),
                });
            }
        }

        if mode.consider_prototype {
            let mask = if dynamic_ok {
                KindMask::DECLARED.with(KindMask::DYNAMIC)
            } else {
                KindMask::DECLARED
            };
            let mut next = target.proto;
            let mut hops = 0;
            while let Some(proto) = next {
                hops += 1;
                if hops > MAX_PROTO_DEPTH {
                    break;
                }
                let o = proto.borrow();
                if let Some((pos, t)) = o
                    .traits
                    .find_multiname(name, mn, mask)
                    .and_then(|pos| o.traits.get(pos).map(|t| (pos, t)))
                {
                    return Lookup::Found(Resolved {
                        holder: Holder::Prototype(proto.clone()),
                        pos,
                        name,
                        kind: t.kind,
                        var: t.var.clone(),
                    });
                }
                next = o.proto.clone().filter(|p| !p.ptr_eq(&proto));
            }
        }
        Lookup::NotFound
    }

    fn require_receiver(&self, receiver: &Value, mn: &Multiname) -> ScriptResult<()> {
        if receiver.is_nullish() {
            let what = if matches!(receiver, Value::Null) { "null" } else { "undefined" };
            return Err(Exception::type_error(format!(
                "Cannot access a property or method of a {} object reference ({}).",
                what,
                self.name_text(mn)
            )));
        }
        Ok(())
    }

    fn is_sealed_value(&self, value: &Value) -> bool {
        match value.shell() {
            Some(obj) => obj.borrow().is_sealed(),
            None => true,
        }
    }

    /// Array index named by `mn`, if it can name one
    fn index_key(&self, mn: &Multiname) -> Option<u32> {
        if !mn.can_match_dynamic() {
            return None;
        }
        match mn.name {
            NameKey::Index(i) => Some(i),
            NameKey::Str(id) => canonical_index(self.strings.get(id)),
            NameKey::Any => None,
        }
    }

    fn is_length(&self, mn: &Multiname) -> bool {
        mn.name == NameKey::Str(self.names.length) && mn.can_match_dynamic()
    }

    /// Array elements, `length` and string `length`
    fn special_get(&self, receiver: &Value, mn: &Multiname) -> Option<Value> {
        match receiver {
            Value::Object(obj) => {
                let o = obj.borrow();
                let elements = o.elements()?;
                if let Some(i) = self.index_key(mn) {
                    return Some(elements.get(i as usize).cloned().unwrap_or_default());
                }
                if self.is_length(mn) {
                    return Some(Value::UInt(elements.len() as u32));
                }
                None
            }
            Value::String(id) if self.is_length(mn) => {
                Some(Value::Int(self.strings.get(*id).encode_utf16().count() as i32))
            }
            _ => None,
        }
    }

    /// Multiname for a runtime-supplied name value
    pub fn multiname_from_value(&mut self, base: &Multiname, name: &Value) -> ScriptResult<Multiname> {
        let key = match name {
            Value::Object(obj) => {
                if let ObjectKind::QName { local, namespaces } = &obj.borrow().kind {
                    return Ok(Multiname {
                        name: NameKey::Str(*local),
                        namespaces: namespaces.clone(),
                        ..base.with_name(NameKey::Str(*local))
                    });
                }
                let id = self.to_string(name)?;
                NameKey::Str(id)
            }
            Value::Int(n) if *n >= 0 => NameKey::Index(*n as u32),
            Value::UInt(n) if *n != u32::MAX => NameKey::Index(*n),
            other => {
                let id = self.to_string(other)?;
                match canonical_index(self.strings.get(id)) {
                    Some(i) => NameKey::Index(i),
                    None => NameKey::Str(id),
                }
            }
        };
        Ok(base.with_name(key))
    }

    /// Call a Proxy hook if `receiver` derives from `Proxy`
    fn intercept(
        &mut self,
        receiver: &Value,
        mn: &Multiname,
        hook: ProxyHook,
        extra: Vec<Value>,
    ) -> ScriptResult<Option<Value>> {
        let Value::Object(obj) = receiver else {
            return Ok(None);
        };
        let is_proxy = obj
            .borrow()
            .class
            .as_ref()
            .is_some_and(|c| c.is_subclass_of(&self.builtins.proxy));
        if !is_proxy {
            return Ok(None);
        }
        let hook_name = self.strings.intern(hook.name());
        let hook_mn = Multiname::qualified(hook_name, self.builtins.flash_proxy);
        let Lookup::Found(hit) = self.resolve(receiver, &hook_mn, ResolveMode::FIXED) else {
            return Ok(None);
        };
        let VarSlot::Value(Value::Function(f)) = hit.var.slot else {
            return Ok(None);
        };
        trace!(hook = hook.name(), name = %self.name_text(mn), "proxy interception");
        let mut args = Vec::with_capacity(extra.len() + 1);
        args.push(self.new_qname(mn)?);
        args.extend(extra);
        Ok(Some(self.call_function(&f, receiver.clone(), args)?))
    }

    /// `getproperty`
    pub fn get_property(&mut self, receiver: &Value, mn: &Multiname) -> ScriptResult<Value> {
        self.get_property_in(receiver, mn, ResolveMode::GET)
    }

    /// `getproperty` with an explicit resolution mode
    pub fn get_property_in(
        &mut self,
        receiver: &Value,
        mn: &Multiname,
        mode: ResolveMode,
    ) -> ScriptResult<Value> {
        self.require_receiver(receiver, mn)?;
        if let Some(v) = self.special_get(receiver, mn) {
            return Ok(v);
        }
        match self.resolve(receiver, mn, mode) {
            Lookup::Found(hit) => {
                self.check_constructed(&hit)?;
                self.read_hit(receiver, hit)
            }
            Lookup::NotFound => {
                if !mode.skip_interception {
                    if let Some(v) = self.intercept(receiver, mn, ProxyHook::Get, Vec::new())? {
                        return Ok(v);
                    }
                }
                if self.is_sealed_value(receiver) {
                    return Err(Exception::reference_error(format!(
                        "Property {} not found on {} and there is no default value.",
                        self.name_text(mn),
                        self.class_name_of(receiver)
                    )));
                }
                Ok(Value::Undefined)
            }
        }
    }

    fn read_hit(&mut self, receiver: &Value, hit: Resolved) -> ScriptResult<Value> {
        let is_method = hit.is_method();
        match hit.var.slot {
            VarSlot::Value(Value::Function(f)) if is_method => Ok(self.bind_method(&f, receiver.clone())),
            VarSlot::Value(v) => Ok(v),
            VarSlot::Accessor {
                getter: Some(getter),
                ..
            } => self.call_function(&getter, receiver.clone(), Vec::new()),
            VarSlot::Accessor { getter: None, .. } => Err(Exception::reference_error(format!(
                "Illegal read of write-only property {} on {}.",
                self.strings.get(hit.name),
                self.class_name_of(receiver)
            ))),
        }
    }

    /// `setproperty`
    pub fn set_property(&mut self, receiver: &Value, mn: &Multiname, value: Value) -> ScriptResult<()> {
        self.write_property(receiver, mn, value, false)
    }

    /// `initproperty`: like `setproperty` but may write constants
    pub fn init_property(&mut self, receiver: &Value, mn: &Multiname, value: Value) -> ScriptResult<()> {
        self.write_property(receiver, mn, value, true)
    }

    fn write_property(
        &mut self,
        receiver: &Value,
        mn: &Multiname,
        value: Value,
        init: bool,
    ) -> ScriptResult<()> {
        self.require_receiver(receiver, mn)?;
        let Some(obj) = receiver.shell() else {
            return Err(Exception::reference_error(format!(
                "Cannot create property {} on {}.",
                self.name_text(mn),
                self.class_name_of(receiver)
            )));
        };
        if obj.borrow().elements().is_some() {
            if let Some(i) = self.index_key(mn) {
                return self.array_store(&obj, i, value);
            }
            if self.is_length(mn) {
                let len = self.to_uint32(&value)?;
                return self.array_resize(&obj, len);
            }
        }
        match self.resolve(receiver, mn, ResolveMode::SET) {
            Lookup::Found(hit) if !matches!(hit.holder, Holder::Prototype(_)) => {
                self.write_hit(receiver, hit, value, init)
            }
            _ => {
                if let Some(_handled) =
                    self.intercept(receiver, mn, ProxyHook::Set, vec![value.clone()])?
                {
                    return Ok(());
                }
                self.create_dynamic(receiver, &obj, mn, value)
            }
        }
    }

    fn create_dynamic(
        &mut self,
        receiver: &Value,
        obj: &ObjectRef,
        mn: &Multiname,
        value: Value,
    ) -> ScriptResult<()> {
        let Some(name) = self.local_name(mn) else {
            return Err(Exception::type_error("Cannot create a property named *."));
        };
        if obj.borrow().is_sealed() || !mn.can_match_dynamic() {
            let has_member = {
                let o = obj.borrow();
                o.traits.find_any(name, KindMask::FIXED).is_some()
                    || o.class
                        .as_ref()
                        .is_some_and(|c| c.borrowed.borrow().find_any(name, KindMask::FIXED).is_some())
            };
            let message = if has_member {
                format!(
                    "Cannot assign to a method {} on {}.",
                    self.strings.get(name),
                    self.class_name_of(receiver)
                )
            } else {
                format!(
                    "Cannot create property {} on {}.",
                    self.strings.get(name),
                    self.class_name_of(receiver)
                )
            };
            return Err(Exception::reference_error(message));
        }
        obj.borrow_mut()
            .traits
            .insert(name, TraitKind::Dynamic, Variable::dynamic(value));
        Ok(())
    }

    fn write_hit(&mut self, receiver: &Value, hit: Resolved, value: Value, init: bool) -> ScriptResult<()> {
        let is_method = hit.is_method();
        match &hit.var.slot {
            VarSlot::Accessor {
                setter: Some(setter),
                ..
            } => {
                let setter = setter.clone();
                self.call_function(&setter, receiver.clone(), vec![value])?;
                Ok(())
            }
            VarSlot::Accessor { setter: None, .. } => Err(Exception::reference_error(format!(
                "Illegal write to read-only property {} on {}.",
                self.strings.get(hit.name),
                self.class_name_of(receiver)
            ))),
            VarSlot::Value(_) => {
                if hit.kind == TraitKind::Constant && !init {
                    return Err(Exception::reference_error(format!(
                        "Illegal write to read-only property {} on {}.",
                        self.strings.get(hit.name),
                        self.class_name_of(receiver)
                    )));
                }
                let obj = match (&hit.holder, is_method) {
                    (Holder::Own(obj), false) => obj.clone(),
                    _ => {
                        return Err(Exception::reference_error(format!(
                            "Cannot assign to a method {} on {}.",
                            self.strings.get(hit.name),
                            self.class_name_of(receiver)
                        )));
                    }
                };
                self.store_at(&obj, hit.pos, &hit.var.ty, value)
            }
        }
    }

    /// Coerce to the slot's declared type and store
    fn store_at(&mut self, obj: &ObjectRef, pos: u32, ty: &TypeSlot, value: Value) -> ScriptResult<()> {
        let ty = self.resolve_slot_type(obj, pos, ty)?;
        let value = self.coerce(value, ty.as_ref())?;
        if let Some(t) = obj.borrow_mut().traits.get_mut(pos) {
            t.var.slot = VarSlot::Value(value);
        }
        Ok(())
    }

    /// Resolve a declared type on first use and remember it
    fn resolve_slot_type(&mut self, obj: &ObjectRef, pos: u32, ty: &TypeSlot) -> ScriptResult<Option<ClassRef>> {
        match ty {
            TypeSlot::Any => Ok(None),
            TypeSlot::Class(c) => Ok(Some(c.clone())),
            TypeSlot::Unresolved(mn) => {
                let resolved = self.resolve_type(mn)?;
                if let Some(t) = obj.borrow_mut().traits.get_mut(pos) {
                    t.var.ty = resolved.clone().map_or(TypeSlot::Any, TypeSlot::Class);
                }
                Ok(resolved)
            }
        }
    }

    fn array_store(&mut self, obj: &ObjectRef, index: u32, value: Value) -> ScriptResult<()> {
        if index >= self.config.dense_array_limit {
            return Err(Exception::range_error(format!(
                "Array index {} exceeds the dense array limit",
                index
            )));
        }
        let mut o = obj.borrow_mut();
        if let Some(elements) = o.elements_mut() {
            let i = index as usize;
            if i >= elements.len() {
                elements.resize(i + 1, Value::Undefined);
            }
            elements[i] = value;
        }
        Ok(())
    }

    fn array_resize(&mut self, obj: &ObjectRef, len: u32) -> ScriptResult<()> {
        if len > self.config.dense_array_limit {
            return Err(Exception::range_error(format!(
                "Array length {} exceeds the dense array limit",
                len
            )));
        }
        if let Some(elements) = obj.borrow_mut().elements_mut() {
            elements.resize(len as usize, Value::Undefined);
        }
        Ok(())
    }

    /// `callproperty`
    pub fn call_property(&mut self, receiver: &Value, mn: &Multiname, args: Vec<Value>) -> ScriptResult<Value> {
        self.require_receiver(receiver, mn)?;
        if let Some(callee) = self.special_get(receiver, mn) {
            return self.call(&callee, receiver.clone(), args);
        }
        match self.resolve(receiver, mn, ResolveMode::GET) {
            Lookup::Found(hit) => {
                self.check_constructed(&hit)?;
                let callee = match hit.var.slot {
                    VarSlot::Value(v) => v,
                    VarSlot::Accessor {
                        getter: Some(getter),
                        ..
                    } => self.call_function(&getter, receiver.clone(), Vec::new())?,
                    VarSlot::Accessor { getter: None, .. } => {
                        return Err(Exception::reference_error(format!(
                            "Illegal read of write-only property {} on {}.",
                            self.strings.get(hit.name),
                            self.class_name_of(receiver)
                        )));
                    }
                };
                self.call(&callee, receiver.clone(), args)
            }
            Lookup::NotFound => {
                if let Some(v) = self.intercept(receiver, mn, ProxyHook::Call, args)? {
                    return Ok(v);
                }
                if self.is_sealed_value(receiver) {
                    return Err(Exception::reference_error(format!(
                        "Property {} not found on {} and there is no default value.",
                        self.name_text(mn),
                        self.class_name_of(receiver)
                    )));
                }
                Err(Exception::type_error(format!(
                    "{} is not a function.",
                    self.name_text(mn)
                )))
            }
        }
    }

    /// Function-typed instance variables without a value cannot be used
    /// before the constructor chain completes, except in the
    /// static-protected namespace.
    fn check_constructed(&mut self, hit: &Resolved) -> ScriptResult<()> {
        if hit.kind != TraitKind::Instance || hit.var.ns.kind == NamespaceKind::StaticProtected {
            return Ok(());
        }
        let Holder::Own(obj) = &hit.holder else {
            return Ok(());
        };
        let missing = hit.var.plain().map_or(true, Value::is_nullish);
        if !missing || obj.borrow().state >= ConstructionState::Constructed {
            return Ok(());
        }
        if self.is_function_type(&hit.var.ty) {
            return Err(Exception::type_error(format!(
                "Instance member {} is not available before construction completes.",
                self.strings.get(hit.name)
            )));
        }
        Ok(())
    }

    fn is_function_type(&mut self, ty: &TypeSlot) -> bool {
        let class = match ty {
            TypeSlot::Any => return false,
            TypeSlot::Class(class) => Some(class.clone()),
            TypeSlot::Unresolved(mn) => self.resolve_type(mn).ok().flatten(),
        };
        class.is_some_and(|c| c.is_subclass_of(&self.builtins.function))
    }

    /// `deleteproperty`; only dynamic and instance traits are removed
    pub fn delete_property(&mut self, receiver: &Value, mn: &Multiname) -> ScriptResult<bool> {
        self.require_receiver(receiver, mn)?;
        let Some(obj) = receiver.shell() else {
            return Ok(false);
        };
        if let Some(i) = self.index_key(mn) {
            let mut o = obj.borrow_mut();
            if let Some(elements) = o.elements_mut() {
                if let Some(slot) = elements.get_mut(i as usize) {
                    *slot = Value::Undefined;
                }
                return Ok(true);
            }
        }
        let Some(name) = self.local_name(mn) else {
            return Ok(false);
        };
        obj.borrow_mut().materialize();
        let own = {
            let o = obj.borrow();
            o.traits
                .find_multiname(name, mn, KindMask::ALL)
                .and_then(|pos| o.traits.get(pos).map(|t| (pos, t.kind)))
        };
        if let Some((pos, kind)) = own {
            if !kind.is_deletable() {
                return Ok(false);
            }
            obj.borrow_mut().traits.remove(pos);
            return Ok(true);
        }
        let declared = obj.borrow().class.as_ref().is_some_and(|c| {
            c.borrowed
                .borrow()
                .find_multiname(name, mn, KindMask::ALL)
                .is_some()
        });
        if declared {
            return Ok(false);
        }
        if let Some(v) = self.intercept(receiver, mn, ProxyHook::Delete, Vec::new())? {
            return Ok(to_boolean(&v));
        }
        Ok(true)
    }

    /// `in` and the `hasProperty` protocol
    pub fn has_property(&mut self, receiver: &Value, mn: &Multiname) -> ScriptResult<bool> {
        self.require_receiver(receiver, mn)?;
        if let Value::Object(obj) = receiver {
            if let (Some(len), Some(i)) = (
                obj.borrow().elements().map(Vec::len),
                self.index_key(mn),
            ) {
                return Ok((i as usize) < len);
            }
        }
        if self.special_get(receiver, mn).is_some() || self.resolve(receiver, mn, ResolveMode::GET).is_found() {
            return Ok(true);
        }
        if let Some(v) = self.intercept(receiver, mn, ProxyHook::Has, Vec::new())? {
            return Ok(to_boolean(&v));
        }
        Ok(false)
    }

    /// Own or declared property, ignoring the prototype chain
    pub fn has_own_property(&mut self, receiver: &Value, mn: &Multiname) -> bool {
        if let Some(i) = self.index_key(mn) {
            if let Some(len) = receiver.as_object().and_then(|o| o.borrow().elements().map(Vec::len)) {
                return (i as usize) < len;
            }
        }
        let mode = ResolveMode {
            consider_prototype: false,
            ..ResolveMode::GET
        };
        self.resolve(receiver, mn, mode).is_found()
    }

    /// `getslot`
    pub fn get_slot(&mut self, receiver: &Value, slot_id: u32) -> ScriptResult<Value> {
        let obj = self.slot_owner(receiver)?;
        let o = obj.borrow();
        let pos = o
            .traits
            .slot_position(slot_id)
            .ok_or_else(|| Exception::verify_error(format!("slot {} out of range", slot_id)))?;
        match o.traits.get(pos).map(|t| &t.var.slot) {
            Some(VarSlot::Value(v)) => Ok(v.clone()),
            _ => Err(Exception::verify_error(format!("slot {} holds no value", slot_id))),
        }
    }

    /// `setslot`
    pub fn set_slot(&mut self, receiver: &Value, slot_id: u32, value: Value) -> ScriptResult<()> {
        let obj = self.slot_owner(receiver)?;
        let (pos, ty) = {
            let o = obj.borrow();
            let pos = o
                .traits
                .slot_position(slot_id)
                .ok_or_else(|| Exception::verify_error(format!("slot {} out of range", slot_id)))?;
            let ty = o.traits.get(pos).map(|t| t.var.ty.clone()).unwrap_or_default();
            (pos, ty)
        };
        self.store_at(&obj, pos, &ty, value)
    }

    fn slot_owner(&mut self, receiver: &Value) -> ScriptResult<ObjectRef> {
        if receiver.is_nullish() {
            return Err(Exception::type_error(
                "Cannot access a slot of a null object reference.",
            ));
        }
        let obj = receiver
            .shell()
            .ok_or_else(|| Exception::verify_error("primitive values have no slots"))?;
        obj.borrow_mut().materialize();
        Ok(obj)
    }

    fn super_member(&self, home: Option<&ClassRef>, mn: &Multiname, name: StringId) -> ScriptResult<(TraitKind, Variable)> {
        let sup = home
            .and_then(|h| h.super_class())
            .ok_or_else(|| Exception::reference_error("super is not available in this method"))?;
        let table = sup.borrowed.borrow();
        table
            .find_multiname(name, mn, KindMask::FIXED)
            .and_then(|pos| table.get(pos))
            .map(|t| (t.kind, t.var.clone()))
            .ok_or_else(|| {
                Exception::reference_error(format!(
                    "Property {} not found on {}.",
                    self.strings.get(name),
                    self.strings.get(sup.name)
                ))
            })
    }

    /// `getsuper`
    pub fn get_super(&mut self, home: Option<&ClassRef>, receiver: &Value, mn: &Multiname) -> ScriptResult<Value> {
        self.require_receiver(receiver, mn)?;
        let name = self.local_name(mn).ok_or_else(|| Exception::type_error("super lookups need a name"))?;
        let (kind, var) = self.super_member(home, mn, name)?;
        match var.slot {
            VarSlot::Value(Value::Function(f)) if kind == TraitKind::Declared => {
                Ok(self.bind_method(&f, receiver.clone()))
            }
            VarSlot::Value(_) => self.get_property(receiver, &Multiname::qualified(name, var.ns)),
            VarSlot::Accessor {
                getter: Some(getter),
                ..
            } => self.call_function(&getter, receiver.clone(), Vec::new()),
            VarSlot::Accessor { getter: None, .. } => Err(Exception::reference_error(format!(
                "Illegal read of write-only property {} on super.",
                self.strings.get(name)
            ))),
        }
    }

    /// `setsuper`
    pub fn set_super(
        &mut self,
        home: Option<&ClassRef>,
        receiver: &Value,
        mn: &Multiname,
        value: Value,
    ) -> ScriptResult<()> {
        self.require_receiver(receiver, mn)?;
        let name = self.local_name(mn).ok_or_else(|| Exception::type_error("super lookups need a name"))?;
        let (kind, var) = self.super_member(home, mn, name)?;
        match var.slot {
            VarSlot::Value(_) if kind == TraitKind::Declared => Err(Exception::reference_error(format!(
                "Cannot assign to a method {} on super.",
                self.strings.get(name)
            ))),
            VarSlot::Value(_) => self.set_property(receiver, &Multiname::qualified(name, var.ns), value),
            VarSlot::Accessor {
                setter: Some(setter),
                ..
            } => self.call_function(&setter, receiver.clone(), vec![value]).map(|_| ()),
            VarSlot::Accessor { setter: None, .. } => Err(Exception::reference_error(format!(
                "Illegal write to read-only property {} on super.",
                self.strings.get(name)
            ))),
        }
    }

    /// `callsuper`
    pub fn call_super(
        &mut self,
        home: Option<&ClassRef>,
        receiver: &Value,
        mn: &Multiname,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        let callee = self.get_super(home, receiver, mn)?;
        self.call(&callee, receiver.clone(), args)
    }

    /// Scope-chain search for `findproperty`/`findpropstrict`
    ///
    /// Returns the scope object holding the name and whether the result is
    /// a fixed binding on the global object reached without passing any
    /// other scope object. Only then is it safe to cache per instruction:
    /// receivers and `with` objects walked first can differ between calls.
    pub fn find_property(
        &mut self,
        frame: &CallFrame,
        mn: &Multiname,
        strict: bool,
    ) -> ScriptResult<(Value, bool)> {
        let mut passed_other = false;
        for entry in frame.scope().iter().rev().chain(frame.outer.iter().rev()) {
            let global = !entry.with && self.is_global(&entry.value);
            if self.scope_contains(entry, mn) {
                let cacheable = !passed_other && global && self.fixed_on_global(mn);
                return Ok((entry.value.clone(), cacheable));
            }
            passed_other |= !global;
        }
        let global = self.global();
        let entry = ScopeEntry {
            value: global.clone(),
            with: false,
        };
        if self.scope_contains(&entry, mn) {
            let cacheable = !passed_other && self.fixed_on_global(mn);
            return Ok((global, cacheable));
        }
        if strict {
            return Err(Exception::reference_error(format!(
                "Variable {} is not defined.",
                self.name_text(mn)
            )));
        }
        Ok((global, false))
    }

    fn is_global(&self, value: &Value) -> bool {
        value.as_object().is_some_and(|o| o.ptr_eq(&self.global))
    }

    fn fixed_on_global(&mut self, mn: &Multiname) -> bool {
        let Some(name) = self.local_name(mn) else {
            return false;
        };
        self.global
            .borrow()
            .traits
            .find_multiname(name, mn, KindMask::FIXED)
            .is_some()
    }

    fn scope_contains(&mut self, entry: &ScopeEntry, mn: &Multiname) -> bool {
        let global = self.is_global(&entry.value);
        let mode = ResolveMode {
            consider_dynamic: entry.with || global,
            consider_prototype: entry.with,
            skip_interception: true,
        };
        if entry.with && self.special_get(&entry.value, mn).is_some() {
            return true;
        }
        self.resolve(&entry.value, mn, mode).is_found()
    }

    /// `hasnext2` step: next 1-based enumeration index, 0 when done
    pub fn next_name_index(&mut self, receiver: &Value, index: u32) -> u32 {
        let Some(obj) = receiver.shell() else {
            return 0;
        };
        obj.borrow_mut().materialize();
        let o = obj.borrow();
        let len = o.elements().map_or(0, |e| e.len() as u32);
        if index < len {
            return index + 1;
        }
        match o.traits.next_enumerable(index - len) {
            0 => 0,
            next => len + next,
        }
    }

    /// `nextname`
    pub fn next_name(&mut self, receiver: &Value, index: u32) -> Value {
        let Some(obj) = receiver.shell() else {
            return Value::Undefined;
        };
        let name = {
            let o = obj.borrow();
            let len = o.elements().map_or(0, |e| e.len() as u32);
            if index >= 1 && index <= len {
                Err(index - 1)
            } else {
                Ok(o.traits.at_cursor(index.saturating_sub(len)).map(|t| t.name))
            }
        };
        match name {
            Err(i) => self.string_value(&i.to_string()),
            Ok(Some(id)) => Value::String(id),
            Ok(None) => Value::Undefined,
        }
    }

    /// `nextvalue`
    pub fn next_value(&mut self, receiver: &Value, index: u32) -> Value {
        let Some(obj) = receiver.shell() else {
            return Value::Undefined;
        };
        let o = obj.borrow();
        let len = o.elements().map_or(0, |e| e.len() as u32);
        if index >= 1 && index <= len {
            return o
                .elements()
                .and_then(|e| e.get(index as usize - 1).cloned())
                .unwrap_or_default();
        }
        o.traits
            .at_cursor(index.saturating_sub(len))
            .and_then(|t| t.var.plain().cloned())
            .unwrap_or_default()
    }

    /// Function value stored under a declared trait, for tests and hosts
    pub fn declared_function(&mut self, class: &ClassRef, name: &str) -> Option<FunctionRef> {
        let id = self.strings.find(name)?;
        let table = class.borrowed.borrow();
        let pos = table.find_any(id, KindMask::DECLARED)?;
        match &table.get(pos)?.var.slot {
            VarSlot::Value(Value::Function(f)) => Some(f.clone()),
            _ => None,
        }
    }
}
