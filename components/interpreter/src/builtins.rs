//! Builtin classes and native functions
//!
//! The core classes are created before any unit class is linked. Native
//! methods live on the builtin prototypes as non-enumerable dynamic
//! properties, so unit classes pick them up through the prototype chain.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::info;

use core_types::{ErrorKind, Multiname, Namespace, NamespaceKind, StringTable};
use object_model::{
    BuiltinKind, Class, ClassFlags, ClassRef, Exception, LinkState, ObjectKind, ObjectRef,
    ScriptObject, ScriptResult, TraitKind, Value, Variable,
};

use crate::coerce::number_to_uint32;
use crate::linker::{copy_down, wire_class};
use crate::resolver::ProxyHook;
use crate::runtime::{NativeFn, Names, Runtime};

/// URI of the namespace that Proxy hooks are declared in
pub const FLASH_PROXY_URI: &str = "http://www.adobe.com/2006/actionscript/flash/proxy";

/// Handles to the builtin classes
#[derive(Debug, Clone)]
pub(crate) struct Builtins {
    pub(crate) object: ClassRef,
    pub(crate) class: ClassRef,
    pub(crate) function: ClassRef,
    pub(crate) namespace: ClassRef,
    pub(crate) boolean: ClassRef,
    pub(crate) number: ClassRef,
    pub(crate) int: ClassRef,
    pub(crate) uint: ClassRef,
    pub(crate) string: ClassRef,
    pub(crate) array: ClassRef,
    pub(crate) error: ClassRef,
    pub(crate) errors: FxHashMap<ErrorKind, ClassRef>,
    pub(crate) proxy: ClassRef,
    pub(crate) qname: ClassRef,
    pub(crate) flash_proxy: Namespace,
}

impl Builtins {
    pub(crate) fn error_class(&self, kind: ErrorKind) -> &ClassRef {
        self.errors.get(&kind).unwrap_or(&self.error)
    }

    pub(crate) fn all(&self) -> Vec<ClassRef> {
        let mut all = vec![
            self.object.clone(),
            self.class.clone(),
            self.function.clone(),
            self.namespace.clone(),
            self.boolean.clone(),
            self.number.clone(),
            self.int.clone(),
            self.uint.clone(),
            self.string.clone(),
            self.array.clone(),
            self.proxy.clone(),
            self.qname.clone(),
        ];
        all.extend(ErrorKind::ALL.iter().map(|k| self.error_class(*k).clone()));
        all
    }
}

const DYNAMIC: ClassFlags = ClassFlags {
    sealed: false,
    is_final: false,
    is_interface: false,
    reusable: false,
};

const SEALED: ClassFlags = ClassFlags {
    sealed: true,
    ..DYNAMIC
};

const FINAL: ClassFlags = ClassFlags {
    sealed: true,
    is_final: true,
    ..DYNAMIC
};

fn declare(
    strings: &mut StringTable,
    name: &str,
    kind: BuiltinKind,
    flags: ClassFlags,
    parent: Option<&ClassRef>,
) -> ClassRef {
    let statics = ObjectRef::new(ScriptObject::plain(None, None));
    let prototype = ObjectRef::new(ScriptObject::plain(
        None,
        parent.map(|p| p.prototype.clone()),
    ));
    let class = Class::new(strings.intern(name), Namespace::public(), statics, prototype);
    class.builtin.set(Some(kind));
    class.flags.set(flags);
    if let Some(p) = parent {
        *class.super_class.borrow_mut() = Some(p.clone());
        *class.borrowed.borrow_mut() = copy_down(p);
    }
    class.state.set(LinkState::Initialized);
    ClassRef::new(class)
}

/// Create the builtin classes and the global object
pub(crate) fn bootstrap(strings: &mut StringTable, names: &Names) -> (Builtins, ObjectRef) {
    let object = declare(strings, "Object", BuiltinKind::Object, DYNAMIC, None);
    let class = declare(strings, "Class", BuiltinKind::Class, SEALED, Some(&object));
    let function = declare(strings, "Function", BuiltinKind::Function, DYNAMIC, Some(&object));
    let namespace = declare(strings, "Namespace", BuiltinKind::Namespace, FINAL, Some(&object));
    let boolean = declare(strings, "Boolean", BuiltinKind::Boolean, FINAL, Some(&object));
    let number = declare(strings, "Number", BuiltinKind::Number, FINAL, Some(&object));
    let int = declare(strings, "int", BuiltinKind::Int, FINAL, Some(&object));
    let uint = declare(strings, "uint", BuiltinKind::UInt, FINAL, Some(&object));
    let string = declare(strings, "String", BuiltinKind::String, FINAL, Some(&object));
    let array = declare(strings, "Array", BuiltinKind::Array, DYNAMIC, Some(&object));
    let proxy = declare(strings, "Proxy", BuiltinKind::Proxy, SEALED, Some(&object));
    let qname = declare(strings, "QName", BuiltinKind::QName, FINAL, Some(&object));

    let error = declare(
        strings,
        "Error",
        BuiltinKind::Error(ErrorKind::Error),
        DYNAMIC,
        Some(&object),
    );
    {
        let mut table = error.borrowed.borrow_mut();
        let mut message = Variable::value(Namespace::public(), Value::String(core_types::StringId::EMPTY));
        message.slot_id = 1;
        table.insert(names.message, TraitKind::Instance, message);
        let mut name = Variable::value(Namespace::public(), Value::String(error.name));
        name.slot_id = 2;
        table.insert(names.name, TraitKind::Instance, name);
    }
    let mut errors = FxHashMap::default();
    errors.insert(ErrorKind::Error, error.clone());
    for kind in ErrorKind::ALL.iter().copied().filter(|k| *k != ErrorKind::Error) {
        let sub = declare(strings, kind.class_name(), BuiltinKind::Error(kind), DYNAMIC, Some(&error));
        {
            let mut table = sub.borrowed.borrow_mut();
            let mut name = Variable::value(Namespace::public(), Value::String(sub.name));
            name.slot_id = 2;
            table.insert(names.name, TraitKind::Instance, name);
        }
        errors.insert(kind, sub);
    }

    let flash_proxy = Namespace::new(strings.intern(FLASH_PROXY_URI), NamespaceKind::Explicit);
    let builtins = Builtins {
        object: object.clone(),
        class: class.clone(),
        function,
        namespace,
        boolean,
        number,
        int,
        uint,
        string,
        array,
        error,
        errors,
        proxy,
        qname,
        flash_proxy,
    };

    let global = ObjectRef::new(ScriptObject::plain(
        Some(object.clone()),
        Some(object.prototype.clone()),
    ));
    for c in builtins.all() {
        {
            let mut statics = c.object.borrow_mut();
            statics.class = Some(class.clone());
            statics.proto = Some(class.prototype.clone());
        }
        c.prototype.borrow_mut().class = Some(object.clone());
        wire_class(&c, names);
        global.borrow_mut().traits.insert(
            c.name,
            TraitKind::Constant,
            Variable::value(Namespace::public(), Value::Class(c.clone())),
        );
    }
    (builtins, global)
}

type Native = fn(&mut Runtime, Value, Vec<Value>) -> ScriptResult<Value>;

impl Runtime {
    /// Attach native constructors, prototype methods and global functions
    pub(crate) fn install_natives(&mut self) {
        let b = self.builtins.clone();

        self.global_function("trace", native_trace);
        self.global_function("isNaN", native_is_nan);
        self.global_function("eval", native_eval);

        self.constructor(&b.object, native_noop);
        self.proto_method(&b.object, "hasOwnProperty", object_has_own_property);
        self.proto_method(&b.object, "toString", object_to_string);
        self.proto_method(&b.object, "valueOf", object_value_of);

        self.constructor(&b.function, native_noop);
        self.proto_method(&b.function, "call", function_call);
        self.proto_method(&b.function, "apply", function_apply);

        self.constructor(&b.array, array_construct);
        self.proto_method(&b.array, "push", array_push);
        self.proto_method(&b.array, "pop", array_pop);
        self.proto_method(&b.array, "join", array_join);
        self.proto_method(&b.array, "toString", array_to_string);

        for kind in ErrorKind::ALL {
            let class = b.error_class(kind).clone();
            self.constructor(&class, error_construct);
        }
        self.proto_method(&b.error, "toString", error_to_string);

        for class in [&b.boolean, &b.number, &b.int, &b.uint, &b.string, &b.namespace] {
            self.proto_method(class, "toString", primitive_to_string);
            self.proto_method(class, "valueOf", object_value_of);
        }

        self.constructor(&b.proxy, native_noop);
        for hook in ProxyHook::ALL {
            let f = self.native_function(hook.name(), Rc::new(proxy_unimplemented) as NativeFn);
            b.proxy.borrowed.borrow_mut().insert(
                f.name,
                TraitKind::Declared,
                Variable::value(b.flash_proxy, Value::Function(f)),
            );
        }
        self.constructor(&b.qname, qname_construct);
    }

    fn global_function(&mut self, name: &str, func: Native) {
        let f = self.native_function(name, Rc::new(func) as NativeFn);
        let id = f.name;
        self.global.borrow_mut().traits.insert(
            id,
            TraitKind::Declared,
            Variable::value(Namespace::public(), Value::Function(f)),
        );
    }

    fn proto_method(&mut self, class: &ClassRef, name: &str, func: Native) {
        let f = self.native_function(name, Rc::new(func) as NativeFn);
        let id = f.name;
        class.prototype.borrow_mut().traits.insert(
            id,
            TraitKind::Dynamic,
            Variable::value(Namespace::public(), Value::Function(f)),
        );
    }

    fn constructor(&mut self, class: &ClassRef, func: Native) {
        let name = self.strings.get(class.name).to_string();
        let f = self.native_function(&name, Rc::new(func) as NativeFn);
        *class.constructor.borrow_mut() = Some(f);
    }

    /// Error object for an engine-raised error
    pub(crate) fn materialize_error(&mut self, kind: ErrorKind, message: &str) -> Value {
        let class = self.error_class(kind);
        let obj = self.heap.allocate(&class);
        let text = self.strings.intern(message);
        {
            let mut o = obj.borrow_mut();
            o.materialize();
            if let Some(pos) = o.traits.find(self.names.message, &Namespace::public(), object_model::KindMask::ALL) {
                if let Some(t) = o.traits.get_mut(pos) {
                    t.var.slot = object_model::VarSlot::Value(Value::String(text));
                }
            }
            o.state = object_model::ConstructionState::Constructed;
        }
        Value::Object(obj)
    }

    /// Exception value, building the Error object if still pending
    pub(crate) fn exception_value(&mut self, exc: Exception) -> Value {
        match exc {
            Exception::Thrown(v) => v,
            Exception::Error { kind, message } => self.materialize_error(kind, &message),
        }
    }

    /// QName object carrying a multiname's local name and namespace set
    pub(crate) fn new_qname(&mut self, mn: &Multiname) -> ScriptResult<Value> {
        let local = match mn.name {
            core_types::NameKey::Str(id) => id,
            core_types::NameKey::Index(i) => self.strings.intern(&i.to_string()),
            core_types::NameKey::Any => self.strings.intern("*"),
        };
        let namespaces = mn.namespaces.clone();
        Ok(Value::Object(self.build_qname(local, namespaces)))
    }

    fn build_qname(
        &mut self,
        local: core_types::StringId,
        namespaces: Rc<[Namespace]>,
    ) -> ObjectRef {
        let class = self.builtins.qname.clone();
        let uri = namespaces
            .first()
            .map_or(Value::Null, |ns| Value::String(ns.uri));
        let mut object = ScriptObject::allocated(
            class.clone(),
            Some(class.prototype.clone()),
            ObjectKind::QName { local, namespaces },
        );
        object.materialize();
        object.traits.insert(
            self.names.local_name,
            TraitKind::Constant,
            Variable::value(Namespace::public(), Value::String(local)),
        );
        object
            .traits
            .insert(self.names.uri, TraitKind::Constant, Variable::value(Namespace::public(), uri));
        object.state = object_model::ConstructionState::Constructed;
        self.heap.allocate_plain(object)
    }
}

fn native_noop(_: &mut Runtime, _: Value, _: Vec<Value>) -> ScriptResult<Value> {
    Ok(Value::Undefined)
}

fn native_trace(rt: &mut Runtime, _: Value, args: Vec<Value>) -> ScriptResult<Value> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in &args {
        let id = rt.to_string(arg)?;
        parts.push(rt.strings.get(id).to_string());
    }
    info!(target: "trace", "{}", parts.join(" "));
    Ok(Value::Undefined)
}

fn native_is_nan(rt: &mut Runtime, _: Value, args: Vec<Value>) -> ScriptResult<Value> {
    let arg = args.into_iter().next().unwrap_or_default();
    Ok(Value::Boolean(rt.to_number(&arg)?.is_nan()))
}

fn native_eval(rt: &mut Runtime, _: Value, args: Vec<Value>) -> ScriptResult<Value> {
    if !rt.config.allow_dynamic_eval {
        return Err(Exception::error(
            ErrorKind::EvalError,
            "eval is disabled in this runtime",
        ));
    }
    match args.into_iter().next().unwrap_or_default() {
        Value::String(_) => Err(Exception::error(
            ErrorKind::EvalError,
            "no source compiler is attached",
        )),
        other => Ok(other),
    }
}

fn object_has_own_property(rt: &mut Runtime, this: Value, args: Vec<Value>) -> ScriptResult<Value> {
    let name = args.into_iter().next().unwrap_or_default();
    let mn = rt.multiname_from_value(&Multiname::runtime(Vec::new()), &name)?;
    Ok(Value::Boolean(rt.has_own_property(&this, &mn)))
}

fn object_to_string(rt: &mut Runtime, this: Value, _: Vec<Value>) -> ScriptResult<Value> {
    let text = match &this {
        Value::Class(c) => format!("[class {}]", rt.strings.get(c.name)),
        Value::Function(_) => "function Function() {}".to_string(),
        other => format!("[object {}]", rt.class_name_of(other)),
    };
    Ok(rt.string_value(&text))
}

fn primitive_to_string(rt: &mut Runtime, this: Value, args: Vec<Value>) -> ScriptResult<Value> {
    if this.is_reference() {
        return object_to_string(rt, this, args);
    }
    let id = rt.to_string(&this)?;
    Ok(Value::String(id))
}

fn proxy_unimplemented(_: &mut Runtime, _: Value, _: Vec<Value>) -> ScriptResult<Value> {
    Err(Exception::error(
        ErrorKind::Error,
        "Proxy subclass does not override this flash_proxy method",
    ))
}

fn object_value_of(_: &mut Runtime, this: Value, _: Vec<Value>) -> ScriptResult<Value> {
    Ok(this)
}

fn function_call(rt: &mut Runtime, this: Value, args: Vec<Value>) -> ScriptResult<Value> {
    let mut args = args.into_iter();
    let receiver = args.next().unwrap_or_default();
    rt.call(&this, receiver, args.collect())
}

fn function_apply(rt: &mut Runtime, this: Value, args: Vec<Value>) -> ScriptResult<Value> {
    let mut args = args.into_iter();
    let receiver = args.next().unwrap_or_default();
    let list = match args.next() {
        None | Some(Value::Undefined) | Some(Value::Null) => Vec::new(),
        Some(Value::Object(o)) => o
            .borrow()
            .elements()
            .cloned()
            .ok_or_else(|| Exception::type_error("apply expects an Array of arguments"))?,
        Some(_) => return Err(Exception::type_error("apply expects an Array of arguments")),
    };
    rt.call(&this, receiver, list)
}

fn this_array(this: &Value) -> ScriptResult<ObjectRef> {
    match this {
        Value::Object(o) if o.borrow().elements().is_some() => Ok(o.clone()),
        _ => Err(Exception::type_error("receiver is not an Array")),
    }
}

fn array_construct(rt: &mut Runtime, this: Value, args: Vec<Value>) -> ScriptResult<Value> {
    let array = this_array(&this)?;
    let elements = match args.as_slice() {
        [len] if len.is_number() => {
            let n = rt.to_number(len)?;
            let size = number_to_uint32(n);
            if f64::from(size) != n || size > rt.config.dense_array_limit {
                return Err(Exception::range_error(format!(
                    "Array index is not a positive integer ({})",
                    crate::coerce::number_to_string(n)
                )));
            }
            vec![Value::Undefined; size as usize]
        }
        _ => args,
    };
    if let Some(slot) = array.borrow_mut().elements_mut() {
        *slot = elements;
    }
    Ok(Value::Undefined)
}

fn array_push(_: &mut Runtime, this: Value, args: Vec<Value>) -> ScriptResult<Value> {
    let array = this_array(&this)?;
    let mut a = array.borrow_mut();
    let elements = a
        .elements_mut()
        .ok_or_else(|| Exception::type_error("receiver is not an Array"))?;
    elements.extend(args);
    Ok(Value::UInt(elements.len() as u32))
}

fn array_pop(_: &mut Runtime, this: Value, _: Vec<Value>) -> ScriptResult<Value> {
    let array = this_array(&this)?;
    let popped = array.borrow_mut().elements_mut().and_then(Vec::pop);
    Ok(popped.unwrap_or_default())
}

fn array_join(rt: &mut Runtime, this: Value, args: Vec<Value>) -> ScriptResult<Value> {
    let array = this_array(&this)?;
    let sep = match args.first() {
        None | Some(Value::Undefined) => ",".to_string(),
        Some(v) => {
            let id = rt.to_string(v)?;
            rt.strings.get(id).to_string()
        }
    };
    let elements = array.borrow().elements().cloned().unwrap_or_default();
    let mut parts = Vec::with_capacity(elements.len());
    for e in &elements {
        if e.is_nullish() {
            parts.push(String::new());
        } else {
            let id = rt.to_string(e)?;
            parts.push(rt.strings.get(id).to_string());
        }
    }
    Ok(rt.string_value(&parts.join(&sep)))
}

fn array_to_string(rt: &mut Runtime, this: Value, _: Vec<Value>) -> ScriptResult<Value> {
    array_join(rt, this, Vec::new())
}

fn error_construct(rt: &mut Runtime, this: Value, args: Vec<Value>) -> ScriptResult<Value> {
    if let Some(message) = args.into_iter().next().filter(|m| !matches!(m, Value::Undefined)) {
        let text = rt.to_string(&message)?;
        let mn = Multiname::public(rt.names.message);
        rt.set_property(&this, &mn, Value::String(text))?;
    }
    Ok(Value::Undefined)
}

fn error_to_string(rt: &mut Runtime, this: Value, _: Vec<Value>) -> ScriptResult<Value> {
    let name_mn = Multiname::public(rt.names.name);
    let message_mn = Multiname::public(rt.names.message);
    let name = rt.get_property(&this, &name_mn)?;
    let message = rt.get_property(&this, &message_mn)?;
    let name = rt.to_string(&name)?;
    let message = rt.to_string(&message)?;
    let text = if message == core_types::StringId::EMPTY {
        rt.strings.get(name).to_string()
    } else {
        format!("{}: {}", rt.strings.get(name), rt.strings.get(message))
    };
    Ok(rt.string_value(&text))
}

fn qname_construct(rt: &mut Runtime, this: Value, args: Vec<Value>) -> ScriptResult<Value> {
    let obj = this
        .as_object()
        .cloned()
        .ok_or_else(|| Exception::type_error("receiver is not a QName"))?;
    let (ns, local) = match args.as_slice() {
        [local] => (Namespace::public(), local.clone()),
        [Value::Namespace(ns), local, ..] => (*ns, local.clone()),
        [uri, local, ..] => {
            let uri = rt.to_string(uri)?;
            (Namespace::new(uri, NamespaceKind::Public), local.clone())
        }
        [] => (Namespace::public(), Value::String(core_types::StringId::EMPTY)),
    };
    let local = rt.to_string(&local)?;
    let built = rt.build_qname(local, Rc::from(vec![ns]));
    let built = built.borrow();
    let mut o = obj.borrow_mut();
    o.kind = built.kind.clone();
    o.traits = built.traits.clone();
    Ok(Value::Undefined)
}
