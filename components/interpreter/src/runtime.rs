//! Runtime - the execution context for one loaded bytecode unit
//!
//! Owns the string table, linked classes, the global object, the native
//! function table and the explicit call-context stack. Every script-level
//! operation is a method on [`Runtime`]; host entry points convert escaping
//! exceptions into [`EngineError`].

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use bytecode_system::{BytecodeUnit, ConstValue, Verifier};
use core_types::{EngineError, ErrorKind, Multiname, Namespace, StringId, StringTable};
use object_model::{
    ClassRef, Exception, Function, FunctionKind, FunctionRef, Heap, HeapStats, NativeId,
    ObjectRef, ScopeChain, ScriptObject, ScriptResult, Value,
};

use crate::binding_cache::{BindingCache, CacheStats};
use crate::builtins::{self, Builtins};
use crate::config::RuntimeConfig;
use crate::profile::ProfileData;

/// Native function body: `(runtime, receiver, args) -> result`
pub type NativeFn = Rc<dyn Fn(&mut Runtime, Value, Vec<Value>) -> ScriptResult<Value>>;

/// A registered native entry
pub(crate) struct NativeEntry {
    pub(crate) name: StringId,
    pub(crate) func: NativeFn,
}

/// Lazily resolved parameter and return types of a method
#[derive(Debug, Clone, Default)]
pub(crate) struct Signature {
    pub(crate) params: Vec<Option<ClassRef>>,
    pub(crate) ret: Option<ClassRef>,
}

/// Per-method runtime state
#[derive(Debug, Default)]
pub(crate) struct MethodState {
    pub(crate) signature: Option<Rc<Signature>>,
    pub(crate) cache: BindingCache,
    pub(crate) profile: ProfileData,
}

/// One entry of the call-context stack
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Function being run
    pub callee: FunctionRef,
    /// Method id for compiled functions
    pub method: Option<u32>,
}

/// Interned names the engine looks up itself
#[derive(Debug, Clone, Copy)]
pub(crate) struct Names {
    pub(crate) prototype: StringId,
    pub(crate) constructor: StringId,
    pub(crate) length: StringId,
    pub(crate) message: StringId,
    pub(crate) name: StringId,
    pub(crate) to_string: StringId,
    pub(crate) value_of: StringId,
    pub(crate) local_name: StringId,
    pub(crate) uri: StringId,
}

impl Names {
    pub(crate) fn intern(strings: &mut StringTable) -> Self {
        Self {
            prototype: strings.intern("prototype"),
            constructor: strings.intern("constructor"),
            length: strings.intern("length"),
            message: strings.intern("message"),
            name: strings.intern("name"),
            to_string: strings.intern("toString"),
            value_of: strings.intern("valueOf"),
            local_name: strings.intern("localName"),
            uri: strings.intern("uri"),
        }
    }
}

/// Execution context for one bytecode unit
///
/// # Example
///
/// ```
/// use bytecode_system::{CodeBuilder, MethodBody, MethodInfo, Opcode, ScriptInfo, UnitBuilder};
/// use interpreter::{Runtime, RuntimeConfig};
/// use object_model::Value;
///
/// let mut unit = UnitBuilder::new();
/// let mut code = CodeBuilder::new();
/// code.push_int(40);
/// code.push_int(2);
/// code.op(Opcode::Add);
/// code.op(Opcode::ReturnValue);
/// let name = unit.intern("main");
/// let init = unit.method(MethodInfo::new(name).body(MethodBody::new(code.finish())));
/// unit.add_script(ScriptInfo { init, traits: Vec::new() });
///
/// let mut runtime = Runtime::load(unit.finish(), RuntimeConfig::default()).unwrap();
/// assert_eq!(runtime.run_script(0).unwrap(), Value::Int(42));
/// ```
pub struct Runtime {
    pub(crate) strings: StringTable,
    pub(crate) unit: Rc<BytecodeUnit>,
    pub(crate) methods: Vec<MethodState>,
    pub(crate) classes: Vec<Option<ClassRef>>,
    pub(crate) link_order: Vec<ClassRef>,
    pub(crate) global: ObjectRef,
    pub(crate) builtins: Builtins,
    pub(crate) names: Names,
    pub(crate) natives: Vec<NativeEntry>,
    pub(crate) contexts: Vec<CallContext>,
    pub(crate) depth: usize,
    pub(crate) heap: Heap,
    /// Protected namespaces remapped to their lineage's shared namespace
    pub(crate) ns_aliases: FxHashMap<Namespace, Namespace>,
    pub(crate) config: RuntimeConfig,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("methods", &self.methods.len())
            .field("classes", &self.classes.len())
            .field("natives", &self.natives.len())
            .field("depth", &self.depth)
            .field("config", &self.config)
            .finish()
    }
}

impl Runtime {
    /// Verify, link and prepare a bytecode unit
    ///
    /// # Arguments
    ///
    /// * `unit` - Descriptors and constant pools to execute
    /// * `config` - Engine limits
    ///
    /// # Returns
    ///
    /// * `Ok(Runtime)` - Every class linked, script traits installed
    /// * `Err(EngineError)` - `InvalidBytecode` when verification fails, an
    ///   uncaught `VerifyError` when linking rejects a class
    pub fn load(unit: BytecodeUnit, config: RuntimeConfig) -> Result<Self, EngineError> {
        Verifier::new(&unit)
            .verify()
            .map_err(|e| EngineError::InvalidBytecode(e.to_string()))?;

        let mut strings = unit.strings.clone();
        let names = Names::intern(&mut strings);
        let (builtins, global) = builtins::bootstrap(&mut strings, &names);
        let methods = (0..unit.methods.len()).map(|_| MethodState::default()).collect();
        let classes = vec![None; unit.instances.len()];

        let mut runtime = Self {
            strings,
            unit: Rc::new(unit),
            methods,
            classes,
            link_order: Vec::new(),
            global,
            builtins,
            names,
            natives: Vec::new(),
            contexts: Vec::new(),
            depth: 0,
            heap: Heap::new(),
            ns_aliases: FxHashMap::default(),
            config,
        };
        runtime.install_natives();
        if let Err(exc) = runtime.link_unit().and_then(|_| runtime.install_script_traits()) {
            return Err(runtime.uncaught(exc));
        }
        debug!(
            classes = runtime.classes.len(),
            methods = runtime.methods.len(),
            scripts = runtime.unit.scripts.len(),
            "bytecode unit loaded"
        );
        Ok(runtime)
    }

    /// Run a script's initializer with the global object as receiver
    ///
    /// Class initializers that have not run yet run first, supers before
    /// subclasses.
    pub fn run_script(&mut self, index: usize) -> Result<Value, EngineError> {
        let init = self
            .unit
            .scripts
            .get(index)
            .map(|s| s.init)
            .ok_or_else(|| EngineError::InvalidBytecode(format!("no script {}", index)))?;
        let pending = self.link_order.clone();
        for class in &pending {
            if let Err(exc) = self.initialize_class(class) {
                return Err(self.uncaught(exc));
            }
        }
        let name = self.method_name(init);
        let entry = self.new_function(FunctionKind::Script(init), name, Rc::from(Vec::new()), None);
        let global = Value::Object(self.global.clone());
        self.invoke(&Value::Function(entry), global, Vec::new())
    }

    /// Host boundary: call `callee` and report an escaping exception
    ///
    /// The recursion counter and the call-context stack are restored to
    /// their values on entry whether the call returns or throws.
    pub fn invoke(
        &mut self,
        callee: &Value,
        receiver: Value,
        args: Vec<Value>,
    ) -> Result<Value, EngineError> {
        let depth = self.depth;
        let contexts = self.contexts.len();
        let result = self.call(callee, receiver, args);
        self.depth = depth;
        self.contexts.truncate(contexts);
        result.map_err(|exc| self.uncaught(exc))
    }

    /// Convert an escaping exception into a host-level fault
    pub fn uncaught(&mut self, exc: Exception) -> EngineError {
        match exc {
            Exception::Error { kind, message } => EngineError::Uncaught {
                kind: Some(kind),
                message,
            },
            Exception::Thrown(value) => {
                let kind = self.class_of(&value).and_then(|c| c.error_kind());
                let message = match (&kind, value.as_object()) {
                    (Some(_), Some(obj)) => self.own_string(obj, self.names.message),
                    _ => self.display(&value),
                };
                EngineError::Uncaught { kind, message }
            }
        }
    }

    /// The global object
    pub fn global(&self) -> Value {
        Value::Object(self.global.clone())
    }

    /// The runtime's string table
    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// Intern a string
    pub fn intern(&mut self, s: &str) -> StringId {
        self.strings.intern(s)
    }

    /// Interned string value
    pub fn string_value(&mut self, s: &str) -> Value {
        Value::String(self.strings.intern(s))
    }

    /// Text of a string value, `None` for other values
    pub fn str_of(&self, value: &Value) -> Option<&str> {
        match value {
            Value::String(id) => Some(self.strings.get(*id)),
            _ => None,
        }
    }

    /// Multiname for `name` in the public namespace
    pub fn public_name(&mut self, name: &str) -> Multiname {
        Multiname::public(self.strings.intern(name))
    }

    /// Engine limits in effect
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Current nesting depth of invocations
    pub fn recursion_depth(&self) -> usize {
        self.depth
    }

    /// Innermost active call context
    pub fn current_context(&self) -> Option<&CallContext> {
        self.contexts.last()
    }

    /// Binding-cache counters for a method
    pub fn cache_stats(&self, method: u32) -> Option<CacheStats> {
        self.methods.get(method as usize).map(|m| m.cache.stats())
    }

    /// Profiling data for a method
    pub fn profile(&self, method: u32) -> Option<&ProfileData> {
        self.methods.get(method as usize).map(|m| &m.profile)
    }

    /// Allocation counters
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    /// Hand an object back to its class's free-list if nothing else holds it
    pub fn release(&mut self, value: Value) -> bool {
        match value {
            Value::Object(obj) => self.heap.release(obj),
            _ => false,
        }
    }

    /// Linked class for a unit class id
    pub fn class_by_id(&self, id: u32) -> Result<ClassRef, EngineError> {
        self.classes
            .get(id as usize)
            .cloned()
            .flatten()
            .ok_or(EngineError::UnknownClass(id))
    }

    /// Public class installed on the global object under `name`
    pub fn class_named(&self, name: &str) -> Option<ClassRef> {
        let id = self.strings.find(name)?;
        let global = self.global.borrow();
        let pos = global
            .traits
            .find(id, &Namespace::public(), object_model::KindMask::ALL)?;
        global.traits.get(pos)?.var.plain()?.as_class().cloned()
    }

    /// Builtin class for an error kind
    pub fn error_class(&self, kind: ErrorKind) -> ClassRef {
        self.builtins.error_class(kind).clone()
    }

    /// Register a native function and return it as a callable value
    pub fn register_native<F>(&mut self, name: &str, func: F) -> Value
    where
        F: Fn(&mut Runtime, Value, Vec<Value>) -> ScriptResult<Value> + 'static,
    {
        Value::Function(self.native_function(name, Rc::new(func)))
    }

    /// Define or overwrite a public property on the global object
    pub fn define_global(&mut self, name: &str, value: Value) -> ScriptResult<()> {
        let mn = self.public_name(name);
        let global = self.global();
        self.set_property(&global, &mn, value)
    }

    pub(crate) fn native_function(&mut self, name: &str, func: NativeFn) -> FunctionRef {
        let name = self.strings.intern(name);
        let id = NativeId(self.natives.len() as u32);
        self.natives.push(NativeEntry { name, func });
        self.new_function(FunctionKind::Native(id), name, Rc::from(Vec::new()), None)
    }

    /// Function value with a fresh companion object
    pub(crate) fn new_function(
        &mut self,
        kind: FunctionKind,
        name: StringId,
        scope: ScopeChain,
        home: Option<ClassRef>,
    ) -> FunctionRef {
        let shell = self.function_shell();
        FunctionRef::new(Function::new(kind, name, shell).with_scope(scope).with_home(home))
    }

    pub(crate) fn function_shell(&mut self) -> ObjectRef {
        let class = self.builtins.function.clone();
        let proto = class.prototype.clone();
        self.heap.allocate_plain(ScriptObject::plain(Some(class), Some(proto)))
    }

    /// Method closure fixing `receiver` as `this`
    pub(crate) fn bind_method(&mut self, f: &FunctionRef, receiver: Value) -> Value {
        if f.bound_this.is_some() {
            return Value::Function(f.clone());
        }
        let shell = self.function_shell();
        Value::Function(FunctionRef::new(f.bind(receiver, shell)))
    }

    /// Plain dynamic object of class `Object`
    pub(crate) fn new_object(&mut self) -> ObjectRef {
        let class = self.builtins.object.clone();
        let proto = class.prototype.clone();
        self.heap.allocate_plain(ScriptObject::plain(Some(class), Some(proto)))
    }

    /// Array object holding `elements`
    pub(crate) fn new_array(&mut self, elements: Vec<Value>) -> Value {
        let class = self.builtins.array.clone();
        let proto = class.prototype.clone();
        Value::Object(
            self.heap
                .allocate_plain(ScriptObject::array(Some(class), Some(proto), elements)),
        )
    }

    pub(crate) fn method_name(&self, method: u32) -> StringId {
        self.unit
            .method(method)
            .map(|m| m.name)
            .unwrap_or(StringId::EMPTY)
    }

    /// Pool multiname with protected namespaces mapped to their lineage
    pub(crate) fn pool_multiname(&self, index: u32) -> ScriptResult<Multiname> {
        let mn = self
            .unit
            .multiname(index)
            .ok_or_else(|| Exception::verify_error(format!("multiname {} out of range", index)))?;
        if self.ns_aliases.is_empty()
            || !mn.namespaces.iter().any(|ns| self.ns_aliases.contains_key(ns))
        {
            return Ok(mn.clone());
        }
        let namespaces: Vec<Namespace> = mn
            .namespaces
            .iter()
            .map(|ns| self.canonical_ns(*ns))
            .collect();
        Ok(Multiname {
            namespaces: namespaces.into(),
            ..mn.clone()
        })
    }

    pub(crate) fn canonical_ns(&self, ns: Namespace) -> Namespace {
        self.ns_aliases.get(&ns).copied().unwrap_or(ns)
    }

    pub(crate) fn const_value(&self, value: &ConstValue) -> Value {
        match *value {
            ConstValue::Undefined => Value::Undefined,
            ConstValue::Null => Value::Null,
            ConstValue::Boolean(b) => Value::Boolean(b),
            ConstValue::Int(n) => Value::Int(n),
            ConstValue::UInt(n) => Value::UInt(n),
            ConstValue::Double(d) => Value::Double(d),
            ConstValue::String(id) => Value::String(id),
            ConstValue::Namespace(ns) => Value::Namespace(self.canonical_ns(ns)),
        }
    }

    /// Enter a nested invocation, guarding the recursion limit
    pub(crate) fn enter(&mut self, callee: &FunctionRef) -> ScriptResult<()> {
        if self.depth >= self.config.max_recursion_depth {
            debug!(depth = self.depth, "recursion limit reached");
            return Err(Exception::error(
                ErrorKind::StackOverflowError,
                format!(
                    "Stack overflow occurred: more than {} nested calls",
                    self.config.max_recursion_depth
                ),
            ));
        }
        self.depth += 1;
        self.contexts.push(CallContext {
            callee: callee.clone(),
            method: callee.method_id(),
        });
        Ok(())
    }

    /// Leave an invocation entered with [`enter`](Self::enter)
    pub(crate) fn leave(&mut self) {
        self.contexts.pop();
        self.depth = self.depth.saturating_sub(1);
    }

    /// Own plain property rendered as a string, empty when absent
    pub(crate) fn own_string(&mut self, obj: &ObjectRef, name: StringId) -> String {
        let value = {
            let o = obj.borrow();
            o.traits
                .find_any(name, object_model::KindMask::ALL)
                .and_then(|pos| o.traits.get(pos))
                .and_then(|t| t.var.plain().cloned())
        };
        match value {
            Some(v) => self.display(&v),
            None => String::new(),
        }
    }

    /// Best-effort string form for diagnostics; never throws
    pub fn display(&mut self, value: &Value) -> String {
        match self.to_string(value) {
            Ok(id) => self.strings.get(id).to_string(),
            Err(_) => format!("{:?}", value),
        }
    }
}
