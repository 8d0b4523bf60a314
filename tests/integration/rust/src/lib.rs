//! Integration test suite for the AVM runtime
//!
//! Provides [`Program`], a small assembler for building bytecode units with
//! classes, global functions and a main script, so the scenario tests can
//! drive the loader, linker and interpreter together.

use bytecode_system::{
    ClassInfo, CodeBuilder, ExceptionInfo, InstanceInfo, MethodBody, MethodInfo, Opcode,
    ScriptInfo, TraitInfo, TraitInfoKind, UnitBuilder,
};
use core_types::{EngineError, Namespace, NamespaceKind, StringId};
use interpreter::{Runtime, RuntimeConfig};

/// Re-export components for test convenience
pub mod components {
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use object_model;
}

/// Method body under construction
pub struct Asm<'a> {
    /// Pool the body's operands point into
    pub unit: &'a mut UnitBuilder,
    /// Code buffer
    pub code: CodeBuilder,
    handlers: Vec<ExceptionInfo>,
    locals: u32,
}

impl Asm<'_> {
    /// Public multiname index for `name`
    pub fn name(&mut self, name: &str) -> u32 {
        self.unit.public_name(name)
    }

    /// Interned string id
    pub fn string(&mut self, s: &str) -> StringId {
        self.unit.intern(s)
    }

    /// Offset of the next emitted instruction
    pub fn here(&self) -> u32 {
        self.code.offset() as u32
    }

    /// Guard `[from, to)` with a handler at `target`, typed by a public class name
    pub fn catch(&mut self, from: u32, to: u32, target: u32, class: Option<&str>) {
        let handler = match class {
            Some(class) => {
                let ty = self.unit.public_name(class);
                ExceptionInfo::typed(from, to, target, ty)
            }
            None => ExceptionInfo::catch_all(from, to, target),
        };
        self.handlers.push(handler);
    }

    /// Request at least `count` locals, receiver included
    pub fn locals(&mut self, count: u32) {
        self.locals = self.locals.max(count);
    }

    /// `findpropstrict name`, pushing the receiver for a later [`call`](Self::call)
    pub fn find(&mut self, name: &str) -> &mut Self {
        let mn = self.unit.public_name(name);
        self.code.op_u32(Opcode::FindPropStrict, mn);
        self
    }

    /// `callproperty name argc`
    pub fn call(&mut self, name: &str, argc: u32) -> &mut Self {
        let mn = self.unit.public_name(name);
        self.code.op_pair(Opcode::CallProperty, mn, argc);
        self
    }

    /// `getlex name`
    pub fn lex(&mut self, name: &str) -> &mut Self {
        let mn = self.unit.public_name(name);
        self.code.op_u32(Opcode::GetLex, mn);
        self
    }
}

/// Instance and static parts of a class under construction
pub struct ClassParts {
    /// Instance side
    pub instance: InstanceInfo,
    /// Static side
    pub statics: ClassInfo,
}

/// Bytecode unit under construction
#[derive(Default)]
pub struct Program {
    /// Underlying unit builder
    pub unit: UnitBuilder,
    globals: Vec<TraitInfo>,
}

impl Program {
    /// Empty program
    pub fn new() -> Self {
        Self::default()
    }

    /// Public multiname index for `name`
    pub fn name(&mut self, name: &str) -> u32 {
        self.unit.public_name(name)
    }

    /// Multiname index for `name` in `ns`
    pub fn qname(&mut self, ns: Namespace, name: &str) -> u32 {
        self.unit.qname(ns, name)
    }

    /// Namespace of `kind` named by `uri`
    pub fn namespace(&mut self, kind: NamespaceKind, uri: &str) -> Namespace {
        self.unit.named_namespace(kind, uri)
    }

    /// Add a method whose body is emitted by `body`
    pub fn method(
        &mut self,
        name: &str,
        info: impl FnOnce(MethodInfo) -> MethodInfo,
        body: impl FnOnce(&mut Asm),
    ) -> u32 {
        let id = self.unit.intern(name);
        let mut asm = Asm {
            unit: &mut self.unit,
            code: CodeBuilder::new(),
            handlers: Vec::new(),
            locals: 8,
        };
        body(&mut asm);
        let Asm {
            code,
            handlers,
            locals,
            ..
        } = asm;
        let mut method_body = MethodBody::new(code.finish()).with_locals(locals);
        for handler in handlers {
            method_body = method_body.with_handler(handler);
        }
        self.unit.method(info(MethodInfo::new(id)).body(method_body))
    }

    /// Method declared without a body, as interface members are
    pub fn abstract_method(&mut self, name: &str) -> u32 {
        let id = self.unit.intern(name);
        self.unit.method(MethodInfo::new(id))
    }

    /// Add a global function `name`
    pub fn function(
        &mut self,
        name: &str,
        info: impl FnOnce(MethodInfo) -> MethodInfo,
        body: impl FnOnce(&mut Asm),
    ) -> u32 {
        let method = self.method(name, info, body);
        let mn = self.unit.public_name(name);
        self.globals.push(TraitInfo::new(
            mn,
            TraitInfoKind::Function { slot_id: 0, method },
        ));
        method
    }

    /// Add a global variable `name`
    pub fn global_var(&mut self, trait_info: TraitInfo) {
        self.globals.push(trait_info);
    }

    /// Constructor that only runs the super constructor
    pub fn default_constructor(&mut self, class: &str) -> u32 {
        self.method(class, |m| m, |a| {
            a.code.get_local(0);
            a.code.op_u32(Opcode::ConstructSuper, 0);
            a.code.op(Opcode::ReturnVoid);
        })
    }

    /// Add a public class; `configure` adjusts both sides before it is added
    pub fn class(
        &mut self,
        name: &str,
        super_name: Option<&str>,
        configure: impl FnOnce(&mut Program, &mut ClassParts),
    ) -> u32 {
        let name_mn = self.unit.public_name(name);
        let super_mn = super_name.map(|s| self.unit.public_name(s));
        let ctor = self.default_constructor(name);
        let cinit = self.method(&format!("{}$cinit", name), |m| m, |a| {
            a.code.op(Opcode::ReturnVoid);
        });
        let mut parts = ClassParts {
            instance: InstanceInfo::new(name_mn, super_mn, ctor),
            statics: ClassInfo {
                init: cinit,
                traits: Vec::new(),
            },
        };
        configure(self, &mut parts);
        self.unit.add_class(parts.instance, parts.statics)
    }

    /// Load the program with `main` as its only script
    pub fn load(self, main: impl FnOnce(&mut Asm)) -> Result<Runtime, EngineError> {
        self.load_with(RuntimeConfig::default(), main)
    }

    /// Load with an explicit configuration
    pub fn load_with(
        mut self,
        config: RuntimeConfig,
        main: impl FnOnce(&mut Asm),
    ) -> Result<Runtime, EngineError> {
        let init = self.method("main", |m| m, main);
        let traits = std::mem::take(&mut self.globals);
        self.unit.add_script(ScriptInfo { init, traits });
        Runtime::load(self.unit.finish(), config)
    }
}

/// Install a test subscriber once so `RUST_LOG` shows engine traces
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
