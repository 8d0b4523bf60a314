//! Function invocation and object construction
//!
//! Every call goes through [`Runtime::call`]. Compiled methods get a fresh
//! [`CallFrame`] with the receiver in local 0, coerced arguments after it
//! and an optional rest or `arguments` array. The recursion guard and the
//! call-context stack are maintained for natives and compiled methods
//! alike, and are unwound on every exit path.

use std::rc::Rc;

use tracing::{debug, trace};

use bytecode_system::MethodInfo;
use core_types::Multiname;
use object_model::{
    BuiltinKind, ClassRef, ConstructionState, Exception, FunctionKind, FunctionRef, ScriptObject,
    ScriptResult, Value,
};

use crate::call_frame::CallFrame;
use crate::runtime::{Runtime, Signature};

impl Runtime {
    /// Call a callable value
    ///
    /// # Arguments
    ///
    /// * `callee` - Function, or a class for a conversion call like `int(x)`
    /// * `receiver` - `this` unless the function carries a bound receiver
    /// * `args` - Arguments in call order
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - Return value coerced to the declared return type
    /// * `Err(Exception)` - `TypeError` for non-callable values, or whatever
    ///   the callee threw
    pub fn call(&mut self, callee: &Value, receiver: Value, args: Vec<Value>) -> ScriptResult<Value> {
        match callee {
            Value::Function(f) => self.call_function(f, receiver, args),
            Value::Class(class) => {
                if args.len() != 1 {
                    return Err(Exception::argument_error(format!(
                        "Argument count mismatch on class coercion. Expected 1, got {}.",
                        args.len()
                    )));
                }
                let arg = args.into_iter().next().unwrap_or_default();
                self.convert_call(class, arg)
            }
            other => Err(Exception::type_error(format!(
                "value is not a function ({}).",
                self.class_name_of(other)
            ))),
        }
    }

    fn convert_call(&mut self, class: &ClassRef, arg: Value) -> ScriptResult<Value> {
        if class.unit_id.is_none() && class.builtin.get() == Some(BuiltinKind::String) {
            return Ok(Value::String(self.to_string(&arg)?));
        }
        self.coerce(arg, Some(class))
    }

    /// Call a function value
    pub fn call_function(&mut self, f: &FunctionRef, receiver: Value, args: Vec<Value>) -> ScriptResult<Value> {
        let receiver = f.bound_this.clone().unwrap_or(receiver);
        match f.kind {
            FunctionKind::Native(id) => {
                let func = self
                    .natives
                    .get(id.0 as usize)
                    .map(|entry| entry.func.clone())
                    .ok_or_else(|| Exception::verify_error(format!("native {} is not registered", id.0)))?;
                self.enter(f)?;
                let result = func(self, receiver, args);
                self.leave();
                result
            }
            FunctionKind::Script(method) => self.invoke_method(f, method, receiver, args),
        }
    }

    fn invoke_method(
        &mut self,
        f: &FunctionRef,
        method: u32,
        receiver: Value,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        let unit = self.unit.clone();
        let info = unit
            .method(method)
            .ok_or_else(|| Exception::verify_error(format!("method {} out of range", method)))?;
        self.check_arity(info, args.len())?;
        let signature = self.signature(method)?;

        self.enter(f)?;
        let threshold = self.config.hotness_threshold;
        if let Some(state) = self.methods.get_mut(method as usize) {
            if state.profile.record_invocation(threshold) {
                debug!(
                    method = %self.strings.get(info.name),
                    invocations = state.profile.invocations,
                    "method became hot"
                );
            }
        }
        let result = self.run_method(f, method, info, &signature, receiver, args);
        self.leave();
        result
    }

    fn check_arity(&self, info: &MethodInfo, argc: usize) -> ScriptResult<()> {
        if info.is_untyped() {
            return Ok(());
        }
        let required = info.required_params();
        let variadic = info.flags.need_rest || info.flags.need_arguments;
        if argc < required || (argc > info.params.len() && !variadic) {
            return Err(Exception::argument_error(format!(
                "Argument count mismatch on {}. Expected {}, got {}.",
                self.strings.get(info.name),
                required,
                argc
            )));
        }
        Ok(())
    }

    fn run_method(
        &mut self,
        f: &FunctionRef,
        method: u32,
        info: &MethodInfo,
        signature: &Signature,
        receiver: Value,
        args: Vec<Value>,
    ) -> ScriptResult<Value> {
        let body = info.body.as_ref().ok_or_else(|| {
            Exception::verify_error(format!(
                "method {} has no body",
                self.strings.get(info.name)
            ))
        })?;
        let declared = info.params.len();
        let mut frame = CallFrame::new(
            method,
            body.local_count as usize,
            (body.max_stack as usize).min(self.config.max_operand_stack),
            body.max_scope_depth as usize,
            f.scope.clone(),
        );
        frame.home = f.home.clone();
        let needed = declared + 1 + usize::from(info.flags.need_rest || info.flags.need_arguments);
        if frame.locals.len() < needed {
            frame.locals.resize(needed, Value::Undefined);
        }
        frame.locals[0] = receiver;

        let all_args = if info.flags.need_arguments {
            args.clone()
        } else {
            Vec::new()
        };
        let mut args = args.into_iter();
        for (i, param) in info.params.iter().enumerate() {
            let value = match args.next() {
                Some(v) => v,
                None => param
                    .default
                    .as_ref()
                    .map_or(Value::Undefined, |d| self.const_value(d)),
            };
            let ty = signature.params.get(i).cloned().flatten();
            frame.locals[i + 1] = self.coerce(value, ty.as_ref())?;
        }
        if info.flags.need_rest {
            frame.locals[declared + 1] = self.new_array(args.collect());
        } else if info.flags.need_arguments {
            frame.locals[declared + 1] = self.new_array(all_args);
        }

        trace!(method, locals = frame.locals.len(), "entering method");
        let value = self.interpret(&mut frame, &body.code, &body.exceptions)?;
        self.coerce(value, signature.ret.as_ref())
    }

    /// Parameter and return types, resolved on first call
    fn signature(&mut self, method: u32) -> ScriptResult<Rc<Signature>> {
        if let Some(sig) = self
            .methods
            .get(method as usize)
            .and_then(|m| m.signature.clone())
        {
            return Ok(sig);
        }
        let unit = self.unit.clone();
        let info = unit
            .method(method)
            .ok_or_else(|| Exception::verify_error(format!("method {} out of range", method)))?;
        let mut params = Vec::with_capacity(info.params.len());
        for p in &info.params {
            params.push(self.declared_type(p.type_name)?);
        }
        let ret = self.declared_type(info.return_type)?;
        let sig = Rc::new(Signature { params, ret });
        if let Some(state) = self.methods.get_mut(method as usize) {
            state.signature = Some(sig.clone());
        }
        Ok(sig)
    }

    fn declared_type(&mut self, index: Option<u32>) -> ScriptResult<Option<ClassRef>> {
        let Some(index) = index else {
            return Ok(None);
        };
        let mn = self.pool_multiname(index)?;
        if mn.name.as_str().is_some_and(|id| self.strings.get(id) == "void") {
            return Ok(None);
        }
        self.resolve_type(&mn)
    }

    /// `new callee(args)`
    pub fn construct(&mut self, callee: &Value, args: Vec<Value>) -> ScriptResult<Value> {
        match callee {
            Value::Class(class) => self.construct_class(class, args),
            Value::Function(f) => self.construct_function(f, args),
            other => Err(Exception::type_error(format!(
                "Instantiation attempted on a non-constructor ({}).",
                self.class_name_of(other)
            ))),
        }
    }

    fn construct_class(&mut self, class: &ClassRef, args: Vec<Value>) -> ScriptResult<Value> {
        if class.is_interface() {
            return Err(Exception::type_error(format!(
                "Interface {} cannot be instantiated.",
                self.strings.get(class.name)
            )));
        }
        self.initialize_class(class)?;
        if class.unit_id.is_none() {
            if let Some(value) = self.construct_primitive(class, &args)? {
                return Ok(value);
            }
        }

        let obj = self.heap.allocate(class);
        {
            let mut o = obj.borrow_mut();
            o.materialize();
            o.state = ConstructionState::Constructing;
        }
        let instance = Value::Object(obj.clone());
        let ctor = class.constructor.borrow().clone();
        if let Some(ctor) = ctor {
            self.call_function(&ctor, instance.clone(), args)?;
        }
        obj.borrow_mut().state = ConstructionState::Constructed;
        Ok(instance)
    }

    /// `new int(x)` and friends produce primitives
    fn construct_primitive(&mut self, class: &ClassRef, args: &[Value]) -> ScriptResult<Option<Value>> {
        let default = match class.builtin.get() {
            Some(BuiltinKind::Int) => Value::Int(0),
            Some(BuiltinKind::UInt) => Value::UInt(0),
            Some(BuiltinKind::Number) => Value::Double(0.0),
            Some(BuiltinKind::Boolean) => Value::Boolean(false),
            Some(BuiltinKind::String) => Value::String(core_types::StringId::EMPTY),
            Some(BuiltinKind::Class) => {
                return Err(Exception::type_error("Class cannot be instantiated."));
            }
            _ => return Ok(None),
        };
        match args.first() {
            None => Ok(Some(default)),
            Some(arg) => self.convert_call(class, arg.clone()).map(Some),
        }
    }

    fn construct_function(&mut self, f: &FunctionRef, args: Vec<Value>) -> ScriptResult<Value> {
        let prototype_mn = Multiname::public(self.names.prototype);
        let proto = match self.get_property(&Value::Function(f.clone()), &prototype_mn)? {
            Value::Object(p) => p,
            _ => self.builtins.object.prototype.clone(),
        };
        let obj = self
            .heap
            .allocate_plain(ScriptObject::plain(Some(self.builtins.object.clone()), Some(proto)));
        let result = self.call_function(f, Value::Object(obj.clone()), args)?;
        Ok(if result.is_reference() {
            result
        } else {
            Value::Object(obj)
        })
    }

    /// `constructprop`
    pub fn construct_property(&mut self, receiver: &Value, mn: &Multiname, args: Vec<Value>) -> ScriptResult<Value> {
        let callee = self.get_property(receiver, mn)?;
        self.construct(&callee, args)
    }

    /// `constructsuper`: run the super class constructor on `receiver`
    pub fn construct_super(&mut self, home: Option<&ClassRef>, receiver: Value, args: Vec<Value>) -> ScriptResult<()> {
        let sup = home
            .and_then(|h| h.super_class())
            .ok_or_else(|| Exception::reference_error("constructsuper outside a class constructor"))?;
        let ctor = sup.constructor.borrow().clone();
        if let Some(ctor) = ctor {
            self.call_function(&ctor, receiver, args)?;
        }
        Ok(())
    }
}
