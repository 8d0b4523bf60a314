//! Dispatch loop for bytecode execution
//!
//! Decodes one instruction at a time from the method's code buffer. A
//! faulting instruction leaves `frame.pc` at its own offset so the
//! exception table can be searched; a matching handler gets a stack holding
//! only the exception value and an empty local scope stack.

use std::cmp::Ordering;

use tracing::trace;

use bytecode_system::{decode, ExceptionInfo, Instruction, Opcode};
use core_types::{Multiname, StringId};
use object_model::{ClassRef, Exception, FunctionKind, ScriptResult, Value};

use crate::arith::{
    add_i, add_numbers, lshift, modulo_numbers, mul_i, mul_numbers, negate_i, negate_number,
    rshift, strict_equals, sub_i, sub_numbers, urshift,
};
use crate::binding_cache::Binding;
use crate::call_frame::CallFrame;
use crate::coerce::{to_boolean, type_of};
use crate::runtime::Runtime;

impl Runtime {
    /// Run a method body to completion
    ///
    /// # Arguments
    ///
    /// * `frame` - Frame with locals already populated
    /// * `code` - Method code buffer
    /// * `handlers` - Exception table, innermost first
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - Value of `returnvalue`, or `undefined` for `returnvoid`
    /// * `Err(Exception)` - An exception no handler of this method caught
    pub(crate) fn interpret(
        &mut self,
        frame: &mut CallFrame,
        code: &[u8],
        handlers: &[ExceptionInfo],
    ) -> ScriptResult<Value> {
        loop {
            let exc = match self.execute(frame, code) {
                Ok(value) => return Ok(value),
                Err(exc) => exc,
            };
            let offset = frame.pc;
            if !handlers.iter().any(|h| h.covers(offset)) {
                return Err(exc);
            }
            let value = self.exception_value(exc);
            match self.select_handler(handlers, offset, &value)? {
                Some(target) => {
                    trace!(method = frame.method, offset, target, "exception caught");
                    if let Some(state) = self.methods.get_mut(frame.method as usize) {
                        state.profile.handled_exceptions += 1;
                    }
                    frame.enter_handler(value, target as usize);
                }
                None => return Err(Exception::Thrown(value)),
            }
        }
    }

    /// First handler whose range covers `offset` and whose type accepts `value`
    fn select_handler(
        &mut self,
        handlers: &[ExceptionInfo],
        offset: usize,
        value: &Value,
    ) -> ScriptResult<Option<u32>> {
        for handler in handlers.iter().filter(|h| h.covers(offset)) {
            let accepts = match handler.exc_type {
                None => true,
                Some(index) => {
                    let mn = self.pool_multiname(index)?;
                    match self.resolve_type(&mn)? {
                        None => true,
                        Some(class) => self.is_type(value, &class),
                    }
                }
            };
            if accepts {
                return Ok(Some(handler.target));
            }
        }
        Ok(None)
    }

    fn execute(&mut self, frame: &mut CallFrame, code: &[u8]) -> ScriptResult<Value> {
        loop {
            let inst = decode(code, frame.pc).map_err(|e| Exception::verify_error(e.to_string()))?;
            let mut next = inst.next;
            match inst.opcode {
                Opcode::Nop | Opcode::Label | Opcode::CoerceA => {}
                Opcode::Throw => {
                    let value = frame.pop()?;
                    return Err(Exception::Thrown(value));
                }
                Opcode::ReturnVoid => return Ok(Value::Undefined),
                Opcode::ReturnValue => return frame.pop(),

                // No XML support: the namespace is checked and then dropped
                Opcode::Dxns => self.require_dxns(frame)?,
                Opcode::DxnsLate => {
                    self.require_dxns(frame)?;
                    let uri = frame.pop()?;
                    self.to_string(&uri)?;
                }
                Opcode::Kill => frame.set_local(inst.arg(), Value::Undefined)?,

                Opcode::Jump => next = branch_target(&inst)?,
                Opcode::IfTrue | Opcode::IfFalse => {
                    let value = frame.pop()?;
                    if to_boolean(&value) == (inst.opcode == Opcode::IfTrue) {
                        next = branch_target(&inst)?;
                    }
                }
                Opcode::IfEq
                | Opcode::IfNe
                | Opcode::IfLt
                | Opcode::IfLe
                | Opcode::IfGt
                | Opcode::IfGe
                | Opcode::IfStrictEq
                | Opcode::IfStrictNe => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let taken = match inst.opcode {
                        Opcode::IfEq => self.equals(&a, &b)?,
                        Opcode::IfNe => !self.equals(&a, &b)?,
                        Opcode::IfStrictEq => strict_equals(&a, &b),
                        Opcode::IfStrictNe => !strict_equals(&a, &b),
                        Opcode::IfLt => self.compare(&a, &b)? == Some(Ordering::Less),
                        Opcode::IfLe => matches!(self.compare(&a, &b)?, Some(Ordering::Less | Ordering::Equal)),
                        Opcode::IfGt => self.compare(&a, &b)? == Some(Ordering::Greater),
                        _ => matches!(self.compare(&a, &b)?, Some(Ordering::Greater | Ordering::Equal)),
                    };
                    if taken {
                        next = branch_target(&inst)?;
                    }
                }

                Opcode::PushWith | Opcode::PushScope => {
                    let value = frame.pop()?;
                    frame.push_scope(value, inst.opcode == Opcode::PushWith)?;
                }
                Opcode::PopScope => {
                    frame.pop_scope()?;
                }
                Opcode::GetGlobalScope => {
                    let global = frame
                        .outer
                        .first()
                        .or_else(|| frame.scope().first())
                        .map(|entry| entry.value.clone())
                        .unwrap_or_else(|| self.global());
                    frame.push(global)?;
                }
                Opcode::GetScopeObject => {
                    let value = frame.scope_at(inst.arg())?.value.clone();
                    frame.push(value)?;
                }

                Opcode::HasNext2 => {
                    let object = frame.local(inst.arg())?;
                    let index = frame.local(inst.arg2())?;
                    let index = self.to_uint32(&index)?;
                    let next_index = self.next_name_index(&object, index);
                    if next_index == 0 {
                        frame.set_local(inst.arg(), Value::Null)?;
                    }
                    frame.set_local(inst.arg2(), Value::UInt(next_index))?;
                    frame.push(Value::Boolean(next_index != 0))?;
                }
                Opcode::NextName | Opcode::NextValue => {
                    let index = frame.pop()?;
                    let index = self.to_uint32(&index)?;
                    let object = frame.pop()?;
                    let value = if inst.opcode == Opcode::NextName {
                        self.next_name(&object, index)
                    } else {
                        self.next_value(&object, index)
                    };
                    frame.push(value)?;
                }

                Opcode::PushNull => frame.push(Value::Null)?,
                Opcode::PushUndefined => frame.push(Value::Undefined)?,
                Opcode::PushTrue => frame.push(Value::Boolean(true))?,
                Opcode::PushFalse => frame.push(Value::Boolean(false))?,
                Opcode::PushNaN => frame.push(Value::Double(f64::NAN))?,
                Opcode::PushString => frame.push(Value::String(StringId(inst.arg())))?,
                Opcode::PushInt => frame.push(Value::Int(inst.arg() as i32))?,
                Opcode::PushUint => frame.push(Value::UInt(inst.arg()))?,
                Opcode::PushDouble => frame.push(Value::Double(inst.double()))?,
                Opcode::PushNamespace => {
                    let ns = self
                        .unit
                        .namespace(inst.arg())
                        .copied()
                        .ok_or_else(|| Exception::verify_error("namespace index out of range"))?;
                    frame.push(Value::Namespace(self.canonical_ns(ns)))?;
                }
                Opcode::Pop => {
                    frame.pop()?;
                }
                Opcode::Dup => {
                    let top = frame.peek()?.clone();
                    frame.push(top)?;
                }
                Opcode::Swap => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    frame.push(b)?;
                    frame.push(a)?;
                }

                Opcode::GetLocal => {
                    let value = frame.local(inst.arg())?;
                    frame.push(value)?;
                }
                Opcode::SetLocal => {
                    let value = frame.pop()?;
                    frame.set_local(inst.arg(), value)?;
                }

                Opcode::NewFunction => {
                    let method = inst.arg();
                    let name = self.method_name(method);
                    let scope = frame.full_scope();
                    let f = self.new_function(FunctionKind::Script(method), name, scope, None);
                    frame.push(Value::Function(f))?;
                }
                Opcode::NewObject => {
                    let pairs = frame.pop_n(inst.arg() as usize * 2)?;
                    let object = Value::Object(self.new_object());
                    let base = Multiname::runtime(Vec::new());
                    let mut pairs = pairs.into_iter();
                    while let (Some(name), Some(value)) = (pairs.next(), pairs.next()) {
                        let mn = self.multiname_from_value(&base, &name)?;
                        self.set_property(&object, &mn, value)?;
                    }
                    frame.push(object)?;
                }
                Opcode::NewArray => {
                    let elements = frame.pop_n(inst.arg() as usize)?;
                    let array = self.new_array(elements);
                    frame.push(array)?;
                }
                Opcode::NewClass => {
                    // Linking already fixed the super class
                    frame.pop()?;
                    let class = self.new_class(inst.arg())?;
                    frame.push(class)?;
                }

                Opcode::Call => {
                    let args = frame.pop_n(inst.arg() as usize)?;
                    let receiver = frame.pop()?;
                    let callee = frame.pop()?;
                    let result = self.call(&callee, receiver, args)?;
                    frame.push(result)?;
                }
                Opcode::Construct => {
                    let args = frame.pop_n(inst.arg() as usize)?;
                    let ctor = frame.pop()?;
                    let result = self.construct(&ctor, args)?;
                    frame.push(result)?;
                }
                Opcode::ConstructSuper => {
                    let args = frame.pop_n(inst.arg() as usize)?;
                    let receiver = frame.pop()?;
                    let home = frame.home.clone();
                    self.construct_super(home.as_ref(), receiver, args)?;
                }
                Opcode::CallProperty | Opcode::CallPropVoid => {
                    let args = frame.pop_n(inst.arg2() as usize)?;
                    let mn = self.operand_multiname(frame, inst.arg())?;
                    let receiver = frame.pop()?;
                    let result = self.call_property(&receiver, &mn, args)?;
                    if inst.opcode == Opcode::CallProperty {
                        frame.push(result)?;
                    }
                }
                Opcode::CallSuper | Opcode::CallSuperVoid => {
                    let args = frame.pop_n(inst.arg2() as usize)?;
                    let mn = self.operand_multiname(frame, inst.arg())?;
                    let receiver = frame.pop()?;
                    let home = frame.home.clone();
                    let result = self.call_super(home.as_ref(), &receiver, &mn, args)?;
                    if inst.opcode == Opcode::CallSuper {
                        frame.push(result)?;
                    }
                }
                Opcode::ConstructProp => {
                    let args = frame.pop_n(inst.arg2() as usize)?;
                    let mn = self.operand_multiname(frame, inst.arg())?;
                    let receiver = frame.pop()?;
                    let result = self.construct_property(&receiver, &mn, args)?;
                    frame.push(result)?;
                }

                Opcode::FindPropStrict | Opcode::FindProperty => {
                    let strict = inst.opcode == Opcode::FindPropStrict;
                    let scope = self.lookup_scope(frame, &inst, strict)?;
                    frame.push(scope)?;
                }
                Opcode::GetLex => {
                    let scope = self.lookup_scope(frame, &inst, true)?;
                    let mn = self.pool_multiname(inst.arg())?;
                    let value = self.get_property(&scope, &mn)?;
                    frame.push(value)?;
                }
                Opcode::GetProperty => {
                    let mn = self.operand_multiname(frame, inst.arg())?;
                    let object = frame.pop()?;
                    let value = self.get_property(&object, &mn)?;
                    frame.push(value)?;
                }
                Opcode::SetProperty | Opcode::InitProperty => {
                    let value = frame.pop()?;
                    let mn = self.operand_multiname(frame, inst.arg())?;
                    let object = frame.pop()?;
                    if inst.opcode == Opcode::SetProperty {
                        self.set_property(&object, &mn, value)?;
                    } else {
                        self.init_property(&object, &mn, value)?;
                    }
                }
                Opcode::DeleteProperty => {
                    let mn = self.operand_multiname(frame, inst.arg())?;
                    let object = frame.pop()?;
                    let deleted = self.delete_property(&object, &mn)?;
                    frame.push(Value::Boolean(deleted))?;
                }
                Opcode::GetSuper => {
                    let mn = self.operand_multiname(frame, inst.arg())?;
                    let object = frame.pop()?;
                    let home = frame.home.clone();
                    let value = self.get_super(home.as_ref(), &object, &mn)?;
                    frame.push(value)?;
                }
                Opcode::SetSuper => {
                    let value = frame.pop()?;
                    let mn = self.operand_multiname(frame, inst.arg())?;
                    let object = frame.pop()?;
                    let home = frame.home.clone();
                    self.set_super(home.as_ref(), &object, &mn, value)?;
                }
                Opcode::GetSlot => {
                    let object = frame.pop()?;
                    let value = self.get_slot(&object, inst.arg())?;
                    frame.push(value)?;
                }
                Opcode::SetSlot => {
                    let value = frame.pop()?;
                    let object = frame.pop()?;
                    self.set_slot(&object, inst.arg(), value)?;
                }

                Opcode::ConvertS => {
                    let value = frame.pop()?;
                    let id = self.to_string(&value)?;
                    frame.push(Value::String(id))?;
                }
                Opcode::CoerceS => {
                    let value = frame.pop()?;
                    let coerced = if value.is_nullish() {
                        Value::Null
                    } else {
                        Value::String(self.to_string(&value)?)
                    };
                    frame.push(coerced)?;
                }
                Opcode::ConvertI => {
                    let value = frame.pop()?;
                    frame.push(Value::Int(self.to_int32(&value)?))?;
                }
                Opcode::ConvertU => {
                    let value = frame.pop()?;
                    frame.push(Value::UInt(self.to_uint32(&value)?))?;
                }
                Opcode::ConvertD => {
                    let value = frame.pop()?;
                    frame.push(Value::Double(self.to_number(&value)?))?;
                }
                Opcode::ConvertB => {
                    let value = frame.pop()?;
                    frame.push(Value::Boolean(to_boolean(&value)))?;
                }
                Opcode::Coerce => {
                    let ty = self.operand_type(frame, &inst)?;
                    let value = frame.pop()?;
                    let coerced = self.coerce(value, ty.as_ref())?;
                    frame.push(coerced)?;
                }
                Opcode::AsType => {
                    let ty = self.operand_type(frame, &inst)?;
                    let value = frame.pop()?;
                    frame.push(self.as_type(value, ty.as_ref()))?;
                }
                Opcode::AsTypeLate => {
                    let ty = frame.pop()?;
                    let ty = self.type_operand(&ty)?;
                    let value = frame.pop()?;
                    frame.push(self.as_type(value, Some(&ty)))?;
                }
                Opcode::IsType => {
                    let ty = self.operand_type(frame, &inst)?;
                    let value = frame.pop()?;
                    let result = ty.map_or(true, |class| self.is_type(&value, &class));
                    frame.push(Value::Boolean(result))?;
                }
                Opcode::IsTypeLate => {
                    let ty = frame.pop()?;
                    let ty = self.type_operand(&ty)?;
                    let value = frame.pop()?;
                    frame.push(Value::Boolean(self.is_type(&value, &ty)))?;
                }
                Opcode::InstanceOf => {
                    let ty = frame.pop()?;
                    let value = frame.pop()?;
                    let result = self.instance_of(&value, &ty)?;
                    frame.push(Value::Boolean(result))?;
                }
                Opcode::In => {
                    let object = frame.pop()?;
                    let name = frame.pop()?;
                    let mn = self.multiname_from_value(&Multiname::runtime(Vec::new()), &name)?;
                    let found = self.has_property(&object, &mn)?;
                    frame.push(Value::Boolean(found))?;
                }
                Opcode::TypeOf => {
                    let value = frame.pop()?;
                    let text = self.string_value(type_of(&value));
                    frame.push(text)?;
                }

                Opcode::Negate => {
                    let value = frame.pop()?;
                    let n = self.to_numeric(&value)?;
                    frame.push(negate_number(&n))?;
                }
                Opcode::Increment | Opcode::Decrement => {
                    let value = frame.pop()?;
                    let n = self.to_numeric(&value)?;
                    let result = if inst.opcode == Opcode::Increment {
                        add_numbers(&n, &Value::Int(1))
                    } else {
                        sub_numbers(&n, &Value::Int(1))
                    };
                    frame.push(result)?;
                }
                Opcode::Not => {
                    let value = frame.pop()?;
                    frame.push(Value::Boolean(!to_boolean(&value)))?;
                }
                Opcode::BitNot => {
                    let value = frame.pop()?;
                    frame.push(Value::Int(!self.to_int32(&value)?))?;
                }
                Opcode::Add => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let result = self.add(&a, &b)?;
                    frame.push(result)?;
                }
                Opcode::Subtract | Opcode::Multiply | Opcode::Modulo => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let op = match inst.opcode {
                        Opcode::Subtract => sub_numbers,
                        Opcode::Multiply => mul_numbers,
                        _ => modulo_numbers,
                    };
                    let result = self.numeric_binary(&a, &b, op)?;
                    frame.push(result)?;
                }
                Opcode::Divide => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let x = self.to_number(&a)?;
                    let y = self.to_number(&b)?;
                    frame.push(Value::Double(x / y))?;
                }
                Opcode::LShift | Opcode::RShift | Opcode::BitAnd | Opcode::BitOr | Opcode::BitXor => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let x = self.to_int32(&a)?;
                    let result = match inst.opcode {
                        Opcode::LShift => lshift(x, self.to_uint32(&b)?),
                        Opcode::RShift => rshift(x, self.to_uint32(&b)?),
                        Opcode::BitAnd => x & self.to_int32(&b)?,
                        Opcode::BitOr => x | self.to_int32(&b)?,
                        _ => x ^ self.to_int32(&b)?,
                    };
                    frame.push(Value::Int(result))?;
                }
                Opcode::URShift => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let x = self.to_uint32(&a)?;
                    let y = self.to_uint32(&b)?;
                    frame.push(Value::UInt(urshift(x, y)))?;
                }
                Opcode::Equals | Opcode::StrictEquals => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let result = if inst.opcode == Opcode::Equals {
                        self.equals(&a, &b)?
                    } else {
                        strict_equals(&a, &b)
                    };
                    frame.push(Value::Boolean(result))?;
                }
                Opcode::LessThan | Opcode::LessEquals | Opcode::GreaterThan | Opcode::GreaterEquals => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let order = self.compare(&a, &b)?;
                    let result = match inst.opcode {
                        Opcode::LessThan => order == Some(Ordering::Less),
                        Opcode::LessEquals => matches!(order, Some(Ordering::Less | Ordering::Equal)),
                        Opcode::GreaterThan => order == Some(Ordering::Greater),
                        _ => matches!(order, Some(Ordering::Greater | Ordering::Equal)),
                    };
                    frame.push(Value::Boolean(result))?;
                }

                Opcode::IncrementI | Opcode::DecrementI | Opcode::NegateI => {
                    let value = frame.pop()?;
                    let x = self.to_int32(&value)?;
                    let result = match inst.opcode {
                        Opcode::IncrementI => add_i(x, 1),
                        Opcode::DecrementI => sub_i(x, 1),
                        _ => negate_i(x),
                    };
                    frame.push(Value::Int(result))?;
                }
                Opcode::AddI | Opcode::SubtractI | Opcode::MultiplyI => {
                    let b = frame.pop()?;
                    let a = frame.pop()?;
                    let x = self.to_int32(&a)?;
                    let y = self.to_int32(&b)?;
                    let result = match inst.opcode {
                        Opcode::AddI => add_i(x, y),
                        Opcode::SubtractI => sub_i(x, y),
                        _ => mul_i(x, y),
                    };
                    frame.push(Value::Int(result))?;
                }
            }
            frame.pc = next;
        }
    }

    /// Pool multiname, popping the local name when it is supplied at run time
    fn operand_multiname(&mut self, frame: &mut CallFrame, index: u32) -> ScriptResult<Multiname> {
        let mn = self.pool_multiname(index)?;
        if !mn.runtime_name {
            return Ok(mn);
        }
        let name = frame.pop()?;
        self.multiname_from_value(&mn, &name)
    }

    /// Scope object for a lexical lookup, through the binding cache
    fn lookup_scope(&mut self, frame: &mut CallFrame, inst: &Instruction, strict: bool) -> ScriptResult<Value> {
        let method = frame.method as usize;
        let mn = self.pool_multiname(inst.arg())?;
        if mn.runtime_name {
            let mn = self.operand_multiname(frame, inst.arg())?;
            return Ok(self.find_property(frame, &mn, strict)?.0);
        }
        if let Some(Binding::Scope(object)) = self
            .methods
            .get_mut(method)
            .and_then(|m| m.cache.lookup(inst.offset))
        {
            return Ok(Value::Object(object));
        }
        let (scope, cacheable) = self.find_property(frame, &mn, strict)?;
        if cacheable {
            if let (Some(state), Some(object)) = (self.methods.get_mut(method), scope.as_object()) {
                state.cache.fill(inst.offset, Binding::Scope(object.clone()));
            }
        }
        Ok(scope)
    }

    /// Type operand of `coerce`/`astype`/`istype`, through the binding cache
    fn operand_type(&mut self, frame: &CallFrame, inst: &Instruction) -> ScriptResult<Option<ClassRef>> {
        let method = frame.method as usize;
        if let Some(Binding::Type(ty)) = self
            .methods
            .get_mut(method)
            .and_then(|m| m.cache.lookup(inst.offset))
        {
            return Ok(ty);
        }
        let mn = self.pool_multiname(inst.arg())?;
        let ty = self.resolve_type(&mn)?;
        if let Some(state) = self.methods.get_mut(method) {
            state.cache.fill(inst.offset, Binding::Type(ty.clone()));
        }
        Ok(ty)
    }

    fn type_operand(&self, value: &Value) -> ScriptResult<ClassRef> {
        match value {
            Value::Class(class) => Ok(class.clone()),
            other => Err(Exception::type_error(format!(
                "Type operand must be a class, got {}.",
                self.class_name_of(other)
            ))),
        }
    }

    fn as_type(&self, value: Value, ty: Option<&ClassRef>) -> Value {
        match ty {
            None => value,
            Some(class) if self.is_type(&value, class) => value,
            Some(_) => Value::Null,
        }
    }

    /// Prototype-chain membership for `instanceof`
    fn instance_of(&mut self, value: &Value, ty: &Value) -> ScriptResult<bool> {
        if !matches!(ty, Value::Class(_) | Value::Function(_)) {
            return Err(Exception::type_error("Right side of instanceof must be a class or function."));
        }
        let prototype_mn = Multiname::public(self.names.prototype);
        let Value::Object(target) = self.get_property(ty, &prototype_mn)? else {
            return Ok(false);
        };
        let mut current = match value.shell() {
            Some(obj) => obj.borrow().proto.clone(),
            None => self.class_of(value).map(|c| c.prototype.clone()),
        };
        let mut hops = 0;
        while let Some(proto) = current {
            if proto.ptr_eq(&target) {
                return Ok(true);
            }
            hops += 1;
            if hops > 256 {
                break;
            }
            current = proto.borrow().proto.clone();
        }
        Ok(false)
    }
}

impl Runtime {
    /// `dxns` is only legal in methods flagged as setting it
    fn require_dxns(&self, frame: &CallFrame) -> ScriptResult<()> {
        let allowed = self
            .unit
            .methods
            .get(frame.method as usize)
            .is_some_and(|m| m.flags.set_dxns);
        if allowed {
            Ok(())
        } else {
            Err(Exception::verify_error(format!(
                "dxns at offset {} in a method without the set-dxns flag",
                frame.pc
            )))
        }
    }
}

fn branch_target(inst: &Instruction) -> ScriptResult<usize> {
    inst.target()
        .ok_or_else(|| Exception::verify_error(format!("missing branch target at {}", inst.offset)))
}
