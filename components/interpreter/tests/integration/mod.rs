//! Integration tests for interpreter
//!
//! Drives a loaded [`Runtime`] from the host side: class instances, slots,
//! the instance free-list and the builtin natives.

use bytecode_system::{
    ClassInfo, CodeBuilder, InstanceInfo, MethodBody, MethodInfo, Opcode, ScriptInfo, TraitInfo,
    UnitBuilder,
};
use core_types::ErrorKind;
use interpreter::{Runtime, RuntimeConfig};
use object_model::{Exception, Value};

fn method(unit: &mut UnitBuilder, name: &str, emit: impl FnOnce(&mut CodeBuilder)) -> u32 {
    let mut code = CodeBuilder::new();
    emit(&mut code);
    let name = unit.intern(name);
    unit.method(MethodInfo::new(name).body(MethodBody::new(code.finish())))
}

/// Runtime with a reusable `Point` class: `x:int`, `y:int` and `sum()`
fn point_runtime() -> Runtime {
    let mut unit = UnitBuilder::new();
    let int = unit.public_name("int");
    let x = unit.public_name("x");
    let y = unit.public_name("y");
    let sum_name = unit.public_name("sum");
    let point = unit.public_name("Point");

    let ctor = method(&mut unit, "Point", |code| {
        code.get_local(0).op_u32(Opcode::ConstructSuper, 0);
        code.op(Opcode::ReturnVoid);
    });
    let cinit = method(&mut unit, "Point$cinit", |code| {
        code.op(Opcode::ReturnVoid);
    });
    let sum = method(&mut unit, "sum", |code| {
        code.get_local(0).op_u32(Opcode::GetProperty, x);
        code.get_local(0).op_u32(Opcode::GetProperty, y);
        code.op(Opcode::AddI).op(Opcode::ReturnValue);
    });
    let mut instance = InstanceInfo::new(point, None, ctor);
    instance.reusable = true;
    instance.traits.push(TraitInfo::slot(x, Some(int), None));
    instance.traits.push(TraitInfo::slot(y, Some(int), None));
    instance.traits.push(TraitInfo::method(sum_name, sum));
    unit.add_class(
        instance,
        ClassInfo {
            init: cinit,
            traits: Vec::new(),
        },
    );

    let main = method(&mut unit, "main", |code| {
        code.op(Opcode::ReturnVoid);
    });
    unit.add_script(ScriptInfo {
        init: main,
        traits: Vec::new(),
    });
    Runtime::load(unit.finish(), RuntimeConfig::default()).unwrap()
}

fn new_point(rt: &mut Runtime) -> Value {
    let class = rt.class_by_id(0).unwrap();
    rt.construct(&Value::Class(class), Vec::new()).unwrap()
}

fn kind_of(exc: Exception) -> Option<ErrorKind> {
    match exc {
        Exception::Error { kind, .. } => Some(kind),
        Exception::Thrown(_) => None,
    }
}

#[test]
fn test_slots_are_numbered_in_declaration_order() {
    let mut rt = point_runtime();
    let p = new_point(&mut rt);
    assert_eq!(rt.get_slot(&p, 1).unwrap(), Value::Int(0));
    rt.set_slot(&p, 1, Value::Double(3.9)).unwrap();
    rt.set_slot(&p, 2, Value::Int(4)).unwrap();

    let x = rt.public_name("x");
    assert_eq!(rt.get_property(&p, &x).unwrap(), Value::Int(3));
    let sum = rt.public_name("sum");
    assert_eq!(rt.call_property(&p, &sum, Vec::new()).unwrap(), Value::Int(7));
}

#[test]
fn test_declared_function_runs_against_instance() {
    let mut rt = point_runtime();
    let p = new_point(&mut rt);
    rt.set_slot(&p, 2, Value::Int(10)).unwrap();
    let class = rt.class_by_id(0).unwrap();
    let sum = rt.declared_function(&class, "sum").unwrap();
    assert_eq!(rt.call_function(&sum, p, Vec::new()).unwrap(), Value::Int(10));
    assert!(rt.declared_function(&class, "missing").is_none());
}

#[test]
fn test_released_instance_is_recycled_and_reset() {
    let mut rt = point_runtime();
    let p = new_point(&mut rt);
    rt.set_slot(&p, 1, Value::Int(9)).unwrap();
    let before = rt.heap_stats();
    assert!(rt.release(p));

    let q = new_point(&mut rt);
    let after = rt.heap_stats();
    assert_eq!(after.released, before.released + 1);
    assert_eq!(after.recycled, before.recycled + 1);
    assert_eq!(after.allocated, before.allocated);
    assert_eq!(rt.get_slot(&q, 1).unwrap(), Value::Int(0));
}

#[test]
fn test_shared_instance_is_not_released() {
    let mut rt = point_runtime();
    let p = new_point(&mut rt);
    let keep = p.clone();
    assert!(!rt.release(p));
    assert!(!rt.release(Value::Int(1)));
    drop(keep);
}

#[test]
fn test_array_natives_from_host() {
    let mut rt = point_runtime();
    let global = rt.global();
    let array_name = rt.public_name("Array");
    let array = rt.construct_property(&global, &array_name, Vec::new()).unwrap();

    let push = rt.public_name("push");
    let len = rt
        .call_property(&array, &push, vec![Value::Int(1), Value::Int(2)])
        .unwrap();
    assert_eq!(len, Value::UInt(2));

    let join = rt.public_name("join");
    let dash = rt.string_value("-");
    let joined = rt.call_property(&array, &join, vec![dash]).unwrap();
    assert_eq!(rt.str_of(&joined), Some("1-2"));

    let sized = rt
        .construct_property(&global, &array_name, vec![Value::Int(3)])
        .unwrap();
    let length = rt.public_name("length");
    assert_eq!(rt.get_property(&sized, &length).unwrap(), Value::UInt(3));

    let err = rt
        .construct_property(&global, &array_name, vec![Value::Double(1.5)])
        .unwrap_err();
    assert_eq!(kind_of(err), Some(ErrorKind::RangeError));
}

#[test]
fn test_function_call_and_apply() {
    let mut rt = point_runtime();
    let this_of = rt.register_native("thisOf", |_: &mut Runtime, this, _args: Vec<Value>| Ok(this));
    let count = rt.register_native("count", |_: &mut Runtime, _this, args: Vec<Value>| {
        Ok(Value::Int(args.len() as i32))
    });

    let call = rt.public_name("call");
    let result = rt.call_property(&this_of, &call, vec![Value::Int(7)]).unwrap();
    assert_eq!(result, Value::Int(7));

    let global = rt.global();
    let array_name = rt.public_name("Array");
    let list = rt
        .construct_property(&global, &array_name, vec![Value::Int(1), Value::Int(2)])
        .unwrap();
    let apply = rt.public_name("apply");
    let result = rt
        .call_property(&count, &apply, vec![Value::Null, list])
        .unwrap();
    assert_eq!(result, Value::Int(2));

    let err = rt
        .call_property(&count, &apply, vec![Value::Null, Value::Int(3)])
        .unwrap_err();
    assert_eq!(kind_of(err), Some(ErrorKind::TypeError));
}

#[test]
fn test_error_to_string_uses_class_name() {
    let mut rt = point_runtime();
    let global = rt.global();
    let range_error = rt.public_name("RangeError");
    let text = rt.string_value("too far");
    let err = rt.construct_property(&global, &range_error, vec![text]).unwrap();
    let to_string = rt.public_name("toString");
    let rendered = rt.call_property(&err, &to_string, Vec::new()).unwrap();
    assert_eq!(rt.str_of(&rendered), Some("RangeError: too far"));
}

#[test]
fn test_primitive_conversion_calls() {
    let mut rt = point_runtime();
    let int = rt.class_named("int").unwrap();
    let truncated = rt
        .call(&Value::Class(int.clone()), Value::Undefined, vec![Value::Double(3.7)])
        .unwrap();
    assert_eq!(truncated, Value::Int(3));

    let err = rt
        .call(&Value::Class(int), Value::Undefined, Vec::new())
        .unwrap_err();
    assert_eq!(kind_of(err), Some(ErrorKind::ArgumentError));

    let to_string = rt.public_name("toString");
    let five = rt.call_property(&Value::Int(5), &to_string, Vec::new()).unwrap();
    assert_eq!(rt.str_of(&five), Some("5"));
}

#[test]
fn test_is_nan_global() {
    let mut rt = point_runtime();
    let global = rt.global();
    let is_nan = rt.public_name("isNaN");
    let word = rt.string_value("word");
    assert_eq!(
        rt.call_property(&global, &is_nan, vec![word]).unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(
        rt.call_property(&global, &is_nan, vec![Value::Int(4)]).unwrap(),
        Value::Boolean(false)
    );
}
