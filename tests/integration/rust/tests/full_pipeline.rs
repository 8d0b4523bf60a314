//! Full Pipeline Integration Tests
//!
//! Tests the complete flow: UnitBuilder -> Verifier -> Linker -> Runtime ->
//! Result, including host natives, configuration and profiling.

use bytecode_system::{Opcode, ParamInfo};
use core_types::{EngineError, ErrorKind};
use integration_tests::{init_tracing, Asm, Program};
use interpreter::{Runtime, RuntimeConfig, Tier};
use object_model::{Exception, Value};

/// Program with a global `fail` that throws `new RangeError("out of range")`
fn throwing_program() -> Program {
    let mut program = Program::new();
    program.function("fail", |m| m, |a| {
        let text = a.string("out of range");
        a.lex("RangeError");
        a.code.push_string(text).op_u32(Opcode::Construct, 1);
        a.code.op(Opcode::Throw);
    });
    program
}

#[test]
fn test_bad_pool_index_is_rejected_before_linking() {
    init_tracing();
    let result = Program::new().load(|a| {
        a.code.op_u32(Opcode::GetLex, 999);
        a.code.op(Opcode::ReturnValue);
    });
    assert!(matches!(result, Err(EngineError::InvalidBytecode(_))));
}

#[test]
fn test_typed_handler_catches_error_object() {
    let mut rt = throwing_program()
        .load(|a| {
            let message = a.name("message");
            let from = a.here();
            a.find("fail").call("fail", 0);
            a.code.op(Opcode::ReturnValue);
            let to = a.here();
            a.code.op_u32(Opcode::GetProperty, message);
            a.code.op(Opcode::ReturnValue);
            a.catch(from, to, to, Some("RangeError"));
        })
        .unwrap();
    let result = rt.run_script(0).unwrap();
    assert_eq!(rt.str_of(&result), Some("out of range"));
    // main is the second method; fail is the first
    assert_eq!(rt.profile(1).unwrap().handled_exceptions, 1);
}

#[test]
fn test_unmatched_handler_reports_uncaught_error() {
    let mut rt = throwing_program()
        .load(|a| {
            let from = a.here();
            a.find("fail").call("fail", 0);
            a.code.op(Opcode::ReturnValue);
            let to = a.here();
            a.code.op(Opcode::PushNull).op(Opcode::ReturnValue);
            a.catch(from, to, to, Some("TypeError"));
        })
        .unwrap();
    match rt.run_script(0).unwrap_err() {
        EngineError::Uncaught { kind, message } => {
            assert_eq!(kind, Some(ErrorKind::RangeError));
            assert_eq!(message, "out of range");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(rt.recursion_depth(), 0);
}

#[test]
fn test_thrown_primitive_has_no_error_kind() {
    let mut rt = Program::new()
        .load(|a| {
            let text = a.string("boom");
            a.code.push_string(text).op(Opcode::Throw);
        })
        .unwrap();
    let err = rt.run_script(0).unwrap_err();
    assert_eq!(err.error_kind(), None);
    assert_eq!(err.to_string(), "uncaught exception: boom");
}

#[test]
fn test_config_from_json_sets_hotness() {
    let config = RuntimeConfig::from_json(r#"{ "hotness_threshold": 3 }"#).unwrap();
    let mut program = Program::new();
    let tick = program.function("tick", |m| m, |a| {
        a.code.op(Opcode::ReturnVoid);
    });
    let mut rt = program
        .load_with(config, |a| {
            let top = a.code.new_label();
            a.code.push_int(0).set_local(1);
            a.code.bind(top);
            let tick_mn = a.name("tick");
            a.find("tick");
            a.code.op_pair(Opcode::CallPropVoid, tick_mn, 0);
            a.code.get_local(1).op(Opcode::IncrementI).set_local(1);
            a.code.get_local(1).push_int(5);
            a.code.branch(Opcode::IfLt, top);
            a.code.op(Opcode::ReturnVoid);
        })
        .unwrap();
    rt.run_script(0).unwrap();

    let hot = rt.profile(tick).unwrap();
    assert_eq!(hot.invocations, 5);
    assert_eq!(hot.tier(3), Tier::Hot);
    let main = rt.profile(tick + 1).unwrap();
    assert_eq!(main.invocations, 1);
    assert_eq!(main.tier(3), Tier::Cold);
}

#[test]
fn test_host_native_is_callable_from_script() {
    let mut rt = Program::new()
        .load(|a| {
            a.find("triple");
            a.code.push_int(14);
            a.call("triple", 1);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    let triple = rt.register_native("triple", |rt: &mut Runtime, _this, args: Vec<Value>| {
        let n = rt.to_int32(&args.first().cloned().unwrap_or_default())?;
        Ok(Value::Int(n * 3))
    });
    rt.define_global("triple", triple).unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::Int(42));
}

#[test]
fn test_host_native_error_surfaces_with_kind() {
    let mut rt = Program::new()
        .load(|a| {
            a.find("refuse").call("refuse", 0);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    let refuse = rt.register_native("refuse", |_: &mut Runtime, _this, _args: Vec<Value>| {
        Err(Exception::error(ErrorKind::RangeError, "host refused"))
    });
    rt.define_global("refuse", refuse).unwrap();
    let err = rt.run_script(0).unwrap_err();
    assert_eq!(err.error_kind(), Some(ErrorKind::RangeError));
    assert_eq!(err.to_string(), "uncaught RangeError: host refused");
}

#[test]
fn test_host_invokes_script_function_after_run() {
    let mut program = Program::new();
    let int_mn = program.name("int");
    program.function(
        "square",
        |m| m.param(ParamInfo::typed(int_mn)),
        |a| {
            a.code.get_local(1).get_local(1).op(Opcode::MultiplyI);
            a.code.op(Opcode::ReturnValue);
        },
    );
    let mut rt = program
        .load(|a| {
            a.code.op(Opcode::ReturnVoid);
        })
        .unwrap();
    rt.run_script(0).unwrap();

    let global = rt.global();
    let name = rt.public_name("square");
    let square = rt.get_property(&global, &name).unwrap();
    let result = rt.invoke(&square, global.clone(), vec![Value::Double(9.5)]).unwrap();
    assert_eq!(result, Value::Int(81));

    let err = rt.invoke(&square, global, Vec::new()).unwrap_err();
    assert_eq!(err.error_kind(), Some(ErrorKind::ArgumentError));
    assert_eq!(rt.recursion_depth(), 0);
}

fn eval_seven(a: &mut Asm) {
    a.find("eval");
    a.code.push_int(7);
    a.call("eval", 1);
    a.code.op(Opcode::ReturnValue);
}

#[test]
fn test_eval_is_gated_by_config() {
    let mut locked = Program::new().load(eval_seven).unwrap();
    let err = locked.run_script(0).unwrap_err();
    assert_eq!(err.error_kind(), Some(ErrorKind::EvalError));

    let config = RuntimeConfig {
        allow_dynamic_eval: true,
        ..RuntimeConfig::default()
    };
    let mut open = Program::new().load_with(config, eval_seven).unwrap();
    assert_eq!(open.run_script(0).unwrap(), Value::Int(7));
}

#[test]
fn test_trace_returns_undefined() {
    init_tracing();
    let mut rt = Program::new()
        .load(|a| {
            let text = a.string("hello");
            a.find("trace");
            a.code.push_string(text).push_int(1);
            a.call("trace", 2);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::Undefined);
}

#[test]
fn test_missing_script_index() {
    let mut rt = Program::new()
        .load(|a| {
            a.code.op(Opcode::ReturnVoid);
        })
        .unwrap();
    assert!(matches!(rt.run_script(3), Err(EngineError::InvalidBytecode(_))));
}

fn push_ten(a: &mut Asm) {
    for n in 0..10 {
        a.code.push_int(n);
    }
    a.code.op(Opcode::ReturnValue);
}

#[test]
fn test_operand_stack_cap_overrides_declared_maximum() {
    let mut roomy = Program::new().load(push_ten).unwrap();
    assert_eq!(roomy.run_script(0).unwrap(), Value::Int(9));

    let config = RuntimeConfig {
        max_operand_stack: 4,
        ..RuntimeConfig::default()
    };
    let mut capped = Program::new().load_with(config, push_ten).unwrap();
    let err = capped.run_script(0).unwrap_err();
    assert_eq!(err.error_kind(), Some(ErrorKind::VerifyError));
    assert_eq!(capped.recursion_depth(), 0);
}
