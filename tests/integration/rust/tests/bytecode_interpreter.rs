//! Bytecode to Interpreter Integration Tests
//!
//! Builds small programs with the assembler and checks that the loader,
//! the dispatch loop and the invoker agree on their results.

use bytecode_system::{Opcode, ParamInfo};
use core_types::ErrorKind;
use integration_tests::Program;
use interpreter::RuntimeConfig;
use object_model::Value;

/// Test: (10 + 5) * 3 - 2 stays an int
#[test]
fn test_generic_arithmetic_keeps_integers() {
    let mut rt = Program::new()
        .load(|a| {
            a.code.push_int(10).push_int(5).op(Opcode::Add);
            a.code.push_int(3).op(Opcode::Multiply);
            a.code.push_int(2).op(Opcode::Subtract);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::Int(43));
}

/// Test: integer overflow on generic add widens to a double
#[test]
fn test_generic_add_overflow_widens() {
    let mut rt = Program::new()
        .load(|a| {
            a.code.push_int(i32::MAX).push_int(1).op(Opcode::Add);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::Double(2147483648.0));
}

/// Test: add_i wraps where add would widen
#[test]
fn test_integer_add_wraps() {
    let mut rt = Program::new()
        .load(|a| {
            a.code.push_int(i32::MAX).push_int(1).op(Opcode::AddI);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::Int(i32::MIN));
}

/// Test: divide always produces a double
#[test]
fn test_divide_produces_double() {
    let mut rt = Program::new()
        .load(|a| {
            a.code.push_int(7).push_int(2).op(Opcode::Divide);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::Double(3.5));
}

/// Test: string plus number concatenates
#[test]
fn test_string_concatenation() {
    let mut rt = Program::new()
        .load(|a| {
            let s = a.string("n=");
            a.code.push_string(s).push_int(4).op(Opcode::Add);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    let result = rt.run_script(0).unwrap();
    assert_eq!(rt.str_of(&result), Some("n=4"));
}

/// Test: a counting loop with iflt and a back edge
#[test]
fn test_loop_with_backward_branch() {
    // var total = 0; var i = 0; do { total += i * i; i++ } while (i < 4)
    let mut rt = Program::new()
        .load(|a| {
            let top = a.code.new_label();
            a.code.push_int(0).set_local(1);
            a.code.push_int(0).set_local(2);
            a.code.bind(top);
            a.code.get_local(1).get_local(2).get_local(2).op(Opcode::MultiplyI);
            a.code.op(Opcode::AddI).set_local(1);
            a.code.get_local(2).op(Opcode::IncrementI).set_local(2);
            a.code.get_local(2).push_int(4);
            a.code.branch(Opcode::IfLt, top);
            a.code.get_local(1).op(Opcode::ReturnValue);
        })
        .unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::Int(14));
}

/// Test: comparisons with NaN are false in both directions
#[test]
fn test_nan_comparisons_are_false() {
    let mut rt = Program::new()
        .load(|a| {
            a.code.op(Opcode::PushNaN).push_int(1).op(Opcode::LessThan);
            a.code.op(Opcode::PushNaN).push_int(1).op(Opcode::GreaterEquals);
            a.code.op(Opcode::BitOr);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::Int(0));
}

/// Test: loose and strict equality differ on "1" == 1
#[test]
fn test_loose_and_strict_equality() {
    let mut rt = Program::new()
        .load(|a| {
            let one = a.string("1");
            let equal = a.code.new_label();
            a.code.push_string(one).push_int(1).op(Opcode::StrictEquals);
            a.code.branch(Opcode::IfTrue, equal);
            a.code.push_string(one).push_int(1).op(Opcode::Equals);
            a.code.op(Opcode::ReturnValue);
            a.code.bind(equal);
            a.code.op(Opcode::PushNull).op(Opcode::ReturnValue);
        })
        .unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::Boolean(true));
}

/// Test: a global function receives typed, coerced arguments
#[test]
fn test_global_function_call_coerces_arguments() {
    let mut program = Program::new();
    let int_mn = program.name("int");
    program.function(
        "twice",
        |m| m.param(ParamInfo::typed(int_mn)),
        |a| {
            a.code.get_local(1).get_local(1).op(Opcode::Add);
            a.code.op(Opcode::ReturnValue);
        },
    );
    let mut rt = program
        .load(|a| {
            a.find("twice");
            a.code.push_double(2.9);
            a.call("twice", 1);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::Int(4));
}

/// Test: missing required arguments raise ArgumentError
#[test]
fn test_argument_count_mismatch() {
    let mut program = Program::new();
    let int_mn = program.name("int");
    program.function(
        "needs_two",
        |m| m.param(ParamInfo::typed(int_mn)).param(ParamInfo::typed(int_mn)),
        |a| {
            a.code.op(Opcode::ReturnVoid);
        },
    );
    let mut rt = program
        .load(|a| {
            a.find("needs_two");
            a.code.push_int(1);
            a.call("needs_two", 1);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    let err = rt.run_script(0).unwrap_err();
    assert_eq!(err.error_kind(), Some(ErrorKind::ArgumentError));
}

/// Test: recursion computes factorial through the global scope
#[test]
fn test_recursive_global_function() {
    let mut program = Program::new();
    program.function(
        "fact",
        |m| m.param(ParamInfo::untyped()),
        |a| {
            let recurse = a.code.new_label();
            a.code.get_local(1).push_int(1);
            a.code.branch(Opcode::IfGt, recurse);
            a.code.push_int(1).op(Opcode::ReturnValue);
            a.code.bind(recurse);
            a.code.get_local(1);
            a.find("fact");
            a.code.get_local(1).op(Opcode::DecrementI);
            a.call("fact", 1);
            a.code.op(Opcode::Multiply).op(Opcode::ReturnValue);
        },
    );
    let mut rt = program
        .load(|a| {
            a.find("fact");
            a.code.push_int(10);
            a.call("fact", 1);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::Int(3628800));
    assert_eq!(rt.recursion_depth(), 0);
}

/// Test: unbounded recursion raises StackOverflowError and unwinds the depth
#[test]
fn test_unbounded_recursion_overflows() {
    let mut program = Program::new();
    program.function(
        "forever",
        |m| m,
        |a| {
            a.find("forever").call("forever", 0);
            a.code.op(Opcode::ReturnValue);
        },
    );
    let config = RuntimeConfig {
        max_recursion_depth: 32,
        ..RuntimeConfig::default()
    };
    let mut rt = program
        .load_with(config, |a| {
            a.find("forever").call("forever", 0);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    let err = rt.run_script(0).unwrap_err();
    assert_eq!(err.error_kind(), Some(ErrorKind::StackOverflowError));
    assert_eq!(rt.recursion_depth(), 0);
}

/// Test: a closure created by newfunction captures the scope stack
#[test]
fn test_closure_reads_captured_scope() {
    let mut program = Program::new();
    let inner = program.method("inner", |m| m, |a| {
        a.lex("x");
        a.code.op(Opcode::ReturnValue);
    });
    let mut rt = program
        .load(|a| {
            // with ({ x: 5 }) f = function () { return x }
            let key = a.string("x");
            a.code.push_string(key).push_int(5);
            a.code.op_u32(Opcode::NewObject, 1);
            a.code.op(Opcode::PushWith);
            a.code.op_u32(Opcode::NewFunction, inner);
            a.code.op(Opcode::PopScope);
            a.code.op(Opcode::PushNull);
            a.code.op_u32(Opcode::Call, 0);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::Int(5));
}

/// Test: rest parameters collect extra arguments into an array
#[test]
fn test_rest_arguments() {
    let mut program = Program::new();
    program.function(
        "count",
        |m| m.param(ParamInfo::untyped()).rest(),
        |a| {
            let length = a.name("length");
            a.code.get_local(2);
            a.code.op_u32(Opcode::GetProperty, length);
            a.code.op(Opcode::ReturnValue);
        },
    );
    let mut rt = program
        .load(|a| {
            a.find("count");
            a.code.push_int(1).push_int(2).push_int(3).push_int(4);
            a.call("count", 4);
            a.code.op(Opcode::ReturnValue);
        })
        .unwrap();
    assert_eq!(rt.run_script(0).unwrap(), Value::UInt(3));
}
