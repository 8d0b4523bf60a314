//! Unit tests for interpreter components

use std::rc::Rc;

use core_types::ErrorKind;
use interpreter::arith::{
    add_i, add_numbers, lshift, modulo_numbers, mul_numbers, negate_number, rshift, strict_equals,
    sub_numbers, urshift,
};
use interpreter::binding_cache::BindingCache;
use interpreter::coerce::{
    canonical_index, number_to_int32, number_to_string, number_to_uint32, parse_number,
    to_boolean, type_of,
};
use interpreter::{Binding, CallFrame, ProfileData, Tier};
use object_model::{Exception, Value};
use proptest::prelude::*;

fn kind_of(exc: Exception) -> Option<ErrorKind> {
    match exc {
        Exception::Error { kind, .. } => Some(kind),
        Exception::Thrown(_) => None,
    }
}

fn frame(locals: usize, stack: usize, scope: usize) -> CallFrame {
    CallFrame::new(0, locals, stack, scope, Rc::from(Vec::new()))
}

// ============================================================================
// CallFrame Tests
// ============================================================================

#[test]
fn test_frame_stack_push_pop() {
    let mut f = frame(1, 4, 0);
    f.push(Value::Int(1)).unwrap();
    f.push(Value::Int(2)).unwrap();
    assert_eq!(f.stack_depth(), 2);
    assert_eq!(f.peek().unwrap(), &Value::Int(2));
    assert_eq!(f.pop().unwrap(), Value::Int(2));
    assert_eq!(f.pop().unwrap(), Value::Int(1));
}

#[test]
fn test_frame_stack_overflow_is_verify_error() {
    let mut f = frame(1, 1, 0);
    f.push(Value::Null).unwrap();
    let err = f.push(Value::Null).unwrap_err();
    assert_eq!(kind_of(err), Some(ErrorKind::VerifyError));
}

#[test]
fn test_frame_stack_underflow_is_verify_error() {
    let mut f = frame(1, 4, 0);
    assert_eq!(kind_of(f.pop().unwrap_err()), Some(ErrorKind::VerifyError));
    assert_eq!(kind_of(f.peek().unwrap_err()), Some(ErrorKind::VerifyError));
}

#[test]
fn test_frame_pop_n_keeps_push_order() {
    let mut f = frame(1, 8, 0);
    for n in 0..4 {
        f.push(Value::Int(n)).unwrap();
    }
    let args = f.pop_n(3).unwrap();
    assert_eq!(args, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert_eq!(f.stack_depth(), 1);
    assert!(f.pop_n(2).is_err());
}

#[test]
fn test_frame_locals() {
    let mut f = frame(3, 4, 0);
    assert_eq!(f.local(2).unwrap(), Value::Undefined);
    f.set_local(2, Value::Boolean(true)).unwrap();
    assert_eq!(f.local(2).unwrap(), Value::Boolean(true));
    assert_eq!(kind_of(f.local(3).unwrap_err()), Some(ErrorKind::VerifyError));
    assert!(f.set_local(9, Value::Null).is_err());
}

#[test]
fn test_frame_always_has_receiver_slot() {
    let f = frame(0, 4, 0);
    assert_eq!(f.locals.len(), 1);
}

#[test]
fn test_frame_scope_rejects_nullish() {
    let mut f = frame(1, 4, 4);
    let err = f.push_scope(Value::Null, false).unwrap_err();
    assert_eq!(kind_of(err), Some(ErrorKind::TypeError));
    let err = f.push_scope(Value::Undefined, true).unwrap_err();
    assert_eq!(kind_of(err), Some(ErrorKind::TypeError));
}

#[test]
fn test_frame_scope_bounds() {
    let mut f = frame(1, 4, 1);
    f.push_scope(Value::Int(1), true).unwrap();
    assert!(f.push_scope(Value::Int(2), false).is_err());
    assert!(f.scope_at(0).unwrap().with);
    assert!(f.scope_at(1).is_err());
    f.pop_scope().unwrap();
    assert_eq!(kind_of(f.pop_scope().unwrap_err()), Some(ErrorKind::VerifyError));
}

#[test]
fn test_frame_enter_handler_resets_stacks() {
    let mut f = frame(1, 4, 2);
    f.push(Value::Int(1)).unwrap();
    f.push(Value::Int(2)).unwrap();
    f.push_scope(Value::Int(3), false).unwrap();
    f.enter_handler(Value::Int(99), 12);
    assert_eq!(f.stack_depth(), 1);
    assert_eq!(f.peek().unwrap(), &Value::Int(99));
    assert!(f.scope().is_empty());
    assert_eq!(f.pc, 12);
}

// ============================================================================
// BindingCache Tests
// ============================================================================

#[test]
fn test_cache_miss_then_hit() {
    let mut cache = BindingCache::new();
    assert!(cache.lookup(4).is_none());
    assert!(cache.fill(4, Binding::Type(None)));
    assert!(matches!(cache.lookup(4), Some(Binding::Type(None))));
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.fills), (1, 1, 1));
}

#[test]
fn test_cache_first_fill_wins() {
    let mut cache = BindingCache::new();
    assert!(cache.fill(0, Binding::Type(None)));
    assert!(!cache.fill(0, Binding::Type(None)));
    assert_eq!(cache.stats().fills, 1);
}

#[test]
fn test_cache_entries_are_per_offset() {
    let mut cache = BindingCache::new();
    cache.fill(0, Binding::Type(None));
    assert!(cache.lookup(1).is_none());
    assert!(cache.lookup(0).is_some());
}

// ============================================================================
// ProfileData Tests
// ============================================================================

#[test]
fn test_profile_reports_threshold_once() {
    let mut profile = ProfileData::new();
    assert!(!profile.record_invocation(3));
    assert!(!profile.record_invocation(3));
    assert!(profile.record_invocation(3));
    assert!(!profile.record_invocation(3));
    assert_eq!(profile.invocations, 4);
}

#[test]
fn test_profile_tier() {
    let mut profile = ProfileData::new();
    assert_eq!(profile.tier(2), Tier::Cold);
    profile.record_invocation(2);
    profile.record_invocation(2);
    assert_eq!(profile.tier(2), Tier::Hot);
}

// ============================================================================
// Coercion Tests
// ============================================================================

#[test]
fn test_parse_number_forms() {
    assert_eq!(parse_number(""), 0.0);
    assert_eq!(parse_number("  42 "), 42.0);
    assert_eq!(parse_number("0x1F"), 31.0);
    assert_eq!(parse_number("1e3"), 1000.0);
    assert_eq!(parse_number("-Infinity"), f64::NEG_INFINITY);
    assert!(parse_number("inf").is_nan());
    assert!(parse_number("12px").is_nan());
}

#[test]
fn test_number_to_string_forms() {
    assert_eq!(number_to_string(f64::NAN), "NaN");
    assert_eq!(number_to_string(-0.0), "0");
    assert_eq!(number_to_string(3.0), "3");
    assert_eq!(number_to_string(0.5), "0.5");
    assert_eq!(number_to_string(1e21), "1e+21");
    assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
}

#[test]
fn test_int32_conversion_wraps() {
    assert_eq!(number_to_int32(2147483648.0), i32::MIN);
    assert_eq!(number_to_int32(-1.5), -1);
    assert_eq!(number_to_int32(f64::NAN), 0);
    assert_eq!(number_to_uint32(-1.0), u32::MAX);
}

#[test]
fn test_canonical_index() {
    assert_eq!(canonical_index("0"), Some(0));
    assert_eq!(canonical_index("17"), Some(17));
    assert_eq!(canonical_index("017"), None);
    assert_eq!(canonical_index("-1"), None);
    assert_eq!(canonical_index("4294967295"), None);
    assert_eq!(canonical_index(""), None);
}

#[test]
fn test_to_boolean_and_type_of() {
    assert!(!to_boolean(&Value::Double(f64::NAN)));
    assert!(!to_boolean(&Value::Int(0)));
    assert!(to_boolean(&Value::UInt(1)));
    assert_eq!(type_of(&Value::Null), "object");
    assert_eq!(type_of(&Value::UInt(3)), "number");
    assert_eq!(type_of(&Value::Undefined), "undefined");
}

// ============================================================================
// Arithmetic Tests
// ============================================================================

#[test]
fn test_generic_arithmetic_narrowing() {
    assert_eq!(add_numbers(&Value::Int(2), &Value::Int(3)), Value::Int(5));
    assert_eq!(
        add_numbers(&Value::Int(i32::MAX), &Value::Int(1)),
        Value::Double(2147483648.0)
    );
    assert_eq!(
        add_numbers(&Value::UInt(u32::MAX - 1), &Value::UInt(1)),
        Value::UInt(u32::MAX)
    );
    assert_eq!(sub_numbers(&Value::UInt(1), &Value::UInt(2)), Value::Int(-1));
    assert_eq!(add_numbers(&Value::Int(1), &Value::Double(0.5)), Value::Double(1.5));
}

#[test]
fn test_negative_zero_is_a_double() {
    let product = mul_numbers(&Value::Int(-3), &Value::Int(0));
    assert!(matches!(product, Value::Double(d) if d == 0.0 && d.is_sign_negative()));
    let negated = negate_number(&Value::Int(0));
    assert!(matches!(negated, Value::Double(d) if d.is_sign_negative()));
    let rem = modulo_numbers(&Value::Int(-4), &Value::Int(2));
    assert!(matches!(rem, Value::Double(d) if d.is_sign_negative()));
}

#[test]
fn test_modulo_keeps_dividend_sign() {
    assert_eq!(modulo_numbers(&Value::Int(-7), &Value::Int(3)), Value::Int(-1));
    assert!(matches!(
        modulo_numbers(&Value::Int(1), &Value::Int(0)),
        Value::Double(d) if d.is_nan()
    ));
}

#[test]
fn test_shifts_mask_count() {
    assert_eq!(lshift(1, 33), 2);
    assert_eq!(rshift(-8, 1), -4);
    assert_eq!(urshift(u32::MAX, 28), 15);
}

#[test]
fn test_strict_equality_across_numeric_variants() {
    assert!(strict_equals(&Value::Int(1), &Value::Double(1.0)));
    assert!(strict_equals(&Value::UInt(7), &Value::Int(7)));
    assert!(!strict_equals(&Value::Double(f64::NAN), &Value::Double(f64::NAN)));
    assert!(!strict_equals(&Value::Null, &Value::Undefined));
}

proptest! {
    #[test]
    fn prop_add_i_matches_wrapping(a: i32, b: i32) {
        prop_assert_eq!(add_i(a, b), a.wrapping_add(b));
    }

    #[test]
    fn prop_int32_of_integer_is_identity(n: i32) {
        prop_assert_eq!(number_to_int32(f64::from(n)), n);
    }

    #[test]
    fn prop_int32_is_idempotent(d in any::<f64>()) {
        let once = number_to_int32(d);
        prop_assert_eq!(number_to_int32(f64::from(once)), once);
    }

    #[test]
    fn prop_number_string_round_trip(n in -1.0e15f64..1.0e15) {
        let back = parse_number(&number_to_string(n));
        prop_assert!(back == n || (back.is_nan() && n.is_nan()));
    }

    #[test]
    fn prop_integer_add_never_loses_precision(a: i32, b: i32) {
        let sum = add_numbers(&Value::Int(a), &Value::Int(b));
        prop_assert_eq!(sum.as_f64(), Some(f64::from(a) + f64::from(b)));
    }
}
