//! Arithmetic, comparison and equality
//!
//! Integer opcodes wrap to 32 bits. Generic arithmetic keeps an integer
//! result only when both operands are integer-typed and the exact result
//! still fits; otherwise it produces a double. String concatenation wins
//! whenever either operand is a string after primitive conversion.

use std::cmp::Ordering;

use object_model::{ScriptResult, Value};

use crate::coerce::Hint;
use crate::runtime::Runtime;

/// `add_i`
pub fn add_i(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

/// `subtract_i`
pub fn sub_i(a: i32, b: i32) -> i32 {
    a.wrapping_sub(b)
}

/// `multiply_i`
pub fn mul_i(a: i32, b: i32) -> i32 {
    a.wrapping_mul(b)
}

/// `negate_i`
pub fn negate_i(a: i32) -> i32 {
    a.wrapping_neg()
}

fn exact_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Int(n) => Some(i64::from(*n)),
        Value::UInt(n) => Some(i64::from(*n)),
        _ => None,
    }
}

fn narrow(result: i64, a: &Value, b: &Value) -> Option<Value> {
    if let Ok(n) = i32::try_from(result) {
        return Some(Value::Int(n));
    }
    if matches!((a, b), (Value::UInt(_), Value::UInt(_))) {
        if let Ok(n) = u32::try_from(result) {
            return Some(Value::UInt(n));
        }
    }
    None
}

fn integer_op(
    a: &Value,
    b: &Value,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Value {
    if let (Some(x), Some(y)) = (exact_integer(a), exact_integer(b)) {
        if let Some(v) = int(x, y).and_then(|r| narrow(r, a, b)) {
            return v;
        }
    }
    let x = a.as_f64().unwrap_or(f64::NAN);
    let y = b.as_f64().unwrap_or(f64::NAN);
    Value::Double(float(x, y))
}

/// Generic addition of two numeric values
pub fn add_numbers(a: &Value, b: &Value) -> Value {
    integer_op(a, b, i64::checked_add, |x, y| x + y)
}

/// Generic subtraction of two numeric values
pub fn sub_numbers(a: &Value, b: &Value) -> Value {
    integer_op(a, b, i64::checked_sub, |x, y| x - y)
}

/// Generic multiplication of two numeric values
pub fn mul_numbers(a: &Value, b: &Value) -> Value {
    // -0 cannot be represented as an integer
    integer_op(
        a,
        b,
        |x, y| x.checked_mul(y).filter(|r| *r != 0 || (x >= 0 && y >= 0)),
        |x, y| x * y,
    )
}

/// Remainder with the sign of the dividend
pub fn modulo_numbers(a: &Value, b: &Value) -> Value {
    integer_op(
        a,
        b,
        |x, y| {
            if y == 0 {
                return None;
            }
            let r = x % y;
            (r != 0 || x >= 0).then_some(r)
        },
        |x, y| x % y,
    )
}

/// Numeric negation; zero negates to `-0`
pub fn negate_number(a: &Value) -> Value {
    match a {
        Value::Int(n) if *n != 0 && *n != i32::MIN => Value::Int(-n),
        other => Value::Double(-other.as_f64().unwrap_or(f64::NAN)),
    }
}

/// `lshift`
pub fn lshift(a: i32, b: u32) -> i32 {
    a.wrapping_shl(b & 31)
}

/// `rshift`
pub fn rshift(a: i32, b: u32) -> i32 {
    a.wrapping_shr(b & 31)
}

/// `urshift`
pub fn urshift(a: u32, b: u32) -> u32 {
    a.wrapping_shr(b & 31)
}

/// `===`
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        _ if a.is_number() && b.is_number() => a.as_f64() == b.as_f64(),
        (Value::Namespace(x), Value::Namespace(y)) => x.uri == y.uri,
        _ => a == b,
    }
}

impl Runtime {
    /// Generic `add`
    pub fn add(&mut self, a: &Value, b: &Value) -> ScriptResult<Value> {
        if a.is_number() && b.is_number() {
            return Ok(add_numbers(a, b));
        }
        let a = self.to_primitive(a, Hint::Number)?;
        let b = self.to_primitive(b, Hint::Number)?;
        if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
            let left = self.to_string(&a)?;
            let right = self.to_string(&b)?;
            let joined = format!("{}{}", self.strings.get(left), self.strings.get(right));
            return Ok(Value::String(self.strings.intern(&joined)));
        }
        let a = self.to_numeric(&a)?;
        let b = self.to_numeric(&b)?;
        Ok(add_numbers(&a, &b))
    }

    /// Apply a numeric binary operator after ToNumber on both sides
    pub(crate) fn numeric_binary(
        &mut self,
        a: &Value,
        b: &Value,
        op: fn(&Value, &Value) -> Value,
    ) -> ScriptResult<Value> {
        let a = self.to_numeric(a)?;
        let b = self.to_numeric(b)?;
        Ok(op(&a, &b))
    }

    /// Loose equality
    pub fn equals(&mut self, a: &Value, b: &Value) -> ScriptResult<bool> {
        Ok(match (a, b) {
            (x, y) if x.is_nullish() && y.is_nullish() => true,
            (x, y) if x.is_nullish() || y.is_nullish() => false,
            (x, y) if x.is_number() && y.is_number() => strict_equals(x, y),
            (Value::String(x), Value::String(y)) => x == y,
            (Value::Boolean(x), Value::Boolean(y)) => x == y,
            (x, y) if x.is_reference() && y.is_reference() => strict_equals(x, y),
            (Value::Namespace(x), Value::Namespace(y)) => x.uri == y.uri,
            (Value::Boolean(x), other) | (other, Value::Boolean(x)) => {
                let n = Value::Int(i32::from(*x));
                return self.equals(&n, other);
            }
            (x, y) if x.is_reference() || y.is_reference() => {
                let px = self.to_primitive(x, Hint::Number)?;
                let py = self.to_primitive(y, Hint::Number)?;
                return self.equals(&px, &py);
            }
            (x, y) => {
                let nx = self.to_number(x)?;
                let ny = self.to_number(y)?;
                nx == ny
            }
        })
    }

    /// Abstract relational comparison; `None` when either side is NaN
    pub fn compare(&mut self, a: &Value, b: &Value) -> ScriptResult<Option<Ordering>> {
        let a = self.to_primitive(a, Hint::Number)?;
        let b = self.to_primitive(b, Hint::Number)?;
        if let (Value::String(x), Value::String(y)) = (&a, &b) {
            let (x, y) = (self.strings.get(*x), self.strings.get(*y));
            // code unit order, so astral chars sort as surrogate pairs
            return Ok(Some(x.encode_utf16().cmp(y.encode_utf16())));
        }
        let x = self.to_number(&a)?;
        let y = self.to_number(&b)?;
        Ok(x.partial_cmp(&y))
    }
}
