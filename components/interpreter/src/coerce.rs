//! Type conversion and coercion
//!
//! The pure number/string helpers are free functions; everything that may
//! call back into script (`valueOf`, `toString`) is a [`Runtime`] method.

use core_types::{Multiname, NameKey, StringId};
use object_model::{BuiltinKind, ClassRef, Exception, ScriptResult, Value};

use crate::runtime::Runtime;

/// Preferred primitive for object-to-primitive conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    /// Prefer `valueOf`
    Number,
    /// Prefer `toString`
    String,
}

/// ECMA ToBoolean
pub fn to_boolean(value: &Value) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Boolean(b) => *b,
        Value::Int(n) => *n != 0,
        Value::UInt(n) => *n != 0,
        Value::Double(d) => !(d.is_nan() || *d == 0.0),
        Value::String(id) => *id != StringId::EMPTY,
        Value::Namespace(_) | Value::Object(_) | Value::Function(_) | Value::Class(_) => true,
    }
}

/// ECMA ToInt32 on a number
pub fn number_to_int32(n: f64) -> i32 {
    number_to_uint32(n) as i32
}

/// ECMA ToUint32 on a number
pub fn number_to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u64 as u32
}

/// ECMA StringToNumber
pub fn parse_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    // Rust also accepts "inf" and "nan" spellings
    if s.chars().any(|c| c.is_alphabetic() && c != 'e' && c != 'E') {
        return f64::NAN;
    }
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// ECMA Number::toString(10)
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let s = format!("{:e}", n);
        return match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => s,
        };
    }
    if n.fract() == 0.0 {
        return format!("{:.0}", n);
    }
    format!("{}", n)
}

/// Array index named by a canonical decimal string
pub fn canonical_index(s: &str) -> Option<u32> {
    if s.is_empty() || (s.len() > 1 && s.starts_with('0')) || !s.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    s.parse::<u32>().ok().filter(|n| *n != u32::MAX)
}

/// `typeof` result
pub fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Boolean(_) => "boolean",
        Value::Int(_) | Value::UInt(_) | Value::Double(_) => "number",
        Value::String(_) => "string",
        Value::Function(_) => "function",
        Value::Null | Value::Namespace(_) | Value::Object(_) | Value::Class(_) => "object",
    }
}

impl Runtime {
    /// Class of a value; primitives map to their builtin class
    pub fn class_of(&self, value: &Value) -> Option<ClassRef> {
        let b = &self.builtins;
        match value {
            Value::Undefined | Value::Null => None,
            Value::Boolean(_) => Some(b.boolean.clone()),
            Value::Int(_) => Some(b.int.clone()),
            Value::UInt(_) => Some(b.uint.clone()),
            Value::Double(_) => Some(b.number.clone()),
            Value::String(_) => Some(b.string.clone()),
            Value::Namespace(_) => Some(b.namespace.clone()),
            Value::Object(o) => o.borrow().class.clone().or_else(|| Some(b.object.clone())),
            Value::Function(_) => Some(b.function.clone()),
            Value::Class(_) => Some(b.class.clone()),
        }
    }

    /// Builtin identity of `ty` itself, not of a subclass
    fn builtin_identity(ty: &ClassRef) -> Option<BuiltinKind> {
        if ty.unit_id.is_some() {
            return None;
        }
        ty.builtin.get()
    }

    /// Object-to-primitive conversion through `valueOf`/`toString`
    pub fn to_primitive(&mut self, value: &Value, hint: Hint) -> ScriptResult<Value> {
        if !value.is_reference() {
            return Ok(value.clone());
        }
        let order = match hint {
            Hint::Number => [self.names.value_of, self.names.to_string],
            Hint::String => [self.names.to_string, self.names.value_of],
        };
        for name in order {
            let mn = Multiname::public(name);
            if !self.has_property(value, &mn)? {
                continue;
            }
            let result = self.call_property(value, &mn, Vec::new())?;
            if !result.is_reference() {
                return Ok(result);
            }
        }
        Err(Exception::type_error(format!(
            "Cannot convert {} to primitive",
            self.class_name_of(value)
        )))
    }

    /// ECMA ToNumber
    pub fn to_number(&mut self, value: &Value) -> ScriptResult<f64> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::Int(n) => f64::from(*n),
            Value::UInt(n) => f64::from(*n),
            Value::Double(d) => *d,
            Value::String(id) => parse_number(self.strings.get(*id)),
            Value::Namespace(_) => f64::NAN,
            Value::Object(_) | Value::Function(_) | Value::Class(_) => {
                let prim = self.to_primitive(value, Hint::Number)?;
                return self.to_number(&prim);
            }
        })
    }

    /// Numeric value keeping integer representations exact
    pub(crate) fn to_numeric(&mut self, value: &Value) -> ScriptResult<Value> {
        Ok(match value {
            Value::Int(_) | Value::UInt(_) | Value::Double(_) => value.clone(),
            Value::Boolean(b) => Value::Int(i32::from(*b)),
            Value::Null => Value::Int(0),
            other => Value::Double(self.to_number(other)?),
        })
    }

    /// ECMA ToInt32
    pub fn to_int32(&mut self, value: &Value) -> ScriptResult<i32> {
        match value {
            Value::Int(n) => Ok(*n),
            Value::UInt(n) => Ok(*n as i32),
            other => Ok(number_to_int32(self.to_number(other)?)),
        }
    }

    /// ECMA ToUint32
    pub fn to_uint32(&mut self, value: &Value) -> ScriptResult<u32> {
        match value {
            Value::UInt(n) => Ok(*n),
            Value::Int(n) => Ok(*n as u32),
            other => Ok(number_to_uint32(self.to_number(other)?)),
        }
    }

    /// ECMA ToString, interned
    pub fn to_string(&mut self, value: &Value) -> ScriptResult<StringId> {
        let text = match value {
            Value::String(id) => return Ok(*id),
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::UInt(n) => n.to_string(),
            Value::Double(d) => number_to_string(*d),
            Value::Namespace(ns) => return Ok(ns.uri),
            Value::Object(_) | Value::Function(_) | Value::Class(_) => {
                let prim = self.to_primitive(value, Hint::String)?;
                return self.to_string(&prim);
            }
        };
        Ok(self.strings.intern(&text))
    }

    /// Coerce `value` to the declared type `ty` (`None` = untyped)
    ///
    /// Idempotent: coercing an already coerced value returns it unchanged.
    pub fn coerce(&mut self, value: Value, ty: Option<&ClassRef>) -> ScriptResult<Value> {
        let Some(ty) = ty else {
            return Ok(value);
        };
        match Self::builtin_identity(ty) {
            Some(BuiltinKind::Int) => return Ok(Value::Int(self.to_int32(&value)?)),
            Some(BuiltinKind::UInt) => return Ok(Value::UInt(self.to_uint32(&value)?)),
            Some(BuiltinKind::Number) => return Ok(Value::Double(self.to_number(&value)?)),
            Some(BuiltinKind::Boolean) => return Ok(Value::Boolean(to_boolean(&value))),
            Some(BuiltinKind::String) => {
                return Ok(if value.is_nullish() {
                    Value::Null
                } else {
                    Value::String(self.to_string(&value)?)
                });
            }
            Some(BuiltinKind::Object) => {
                return Ok(match value {
                    Value::Undefined => Value::Null,
                    other => other,
                });
            }
            _ => {}
        }
        if value.is_nullish() {
            return Ok(Value::Null);
        }
        if self.is_type(&value, ty) {
            return Ok(value);
        }
        Err(Exception::type_error(format!(
            "Type Coercion failed: cannot convert {} to {}.",
            self.class_name_of(&value),
            self.strings.get(ty.name)
        )))
    }

    /// `is` test against a class
    pub fn is_type(&self, value: &Value, ty: &ClassRef) -> bool {
        match Self::builtin_identity(ty) {
            Some(BuiltinKind::Object) => !value.is_nullish(),
            Some(BuiltinKind::Int) => value.as_exact_i32().is_some(),
            Some(BuiltinKind::UInt) => match value {
                Value::UInt(_) => true,
                Value::Int(n) => *n >= 0,
                Value::Double(d) => {
                    d.fract() == 0.0 && *d >= 0.0 && *d <= f64::from(u32::MAX) && !d.is_sign_negative()
                }
                _ => false,
            },
            Some(BuiltinKind::Number) => value.is_number(),
            _ => self
                .class_of(value)
                .is_some_and(|class| class.conforms_to(ty)),
        }
    }

    /// Resolve a type multiname to a linked class (`None` for `*`)
    pub fn resolve_type(&mut self, mn: &Multiname) -> ScriptResult<Option<ClassRef>> {
        let name = match mn.name {
            NameKey::Any => return Ok(None),
            NameKey::Str(id) => id,
            NameKey::Index(_) => {
                return Err(Exception::type_error("numeric names do not denote types"));
            }
        };
        let found = {
            let global = self.global.borrow();
            global
                .traits
                .find_multiname(name, mn, object_model::KindMask::FIXED)
                .and_then(|pos| global.traits.get(pos))
                .and_then(|t| t.var.plain())
                .and_then(Value::as_class)
                .cloned()
        };
        match found {
            Some(class) => Ok(Some(class)),
            None => Err(Exception::type_error(format!(
                "Class {} could not be found.",
                self.strings.get(name)
            ))),
        }
    }

    /// Class name used in diagnostics
    pub(crate) fn class_name_of(&self, value: &Value) -> String {
        match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            other => self
                .class_of(other)
                .map(|c| self.strings.get(c.name).to_string())
                .unwrap_or_else(|| "Object".to_string()),
        }
    }
}
