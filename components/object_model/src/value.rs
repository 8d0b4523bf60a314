//! Script values
//!
//! Primitives are stored inline; only objects, functions and classes hold
//! reference-counted handles. Lookups that find nothing return `None` or
//! a `NotFound` result rather than a value, so no sentinel variant exists.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use core_types::{Namespace, StringId};

use crate::class::Class;
use crate::function::Function;
use crate::object::ScriptObject;

/// Shared handle to a script object
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<ScriptObject>>);

impl ObjectRef {
    /// Wrap a freshly built object
    pub fn new(object: ScriptObject) -> Self {
        ObjectRef(Rc::new(RefCell::new(object)))
    }

    /// Immutable borrow
    pub fn borrow(&self) -> Ref<'_, ScriptObject> {
        self.0.borrow()
    }

    /// Mutable borrow
    pub fn borrow_mut(&self) -> RefMut<'_, ScriptObject> {
        self.0.borrow_mut()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live handles
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Address used for identity hashing and debug output
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object@{:x}", self.addr())
    }
}

/// Shared handle to a function
#[derive(Clone)]
pub struct FunctionRef(Rc<Function>);

impl FunctionRef {
    /// Wrap a function
    pub fn new(function: Function) -> Self {
        FunctionRef(Rc::new(function))
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &FunctionRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address used for identity hashing and debug output
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl std::ops::Deref for FunctionRef {
    type Target = Function;

    fn deref(&self) -> &Function {
        &self.0
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function@{:x}", self.addr())
    }
}

/// Shared handle to a class descriptor
#[derive(Clone)]
pub struct ClassRef(Rc<Class>);

impl ClassRef {
    /// Wrap a class
    pub fn new(class: Class) -> Self {
        ClassRef(Rc::new(class))
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &ClassRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address used for identity hashing and debug output
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }
}

impl std::ops::Deref for ClassRef {
    type Target = Class;

    fn deref(&self) -> &Class {
        &self.0
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class@{:x}", self.addr())
    }
}

/// A script value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Boolean(bool),
    /// 32-bit signed integer
    Int(i32),
    /// 32-bit unsigned integer
    UInt(u32),
    /// IEEE-754 double
    Double(f64),
    /// Interned string
    String(StringId),
    /// Namespace value
    Namespace(Namespace),
    /// Object reference
    Object(ObjectRef),
    /// Function reference
    Function(FunctionRef),
    /// Class reference
    Class(ClassRef),
}

impl Value {
    /// `undefined` or `null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Int, UInt or Double
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::UInt(_) | Value::Double(_))
    }

    /// Object, function or class
    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Function(_) | Value::Class(_))
    }

    /// Numeric value without conversion
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::UInt(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Object handle, if this is an object
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Function handle, if this is a function
    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Class handle, if this is a class
    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Value::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Object that stores this value's own properties.
    ///
    /// Functions and classes keep their properties on a companion object.
    pub fn shell(&self) -> Option<ObjectRef> {
        match self {
            Value::Object(o) => Some(o.clone()),
            Value::Function(f) => Some(f.object.clone()),
            Value::Class(c) => Some(c.object.clone()),
            _ => None,
        }
    }

    /// Exact 32-bit integer value of a numeric
    pub fn as_exact_i32(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(n) => i32::try_from(*n).ok(),
            Value::Double(d) => {
                let i = *d as i32;
                (i as f64 == *d && !(*d == 0.0 && d.is_sign_negative())).then_some(i)
            }
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Structural identity: same variant, same payload, same reference.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Namespace(a), Value::Namespace(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Class(a), Value::Class(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::UInt(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}
