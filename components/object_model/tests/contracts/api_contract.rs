//! Contract tests verifying the object_model API surface used by the interpreter.

use core_types::{Multiname, Namespace, NamespaceKind, StringId};
use object_model::{
    Class, ClassFlags, ClassRef, ConstructionState, Exception, Function, FunctionKind, Heap,
    KindMask, ObjectKind, ObjectRef, ScriptObject, TraitKind, TraitTable, TypeSlot, VarSlot,
    Variable, Value,
};

fn empty_object() -> ObjectRef {
    ObjectRef::new(ScriptObject::plain(None, None))
}

fn class_with_slot(name: StringId, slot: StringId) -> ClassRef {
    let class = Class::new(name, Namespace::public(), empty_object(), empty_object());
    let mut var = Variable::value(Namespace::public(), Value::Int(0));
    var.slot_id = 1;
    class.borrowed.borrow_mut().insert(slot, TraitKind::Instance, var);
    class.flags.set(ClassFlags { sealed: true, ..ClassFlags::default() });
    ClassRef::new(class)
}

/// Instance variables are copied in on first materialization only
#[test]
fn contract_materialize_copies_instance_traits_once() {
    let x = StringId(2);
    let class = class_with_slot(StringId(1), x);
    let mut heap = Heap::new();
    let obj = heap.allocate(&class);

    assert_eq!(obj.borrow().state, ConstructionState::Allocated);
    assert!(obj.borrow_mut().materialize());
    assert!(!obj.borrow_mut().materialize());

    let o = obj.borrow();
    let pos = o.traits.slot_position(1).expect("slot 1 materialized");
    assert_eq!(o.traits.get(pos).map(|t| t.name), Some(x));
    assert!(o.is_sealed());
}

/// Namespace sets are honored by lookups
#[test]
fn contract_trait_lookup_by_multiname() {
    let mut table = TraitTable::new();
    let name = StringId(5);
    let internal = Namespace::new(StringId(6), NamespaceKind::Internal);
    table.insert(name, TraitKind::Declared, Variable::value(internal, Value::Boolean(true)));

    assert!(table.find_multiname(name, &Multiname::public(name), KindMask::ALL).is_none());
    let mn = Multiname::with_namespaces(name, vec![Namespace::public(), internal]);
    assert!(table.find_multiname(name, &mn, KindMask::DECLARED).is_some());
}

/// Accessor records never carry a value
#[test]
fn contract_accessor_shape() {
    let var = Variable::accessor(Namespace::public(), None, None).typed(TypeSlot::Any);
    assert!(matches!(var.slot, VarSlot::Accessor { .. }));
    assert!(var.plain().is_none());
}

/// Functions carry their companion object and optional receiver
#[test]
fn contract_function_shell() {
    let f = Function::new(FunctionKind::Script(0), StringId::EMPTY, empty_object());
    let value = Value::Function(object_model::FunctionRef::new(f));
    assert!(value.shell().is_some());
    assert!(Value::Int(1).shell().is_none());
}

/// Array payloads are reachable through the object
#[test]
fn contract_array_payload() {
    let obj = ObjectRef::new(ScriptObject::array(None, None, vec![Value::Null]));
    assert!(matches!(obj.borrow().kind, ObjectKind::Array(ref v) if v.len() == 1));
}

/// Exceptions distinguish thrown values from pending engine errors
#[test]
fn contract_exception_forms() {
    assert!(Exception::reference_error("x").pending_kind().is_some());
    assert!(Exception::Thrown(Value::Null).pending_kind().is_none());
}
