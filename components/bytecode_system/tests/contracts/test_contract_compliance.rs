//! Contract compliance tests for bytecode_system
//! Verifies the public surface consumed by the interpreter

use bytecode_system::{
    operand_pool, BytecodeUnit, ConstValue, ExceptionInfo, MethodBody, MethodFlags, MethodInfo,
    Opcode, OperandLayout, ParamInfo, Pool, TraitInfoKind,
};
use core_types::StringId;

/// Inline operand shapes are fixed per opcode
#[test]
fn test_contract_operand_layouts() {
    assert_eq!(Opcode::GetLex.layout(), OperandLayout::U32);
    assert_eq!(Opcode::CallPropVoid.layout(), OperandLayout::U32Pair);
    assert_eq!(Opcode::HasNext2.layout(), OperandLayout::U32Pair);
    assert_eq!(Opcode::IfStrictNe.layout(), OperandLayout::Branch);
    assert_eq!(Opcode::PushDouble.layout(), OperandLayout::F64);
    assert_eq!(Opcode::AddI.layout(), OperandLayout::None);
}

/// Name-taking opcodes index the multiname pool
#[test]
fn test_contract_operand_pools() {
    assert_eq!(operand_pool(Opcode::GetProperty), Some(Pool::Multiname));
    assert_eq!(operand_pool(Opcode::Coerce), Some(Pool::Multiname));
    assert_eq!(operand_pool(Opcode::PushString), Some(Pool::String));
    assert_eq!(operand_pool(Opcode::NewClass), Some(Pool::Class));
    assert_eq!(operand_pool(Opcode::GetLocal), None);
}

/// Method descriptors expose the data the invoker needs
#[test]
fn test_contract_method_descriptor() {
    let method = MethodInfo::new(StringId::EMPTY)
        .param(ParamInfo::typed(0))
        .param(ParamInfo::untyped().with_default(ConstValue::Boolean(true)))
        .returns(0)
        .rest()
        .body(MethodBody::new(vec![Opcode::ReturnVoid as u8]).with_handler(ExceptionInfo::typed(0, 1, 0, 0)));

    assert_eq!(method.required_params(), 1);
    assert_eq!(
        method.flags,
        MethodFlags { need_rest: true, need_arguments: false, set_dxns: false }
    );
    assert_eq!(method.body.as_ref().map(|b| b.exceptions.len()), Some(1));
}

/// Trait kinds cover every member shape
#[test]
fn test_contract_trait_kinds() {
    let kinds = [
        TraitInfoKind::Slot { slot_id: 0, type_name: None, value: None },
        TraitInfoKind::Const { slot_id: 0, type_name: None, value: Some(ConstValue::Int(1)) },
        TraitInfoKind::Method { method: 0 },
        TraitInfoKind::Getter { method: 0 },
        TraitInfoKind::Setter { method: 0 },
        TraitInfoKind::Class { slot_id: 0, class: 0 },
        TraitInfoKind::Function { slot_id: 0, method: 0 },
    ];
    assert_eq!(kinds.len(), 7);
}

/// A default unit is empty
#[test]
fn test_contract_default_unit() {
    let unit = BytecodeUnit::default();
    assert!(unit.multiname(0).is_none());
    assert!(unit.method(0).is_none());
    assert_eq!(unit.strings.len(), 1);
}
