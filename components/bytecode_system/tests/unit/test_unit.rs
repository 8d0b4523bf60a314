//! Tests for unit assembly and verification

use bytecode_system::{
    ClassInfo, CodeBuilder, InstanceInfo, MethodBody, MethodInfo, Opcode, ScriptInfo, TraitInfo,
    UnitBuilder, Verifier, VerifyFailure,
};

fn empty_method(unit: &mut UnitBuilder) -> u32 {
    let mut code = CodeBuilder::new();
    code.op(Opcode::ReturnVoid);
    let name = unit.intern("");
    unit.method(MethodInfo::new(name).body(MethodBody::new(code.finish())))
}

#[test]
fn test_well_formed_unit_verifies() {
    let mut unit = UnitBuilder::new();
    let init = empty_method(&mut unit);
    let object = unit.public_name("Object");
    let name = unit.public_name("Point");
    let x = unit.public_name("x");
    let mut instance = InstanceInfo::new(name, Some(object), init);
    instance.traits.push(TraitInfo::slot(x, None, None));
    let class = unit.add_class(instance, ClassInfo { init, traits: Vec::new() });
    let point = unit.public_name("Point");
    unit.add_script(ScriptInfo {
        init,
        traits: vec![TraitInfo::class(point, class)],
    });

    let unit = unit.finish();
    assert_eq!(Verifier::new(&unit).verify(), Ok(()));
}

#[test]
fn test_dangling_class_trait_is_rejected() {
    let mut unit = UnitBuilder::new();
    let init = empty_method(&mut unit);
    let name = unit.public_name("Missing");
    unit.add_script(ScriptInfo {
        init,
        traits: vec![TraitInfo::class(name, 4)],
    });
    let unit = unit.finish();
    assert_eq!(
        Verifier::new(&unit).verify(),
        Err(VerifyFailure::Dangling { what: "class", index: 4 })
    );
}

#[test]
fn test_dangling_script_init_is_rejected() {
    let mut unit = UnitBuilder::new();
    unit.add_script(ScriptInfo { init: 9, traits: Vec::new() });
    let unit = unit.finish();
    assert!(Verifier::new(&unit).verify().is_err());
}
