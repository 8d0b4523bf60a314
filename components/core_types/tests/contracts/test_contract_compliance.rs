//! Contract compliance tests for core_types
//!
//! These tests pin the public surface other components rely on.

use core_types::{EngineError, ErrorKind, Multiname, NameKey, Namespace, NamespaceKind, StringId, StringTable};

/// Contract: StringId::EMPTY is the interned empty string
#[test]
fn test_empty_string_contract() {
    let mut table = StringTable::new();
    assert_eq!(table.intern(""), StringId::EMPTY);
}

/// Contract: every namespace kind exists
#[test]
fn test_namespace_kinds_contract() {
    let kinds = [
        NamespaceKind::Public,
        NamespaceKind::Internal,
        NamespaceKind::Protected,
        NamespaceKind::Private,
        NamespaceKind::Explicit,
        NamespaceKind::StaticProtected,
    ];
    assert_eq!(kinds.len(), 6);
}

/// Contract: Multiname exposes name, namespaces and markers
#[test]
fn test_multiname_fields_contract() {
    let mn = Multiname::public(StringId(1));
    let _: NameKey = mn.name;
    let _: &[Namespace] = &mn.namespaces;
    let _: bool = mn.attribute;
    let _: bool = mn.any_namespace;
    let _: bool = mn.global;
}

/// Contract: EngineError implements std::error::Error
#[test]
fn test_engine_error_is_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&EngineError::Config("x".to_string()));
}

/// Contract: ErrorKind is Copy + Eq + Hash
#[test]
fn test_error_kind_traits_contract() {
    use std::collections::HashSet;
    let set: HashSet<ErrorKind> = ErrorKind::ALL.iter().copied().collect();
    assert_eq!(set.len(), ErrorKind::ALL.len());
}
