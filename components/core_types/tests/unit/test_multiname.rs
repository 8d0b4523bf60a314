//! Unit tests for Namespace and Multiname

use core_types::{Multiname, NameKey, Namespace, NamespaceKind, StringId};

fn ns(uri: u32, kind: NamespaceKind) -> Namespace {
    Namespace::new(StringId(uri), kind)
}

#[test]
fn test_qualified_multiname_has_one_candidate() {
    let mn = Multiname::qualified(StringId(1), ns(2, NamespaceKind::Private));
    assert!(mn.is_qualified());
    assert_eq!(mn.candidates().len(), 1);
}

#[test]
fn test_candidates_keep_declaration_order() {
    let first = ns(2, NamespaceKind::Private);
    let second = ns(3, NamespaceKind::Protected);
    let mn = Multiname::with_namespaces(StringId(1), vec![first, second]);
    assert_eq!(mn.candidates(), &[first, second]);
}

#[test]
fn test_namespace_match_requires_membership() {
    let mn = Multiname::qualified(StringId(1), ns(2, NamespaceKind::Internal));
    assert!(mn.matches_namespace(&ns(2, NamespaceKind::Internal)));
    assert!(!mn.matches_namespace(&ns(2, NamespaceKind::Public)));
    assert!(!mn.can_match_dynamic());
}

#[test]
fn test_public_multiname_can_reach_dynamic_properties() {
    let mn = Multiname::public(StringId(4));
    assert!(mn.can_match_dynamic());
}

#[test]
fn test_index_multiname() {
    let mn = Multiname::index(7);
    assert_eq!(mn.name, NameKey::Index(7));
    assert_eq!(mn.name.as_str(), None);
    assert!(mn.candidates().is_empty());
}

#[test]
fn test_attribute_display() {
    let mut mn = Multiname::public(StringId(5));
    mn.attribute = true;
    assert_eq!(mn.to_string(), "@#5");
    assert_eq!(Multiname::index(2).to_string(), "[2]");
}
