//! Unit tests for StringTable and StringId

use core_types::{StringId, StringTable};

#[test]
fn test_table_starts_with_empty_string() {
    let table = StringTable::new();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(StringId::EMPTY), "");
}

#[test]
fn test_intern_returns_sequential_ids() {
    let mut table = StringTable::new();
    let a = table.intern("a");
    let b = table.intern("b");
    assert_eq!(a, StringId(1));
    assert_eq!(b, StringId(2));
}

#[test]
fn test_reintern_does_not_grow() {
    let mut table = StringTable::new();
    table.intern("prototype");
    let before = table.len();
    table.intern("prototype");
    assert_eq!(table.len(), before);
}

#[test]
fn test_find_without_interning() {
    let mut table = StringTable::new();
    assert_eq!(table.find("missing"), None);
    let id = table.intern("present");
    assert_eq!(table.find("present"), Some(id));
}

#[test]
fn test_shared_text_handle() {
    let mut table = StringTable::new();
    let id = table.intern("shared");
    let rc = table.get_rc(id).unwrap();
    assert_eq!(&*rc, "shared");
}
