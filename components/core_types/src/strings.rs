//! Interned string storage.
//!
//! Every name the engine compares (trait names, namespace URIs, string
//! values) is interned once and referred to by a [`StringId`].

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

/// Index of an interned string.
///
/// Id 0 is always the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(pub u32);

impl StringId {
    /// The empty string, interned by every [`StringTable`].
    pub const EMPTY: StringId = StringId(0);

    /// Raw index into the table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Append-only string interner.
///
/// # Examples
///
/// ```
/// use core_types::{StringId, StringTable};
///
/// let mut table = StringTable::new();
/// let a = table.intern("length");
/// let b = table.intern("length");
/// assert_eq!(a, b);
/// assert_eq!(table.intern(""), StringId::EMPTY);
/// ```
#[derive(Debug, Clone)]
pub struct StringTable {
    strings: Vec<Rc<str>>,
    lookup: FxHashMap<Rc<str>, StringId>,
}

impl StringTable {
    /// Create a table holding only the empty string
    pub fn new() -> Self {
        let mut table = Self {
            strings: Vec::with_capacity(64),
            lookup: FxHashMap::default(),
        };
        table.intern("");
        table
    }

    /// Intern `s`, returning the existing id when already present
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(id) = self.lookup.get(s) {
            return *id;
        }
        let id = StringId(self.strings.len() as u32);
        let shared: Rc<str> = Rc::from(s);
        self.strings.push(shared.clone());
        self.lookup.insert(shared, id);
        id
    }

    /// Id of `s` if it was interned before
    pub fn find(&self, s: &str) -> Option<StringId> {
        self.lookup.get(s).copied()
    }

    /// Text of an interned string.
    ///
    /// Unknown ids read as the empty string.
    pub fn get(&self, id: StringId) -> &str {
        self.strings.get(id.index()).map(|s| &**s).unwrap_or("")
    }

    /// Shared handle to the text of an interned string
    pub fn get_rc(&self, id: StringId) -> Option<Rc<str>> {
        self.strings.get(id.index()).cloned()
    }

    /// Number of interned strings, including the empty string
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Always false: the empty string is interned on creation
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}
