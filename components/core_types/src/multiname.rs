//! Multinames: property lookup keys.
//!
//! A multiname pairs a local name with an ordered list of candidate
//! namespaces. Lookup tries the candidates in order and the first
//! namespace with a matching trait wins.

use std::fmt;
use std::rc::Rc;

use crate::namespace::Namespace;
use crate::strings::StringId;

/// Local-name part of a multiname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKey {
    /// Interned string name
    Str(StringId),
    /// Numeric index (array element access)
    Index(u32),
    /// Wildcard `*`
    Any,
}

impl NameKey {
    /// String id of a named key
    pub fn as_str(&self) -> Option<StringId> {
        match self {
            NameKey::Str(id) => Some(*id),
            _ => None,
        }
    }
}

/// Property lookup key.
///
/// # Examples
///
/// ```
/// use core_types::{Multiname, Namespace, NamespaceKind, StringId};
///
/// let private = Namespace::new(StringId(7), NamespaceKind::Private);
/// let name = Multiname::with_namespaces(StringId(3), vec![private, Namespace::public()]);
///
/// assert!(name.matches_namespace(&Namespace::public()));
/// assert!(!name.is_qualified());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Multiname {
    /// Local name
    pub name: NameKey,
    /// Ordered namespace candidates (empty = unqualified public)
    pub namespaces: Rc<[Namespace]>,
    /// `@attr` lookup
    pub attribute: bool,
    /// Matches every namespace
    pub any_namespace: bool,
    /// Global-scope marker carried by lexical lookups
    pub global: bool,
    /// Name is popped from the operand stack at run time
    pub runtime_name: bool,
}

impl Multiname {
    /// Name in exactly one namespace
    pub fn qualified(name: StringId, ns: Namespace) -> Self {
        Self::with_namespaces(name, vec![ns])
    }

    /// Name in the unnamed public namespace
    pub fn public(name: StringId) -> Self {
        Self::qualified(name, Namespace::public())
    }

    /// Name with an ordered namespace set
    pub fn with_namespaces(name: StringId, namespaces: Vec<Namespace>) -> Self {
        Self {
            name: NameKey::Str(name),
            namespaces: namespaces.into(),
            attribute: false,
            any_namespace: false,
            global: false,
            runtime_name: false,
        }
    }

    /// Namespace set whose name is supplied at run time
    pub fn runtime(namespaces: Vec<Namespace>) -> Self {
        Self {
            name: NameKey::Any,
            namespaces: namespaces.into(),
            attribute: false,
            any_namespace: false,
            global: false,
            runtime_name: true,
        }
    }

    /// Array element key
    pub fn index(index: u32) -> Self {
        Self {
            name: NameKey::Index(index),
            namespaces: Rc::from(Vec::new()),
            attribute: false,
            any_namespace: false,
            global: false,
            runtime_name: false,
        }
    }

    /// Copy of this multiname with the local name replaced
    pub fn with_name(&self, name: NameKey) -> Self {
        Self {
            name,
            runtime_name: false,
            ..self.clone()
        }
    }

    /// Exactly one candidate namespace
    pub fn is_qualified(&self) -> bool {
        !self.any_namespace && self.namespaces.len() == 1
    }

    /// Whether a trait declared in `ns` can satisfy this lookup.
    ///
    /// An empty candidate list only matches the unnamed public namespace.
    pub fn matches_namespace(&self, ns: &Namespace) -> bool {
        if self.any_namespace {
            return true;
        }
        if self.namespaces.is_empty() {
            return ns.is_empty_public();
        }
        self.namespaces.contains(ns)
    }

    /// Namespaces to try, in priority order
    pub fn candidates(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Whether a lookup through this name may reach dynamic properties
    pub fn can_match_dynamic(&self) -> bool {
        self.matches_namespace(&Namespace::public())
    }
}

impl fmt::Display for Multiname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attribute {
            f.write_str("@")?;
        }
        match self.name {
            NameKey::Str(id) => write!(f, "{}", id),
            NameKey::Index(i) => write!(f, "[{}]", i),
            NameKey::Any => f.write_str("*"),
        }
    }
}
