//! Namespaces qualifying member names.

use std::fmt;

use crate::strings::StringId;

/// Kind of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceKind {
    /// Package-public members
    Public,
    /// Package-internal members
    Internal,
    /// Members visible to one class lineage
    Protected,
    /// Members visible to the declaring class only
    Private,
    /// User-declared `namespace` members
    Explicit,
    /// Static members visible to one class lineage
    StaticProtected,
}

/// A namespace: URI plus kind.
///
/// Two namespaces are the same namespace iff both fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// Namespace URI (empty for the unnamed public namespace)
    pub uri: StringId,
    /// Namespace kind
    pub kind: NamespaceKind,
}

impl Namespace {
    /// Create a namespace
    pub fn new(uri: StringId, kind: NamespaceKind) -> Self {
        Self { uri, kind }
    }

    /// The unnamed public namespace that dynamic properties live in
    pub fn public() -> Self {
        Self::new(StringId::EMPTY, NamespaceKind::Public)
    }

    /// Whether this is the unnamed public namespace
    pub fn is_empty_public(&self) -> bool {
        self.kind == NamespaceKind::Public && self.uri == StringId::EMPTY
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::public()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.uri)
    }
}
