//! Trait tables
//!
//! A [`TraitTable`] is an insertion-ordered multimap from local name to
//! property records. The same local name may appear once per namespace.
//! Entries can also be addressed by 1-based slot id and enumerated with a
//! cursor that only yields enumerable dynamic properties.

use smallvec::SmallVec;

use core_types::{Multiname, Namespace, StringId};
use rustc_hash::FxHashMap;

use crate::value::{ClassRef, FunctionRef, Value};

/// Kind of a property record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraitKind {
    /// Fixed member (methods, accessors, static variables)
    Declared,
    /// Write-once member
    Constant,
    /// Class-declared variable materialized on each instance
    Instance,
    /// Property added at run time, always in the unnamed public namespace
    Dynamic,
}

impl TraitKind {
    fn bit(self) -> u8 {
        match self {
            TraitKind::Declared => 1,
            TraitKind::Constant => 2,
            TraitKind::Instance => 4,
            TraitKind::Dynamic => 8,
        }
    }

    /// Only dynamic and instance records may be deleted
    pub fn is_deletable(self) -> bool {
        matches!(self, TraitKind::Dynamic | TraitKind::Instance)
    }
}

/// Set of trait kinds a lookup accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindMask(u8);

impl KindMask {
    /// Matches nothing
    pub const NONE: KindMask = KindMask(0);
    /// Declared members only
    pub const DECLARED: KindMask = KindMask(1);
    /// Constants only
    pub const CONSTANT: KindMask = KindMask(2);
    /// Instance variables only
    pub const INSTANCE: KindMask = KindMask(4);
    /// Dynamic properties only
    pub const DYNAMIC: KindMask = KindMask(8);
    /// Everything fixed at class-definition time
    pub const FIXED: KindMask = KindMask(1 | 2 | 4);
    /// Every kind
    pub const ALL: KindMask = KindMask(1 | 2 | 4 | 8);

    /// Union of two masks
    pub const fn with(self, other: KindMask) -> KindMask {
        KindMask(self.0 | other.0)
    }

    /// Whether `kind` is in the set
    pub fn contains(self, kind: TraitKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Whether the set is empty
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Declared type of a variable
#[derive(Debug, Clone, Default)]
pub enum TypeSlot {
    /// Untyped `*`
    #[default]
    Any,
    /// Named type not looked up yet
    Unresolved(Multiname),
    /// Resolved class
    Class(ClassRef),
}

/// Storage of a property record.
///
/// A record is either a plain value or an accessor pair, never both.
#[derive(Debug, Clone)]
pub enum VarSlot {
    /// Plain value
    Value(Value),
    /// Getter and/or setter
    Accessor {
        /// Read half
        getter: Option<FunctionRef>,
        /// Write half
        setter: Option<FunctionRef>,
    },
}

/// Property record
#[derive(Debug, Clone)]
pub struct Variable {
    /// Value or accessors
    pub slot: VarSlot,
    /// Owning namespace
    pub ns: Namespace,
    /// Visible to for-in enumeration
    pub enumerable: bool,
    /// 1-based slot id (0 = no slot)
    pub slot_id: u32,
    /// Declared type used to coerce on write
    pub ty: TypeSlot,
    /// Sealed flag of the class this record was inherited from
    pub inherited_sealed: Option<bool>,
    /// Cannot be overridden
    pub is_final: bool,
}

impl Variable {
    /// Untyped plain value
    pub fn value(ns: Namespace, value: Value) -> Self {
        Self {
            slot: VarSlot::Value(value),
            ns,
            enumerable: false,
            slot_id: 0,
            ty: TypeSlot::Any,
            inherited_sealed: None,
            is_final: false,
        }
    }

    /// Enumerable dynamic property
    pub fn dynamic(value: Value) -> Self {
        Self {
            enumerable: true,
            ..Self::value(Namespace::public(), value)
        }
    }

    /// Accessor pair
    pub fn accessor(ns: Namespace, getter: Option<FunctionRef>, setter: Option<FunctionRef>) -> Self {
        Self {
            slot: VarSlot::Accessor { getter, setter },
            ..Self::value(ns, Value::Undefined)
        }
    }

    /// Set the declared type
    pub fn typed(mut self, ty: TypeSlot) -> Self {
        self.ty = ty;
        self
    }

    /// Has a getter or a plain value
    pub fn is_gettable(&self) -> bool {
        match &self.slot {
            VarSlot::Value(_) => true,
            VarSlot::Accessor { getter, .. } => getter.is_some(),
        }
    }

    /// Has a setter or a plain value
    pub fn is_settable(&self) -> bool {
        match &self.slot {
            VarSlot::Value(_) => true,
            VarSlot::Accessor { setter, .. } => setter.is_some(),
        }
    }

    /// Plain value, if this is not an accessor
    pub fn plain(&self) -> Option<&Value> {
        match &self.slot {
            VarSlot::Value(v) => Some(v),
            VarSlot::Accessor { .. } => None,
        }
    }
}

/// One record in a [`TraitTable`]
#[derive(Debug, Clone)]
pub struct Trait {
    /// Local name
    pub name: StringId,
    /// Record kind
    pub kind: TraitKind,
    /// Record payload
    pub var: Variable,
}

/// Insertion-ordered trait multimap
///
/// # Example
///
/// ```
/// use core_types::{Multiname, Namespace, StringId};
/// use object_model::{KindMask, TraitKind, TraitTable, Value, Variable};
///
/// let mut table = TraitTable::new();
/// let x = StringId(1);
/// table.insert(x, TraitKind::Dynamic, Variable::dynamic(Value::Int(1)));
///
/// let hit = table.find_multiname(x, &Multiname::public(x), KindMask::DYNAMIC);
/// assert!(hit.is_some());
/// assert!(table.find_multiname(x, &Multiname::public(x), KindMask::FIXED).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TraitTable {
    entries: Vec<Option<Trait>>,
    by_name: FxHashMap<StringId, SmallVec<[u32; 2]>>,
    slots: Vec<Option<u32>>,
    live: usize,
}

impl TraitTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the table has no live records
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Insert a record, replacing one with the same name and namespace.
    ///
    /// Returns the record's position.
    pub fn insert(&mut self, name: StringId, kind: TraitKind, var: Variable) -> u32 {
        if let Some(pos) = self.find(name, &var.ns, KindMask::ALL) {
            let slot_id = var.slot_id;
            if let Some(entry) = self.entries[pos as usize].as_mut() {
                entry.kind = kind;
                entry.var = var;
            }
            self.bind_slot(slot_id, pos);
            return pos;
        }
        let pos = self.entries.len() as u32;
        let slot_id = var.slot_id;
        self.entries.push(Some(Trait { name, kind, var }));
        self.by_name.entry(name).or_default().push(pos);
        self.bind_slot(slot_id, pos);
        self.live += 1;
        pos
    }

    fn bind_slot(&mut self, slot_id: u32, pos: u32) {
        if slot_id == 0 {
            return;
        }
        let index = slot_id as usize - 1;
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(pos);
    }

    /// Highest slot id in use
    pub fn max_slot(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Record at `pos`
    pub fn get(&self, pos: u32) -> Option<&Trait> {
        self.entries.get(pos as usize).and_then(Option::as_ref)
    }

    /// Mutable record at `pos`
    pub fn get_mut(&mut self, pos: u32) -> Option<&mut Trait> {
        self.entries.get_mut(pos as usize).and_then(Option::as_mut)
    }

    /// Position of the record in exactly `ns`
    pub fn find(&self, name: StringId, ns: &Namespace, mask: KindMask) -> Option<u32> {
        self.by_name.get(&name)?.iter().copied().find(|&pos| {
            self.get(pos)
                .is_some_and(|t| t.var.ns == *ns && mask.contains(t.kind))
        })
    }

    /// Position of the first record matching `mn`'s namespaces in order.
    ///
    /// `name` is the already-resolved local name of `mn`.
    pub fn find_multiname(&self, name: StringId, mn: &Multiname, mask: KindMask) -> Option<u32> {
        if mask.is_empty() {
            return None;
        }
        let positions = self.by_name.get(&name)?;
        if mn.any_namespace {
            return positions
                .iter()
                .copied()
                .find(|&pos| self.get(pos).is_some_and(|t| mask.contains(t.kind)));
        }
        if mn.namespaces.is_empty() {
            return self.find(name, &Namespace::public(), mask);
        }
        mn.candidates()
            .iter()
            .find_map(|ns| self.find(name, ns, mask))
    }

    /// Any record with this local name, regardless of namespace
    pub fn find_any(&self, name: StringId, mask: KindMask) -> Option<u32> {
        self.by_name
            .get(&name)?
            .iter()
            .copied()
            .find(|&pos| self.get(pos).is_some_and(|t| mask.contains(t.kind)))
    }

    /// Position of the record bound to a 1-based slot id
    pub fn slot_position(&self, slot_id: u32) -> Option<u32> {
        if slot_id == 0 {
            return None;
        }
        self.slots.get(slot_id as usize - 1).copied().flatten()
    }

    /// Remove the record at `pos`
    pub fn remove(&mut self, pos: u32) -> Option<Trait> {
        let entry = self.entries.get_mut(pos as usize)?.take()?;
        if let Some(list) = self.by_name.get_mut(&entry.name) {
            list.retain(|p| *p != pos);
            if list.is_empty() {
                self.by_name.remove(&entry.name);
            }
        }
        for slot in self.slots.iter_mut() {
            if *slot == Some(pos) {
                *slot = None;
            }
        }
        self.live -= 1;
        Some(entry)
    }

    /// Live records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Trait)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|t| (i as u32, t)))
    }

    /// Advance an enumeration cursor.
    ///
    /// Cursor 0 starts the walk; the returned cursor is 1-based and 0 means
    /// the walk is finished. Only enumerable dynamic records are visited.
    pub fn next_enumerable(&self, cursor: u32) -> u32 {
        let start = cursor as usize;
        self.entries
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, e)| {
                e.as_ref()
                    .is_some_and(|t| t.kind == TraitKind::Dynamic && t.var.enumerable)
            })
            .map(|(i, _)| i as u32 + 1)
            .unwrap_or(0)
    }

    /// Record addressed by a 1-based cursor from [`TraitTable::next_enumerable`]
    pub fn at_cursor(&self, cursor: u32) -> Option<&Trait> {
        cursor.checked_sub(1).and_then(|pos| self.get(pos))
    }
}
