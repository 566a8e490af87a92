//! Cross-reference resolution
//!
//! Records that can be pointed at (`@I1@`, `@F1@`, ...) live in typed arenas
//! owned by the [`Gedcom`] graph and are addressed by [`RecordId`]. The
//! [`ReferenceTable`] maps an xref to its arena slot, allocating the record the
//! first time the xref shows up, whether as a definition or as a pointer.

use crate::model::Gedcom;
use hashbrown::HashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// The record kinds that are shared by xref
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    /// `INDI`
    Individual,
    /// `FAM`
    Family,
    /// `SOUR`
    Source,
    /// `OBJE`
    Media,
    /// `REPO`
    Repository,
    /// `SUBM`
    Submitter,
    /// `SUBN`
    Submission,
}

impl RecordKind {
    /// Number of kinds
    pub const COUNT: usize = 7;

    /// Top-level tag for records of this kind
    pub fn tag(self) -> &'static str {
        match self {
            RecordKind::Individual => "INDI",
            RecordKind::Family => "FAM",
            RecordKind::Source => "SOUR",
            RecordKind::Media => "OBJE",
            RecordKind::Repository => "REPO",
            RecordKind::Submitter => "SUBM",
            RecordKind::Submission => "SUBN",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Typed index of a record in its arena
pub struct RecordId<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> RecordId<T> {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index: index as u32,
            _marker: PhantomData,
        }
    }

    /// Position in the arena
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for RecordId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RecordId<T> {}

impl<T> PartialEq for RecordId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for RecordId<T> {}

impl<T> Hash for RecordId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for RecordId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.index)
    }
}

impl<T> Serialize for RecordId<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.index)
    }
}

impl<'de, T> Deserialize<'de> for RecordId<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(|index| RecordId::new(index as usize))
    }
}

/// Owning storage for one record kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arena<T> {
    items: Vec<T>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Arena<T> {
    /// Store a record and return its id
    pub fn alloc(&mut self, record: T) -> RecordId<T> {
        let id = RecordId::new(self.items.len());
        self.items.push(record);
        id
    }

    /// Look up a record
    pub fn get(&self, id: RecordId<T>) -> Option<&T> {
        self.items.get(id.index())
    }

    /// Look up a record mutably
    pub fn get_mut(&mut self, id: RecordId<T>) -> Option<&mut T> {
        self.items.get_mut(id.index())
    }

    /// Number of records, listed or not
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the arena holds no records
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All records with their ids, in allocation order
    pub fn iter(&self) -> impl Iterator<Item = (RecordId<T>, &T)> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(|(i, record)| (RecordId::new(i), record))
    }
}

impl<T> Index<RecordId<T>> for Arena<T> {
    type Output = T;

    fn index(&self, id: RecordId<T>) -> &T {
        &self.items[id.index()]
    }
}

impl<T> IndexMut<RecordId<T>> for Arena<T> {
    fn index_mut(&mut self, id: RecordId<T>) -> &mut T {
        &mut self.items[id.index()]
    }
}

/// A record kind that lives in an arena of the graph
pub trait Record: Default + Sized {
    /// Which kind this is
    const KIND: RecordKind;

    /// The record's defining xref, empty for anonymous records
    fn xref(&self) -> &str;

    /// Set the defining xref
    fn set_xref(&mut self, xref: String);

    /// The arena holding records of this kind
    fn arena(gedcom: &Gedcom) -> &Arena<Self>;

    /// The arena holding records of this kind, mutably
    fn arena_mut(gedcom: &mut Gedcom) -> &mut Arena<Self>;

    /// Ids of the records of this kind listed at top level
    fn listed(gedcom: &Gedcom) -> &[RecordId<Self>];

    /// The top-level list, mutably
    fn listed_mut(gedcom: &mut Gedcom) -> &mut Vec<RecordId<Self>>;
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    index: u32,
    defined: bool,
}

/// Maps `(kind, xref)` to an arena slot
///
/// Every use of an xref, forward or backward, resolves to the same record.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    slots: [HashMap<String, Slot>; RecordKind::COUNT],
}

impl ReferenceTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `xref` to its record, allocating it on first sight
    ///
    /// An empty xref always allocates a fresh anonymous record that is not
    /// registered.
    pub fn get_or_create<T: Record>(&mut self, gedcom: &mut Gedcom, xref: &str) -> RecordId<T> {
        self.resolve(gedcom, xref, false).0
    }

    /// Resolve the xref of a top-level definition
    ///
    /// Returns the id and whether this is the first definition seen for the
    /// xref, so the caller lists the record exactly once.
    pub fn define<T: Record>(&mut self, gedcom: &mut Gedcom, xref: &str) -> (RecordId<T>, bool) {
        self.resolve(gedcom, xref, true)
    }

    /// Look up an xref without allocating
    pub fn lookup<T: Record>(&self, xref: &str) -> Option<RecordId<T>> {
        self.slots[T::KIND.slot()]
            .get(xref)
            .map(|slot| RecordId::new(slot.index as usize))
    }

    /// Number of registered xrefs across all kinds
    pub fn len(&self) -> usize {
        self.slots.iter().map(HashMap::len).sum()
    }

    /// Whether no xref has been registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered xrefs that were pointed at but never defined
    pub fn undefined(&self) -> impl Iterator<Item = (RecordKind, &str)> + '_ {
        const KINDS: [RecordKind; RecordKind::COUNT] = [
            RecordKind::Individual,
            RecordKind::Family,
            RecordKind::Source,
            RecordKind::Media,
            RecordKind::Repository,
            RecordKind::Submitter,
            RecordKind::Submission,
        ];
        KINDS.into_iter().flat_map(move |kind| {
            self.slots[kind.slot()]
                .iter()
                .filter(|(_, slot)| !slot.defined)
                .map(move |(xref, _)| (kind, xref.as_str()))
        })
    }

    fn resolve<T: Record>(
        &mut self,
        gedcom: &mut Gedcom,
        xref: &str,
        defining: bool,
    ) -> (RecordId<T>, bool) {
        if xref.is_empty() {
            return (T::arena_mut(gedcom).alloc(T::default()), defining);
        }

        let map = &mut self.slots[T::KIND.slot()];
        if let Some(slot) = map.get_mut(xref) {
            let first = defining && !slot.defined;
            slot.defined |= defining;
            return (RecordId::new(slot.index as usize), first);
        }

        let mut record = T::default();
        record.set_xref(xref.to_string());
        let id = T::arena_mut(gedcom).alloc(record);
        map.insert(
            xref.to_string(),
            Slot {
                index: id.index() as u32,
                defined: defining,
            },
        );
        (id, defining)
    }
}
