//! Tagged IDs: a 32-bit newtype encoding a type tag and a table index.
//!
//! Every named entity in a rule file — a target, a fact-store-backed
//! variable, an in-memory resolver variable, or an interned string literal —
//! is referenced by one of these. The layout is:
//!
//! ```text
//! bit 31        bits 30-29      bits 28-0
//! deleted flag  type tag        index
//! ```
//!
//! The deleted flag is transient: it is set only on local copies of an ID
//! while the topological sort is walking the graph, and is never written
//! back onto a [`crate::value`] or resolver record.

use std::fmt;

const INDEX_BITS: u32 = 29;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;
const TAG_SHIFT: u32 = INDEX_BITS;
const TAG_MASK: u32 = 0b11;
const DELETED_BIT: u32 = 1 << 31;

/// Sentinel meaning "no id".
pub const NONE: TaggedId = TaggedId(u32::MAX);

/// The four kinds of entity a [`TaggedId`] can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Target,
    FactVar,
    DresVar,
    Literal,
}

impl TypeTag {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => TypeTag::Target,
            1 => TypeTag::FactVar,
            2 => TypeTag::DresVar,
            3 => TypeTag::Literal,
            _ => unreachable!("tag is masked to 2 bits"),
        }
    }

    fn to_bits(self) -> u32 {
        match self {
            TypeTag::Target => 0,
            TypeTag::FactVar => 1,
            TypeTag::DresVar => 2,
            TypeTag::Literal => 3,
        }
    }
}

/// A 32-bit tagged reference to a target, variable, or interned literal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaggedId(u32);

impl TaggedId {
    /// Build an id from a type tag and a table index.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in 29 bits — the table it names has
    /// grown past what a single id can address.
    pub fn new(tag: TypeTag, index: usize) -> Self {
        assert!(
            index as u32 <= INDEX_MASK,
            "table index {index} does not fit in a tagged id"
        );
        TaggedId(tag.to_bits() << TAG_SHIFT | index as u32)
    }

    pub fn is_none(self) -> bool {
        self == NONE
    }

    /// The type tag, ignoring the transient deleted flag.
    pub fn type_tag(self) -> TypeTag {
        TypeTag::from_bits((self.0 >> TAG_SHIFT) & TAG_MASK)
    }

    /// The table index, ignoring the transient deleted flag.
    pub fn index(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    /// Whether the transient deleted flag is set.
    ///
    /// Only meaningful on a local copy taken during [`crate::id`]-indexed
    /// graph traversal; never persisted on a stored record.
    pub fn is_deleted(self) -> bool {
        self.0 & DELETED_BIT != 0
    }

    /// Return a copy with the deleted flag set.
    pub fn marked_deleted(self) -> Self {
        TaggedId(self.0 | DELETED_BIT)
    }

    /// Return a copy with the deleted flag cleared.
    pub fn unmarked(self) -> Self {
        TaggedId(self.0 & !DELETED_BIT)
    }
}

impl fmt::Debug for TaggedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "TaggedId(NONE)");
        }
        write!(
            f,
            "TaggedId({:?}#{}{})",
            self.type_tag(),
            self.index(),
            if self.is_deleted() { ",deleted" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_tag_and_index() {
        let id = TaggedId::new(TypeTag::FactVar, 42);
        assert_eq!(id.type_tag(), TypeTag::FactVar);
        assert_eq!(id.index(), 42);
        assert!(!id.is_deleted());
    }

    #[test]
    fn none_is_distinct_from_any_valid_id() {
        assert!(NONE.is_none());
        assert!(!TaggedId::new(TypeTag::Target, 0).is_none());
    }

    #[test]
    fn deleted_flag_is_transient_and_does_not_disturb_tag_or_index() {
        let id = TaggedId::new(TypeTag::DresVar, 7);
        let marked = id.marked_deleted();
        assert!(marked.is_deleted());
        assert_eq!(marked.type_tag(), TypeTag::DresVar);
        assert_eq!(marked.index(), 7);
        assert_eq!(marked.unmarked(), id);
    }

    #[test]
    #[should_panic]
    fn index_overflow_panics() {
        TaggedId::new(TypeTag::Literal, 1 << 29);
    }
}
