//! A fact: a named structured record in the external store (GLOSSARY).

use dres_core::FactValue;
use std::collections::BTreeMap;

/// An opaque handle to a fact held by the store. Cheap to copy and compare;
/// the store is the only thing that dereferences it into field data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FactHandle(pub u64);

/// The structure name a freshly created, not-yet-stored fact carries until
/// it is promoted into the store by `SET`/`SET_FIELD` (§3.5, §4.1).
pub const ORPHAN_STRUCTURE_NAME: &str = "__vm_global";

#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub handle: FactHandle,
    pub name: String,
    pub fields: BTreeMap<String, FactValue>,
}

impl Fact {
    pub fn new(handle: FactHandle, name: impl Into<String>) -> Self {
        Fact {
            handle,
            name: name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.name == ORPHAN_STRUCTURE_NAME
    }

    pub fn get_field(&self, field: &str) -> Option<&FactValue> {
        self.fields.get(field)
    }

    pub fn set_field(&mut self, field: &str, value: FactValue) {
        self.fields.insert(field.to_string(), value);
    }

    /// Whether every `(field, value)` pair in `selector` matches this fact
    /// (`FILTER`'s predicate, §4.1).
    pub fn matches_all(&self, selector: &[(String, FactValue)]) -> bool {
        selector
            .iter()
            .all(|(field, value)| self.get_field(field).is_some_and(|v| v.matches(value)))
    }
}
