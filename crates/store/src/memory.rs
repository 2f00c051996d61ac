//! `MemoryStore`: an entirely in-memory [`FactStore`], used by the
//! resolver's own test suite and by the CLI demo (SPEC_FULL.md §6
//! expansion). Transactions are implemented by snapshotting the whole
//! fact table on `transaction_push` — appropriate at the scale policy data
//! stores actually hold, and simplest to reason about for a reference
//! adapter; a production backend would use a write-ahead log instead.

use crate::error::StoreError;
use crate::fact::{Fact, FactHandle, ORPHAN_STRUCTURE_NAME};
use crate::view::{FactView, PatternMatch};
use dres_core::FactValue;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Clone)]
struct Snapshot {
    facts: HashMap<FactHandle, Fact>,
    by_name: HashMap<String, HashSet<FactHandle>>,
}

struct Shared {
    facts: HashMap<FactHandle, Fact>,
    by_name: HashMap<String, HashSet<FactHandle>>,
    /// Bumped on every mutation that touches a fact of the given name;
    /// views compare this against their own last-seen snapshot.
    last_mutated_at: HashMap<String, u64>,
    mutation_clock: u64,
    next_handle: u64,
    tx_stack: Vec<Snapshot>,
}

impl Shared {
    fn new() -> Self {
        Shared {
            facts: HashMap::new(),
            by_name: HashMap::new(),
            last_mutated_at: HashMap::new(),
            mutation_clock: 0,
            next_handle: 0,
            tx_stack: Vec::new(),
        }
    }

    fn touch(&mut self, name: &str) {
        self.mutation_clock += 1;
        self.last_mutated_at
            .insert(name.to_string(), self.mutation_clock);
    }
}

/// An entirely in-memory reference implementation of [`crate::adapter::FactStore`].
#[derive(Clone)]
pub struct MemoryStore {
    shared: Rc<RefCell<Shared>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            shared: Rc::new(RefCell::new(Shared::new())),
        }
    }
}

impl super::adapter::FactStore for MemoryStore {
    type View = MemoryView;

    fn lookup_by_name(&self, name: &str) -> Vec<FactHandle> {
        let shared = self.shared.borrow();
        shared
            .by_name
            .get(name)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn new_fact(&mut self, name: &str) -> FactHandle {
        let mut shared = self.shared.borrow_mut();
        let handle = FactHandle(shared.next_handle);
        shared.next_handle += 1;
        let fact = Fact::new(handle, name);
        shared.facts.insert(handle, fact);
        // Orphans are deliberately not indexed into by_name until insert().
        handle
    }

    fn insert(&mut self, fact: Fact) -> Result<(), StoreError> {
        let mut shared = self.shared.borrow_mut();
        let handle = fact.handle;
        let name = fact.name.clone();
        shared.facts.insert(handle, fact);
        if name != ORPHAN_STRUCTURE_NAME {
            shared.by_name.entry(name.clone()).or_default().insert(handle);
            shared.touch(&name);
        }
        Ok(())
    }

    fn remove(&mut self, handle: FactHandle) -> Result<(), StoreError> {
        let mut shared = self.shared.borrow_mut();
        let fact = shared
            .facts
            .remove(&handle)
            .ok_or_else(|| StoreError::Missing {
                name: format!("<handle {}>", handle.0),
            })?;
        if let Some(set) = shared.by_name.get_mut(&fact.name) {
            set.remove(&handle);
        }
        shared.touch(&fact.name);
        Ok(())
    }

    fn remove_by_name(&mut self, name: &str) -> Result<(), StoreError> {
        let handles: Vec<FactHandle> = {
            let shared = self.shared.borrow();
            shared
                .by_name
                .get(name)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        };
        let mut shared = self.shared.borrow_mut();
        for handle in handles {
            shared.facts.remove(&handle);
        }
        shared.by_name.remove(name);
        shared.touch(name);
        Ok(())
    }

    fn get_field(&self, handle: FactHandle, field: &str) -> Result<Option<FactValue>, StoreError> {
        let shared = self.shared.borrow();
        let fact = shared.facts.get(&handle).ok_or_else(|| StoreError::Missing {
            name: format!("<handle {}>", handle.0),
        })?;
        Ok(fact.get_field(field).cloned())
    }

    fn set_field(
        &mut self,
        handle: FactHandle,
        field: &str,
        value: FactValue,
    ) -> Result<(), StoreError> {
        let mut shared = self.shared.borrow_mut();
        let name = {
            let fact = shared
                .facts
                .get_mut(&handle)
                .ok_or_else(|| StoreError::Missing {
                    name: format!("<handle {}>", handle.0),
                })?;
            fact.set_field(field, value);
            fact.name.clone()
        };
        if name != ORPHAN_STRUCTURE_NAME {
            shared.touch(&name);
        }
        Ok(())
    }

    fn fact(&self, handle: FactHandle) -> Option<Fact> {
        self.shared.borrow().facts.get(&handle).cloned()
    }

    fn transparent_view(&mut self, patterns: Vec<String>) -> MemoryView {
        let last_seen = {
            let shared = self.shared.borrow();
            patterns
                .iter()
                .map(|p| (p.clone(), shared.last_mutated_at.get(p).copied().unwrap_or(0)))
                .collect()
        };
        MemoryView {
            shared: Rc::clone(&self.shared),
            patterns,
            last_seen,
        }
    }

    fn transaction_push(&mut self) {
        let mut shared = self.shared.borrow_mut();
        let snapshot = Snapshot {
            facts: shared.facts.clone(),
            by_name: shared.by_name.clone(),
        };
        shared.tx_stack.push(snapshot);
    }

    fn transaction_pop(&mut self, rollback: bool) -> Result<(), StoreError> {
        let mut shared = self.shared.borrow_mut();
        let snapshot = shared.tx_stack.pop().ok_or(StoreError::NoOpenTransaction)?;
        if rollback {
            shared.facts = snapshot.facts;
            shared.by_name = snapshot.by_name;
        }
        Ok(())
    }
}

pub struct MemoryView {
    shared: Rc<RefCell<Shared>>,
    patterns: Vec<String>,
    last_seen: HashMap<String, u64>,
}

impl FactView for MemoryView {
    fn changes(&self) -> Vec<PatternMatch> {
        let shared = self.shared.borrow();
        self.patterns
            .iter()
            .filter_map(|pattern| {
                let current = shared.last_mutated_at.get(pattern).copied().unwrap_or(0);
                let baseline = self.last_seen.get(pattern).copied().unwrap_or(0);
                if current > baseline {
                    let facts = shared
                        .by_name
                        .get(pattern)
                        .map(|set| set.iter().copied().collect())
                        .unwrap_or_default();
                    Some(PatternMatch {
                        pattern_name: pattern.clone(),
                        facts,
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    fn reset_changes(&mut self) {
        let shared = self.shared.borrow();
        for pattern in &self.patterns {
            let current = shared.last_mutated_at.get(pattern).copied().unwrap_or(0);
            self.last_seen.insert(pattern.clone(), current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::FactStore;

    #[test]
    fn orphan_fact_is_not_visible_until_inserted() {
        let mut store = MemoryStore::new();
        let handle = store.new_fact("widget");
        assert!(store.lookup_by_name("widget").is_empty());
        let fact = store.fact(handle).unwrap();
        store.insert(fact).unwrap();
        assert_eq!(store.lookup_by_name("widget"), vec![handle]);
    }

    #[test]
    fn view_reports_change_only_after_reset_baseline() {
        let mut store = MemoryStore::new();
        let mut view = store.transparent_view(vec!["widget".to_string()]);
        assert!(view.changes().is_empty());

        let handle = store.new_fact("widget");
        let fact = store.fact(handle).unwrap();
        store.insert(fact).unwrap();

        let changes = view.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].pattern_name, "widget");

        view.reset_changes();
        assert!(view.changes().is_empty());
    }

    #[test]
    fn transaction_rollback_restores_prior_state() {
        let mut store = MemoryStore::new();
        let handle = store.new_fact("widget");
        let fact = store.fact(handle).unwrap();
        store.insert(fact).unwrap();

        store.transaction_push();
        store
            .set_field(handle, "count", FactValue::Int(1))
            .unwrap();
        assert_eq!(
            store.get_field(handle, "count").unwrap(),
            Some(FactValue::Int(1))
        );

        store.transaction_pop(true).unwrap();
        assert_eq!(store.get_field(handle, "count").unwrap(), None);
    }

    #[test]
    fn transaction_commit_keeps_mutations() {
        let mut store = MemoryStore::new();
        let handle = store.new_fact("widget");
        let fact = store.fact(handle).unwrap();
        store.insert(fact).unwrap();

        store.transaction_push();
        store
            .set_field(handle, "count", FactValue::Int(9))
            .unwrap();
        store.transaction_pop(false).unwrap();

        assert_eq!(
            store.get_field(handle, "count").unwrap(),
            Some(FactValue::Int(9))
        );
    }
}
