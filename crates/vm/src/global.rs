//! VM globals (§3.5, §9): a value referencing zero or more facts by a
//! common name.
//!
//! The source's tag convention lets a global be "just a name" or "a list of
//! facts" under one representation; §9 tightens that into two distinct
//! value kinds so the type contract is explicit at compile time.

use dres_store::FactHandle;

/// Structure name the fact store uses for a freshly created, not-yet-stored
/// fact (`VM_UNNAMED_GLOBAL` in the source).
pub const ORPHAN_NAME: &str = dres_store::ORPHAN_STRUCTURE_NAME;

#[derive(Debug, Clone, PartialEq)]
pub enum Global {
    /// A bare name that did not resolve to any fact in the store.
    Unresolved(String),
    /// One or more facts from the store sharing this global's name.
    Bound {
        name: String,
        facts: Vec<FactHandle>,
    },
}

impl Global {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Global::Unresolved(name.into())
    }

    pub fn bound(name: impl Into<String>, facts: Vec<FactHandle>) -> Self {
        Global::Bound {
            name: name.into(),
            facts,
        }
    }

    /// An orphan global: a single newly allocated fact, not yet inserted
    /// into the store (`VM_GLOBAL_IS_ORPHAN`).
    pub fn orphan(handle: FactHandle) -> Self {
        Global::Bound {
            name: ORPHAN_NAME.to_string(),
            facts: vec![handle],
        }
    }

    pub fn is_orphan(&self) -> bool {
        matches!(self, Global::Bound { name, facts } if name == ORPHAN_NAME && facts.len() == 1)
    }

    pub fn name(&self) -> &str {
        match self {
            Global::Unresolved(name) => name,
            Global::Bound { name, .. } => name,
        }
    }

    pub fn facts(&self) -> &[FactHandle] {
        match self {
            Global::Unresolved(_) => &[],
            Global::Bound { facts, .. } => facts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.facts().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orphan_global_has_single_fact_under_the_sentinel_name() {
        let g = Global::orphan(FactHandle(7));
        assert!(g.is_orphan());
        assert_eq!(g.name(), ORPHAN_NAME);
    }

    #[test]
    fn unresolved_global_has_no_facts() {
        let g = Global::unresolved("widget");
        assert!(g.is_empty());
        assert!(!g.is_orphan());
    }
}
