//! Target and Variable tables (C1 detail, §3.2/§3.3) and the rule-file
//! binding API (§6.2): `register_target`/`register_factvar`/`register_dresvar`.
//!
//! Targets support two-phase registration — [`Tables::target_id`] interns a
//! name (and allocates a placeholder slot) without requiring its body yet, so
//! a prerequisite list can forward-reference a target the parser hasn't
//! reached in the rule file — before [`Tables::register_target`] fills the
//! slot in. Variables have no body beyond their flags, so they register in
//! one step.

use dres_core::{NameTable, TaggedId, TypeTag};
use dres_vm::Chunk;

/// A compiled action: a method name (resolved against the VM's method table
/// by [`Tables::first_unresolved_method`]) plus its instruction chunk (§3.4).
#[derive(Debug, Clone)]
pub struct Action {
    pub name: String,
    pub chunk: Chunk,
}

impl Action {
    pub fn new(name: impl Into<String>, chunk: Chunk) -> Self {
        Action {
            name: name.into(),
            chunk,
        }
    }
}

/// A target: a named unit of work (§3.2). `stamp` mutates only inside the
/// resolver engine; `tx` is the transaction-scoped rollback snapshot
/// `(txid, txstamp)`.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: TaggedId,
    pub name: String,
    pub prereqs: Vec<TaggedId>,
    pub actions: Vec<Action>,
    pub stamp: u64,
    pub tx: Option<(u64, u64)>,
}

/// Flag bits on a [`Variable`] (§3.3). Only `PREREQ` exists today — set when
/// the variable is referenced as a prerequisite by at least one target, so
/// the engine's change-view (§4.7 step 3) only has to watch the fact
/// variables that can actually trigger a re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarFlags(u8);

impl VarFlags {
    pub const NONE: VarFlags = VarFlags(0);
    pub const PREREQ: VarFlags = VarFlags(1);

    pub fn contains(self, other: VarFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: VarFlags) -> VarFlags {
        VarFlags(self.0 | other.0)
    }
}

/// A variable: either a `FACTVAR` (backed by an external fact pattern) or a
/// `DRESVAR` (purely in-memory) — the two flavors share this one record
/// (§3.3). Which table a given instance lives in (`Tables::factvars` vs
/// `Tables::dresvars`) is what distinguishes them; the `TaggedId`'s type tag
/// is the authoritative marker.
#[derive(Debug, Clone)]
pub struct Variable {
    pub id: TaggedId,
    pub name: String,
    pub stamp: u64,
    pub tx: Option<(u64, u64)>,
    pub flags: VarFlags,
}

impl Variable {
    fn new(id: TaggedId, name: impl Into<String>, flags: VarFlags) -> Self {
        Variable {
            id,
            name: name.into(),
            stamp: 0,
            tx: None,
            flags,
        }
    }
}

/// C1's four name spaces (targets, fact-variables, dres-variables; string
/// literals live in `dres_core::intern`) plus the records they name.
#[derive(Debug, Default)]
pub struct Tables {
    target_names: NameTable,
    factvar_names: NameTable,
    dresvar_names: NameTable,
    targets: Vec<Option<Target>>,
    factvars: Vec<Variable>,
    dresvars: Vec<Variable>,
}

impl Tables {
    pub fn new() -> Self {
        Tables {
            target_names: NameTable::new(TypeTag::Target),
            factvar_names: NameTable::new(TypeTag::FactVar),
            dresvar_names: NameTable::new(TypeTag::DresVar),
            targets: Vec::new(),
            factvars: Vec::new(),
            dresvars: Vec::new(),
        }
    }

    /// Intern `name` as a target, allocating a placeholder slot if this is
    /// the first reference. Returns the same id on every call for the same
    /// name, whether or not [`Tables::register_target`] has filled it in yet.
    pub fn target_id(&mut self, name: &str) -> TaggedId {
        let id = self.target_names.intern(name);
        while self.targets.len() <= id.index() {
            self.targets.push(None);
        }
        id
    }

    /// Fill in a target's body. Errors if `name` was already fully
    /// registered (not just forward-declared via [`Tables::target_id`]).
    pub fn register_target(
        &mut self,
        name: &str,
        prereqs: Vec<TaggedId>,
        actions: Vec<Action>,
    ) -> Result<TaggedId, crate::error::ResolverError> {
        let id = self.target_id(name);
        let slot = &mut self.targets[id.index()];
        if slot.is_some() {
            return Err(crate::error::ResolverError::DuplicateTarget {
                name: name.to_string(),
            });
        }
        *slot = Some(Target {
            id,
            name: name.to_string(),
            prereqs,
            actions,
            stamp: 0,
            tx: None,
        });
        Ok(id)
    }

    pub fn register_factvar(&mut self, name: &str, flags: VarFlags) -> TaggedId {
        let id = self.factvar_names.intern(name);
        if id.index() == self.factvars.len() {
            self.factvars.push(Variable::new(id, name, flags));
        } else {
            self.factvars[id.index()].flags = self.factvars[id.index()].flags.union(flags);
        }
        id
    }

    pub fn register_dresvar(&mut self, name: &str) -> TaggedId {
        let id = self.dresvar_names.intern(name);
        if id.index() == self.dresvars.len() {
            self.dresvars.push(Variable::new(id, name, VarFlags::NONE));
        }
        id
    }

    pub fn target(&self, id: TaggedId) -> Option<&Target> {
        self.targets.get(id.index())?.as_ref()
    }

    pub fn target_mut(&mut self, id: TaggedId) -> Option<&mut Target> {
        self.targets.get_mut(id.index())?.as_mut()
    }

    pub fn factvar(&self, id: TaggedId) -> Option<&Variable> {
        self.factvars.get(id.index())
    }

    pub fn factvar_mut(&mut self, id: TaggedId) -> Option<&mut Variable> {
        self.factvars.get_mut(id.index())
    }

    pub fn dresvar(&self, id: TaggedId) -> Option<&Variable> {
        self.dresvars.get(id.index())
    }

    pub fn dresvar_mut(&mut self, id: TaggedId) -> Option<&mut Variable> {
        self.dresvars.get_mut(id.index())
    }

    pub fn target_lookup(&self, name: &str) -> Option<TaggedId> {
        self.target_names.lookup(name)
    }

    pub fn factvar_lookup(&self, name: &str) -> Option<TaggedId> {
        self.factvar_names.lookup(name)
    }

    pub fn dresvar_lookup(&self, name: &str) -> Option<TaggedId> {
        self.dresvar_names.lookup(name)
    }

    pub fn name_of(&self, id: TaggedId) -> Option<String> {
        match id.type_tag() {
            TypeTag::Target => self.target(id).map(|t| t.name.clone()),
            TypeTag::FactVar => self.factvar(id).map(|v| v.name.clone()),
            TypeTag::DresVar => self.dresvar(id).map(|v| v.name.clone()),
            TypeTag::Literal => None,
        }
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn factvar_count(&self) -> usize {
        self.factvars.len()
    }

    pub fn dresvar_count(&self) -> usize {
        self.dresvars.len()
    }

    pub fn targets_iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter().filter_map(|t| t.as_ref())
    }

    pub fn targets_iter_mut(&mut self) -> impl Iterator<Item = &mut Target> {
        self.targets.iter_mut().filter_map(|t| t.as_mut())
    }

    pub fn dresvars_iter_mut(&mut self) -> impl Iterator<Item = &mut Variable> {
        self.dresvars.iter_mut()
    }

    /// Names of every `PREREQ`-flagged fact variable (§3.3, §4.7 step 3):
    /// the patterns the engine's change-view watches.
    pub fn prereq_factvar_names(&self) -> Vec<String> {
        self.factvars
            .iter()
            .filter(|v| v.flags.contains(VarFlags::PREREQ))
            .map(|v| v.name.clone())
            .collect()
    }

    /// Check every registered action's method name against `has_binding`
    /// (§6.2's `finalize()`). Returns the first unresolved `(method, target)`
    /// pair found, if any.
    pub fn first_unresolved_method(
        &self,
        has_binding: impl Fn(&str) -> bool,
    ) -> Option<(String, String)> {
        for target in self.targets_iter() {
            for action in &target.actions {
                if !has_binding(&action.name) {
                    return Some((action.name.clone(), target.name.clone()));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_declared_target_id_is_stable_across_registration() {
        let mut tables = Tables::new();
        let forward = tables.target_id("b");
        let id = tables
            .register_target("b", vec![], vec![])
            .expect("first registration succeeds");
        assert_eq!(forward, id);
    }

    #[test]
    fn re_registering_a_target_is_rejected() {
        let mut tables = Tables::new();
        tables.register_target("a", vec![], vec![]).unwrap();
        assert!(matches!(
            tables.register_target("a", vec![], vec![]),
            Err(crate::error::ResolverError::DuplicateTarget { .. })
        ));
    }

    #[test]
    fn registering_a_factvar_twice_merges_flags() {
        let mut tables = Tables::new();
        let a = tables.register_factvar("$x", VarFlags::NONE);
        let b = tables.register_factvar("$x", VarFlags::PREREQ);
        assert_eq!(a, b);
        assert!(tables.factvar(a).unwrap().flags.contains(VarFlags::PREREQ));
    }

    #[test]
    fn prereq_factvar_names_only_lists_flagged_variables() {
        let mut tables = Tables::new();
        tables.register_factvar("$tracked", VarFlags::PREREQ);
        tables.register_factvar("$untracked", VarFlags::NONE);
        assert_eq!(tables.prereq_factvar_names(), vec!["$tracked".to_string()]);
    }
}
