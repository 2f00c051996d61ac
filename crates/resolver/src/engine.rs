//! The Resolver Engine (C8, §4.7): ties the dependency graph, the
//! topological sort, the fact store, and the VM together behind one
//! `update_goal` entry point.

use crate::error::ResolverError;
use crate::graph::build_graph;
use crate::tables::{Action, Tables, VarFlags};
use crate::toposort::toposort;
use dres_core::{TaggedId, TypeTag};
use dres_store::{FactStore, FactView};
use dres_vm::{Handler, Interpreter, MethodTable, Outcome};
use tracing::{debug, error, info};

/// The tri-state result of resolving one goal (§6.3). Unlike
/// [`ResolverError`], reaching any of these means the transaction machinery
/// already ran — a `Silent` or `Exception` outcome has already been rolled
/// back by the time the caller sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum GoalOutcome {
    /// Every stale target in the goal's graph executed to completion.
    Success,
    /// An action reported a silent failure (§4.3); the pass rolled back.
    Silent,
    /// An action raised an exception (§4.3); the pass rolled back.
    Exception {
        code: i32,
        message: String,
        locals_dump: Option<String>,
    },
}

/// Ties [`Tables`] (C1), the VM [`Interpreter`] (C4/C5), and a [`FactStore`]
/// backend together behind the one `update_goal` call a caller drives (§6.3).
pub struct ResolverEngine<S: FactStore> {
    tables: Tables,
    interp: Interpreter,
    store: S,
    view: Option<S::View>,
    tracked_patterns: Vec<String>,
    engine_stamp: u64,
    next_txid: u64,
    current_txid: Option<u64>,
}

impl<S: FactStore> ResolverEngine<S> {
    pub fn new(store: S) -> Self {
        ResolverEngine {
            tables: Tables::new(),
            interp: Interpreter::new(MethodTable::new()),
            store,
            view: None,
            tracked_patterns: Vec::new(),
            engine_stamp: 0,
            next_txid: 0,
            current_txid: None,
        }
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn target_id(&mut self, name: &str) -> TaggedId {
        self.tables.target_id(name)
    }

    pub fn register_target(
        &mut self,
        name: &str,
        prereqs: Vec<TaggedId>,
        actions: Vec<Action>,
    ) -> Result<TaggedId, ResolverError> {
        self.tables.register_target(name, prereqs, actions)
    }

    pub fn register_factvar(&mut self, name: &str, flags: VarFlags) -> TaggedId {
        let id = self.tables.register_factvar(name, flags);
        // The tracked pattern set may just have grown; invalidate the view
        // so the next poll opens one over the complete set (§4.7 step 3).
        self.view = None;
        id
    }

    pub fn register_dresvar(&mut self, name: &str) -> TaggedId {
        self.tables.register_dresvar(name)
    }

    /// Method Registration (§6.4).
    pub fn add_method(&mut self, name: &str, handler: Handler) -> Result<(), ResolverError> {
        Ok(self.interp.add_method(name, handler)?)
    }

    pub fn remove_method(&mut self, name: &str) {
        self.interp.remove_method(name);
    }

    pub fn set_default_method(&mut self, handler: Handler) {
        self.interp.set_default_method(handler);
    }

    /// Record a resolver-level dres-variable mutation made outside the VM's
    /// own stack model (no opcode writes a dres-variable directly — §3.3
    /// models them as purely resolver-side state). Snapshots the prior stamp
    /// under the active transaction so a later rollback can undo it, matching
    /// the same invariant targets get.
    pub fn touch_dresvar(&mut self, id: TaggedId) {
        let Some(txid) = self.current_txid else {
            return;
        };
        let stamp = self.engine_stamp;
        if let Some(v) = self.tables.dresvar_mut(id) {
            if v.tx.is_none() {
                v.tx = Some((txid, v.stamp));
            }
            v.stamp = stamp;
        }
    }

    fn ensure_view(&mut self) {
        let patterns = self.tables.prereq_factvar_names();
        if self.view.is_none() || patterns != self.tracked_patterns {
            self.tracked_patterns = patterns.clone();
            self.view = Some(self.store.transparent_view(patterns));
        }
    }

    /// Poll the change-view and stamp every fact variable whose pattern
    /// changed since the last poll (§4.7 step 3).
    fn poll_changes(&mut self) {
        self.ensure_view();
        let stamp = self.engine_stamp;
        let view = self.view.as_mut().expect("ensure_view just set it");
        let changes = view.changes();
        view.reset_changes();
        for pattern in changes {
            if let Some(id) = self.tables.factvar_lookup(&pattern.pattern_name) {
                if let Some(v) = self.tables.factvar_mut(id) {
                    v.stamp = stamp;
                }
            }
        }
    }

    fn effective_stamp(&self, id: TaggedId) -> u64 {
        match id.type_tag() {
            TypeTag::Target => self.tables.target(id).map(|t| t.stamp).unwrap_or(0),
            TypeTag::FactVar => self.tables.factvar(id).map(|v| v.stamp).unwrap_or(0),
            TypeTag::DresVar => self.tables.dresvar(id).map(|v| v.stamp).unwrap_or(0),
            TypeTag::Literal => 0,
        }
    }

    fn is_stale(&self, id: TaggedId) -> bool {
        let target = self.tables.target(id).expect("caller verified the id names a target");
        target.stamp == 0
            || target
                .prereqs
                .iter()
                .any(|&p| self.effective_stamp(p) > target.stamp)
    }

    fn rollback(&mut self, txid: u64, touched: &[TaggedId]) {
        let _ = self.store.transaction_pop(true);
        for &id in touched {
            match id.type_tag() {
                TypeTag::Target => {
                    if let Some(t) = self.tables.target_mut(id) {
                        if let Some((tx, stamp)) = t.tx.take() {
                            if tx == txid {
                                t.stamp = stamp;
                            }
                        }
                    }
                }
                TypeTag::DresVar => {
                    if let Some(v) = self.tables.dresvar_mut(id) {
                        if let Some((tx, stamp)) = v.tx.take() {
                            if tx == txid {
                                v.stamp = stamp;
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        self.current_txid = None;
    }

    fn commit(&mut self, touched: &[TaggedId]) -> Result<(), ResolverError> {
        self.store.transaction_pop(false)?;
        for &id in touched {
            match id.type_tag() {
                TypeTag::Target => {
                    if let Some(t) = self.tables.target_mut(id) {
                        t.tx = None;
                    }
                }
                TypeTag::DresVar => {
                    if let Some(v) = self.tables.dresvar_mut(id) {
                        v.tx = None;
                    }
                }
                _ => {}
            }
        }
        self.current_txid = None;
        Ok(())
    }

    /// Resolve `goal_name` (§4.7's `resolve(goal)` procedure):
    ///
    /// 1. Look up the goal and check every action's method is bound —
    ///    neither needs a transaction, so both abort before one opens.
    /// 2. Advance the engine stamp and open a transaction.
    /// 3. Poll the change-view, stamping prerequisite fact variables that
    ///    changed externally since the last pass.
    /// 4. Build the dependency graph and topologically sort it.
    /// 5. Walk the order; execute each stale target's actions in sequence.
    /// 6. On any non-`Success` action outcome, roll back every target and
    ///    dres-variable stamp touched this pass and report the outcome.
    /// 7. Once every target in the order has run (or was skipped as fresh),
    ///    commit.
    pub fn update_goal(&mut self, goal_name: &str) -> Result<GoalOutcome, ResolverError> {
        let goal = self
            .tables
            .target_lookup(goal_name)
            .ok_or_else(|| ResolverError::UndefinedTarget {
                name: goal_name.to_string(),
            })?;

        if let Some((method, target)) = self
            .tables
            .first_unresolved_method(|name| self.interp.has_method_binding(name))
        {
            error!(method = %method, target = %target, "action method has no registered handler");
            return Err(ResolverError::UnresolvedMethod {
                name: method,
                target,
            });
        }

        self.engine_stamp += 1;
        let txid = self.next_txid;
        self.next_txid += 1;
        self.current_txid = Some(txid);
        self.store.transaction_push();
        debug!(goal = goal_name, stamp = self.engine_stamp, txid, "transaction opened");

        self.poll_changes();

        let graph = build_graph(goal, &self.tables).inspect_err(|e| {
            error!(goal = goal_name, error = %e, "dependency graph could not be built");
        })?;
        let order = toposort(&graph, &self.tables).inspect_err(|e| {
            error!(goal = goal_name, error = %e, "cycle detected");
        })?;

        let mut touched: Vec<TaggedId> = Vec::new();
        for id in order {
            if id.type_tag() != TypeTag::Target {
                continue;
            }
            let name = self.tables.name_of(id).unwrap_or_default();
            if !self.is_stale(id) {
                debug!(target = %name, "target is fresh, skipped");
                continue;
            }

            if let Some(t) = self.tables.target_mut(id) {
                if t.tx.is_none() {
                    t.tx = Some((txid, t.stamp));
                    touched.push(id);
                }
            }

            let actions: Vec<Action> = self
                .tables
                .target(id)
                .map(|t| t.actions.clone())
                .unwrap_or_default();

            for action in &actions {
                let outcome = self.interp.run_chunk(&action.chunk, &mut self.store, Vec::new());
                match outcome {
                    Outcome::Success(_) => {}
                    Outcome::Silent => {
                        info!(target = %name, action = %action.name, "action reported a silent failure, rolling back");
                        self.rollback(txid, &touched);
                        return Ok(GoalOutcome::Silent);
                    }
                    Outcome::Exception {
                        code,
                        message,
                        context,
                    } => {
                        error!(
                            target = %name,
                            action = %action.name,
                            code,
                            message = %message,
                            locals_dump = ?context,
                            "action raised an exception, rolling back"
                        );
                        self.rollback(txid, &touched);
                        return Ok(GoalOutcome::Exception {
                            code,
                            message,
                            locals_dump: context,
                        });
                    }
                }
            }

            if let Some(t) = self.tables.target_mut(id) {
                t.stamp = self.engine_stamp;
            }
            debug!(target = %name, "target executed");
        }

        self.commit(&touched)?;
        debug!(goal = goal_name, txid, "transaction committed");
        Ok(GoalOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dres_store::MemoryStore;
    use dres_vm::{Chunk, MethodOutcome, StackValue};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine() -> ResolverEngine<MemoryStore> {
        ResolverEngine::new(MemoryStore::new())
    }

    #[test]
    fn a_fresh_linear_chain_executes_every_target_once() {
        let mut e = engine();
        let log = Rc::new(RefCell::new(Vec::<String>::new()));

        let make_action = |name: &str| {
            let mut chunk = Chunk::new();
            chunk.push_string("record");
            chunk.push_string(name);
            chunk.call(1);
            chunk.halt();
            Action::new("record", chunk)
        };

        let log_a = log.clone();
        e.add_method(
            "record",
            Rc::new(move |_, args| {
                if let Some(StackValue::String(s)) = args.first() {
                    log_a.borrow_mut().push(s.clone());
                }
                MethodOutcome::Success(StackValue::Nil)
            }),
        )
        .unwrap();

        let a = e.register_target("A", vec![], vec![make_action("A")]).unwrap();
        let b = e.register_target("B", vec![a], vec![make_action("B")]).unwrap();
        e.register_target("C", vec![b], vec![make_action("C")]).unwrap();

        let outcome = e.update_goal("C").unwrap();
        assert_eq!(outcome, GoalOutcome::Success);
        assert_eq!(*log.borrow(), vec!["A".to_string(), "B".to_string(), "C".to_string()]);
    }

    #[test]
    fn a_second_pass_with_nothing_changed_re_runs_nothing() {
        let mut e = engine();
        let count = Rc::new(RefCell::new(0u32));
        let count_cb = count.clone();

        let mut chunk = Chunk::new();
        chunk.push_string("noop");
        chunk.call(0);
        chunk.halt();
        e.set_default_method(Rc::new(move |_, _| {
            *count_cb.borrow_mut() += 1;
            MethodOutcome::Success(StackValue::Nil)
        }));
        e.register_target("only", vec![], vec![Action::new("noop", chunk)])
            .unwrap();

        e.update_goal("only").unwrap();
        e.update_goal("only").unwrap();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn undefined_goal_is_rejected_before_any_transaction_opens() {
        let mut e = engine();
        assert!(matches!(
            e.update_goal("nope"),
            Err(ResolverError::UndefinedTarget { .. })
        ));
    }

    #[test]
    fn unresolved_method_aborts_before_a_transaction_opens() {
        let mut e = engine();
        let mut chunk = Chunk::new();
        chunk.halt();
        e.register_target("t", vec![], vec![Action::new("missing", chunk)])
            .unwrap();
        assert!(matches!(
            e.update_goal("t"),
            Err(ResolverError::UnresolvedMethod { .. })
        ));
    }

    #[test]
    fn an_exception_rolls_back_the_pass_and_leaves_the_target_stamp_untouched() {
        let mut e = engine();
        e.set_default_method(Rc::new(|_, _| MethodOutcome::Exception {
            code: -7,
            message: "boom".to_string(),
        }));
        let mut chunk = Chunk::new();
        chunk.push_string("fail");
        chunk.call(0);
        chunk.halt();
        e.register_target("t", vec![], vec![Action::new("fail", chunk)])
            .unwrap();

        let outcome = e.update_goal("t").unwrap();
        assert_eq!(
            outcome,
            GoalOutcome::Exception {
                code: -7,
                message: "boom".to_string(),
                locals_dump: None,
            }
        );
        assert_eq!(e.tables().target(e.target_id("t")).unwrap().stamp, 0);
    }

    #[test]
    fn a_cycle_surfaces_as_a_resolver_error_not_a_goal_outcome() {
        let mut e = engine();
        let a_fwd = e.target_id("a");
        let b = e.register_target("b", vec![a_fwd], vec![]).unwrap();
        e.register_target("a", vec![b], vec![]).unwrap();
        assert!(matches!(e.update_goal("a"), Err(ResolverError::Cycle { .. })));
    }
}
