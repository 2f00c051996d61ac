//! The interpreter loop (C4): decodes one word, dispatches, advances the
//! program counter. Arithmetic is not a first-class opcode — all
//! computation goes out through `CALL` (§4.1).

use crate::chunk::{BranchKind, Chunk, Instr, RelOp};
use crate::error::VmError;
use crate::failure::{HandlerFrame, Outcome};
use crate::global::{Global, ORPHAN_NAME};
use crate::methods::{MethodOutcome, MethodTable};
use crate::scope::{Scope, ScopeChain};
use crate::stack::{Stack, StackValue};
use dres_core::{ErrorCategory, FactValue};
use dres_store::{Fact, FactStore};

/// The VM's full mutable state: stack, scope chain, and method table. A
/// fresh `Interpreter` is created per [`dres_resolver`] action run; it does
/// not itself hold a fact-store reference (that's passed in per call, kept
/// generic over [`FactStore`] so the VM never depends on a concrete
/// backend, §6.1).
#[derive(Default)]
pub struct Interpreter {
    stack: Stack,
    scopes: ScopeChain,
    methods: MethodTable,
    /// Context string set by the most recent `DEBUG`, attached to the next
    /// exception's log line (§4.1, §7).
    debug_context: Option<String>,
}

impl Interpreter {
    pub fn new(methods: MethodTable) -> Self {
        Interpreter {
            stack: Stack::new(),
            scopes: ScopeChain::new(),
            methods,
            debug_context: None,
        }
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.depth()
    }

    /// Method Registration (§6.4): `add_method`/`remove_method`/`set_default`
    /// delegate straight to the interpreter's own [`MethodTable`] — the
    /// resolver engine has no separate method table of its own.
    pub fn add_method(&mut self, name: &str, handler: crate::methods::Handler) -> Result<(), VmError> {
        self.methods.add_method(name, handler)
    }

    pub fn remove_method(&mut self, name: &str) {
        self.methods.remove_method(name);
    }

    pub fn set_default_method(&mut self, handler: crate::methods::Handler) {
        self.methods.set_default(handler);
    }

    pub fn has_method_binding(&self, name: &str) -> bool {
        self.methods.has_binding_for(name)
    }

    /// Run `chunk` to completion. This call is itself one structured-failure
    /// handler frame (§4.3): on any outcome other than `Success`, the stack
    /// and scope chain are restored to exactly what they were on entry
    /// before returning, so a caller re-driving the interpreter (e.g. the
    /// resolver engine running the next target) never observes leftover
    /// state from a failed run.
    pub fn run_chunk(
        &mut self,
        chunk: &Chunk,
        store: &mut impl FactStore,
        initial_locals: Vec<StackValue>,
    ) -> Outcome {
        let frame = HandlerFrame {
            stack_depth: self.stack.depth(),
            scope_depth: self.scopes.depth(),
        };
        self.scopes.push(Scope::new(initial_locals));

        let outcome = self.dispatch(chunk, store);

        self.stack.truncate_to(frame.stack_depth);
        self.scopes.truncate_to(frame.scope_depth);
        outcome
    }

    fn dispatch(&mut self, chunk: &Chunk, store: &mut impl FactStore) -> Outcome {
        let mut pc = 0usize;
        loop {
            let (instr, consumed) = match chunk.decode_at(pc) {
                Ok(v) => v,
                Err(e) => {
                    return self.exception(VmError::MalformedChunk {
                        offset: pc,
                        reason: e.to_string(),
                    })
                }
            };

            match self.step(&instr, store) {
                Ok(StepResult::Continue) => pc += consumed,
                Ok(StepResult::Jump(disp)) => {
                    let next = (pc + consumed) as i64 + disp as i64;
                    if next < 0 {
                        return self.exception(VmError::MalformedChunk {
                            offset: pc,
                            reason: "branch displacement landed before the start of the chunk"
                                .to_string(),
                        });
                    }
                    pc = next as usize;
                }
                Ok(StepResult::Halt) => {
                    let value = self.stack.pop().unwrap_or(StackValue::Integer(1));
                    return Outcome::Success(value);
                }
                Ok(StepResult::Silent) => return Outcome::Silent,
                Ok(StepResult::Exception { code, message }) => {
                    return Outcome::Exception {
                        code,
                        message,
                        context: self.debug_context.clone(),
                    }
                }
                Err(e) => return self.exception(e),
            }

            if pc > chunk.len() {
                return self.exception(VmError::MalformedChunk {
                    offset: pc,
                    reason: "program counter ran past the end of the chunk".to_string(),
                });
            }
            if pc == chunk.len() {
                // Fell off the end without HALT: treat as an implicit success.
                return Outcome::Success(StackValue::Integer(1));
            }
        }
    }

    fn exception(&self, err: VmError) -> Outcome {
        Outcome::Exception {
            code: ErrorCategory::VmRuntime.code(),
            message: err.to_string(),
            context: self.debug_context.clone(),
        }
    }

    fn step(&mut self, instr: &Instr, store: &mut impl FactStore) -> Result<StepResult, VmError> {
        match instr {
            Instr::PushNil => self.stack.push(StackValue::Nil),
            Instr::PushInt(v) => self.stack.push(StackValue::Integer(*v)),
            Instr::PushDouble(v) => self.stack.push(StackValue::Double(*v)),
            Instr::PushString(s) => self.stack.push(StackValue::String(s.clone())),
            Instr::PushGlobal(name) => {
                let handles = store.lookup_by_name(name);
                let global = if handles.is_empty() {
                    Global::unresolved(name.clone())
                } else {
                    Global::bound(name.clone(), handles)
                };
                self.stack.push(StackValue::Global(global));
            }
            Instr::PushLocals(n) => {
                let n = *n as usize;
                if self.stack.depth() < n {
                    return Err(VmError::StackUnderflow {
                        needed: n,
                        had: self.stack.depth(),
                    });
                }
                let mut slots = Vec::with_capacity(n);
                for _ in 0..n {
                    slots.push(self.pop()?);
                }
                slots.reverse();
                self.scopes.push(Scope::new(slots));
            }
            Instr::PopLocals => {
                self.scopes.pop()?;
            }
            Instr::PopDiscard => {
                self.pop()?;
            }
            Instr::Filter(n) => self.op_filter(*n, store)?,
            Instr::Update { n, partial } => self.op_update(*n, *partial, store)?,
            Instr::Replace(n) => self.op_replace(*n, store)?,
            Instr::Create(n) => self.op_create(*n, store)?,
            Instr::Set => self.op_set(store)?,
            Instr::SetField => self.op_set_field(store)?,
            Instr::GetField => self.op_get_field(store)?,
            Instr::GetLocal(idx) => {
                let value = self.scopes.current()?.get(*idx)?.clone();
                self.stack.push(value);
            }
            Instr::Call(n) => return self.op_call(*n),
            Instr::Cmp(op) => self.op_cmp(*op)?,
            Instr::Branch { kind, disp } => return self.op_branch(*kind, *disp),
            Instr::Debug(text) => self.debug_context = Some(text.clone()),
            Instr::Halt => return Ok(StepResult::Halt),
        }
        Ok(StepResult::Continue)
    }

    fn pop(&mut self) -> Result<StackValue, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow {
            needed: 1,
            had: 0,
        })
    }

    fn pop_string(&mut self) -> Result<String, VmError> {
        match self.pop()? {
            StackValue::String(s) => Ok(s),
            other => Err(VmError::TypeMismatch {
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    fn pop_global(&mut self) -> Result<Global, VmError> {
        match self.pop()? {
            StackValue::Global(g) => Ok(g),
            other => Err(VmError::TypeMismatch {
                expected: "global",
                found: other.type_name(),
            }),
        }
    }

    fn pop_fact_value(&mut self) -> Result<FactValue, VmError> {
        let v = self.pop()?;
        v.as_fact_value().ok_or(VmError::TypeMismatch {
            expected: "string, integer or double",
            found: v.type_name(),
        })
    }

    fn pop_pairs(&mut self, n: u32) -> Result<Vec<(String, FactValue)>, VmError> {
        let mut pairs = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let value = self.pop_fact_value()?;
            let field = self.pop_string()?;
            pairs.push((field, value));
        }
        pairs.reverse();
        Ok(pairs)
    }

    fn op_filter(&mut self, n: u32, store: &mut impl FactStore) -> Result<(), VmError> {
        let pairs = self.pop_pairs(n)?;
        let global = self.pop_global()?;
        let mut matched = Vec::new();
        for handle in global.facts() {
            if let Some(fact) = store.fact(*handle) {
                if fact.matches_all(&pairs) {
                    matched.push(*handle);
                }
            }
        }
        self.stack
            .push(StackValue::Global(Global::bound(global.name(), matched)));
        Ok(())
    }

    /// `UPDATE <n, partial>`: assign matching fields on each fact already in
    /// the global. `partial` preserves fields not named by the selector;
    /// non-partial clears the fact's field set first. Set membership is
    /// untouched either way — unlike `REPLACE`, no fact is removed from the
    /// store.
    fn op_update(&mut self, n: u32, partial: bool, store: &mut impl FactStore) -> Result<(), VmError> {
        let pairs = self.pop_pairs(n)?;
        let global = self.pop_global()?;
        for handle in global.facts() {
            if partial {
                for (field, value) in &pairs {
                    store.set_field(*handle, field, value.clone())?;
                }
            } else {
                let mut fact = store
                    .fact(*handle)
                    .ok_or_else(|| VmError::Store(dres_store::StoreError::Missing {
                        name: format!("<handle {}>", handle.0),
                    }))?;
                fact.fields.clear();
                for (field, value) in &pairs {
                    fact.set_field(field, value.clone());
                }
                store.insert(fact)?;
            }
        }
        Ok(())
    }

    /// `REPLACE <n>`: substitutes the fact *set* wholesale with the filtered
    /// new values (§4.1) — distinct from `UPDATE <n, false>`, which only
    /// rewrites the fields of the facts already surviving in the global.
    /// Any fact stored under the global's name but absent from its (already
    /// filtered) handle set is removed from the store; the survivors have
    /// their fields substituted wholesale with the given pairs.
    fn op_replace(&mut self, n: u32, store: &mut impl FactStore) -> Result<(), VmError> {
        let pairs = self.pop_pairs(n)?;
        let global = self.pop_global()?;
        let kept: std::collections::HashSet<_> = global.facts().iter().copied().collect();
        if !global.is_orphan() {
            for handle in store.lookup_by_name(global.name()) {
                if !kept.contains(&handle) {
                    store.remove(handle)?;
                }
            }
        }
        for handle in global.facts() {
            let mut fact = store
                .fact(*handle)
                .ok_or_else(|| VmError::Store(dres_store::StoreError::Missing {
                    name: format!("<handle {}>", handle.0),
                }))?;
            fact.fields.clear();
            for (field, value) in &pairs {
                fact.set_field(field, value.clone());
            }
            store.insert(fact)?;
        }
        Ok(())
    }

    fn op_create(&mut self, n: u32, store: &mut impl FactStore) -> Result<(), VmError> {
        let pairs = self.pop_pairs(n)?;
        let handle = store.new_fact(ORPHAN_NAME);
        for (field, value) in &pairs {
            store.set_field(handle, field, value.clone())?;
        }
        self.stack.push(StackValue::Global(Global::orphan(handle)));
        Ok(())
    }

    fn op_set(&mut self, store: &mut impl FactStore) -> Result<(), VmError> {
        let name = self.pop_string()?;
        let global = self.pop_global()?;
        let renamed: Vec<Fact> = global
            .facts()
            .iter()
            .filter_map(|h| store.fact(*h))
            .map(|mut fact| {
                fact.name = name.clone();
                fact
            })
            .collect();
        let handles: Vec<_> = renamed.iter().map(|f| f.handle).collect();
        for fact in renamed {
            store.insert(fact)?;
        }
        self.stack
            .push(StackValue::Global(Global::bound(name, handles)));
        Ok(())
    }

    fn op_set_field(&mut self, store: &mut impl FactStore) -> Result<(), VmError> {
        let value = self.pop_fact_value()?;
        let field = self.pop_string()?;
        let global = self.pop_global()?;
        let was_orphan = global.is_orphan();
        for handle in global.facts() {
            store.set_field(*handle, &field, value.clone())?;
        }
        if was_orphan {
            for handle in global.facts() {
                if let Some(fact) = store.fact(*handle) {
                    store.insert(fact)?;
                }
            }
        }
        self.stack.push(StackValue::Global(global));
        Ok(())
    }

    fn op_get_field(&mut self, store: &mut impl FactStore) -> Result<(), VmError> {
        let field = self.pop_string()?;
        let global = self.pop_global()?;
        let value = global
            .facts()
            .first()
            .and_then(|h| store.get_field(*h, &field).ok().flatten());
        self.stack.push(match value {
            Some(v) => StackValue::from_fact_value(v),
            None => StackValue::Nil,
        });
        Ok(())
    }

    fn op_call(&mut self, narg: u32) -> Result<StepResult, VmError> {
        let n = narg as usize;
        if self.stack.depth() < n + 1 {
            return Err(VmError::StackUnderflow {
                needed: n + 1,
                had: self.stack.depth(),
            });
        }
        let mut args = Vec::with_capacity(n);
        for _ in 0..n {
            args.push(self.pop()?);
        }
        args.reverse();
        let name = self.pop_string()?;

        match self.methods.call(&name, &args)? {
            MethodOutcome::Success(value) => {
                self.stack.push(value);
                Ok(StepResult::Continue)
            }
            MethodOutcome::Silent => Ok(StepResult::Silent),
            MethodOutcome::Exception { code, message } => {
                Ok(StepResult::Exception { code, message })
            }
        }
    }

    fn op_cmp(&mut self, op: RelOp) -> Result<(), VmError> {
        let result = match op {
            RelOp::Not => {
                let a = self.pop()?;
                !a.is_truthy()
            }
            RelOp::Or => {
                let b = self.pop()?;
                let a = self.pop()?;
                a.is_truthy() || b.is_truthy()
            }
            RelOp::And => {
                let b = self.pop()?;
                let a = self.pop()?;
                a.is_truthy() && b.is_truthy()
            }
            RelOp::Eq | RelOp::Ne => {
                let b = self.pop()?;
                let a = self.pop()?;
                let eq = match (a.as_fact_value(), b.as_fact_value()) {
                    (Some(a), Some(b)) => a.matches(&b),
                    _ => false,
                };
                if op == RelOp::Eq {
                    eq
                } else {
                    !eq
                }
            }
            RelOp::Lt | RelOp::Le | RelOp::Gt | RelOp::Ge => {
                let b = self.pop()?;
                let a = self.pop()?;
                let (a, b) = (
                    a.as_fact_value().ok_or(VmError::Incomparable)?,
                    b.as_fact_value().ok_or(VmError::Incomparable)?,
                );
                let ord = a.partial_compare(&b).ok_or(VmError::Incomparable)?;
                use std::cmp::Ordering::*;
                match op {
                    RelOp::Lt => ord == Less,
                    RelOp::Le => ord != Greater,
                    RelOp::Gt => ord == Greater,
                    RelOp::Ge => ord != Less,
                    _ => unreachable!(),
                }
            }
        };
        self.stack.push(StackValue::Integer(result as i32));
        Ok(())
    }

    fn op_branch(&mut self, kind: BranchKind, disp: i32) -> Result<StepResult, VmError> {
        let take = match kind {
            BranchKind::Always => true,
            BranchKind::IfTrue => self.pop()?.is_truthy(),
            BranchKind::IfFalse => !self.pop()?.is_truthy(),
        };
        Ok(if take {
            StepResult::Jump(disp)
        } else {
            StepResult::Continue
        })
    }
}

enum StepResult {
    Continue,
    /// A branch offset to apply to `pc + consumed` — resolved by the
    /// dispatch loop, which alone knows the current `pc`.
    Jump(i32),
    Halt,
    Silent,
    Exception { code: i32, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use dres_store::MemoryStore;

    fn run(chunk: &Chunk) -> Outcome {
        let mut interp = Interpreter::new(MethodTable::new());
        let mut store = MemoryStore::new();
        interp.run_chunk(chunk, &mut store, vec![])
    }

    #[test]
    fn halt_with_empty_stack_succeeds_with_default_value() {
        let mut c = Chunk::new();
        c.halt();
        assert_eq!(run(&c), Outcome::Success(StackValue::Integer(1)));
    }

    #[test]
    fn branch_always_skips_forward() {
        let mut c = Chunk::new();
        c.branch(BranchKind::Always, 1);
        c.push_int(99); // skipped
        c.halt();
        assert_eq!(run(&c), Outcome::Success(StackValue::Integer(1)));
    }

    #[test]
    fn s5_branch_displacement_changes_whether_the_push_is_skipped() {
        // S5, using "take-if-true" for the condition (see DESIGN.md).
        let mut c0 = Chunk::new();
        c0.push_int(1);
        c0.branch(BranchKind::IfTrue, 0);
        c0.push_int(99);
        c0.halt();
        assert_eq!(run(&c0), Outcome::Success(StackValue::Integer(99)));

        let mut c1 = Chunk::new();
        c1.push_int(1);
        c1.branch(BranchKind::IfTrue, 1);
        c1.push_int(99);
        c1.halt();
        assert_eq!(run(&c1), Outcome::Success(StackValue::Integer(1)));
    }

    #[test]
    fn create_then_set_promotes_the_orphan_under_its_new_name() {
        let mut interp = Interpreter::new(MethodTable::new());
        let mut store = MemoryStore::new();

        let mut c = Chunk::new();
        c.push_string("count"); // field name
        c.push_int(5); // field value
        c.create(1); // -> orphan global, stack: [global]
        c.push_string("widget"); // SET's target name, stack: [global, "widget"]
        c.set(); // pops name then global, stack: [Global::bound("widget", [h])]
        c.halt();

        let outcome = interp.run_chunk(&c, &mut store, vec![]);
        match outcome {
            Outcome::Success(StackValue::Global(g)) => {
                assert_eq!(g.name(), "widget");
                assert_eq!(g.facts().len(), 1);
                let fact = store.fact(g.facts()[0]).unwrap();
                assert_eq!(fact.get_field("count"), Some(&FactValue::Int(5)));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn unwind_restores_stack_height_on_exception() {
        let mut interp = Interpreter::new(MethodTable::new());
        let mut store = MemoryStore::new();
        interp.stack.push(StackValue::Integer(42));
        let depth_before = interp.stack_depth();

        let mut c = Chunk::new();
        c.get_local(0); // no scope is open -> VmError::NoOpenScope -> Exception
        let outcome = interp.run_chunk(&c, &mut store, vec![]);
        assert!(matches!(outcome, Outcome::Exception { .. }));
        assert_eq!(interp.stack_depth(), depth_before);
    }

    #[test]
    fn filter_restricts_global_to_matching_facts() {
        let mut interp = Interpreter::new(MethodTable::new());
        let mut store = MemoryStore::new();
        let h1 = store.new_fact("widget");
        let mut f1 = store.fact(h1).unwrap();
        f1.set_field("size", FactValue::Int(1));
        store.insert(f1).unwrap();
        let h2 = store.new_fact("widget");
        let mut f2 = store.fact(h2).unwrap();
        f2.set_field("size", FactValue::Int(2));
        store.insert(f2).unwrap();

        let mut c = Chunk::new();
        c.push_global("widget");
        c.push_string("size");
        c.push_int(2);
        c.filter(1);
        c.halt();

        let outcome = interp.run_chunk(&c, &mut store, vec![]);
        match outcome {
            Outcome::Success(StackValue::Global(g)) => assert_eq!(g.facts(), &[h2]),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
