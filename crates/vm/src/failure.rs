//! Structured failure (C4, §4.3): three outcomes instead of panics or
//! setjmp/longjmp (§9) — `Success`, silent `Fail`, and `Exception`.
//!
//! There is no `TRY`/`CATCH` opcode; the handler is the interpreter's own
//! dispatch loop. Every [`crate::interpreter::Interpreter::run_chunk`] call
//! installs one handler frame (a `(stack_depth, scope_depth)` snapshot) and
//! unwinds to it on any non-`Success` outcome before returning — so a
//! nested `CALL` whose handler itself reenters the VM gets its own nested
//! frame for free, by ordinary Rust call-stack nesting.

use crate::stack::StackValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(StackValue),
    /// No message logged; the enclosing transaction rolls back but
    /// resolution of the rest of the goal continues (§4.3, §7).
    Silent,
    /// An error code plus message and optional context string set by the
    /// most recent `DEBUG` instruction, for the locals-dump log (§4.3, §7).
    Exception {
        code: i32,
        message: String,
        context: Option<String>,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

/// A handler frame's entry snapshot (§4.3): the stack height and scope
/// depth to restore to on any failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerFrame {
    pub stack_depth: usize,
    pub scope_depth: usize,
}
