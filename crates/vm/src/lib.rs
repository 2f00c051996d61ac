//! dres-vm: the bytecode Chunk format, stack/scope discipline, structured
//! failure handling and the interpreter loop (C3/C4/C5).
//!
//! # Modules
//!
//! - `chunk`: [`chunk::Chunk`], the append-only word buffer plus the
//!   opcode/operand encoding, and [`disasm`] for turning one back into text.
//! - `stack`: [`stack::Stack`] and [`stack::StackValue`], the VM's tagged
//!   operand representation.
//! - `scope`: [`scope::ScopeChain`], the stack of local-variable frames.
//! - `global`: [`global::Global`], a value naming zero or more store facts.
//! - `methods`: [`methods::MethodTable`], the `CALL` dispatch table (C5).
//! - `failure`: [`failure::Outcome`] and [`failure::HandlerFrame`], the
//!   three-way structured-failure model (§4.3, §9).
//! - `interpreter`: [`interpreter::Interpreter`], tying the above into the
//!   dispatch loop (C4).
//! - `error`: [`error::VmError`].

pub mod chunk;
pub mod disasm;
pub mod error;
pub mod failure;
pub mod global;
pub mod interpreter;
pub mod methods;
pub mod scope;
pub mod stack;

pub use chunk::{BranchKind, Chunk, ChunkError, Instr, RelOp, Word};
pub use error::VmError;
pub use failure::{HandlerFrame, Outcome};
pub use global::{Global, ORPHAN_NAME};
pub use interpreter::Interpreter;
pub use methods::{Handler, MethodOutcome, MethodTable};
pub use scope::{Scope, ScopeChain};
pub use stack::{Stack, StackValue};
