//! `VmError`: the interpreter's own error taxonomy (§7), layered under
//! [`dres_store::StoreError`] the way the teacher layers `CodeGenError`
//! under its own sub-errors.

use dres_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("stack underflow: needed {needed} entries, had {had}")]
    StackUnderflow { needed: usize, had: usize },

    #[error("local index {idx} out of range for scope of arity {arity}")]
    ScopeOutOfRange { idx: u32, arity: u32 },

    #[error("no scope is open")]
    NoOpenScope,

    #[error("method '{name}' is not registered and no default handler is set")]
    UnknownMethod { name: String },

    #[error("method '{name}' is already registered")]
    DuplicateMethod { name: String },

    #[error("global '{name}' did not resolve to any fact")]
    UnresolvedGlobal { name: String },

    #[error("cross-type ordered comparison is undefined")]
    Incomparable,

    #[error("chunk is malformed at word {offset}: {reason}")]
    MalformedChunk { offset: usize, reason: String },

    #[error("fact store error: {0}")]
    Store(#[from] StoreError),
}
