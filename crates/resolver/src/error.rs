//! `ResolverError`: the resolver's own error taxonomy (§7), layered over
//! [`dres_vm::VmError`] and [`dres_store::StoreError`] the way the teacher
//! layers `CodeGenError` under its sub-errors.

use dres_core::ErrorCategory;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("target '{name}' is not registered")]
    UndefinedTarget { name: String },

    /// Not one of §7's taxonomy rows verbatim — a misuse of the two-phase
    /// registration API (§6.2), surfaced under the same "Parse error"
    /// category as other load-time ordering mistakes (SPEC_FULL.md §7).
    #[error("target '{name}' is already registered")]
    DuplicateTarget { name: String },

    #[error("dependency cycle: {residuals:?} could not be ordered")]
    Cycle { residuals: Vec<String> },

    #[error("action method '{name}' (target '{target}') has no registered handler")]
    UnresolvedMethod { name: String, target: String },

    #[error(transparent)]
    Vm(#[from] dres_vm::VmError),

    #[error(transparent)]
    Store(#[from] dres_store::StoreError),
}

impl ResolverError {
    /// The §6.6 exit-code category this error reports under.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ResolverError::UndefinedTarget { .. } => ErrorCategory::UndefinedTarget,
            ResolverError::DuplicateTarget { .. } => ErrorCategory::Parse,
            ResolverError::Cycle { .. } => ErrorCategory::Cycle,
            ResolverError::UnresolvedMethod { .. } => ErrorCategory::UnresolvedMethod,
            ResolverError::Vm(_) => ErrorCategory::VmRuntime,
            ResolverError::Store(_) => ErrorCategory::StoreIo,
        }
    }

    /// The §6.6 exit code: negative category code.
    pub fn exit_code(&self) -> i32 {
        -self.category().code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_reports_the_cycle_category() {
        let e = ResolverError::Cycle {
            residuals: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(e.category(), ErrorCategory::Cycle);
        assert_eq!(e.exit_code(), -3);
    }
}
