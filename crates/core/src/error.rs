//! The exit/error code convention shared by every crate in the workspace (§6.6).
//!
//! Positive: success with a truthy result. Zero: silent failure. Negative:
//! exception, whose absolute value is a category code. [`ErrorCategory`]
//! enumerates those categories; [`DresError`] is the crate-wide error type
//! that carries one plus a free-text message and optional local-variable
//! dump for logging (§7).

use thiserror::Error;

/// Category codes for the negative (exception) exit-code convention of §6.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rule-file parsing — out of scope for this crate; surfaces only as a
    /// misuse error (e.g. `finalize()` called out of order).
    Parse = 1,
    /// A method name referenced by an action has no registered handler.
    UnresolvedMethod = 2,
    /// The dependency graph for a goal contains a cycle.
    Cycle = 3,
    /// `update_goal` named a target that was never registered.
    UndefinedTarget = 4,
    /// A VM runtime error: type mismatch, arity mismatch, out-of-range
    /// local, missing required field, and the like.
    VmRuntime = 5,
    /// The fact-store adapter reported an I/O failure.
    StoreIo = 6,
}

impl ErrorCategory {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// The crate-wide error type. `category` is `None` for errors that have no
/// exit-code category of their own (e.g. a silent method failure, which is
/// represented at the call site as `Ok(Outcome::Silent)`, not as a `DresError`).
#[derive(Debug, Error)]
#[error("{category:?}: {message}")]
pub struct DresError {
    pub category: ErrorCategory,
    pub message: String,
    /// Local-variable dump captured at the point of failure, for the
    /// error-level log required by §7 ("exception: error + locals dump").
    pub locals_dump: Option<String>,
}

impl DresError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        DresError {
            category,
            message: message.into(),
            locals_dump: None,
        }
    }

    pub fn with_locals_dump(mut self, dump: impl Into<String>) -> Self {
        self.locals_dump = Some(dump.into());
        self
    }

    /// The §6.6 exit code: negative category code.
    pub fn exit_code(&self) -> i32 {
        -self.category.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_is_negative_category() {
        let e = DresError::new(ErrorCategory::Cycle, "A -> B -> A");
        assert_eq!(e.exit_code(), -3);
    }
}
