//! Pattern views: the change-detection half of the Fact Store Adapter (§6.1).
//!
//! A view is opened over a set of patterns (here, fact structure names) and
//! reports which of them have changed since the view was created or last
//! reset. The resolver engine polls exactly one such view per `resolve()`
//! pass (§4.7 step 3) to stamp fact variables that changed.

use crate::fact::FactHandle;

/// One pattern (by fact structure name) having changed, with the handles of
/// the facts of that name currently in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub pattern_name: String,
    pub facts: Vec<FactHandle>,
}

/// A view opened by [`crate::adapter::FactStore::transparent_view`].
pub trait FactView {
    /// Patterns whose matching facts have changed since the view was
    /// created or last reset. Does not mutate the view's baseline.
    fn changes(&self) -> Vec<PatternMatch>;

    /// Re-baseline: after this call, `changes()` reports nothing until a
    /// further mutation touches a watched pattern.
    fn reset_changes(&mut self);
}
