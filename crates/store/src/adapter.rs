//! The Fact Store Adapter trait (§6.1): the boundary to the external
//! structured-data store. The resolver and VM are generic over this trait
//! rather than depending on any concrete backend — the production backend
//! is an external collaborator (§1); [`crate::memory::MemoryStore`] is the
//! in-memory reference implementation used by tests and the CLI demo.

use crate::error::StoreError;
use crate::fact::{Fact, FactHandle};
use crate::view::FactView;
use dres_core::FactValue;

pub trait FactStore {
    type View: FactView;

    /// All facts currently stored under `name`.
    fn lookup_by_name(&self, name: &str) -> Vec<FactHandle>;

    /// Allocate a new, unattached (orphan) fact. Not visible to
    /// `lookup_by_name` until [`FactStore::insert`] promotes it.
    fn new_fact(&mut self, name: &str) -> FactHandle;

    /// Promote an orphan fact into the store, or overwrite an existing
    /// fact's record if the handle is already known.
    fn insert(&mut self, fact: Fact) -> Result<(), StoreError>;

    fn remove(&mut self, handle: FactHandle) -> Result<(), StoreError>;

    fn remove_by_name(&mut self, name: &str) -> Result<(), StoreError>;

    fn get_field(&self, handle: FactHandle, field: &str) -> Result<Option<FactValue>, StoreError>;

    fn set_field(
        &mut self,
        handle: FactHandle,
        field: &str,
        value: FactValue,
    ) -> Result<(), StoreError>;

    /// A snapshot of a fact's full record (used by `FILTER`/`GET_FIELD`).
    fn fact(&self, handle: FactHandle) -> Option<Fact>;

    /// Open a change-detecting view over the named patterns (§6.1).
    fn transparent_view(&mut self, patterns: Vec<String>) -> Self::View;

    /// Push a new transaction scope. Mutations after this call are undone
    /// in full by a matching `transaction_pop(true)`.
    fn transaction_push(&mut self);

    /// Pop the innermost transaction scope, committing (`rollback = false`)
    /// or discarding (`rollback = true`) every mutation made inside it.
    fn transaction_pop(&mut self, rollback: bool) -> Result<(), StoreError>;
}
