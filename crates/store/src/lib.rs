//! dres-store: the Fact Store Adapter boundary (§6.1) and an in-memory
//! reference implementation.
//!
//! - `adapter`: the [`adapter::FactStore`] trait every resolver/VM is
//!   generic over.
//! - `fact`: [`fact::Fact`] and [`fact::FactHandle`].
//! - `view`: change-detecting pattern views (§4.7 step 3).
//! - `memory`: [`memory::MemoryStore`], the in-memory reference adapter.
//! - `path`: the console-facing Variable Addressing Grammar (§6.5).
//! - `error`: [`error::StoreError`].

pub mod adapter;
pub mod error;
pub mod fact;
pub mod memory;
pub mod path;
pub mod view;

pub use adapter::FactStore;
pub use error::StoreError;
pub use fact::{Fact, FactHandle, ORPHAN_STRUCTURE_NAME};
pub use memory::MemoryStore;
pub use path::{parse_fact_path, FactPath, PathError};
pub use view::{FactView, PatternMatch};
