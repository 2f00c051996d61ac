//! dres-resolver: the dependency graph builder, the topological sort, and
//! the resolver engine (C6/C7/C8) that ties [`dres_store`]'s fact store and
//! [`dres_vm`]'s interpreter together behind one `update_goal` call.
//!
//! - `tables`: [`tables::Tables`], the target/fact-variable/dres-variable
//!   name spaces (C1 detail) and the rule-file binding API (§6.2).
//! - `graph`: [`graph::build_graph`], the transitive dependency DAG builder
//!   (C6, §4.5).
//! - `toposort`: [`toposort::toposort`], Kahn's algorithm over that graph
//!   (C7, §4.6).
//! - `engine`: [`engine::ResolverEngine`], the `resolve(goal)` procedure
//!   (C8, §4.7).
//! - `error`: [`error::ResolverError`].

pub mod engine;
pub mod error;
pub mod graph;
pub mod tables;
pub mod toposort;

pub use engine::{GoalOutcome, ResolverEngine};
pub use error::ResolverError;
pub use graph::{build_graph, DepGraph};
pub use tables::{Action, Target, Tables, VarFlags, Variable};
pub use toposort::toposort as topological_sort;
