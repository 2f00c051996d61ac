//! Dependency Graph Builder (C6, §4.5): from a goal, builds the transitive
//! dependency DAG over targets and variables.
//!
//! The adjacency array is indexed by one flat index space covering all three
//! node kinds (`{targets, then factvars, then dresvars}`, §4.5's "index
//! convention"). An edge `p -> t` means "append `t` to `adj[p]`" — a
//! prerequisite points at the things that depend on it, not the other way
//! around, so Kahn's algorithm in [`crate::toposort`] can walk it forward.

use crate::error::ResolverError;
use crate::tables::Tables;
use dres_core::{TaggedId, TypeTag};

/// A goal's transitive dependency graph: which targets and variables are
/// reachable from it, and the edges between them, in the flat index space
/// `{targets, then factvars, then dresvars}`.
#[derive(Debug)]
pub struct DepGraph {
    adj: Vec<Vec<usize>>,
    in_graph: Vec<bool>,
    ntarget: usize,
    nfactvar: usize,
}

impl DepGraph {
    fn base(&self, tag: TypeTag) -> usize {
        match tag {
            TypeTag::Target => 0,
            TypeTag::FactVar => self.ntarget,
            TypeTag::DresVar => self.ntarget + self.nfactvar,
            TypeTag::Literal => unreachable!("a string literal is never a graph node"),
        }
    }

    fn flat_index(&self, id: TaggedId) -> usize {
        self.base(id.type_tag()) + id.index()
    }

    /// Recover the tagged id a flat index names.
    pub fn node_id(&self, flat: usize) -> TaggedId {
        if flat < self.ntarget {
            TaggedId::new(TypeTag::Target, flat)
        } else if flat < self.ntarget + self.nfactvar {
            TaggedId::new(TypeTag::FactVar, flat - self.ntarget)
        } else {
            TaggedId::new(TypeTag::DresVar, flat - self.ntarget - self.nfactvar)
        }
    }

    /// Total size of the flat index space — `ntarget + nfactvar + ndresvar`,
    /// the exact queue/in-degree array bound §4.6 calls for.
    pub fn len(&self) -> usize {
        self.adj.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adj.is_empty()
    }

    pub fn in_graph(&self, flat: usize) -> bool {
        self.in_graph[flat]
    }

    pub fn outgoing(&self, flat: usize) -> &[usize] {
        &self.adj[flat]
    }
}

/// Build the transitive dependency graph for `goal` (§4.5).
pub fn build_graph(goal: TaggedId, tables: &Tables) -> Result<DepGraph, ResolverError> {
    if tables.target(goal).is_none() {
        return Err(ResolverError::UndefinedTarget {
            name: tables
                .name_of(goal)
                .unwrap_or_else(|| format!("{goal:?}")),
        });
    }

    let ntarget = tables.target_count();
    let nfactvar = tables.factvar_count();
    let ndresvar = tables.dresvar_count();
    let total = ntarget + nfactvar + ndresvar;

    let mut graph = DepGraph {
        adj: vec![Vec::new(); total],
        in_graph: vec![false; total],
        ntarget,
        nfactvar,
    };

    visit(goal.index(), tables, &mut graph)?;

    // Leaf pass (Open Question 1, resolved in SPEC_FULL.md §9): scan every
    // adjacency list uniformly over the full flat index space — targets,
    // factvars and dresvars alike — and bring in any destination that was
    // never itself traversed as a source. This is what brings the goal
    // itself into the graph when it has prerequisites but nothing depends on
    // it (belt-and-suspenders here since `visit` already marks the goal on
    // entry, but the pass must hold uniformly for any node in that position).
    for src in 0..total {
        let dests: Vec<usize> = graph.adj[src].clone();
        for dest in dests {
            if !graph.in_graph[dest] {
                graph.in_graph[dest] = true;
            }
        }
    }

    Ok(graph)
}

/// Recurse into `t_idx`'s prerequisites, adding edges and marking nodes
/// in-graph as they're discovered. Guards on `in_graph` at entry rather than
/// recursion depth (§9: "do not rely on recursion depth as termination") —
/// a cycle still terminates here because the second visit to any node on the
/// cycle finds it already marked; the toposort is what actually detects and
/// reports the cycle.
fn visit(t_idx: usize, tables: &Tables, graph: &mut DepGraph) -> Result<(), ResolverError> {
    if graph.in_graph[t_idx] {
        return Ok(());
    }
    graph.in_graph[t_idx] = true;

    let target_id = TaggedId::new(TypeTag::Target, t_idx);
    let target = tables
        .target(target_id)
        .ok_or_else(|| ResolverError::UndefinedTarget {
            name: format!("<forward-declared target #{t_idx}>"),
        })?;

    for p in target.prereqs.clone() {
        let p_flat = graph.flat_index(p);
        if !graph.adj[p_flat].contains(&t_idx) {
            graph.adj[p_flat].push(t_idx);
        }
        match p.type_tag() {
            TypeTag::Target => visit(p.index(), tables, graph)?,
            TypeTag::FactVar | TypeTag::DresVar => graph.in_graph[p_flat] = true,
            TypeTag::Literal => unreachable!("a string literal is never a prerequisite"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::Tables;

    #[test]
    fn linear_chain_includes_every_link() {
        // S1: A <- B <- C, C is the goal.
        let mut tables = Tables::new();
        let a = tables.register_target("A", vec![], vec![]).unwrap();
        let b = tables.register_target("B", vec![a], vec![]).unwrap();
        let c = tables.register_target("C", vec![b], vec![]).unwrap();

        let graph = build_graph(c, &tables).unwrap();
        assert!(graph.in_graph(0)); // A
        assert!(graph.in_graph(1)); // B
        assert!(graph.in_graph(2)); // C
    }

    #[test]
    fn goal_with_only_prerequisites_and_no_dependents_is_in_graph() {
        // Open Question 1's test: a target that is never a source (nothing
        // depends on it) must still appear in the graph.
        let mut tables = Tables::new();
        let leaf = tables.register_target("leaf", vec![], vec![]).unwrap();
        let goal = tables.register_target("goal", vec![leaf], vec![]).unwrap();

        let graph = build_graph(goal, &tables).unwrap();
        assert!(graph.in_graph(leaf.index()));
        assert!(graph.in_graph(goal.index()));
    }

    #[test]
    fn variable_prerequisite_is_a_terminal_graph_node() {
        let mut tables = Tables::new();
        let x = tables.register_factvar("$x", crate::tables::VarFlags::PREREQ);
        let t = tables.register_target("T", vec![x], vec![]).unwrap();

        let graph = build_graph(t, &tables).unwrap();
        let flat_x = graph.flat_index(x);
        assert!(graph.in_graph(flat_x));
        assert!(graph.outgoing(flat_x).contains(&t.index()));
    }

    #[test]
    fn duplicate_prerequisite_edges_are_not_repeated() {
        let mut tables = Tables::new();
        let a = tables.register_target("A", vec![], vec![]).unwrap();
        // B depends on A "twice" (degenerate but must dedupe).
        let b = tables.register_target("B", vec![a, a], vec![]).unwrap();

        let graph = build_graph(b, &tables).unwrap();
        assert_eq!(graph.outgoing(a.index()), &[b.index()]);
    }

    #[test]
    fn undefined_goal_is_an_error() {
        let tables = Tables::new();
        let bogus = TaggedId::new(TypeTag::Target, 0);
        assert!(matches!(
            build_graph(bogus, &tables),
            Err(ResolverError::UndefinedTarget { .. })
        ));
    }
}
