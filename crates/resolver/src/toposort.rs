//! Topological Sort (C7, §4.6): Kahn's algorithm over the flat dependency
//! graph built by [`crate::graph`].

use crate::error::ResolverError;
use crate::graph::DepGraph;
use crate::tables::Tables;
use dres_core::TaggedId;
use std::collections::VecDeque;

/// Order the graph's nodes so every prerequisite precedes its dependents.
/// Returns the resolved ids of every in-graph node that has no prerequisites
/// at all (bare queue seeds, §4.6 step 1) first, in the order Kahn's
/// algorithm drains them.
pub fn toposort(graph: &DepGraph, tables: &Tables) -> Result<Vec<TaggedId>, ResolverError> {
    let n = graph.len();
    let mut indegree = vec![0usize; n];

    for src in 0..n {
        if !graph.in_graph(src) {
            continue;
        }
        for &dest in graph.outgoing(src) {
            indegree[dest] += 1;
        }
    }

    // Seed the queue with every in-graph node that starts at zero in-degree:
    // variables (which have no prerequisites of their own) and any
    // zero-prereq target (§4.6: "queue seeded with all variables-in-graph
    // plus zero-prereq targets").
    let mut queue: VecDeque<usize> = VecDeque::new();
    for flat in 0..n {
        if graph.in_graph(flat) && indegree[flat] == 0 {
            queue.push_back(flat);
        }
    }

    let mut order = Vec::with_capacity(n);
    while let Some(flat) = queue.pop_front() {
        order.push(graph.node_id(flat));
        for &dest in graph.outgoing(flat) {
            indegree[dest] -= 1;
            if indegree[dest] == 0 {
                queue.push_back(dest);
            }
        }
    }

    let in_graph_count = (0..n).filter(|&f| graph.in_graph(f)).count();
    if order.len() != in_graph_count {
        let residuals = (0..n)
            .filter(|&f| graph.in_graph(f) && indegree[f] > 0)
            .map(|f| {
                let id = graph.node_id(f);
                tables
                    .name_of(id)
                    .unwrap_or_else(|| format!("{id:?}"))
            })
            .collect();
        return Err(ResolverError::Cycle { residuals });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use crate::tables::VarFlags;

    #[test]
    fn linear_chain_orders_prerequisites_before_dependents() {
        let mut tables = Tables::new();
        let a = tables.register_target("A", vec![], vec![]).unwrap();
        let b = tables.register_target("B", vec![a], vec![]).unwrap();
        let c = tables.register_target("C", vec![b], vec![]).unwrap();

        let graph = build_graph(c, &tables).unwrap();
        let order = toposort(&graph, &tables).unwrap();

        let pos = |id: TaggedId| order.iter().position(|&x| x == id).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }

    #[test]
    fn variable_prerequisites_are_ordered_before_their_dependent_target() {
        let mut tables = Tables::new();
        let x = tables.register_factvar("$x", VarFlags::PREREQ);
        let t = tables.register_target("T", vec![x], vec![]).unwrap();

        let graph = build_graph(t, &tables).unwrap();
        let order = toposort(&graph, &tables).unwrap();
        let pos = |id: TaggedId| order.iter().position(|&y| y == id).unwrap();
        assert!(pos(x) < pos(t));
    }

    #[test]
    fn a_cycle_is_reported_by_name() {
        // a -> b -> a, caught via register_target forward references.
        let mut tables = Tables::new();
        let a_fwd = tables.target_id("a");
        let b = tables.register_target("b", vec![a_fwd], vec![]).unwrap();
        let a = tables.register_target("a", vec![b], vec![]).unwrap();
        assert_eq!(a, a_fwd);

        let graph = build_graph(a, &tables).unwrap();
        let err = toposort(&graph, &tables).unwrap_err();
        match err {
            ResolverError::Cycle { residuals } => {
                let mut residuals = residuals;
                residuals.sort();
                assert_eq!(residuals, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected Cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_cycle_is_reported() {
        let mut tables = Tables::new();
        let a_fwd = tables.target_id("a");
        let a = tables.register_target("a", vec![a_fwd], vec![]).unwrap();

        let graph = build_graph(a, &tables).unwrap();
        assert!(matches!(
            toposort(&graph, &tables),
            Err(ResolverError::Cycle { .. })
        ));
    }
}
