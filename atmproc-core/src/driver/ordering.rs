//! Execution order of processes from their field requests.

use crate::errors::{AtmError, AtmResult};
use crate::field::{FieldRequestRegistry, RequestKind};
use petgraph::graph::NodeIndex;
use petgraph::{Direction, Graph};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// Process dependency graph: nodes are process names, edges are the fields
/// passed from one process to the next.
pub(crate) type ProcessGraph = Graph<String, String>;

/// Readers and writers of one field, as indices into the process list.
#[derive(Debug, Default)]
pub(crate) struct FieldUsers {
    pub computed_by: Vec<usize>,
    pub updated_by: Vec<usize>,
    pub required_by: Vec<usize>,
}

impl FieldUsers {
    /// True if the field has no process writer but is read.
    pub fn needs_external_source(&self) -> bool {
        self.computed_by.is_empty() && !(self.updated_by.is_empty() && self.required_by.is_empty())
    }
}

/// Collect who reads and writes each field.
pub(crate) fn field_users(registries: &[&FieldRequestRegistry]) -> BTreeMap<String, FieldUsers> {
    let mut users: BTreeMap<String, FieldUsers> = BTreeMap::new();
    for (index, registry) in registries.iter().enumerate() {
        for request in registry.iter() {
            let entry = users.entry(request.name().to_string()).or_default();
            match request.kind {
                RequestKind::Computed => entry.computed_by.push(index),
                RequestKind::Updated => entry.updated_by.push(index),
                RequestKind::Required => entry.required_by.push(index),
            }
        }
    }
    users
}

/// Build the dependency graph.
///
/// For each field the computing process comes first, updaters follow in
/// declaration order and readers come last.
pub(crate) fn build_graph(
    names: &[&str],
    users: &BTreeMap<String, FieldUsers>,
) -> AtmResult<ProcessGraph> {
    let mut graph = ProcessGraph::new();
    let nodes: Vec<NodeIndex> = names
        .iter()
        .map(|name| graph.add_node(name.to_string()))
        .collect();

    for (field, users) in users {
        if users.computed_by.len() > 1 {
            let providers: Vec<&str> = users.computed_by.iter().map(|i| names[*i]).collect();
            return Err(AtmError::InvalidConfiguration(format!(
                "field '{}' is computed by more than one process: [{}]",
                field,
                providers.join(", ")
            )));
        }
        let writers: Vec<usize> = users
            .computed_by
            .iter()
            .chain(users.updated_by.iter())
            .copied()
            .collect();
        for pair in writers.windows(2) {
            graph.add_edge(nodes[pair[0]], nodes[pair[1]], field.clone());
        }
        if let Some(last) = writers.last() {
            for reader in &users.required_by {
                graph.add_edge(nodes[*last], nodes[*reader], field.clone());
            }
        }
    }
    Ok(graph)
}

/// Topological order of the graph, breaking ties by declaration order.
pub(crate) fn execution_order(graph: &ProcessGraph) -> AtmResult<Vec<usize>> {
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);
        for next in graph.neighbors_directed(NodeIndex::new(index), Direction::Outgoing) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                ready.push(Reverse(next.index()));
            }
        }
    }

    if order.len() < graph.node_count() {
        let stuck: Vec<&str> = graph
            .node_indices()
            .filter(|n| !order.contains(&n.index()))
            .map(|n| graph[n].as_str())
            .collect();
        return Err(AtmError::CyclicDependency(format!(
            "processes [{}] depend on each other's outputs",
            stuck.join(", ")
        )));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::tags::COL;
    use crate::field::FieldLayout;
    use crate::units::Units;

    fn registry(name: &str, fields: &[(RequestKind, &str)]) -> FieldRequestRegistry {
        let layout = FieldLayout::new(&[COL], &[4]).unwrap();
        let mut registry = FieldRequestRegistry::new(name);
        for (kind, field) in fields {
            registry
                .add_field(*kind, field, &layout, &Units::nondimensional(), "Physics")
                .unwrap();
        }
        registry
    }

    fn order_of(registries: &[FieldRequestRegistry]) -> AtmResult<Vec<usize>> {
        let refs: Vec<&FieldRequestRegistry> = registries.iter().collect();
        let names: Vec<&str> = refs.iter().map(|r| r.process_name()).collect();
        let users = field_users(&refs);
        execution_order(&build_graph(&names, &users)?)
    }

    #[test]
    fn test_providers_run_before_readers() {
        use RequestKind::*;
        let registries = [
            registry("rrtmgp", &[(Required, "T_mid"), (Required, "eff_radius_qc")]),
            registry("cld_fraction", &[(Required, "qi"), (Computed, "cldfrac_tot")]),
            registry(
                "p3",
                &[(Updated, "T_mid"), (Updated, "qi"), (Computed, "eff_radius_qc")],
            ),
        ];
        assert_eq!(order_of(&registries).unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn test_computed_then_updated_then_required() {
        use RequestKind::*;
        let registries = [
            registry("reader", &[(Required, "x")]),
            registry("updater_a", &[(Updated, "x")]),
            registry("computer", &[(Computed, "x")]),
            registry("updater_b", &[(Updated, "x")]),
        ];
        assert_eq!(order_of(&registries).unwrap(), vec![2, 1, 3, 0]);
    }

    #[test]
    fn test_independent_processes_keep_declaration_order() {
        use RequestKind::*;
        let registries = [
            registry("a", &[(Computed, "x")]),
            registry("b", &[(Computed, "y")]),
            registry("c", &[(Required, "z")]),
        ];
        assert_eq!(order_of(&registries).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_cycle_is_detected() {
        use RequestKind::*;
        let registries = [
            registry("a", &[(Required, "y"), (Computed, "x")]),
            registry("b", &[(Required, "x"), (Computed, "y")]),
        ];
        let err = order_of(&registries).unwrap_err();
        assert!(matches!(err, AtmError::CyclicDependency(_)));
        assert!(err.to_string().contains("a, b"));
    }

    #[test]
    fn test_two_computing_processes_are_rejected() {
        use RequestKind::*;
        let registries = [
            registry("a", &[(Computed, "x")]),
            registry("b", &[(Computed, "x")]),
        ];
        assert!(matches!(
            order_of(&registries),
            Err(AtmError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_external_sources() {
        use RequestKind::*;
        let refs = [
            registry("p3", &[(Updated, "T_mid"), (Required, "p_mid")]),
            registry("rad", &[(Required, "T_mid"), (Computed, "flux")]),
        ];
        let users = field_users(&refs.iter().collect::<Vec<_>>());
        assert!(users["T_mid"].needs_external_source());
        assert!(users["p_mid"].needs_external_source());
        assert!(!users["flux"].needs_external_source());
    }
}
