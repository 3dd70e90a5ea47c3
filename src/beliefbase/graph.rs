//! petgraph projection of a [`BeliefStore`].
//!
//! The cycle detector walks the store's adjacency directly; this projection serves the
//! whole-graph questions petgraph already answers (is there any cycle at all, which regions of
//! the graph are strongly connected). Only petgraph's stack-based traversals are used here, so
//! graph depth is not bounded by the calling thread's stack.

use petgraph::{
    algo::{kosaraju_scc, toposort},
    graphmap::DiGraphMap,
};

use crate::properties::NodeId;

use super::BeliefStore;

pub type BeliefGraph = DiGraphMap<NodeId, ()>;

impl BeliefStore {
    pub fn as_graph(&self) -> BeliefGraph {
        let mut graph = BeliefGraph::with_capacity(self.len(), self.len());
        for id in self.ids() {
            graph.add_node(*id);
        }
        for node in self.iter() {
            for child in node.child_nodes.iter() {
                graph.add_edge(node.id, *child, ());
            }
        }
        graph
    }

    pub fn is_cyclic(&self) -> bool {
        toposort(&self.as_graph(), None).is_err()
    }

    /// Strongly connected components that contain at least one cycle: every component with
    /// more than one member, plus single nodes with an edge onto themselves. Members of each
    /// component are sorted.
    pub fn tangled_components(&self) -> Vec<Vec<NodeId>> {
        let graph = self.as_graph();
        kosaraju_scc(&graph)
            .into_iter()
            .filter(|component| match component.as_slice() {
                [single] => graph.contains_edge(*single, *single),
                members => members.len() > 1,
            })
            .map(|mut component| {
                component.sort();
                component
            })
            .collect()
    }
}
