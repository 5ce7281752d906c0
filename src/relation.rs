//! Relation-based node locator
//!
//! Picks the active node whose neighbourhood is most causally connected: from
//! every node with events, grow a bounded subgraph across edges whose two
//! endpoints logged templates joined by a causal-graph edge (in either
//! direction), and keep the node with the largest subgraph. Ties go to the
//! lowest node id. A node whose subgraph has no edges carries no evidence and
//! is never picked.
//!
//! This ignores event frequencies and the Bayesian model entirely, so it is
//! useful as a baseline next to [`crate::scorer`].

use crate::causal_graph::CausalGraph;
use crate::clustering::IncidentView;
use crate::topology::{EdgePredicate, NodeId, Subgraph};

/// Edge predicate: some template on `u` is causally related to some template on `v`
#[derive(Debug, Clone, Copy)]
pub struct CausallyRelated<'a, 't> {
    view: &'a IncidentView<'t>,
    graph: &'a CausalGraph,
}

impl<'a, 't> CausallyRelated<'a, 't> {
    pub fn new(view: &'a IncidentView<'t>, graph: &'a CausalGraph) -> Self {
        Self { view, graph }
    }
}

impl EdgePredicate for CausallyRelated<'_, '_> {
    fn decide(&self, u: NodeId, v: NodeId) -> bool {
        let targets: Vec<_> = self
            .view
            .events_on(v)
            .iter()
            .filter_map(|e| e.template)
            .collect();
        self.view
            .events_on(u)
            .iter()
            .filter_map(|e| e.template)
            .any(|a| targets.iter().any(|&b| self.graph.related(a, b)))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RelationLocator<'g> {
    graph: &'g CausalGraph,
    jumps: usize,
}

impl<'g> RelationLocator<'g> {
    pub fn new(graph: &'g CausalGraph, jumps: usize) -> Self {
        Self { graph, jumps }
    }

    /// Node with the largest causally connected neighbourhood, and that neighbourhood
    pub fn locate(&self, view: &IncidentView<'_>) -> Option<(NodeId, Subgraph)> {
        let related = CausallyRelated::new(view, self.graph);
        let mut best: Option<(NodeId, Subgraph)> = None;

        for &node in view.node_to_events().keys() {
            let subgraph = view.evidence_subgraph(node, related, self.jumps);
            if subgraph.edge_count() == 0 {
                continue;
            }
            let larger = best
                .as_ref()
                .map_or(true, |(_, b)| subgraph.node_count() > b.node_count());
            if larger {
                best = Some((node, subgraph));
            }
        }

        if let Some((node, subgraph)) = &best {
            tracing::debug!(node, size = subgraph.node_count(), "relation locator picked node");
        }
        best
    }
}
