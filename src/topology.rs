//! Static node topology and bounded evidence traversal
//!
//! The topology file maps each node to the nodes that depend on it:
//!
//! ```text
//! { "node_1": ["node_2", "node_3"], "node_2": ["node_4"] }
//! ```
//!
//! On load every entry is inverted, so an edge `v → u` points from a dependent
//! `v` to its dependency `u`. Walking outgoing edges from a node therefore
//! answers "what could this node's failure be explained by".
//!
//! # Architecture
//!
//! ```text
//! topology JSON ──load──▶ TopologyGraph (CSR via trueno-graph, immutable)
//!                              │
//!                              │ subgraph_around(source, predicate, depth)
//!                              ▼
//!                         Subgraph { nodes, edges }
//! ```
//!
//! [`TopologyGraph::subgraph_around`] is the single evidence-gathering
//! primitive. Callers narrow it with an [`EdgePredicate`]; predicates compose
//! with [`EdgePredicateExt::and`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;
use trueno_graph::{CsrGraph, NodeId as CsrNode};

/// Topology node identifier (the integer after the last `_` of `prefix_id`)
pub type NodeId = u32;

/// Extract the node id from a `prefix_id` token
///
/// ```
/// use faultline::topology::node_id_from_token;
///
/// assert_eq!(node_id_from_token("node_17"), Some(17));
/// assert_eq!(node_id_from_token("db_host_4"), Some(4));
/// assert_eq!(node_id_from_token("node"), None);
/// ```
pub fn node_id_from_token(token: &str) -> Option<NodeId> {
    let (_, id) = token.rsplit_once('_')?;
    id.parse().ok()
}

/// Decides whether the traversal may follow edge `u → v`
pub trait EdgePredicate {
    fn decide(&self, u: NodeId, v: NodeId) -> bool;
}

/// Accepts every edge
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyEdge;

impl EdgePredicate for AnyEdge {
    fn decide(&self, _u: NodeId, _v: NodeId) -> bool {
        true
    }
}

/// Conjunction of two predicates
#[derive(Debug, Clone, Copy)]
pub struct And<A, B>(pub A, pub B);

impl<A: EdgePredicate, B: EdgePredicate> EdgePredicate for And<A, B> {
    fn decide(&self, u: NodeId, v: NodeId) -> bool {
        self.0.decide(u, v) && self.1.decide(u, v)
    }
}

impl<P: EdgePredicate + ?Sized> EdgePredicate for &P {
    fn decide(&self, u: NodeId, v: NodeId) -> bool {
        (**self).decide(u, v)
    }
}

/// Adapter for ad-hoc closures
#[derive(Clone, Copy)]
pub struct FnEdge<F>(pub F);

impl<F: Fn(NodeId, NodeId) -> bool> FnEdge<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F: Fn(NodeId, NodeId) -> bool> EdgePredicate for FnEdge<F> {
    fn decide(&self, u: NodeId, v: NodeId) -> bool {
        (self.0)(u, v)
    }
}

pub trait EdgePredicateExt: EdgePredicate + Sized {
    fn and<B: EdgePredicate>(self, other: B) -> And<Self, B> {
        And(self, other)
    }
}

impl<P: EdgePredicate> EdgePredicateExt for P {}

/// Nodes and edges visited by one bounded traversal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subgraph {
    pub nodes: BTreeSet<NodeId>,
    pub edges: Vec<(NodeId, NodeId)>,
}

impl Subgraph {
    pub fn singleton(node: NodeId) -> Self {
        Self {
            nodes: BTreeSet::from([node]),
            edges: Vec::new(),
        }
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Every node except `node`
    pub fn nodes_except(&self, node: NodeId) -> BTreeSet<NodeId> {
        self.nodes.iter().copied().filter(|&n| n != node).collect()
    }
}

/// Immutable reverse-dependency graph over topology nodes
///
/// External ids can be sparse (`host_4000000000`), so each node is interned
/// to a dense CSR index in ascending id order.
pub struct TopologyGraph {
    graph: CsrGraph,
    /// External id of each CSR index
    nodes: Vec<NodeId>,
    node_to_index: HashMap<NodeId, CsrNode>,
    /// Nodes with at least one outgoing edge; only these are looked up in the CSR rows
    sources: HashSet<NodeId>,
    edge_count: usize,
}

impl std::fmt::Debug for TopologyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopologyGraph")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edge_count)
            .finish()
    }
}

impl TopologyGraph {
    /// Build from `dependent → dependency` edges; duplicates are ignored
    pub fn from_edges<I>(edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (NodeId, NodeId)>,
    {
        let edges: BTreeSet<(NodeId, NodeId)> = edges.into_iter().collect();

        // Phase 1: intern node ids
        let ids: BTreeSet<NodeId> = edges.iter().flat_map(|&(u, v)| [u, v]).collect();
        let nodes: Vec<NodeId> = ids.into_iter().collect();
        let node_to_index: HashMap<NodeId, CsrNode> = nodes
            .iter()
            .enumerate()
            .map(|(idx, &id)| (id, CsrNode(idx as u32)))
            .collect();

        // Phase 2: edges over dense indices
        let mut graph = CsrGraph::new();
        let mut sources = HashSet::new();
        for &(u, v) in &edges {
            graph
                .add_edge(node_to_index[&u], node_to_index[&v], 1.0)
                .context("Failed to add topology edge")?;
            sources.insert(u);
        }

        Ok(Self {
            graph,
            nodes,
            node_to_index,
            sources,
            edge_count: edges.len(),
        })
    }

    /// Parse a `{node: [dependents]}` mapping and invert it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mapping: BTreeMap<String, Vec<String>> =
            serde_json::from_str(json).context("Failed to parse topology JSON")?;

        let mut edges = Vec::new();
        for (node, dependents) in &mapping {
            let dependency = node_id_from_token(node)
                .with_context(|| format!("Invalid topology node identifier '{}'", node))?;
            for dependent in dependents {
                let dependent = node_id_from_token(dependent).with_context(|| {
                    format!("Invalid topology node identifier '{}'", dependent)
                })?;
                edges.push((dependent, dependency));
            }
        }

        Self::from_edges(edges)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read topology file: {}", path.as_ref().display())
        })?;
        let topology = Self::from_json_str(&content)?;
        tracing::info!(
            nodes = topology.node_count(),
            edges = topology.edge_count(),
            "loaded topology"
        );
        Ok(topology)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.node_to_index.contains_key(&node)
    }

    /// Outgoing neighbours of `node` in ascending id order
    pub fn successors(&self, node: NodeId) -> Vec<NodeId> {
        if !self.sources.contains(&node) {
            return Vec::new();
        }
        let Some(&index) = self.node_to_index.get(&node) else {
            return Vec::new();
        };
        let (neighbors, _weights) = self.graph.adjacency(index);
        let mut out: Vec<NodeId> = neighbors
            .iter()
            .filter_map(|&n| self.nodes.get(n as usize).copied())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Depth-first exploration around `source`
    ///
    /// Edge `u → v` is followed only when `include.decide(u, v)` holds and `v`
    /// has not been visited yet. A path never exceeds `depth_limit` edges. The
    /// source is always part of the result, even when nothing matches.
    pub fn subgraph_around<P: EdgePredicate>(
        &self,
        source: NodeId,
        include: &P,
        depth_limit: usize,
    ) -> Subgraph {
        let mut result = Subgraph::singleton(source);
        if depth_limit == 0 {
            return result;
        }

        // (node, remaining depth, successors, cursor)
        let mut stack = vec![(source, depth_limit, self.successors(source), 0usize)];
        while let Some((parent, remaining, children, cursor)) = stack.last_mut() {
            let Some(&child) = children.get(*cursor) else {
                stack.pop();
                continue;
            };
            *cursor += 1;

            let (parent, remaining) = (*parent, *remaining);
            if result.nodes.contains(&child) || !include.decide(parent, child) {
                continue;
            }

            result.nodes.insert(child);
            result.edges.push((parent, child));
            if remaining > 1 {
                stack.push((child, remaining - 1, self.successors(child), 0));
            }
        }

        result
    }
}
