//! Causal graph over log templates
//!
//! A directed acyclic graph whose nodes are template ids. An edge `u → v`
//! records that, across historical incidents whose root cause had template
//! `u`, template `v` showed up in the root-cause evidence window often enough.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Training windows (one per labeled incident)                  │
//! │   root_template: 3, evidence_templates: {3, 7, 12}           │
//! │   root_template: 3, evidence_templates: {3, 7}               │
//! └──────────────────────────────────────────────────────────────┘
//!                          │
//!                          │ count (root, evidence) pairs
//!                          ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Support table   (3,7): 2   (3,12): 1                         │
//! └──────────────────────────────────────────────────────────────┘
//!                          │
//!                          │ keep support ≥ min_support, insert by
//!                          │ descending support, reject edges that
//!                          │ would close a cycle
//!                          ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ CausalGraph (CSR via trueno-graph)                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Greedy insertion keeps the graph acyclic at every step, at the price of
//! silently dropping weaker edges that would have closed a cycle.
//!
//! # Example
//!
//! ```
//! use faultline::causal_graph::{CausalGraphBuilder, EvidenceWindow};
//! use std::collections::BTreeSet;
//!
//! let window = EvidenceWindow {
//!     root_template: 0,
//!     evidence_templates: BTreeSet::from([0, 1]),
//! };
//! let graph = CausalGraphBuilder::new(2).build(&[window.clone(), window], 2);
//! assert_eq!(graph.edges(), &[(0, 1)]);
//! assert!(graph.is_dag());
//! ```

use crate::template::TemplateId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;
use trueno_graph::{CsrGraph, NodeId};

/// Templates observed around one incident's root cause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceWindow {
    pub root_template: TemplateId,
    /// Templates on every node of the root-cause evidence subgraph
    pub evidence_templates: BTreeSet<TemplateId>,
}

/// Template-level causal DAG
pub struct CausalGraph {
    /// Underlying CSR graph (via trueno-graph)
    graph: CsrGraph,

    /// Number of template nodes (`0..node_count`)
    node_count: usize,

    /// Edges in insertion order
    edges: Vec<(TemplateId, TemplateId)>,

    /// Nodes with outgoing edges (rows present in the CSR)
    sources: HashSet<TemplateId>,

    /// Sorted parents of each node with incoming edges
    parents: BTreeMap<TemplateId, Vec<TemplateId>>,
}

impl std::fmt::Debug for CausalGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CausalGraph")
            .field("node_count", &self.node_count)
            .field("edges", &self.edges)
            .finish()
    }
}

impl CausalGraph {
    /// Graph over `node_count` templates with no edges
    pub fn empty(node_count: usize) -> Self {
        Self {
            graph: CsrGraph::new(),
            node_count,
            edges: Vec::new(),
            sources: HashSet::new(),
            parents: BTreeMap::new(),
        }
    }

    /// Rebuild from an edge list, re-checking acyclicity
    pub fn from_edges(node_count: usize, edges: &[(TemplateId, TemplateId)]) -> Result<Self> {
        let mut graph = Self::empty(node_count);
        for &(u, v) in edges {
            if u >= node_count || v >= node_count {
                anyhow::bail!(
                    "Edge ({}, {}) references a template outside 0..{}",
                    u,
                    v,
                    node_count
                );
            }
            if !graph.try_add_edge(u, v)? {
                anyhow::bail!("Edge ({}, {}) would create a cycle", u, v);
            }
        }
        Ok(graph)
    }

    /// Add `u → v` unless it is a self-loop, a duplicate, or closes a cycle
    ///
    /// Returns whether the edge was added.
    fn try_add_edge(&mut self, u: TemplateId, v: TemplateId) -> Result<bool> {
        if u == v || self.has_edge(u, v) || self.has_path(v, u) {
            return Ok(false);
        }

        self.graph
            .add_edge(NodeId(u as u32), NodeId(v as u32), 1.0)
            .context("Failed to add causal edge")?;
        self.edges.push((u, v));
        self.sources.insert(u);
        let parents = self.parents.entry(v).or_default();
        let pos = parents.binary_search(&u).unwrap_or_else(|p| p);
        parents.insert(pos, u);
        Ok(true)
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges in the order they were accepted
    pub fn edges(&self) -> &[(TemplateId, TemplateId)] {
        &self.edges
    }

    pub fn contains(&self, node: TemplateId) -> bool {
        node < self.node_count
    }

    /// Outgoing neighbours of a template
    pub fn children(&self, node: TemplateId) -> Vec<TemplateId> {
        if !self.sources.contains(&node) {
            return Vec::new();
        }
        let (neighbors, _weights) = self.graph.adjacency(NodeId(node as u32));
        neighbors.iter().map(|&n| n as TemplateId).collect()
    }

    pub fn parents(&self, node: TemplateId) -> &[TemplateId] {
        self.parents.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_edge(&self, u: TemplateId, v: TemplateId) -> bool {
        self.parents(v).binary_search(&u).is_ok()
    }

    /// Whether `to` is reachable from `from` (a node reaches itself)
    pub fn has_path(&self, from: TemplateId, to: TemplateId) -> bool {
        if from == to {
            return true;
        }
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            for child in self.children(node) {
                if child == to {
                    return true;
                }
                if !visited.contains(&child) {
                    stack.push(child);
                }
            }
        }
        false
    }

    /// Whether two templates are joined by an edge in either direction
    pub fn related(&self, a: TemplateId, b: TemplateId) -> bool {
        self.has_edge(a, b) || self.has_edge(b, a)
    }

    /// Nodes from which `targets` can be reached, including the targets
    pub fn ancestors<I>(&self, targets: I) -> BTreeSet<TemplateId>
    where
        I: IntoIterator<Item = TemplateId>,
    {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<TemplateId> = targets.into_iter().collect();
        while let Some(node) = stack.pop() {
            if !seen.insert(node) {
                continue;
            }
            stack.extend(self.parents(node).iter().copied());
        }
        seen
    }

    /// Kahn topological order over all nodes; `None` if a cycle exists
    pub fn topological_order(&self) -> Option<Vec<TemplateId>> {
        let mut in_degree = vec![0usize; self.node_count];
        for &(_, v) in &self.edges {
            in_degree[v] += 1;
        }
        let mut ready: Vec<TemplateId> = (0..self.node_count)
            .filter(|&n| in_degree[n] == 0)
            .rev()
            .collect();
        let mut order = Vec::with_capacity(self.node_count);
        while let Some(node) = ready.pop() {
            order.push(node);
            for child in self.children(node) {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.push(child);
                }
            }
        }
        (order.len() == self.node_count).then_some(order)
    }

    /// Validate the graph is a DAG
    pub fn is_dag(&self) -> bool {
        self.topological_order().is_some()
    }
}

/// Mines a [`CausalGraph`] from labeled evidence windows
#[derive(Debug, Clone)]
pub struct CausalGraphBuilder {
    min_support: usize,
}

impl CausalGraphBuilder {
    pub fn new(min_support: usize) -> Self {
        Self { min_support }
    }

    /// `(root, evidence)` co-occurrence counts, self-pairs excluded
    pub fn support(windows: &[EvidenceWindow]) -> HashMap<(TemplateId, TemplateId), usize> {
        let mut support = HashMap::new();
        for window in windows {
            for &evidence in &window.evidence_templates {
                if evidence != window.root_template {
                    *support.entry((window.root_template, evidence)).or_insert(0) += 1;
                }
            }
        }
        support
    }

    /// Build the DAG over `node_count` templates
    ///
    /// Candidate edges are tried by descending support, ties broken by
    /// ascending `(root, evidence)`, so the result is deterministic.
    pub fn build(&self, windows: &[EvidenceWindow], node_count: usize) -> CausalGraph {
        let mut candidates: Vec<((TemplateId, TemplateId), usize)> = Self::support(windows)
            .into_iter()
            .filter(|&((u, v), count)| {
                count >= self.min_support && u < node_count && v < node_count
            })
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut graph = CausalGraph::empty(node_count);
        let mut rejected = 0usize;
        for ((u, v), count) in candidates {
            match graph.try_add_edge(u, v) {
                Ok(true) => tracing::trace!(u, v, count, "accepted causal edge"),
                Ok(false) => {
                    rejected += 1;
                    tracing::trace!(u, v, count, "rejected cycle-closing edge");
                }
                Err(e) => {
                    rejected += 1;
                    tracing::warn!(u, v, "failed to insert causal edge: {}", e);
                }
            }
        }

        tracing::info!(
            windows = windows.len(),
            edges = graph.edge_count(),
            rejected,
            "built causal graph"
        );
        graph
    }
}

/// On-disk form of a causal graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalGraphCache {
    /// Template-set fingerprint plus the training parameters the graph was built with
    pub key: String,
    pub nodes: Vec<TemplateId>,
    pub edges: Vec<(TemplateId, TemplateId)>,
}

pub fn save_cache(graph: &CausalGraph, key: &str, path: impl AsRef<Path>) -> Result<()> {
    let cache = CausalGraphCache {
        key: key.to_string(),
        nodes: (0..graph.node_count()).collect(),
        edges: graph.edges().to_vec(),
    };
    let bytes = serde_json::to_vec(&cache)?;
    fs::write(path.as_ref(), bytes).with_context(|| {
        format!("Failed to write causal graph cache: {}", path.as_ref().display())
    })
}

/// Load the cached graph if it was built under `key`, otherwise `None`
pub fn load_cache(path: impl AsRef<Path>, key: &str) -> Result<Option<CausalGraph>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read causal graph cache: {}", path.display()))?;
    let cache: CausalGraphCache = serde_json::from_slice(&bytes)
        .with_context(|| format!("Invalid causal graph cache: {}", path.display()))?;
    if cache.key != key {
        tracing::info!(path = %path.display(), "template set or parameters changed, causal graph cache is stale");
        return Ok(None);
    }
    CausalGraph::from_edges(cache.nodes.len(), &cache.edges).map(Some)
}
