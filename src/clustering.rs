//! Per-incident event clustering
//!
//! Turns one incident's structured events into an [`IncidentView`]:
//!
//! 1. events without a template are dropped
//! 2. events whose template is corpus-wide background noise (frequency above
//!    the high-frequency threshold) are dropped
//! 3. identical `(node, message, template)` events collapse to one, while the
//!    share of each `(node, template)` pair among the surviving events is kept
//! 4. the survivors are grouped by node
//!
//! The labeled root cause, if any, is taken from the raw events before any
//! filtering.

use crate::ingest::LogEvent;
use crate::ratio::{count_ratio, RatioError};
use crate::template::{TemplateError, TemplateId, TemplateSet};
use crate::topology::{EdgePredicate, EdgePredicateExt, NodeId, Subgraph, TopologyGraph};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Ratio(#[from] RatioError),
}

/// Edge predicate: the target node logged at least one surviving event
#[derive(Debug, Clone, Copy)]
pub struct HasEvents<'a>(pub &'a BTreeMap<NodeId, Vec<LogEvent>>);

impl EdgePredicate for HasEvents<'_> {
    fn decide(&self, _u: NodeId, v: NodeId) -> bool {
        self.0.contains_key(&v)
    }
}

/// Clustered view of one incident
#[derive(Debug)]
pub struct IncidentView<'t> {
    topology: &'t TopologyGraph,
    events: Vec<LogEvent>,
    node_to_events: BTreeMap<NodeId, Vec<LogEvent>>,
    event_freq: HashMap<(NodeId, TemplateId), f64>,
    root_cause: Option<LogEvent>,
    removed_high_frequency: usize,
}

impl<'t> IncidentView<'t> {
    pub fn new(
        events: Vec<LogEvent>,
        templates: &TemplateSet,
        topology: &'t TopologyGraph,
        high_frequency_threshold: f64,
    ) -> Result<Self, ClusteringError> {
        let root_cause = events.iter().find(|e| e.is_root == Some(true)).cloned();

        let mut surviving = Vec::with_capacity(events.len());
        let mut removed_high_frequency = 0;
        for event in events {
            let Some(template) = event.template else {
                continue;
            };
            if templates.frequency(template)? > high_frequency_threshold {
                tracing::debug!(node = event.node, message = %event.message, "removed high-frequency event");
                removed_high_frequency += 1;
                continue;
            }
            surviving.push((event, template));
        }

        let total = surviving.len();
        let mut pair_counts: HashMap<(NodeId, TemplateId), usize> = HashMap::new();
        let mut seen: HashSet<(NodeId, String, TemplateId)> = HashSet::new();
        let mut deduplicated = Vec::new();
        for (event, template) in surviving {
            *pair_counts.entry((event.node, template)).or_insert(0) += 1;
            if seen.insert((event.node, event.message.clone(), template)) {
                deduplicated.push(event);
            }
        }

        let mut event_freq = HashMap::with_capacity(pair_counts.len());
        for (pair, count) in pair_counts {
            event_freq.insert(pair, count_ratio(count, total, "event frequency")?);
        }

        let mut node_to_events: BTreeMap<NodeId, Vec<LogEvent>> = BTreeMap::new();
        for event in &deduplicated {
            node_to_events
                .entry(event.node)
                .or_default()
                .push(event.clone());
        }

        Ok(Self {
            topology,
            events: deduplicated,
            node_to_events,
            event_freq,
            root_cause,
            removed_high_frequency,
        })
    }

    /// Surviving events in input order
    pub fn events(&self) -> &[LogEvent] {
        &self.events
    }

    pub fn node_to_events(&self) -> &BTreeMap<NodeId, Vec<LogEvent>> {
        &self.node_to_events
    }

    pub fn events_on(&self, node: NodeId) -> &[LogEvent] {
        self.node_to_events
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_events(&self, node: NodeId) -> bool {
        self.node_to_events.contains_key(&node)
    }

    /// Share of the `(node, template)` pair among surviving events; 0 if unseen
    pub fn event_frequency(&self, event: &LogEvent) -> f64 {
        event
            .template
            .and_then(|t| self.event_freq.get(&(event.node, t)).copied())
            .unwrap_or(0.0)
    }

    pub fn root_cause(&self) -> Option<&LogEvent> {
        self.root_cause.as_ref()
    }

    pub fn removed_high_frequency(&self) -> usize {
        self.removed_high_frequency
    }

    /// Bounded neighbourhood of `node` restricted to nodes with events
    pub fn evidence_subgraph<P: EdgePredicate>(
        &self,
        node: NodeId,
        extra: P,
        jumps: usize,
    ) -> Subgraph {
        let include = HasEvents(&self.node_to_events).and(extra);
        self.topology.subgraph_around(node, &include, jumps)
    }

    /// Templates of every event on the given nodes
    pub fn templates_on<'n, I>(&self, nodes: I) -> BTreeSet<TemplateId>
    where
        I: IntoIterator<Item = &'n NodeId>,
    {
        nodes
            .into_iter()
            .flat_map(|node| self.events_on(*node))
            .filter_map(|event| event.template)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::AnyEdge;

    fn event(node: NodeId, message: &str, template: Option<TemplateId>) -> LogEvent {
        LogEvent {
            node,
            message: message.to_string(),
            template,
            is_root: None,
        }
    }

    /// Templates: 0 "disk full" (1/12), 1 "ping timeout" (1/12), 2 "heartbeat ok" (10/12)
    fn templates() -> TemplateSet {
        let mut corpus = vec!["disk full".to_string(), "ping timeout".to_string()];
        corpus.extend(std::iter::repeat("heartbeat ok".to_string()).take(10));
        TemplateSet::mine(&corpus, 0.8)
    }

    fn topology() -> TopologyGraph {
        TopologyGraph::from_edges([(3, 4), (4, 5)]).unwrap()
    }

    #[test]
    fn test_exact_duplicates_collapse() {
        let (tpl, topo) = (templates(), topology());
        let events = vec![event(3, "disk full", Some(0)), event(3, "disk full", Some(0))];
        let view = IncidentView::new(events, &tpl, &topo, 0.1).unwrap();

        assert_eq!(view.node_to_events()[&3].len(), 1);
        assert_eq!(view.event_frequency(&view.events()[0]), 1.0);
    }

    #[test]
    fn test_high_frequency_templates_removed() {
        let (tpl, topo) = (templates(), topology());
        let events = vec![
            event(3, "disk full", Some(0)),
            event(4, "heartbeat ok", Some(2)),
            event(4, "ping timeout", Some(1)),
        ];
        let view = IncidentView::new(events, &tpl, &topo, 0.1).unwrap();

        assert_eq!(view.removed_high_frequency(), 1);
        assert_eq!(view.events().len(), 2);
        for e in view.events() {
            assert!(tpl.frequency(e.template.unwrap()).unwrap() <= 0.1);
        }
        assert_eq!(view.event_frequency(&view.events()[0]), 0.5);
    }

    #[test]
    fn test_unmatched_events_excluded() {
        let (tpl, topo) = (templates(), topology());
        let events = vec![event(3, "disk full", Some(0)), event(5, "???", None)];
        let view = IncidentView::new(events, &tpl, &topo, 0.1).unwrap();

        assert!(!view.has_events(5));
        assert_eq!(view.event_frequency(&view.events()[0]), 1.0);
    }

    #[test]
    fn test_frequency_counts_before_dedup() {
        let (tpl, topo) = (templates(), topology());
        let events = vec![
            event(3, "disk full", Some(0)),
            event(3, "disk full", Some(0)),
            event(3, "disk full", Some(0)),
            event(4, "ping timeout", Some(1)),
        ];
        let view = IncidentView::new(events, &tpl, &topo, 0.1).unwrap();
        assert_eq!(view.event_frequency(&event(3, "disk full", Some(0))), 0.75);
        assert_eq!(view.event_frequency(&event(4, "ping timeout", Some(1))), 0.25);
        assert_eq!(view.event_frequency(&event(5, "ping timeout", Some(1))), 0.0);
    }

    #[test]
    fn test_root_cause_taken_before_filtering() {
        let (tpl, topo) = (templates(), topology());
        let mut root = event(4, "heartbeat ok", Some(2));
        root.is_root = Some(true);
        let view = IncidentView::new(vec![root.clone()], &tpl, &topo, 0.1).unwrap();

        assert_eq!(view.root_cause(), Some(&root));
        assert!(view.events().is_empty());
    }

    #[test]
    fn test_empty_incident() {
        let (tpl, topo) = (templates(), topology());
        let view = IncidentView::new(Vec::new(), &tpl, &topo, 0.1).unwrap();
        assert!(view.node_to_events().is_empty());
        assert!(view.root_cause().is_none());
    }

    #[test]
    fn test_evidence_subgraph_requires_events() {
        let (tpl, topo) = (templates(), topology());
        // Node 4 silent, so 5 is unreachable from 3
        let events = vec![event(3, "disk full", Some(0)), event(5, "ping timeout", Some(1))];
        let view = IncidentView::new(events, &tpl, &topo, 0.1).unwrap();

        let sub = view.evidence_subgraph(3, AnyEdge, 2);
        assert_eq!(sub, Subgraph::singleton(3));
    }

    #[test]
    fn test_evidence_subgraph_follows_active_nodes() {
        let (tpl, topo) = (templates(), topology());
        let events = vec![
            event(3, "disk full", Some(0)),
            event(4, "ping timeout", Some(1)),
            event(5, "ping timeout", Some(1)),
        ];
        let view = IncidentView::new(events, &tpl, &topo, 0.1).unwrap();

        let sub = view.evidence_subgraph(3, AnyEdge, 2);
        assert_eq!(sub.nodes, BTreeSet::from([3, 4, 5]));
        assert_eq!(view.templates_on(&sub.nodes), BTreeSet::from([0, 1]));

        let one_hop = view.evidence_subgraph(3, AnyEdge, 1);
        assert_eq!(one_hop.nodes, BTreeSet::from([3, 4]));
    }
}
