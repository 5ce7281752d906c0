//! Property-based tests for the core invariants
//!
//! 1. Similarity is symmetric and reflexive
//! 2. Template mining is deterministic
//! 3. Causal graphs are acyclic for any training set
//! 4. Bounded traversal never leaves the depth limit or follows a rejected edge
//! 5. Event clustering never keeps a high-frequency template

use faultline::causal_graph::{CausalGraphBuilder, EvidenceWindow};
use faultline::clustering::IncidentView;
use faultline::ingest::LogEvent;
use faultline::template::{similarity, TemplateSet};
use faultline::topology::{AnyEdge, FnEdge, NodeId, TopologyGraph};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_similarity_symmetric(a in ".{0,24}", b in ".{0,24}") {
        prop_assert_eq!(similarity(&a, &b), similarity(&b, &a));
        prop_assert_eq!(similarity(&a, &a), 1.0);
        let s = similarity(&a, &b);
        prop_assert!((0.0..=1.0 + 1e-12).contains(&s));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_mining_idempotent(messages in prop::collection::vec("[a-f ]{1,10}", 0..40)) {
        let first = TemplateSet::mine(&messages, 0.8);
        let second = TemplateSet::mine(&messages, 0.8);
        prop_assert_eq!(first.fingerprint(), second.fingerprint());

        let distinct: BTreeSet<&String> = messages.iter().collect();
        prop_assert!(first.len() <= distinct.len());

        // Representatives always match their own template
        for template in first.all_templates() {
            prop_assert_eq!(first.template_for(&template.text), Some(template.id));
        }
    }

    #[test]
    fn prop_causal_graph_acyclic(
        windows in prop::collection::vec(
            (0usize..8, prop::collection::btree_set(0usize..8, 0..6)),
            0..60,
        ),
        min_support in 1usize..4,
    ) {
        let windows: Vec<EvidenceWindow> = windows
            .into_iter()
            .map(|(root_template, evidence_templates)| EvidenceWindow {
                root_template,
                evidence_templates,
            })
            .collect();
        let graph = CausalGraphBuilder::new(min_support).build(&windows, 8);
        prop_assert!(graph.is_dag());

        let support = CausalGraphBuilder::support(&windows);
        for &(u, v) in graph.edges() {
            prop_assert!(u != v);
            prop_assert!(support[&(u, v)] >= min_support);
        }
    }

    #[test]
    fn prop_traversal_bounded(
        edges in prop::collection::vec((0u32..12, 0u32..12), 0..40),
        source in 0u32..12,
        depth in 0usize..5,
    ) {
        let topology = TopologyGraph::from_edges(edges.iter().copied()).unwrap();
        let sub = topology.subgraph_around(source, &AnyEdge, depth);
        prop_assert!(sub.contains(source));

        // Shortest distances over the full topology
        let mut distance: BTreeMap<NodeId, usize> = BTreeMap::from([(source, 0)]);
        let mut queue = VecDeque::from([source]);
        while let Some(node) = queue.pop_front() {
            let d = distance[&node];
            for next in topology.successors(node) {
                if !distance.contains_key(&next) {
                    distance.insert(next, d + 1);
                    queue.push_back(next);
                }
            }
        }

        for node in &sub.nodes {
            prop_assert!(distance.get(node).is_some_and(|d| *d <= depth));
        }
        for &(u, v) in &sub.edges {
            prop_assert!(topology.successors(u).contains(&v));
        }
        prop_assert_eq!(sub.edge_count() + 1, sub.node_count());
    }

    #[test]
    fn prop_traversal_respects_predicate(
        edges in prop::collection::vec((0u32..10, 0u32..10), 0..40),
        allowed in prop::collection::btree_set((0u32..10, 0u32..10), 0..40),
        source in 0u32..10,
        depth in 0usize..5,
    ) {
        let topology = TopologyGraph::from_edges(edges.iter().copied()).unwrap();
        let include = FnEdge::new(|u, v| allowed.contains(&(u, v)));
        let sub = topology.subgraph_around(source, &include, depth);
        prop_assert!(sub.contains(source));

        // Shortest distances over allowed edges only
        let mut distance: BTreeMap<NodeId, usize> = BTreeMap::from([(source, 0)]);
        let mut queue = VecDeque::from([source]);
        while let Some(node) = queue.pop_front() {
            let d = distance[&node];
            for next in topology.successors(node) {
                if allowed.contains(&(node, next)) && !distance.contains_key(&next) {
                    distance.insert(next, d + 1);
                    queue.push_back(next);
                }
            }
        }

        for &(u, v) in &sub.edges {
            prop_assert!(allowed.contains(&(u, v)));
            prop_assert!(topology.successors(u).contains(&v));
        }
        for node in &sub.nodes {
            prop_assert!(distance.get(node).is_some_and(|d| *d <= depth));
        }
        prop_assert_eq!(sub.edge_count() + 1, sub.node_count());
    }

    #[test]
    fn prop_noise_filtered(
        picks in prop::collection::vec((0u32..4, 0usize..4), 0..30),
        threshold in 0.0f64..1.0,
    ) {
        let corpus: Vec<String> = ["disk full", "link down", "oom killer", "heartbeat ok"]
            .iter()
            .zip([1, 2, 3, 6])
            .flat_map(|(m, n)| std::iter::repeat(m.to_string()).take(n))
            .collect();
        let templates = TemplateSet::mine(&corpus, 0.8);
        let topology = TopologyGraph::from_edges([(0, 1), (1, 2), (2, 3)]).unwrap();

        let events: Vec<LogEvent> = picks
            .into_iter()
            .map(|(node, t)| LogEvent {
                node,
                message: templates.representative_text(t).unwrap().to_string(),
                template: Some(t),
                is_root: None,
            })
            .collect();
        let view = IncidentView::new(events, &templates, &topology, threshold).unwrap();

        let mut seen = BTreeSet::new();
        for event in view.events() {
            let t = event.template.unwrap();
            prop_assert!(templates.frequency(t).unwrap() <= threshold);
            prop_assert!(seen.insert((event.node, event.message.clone())));
        }
    }
}
