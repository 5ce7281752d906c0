//! Root-cause scoring
//!
//! Every node that logged events in the incident is a potential root-cause
//! location. A node only becomes a candidate when its bounded evidence
//! subgraph contains at least one *other* active node. For each actionable
//! event on such a node:
//!
//! ```text
//! signal    = (Σ event_frequency over evidence nodes + f) · f      f = event_frequency(event)
//! posterior = P(template(event) = 1 | evidence templates = 1)      own template excluded
//! score     = signal · posterior
//! ```
//!
//! Events whose signal falls below the noise floor never reach the model.
//! Candidates are ranked by descending score; ties keep node order. An empty
//! ranking is a regular [`Verdict::NotFound`].

use crate::bayes::{BayesianModel, ModelError};
use crate::clustering::IncidentView;
use crate::config::LocatorConfig;
use crate::ingest::LogEvent;
use crate::template::TemplateId;
use crate::topology::{AnyEdge, NodeId};
use serde::Serialize;
use std::collections::BTreeSet;

/// A scored `(node, event)` pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub node: NodeId,
    pub event: LogEvent,
    /// Active nodes of the evidence subgraph, excluding `node`
    pub evidence_nodes: BTreeSet<NodeId>,
    pub signal: f64,
    pub posterior: f64,
    pub score: f64,
}

/// Outcome of one scoring pass
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Found(Candidate),
    NotFound,
}

impl Verdict {
    pub fn is_found(&self) -> bool {
        matches!(self, Verdict::Found(_))
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            Verdict::Found(c) => Some(c),
            Verdict::NotFound => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RootCauseScorer<'m> {
    model: &'m BayesianModel,
    actionable_templates: BTreeSet<TemplateId>,
    evidence_jumps: usize,
    noise_floor: f64,
}

impl<'m> RootCauseScorer<'m> {
    pub fn new(
        model: &'m BayesianModel,
        actionable_templates: BTreeSet<TemplateId>,
        evidence_jumps: usize,
        noise_floor: f64,
    ) -> Self {
        Self {
            model,
            actionable_templates,
            evidence_jumps,
            noise_floor,
        }
    }

    pub fn from_config(model: &'m BayesianModel, config: &LocatorConfig) -> Self {
        Self::new(
            model,
            config.actionable_templates.clone(),
            config.evidence_jumps,
            config.noise_floor,
        )
    }

    /// All surviving candidates, best first
    pub fn rank(&self, view: &IncidentView<'_>) -> Result<Vec<Candidate>, ModelError> {
        let mut candidates = Vec::new();

        for (&node, events) in view.node_to_events() {
            let subgraph = view.evidence_subgraph(node, AnyEdge, self.evidence_jumps);
            let evidence_nodes = subgraph.nodes_except(node);
            if evidence_nodes.is_empty() {
                continue;
            }

            let total_frequency: f64 = evidence_nodes
                .iter()
                .flat_map(|n| view.events_on(*n))
                .map(|e| view.event_frequency(e))
                .sum();
            let evidence_templates = view.templates_on(&evidence_nodes);

            for event in events {
                let Some(template) = event.template else {
                    continue;
                };
                if !self.actionable_templates.contains(&template) {
                    continue;
                }

                let frequency = view.event_frequency(event);
                let signal = (total_frequency + frequency) * frequency;
                if signal < self.noise_floor {
                    tracing::debug!(node, template, signal, "below noise floor");
                    continue;
                }

                let mut evidence = evidence_templates.clone();
                evidence.remove(&template);
                let posterior = self.model.posterior(template, &evidence)?;
                let score = signal * posterior;
                tracing::debug!(node, template, signal, posterior, score, "scored candidate");

                candidates.push(Candidate {
                    node,
                    event: event.clone(),
                    evidence_nodes: evidence_nodes.clone(),
                    signal,
                    posterior,
                    score,
                });
            }
        }

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(candidates)
    }

    /// Best candidate, or [`Verdict::NotFound`] when none survive
    pub fn score(&self, view: &IncidentView<'_>) -> Result<Verdict, ModelError> {
        let best = self.rank(view)?.into_iter().next();
        Ok(best.map_or(Verdict::NotFound, Verdict::Found))
    }
}
