use crate::bayes::estimator::{fit_cpt, Cpt};
use crate::bayes::factor::Factor;
use crate::bayes::{ModelError, MAX_FACTOR_SCOPE};
use crate::causal_graph::CausalGraph;
use crate::ratio::ratio;
use crate::template::TemplateId;
use crate::training::OccurrenceMatrix;
use std::collections::BTreeSet;

/// Fitted network: the causal graph plus one CPT per template
#[derive(Debug)]
pub struct BayesianModel {
    graph: CausalGraph,
    cpts: Vec<Cpt>,
}

impl BayesianModel {
    /// Estimate every CPT from the occurrence matrix
    ///
    /// The matrix must have exactly one column per causal-graph node.
    pub fn fit(
        graph: CausalGraph,
        data: &OccurrenceMatrix,
        equivalent_sample_size: f64,
    ) -> Result<Self, ModelError> {
        if graph.node_count() == 0 {
            return Err(ModelError::Empty);
        }
        if data.columns() != graph.node_count() {
            return Err(ModelError::ShapeMismatch {
                expected: graph.node_count(),
                found: data.columns(),
            });
        }
        if !(equivalent_sample_size.is_finite() && equivalent_sample_size > 0.0) {
            return Err(ModelError::InvalidSampleSize(equivalent_sample_size));
        }

        let cpts = (0..graph.node_count())
            .map(|node| fit_cpt(node, graph.parents(node), data, equivalent_sample_size))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            rows = data.len(),
            "fitted Bayesian model"
        );
        Ok(Self { graph, cpts })
    }

    pub fn graph(&self) -> &CausalGraph {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.cpts.len()
    }

    pub fn cpt(&self, node: TemplateId) -> Option<&Cpt> {
        self.cpts.get(node)
    }

    fn check(&self, node: TemplateId) -> Result<(), ModelError> {
        if node < self.cpts.len() {
            Ok(())
        } else {
            Err(ModelError::UnknownVariable(node))
        }
    }

    /// `P(variable = 1)` with no evidence
    pub fn marginal(&self, variable: TemplateId) -> Result<f64, ModelError> {
        self.posterior(variable, &BTreeSet::new())
    }

    /// `P(variable = 1 | every evidence template = 1)` by exact elimination
    ///
    /// Nodes that are neither ancestors of the query nor of the evidence sum
    /// to one and are pruned before elimination.
    pub fn posterior(
        &self,
        variable: TemplateId,
        evidence: &BTreeSet<TemplateId>,
    ) -> Result<f64, ModelError> {
        self.check(variable)?;
        for &e in evidence {
            self.check(e)?;
        }
        if evidence.contains(&variable) {
            return Ok(1.0);
        }

        let relevant = self
            .graph
            .ancestors(std::iter::once(variable).chain(evidence.iter().copied()));

        let mut factors: Vec<Factor> = relevant
            .iter()
            .map(|&node| {
                evidence
                    .iter()
                    .fold(self.cpts[node].to_factor(), |f, &e| f.reduce(e, true))
            })
            .collect();

        let mut hidden: BTreeSet<TemplateId> = relevant
            .into_iter()
            .filter(|n| *n != variable && !evidence.contains(n))
            .collect();

        while let Some((scope, next)) = cheapest_variable(&factors, &hidden) {
            if scope > MAX_FACTOR_SCOPE {
                return Err(ModelError::FactorTooWide {
                    variable: next,
                    scope,
                });
            }
            hidden.remove(&next);
            let (touching, rest): (Vec<Factor>, Vec<Factor>) =
                factors.into_iter().partition(|f| f.contains(next));
            factors = rest;
            let joined = touching
                .iter()
                .fold(Factor::scalar(1.0), |acc, f| acc.product(f));
            factors.push(joined.marginalize(next));
        }

        let joint = factors
            .iter()
            .fold(Factor::scalar(1.0), |acc, f| acc.product(f));
        let (p0, p1) = match joint.values() {
            [p0, p1] => (*p0, *p1),
            // The query variable never appeared in any factor
            _ => return Err(ModelError::UnknownVariable(variable)),
        };
        Ok(ratio(p1, p0 + p1, "posterior normalisation")?)
    }
}

/// Min-scope greedy order: the hidden variable whose elimination builds the
/// smallest intermediate factor, lowest id on ties, with that factor's width
fn cheapest_variable(
    factors: &[Factor],
    hidden: &BTreeSet<TemplateId>,
) -> Option<(usize, TemplateId)> {
    hidden
        .iter()
        .map(|&var| {
            let scope: BTreeSet<TemplateId> = factors
                .iter()
                .filter(|f| f.contains(var))
                .flat_map(|f| f.vars().iter().copied())
                .collect();
            (scope.len(), var)
        })
        .min()
}
