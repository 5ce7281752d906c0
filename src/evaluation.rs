//! Precision/recall of located verdicts against labeled root causes
//!
//! A verdict is correct when both its node and its template match the label.
//! A verdict on an incident without a label still counts as located.

use crate::ingest::LogEvent;
use crate::ratio::{count_ratio, ratio, RatioError};
use crate::template::TemplateId;
use crate::topology::NodeId;
use serde::Serialize;

/// Running tallies over a batch of incidents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub n_labeled: usize,
    pub n_located: usize,
    pub n_correct: usize,
}

/// Final scores of an [`Evaluation`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub n_labeled: usize,
    pub n_located: usize,
    pub n_correct: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl Evaluation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally one incident: its label (if any) and the located `(node, template)` (if any)
    pub fn record(&mut self, label: Option<&LogEvent>, located: Option<(NodeId, Option<TemplateId>)>) {
        if label.is_some() {
            self.n_labeled += 1;
        }
        let Some((node, template)) = located else {
            return;
        };
        self.n_located += 1;
        if let Some(label) = label {
            if label.node == node && label.template.is_some() && label.template == template {
                self.n_correct += 1;
            }
        }
    }

    pub fn precision(&self) -> Result<f64, RatioError> {
        count_ratio(self.n_correct, self.n_located, "precision")
    }

    pub fn recall(&self) -> Result<f64, RatioError> {
        count_ratio(self.n_correct, self.n_labeled, "recall")
    }

    pub fn f1(&self) -> Result<f64, RatioError> {
        let (p, r) = (self.precision()?, self.recall()?);
        ratio(2.0 * p * r, p + r, "F1")
    }

    pub fn report(&self) -> Result<EvaluationReport, RatioError> {
        Ok(EvaluationReport {
            n_labeled: self.n_labeled,
            n_located: self.n_located,
            n_correct: self.n_correct,
            precision: self.precision()?,
            recall: self.recall()?,
            f1: self.f1()?,
        })
    }
}
