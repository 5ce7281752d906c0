// Discrete Bayesian network over template occurrence
//
// Every template is a binary variable: "this template occurred in the
// incident's root-cause evidence window". The network structure is the
// causal graph, parameters come from a BDeu estimate over the training
// occurrence matrix, and posterior queries run exact variable elimination.
//
// Parameter estimation and inference are limited to this binary model; there
// is no general-purpose network API here.

mod estimator;
mod factor;
mod model;

pub use estimator::{fit_cpt, Cpt};
pub use factor::Factor;
pub use model::BayesianModel;

use crate::ratio::RatioError;
use crate::template::TemplateId;
use thiserror::Error;

/// Largest in-degree a CPT may have (`2^MAX_PARENTS` configurations)
pub const MAX_PARENTS: usize = 20;

/// Widest intermediate factor variable elimination may build (`2^MAX_FACTOR_SCOPE` values)
pub const MAX_FACTOR_SCOPE: usize = 24;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("unknown variable: template {0} is not a node of the model")]
    UnknownVariable(TemplateId),

    #[error("template {node} has {parents} parents (limit {})", MAX_PARENTS)]
    TooManyParents { node: TemplateId, parents: usize },

    #[error(
        "eliminating template {variable} needs a factor over {scope} variables (limit {})",
        MAX_FACTOR_SCOPE
    )]
    FactorTooWide { variable: TemplateId, scope: usize },

    #[error("occurrence matrix has {found} columns but the causal graph has {expected} nodes")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("equivalent sample size must be positive, got {0}")]
    InvalidSampleSize(f64),

    #[error("cannot fit a model over zero templates")]
    Empty,

    #[error(transparent)]
    Ratio(#[from] RatioError),
}
