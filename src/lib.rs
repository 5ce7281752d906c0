//! Faultline - log-driven root cause localization
//!
//! Given one incident's log export and a static service topology, Faultline
//! points at the node and log event most likely to be the root cause:
//!
//! - [`template`] mines a fixed vocabulary of message templates
//! - [`topology`] holds the dependency graph and its bounded traversal
//! - [`clustering`] turns an incident into de-noised per-node events
//! - [`causal_graph`] and [`training`] learn template-to-template causal
//!   edges from labeled incidents
//! - [`bayes`] fits a binary Bayesian network over that graph
//! - [`scorer`] ranks candidate root causes; [`locator`] ties it together

pub mod bayes;
pub mod causal_graph;
pub mod cli;
pub mod clustering;
pub mod config;
pub mod evaluation;
pub mod ingest;
pub mod locator;
pub mod ratio;
pub mod relation;
pub mod scorer;
pub mod template;
pub mod topology;
pub mod training;
