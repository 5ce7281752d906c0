//! Locator facade
//!
//! [`Locator`] owns the four process-wide read-only models (templates,
//! topology, Bayesian model, config) and answers one question per incident:
//! where is the root cause? [`build`] assembles a locator from on-disk data,
//! reusing every cache whose key still matches.
//!
//! # Example
//!
//! ```no_run
//! use faultline::config::LocatorConfig;
//! use faultline::locator::{build, PipelinePaths};
//! use std::fs::File;
//!
//! let paths = PipelinePaths::new("data/test", "data/train", "data/topology.json", ".faultline");
//! let locator = build(&paths, LocatorConfig::embedded()?)?;
//! let result = locator.locate(File::open("incident.csv")?)?;
//! if result.found {
//!     println!("root cause on node {:?}: {:?}", result.node, result.message);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::bayes::BayesianModel;
use crate::causal_graph::{self, CausalGraphBuilder};
use crate::clustering::{ClusteringError, IncidentView};
use crate::config::LocatorConfig;
use crate::evaluation::{Evaluation, EvaluationReport};
use crate::ingest::{corpus_messages, incident_files, read_incident, read_incident_file, IngestError, LogEvent};
use crate::relation::RelationLocator;
use crate::scorer::{Candidate, RootCauseScorer};
use crate::template::{self, TemplateId, TemplateSet};
use crate::topology::{AnyEdge, NodeId, Subgraph, TopologyGraph};
use crate::training::{self, TrainingCorpus};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Answer for one incident
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocateResult {
    pub found: bool,
    pub node: Option<NodeId>,
    pub message: Option<String>,
    pub template: Option<TemplateId>,
    /// Active neighbourhood of the located node (`result_jumps` hops)
    pub subgraph: Option<Subgraph>,
    /// Every surviving candidate, best first
    pub candidates: Vec<Candidate>,
}

impl LocateResult {
    pub fn not_found() -> Self {
        Self {
            found: false,
            node: None,
            message: None,
            template: None,
            subgraph: None,
            candidates: Vec::new(),
        }
    }

    /// Answer from the relation locator, which has no message or candidates
    pub fn related(located: Option<(NodeId, Subgraph)>) -> Self {
        match located {
            Some((node, subgraph)) => Self {
                found: true,
                node: Some(node),
                subgraph: Some(subgraph),
                ..Self::not_found()
            },
            None => Self::not_found(),
        }
    }
}

#[derive(Debug)]
pub struct Locator {
    templates: TemplateSet,
    topology: TopologyGraph,
    model: BayesianModel,
    config: LocatorConfig,
}

impl Locator {
    pub fn new(
        templates: TemplateSet,
        topology: TopologyGraph,
        model: BayesianModel,
        config: LocatorConfig,
    ) -> Self {
        Self {
            templates,
            topology,
            model,
            config,
        }
    }

    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    pub fn topology(&self) -> &TopologyGraph {
        &self.topology
    }

    pub fn model(&self) -> &BayesianModel {
        &self.model
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Cluster one incident's events
    pub fn view(&self, events: Vec<LogEvent>) -> Result<IncidentView<'_>, ClusteringError> {
        IncidentView::new(
            events,
            &self.templates,
            &self.topology,
            self.config.high_frequency_threshold,
        )
    }

    /// Locate the root cause of an incident export
    pub fn locate<R: Read>(&self, reader: R) -> Result<LocateResult> {
        let events = read_incident(reader, &self.templates, false)?;
        self.locate_events(events)
    }

    pub fn locate_events(&self, events: Vec<LogEvent>) -> Result<LocateResult> {
        let view = self.view(events)?;
        self.locate_view(&view)
    }

    fn locate_view(&self, view: &IncidentView<'_>) -> Result<LocateResult> {
        let scorer = RootCauseScorer::from_config(&self.model, &self.config);
        let candidates = scorer.rank(view)?;
        let Some(best) = candidates.first().cloned() else {
            tracing::info!(events = view.events().len(), "no root cause found");
            return Ok(LocateResult::not_found());
        };

        tracing::info!(node = best.node, template = ?best.event.template, score = best.score, "located root cause");
        Ok(LocateResult {
            found: true,
            node: Some(best.node),
            message: Some(best.event.message.clone()),
            template: best.event.template,
            subgraph: Some(view.evidence_subgraph(best.node, AnyEdge, self.config.result_jumps)),
            candidates,
        })
    }

    /// Baseline: node with the largest causally connected neighbourhood
    pub fn locate_related(&self, events: Vec<LogEvent>) -> Result<Option<(NodeId, Subgraph)>> {
        let view = self.view(events)?;
        let relation = RelationLocator::new(self.model.graph(), self.config.evidence_jumps);
        Ok(relation.locate(&view))
    }

    /// Score the locator against every labeled export in `dir`
    ///
    /// Exports with several root-cause labels are left out of the tally.
    pub fn evaluate<P: AsRef<Path>>(&self, dir: P) -> Result<EvaluationReport> {
        let mut evaluation = Evaluation::new();
        for path in incident_files(dir.as_ref())? {
            let events = match read_incident_file(&path, &self.templates, true) {
                Ok(events) => events,
                Err(e) => match e.downcast_ref::<IngestError>() {
                    Some(IngestError::MultipleRootCauses(n)) => {
                        tracing::warn!(path = %path.display(), labels = n, "skipping incident with multiple root causes");
                        continue;
                    }
                    _ => return Err(e),
                },
            };
            let view = self.view(events)?;
            let result = self
                .locate_view(&view)
                .with_context(|| format!("Failed to locate incident: {}", path.display()))?;
            let located = result.node.map(|node| (node, result.template));
            evaluation.record(view.root_cause(), located);
        }
        tracing::info!(
            labeled = evaluation.n_labeled,
            located = evaluation.n_located,
            correct = evaluation.n_correct,
            "evaluation finished"
        );
        Ok(evaluation.report()?)
    }
}

/// Input locations of the pipeline
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    /// Exports whose messages form the template-mining corpus
    pub corpus_dir: PathBuf,
    /// Labeled historical incidents
    pub training_dir: PathBuf,
    /// `{parent: [children]}` topology JSON
    pub topology: PathBuf,
    /// Directory of the JSON caches
    pub cache_dir: PathBuf,
}

impl PipelinePaths {
    pub fn new(
        corpus_dir: impl Into<PathBuf>,
        training_dir: impl Into<PathBuf>,
        topology: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            corpus_dir: corpus_dir.into(),
            training_dir: training_dir.into(),
            topology: topology.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn template_cache(&self) -> PathBuf {
        self.cache_dir.join("templates.json")
    }

    pub fn windows_cache(&self) -> PathBuf {
        self.cache_dir.join("windows.json")
    }

    pub fn graph_cache(&self) -> PathBuf {
        self.cache_dir.join("causal_graph.json")
    }
}

/// Cache key of the training windows
pub fn windows_key(templates: &TemplateSet, config: &LocatorConfig) -> String {
    format!(
        "{}:hf={}:jumps={}",
        templates.fingerprint(),
        config.high_frequency_threshold,
        config.evidence_jumps
    )
}

/// Cache key of the causal graph
pub fn graph_key(templates: &TemplateSet, config: &LocatorConfig) -> String {
    format!(
        "{}:support={}",
        windows_key(templates, config),
        config.min_edge_support
    )
}

/// Templates mined from (or cached for) the corpus directory
pub fn load_templates(paths: &PipelinePaths, config: &LocatorConfig) -> Result<TemplateSet> {
    fs::create_dir_all(&paths.cache_dir)
        .with_context(|| format!("Failed to create cache directory: {}", paths.cache_dir.display()))?;
    template::build_or_load(paths.template_cache(), config.similarity_threshold, || {
        corpus_messages(&paths.corpus_dir)
    })
}

/// Everything training produces
#[derive(Debug)]
pub struct Trained {
    pub templates: TemplateSet,
    pub topology: TopologyGraph,
    pub corpus: TrainingCorpus,
    pub graph: causal_graph::CausalGraph,
}

/// Templates, topology, training windows and causal graph, cached where possible
pub fn train(paths: &PipelinePaths, config: &LocatorConfig) -> Result<Trained> {
    let templates = load_templates(paths, config)?;
    let topology = TopologyGraph::from_file(&paths.topology)?;

    let corpus = training::build_or_load(
        paths.windows_cache(),
        &windows_key(&templates, config),
        &paths.training_dir,
        &templates,
        &topology,
        config.window_params(),
    )?;

    let key = graph_key(&templates, config);
    let graph = match causal_graph::load_cache(paths.graph_cache(), &key)? {
        Some(graph) => {
            tracing::info!(edges = graph.edge_count(), "loaded causal graph cache");
            graph
        }
        None => {
            let graph = CausalGraphBuilder::new(config.min_edge_support)
                .build(corpus.windows(), templates.len());
            causal_graph::save_cache(&graph, &key, paths.graph_cache())?;
            graph
        }
    };

    Ok(Trained {
        templates,
        topology,
        corpus,
        graph,
    })
}

/// Train (or load) every model and assemble a [`Locator`]
pub fn build(paths: &PipelinePaths, config: LocatorConfig) -> Result<Locator> {
    config.validate().map_err(anyhow::Error::msg)?;
    let trained = train(paths, &config)?;
    let data = trained.corpus.occurrence_matrix(trained.templates.len());
    let model = BayesianModel::fit(trained.graph, &data, config.equivalent_sample_size)
        .context("Failed to fit Bayesian model")?;
    Ok(Locator::new(trained.templates, trained.topology, model, config))
}
