//! Training corpus: evidence windows of labeled historical incidents
//!
//! Each labeled incident is clustered, and the templates on every node of the
//! bounded evidence subgraph around its root-cause node form one
//! [`EvidenceWindow`]. Windows feed both the causal graph builder (support
//! counts) and the Bayesian model (occurrence matrix).
//!
//! Incidents are independent of each other, so window extraction runs on the
//! rayon pool. Results keep the input order; everything order-sensitive
//! downstream runs single-threaded on the merged list.

use crate::causal_graph::EvidenceWindow;
use crate::clustering::{ClusteringError, IncidentView};
use crate::ingest::{incident_files, read_incident_file, IngestError, LogEvent};
use crate::template::{TemplateId, TemplateSet};
use crate::topology::{AnyEdge, TopologyGraph};
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Parameters of window extraction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowParams {
    pub high_frequency_threshold: f64,
    pub evidence_jumps: usize,
}

/// Evidence window of one labeled incident
///
/// `Ok(None)` when the incident has no usable root cause (no label, or the
/// labeled message matches no template).
pub fn evidence_window(
    events: Vec<LogEvent>,
    templates: &TemplateSet,
    topology: &TopologyGraph,
    params: WindowParams,
) -> Result<Option<EvidenceWindow>, ClusteringError> {
    let view = IncidentView::new(
        events,
        templates,
        topology,
        params.high_frequency_threshold,
    )?;
    let Some(root) = view.root_cause() else {
        return Ok(None);
    };
    let Some(root_template) = root.template else {
        tracing::debug!(node = root.node, message = %root.message, "root cause matches no template");
        return Ok(None);
    };

    let subgraph = view.evidence_subgraph(root.node, AnyEdge, params.evidence_jumps);
    let mut evidence_templates = view.templates_on(&subgraph.nodes);
    evidence_templates.insert(root_template);

    Ok(Some(EvidenceWindow {
        root_template,
        evidence_templates,
    }))
}

/// Binary occurrence table: one row per window, one column per template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceMatrix {
    columns: usize,
    rows: Vec<Vec<bool>>,
}

impl OccurrenceMatrix {
    /// Root templates are marked as occurred in their own row
    pub fn from_windows(windows: &[EvidenceWindow], columns: usize) -> Self {
        let rows = windows
            .iter()
            .map(|window| {
                let mut row = vec![false; columns];
                for &t in window
                    .evidence_templates
                    .iter()
                    .chain(std::iter::once(&window.root_template))
                {
                    if t < columns {
                        row[t] = true;
                    }
                }
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<bool>] {
        &self.rows
    }

    pub fn get(&self, row: usize, column: TemplateId) -> bool {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .copied()
            .unwrap_or(false)
    }
}

/// Evidence windows of a set of labeled incidents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingCorpus {
    windows: Vec<EvidenceWindow>,
    incidents: usize,
    skipped: usize,
}

impl TrainingCorpus {
    pub fn from_windows(windows: Vec<EvidenceWindow>, incidents: usize) -> Self {
        let skipped = incidents.saturating_sub(windows.len());
        Self {
            windows,
            incidents,
            skipped,
        }
    }

    /// Extract windows from already parsed incidents
    pub fn from_incidents(
        incidents: Vec<Vec<LogEvent>>,
        templates: &TemplateSet,
        topology: &TopologyGraph,
        params: WindowParams,
    ) -> Result<Self, ClusteringError> {
        let total = incidents.len();
        let windows = incidents
            .into_par_iter()
            .map(|events| evidence_window(events, templates, topology, params))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_windows(windows.into_iter().flatten().collect(), total))
    }

    /// Extract windows from every labeled export in `dir`
    ///
    /// Incidents carrying more than one root-cause label are skipped with a
    /// warning; any other read or parse failure aborts.
    pub fn from_dir<P: AsRef<Path>>(
        dir: P,
        templates: &TemplateSet,
        topology: &TopologyGraph,
        params: WindowParams,
    ) -> Result<Self> {
        let files = incident_files(dir.as_ref())?;
        let total = files.len();
        tracing::info!(incidents = total, dir = %dir.as_ref().display(), "extracting training windows");

        let windows = files
            .par_iter()
            .map(|path| -> Result<Option<EvidenceWindow>> {
                let events = match read_incident_file(path, templates, true) {
                    Ok(events) => events,
                    Err(e) => match e.downcast_ref::<IngestError>() {
                        Some(IngestError::MultipleRootCauses(n)) => {
                            tracing::warn!(path = %path.display(), labels = n, "skipping incident with multiple root causes");
                            return Ok(None);
                        }
                        _ => return Err(e),
                    },
                };
                let window = evidence_window(events, templates, topology, params)
                    .with_context(|| format!("Failed to cluster incident: {}", path.display()))?;
                if window.is_none() {
                    tracing::debug!(path = %path.display(), "incident has no usable root cause");
                }
                Ok(window)
            })
            .collect::<Result<Vec<_>>>()?;

        let corpus = Self::from_windows(windows.into_iter().flatten().collect(), total);
        tracing::info!(
            windows = corpus.windows.len(),
            skipped = corpus.skipped,
            "training windows ready"
        );
        Ok(corpus)
    }

    pub fn windows(&self) -> &[EvidenceWindow] {
        &self.windows
    }

    /// Number of incidents inspected, including skipped ones
    pub fn incidents(&self) -> usize {
        self.incidents
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn occurrence_matrix(&self, columns: usize) -> OccurrenceMatrix {
        OccurrenceMatrix::from_windows(&self.windows, columns)
    }
}

/// On-disk form of a training corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrainingCache {
    key: String,
    corpus: TrainingCorpus,
}

/// Load windows cached under `key`, or extract them from `dir` and persist them
pub fn build_or_load<P: AsRef<Path>, Q: AsRef<Path>>(
    cache_path: P,
    key: &str,
    dir: Q,
    templates: &TemplateSet,
    topology: &TopologyGraph,
    params: WindowParams,
) -> Result<TrainingCorpus> {
    let cache_path = cache_path.as_ref();
    if cache_path.exists() {
        let bytes = fs::read(cache_path)
            .with_context(|| format!("Failed to read training cache: {}", cache_path.display()))?;
        let cache: TrainingCache = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid training cache: {}", cache_path.display()))?;
        if cache.key == key {
            tracing::info!(path = %cache_path.display(), windows = cache.corpus.windows.len(), "loaded training cache");
            return Ok(cache.corpus);
        }
        tracing::info!(path = %cache_path.display(), "training cache is stale, rebuilding");
    }

    let corpus = TrainingCorpus::from_dir(dir, templates, topology, params)?;
    let cache = TrainingCache {
        key: key.to_string(),
        corpus,
    };
    fs::write(cache_path, serde_json::to_vec(&cache)?)
        .with_context(|| format!("Failed to write training cache: {}", cache_path.display()))?;
    Ok(cache.corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn labeled(node: u32, message: &str, template: usize, root: bool) -> LogEvent {
        LogEvent {
            node,
            message: message.to_string(),
            template: Some(template),
            is_root: Some(root),
        }
    }

    fn setup() -> (TemplateSet, TopologyGraph) {
        let corpus: Vec<String> = ["aaaa", "bbbb", "cccc", "dddd"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        (
            TemplateSet::mine(&corpus, 0.8),
            TopologyGraph::from_edges([(1, 2), (2, 3), (3, 4)]).unwrap(),
        )
    }

    const PARAMS: WindowParams = WindowParams {
        high_frequency_threshold: 1.0,
        evidence_jumps: 2,
    };

    #[test]
    fn test_window_collects_two_hops() {
        let (tpl, topo) = setup();
        let events = vec![
            labeled(1, "aaaa", 0, true),
            labeled(2, "bbbb", 1, false),
            labeled(3, "cccc", 2, false),
            labeled(4, "dddd", 3, false),
        ];
        let window = evidence_window(events, &tpl, &topo, PARAMS).unwrap().unwrap();
        assert_eq!(window.root_template, 0);
        assert_eq!(window.evidence_templates, BTreeSet::from([0, 1, 2]));
    }

    #[test]
    fn test_window_without_root_is_none() {
        let (tpl, topo) = setup();
        let events = vec![labeled(1, "aaaa", 0, false)];
        assert!(evidence_window(events, &tpl, &topo, PARAMS).unwrap().is_none());
    }

    #[test]
    fn test_window_with_unmatched_root_is_none() {
        let (tpl, topo) = setup();
        let mut root = labeled(1, "zzzz", 0, true);
        root.template = None;
        assert!(evidence_window(vec![root], &tpl, &topo, PARAMS).unwrap().is_none());
    }

    #[test]
    fn test_corpus_counts_skipped() {
        let (tpl, topo) = setup();
        let incidents = vec![
            vec![labeled(1, "aaaa", 0, true)],
            vec![labeled(1, "aaaa", 0, false)],
        ];
        let corpus = TrainingCorpus::from_incidents(incidents, &tpl, &topo, PARAMS).unwrap();
        assert_eq!(corpus.windows().len(), 1);
        assert_eq!(corpus.incidents(), 2);
        assert_eq!(corpus.skipped(), 1);
    }

    #[test]
    fn test_occurrence_matrix_marks_root() {
        let windows = vec![
            EvidenceWindow {
                root_template: 2,
                evidence_templates: BTreeSet::from([0]),
            },
            EvidenceWindow {
                root_template: 1,
                evidence_templates: BTreeSet::from([1, 3]),
            },
        ];
        let matrix = OccurrenceMatrix::from_windows(&windows, 4);
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix.rows()[0], vec![true, false, true, false]);
        assert_eq!(matrix.rows()[1], vec![false, true, false, true]);
        assert!(!matrix.get(5, 0));
    }

    #[test]
    fn test_from_dir_skips_multiple_roots() {
        let (tpl, topo) = setup();
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join("0.csv"),
            "triggername,is_root\nnode_1 aaaa,1\nnode_2 bbbb,0\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("1.csv"),
            "triggername,is_root\nnode_1 aaaa,1\nnode_2 bbbb,1\n",
        )
        .unwrap();

        let corpus = TrainingCorpus::from_dir(dir.path(), &tpl, &topo, PARAMS).unwrap();
        assert_eq!(corpus.incidents(), 2);
        assert_eq!(corpus.windows().len(), 1);
        assert_eq!(
            corpus.windows()[0].evidence_templates,
            BTreeSet::from([0, 1])
        );
    }

    #[test]
    fn test_cache_reused_and_invalidated() {
        let (tpl, topo) = setup();
        let data = tempfile::TempDir::new().unwrap();
        fs::write(
            data.path().join("0.csv"),
            "triggername,is_root\nnode_1 aaaa,1\n",
        )
        .unwrap();
        let cache = data.path().join("windows.json");

        let first = build_or_load(&cache, "k1", data.path(), &tpl, &topo, PARAMS).unwrap();
        assert_eq!(first.windows().len(), 1);

        // Removing the data proves the second call is served from the cache
        fs::remove_file(data.path().join("0.csv")).unwrap();
        let cached = build_or_load(&cache, "k1", data.path(), &tpl, &topo, PARAMS).unwrap();
        assert_eq!(cached, first);

        let rebuilt = build_or_load(&cache, "k2", data.path(), &tpl, &topo, PARAMS).unwrap();
        assert_eq!(rebuilt.windows().len(), 0);
    }
}
