use crate::ratio::count_ratio;
use crate::template::similarity::CharSet;
use crate::template::union_find::UnionFind;
use crate::template::{Result, TemplateError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Dense template identifier (`0..K-1`)
pub type TemplateId = usize;

/// One class of log message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    /// Earliest source message of the cluster
    pub text: String,
}

/// Immutable vocabulary of templates with their corpus frequencies
///
/// Built once by [`TemplateSet::mine`] (or restored from a cache) and shared
/// read-only by every incident afterwards.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: Vec<Template>,
    counts: Vec<u64>,
    total: u64,
    similarity_threshold: f64,
    char_sets: Vec<CharSet>,
}

impl TemplateSet {
    /// Cluster a corpus of raw message bodies into templates
    ///
    /// Pass one merges exact duplicates; pass two compares only the distinct
    /// messages and merges every pair whose similarity exceeds the threshold.
    /// Components are numbered in order of their earliest message.
    pub fn mine(messages: &[String], similarity_threshold: f64) -> Self {
        let n = messages.len();
        let mut components = UnionFind::new(n);

        let mut first_seen: HashMap<&str, usize> = HashMap::new();
        let mut distinct = Vec::new();
        for (idx, message) in messages.iter().enumerate() {
            match first_seen.get(message.as_str()) {
                Some(&first) => {
                    components.union(first, idx);
                }
                None => {
                    first_seen.insert(message.as_str(), idx);
                    distinct.push(idx);
                }
            }
        }
        tracing::debug!(
            messages = n,
            distinct = distinct.len(),
            "exact-duplicate pass finished"
        );

        let distinct_sets: Vec<CharSet> =
            distinct.iter().map(|&i| CharSet::new(&messages[i])).collect();
        for a in 0..distinct.len() {
            for b in (a + 1)..distinct.len() {
                if distinct_sets[a].cosine(&distinct_sets[b]) > similarity_threshold {
                    components.union(distinct[a], distinct[b]);
                }
            }
        }

        let mut root_to_id: HashMap<usize, TemplateId> = HashMap::new();
        let mut templates = Vec::with_capacity(components.components());
        let mut counts: Vec<u64> = Vec::with_capacity(components.components());
        for (idx, message) in messages.iter().enumerate() {
            let root = components.find(idx);
            let id = *root_to_id.entry(root).or_insert_with(|| {
                templates.push(Template {
                    id: templates.len(),
                    text: message.clone(),
                });
                counts.push(0);
                templates.len() - 1
            });
            counts[id] += 1;
        }

        tracing::info!(templates = templates.len(), messages = n, "mined log templates");
        Self::from_parts(templates, counts, similarity_threshold)
    }

    /// Rebuild a set from persisted parts
    pub(crate) fn from_parts(
        templates: Vec<Template>,
        counts: Vec<u64>,
        similarity_threshold: f64,
    ) -> Self {
        let char_sets = templates.iter().map(|t| CharSet::new(&t.text)).collect();
        let total = counts.iter().sum();
        Self {
            templates,
            counts,
            total,
            similarity_threshold,
            char_sets,
        }
    }

    /// Template of a message, or `None` when no representative is similar enough
    ///
    /// Representatives are tried in id order; the first one whose similarity
    /// exceeds the threshold wins.
    pub fn template_for(&self, message: &str) -> Option<TemplateId> {
        let probe = CharSet::new(message);
        self.templates
            .iter()
            .zip(&self.char_sets)
            .find(|(template, set)| {
                template.text == message || probe.cosine(set) > self.similarity_threshold
            })
            .map(|(template, _)| template.id)
    }

    /// Share of corpus messages that belong to a template
    pub fn frequency(&self, id: TemplateId) -> Result<f64> {
        let count = *self
            .counts
            .get(id)
            .ok_or(TemplateError::UnknownTemplate(id))?;
        Ok(count_ratio(count as usize, self.total as usize, "template frequency")?)
    }

    pub fn representative_text(&self, id: TemplateId) -> Option<&str> {
        self.templates.get(id).map(|t| t.text.as_str())
    }

    pub fn all_templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn count(&self, id: TemplateId) -> Option<u64> {
        self.counts.get(id).copied()
    }

    pub(crate) fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn similarity_threshold(&self) -> f64 {
        self.similarity_threshold
    }

    /// SHA-256 over ids, texts, counts and threshold
    ///
    /// Derived caches (causal graph, training windows) record this value and are
    /// rebuilt when it changes, since they reference templates by id.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.similarity_threshold.to_bits().to_le_bytes());
        for (template, count) in self.templates.iter().zip(&self.counts) {
            hasher.update((template.id as u64).to_le_bytes());
            hasher.update((template.text.len() as u64).to_le_bytes());
            hasher.update(template.text.as_bytes());
            hasher.update(count.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
