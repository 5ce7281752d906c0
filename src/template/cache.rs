use crate::template::{Result, Template, TemplateError, TemplateSet};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Bumped whenever the on-disk layout changes
pub const TEMPLATE_CACHE_VERSION: u32 = 1;

/// On-disk form of a [`TemplateSet`]
///
/// Counts are stored rather than frequencies so a reload reproduces the exact
/// same `f64` values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateCache {
    pub version: u32,
    pub similarity_threshold: f64,
    pub templates: Vec<Template>,
    pub counts: Vec<u64>,
}

impl TemplateCache {
    fn into_set(self) -> Result<TemplateSet> {
        if self.version != TEMPLATE_CACHE_VERSION {
            return Err(TemplateError::VersionMismatch {
                expected: TEMPLATE_CACHE_VERSION,
                found: self.version,
            });
        }
        if self.templates.len() != self.counts.len() {
            return Err(TemplateError::InvalidCache(format!(
                "{} templates but {} counts",
                self.templates.len(),
                self.counts.len()
            )));
        }
        if let Some((pos, t)) = self
            .templates
            .iter()
            .enumerate()
            .find(|(pos, t)| t.id != *pos)
        {
            return Err(TemplateError::InvalidCache(format!(
                "template at position {} carries id {}",
                pos, t.id
            )));
        }
        Ok(TemplateSet::from_parts(
            self.templates,
            self.counts,
            self.similarity_threshold,
        ))
    }
}

pub fn save_cache(set: &TemplateSet, path: impl AsRef<Path>) -> Result<()> {
    let cache = TemplateCache {
        version: TEMPLATE_CACHE_VERSION,
        similarity_threshold: set.similarity_threshold(),
        templates: set.all_templates().to_vec(),
        counts: set.counts().to_vec(),
    };
    fs::write(path.as_ref(), serde_json::to_vec(&cache)?)?;
    Ok(())
}

pub fn load_cache(path: impl AsRef<Path>) -> Result<TemplateSet> {
    let bytes = fs::read(path.as_ref())?;
    let cache: TemplateCache = serde_json::from_slice(&bytes)?;
    cache.into_set()
}

/// Load the template set from `cache_path`, or mine it from `corpus` and persist it
///
/// A cache built with a different similarity threshold is discarded.
pub fn build_or_load<F>(
    cache_path: impl AsRef<Path>,
    similarity_threshold: f64,
    corpus: F,
) -> anyhow::Result<TemplateSet>
where
    F: FnOnce() -> anyhow::Result<Vec<String>>,
{
    let cache_path = cache_path.as_ref();
    if cache_path.exists() {
        let set = load_cache(cache_path).with_context(|| {
            format!("Failed to load template cache: {}", cache_path.display())
        })?;
        if set.similarity_threshold() == similarity_threshold {
            tracing::info!(path = %cache_path.display(), templates = set.len(), "loaded template cache");
            return Ok(set);
        }
        tracing::warn!(
            cached = set.similarity_threshold(),
            requested = similarity_threshold,
            "template cache built with another threshold, re-mining"
        );
    } else {
        tracing::info!(path = %cache_path.display(), "no template cache, mining corpus");
    }

    let messages = corpus()?;
    let set = TemplateSet::mine(&messages, similarity_threshold);
    save_cache(&set, cache_path)
        .with_context(|| format!("Failed to write template cache: {}", cache_path.display()))?;
    Ok(set)
}
