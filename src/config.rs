// Locator configuration
//
// Every tunable of the pipeline lives here instead of in the algorithms. The
// deployment defaults ship inside the binary (`locator-default.toml`); a user
// file only needs the keys it overrides.

use crate::template::TemplateId;
use crate::training::WindowParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../locator-default.toml");

/// Tunables of template mining, clustering, training and scoring
///
/// # Example
/// ```
/// use faultline::config::LocatorConfig;
///
/// let config = LocatorConfig::embedded().unwrap();
/// assert_eq!(config.evidence_jumps, 2);
/// assert!(config.actionable_templates.contains(&9));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocatorConfig {
    /// Cosine similarity a message must exceed to join a template
    pub similarity_threshold: f64,

    /// Corpus frequency above which a template is treated as noise
    ///
    /// Default: 0.07
    pub high_frequency_threshold: f64,

    /// Topology hops explored for evidence, in training and in scoring
    pub evidence_jumps: usize,

    /// Topology hops of the subgraph returned with a verdict
    pub result_jumps: usize,

    /// Training incidents needed before a causal edge is kept
    pub min_edge_support: usize,

    /// Minimum frequency signal of a candidate
    pub noise_floor: f64,

    /// BDeu prior strength
    pub equivalent_sample_size: f64,

    /// Templates allowed to be reported as a root cause
    ///
    /// Empty unless configured; see [`LocatorConfig::embedded`].
    pub actionable_templates: BTreeSet<TemplateId>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.80,
            high_frequency_threshold: 0.07,
            evidence_jumps: 2,
            result_jumps: 3,
            min_edge_support: 3,
            noise_floor: 0.01,
            equivalent_sample_size: 5.0,
            actionable_templates: BTreeSet::new(),
        }
    }
}

impl LocatorConfig {
    /// Deployment defaults compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(DEFAULT_TOML).context("Failed to parse embedded locator-default.toml")
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse locator TOML")?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    /// Load a TOML file; keys it omits keep their built-in defaults
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Embedded defaults, or the given file when present
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_toml(path),
            None => Self::embedded(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("high_frequency_threshold", self.high_frequency_threshold),
            ("noise_floor", self.noise_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be in [0, 1], got {}", name, value));
            }
        }

        if self.evidence_jumps == 0 {
            return Err("evidence_jumps must be at least 1".to_string());
        }

        if self.result_jumps == 0 {
            return Err("result_jumps must be at least 1".to_string());
        }

        if self.min_edge_support == 0 {
            return Err("min_edge_support must be at least 1".to_string());
        }

        if !(self.equivalent_sample_size.is_finite() && self.equivalent_sample_size > 0.0) {
            return Err(format!(
                "equivalent_sample_size must be positive, got {}",
                self.equivalent_sample_size
            ));
        }

        Ok(())
    }

    pub fn window_params(&self) -> WindowParams {
        WindowParams {
            high_frequency_threshold: self.high_frequency_threshold,
            evidence_jumps: self.evidence_jumps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = LocatorConfig::default();
        assert_eq!(config.similarity_threshold, 0.80);
        assert_eq!(config.high_frequency_threshold, 0.07);
        assert_eq!(config.min_edge_support, 3);
        assert!(config.actionable_templates.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_embedded_allow_list() {
        let config = LocatorConfig::embedded().unwrap();
        assert_eq!(
            config.actionable_templates,
            BTreeSet::from([0, 2, 3, 9, 10, 14, 19, 21, 22])
        );
        assert_eq!(config.result_jumps, 3);
        assert_eq!(config.equivalent_sample_size, 5.0);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = LocatorConfig::from_toml_str("noise_floor = 0.02\nactionable_templates = [4]")
            .unwrap();
        assert_eq!(config.noise_floor, 0.02);
        assert_eq!(config.actionable_templates, BTreeSet::from([4]));
        assert_eq!(config.evidence_jumps, 2);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(LocatorConfig::from_toml_str("similarity_threshold = 1.5").is_err());
        assert!(LocatorConfig::from_toml_str("evidence_jumps = 0").is_err());
        assert!(LocatorConfig::from_toml_str("min_edge_support = 0").is_err());
        assert!(LocatorConfig::from_toml_str("equivalent_sample_size = 0.0").is_err());
        assert!(LocatorConfig::from_toml_str("unknown_key = 1").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "result_jumps = 5").unwrap();
        let config = LocatorConfig::from_toml(file.path()).unwrap();
        assert_eq!(config.result_jumps, 5);

        assert!(LocatorConfig::from_toml("/nonexistent/faultline.toml").is_err());
    }

    #[test]
    fn test_load_without_path_is_embedded() {
        assert_eq!(
            LocatorConfig::load(None).unwrap(),
            LocatorConfig::embedded().unwrap()
        );
    }
}
