//! CLI argument parsing for Faultline

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format of verdicts and reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "faultline")]
#[command(version)]
#[command(about = "Log-driven root cause localization over a service topology", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    /// Locator settings (TOML); keys left out keep the built-in defaults
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mine (or load) the template set and list it
    Templates {
        /// Directory of incident exports forming the mining corpus
        #[arg(long = "corpus", value_name = "DIR")]
        corpus: PathBuf,

        /// Directory of the JSON caches
        #[arg(long = "cache-dir", value_name = "DIR", default_value = ".faultline")]
        cache_dir: PathBuf,

        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Build (or load) training windows and the causal graph
    Train {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Locate the root cause of one incident export
    Locate {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Incident export (CSV)
        #[arg(value_name = "INCIDENT")]
        incident: PathBuf,

        /// Use the relation locator instead of Bayesian scoring
        #[arg(long = "relation")]
        relation: bool,

        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Precision/recall/F1 over a directory of labeled incidents
    Evaluate {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Labeled incidents to score (defaults to the training directory)
        #[arg(long = "labeled", value_name = "DIR")]
        labeled: Option<PathBuf>,

        #[arg(long = "format", value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Inputs shared by every command that needs trained models
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Directory of incident exports forming the mining corpus
    #[arg(long = "corpus", value_name = "DIR")]
    pub corpus: PathBuf,

    /// Directory of labeled historical incidents
    #[arg(long = "training", value_name = "DIR")]
    pub training: PathBuf,

    /// Topology JSON (`{"parent": ["child", ...]}`)
    #[arg(long = "topology", value_name = "FILE")]
    pub topology: PathBuf,

    /// Directory of the JSON caches
    #[arg(long = "cache-dir", value_name = "DIR", default_value = ".faultline")]
    pub cache_dir: PathBuf,
}
