use anyhow::{Context, Result};
use clap::Parser;
use faultline::cli::{Cli, Command, OutputFormat, PipelineArgs};
use faultline::config::LocatorConfig;
use faultline::evaluation::EvaluationReport;
use faultline::ingest::read_incident_file;
use faultline::locator::{self, LocateResult, PipelinePaths};
use faultline::template::TemplateSet;
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn paths(args: &PipelineArgs) -> PipelinePaths {
    PipelinePaths::new(
        &args.corpus,
        &args.training,
        &args.topology,
        &args.cache_dir,
    )
}

fn print_templates(templates: &TemplateSet, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(templates.all_templates())?);
        }
        OutputFormat::Text => {
            println!("{:>5}  {:>9}  template", "id", "frequency");
            for template in templates.all_templates() {
                println!(
                    "{:>5}  {:>9.5}  {}",
                    template.id,
                    templates.frequency(template.id)?,
                    template.text
                );
            }
        }
    }
    Ok(())
}

fn print_result(result: &LocateResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => {
            let (Some(node), Some(message)) = (result.node, &result.message) else {
                println!("No root cause found");
                return Ok(());
            };
            println!("Root cause node: {}", node);
            println!("Message: {}", message);
            if let Some(subgraph) = &result.subgraph {
                println!(
                    "Evidence: {} nodes, {} edges",
                    subgraph.node_count(),
                    subgraph.edge_count()
                );
                for (u, v) in &subgraph.edges {
                    println!("  {} -> {}", u, v);
                }
            }
            println!("Candidates:");
            for c in &result.candidates {
                println!(
                    "  node {:>6}  score {:.6}  signal {:.6}  posterior {:.6}  {}",
                    c.node, c.score, c.signal, c.posterior, c.event.message
                );
            }
        }
    }
    Ok(())
}

fn print_report(report: &EvaluationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            println!("Labeled:   {}", report.n_labeled);
            println!("Located:   {}", report.n_located);
            println!("Correct:   {}", report.n_correct);
            println!("Precision: {:.4}", report.precision);
            println!("Recall:    {:.4}", report.recall);
            println!("F1:        {:.4}", report.f1);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let config = LocatorConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Templates {
            corpus,
            cache_dir,
            format,
        } => {
            let paths = PipelinePaths::new(corpus, PathBuf::new(), PathBuf::new(), cache_dir);
            let templates = locator::load_templates(&paths, &config)?;
            print_templates(&templates, format)?;
        }
        Command::Train { pipeline } => {
            let trained = locator::train(&paths(&pipeline), &config)?;
            println!("Templates:        {}", trained.templates.len());
            println!("Topology nodes:   {}", trained.topology.node_count());
            println!("Incidents:        {}", trained.corpus.incidents());
            println!("Training windows: {}", trained.corpus.windows().len());
            println!("Skipped:          {}", trained.corpus.skipped());
            println!("Causal edges:     {}", trained.graph.edge_count());
        }
        Command::Locate {
            pipeline,
            incident,
            relation,
            format,
        } => {
            let locator = locator::build(&paths(&pipeline), config)?;
            if relation {
                let events = read_incident_file(&incident, locator.templates(), false)?;
                let result = LocateResult::related(locator.locate_related(events)?);
                match (format, &result.node, &result.subgraph) {
                    (OutputFormat::Json, _, _) => print_result(&result, format)?,
                    (OutputFormat::Text, Some(node), Some(subgraph)) => {
                        println!("Root cause node: {}", node);
                        println!("Related nodes: {:?}", subgraph.nodes);
                    }
                    (OutputFormat::Text, _, _) => println!("No root cause found"),
                }
            } else {
                let file = File::open(&incident)
                    .with_context(|| format!("Failed to open incident: {}", incident.display()))?;
                let result = locator.locate(file)?;
                print_result(&result, format)?;
            }
        }
        Command::Evaluate {
            pipeline,
            labeled,
            format,
        } => {
            let dir = labeled.unwrap_or_else(|| pipeline.training.clone());
            let locator = locator::build(&paths(&pipeline), config)?;
            let report = locator.evaluate(&dir)?;
            print_report(&report, format)?;
        }
    }

    Ok(())
}
