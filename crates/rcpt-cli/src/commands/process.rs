//! Process command - run the pipeline for one captured analysis event.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Args;
use console::style;
use tracing::info;

use rcpt_core::notify::render_text_body;
use rcpt_core::{
    DocumentAnalyzer, ObjectRef, Pipeline, PipelineConfig, PipelineOutcome, Receipt, SourceEvent,
};
use rcpt_rest::RestAnalyzer;

use crate::local::{ConsoleChannel, DirStore, NullChannel, ReplayAnalyzer};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Captured analysis response (JSON)
    #[arg(required = true)]
    input: PathBuf,

    /// Bucket of the source image object
    #[arg(long, default_value = "local")]
    bucket: String,

    /// Key of the source image object (default: input file name)
    #[arg(long)]
    key: Option<String>,

    /// Fetch the analysis from a REST endpoint instead of the input file
    #[arg(long)]
    endpoint: Option<String>,

    /// Root directory for stored receipts
    #[arg(short, long, default_value = "receipts-store")]
    store_dir: PathBuf,

    /// Print the rendered notification
    #[arg(long)]
    notify: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show extraction confidence
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    // Load configuration
    let config = if let Some(path) = config_path {
        PipelineConfig::from_file(Path::new(path))?
    } else {
        PipelineConfig::default()
    };

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let key = args.key.clone().unwrap_or_else(|| {
        args.input
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("receipt")
            .to_string()
    });
    let event = SourceEvent::new(ObjectRef::new(args.bucket.clone(), key), Utc::now());

    info!("Processing event for {}", event.source);

    let store = DirStore::new(&args.store_dir, &config.store.table);
    let endpoint = args
        .endpoint
        .clone()
        .or_else(|| config.analyzer.endpoint.clone());

    let outcome = match endpoint {
        Some(endpoint) => {
            info!("Using analysis endpoint {endpoint}");
            run_pipeline(RestAnalyzer::new(endpoint), store, &args, &config, &event).await
        }
        None => run_pipeline(ReplayAnalyzer::new(&args.input), store, &args, &config, &event).await,
    };

    report(outcome, &args)
}

async fn run_pipeline<A: DocumentAnalyzer>(
    analyzer: A,
    store: DirStore,
    args: &ProcessArgs,
    config: &PipelineConfig,
    event: &SourceEvent,
) -> PipelineOutcome {
    if args.notify {
        Pipeline::new(analyzer, store, ConsoleChannel, config)
            .process(event)
            .await
    } else {
        Pipeline::new(analyzer, store, NullChannel, config)
            .process(event)
            .await
    }
}

fn report(outcome: PipelineOutcome, args: &ProcessArgs) -> anyhow::Result<()> {
    if matches!(outcome, PipelineOutcome::CompletedWithNotificationWarning(_)) {
        eprintln!(
            "{} Notification dispatch failed; the record was still stored.",
            style("!").yellow()
        );
    }

    let retriable = outcome.is_retriable();
    let receipt = outcome.into_result().map_err(|err| {
        let hint = if retriable { " (retriable)" } else { "" };
        anyhow::anyhow!("{err}{hint}")
    })?;

    let output = format_receipt(&receipt, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{output}");
    }

    if args.show_confidence {
        println!();
        println!(
            "{} Extraction confidence: {:.1}%",
            style("ℹ").blue(),
            receipt.extraction_confidence * 100.0
        );
    }

    Ok(())
}

fn format_receipt(receipt: &Receipt, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(receipt)?),
        OutputFormat::Text => Ok(render_text_body(receipt)),
    }
}
