//! Batch command - process many captured analysis events concurrently.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use clap::Args;
use console::style;
use futures_util::stream::{self, StreamExt};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};

use rcpt_core::{ObjectRef, Pipeline, PipelineConfig, PipelineOutcome, SourceEvent};

use crate::local::{DirStore, NullChannel, ReplayAnalyzer};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Bucket of the source image objects
    #[arg(long, default_value = "local")]
    bucket: String,

    /// Root directory for stored receipts
    #[arg(short, long, default_value = "receipts-store")]
    store_dir: PathBuf,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of events processed concurrently
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Report failed events without failing the run
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single event file.
struct EventResult {
    path: PathBuf,
    outcome: PipelineOutcome,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    // Load configuration
    let config = if let Some(path) = config_path {
        PipelineConfig::from_file(Path::new(path))?
    } else {
        PipelineConfig::default()
    };

    // Expand glob pattern
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|entry| entry.ok())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} events to process",
        style("ℹ").blue(),
        files.len()
    );

    let store = DirStore::new(&args.store_dir, &config.store.table);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} events")
            .unwrap()
            .progress_chars("=>-"),
    );

    // Units of work are independent; they share nothing but the store's
    // idempotency key, so they can run concurrently.
    let results: Vec<EventResult> = stream::iter(files.into_iter().map(|path| {
        let store = store.clone();
        let config = config.clone();
        let bucket = args.bucket.clone();
        let pb = pb.clone();

        async move {
            let key = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("event")
                .to_string();
            let event = SourceEvent::new(ObjectRef::new(bucket, key), Utc::now());

            let pipeline = Pipeline::new(ReplayAnalyzer::new(&path), store, NullChannel, &config);
            let outcome = pipeline.process(&event).await;

            pb.inc(1);
            EventResult { path, outcome }
        }
    }))
    .buffer_unordered(args.jobs.max(1))
    .collect()
    .await;

    pb.finish_with_message("Complete");

    let failed: Vec<&EventResult> = results
        .iter()
        .filter(|result| !result.outcome.is_success())
        .collect();

    // Generate summary if requested
    if args.summary {
        let summary_path = args.store_dir.join("summary.csv");
        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} events in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} succeeded, {} failed",
        style(results.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed events:").red());
        for result in &failed {
            println!("  - {} [{}]", result.path.display(), result.outcome.label());
        }

        if !args.continue_on_error {
            anyhow::bail!("{} events failed", failed.len());
        }
    }

    Ok(())
}

fn write_summary(path: &Path, results: &[EventResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "file",
        "outcome",
        "receipt_id",
        "vendor",
        "transaction_date",
        "total",
        "confidence",
    ])?;

    for result in results {
        let file = result
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");

        match result.outcome.receipt() {
            Some(receipt) => {
                wtr.write_record([
                    file,
                    result.outcome.label(),
                    receipt.id.as_str(),
                    receipt.vendor_name.as_deref().unwrap_or(""),
                    &receipt
                        .transaction_date
                        .map(|d| d.to_string())
                        .unwrap_or_default(),
                    &receipt
                        .total_amount
                        .map(|t| t.to_string())
                        .unwrap_or_default(),
                    &format!("{:.2}", receipt.extraction_confidence),
                ])?;
            }
            None => {
                wtr.write_record([file, result.outcome.label(), "", "", "", "", ""])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
