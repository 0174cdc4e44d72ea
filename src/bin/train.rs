//! heartguard-train: fit the inference pipeline and write its artifact.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use heartguard::adapters::{CsvDatasetSource, FileTracker, JsonArtifactStore};
use heartguard::application::TrainingService;
use heartguard::config::{TrainingConfig, CONFIG_ENV};
use heartguard::telemetry::{init_tracing, LogTarget};

/// Train the heart disease model
#[derive(Parser, Debug)]
#[command(name = "heartguard-train")]
#[command(version)]
#[command(about = "Fit, evaluate and persist the heart disease pipeline", long_about = None)]
struct Args {
    /// TOML configuration file (defaults to $HEARTGUARD_CONFIG if set)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Labeled CSV dataset
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Output artifact path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name of the label column
    #[arg(long)]
    label_column: Option<String>,

    /// Seed for the train/test split
    #[arg(long)]
    seed: Option<u64>,

    /// Experiment tracking directory
    #[arg(long)]
    tracking_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_tracing(&LogTarget::from_env()).context("failed to initialize logging")?;

    let config_path = args
        .config
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
    let mut config = TrainingConfig::resolve(config_path.as_deref())?;
    if let Some(data) = args.data {
        config.data_path = data;
    }
    if let Some(output) = args.output {
        config.artifact_path = output;
    }
    if let Some(label) = args.label_column {
        config.label_column = label;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(dir) = args.tracking_dir {
        config.tracking_dir = dir;
    }

    tracing::info!(data = %config.data_path.display(), "Starting training run");

    let source = CsvDatasetSource::new(&config.data_path).with_label_column(&config.label_column);
    let tracker = FileTracker::start_run(&config.tracking_dir, &config.experiment_name)
        .context("failed to start experiment run")?;
    let service = TrainingService::new(source, JsonArtifactStore::new(), tracker, config.options());

    let outcome = service
        .run(&config.artifact_path)
        .context("training failed")?;

    println!("run:       {}", outcome.run_id);
    println!("artifact:  {}", config.artifact_path.display());
    println!(
        "rows:      {} train / {} test ({} dropped)",
        outcome.train_rows, outcome.test_rows, outcome.dropped_rows
    );
    for (name, value) in outcome.report.metrics() {
        println!("{name:<10} {value:.4}");
    }
    Ok(())
}
