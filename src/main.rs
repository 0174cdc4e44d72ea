//! heartguard: heart disease prediction service
//!
//! Loads a fitted pipeline artifact and serves `POST /predict`,
//! `GET /metrics` and `GET /health`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use heartguard::config::{ServiceConfig, CONFIG_ENV};
use heartguard::server;
use heartguard::telemetry::{init_tracing, LogTarget};

/// Heart disease prediction service
#[derive(Parser, Debug)]
#[command(name = "heartguard")]
#[command(version)]
#[command(about = "Serve heart disease predictions over HTTP", long_about = None)]
struct Args {
    /// TOML configuration file (defaults to $HEARTGUARD_CONFIG if set)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(short, long)]
    bind: Option<String>,

    /// Fitted pipeline artifact
    #[arg(short, long)]
    artifact: Option<PathBuf>,

    /// Include the positive-class probability in responses
    #[arg(long)]
    include_probability: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_tracing(&LogTarget::from_env()).context("failed to initialize logging")?;

    let config_path = args
        .config
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));
    let mut config = ServiceConfig::resolve(config_path.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(artifact) = args.artifact {
        config.artifact_path = artifact;
    }
    if args.include_probability {
        config.include_probability = true;
    }

    tracing::info!(
        artifact = %config.artifact_path.display(),
        bind = %config.bind_addr,
        "Starting heartguard"
    );

    let server = match server::start(&config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start prediction server");
            return Err(e).context("cannot start heartguard");
        }
    };
    server.run().await?;

    tracing::info!("heartguard shutdown complete.");
    Ok(())
}
