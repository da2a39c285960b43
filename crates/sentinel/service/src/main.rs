//! sentineld - ensemble anomaly detector
//!
//! - `detect`: analyze one batch file and print the anomalies as JSON
//! - `run`: analyze newline-delimited JSON batches from stdin while the
//!   retrain scheduler runs in the background

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sentinel_engine::EnsembleEngine;
use sentinel_service::{input, telemetry, RetrainScheduler, ServiceConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Sentinel daemon CLI
#[derive(Parser)]
#[command(name = "sentineld")]
#[command(
    about = "Sentinel - ensemble anomaly detection for infrastructure metrics",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SENTINEL_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configuration file)
    #[arg(long, env = "SENTINEL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "SENTINEL_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a single batch file (JSON array of samples)
    Detect {
        #[arg(short, long)]
        input: String,
    },
    /// Analyze newline-delimited batches from stdin until EOF or Ctrl-C
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    telemetry::init_tracing(&config.logging)?;

    let engine = Arc::new(EnsembleEngine::new(config.engine.clone()).context("building engine")?);

    match cli.command {
        Command::Detect { input } => {
            let batch = input::read_batch_file(&input)
                .with_context(|| format!("reading {}", input))?;
            let anomalies = engine.detect(&batch).await;
            println!("{}", serde_json::to_string_pretty(&anomalies)?);
        }
        Command::Run => run(config, engine).await?,
    }

    Ok(())
}

async fn run(config: ServiceConfig, engine: Arc<EnsembleEngine>) -> anyhow::Result<()> {
    let scheduler = RetrainScheduler::new(config.scheduler.clone(), engine.clone());
    let scheduler_handle = tokio::spawn(scheduler.clone().start());

    tracing::info!(
        strategies = ?config.engine.strategies,
        window_size = config.engine.window_size,
        "sentineld reading batches from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match input::parse_batch(&line) {
                    Ok(batch) => {
                        let anomalies = engine.detect(&batch).await;
                        println!("{}", serde_json::to_string(&anomalies)?);
                    }
                    Err(e) => tracing::warn!(error = %e, "Skipping unparseable batch"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received");
                break;
            }
        }
    }

    scheduler.stop();
    scheduler_handle.await?;
    tracing::info!(diagnostics = ?engine.diagnostics(), "sentineld stopped");
    Ok(())
}
