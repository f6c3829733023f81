//! CLI entry point for the mixtape tool.

use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use mixtape_core::{DirectResolver, HttpItemProcessor, Orchestrator, OrchestratorError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod app;
mod cli;

use app::config_manager::resolve_config;
use app::input_processor::collect_inputs;
use app::progress_manager::spawn_progress_ui;
use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = resolve_config(&args)?;
    let inputs = collect_inputs(&args.urls)?;
    if inputs.is_empty() {
        info!("No input provided. Pass URLs as arguments or pipe them via stdin.");
        info!("Example: echo 'https://example.com/song.mp3' | mixtape");
        return Ok(());
    }

    info!(
        inputs = inputs.len(),
        output = %config.output_root.display(),
        auto_retry = config.auto_retry_enabled,
        max_retries = config.max_retries,
        "mixtape starting"
    );

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(HttpItemProcessor::new()),
        config,
    ));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling batch");
                cancel.cancel();
            }
        });
    }

    let stop_ui = CancellationToken::new();
    let ui = spawn_progress_ui(
        !args.quiet && !args.no_progress,
        orchestrator.subscribe(),
        stop_ui.clone(),
    );

    let result = orchestrator
        .run_urls(&DirectResolver::new(), &inputs, cancel)
        .await;

    stop_ui.cancel();
    if let Some(handle) = ui {
        let _ = handle.await;
    }

    match result {
        Ok(summary) => {
            info!(
                completed = summary.completed,
                recovered = summary.recovered,
                failed = summary.failed,
                abandoned = summary.abandoned,
                skipped = summary.skipped,
                unresolved = summary.unresolved,
                retry_attempts = summary.retry_attempts,
                elapsed_ms = summary.elapsed.as_millis(),
                "Batch complete"
            );
            let unsuccessful = summary.failed + summary.abandoned + summary.unresolved;
            if summary.succeeded() == 0 && unsuccessful > 0 {
                bail!("no item could be downloaded ({unsuccessful} failed)");
            }
            Ok(())
        }
        Err(OrchestratorError::Cancelled) => bail!("batch cancelled"),
        Err(error) => Err(error.into()),
    }
}
