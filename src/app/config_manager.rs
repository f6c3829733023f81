//! Configuration lifecycle: load the file config, then apply CLI overrides.

use std::time::Duration;

use anyhow::{Context, Result};
use mixtape_core::{FileConfig, OrchestratorConfig, resolve_default_config_path};
use tracing::debug;

use crate::cli::Args;

/// Builds the orchestrator config.
///
/// Priority: explicit CLI flags > file config > defaults. An explicit
/// `--config` path must exist; the default path may be missing.
pub(crate) fn resolve_config(args: &Args) -> Result<OrchestratorConfig> {
    let file = load_file_config(args)?;
    Ok(apply_cli_overrides(
        OrchestratorConfig::default().merged_with(&file),
        args,
    ))
}

fn load_file_config(args: &Args) -> Result<FileConfig> {
    if let Some(path) = &args.config {
        return FileConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }
    match resolve_default_config_path() {
        Some(path) => {
            debug!(path = %path.display(), "checking default config path");
            FileConfig::load_or_default(&path)
                .with_context(|| format!("failed to load config from {}", path.display()))
        }
        None => Ok(FileConfig::default()),
    }
}

fn apply_cli_overrides(mut config: OrchestratorConfig, args: &Args) -> OrchestratorConfig {
    if let Some(dir) = &args.output_dir {
        config.output_root.clone_from(dir);
    }
    if let Some(quality) = &args.quality {
        config.quality_hint.clone_from(quality);
    }
    if args.no_auto_retry {
        config.auto_retry_enabled = false;
    }
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(ms) = args.retry_backoff_ms {
        config.retry_backoff = Duration::from_millis(ms);
    }
    config
}
