//! Contact Enrich command-line shell.
//!
//! Usage:
//!     enrich [--config PATH] [--data-dir DIR] [--mode bulk|per-identifier] [DATASET.csv ...]

use anyhow::{bail, Context};
use clap::Parser;
use enrich_checkpoint::CheckpointStore;
use enrich_client::{
    BackoffPolicy, BatchEnricher, BulkClient, HttpEnrichmentClient, PerIdentifierClient,
};
use enrich_core::{AppConfig, EnrichmentMode};
use enrich_pipeline::{discover_datasets, PipelineOrchestrator, PipelineSettings, RunStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "enrich",
    version,
    about = "Resumable bulk contact enrichment for CSV datasets"
)]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, env = "ENRICH_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the input datasets and the final outputs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Directory for checkpoint artifacts
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Operating mode: bulk or per-identifier
    #[arg(long)]
    mode: Option<EnrichmentMode>,

    /// Checkpoint artifacts kept per dataset after a completed run
    #[arg(long)]
    keep_latest: Option<usize>,

    /// Datasets to process (defaults to every CSV in the data directory)
    files: Vec<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.data_dir {
            config.pipeline.data_dir.clone_from(dir);
        }
        if let Some(dir) = &self.checkpoint_dir {
            config.checkpoint.dir.clone_from(dir);
        }
        if let Some(mode) = self.mode {
            config.pipeline.mode = mode;
        }
        if let Some(keep) = self.keep_latest {
            config.checkpoint.keep_latest = keep;
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,enrich=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    config.apply_env_overrides();
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn build_enricher(
    config: &AppConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<Arc<dyn BatchEnricher>> {
    let http = Arc::new(
        HttpEnrichmentClient::new(&config.api)
            .context("set ENRICH_API_KEY or api.api_key before running")?,
    );

    let enricher: Arc<dyn BatchEnricher> = match config.pipeline.mode {
        EnrichmentMode::Bulk => Arc::new(BulkClient::new(
            http,
            config.bulk.clone(),
            BackoffPolicy::for_bulk(&config.bulk),
            cancel.clone(),
        )),
        EnrichmentMode::PerIdentifier => Arc::new(PerIdentifierClient::new(
            http,
            &config.per_identifier,
            cancel.clone(),
        )),
    };
    Ok(enricher)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!("Starting Contact Enrich v{}", env!("CARGO_PKG_VERSION"));
    info!("  Mode: {}", config.pipeline.mode);
    info!("  Data: {}", config.pipeline.data_dir.display());
    info!("  Checkpoints: {}", config.checkpoint.dir.display());

    let cancel = CancellationToken::new();
    let enricher = build_enricher(&config, &cancel)?;

    let datasets = if args.files.is_empty() {
        discover_datasets(&config.pipeline.data_dir).with_context(|| {
            format!(
                "failed to list datasets in {}",
                config.pipeline.data_dir.display()
            )
        })?
    } else {
        args.files.clone()
    };
    if datasets.is_empty() {
        info!("No datasets found, nothing to do");
        return Ok(());
    }

    let orchestrator = PipelineOrchestrator::new(
        enricher,
        CheckpointStore::new(&config.checkpoint.dir),
        PipelineSettings::from_config(&config),
    )
    .with_cancellation(cancel.clone());

    println!("Checkpoint status:");
    for path in &datasets {
        match orchestrator.checkpoint_status(path) {
            Ok(status) => println!("  {}: {status}", path.display()),
            Err(e) => println!("  {}: unavailable ({e})", path.display()),
        }
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current step");
            cancel.cancel();
        }
    });

    let outcomes = orchestrator.run_all(&datasets).await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.status {
            RunStatus::Completed {
                report,
                resumed_from,
            } => {
                let resumed =
                    resumed_from.map_or_else(String::new, |s| format!(" (resumed after {s})"));
                info!(
                    "{}: completed{}, {} rows, {} with email ({} personal, {} work, {} academic)",
                    outcome.dataset,
                    resumed,
                    report.total_rows,
                    report.with_email,
                    report.personal,
                    report.work,
                    report.academic
                );
            }
            RunStatus::AlreadyComplete => info!("{}: already complete", outcome.dataset),
            RunStatus::Failed { stage, error } => {
                failed += 1;
                tracing::error!("{}: failed in {} stage: {}", outcome.dataset, stage, error);
            }
            RunStatus::Cancelled => tracing::warn!("{}: cancelled", outcome.dataset),
        }
    }
    info!(
        "Processed {} of {} datasets, {} failed",
        outcomes.len(),
        datasets.len(),
        failed
    );

    if failed > 0 {
        bail!("{failed} dataset(s) failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "enrich",
            "--data-dir",
            "/tmp/leads",
            "--mode",
            "per-identifier",
            "--keep-latest",
            "5",
            "a.csv",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.pipeline.data_dir, PathBuf::from("/tmp/leads"));
        assert_eq!(config.pipeline.mode, EnrichmentMode::PerIdentifier);
        assert_eq!(config.checkpoint.keep_latest, 5);
        assert_eq!(args.files, vec![PathBuf::from("a.csv")]);
    }

    #[test]
    fn test_missing_api_key_fails_before_any_request() {
        let config = AppConfig::default();
        let result = build_enricher(&config, &CancellationToken::new());
        assert!(result.is_err());
    }
}
