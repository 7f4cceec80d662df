//! Pipeline orchestrator for resumable dataset runs.
//!
//! This module provides the `PipelineOrchestrator` which drives each dataset
//! through the seven stages, writes a checkpoint after every stage, resumes
//! from the latest checkpoint on restart and records an error checkpoint
//! when a stage fails.

use crate::dataset::Dataset;
use crate::enrich::EnrichmentStage;
use crate::error::{PipelineError, Result};
use crate::io::{final_output_path, CsvDatasetIo, DatasetIo};
use crate::stages::{self, AnalysisReport, Stage};
use enrich_checkpoint::{CheckpointStore, Metadata, Step};
use enrich_client::BatchEnricher;
use enrich_core::{AppConfig, DatasetName};
use serde_json::json;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Prefix of the labels written when a stage fails.
pub const ERROR_LABEL_PREFIX: &str = "error_";

/// Settings the orchestrator and its stages need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Directory the final tables are written to
    pub data_dir: PathBuf,
    /// Candidate identifier column names, in order of preference
    pub identifier_columns: Vec<String>,
    /// Columns removed by the clean stage
    pub drop_columns: Vec<String>,
    /// Identifiers per batch
    pub max_batch_size: usize,
    /// Batches between intermediate enrichment checkpoints (0 disables them)
    pub intermediate_checkpoint_every: usize,
    /// Artifacts kept per dataset after a completed run
    pub keep_latest: usize,
}

impl PipelineSettings {
    /// Take the relevant values from the application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            data_dir: config.pipeline.data_dir.clone(),
            identifier_columns: config.pipeline.identifier_columns.clone(),
            drop_columns: config.pipeline.drop_columns.clone(),
            max_batch_size: config.bulk.max_batch_size,
            intermediate_checkpoint_every: config.pipeline.intermediate_checkpoint_every,
            keep_latest: config.checkpoint.keep_latest,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// How a dataset run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Every stage ran
    Completed {
        /// Final analysis
        report: AnalysisReport,
        /// Last stage restored from a checkpoint, if the run resumed
        resumed_from: Option<Stage>,
    },
    /// The terminal checkpoint already existed; nothing ran
    AlreadyComplete,
    /// A stage failed and an error checkpoint was written
    Failed {
        /// Stage that failed
        stage: Stage,
        /// Error message
        error: String,
    },
    /// Cancellation was requested
    Cancelled,
}

/// Result of running one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetOutcome {
    /// Dataset name
    pub dataset: String,
    /// Input file
    pub source: PathBuf,
    /// How the run ended
    pub status: RunStatus,
}

/// Where a dataset stands according to its checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointStatus {
    /// No stage checkpoint exists
    Fresh,
    /// The run will resume after `completed`
    Resumable {
        /// Last completed stage
        completed: Stage,
    },
    /// The terminal checkpoint exists
    Complete,
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "no checkpoint, starting from load"),
            Self::Resumable { completed } => match completed.next() {
                Some(next) => write!(
                    f,
                    "checkpoint {} ({completed}), resuming at {next}",
                    completed.ordinal()
                ),
                None => write!(f, "checkpoint {} ({completed})", completed.ordinal()),
            },
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Orchestrates resumable pipeline runs across datasets.
pub struct PipelineOrchestrator {
    /// Enricher for the configured mode
    enricher: Arc<dyn BatchEnricher>,
    /// Checkpoint storage
    store: CheckpointStore,
    /// Table reader/writer
    io: Arc<dyn DatasetIo>,
    /// Stage settings
    settings: PipelineSettings,
    /// Stops the run between stages and batches
    cancel: CancellationToken,
}

impl PipelineOrchestrator {
    /// Create a new orchestrator reading and writing CSV files.
    #[must_use]
    pub fn new(
        enricher: Arc<dyn BatchEnricher>,
        store: CheckpointStore,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            enricher,
            store,
            io: Arc::new(CsvDatasetIo),
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a different table reader/writer.
    #[must_use]
    pub fn with_io(mut self, io: Arc<dyn DatasetIo>) -> Self {
        self.io = io;
        self
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The token that stops this orchestrator.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The checkpoint store.
    #[must_use]
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Where `source` stands according to its checkpoints.
    pub fn checkpoint_status(&self, source: &Path) -> Result<CheckpointStatus> {
        let name = DatasetName::from_path(source)?;
        let status = match self.store.latest_ordinal(&name)?.map(Stage::from_ordinal) {
            None | Some(None) => CheckpointStatus::Fresh,
            Some(Some(stage)) if stage.is_terminal() => CheckpointStatus::Complete,
            Some(Some(stage)) => CheckpointStatus::Resumable { completed: stage },
        };
        Ok(status)
    }

    /// Run every dataset in order.
    ///
    /// A failed dataset does not stop the sweep; cancellation does.
    pub async fn run_all(&self, sources: &[PathBuf]) -> Vec<DatasetOutcome> {
        let mut outcomes = Vec::with_capacity(sources.len());

        for source in sources {
            let outcome = self.run_dataset(source).await;
            let cancelled = outcome.status == RunStatus::Cancelled;
            outcomes.push(outcome);
            if cancelled {
                tracing::warn!("Run cancelled, skipping remaining datasets");
                break;
            }
        }

        outcomes
    }

    /// Run one dataset from its latest checkpoint to the end.
    pub async fn run_dataset(&self, source: &Path) -> DatasetOutcome {
        let name = match DatasetName::from_path(source) {
            Ok(name) => name,
            Err(e) => {
                tracing::error!("Invalid dataset {}: {}", source.display(), e);
                return DatasetOutcome {
                    dataset: source
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    source: source.to_path_buf(),
                    status: RunStatus::Failed {
                        stage: Stage::Load,
                        error: e.to_string(),
                    },
                };
            }
        };

        let status = self.run_stages(&name, source).await;
        match &status {
            RunStatus::Completed { .. } | RunStatus::AlreadyComplete => {
                match self.store.cleanup(&name, self.settings.keep_latest) {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(dataset = %name, removed, "Removed old checkpoints"),
                    Err(e) => tracing::warn!(dataset = %name, error = %e, "Checkpoint cleanup failed"),
                }
            }
            RunStatus::Failed { stage, error } => {
                tracing::error!(dataset = %name, %stage, %error, "Dataset failed");
            }
            RunStatus::Cancelled => {
                tracing::warn!(dataset = %name, "Dataset run cancelled");
            }
        }

        DatasetOutcome {
            dataset: name.to_string(),
            source: source.to_path_buf(),
            status,
        }
    }

    async fn run_stages(&self, name: &DatasetName, source: &Path) -> RunStatus {
        let (mut state, start, resumed_from) = match self.store.load_latest::<Dataset>(name) {
            Ok(Some(checkpoint)) => match checkpoint.ordinal().and_then(Stage::from_ordinal) {
                Some(stage) if stage.is_terminal() => {
                    tracing::info!(dataset = %name, "Already complete, nothing to do");
                    return RunStatus::AlreadyComplete;
                }
                Some(stage) => {
                    tracing::info!(
                        dataset = %name,
                        checkpoint = stage.ordinal(),
                        rows = checkpoint.state.len(),
                        "Resuming after {} stage",
                        stage
                    );
                    (checkpoint.state, stage.next(), Some(stage))
                }
                None => {
                    tracing::warn!(dataset = %name, step = %checkpoint.step, "Unknown checkpoint, starting over");
                    (Dataset::default(), Some(Stage::Load), None)
                }
            },
            Ok(None) => (Dataset::default(), Some(Stage::Load), None),
            Err(e) => {
                tracing::warn!(dataset = %name, error = %e, "Could not load checkpoint, starting over");
                (Dataset::default(), Some(Stage::Load), None)
            }
        };

        let mut report = None;
        let mut current = start;
        while let Some(stage) = current {
            if self.cancel.is_cancelled() {
                return RunStatus::Cancelled;
            }

            tracing::info!(dataset = %name, %stage, "Starting stage");
            match self.run_stage(stage, name, source, &mut state).await {
                Ok(stage_report) => {
                    if stage_report.is_some() {
                        report = stage_report;
                    }
                }
                Err(PipelineError::Cancelled) => return RunStatus::Cancelled,
                Err(e) => {
                    self.save_error(name, stage, &state, &e);
                    return RunStatus::Failed {
                        stage,
                        error: e.to_string(),
                    };
                }
            }

            let mut metadata = Metadata::new();
            metadata.insert("stage".to_string(), json!(stage.name()));
            metadata.insert("rows".to_string(), json!(state.len()));
            if let Err(e) = self
                .store
                .save(name, &Step::Ordinal(stage.ordinal()), &state, metadata)
            {
                tracing::error!(dataset = %name, %stage, "Failed to save checkpoint: {}", e);
                let e = PipelineError::Checkpoint(e);
                self.save_error(name, stage, &state, &e);
                return RunStatus::Failed {
                    stage,
                    error: e.to_string(),
                };
            }
            tracing::info!(dataset = %name, %stage, rows = state.len(), "Stage complete");

            current = stage.next();
        }

        let report = report.unwrap_or_else(|| stages::analyze(&state, name.as_str()));
        RunStatus::Completed {
            report,
            resumed_from,
        }
    }

    async fn run_stage(
        &self,
        stage: Stage,
        name: &DatasetName,
        source: &Path,
        state: &mut Dataset,
    ) -> Result<Option<AnalysisReport>> {
        match stage {
            Stage::Load => {
                *state = self.io.read(source)?;
                tracing::info!(dataset = %name, rows = state.len(), "Loaded dataset");
            }
            Stage::Clean => {
                stages::clean(state, &self.settings.drop_columns);
            }
            Stage::Enrich => {
                EnrichmentStage::new(
                    self.enricher.as_ref(),
                    &self.store,
                    name,
                    &self.settings,
                    &self.cancel,
                )
                .run(state)
                .await?;
            }
            Stage::Filter => {
                stages::filter(state);
            }
            Stage::Consolidate => {
                stages::consolidate(state);
            }
            Stage::Persist => {
                let path = final_output_path(&self.settings.data_dir, name);
                self.io.write(&path, state)?;
                tracing::info!(dataset = %name, path = %path.display(), "Wrote final dataset");
            }
            Stage::Analyze => {
                return Ok(Some(stages::analyze(state, name.as_str())));
            }
        }
        Ok(None)
    }

    fn save_error(&self, name: &DatasetName, stage: Stage, state: &Dataset, error: &PipelineError) {
        let label = format!("{ERROR_LABEL_PREFIX}{}", chrono::Utc::now().timestamp_millis());
        let step = match Step::label(label) {
            Ok(step) => step,
            Err(e) => {
                tracing::error!("Invalid error checkpoint label: {}", e);
                return;
            }
        };

        let mut metadata = Metadata::new();
        metadata.insert("error".to_string(), json!(error.to_string()));
        metadata.insert("stage".to_string(), json!(stage.name()));

        match self.store.save(name, &step, state, metadata) {
            Ok(path) => tracing::info!(dataset = %name, path = %path.display(), "Saved error checkpoint"),
            Err(e) => tracing::error!(dataset = %name, "Failed to save error checkpoint: {}", e),
        }
    }
}
