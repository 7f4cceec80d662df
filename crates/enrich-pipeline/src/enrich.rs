//! The enrichment stage.
//!
//! Identifiers are read from the first configured identifier column,
//! deduplicated, split into batches and sent through a [`BatchEnricher`]
//! one batch at a time. Records are merged into the dataset as soon as their
//! batch returns, and every few batches the partially enriched dataset is
//! saved under an `enrich_batch_<n>` label so a later run can skip the
//! batches that already came back.

use crate::columns;
use crate::dataset::Dataset;
use crate::error::{PipelineError, Result};
use crate::orchestrator::PipelineSettings;
use enrich_checkpoint::{CheckpointStore, Metadata, Step};
use enrich_client::{split_batches, BatchEnricher, EnrichmentRecord};
use enrich_core::{DatasetName, Identifier};
use serde_json::json;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Prefix of the intermediate checkpoint labels.
pub const BATCH_LABEL_PREFIX: &str = "enrich_batch_";

/// Counts reported by a finished enrichment stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    /// Distinct identifiers
    pub identifiers: usize,
    /// Rows without an identifier
    pub without_identifier: usize,
    /// Batches the identifiers were split into
    pub batches: usize,
    /// Batches restored from an intermediate checkpoint
    pub resumed_batches: usize,
    /// Records that came back enriched
    pub successful: usize,
    /// Records that came back failed
    pub failed: usize,
}

/// Drives one dataset through the remote service.
pub struct EnrichmentStage<'a> {
    enricher: &'a dyn BatchEnricher,
    store: &'a CheckpointStore,
    dataset_name: &'a DatasetName,
    settings: &'a PipelineSettings,
    cancel: &'a CancellationToken,
}

struct OutputColumns {
    status: usize,
    work: usize,
    personal: usize,
    phone: usize,
    social: Vec<(&'static str, usize, usize)>,
}

impl OutputColumns {
    fn ensure(dataset: &mut Dataset) -> Self {
        let status = dataset.ensure_column(columns::STATUS);
        let work = dataset.ensure_column(columns::WORK_EMAIL);
        let personal = dataset.ensure_column(columns::PERSONAL_EMAIL);
        let phone = dataset.ensure_column(columns::PHONE);
        let social = columns::SOCIAL_PLATFORMS
            .into_iter()
            .map(|platform| {
                (
                    platform,
                    dataset.ensure_column(&columns::social_profile(platform)),
                    dataset.ensure_column(&columns::social_rating(platform)),
                )
            })
            .collect();
        Self {
            status,
            work,
            personal,
            phone,
            social,
        }
    }

    fn write(&self, dataset: &mut Dataset, row: usize, record: &EnrichmentRecord) {
        let join = |values: Vec<&str>| values.join(columns::VALUE_SEPARATOR);

        dataset.set_cell(row, self.status, record.status_label());
        dataset.set_cell(row, self.work, join(record.work_emails()));
        dataset.set_cell(row, self.personal, join(record.personal_emails()));
        dataset.set_cell(row, self.phone, join(record.phones()));

        for &(platform, link_col, rating_col) in &self.social {
            let profile = record
                .social()
                .iter()
                .find(|p| p.platform_name() == Some(platform));
            let link = profile.and_then(|p| p.link.clone()).unwrap_or_default();
            let rating = profile.and_then(|p| p.rating.clone()).unwrap_or_default();
            dataset.set_cell(row, link_col, link);
            dataset.set_cell(row, rating_col, rating);
        }
    }
}

/// Distinct identifiers in row order, with the rows each one appears in.
struct IdentifierIndex {
    identifiers: Vec<Identifier>,
    rows: HashMap<Identifier, Vec<usize>>,
    missing: Vec<usize>,
}

impl IdentifierIndex {
    fn build(dataset: &Dataset, column: usize) -> Self {
        let mut index = Self {
            identifiers: Vec::new(),
            rows: HashMap::new(),
            missing: Vec::new(),
        };
        for row in 0..dataset.len() {
            match Identifier::from_cell(dataset.cell(row, column)) {
                Some(id) => {
                    let rows = index.rows.entry(id.clone()).or_default();
                    if rows.is_empty() {
                        index.identifiers.push(id);
                    }
                    rows.push(row);
                }
                None => index.missing.push(row),
            }
        }
        index
    }
}

impl<'a> EnrichmentStage<'a> {
    /// Create the stage for one dataset.
    #[must_use]
    pub fn new(
        enricher: &'a dyn BatchEnricher,
        store: &'a CheckpointStore,
        dataset_name: &'a DatasetName,
        settings: &'a PipelineSettings,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            enricher,
            store,
            dataset_name,
            settings,
            cancel,
        }
    }

    fn identifier_column(&self, dataset: &Dataset) -> Result<usize> {
        self.settings
            .identifier_columns
            .iter()
            .find_map(|candidate| dataset.column_index(candidate))
            .ok_or_else(|| PipelineError::MissingIdentifierColumn {
                candidates: self.settings.identifier_columns.clone(),
            })
    }

    /// Enrich `dataset` in place.
    ///
    /// On error the dataset holds every batch merged so far.
    pub async fn run(&self, dataset: &mut Dataset) -> Result<EnrichmentSummary> {
        let id_column = self.identifier_column(dataset)?;
        tracing::info!(
            dataset = %self.dataset_name,
            column = %dataset.columns()[id_column],
            mode = %self.enricher.mode(),
            "Starting enrichment"
        );

        let mut index = IdentifierIndex::build(dataset, id_column);
        let batches = split_batches(&index.identifiers, self.settings.max_batch_size);
        let mut summary = EnrichmentSummary {
            identifiers: index.identifiers.len(),
            without_identifier: index.missing.len(),
            batches: batches.len(),
            ..EnrichmentSummary::default()
        };

        let id_name = dataset.columns()[id_column].clone();
        let resumed = self.find_intermediate(&id_name, &index.identifiers, batches.len());
        let output = match resumed {
            Some((completed, state)) => {
                tracing::info!(
                    dataset = %self.dataset_name,
                    batches_completed = completed,
                    total_batches = batches.len(),
                    "Resuming enrichment from intermediate checkpoint"
                );
                *dataset = state;
                if let Some(column) = dataset.column_index(&id_name) {
                    index = IdentifierIndex::build(dataset, column);
                }
                summary.resumed_batches = completed;
                OutputColumns::ensure(dataset)
            }
            None => {
                let output = OutputColumns::ensure(dataset);
                for &row in &index.missing {
                    dataset.set_cell(row, output.status, columns::NO_IDENTIFIER);
                }
                output
            }
        };

        for batch in batches.iter().skip(summary.resumed_batches) {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            tracing::info!(
                dataset = %self.dataset_name,
                batch = batch.number(),
                total_batches = batches.len(),
                size = batch.len(),
                "Enriching batch"
            );
            let records = self.enricher.enrich_batch(batch).await?;

            let mut ok = 0;
            for record in &records {
                if record.is_success() {
                    ok += 1;
                }
                for &row in index.rows.get(&record.identifier).into_iter().flatten() {
                    output.write(dataset, row, record);
                }
            }
            summary.successful += ok;
            summary.failed += records.len() - ok;
            tracing::info!(
                dataset = %self.dataset_name,
                batch = batch.number(),
                successful = ok,
                failed = records.len() - ok,
                "Batch merged"
            );

            let every = self.settings.intermediate_checkpoint_every;
            if every > 0 && batch.number() % every == 0 && batch.number() < batches.len() {
                self.save_intermediate(batch.number(), dataset);
            }
        }

        tracing::info!(
            dataset = %self.dataset_name,
            identifiers = summary.identifiers,
            successful = summary.successful,
            failed = summary.failed,
            without_identifier = summary.without_identifier,
            "Enrichment complete"
        );
        Ok(summary)
    }

    /// The most advanced intermediate checkpoint written for this exact
    /// identifier list and batch size.
    fn find_intermediate(
        &self,
        id_column: &str,
        identifiers: &[Identifier],
        total_batches: usize,
    ) -> Option<(usize, Dataset)> {
        let artifacts = match self.store.list(self.dataset_name) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                tracing::warn!(dataset = %self.dataset_name, error = %e, "Could not list checkpoints");
                return None;
            }
        };

        let mut candidates: Vec<(usize, Step)> = artifacts
            .into_iter()
            .filter_map(|artifact| {
                let n = artifact
                    .step
                    .as_label()?
                    .strip_prefix(BATCH_LABEL_PREFIX)?
                    .parse::<usize>()
                    .ok()?;
                (n > 0 && n < total_batches).then_some((n, artifact.step))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        let batch_size = self.settings.max_batch_size as u64;
        for (completed, step) in candidates {
            let checkpoint = match self.store.load_step::<Dataset>(self.dataset_name, &step) {
                Ok(Some(checkpoint)) => checkpoint,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(dataset = %self.dataset_name, %step, error = %e, "Skipping unreadable checkpoint");
                    continue;
                }
            };
            if checkpoint.metadata_u64("batch_size") != Some(batch_size) {
                continue;
            }
            let same_input = checkpoint
                .state
                .column_index(id_column)
                .is_some_and(|column| {
                    IdentifierIndex::build(&checkpoint.state, column).identifiers == identifiers
                });
            if same_input {
                return Some((completed, checkpoint.state));
            }
        }
        None
    }

    fn save_intermediate(&self, completed: usize, dataset: &Dataset) {
        let label = format!("{BATCH_LABEL_PREFIX}{completed}");
        let step = match Step::label(&label) {
            Ok(step) => step,
            Err(e) => {
                tracing::warn!(%label, error = %e, "Invalid checkpoint label");
                return;
            }
        };

        let mut metadata = Metadata::new();
        metadata.insert("batches_completed".to_string(), json!(completed));
        metadata.insert("batch_size".to_string(), json!(self.settings.max_batch_size));

        match self.store.save(self.dataset_name, &step, dataset, metadata) {
            Ok(path) => tracing::debug!(path = %path.display(), "Saved intermediate checkpoint"),
            Err(e) => tracing::warn!(
                dataset = %self.dataset_name,
                error = %e,
                "Failed to save intermediate checkpoint"
            ),
        }
    }
}
