//! Enrich Pipeline - Resumable multi-stage enrichment of tabular datasets.
//!
//! This crate drives each dataset through load, clean, enrich, filter,
//! consolidate, persist and analyze. A checkpoint is written after every
//! stage so an interrupted run resumes where it stopped, and the enrichment
//! stage additionally saves intermediate checkpoints between batches.
//!
//! # Features
//!
//! - Resume from the latest stage checkpoint, skipping completed stages
//! - Error checkpoints on stage failure; other datasets keep running
//! - Cooperative cancellation between stages and batches
//! - Email classification (personal, work, academic) and consolidation
//! - CSV input/output behind the [`DatasetIo`] trait
//!
//! # Example
//!
//! ```rust,ignore
//! use enrich_pipeline::{discover_datasets, PipelineOrchestrator, PipelineSettings};
//! use std::sync::Arc;
//!
//! let orchestrator = PipelineOrchestrator::new(
//!     enricher,
//!     CheckpointStore::new(&config.checkpoint.dir),
//!     PipelineSettings::from_config(&config),
//! );
//!
//! let datasets = discover_datasets(&config.pipeline.data_dir)?;
//! let outcomes = orchestrator.run_all(&datasets).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod classify;
pub mod columns;
pub mod dataset;
pub mod enrich;
#[allow(missing_docs)]
pub mod error;
pub mod io;
pub mod orchestrator;
pub mod stages;

// Re-export commonly used types
pub use classify::{best_email, classify_email, EmailClass};
pub use dataset::Dataset;
pub use enrich::{EnrichmentStage, EnrichmentSummary};
pub use error::{PipelineError, Result};
pub use io::{discover_datasets, final_output_path, CsvDatasetIo, DatasetIo};
pub use orchestrator::{
    CheckpointStatus, DatasetOutcome, PipelineOrchestrator, PipelineSettings, RunStatus,
};
pub use stages::{AnalysisReport, FilterSummary, Stage};
