//! Enrich Client - Remote job client for the contact enrichment service.
//!
//! This crate drives a third-party asynchronous enrichment service. It splits
//! identifier lists into batches, submits and polls bulk jobs, fans out
//! single-identifier requests behind an admission gate, and classifies every
//! outcome into an [`EnrichmentRecord`] so no identifier is silently dropped.
//!
//! # Features
//!
//! - **Two operating modes**: one server-side job per batch, or bounded-concurrency
//!   per-identifier requests with pacing
//! - **Backoff**: server retry-after hints honoured, exponential growth otherwise
//! - **Milestone progress**: poll progress reported at fixed processed-count intervals
//! - **Transport seams**: [`BulkEnrichmentApi`] and [`ContactLookupApi`] traits, with a
//!   reqwest implementation in [`HttpEnrichmentClient`]
//!
//! # Example
//!
//! ```rust,ignore
//! use enrich_client::{split_batches, BatchEnricher, BulkClient, HttpEnrichmentClient};
//! use std::sync::Arc;
//!
//! let http = Arc::new(HttpEnrichmentClient::new(&config.api)?);
//! let client = BulkClient::new(http, config.bulk.clone(), policy, cancel.clone());
//!
//! for batch in split_batches(identifiers, config.bulk.max_batch_size) {
//!     let records = client.enrich_batch(&batch).await?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod backoff;
pub mod batch;
pub mod bulk;
pub mod error;
pub mod http;
pub mod per_identifier;
pub mod provider;
pub mod record;

// Re-export commonly used types
pub use api::{JobHandle, JobSnapshot, JobStatus, RawContact, RawResult, SocialEntry};
pub use backoff::{parse_retry_after, BackoffPolicy, PollBudget};
pub use batch::{split_batches, Batch};
pub use bulk::{BulkClient, MilestoneTracker, ProgressObserver, ProgressReport};
pub use error::{ClientError, Result};
pub use http::HttpEnrichmentClient;
pub use per_identifier::PerIdentifierClient;
pub use provider::{BatchEnricher, BulkEnrichmentApi, ContactLookupApi};
pub use record::{
    Contact, ContactKind, ContactSubKind, EnrichmentOutcome, EnrichmentRecord, Failure,
    FailureKind, SocialProfile,
};
