//! Transport and mode traits.
//!
//! The remote service is reached through two narrow transport traits, one
//! per operating mode. [`BatchEnricher`] is what the pipeline consumes: it
//! turns one batch into one record per identifier regardless of mode.

use crate::api::{JobHandle, JobSnapshot, RawResult};
use crate::batch::Batch;
use crate::error::Result;
use crate::record::EnrichmentRecord;
use async_trait::async_trait;
use enrich_core::{EnrichmentMode, Identifier};

/// Transport for server-side bulk jobs.
///
/// Implementations classify HTTP outcomes into [`crate::ClientError`]
/// variants and never retry on their own.
#[async_trait]
pub trait BulkEnrichmentApi: Send + Sync {
    /// Create one job covering every identifier in `batch`.
    ///
    /// # Errors
    /// `Unauthorized` (401), `QuotaExceeded` (402), `Http` for other statuses,
    /// `Network` for transport failures.
    async fn submit(&self, batch: &Batch) -> Result<JobHandle>;

    /// Fetch the current status and counts of a job.
    ///
    /// # Errors
    /// `JobExpired` on 404; other failures are classified as for `submit`.
    async fn poll(&self, handle: &JobHandle) -> Result<JobSnapshot>;
}

/// Transport for single-identifier lookups.
#[async_trait]
pub trait ContactLookupApi: Send + Sync {
    /// Look up contacts for one identifier.
    ///
    /// # Errors
    /// `RateLimited` (429, with any parsed retry-after hint), `Unauthorized`,
    /// `QuotaExceeded`, `Http`, `Network`.
    async fn lookup(&self, identifier: &Identifier) -> Result<RawResult>;
}

/// Enriches whole batches, whichever operating mode is behind it.
#[async_trait]
pub trait BatchEnricher: Send + Sync {
    /// Produce exactly one record per identifier of `batch`, in batch order.
    ///
    /// Per-identifier and per-batch problems are reported inside the records.
    ///
    /// # Errors
    /// Only run-level conditions: `Unauthorized`, `QuotaExceeded` or `Cancelled`.
    async fn enrich_batch(&self, batch: &Batch) -> Result<Vec<EnrichmentRecord>>;

    /// The operating mode, for logging.
    fn mode(&self) -> EnrichmentMode;
}
