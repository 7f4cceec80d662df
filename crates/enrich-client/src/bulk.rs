//! Bulk mode: one server-side job per batch.
//!
//! A batch is submitted once, then polled at a fixed interval until the job
//! reaches a terminal status or the poll budget runs out. Each poll wait is a
//! suspension point that also listens for cancellation. A job the client gives
//! up on is abandoned, not cancelled remotely.

use crate::api::{JobHandle, JobSnapshot, JobStatus, RawResult};
use crate::backoff::{BackoffPolicy, PollBudget};
use crate::batch::Batch;
use crate::error::{ClientError, Result};
use crate::provider::{BatchEnricher, BulkEnrichmentApi};
use crate::record::{EnrichmentRecord, Failure, FailureKind};
use async_trait::async_trait;
use enrich_core::{BulkConfig, EnrichmentMode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Callback receiving milestone progress reports.
pub type ProgressObserver = Arc<dyn Fn(&ProgressReport) + Send + Sync>;

/// Progress of a job at a milestone.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    /// Job being polled
    pub job_id: String,
    /// Identifiers processed so far
    pub processed: u64,
    /// Identifiers in the batch
    pub total: u64,
    /// Successful so far
    pub successful: u64,
    /// Failed so far
    pub failed: u64,
    /// Time since polling started
    pub elapsed: Duration,
    /// Processed identifiers per second
    pub throughput: f64,
}

impl ProgressReport {
    /// Share of the batch processed, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Decides when a processed count deserves a progress report.
///
/// A report is due when the count crosses the next multiple of the interval
/// or reaches the batch total, and only when the count has moved.
#[derive(Debug, Clone)]
pub struct MilestoneTracker {
    interval: u64,
    total: u64,
    next_milestone: u64,
    last_processed: u64,
}

impl MilestoneTracker {
    /// Track a batch of `total` items, reporting every `interval` items.
    #[must_use]
    pub fn new(interval: u64, total: u64) -> Self {
        let interval = interval.max(1);
        Self {
            interval,
            total,
            next_milestone: interval,
            last_processed: 0,
        }
    }

    /// Record a new processed count; returns whether to report it.
    pub fn observe(&mut self, processed: u64) -> bool {
        if processed <= self.last_processed {
            return false;
        }
        self.last_processed = processed;

        if processed >= self.next_milestone || processed == self.total {
            self.next_milestone = (processed / self.interval + 1) * self.interval;
            return true;
        }
        false
    }
}

/// Remote job client in bulk mode.
pub struct BulkClient<A: BulkEnrichmentApi + ?Sized> {
    api: Arc<A>,
    config: BulkConfig,
    policy: BackoffPolicy,
    cancel: CancellationToken,
    observer: Option<ProgressObserver>,
}

impl<A: BulkEnrichmentApi + ?Sized> BulkClient<A> {
    /// Create a bulk client.
    ///
    /// `policy` governs how often a failing poll is retried before the job is
    /// given up.
    #[must_use]
    pub fn new(
        api: Arc<A>,
        config: BulkConfig,
        policy: BackoffPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            config,
            policy,
            cancel,
            observer: None,
        }
    }

    /// Forward milestone reports to `observer` in addition to logging them.
    #[must_use]
    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Poll `handle` until it reaches a terminal status.
    ///
    /// # Errors
    /// - `JobTimeout` once `max_poll_time` has elapsed without a terminal status
    /// - `JobExpired` if the service no longer knows the job
    /// - `Unauthorized` / `QuotaExceeded` as soon as they are seen
    /// - the last poll error once more than `max_retries` consecutive polls failed
    /// - `Cancelled` if the cancellation token fires while waiting
    pub async fn await_completion(
        &self,
        handle: &JobHandle,
        batch_size: usize,
    ) -> Result<JobSnapshot> {
        let budget = PollBudget::start(self.config.max_poll_time());
        let mut tracker = MilestoneTracker::new(self.config.milestone_interval, batch_size as u64);
        let mut status = JobStatus::Submitted;
        let mut consecutive_failures = 0u32;

        info!(job_id = %handle, batch_size, "polling job for results");

        loop {
            if budget.exhausted() {
                warn!(
                    job_id = %handle,
                    max_poll_secs = budget.max().as_secs(),
                    "job polling timed out, abandoning job"
                );
                return Err(ClientError::JobTimeout {
                    job_id: handle.job_id.clone(),
                    elapsed: budget.elapsed(),
                });
            }

            let wait = match self.api.poll(handle).await {
                Ok(mut snapshot) => {
                    consecutive_failures = 0;
                    let reported = snapshot.status;
                    status = status.advance(reported);
                    if status != reported {
                        warn!(job_id = %handle, %reported, kept = %status, "ignoring backwards job status");
                    }
                    snapshot.status = status;

                    if tracker.observe(snapshot.processed) {
                        self.report(handle, &snapshot, batch_size as u64, budget.elapsed());
                    }

                    if status.is_terminal() {
                        if status == JobStatus::Completed {
                            info!(job_id = %handle, "job completed");
                        } else {
                            error!(job_id = %handle, %status, "job finished with an error");
                        }
                        return Ok(snapshot);
                    }

                    self.config.poll_interval()
                }
                Err(e) if e.is_fatal() || matches!(e, ClientError::JobExpired { .. }) => {
                    return Err(e);
                }
                Err(e) => {
                    if !self.policy.allows_retry(consecutive_failures) {
                        error!(job_id = %handle, error = %e, "giving up on job after repeated poll failures");
                        return Err(e);
                    }
                    let wait = self
                        .policy
                        .wait_for(consecutive_failures, e.retry_after())
                        .max(self.config.poll_interval());
                    consecutive_failures += 1;
                    warn!(
                        job_id = %handle,
                        error = %e,
                        attempt = consecutive_failures,
                        max_retries = self.policy.max_retries,
                        "poll failed, retrying in {:?}",
                        wait
                    );
                    wait
                }
            };

            self.pause(wait).await?;
        }
    }

    fn report(&self, handle: &JobHandle, snapshot: &JobSnapshot, total: u64, elapsed: Duration) {
        #[allow(clippy::cast_precision_loss)]
        let throughput = if elapsed.is_zero() {
            0.0
        } else {
            snapshot.processed as f64 / elapsed.as_secs_f64()
        };
        let report = ProgressReport {
            job_id: handle.job_id.clone(),
            processed: snapshot.processed,
            total,
            successful: snapshot.successful,
            failed: snapshot.failed,
            elapsed,
            throughput,
        };

        info!(
            job_id = %report.job_id,
            successful = report.successful,
            failed = report.failed,
            "{}/{} profiles completed ({:.1}%) - {:.1} profiles/sec",
            report.processed,
            report.total,
            report.percent(),
            report.throughput
        );

        if let Some(observer) = &self.observer {
            observer(&report);
        }
    }

    async fn pause(&self, wait: Duration) -> Result<()> {
        tokio::select! {
            () = self.cancel.cancelled() => Err(ClientError::Cancelled),
            () = tokio::time::sleep(wait) => Ok(()),
        }
    }
}

/// Mark every identifier of `batch` with the same failure.
fn fail_all(batch: &Batch, failure: &Failure) -> Vec<EnrichmentRecord> {
    batch
        .identifiers
        .iter()
        .map(|id| EnrichmentRecord::failed(id.clone(), failure.clone()))
        .collect()
}

/// Match job results back to the batch, in batch order.
fn collect_records(batch: &Batch, snapshot: &JobSnapshot) -> Vec<EnrichmentRecord> {
    let by_identifier: HashMap<&str, &RawResult> = snapshot
        .results
        .iter()
        .filter_map(|r| r.identifier.as_deref().map(|id| (id.trim(), r)))
        .collect();

    batch
        .identifiers
        .iter()
        .map(|id| match by_identifier.get(id.as_str()) {
            Some(raw) => EnrichmentRecord::from_raw(id.clone(), raw),
            None => EnrichmentRecord::failed(
                id.clone(),
                Failure::new(FailureKind::MissingResult, "No result returned by job"),
            ),
        })
        .collect()
}

#[async_trait]
impl<A: BulkEnrichmentApi + ?Sized> BatchEnricher for BulkClient<A> {
    async fn enrich_batch(&self, batch: &Batch) -> Result<Vec<EnrichmentRecord>> {
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        info!(batch = batch.number(), size = batch.len(), "submitting bulk job");
        let handle = match self.api.submit(batch).await {
            Ok(handle) => handle,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(batch = batch.number(), error = %e, "failed to submit batch");
                let failure = Failure::new(
                    FailureKind::SubmissionFailed,
                    format!("Batch submission failed: {e}"),
                );
                return Ok(fail_all(batch, &failure));
            }
        };

        let records = match self.await_completion(&handle, batch.len()).await {
            Ok(snapshot) if snapshot.status == JobStatus::Completed => {
                collect_records(batch, &snapshot)
            }
            // An errored job fails the whole batch; partial results are not trusted.
            Ok(snapshot) => {
                let failure = Failure::new(
                    FailureKind::JobFailed,
                    format!("Job {} failed with status {}", handle, snapshot.status),
                );
                fail_all(batch, &failure)
            }
            Err(e) if e.is_fatal() || matches!(e, ClientError::Cancelled) => return Err(e),
            Err(e) => fail_all(batch, &e.to_failure()),
        };

        let succeeded = records.iter().filter(|r| r.is_success()).count();
        info!(
            batch = batch.number(),
            job_id = %handle,
            succeeded,
            failed = records.len() - succeeded,
            "batch finished"
        );
        Ok(records)
    }

    fn mode(&self) -> EnrichmentMode {
        EnrichmentMode::Bulk
    }
}
