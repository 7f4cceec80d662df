//! Per-identifier mode: one lookup request per identifier.
//!
//! Requests fan out behind a semaphore. A worker keeps its permit for the
//! whole life of its identifier, retries included, and sleeps for the pacing
//! delay after a successful response before giving the permit back.

use crate::backoff::BackoffPolicy;
use crate::batch::Batch;
use crate::error::{ClientError, Result};
use crate::provider::{BatchEnricher, ContactLookupApi};
use crate::record::{EnrichmentRecord, Failure, FailureKind};
use async_trait::async_trait;
use enrich_core::{EnrichmentMode, Identifier, PerIdentifierConfig};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Remote job client in per-identifier mode.
pub struct PerIdentifierClient<L: ContactLookupApi + ?Sized> {
    api: Arc<L>,
    gate: Arc<Semaphore>,
    pacing: Duration,
    policy: BackoffPolicy,
    cancel: CancellationToken,
}

impl<L: ContactLookupApi + ?Sized> PerIdentifierClient<L> {
    /// Create a client allowing `max_concurrent_requests` lookups in flight.
    #[must_use]
    pub fn new(api: Arc<L>, config: &PerIdentifierConfig, cancel: CancellationToken) -> Self {
        Self {
            api,
            gate: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            pacing: config.pacing_delay(),
            policy: BackoffPolicy::from_config(config),
            cancel,
        }
    }

    /// Enrich every identifier, returning records in input order.
    ///
    /// An authentication or quota failure stops the remaining workers, which
    /// then report `cancelled`.
    pub async fn enrich_all(&self, identifiers: &[Identifier]) -> Vec<EnrichmentRecord> {
        let halt = self.cancel.child_token();
        let mut slots: Vec<Option<EnrichmentRecord>> = vec![None; identifiers.len()];

        let mut in_flight: FuturesUnordered<_> = identifiers
            .iter()
            .enumerate()
            .map(|(slot, identifier)| {
                let halt = &halt;
                async move { (slot, self.enrich_one(identifier, halt).await) }
            })
            .collect();

        while let Some((slot, record)) = in_flight.next().await {
            slots[slot] = Some(record);
        }
        drop(in_flight);

        slots
            .into_iter()
            .zip(identifiers)
            .map(|(slot, identifier)| {
                slot.unwrap_or_else(|| {
                    EnrichmentRecord::failed(
                        identifier.clone(),
                        Failure::new(FailureKind::MissingResult, "Worker produced no result"),
                    )
                })
            })
            .collect()
    }

    /// Enrich a single identifier, retrying rate limits and network errors.
    async fn enrich_one(&self, identifier: &Identifier, halt: &CancellationToken) -> EnrichmentRecord {
        let _permit = tokio::select! {
            () = halt.cancelled() => return cancelled(identifier),
            permit = self.gate.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return cancelled(identifier),
            },
        };

        let mut retries = 0u32;
        let mut backoff_step = 0u32;

        loop {
            if halt.is_cancelled() {
                return cancelled(identifier);
            }

            match self.api.lookup(identifier).await {
                Ok(raw) => {
                    let record = EnrichmentRecord::from_raw(identifier.clone(), &raw);
                    debug!(identifier = %identifier, status = %record.status_label(), "lookup finished");
                    // Cancellation only shortens the pacing; the record is kept.
                    let _ = pause(halt, self.pacing).await;
                    return record;
                }
                Err(e) if e.is_fatal() => {
                    error!(identifier = %identifier, error = %e, "fatal response, stopping remaining lookups");
                    halt.cancel();
                    return EnrichmentRecord::failed(identifier.clone(), e.to_failure());
                }
                Err(e) if e.is_retryable() => {
                    if !self.policy.allows_retry(retries) {
                        warn!(identifier = %identifier, error = %e, "giving up after {} retries", retries);
                        let failure = match e {
                            ClientError::RateLimited { .. } => {
                                Failure::new(FailureKind::MaxRetriesExceeded, "Max retries exceeded")
                            }
                            other => other.to_failure(),
                        };
                        return EnrichmentRecord::failed(identifier.clone(), failure);
                    }

                    let hint = e.retry_after();
                    let wait = self.policy.wait_for(backoff_step, hint);
                    if hint.is_none() {
                        backoff_step += 1;
                    }
                    retries += 1;
                    warn!(
                        identifier = %identifier,
                        error = %e,
                        "lookup failed (attempt {}/{}), retrying in {:?}",
                        retries,
                        self.policy.max_retries,
                        wait
                    );

                    if pause(halt, wait).await.is_err() {
                        return cancelled(identifier);
                    }
                }
                Err(e) => {
                    warn!(identifier = %identifier, error = %e, "lookup failed");
                    return EnrichmentRecord::failed(identifier.clone(), e.to_failure());
                }
            }
        }
    }
}

fn cancelled(identifier: &Identifier) -> EnrichmentRecord {
    EnrichmentRecord::failed(
        identifier.clone(),
        Failure::new(FailureKind::Cancelled, "Cancelled"),
    )
}

async fn pause(halt: &CancellationToken, wait: Duration) -> Result<()> {
    tokio::select! {
        () = halt.cancelled() => Err(ClientError::Cancelled),
        () = tokio::time::sleep(wait) => Ok(()),
    }
}

#[async_trait]
impl<L: ContactLookupApi + ?Sized> BatchEnricher for PerIdentifierClient<L> {
    async fn enrich_batch(&self, batch: &Batch) -> Result<Vec<EnrichmentRecord>> {
        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let records = self.enrich_all(&batch.identifiers).await;

        if self.cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        if let Some(failure) = records
            .iter()
            .filter_map(EnrichmentRecord::failure)
            .find(|f| f.kind.is_fatal())
        {
            return Err(match failure.kind {
                FailureKind::Auth => ClientError::Unauthorized {
                    message: failure.message.clone(),
                },
                _ => ClientError::QuotaExceeded {
                    message: failure.message.clone(),
                },
            });
        }

        Ok(records)
    }

    fn mode(&self) -> EnrichmentMode {
        EnrichmentMode::PerIdentifier
    }
}
