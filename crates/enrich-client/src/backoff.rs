//! Backoff computation for rate-limited and failed requests.
//!
//! The wait before a retry is a pure function of the attempt number and an
//! optional server hint. A parseable hint always wins over the computed
//! exponential backoff.

use enrich_core::{BulkConfig, PerIdentifierConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tokio::time::Instant;

/// Growth factor between consecutive computed backoffs.
const BACKOFF_FACTOR: u32 = 2;

/// Upper bound for a computed (hint-less) backoff.
const MAX_COMPUTED_BACKOFF: Duration = Duration::from_secs(3600);

static RETRY_AFTER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)try again in (\d+) seconds?").expect("valid regex"));

/// Extract a retry-after hint such as `Try again in 12 seconds` from an error body.
#[must_use]
pub fn parse_retry_after(text: &str) -> Option<Duration> {
    RETRY_AFTER_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Retry policy for per-identifier requests and bulk submit/poll requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Backoff before the first retry when no hint is available
    pub initial: Duration,
    /// Added on top of a server hint
    pub hint_margin: Duration,
    /// Retries allowed after the first attempt
    pub max_retries: u32,
}

impl BackoffPolicy {
    /// Build the policy from the per-identifier configuration section.
    #[must_use]
    pub fn from_config(config: &PerIdentifierConfig) -> Self {
        Self {
            initial: config.initial_backoff(),
            hint_margin: config.retry_after_margin(),
            max_retries: config.max_retries,
        }
    }

    /// Build the policy for bulk submit and poll requests.
    #[must_use]
    pub fn for_bulk(config: &BulkConfig) -> Self {
        Self {
            initial: config.initial_backoff(),
            hint_margin: config.retry_after_margin(),
            max_retries: config.max_retries,
        }
    }

    /// Wait before retry number `attempt` (zero-based).
    ///
    /// With a hint: `hint + hint_margin`. Without: `initial * 2^attempt`,
    /// saturating at one hour, which keeps the sequence non-decreasing.
    #[must_use]
    pub fn wait_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint.saturating_add(self.hint_margin);
        }

        BACKOFF_FACTOR
            .checked_pow(attempt)
            .and_then(|factor| self.initial.checked_mul(factor))
            .map_or(MAX_COMPUTED_BACKOFF, |d| d.min(MAX_COMPUTED_BACKOFF))
    }

    /// Whether another retry is allowed after `retries_so_far` retries.
    #[must_use]
    pub fn allows_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&PerIdentifierConfig::default())
    }
}

/// Wall-clock budget for polling a single job.
#[derive(Debug, Clone, Copy)]
pub struct PollBudget {
    started: Instant,
    max: Duration,
}

impl PollBudget {
    /// Start the clock now.
    #[must_use]
    pub fn start(max: Duration) -> Self {
        Self {
            started: Instant::now(),
            max,
        }
    }

    /// Time elapsed since the budget was started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the budget has been used up.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.elapsed() > self.max
    }

    /// The configured maximum.
    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_secs(5),
            hint_margin: Duration::from_secs(2),
            max_retries: 3,
        }
    }

    #[test]
    fn test_exponential_growth() {
        let p = policy();
        assert_eq!(p.wait_for(0, None), Duration::from_secs(5));
        assert_eq!(p.wait_for(1, None), Duration::from_secs(10));
        assert_eq!(p.wait_for(2, None), Duration::from_secs(20));
    }

    #[test]
    fn test_wait_is_non_decreasing() {
        let p = policy();
        let mut previous = Duration::ZERO;
        for attempt in 0..80 {
            let wait = p.wait_for(attempt, None);
            assert!(wait >= previous, "attempt {attempt}");
            previous = wait;
        }
        assert_eq!(previous, MAX_COMPUTED_BACKOFF);
    }

    #[test]
    fn test_hint_overrides_backoff() {
        let p = policy();
        for attempt in 0..6 {
            assert_eq!(
                p.wait_for(attempt, Some(Duration::from_secs(1))),
                Duration::from_secs(3)
            );
        }
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(
            parse_retry_after(r#"{"error":"Rate limit exceeded. Try again in 42 seconds."}"#),
            Some(Duration::from_secs(42))
        );
        assert_eq!(
            parse_retry_after("try again in 1 second"),
            Some(Duration::from_secs(1))
        );
        assert_eq!(parse_retry_after("slow down"), None);
    }

    #[test]
    fn test_allows_retry() {
        let p = policy();
        assert!(p.allows_retry(0));
        assert!(p.allows_retry(2));
        assert!(!p.allows_retry(3));
    }

    #[test]
    fn test_bulk_policy_reads_bulk_section() {
        let config = BulkConfig {
            max_retries: 6,
            initial_backoff_secs: 1,
            retry_after_margin_secs: 0,
            ..BulkConfig::default()
        };
        let p = BackoffPolicy::for_bulk(&config);
        assert_eq!(p.max_retries, 6);
        assert_eq!(p.wait_for(2, None), Duration::from_secs(4));
        assert_eq!(
            p.wait_for(0, Some(Duration::from_secs(9))),
            Duration::from_secs(9)
        );
        assert_ne!(p, BackoffPolicy::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_budget_exhaustion() {
        let budget = PollBudget::start(Duration::from_secs(10));
        assert!(!budget.exhausted());
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(budget.exhausted());
        assert!(budget.elapsed() >= Duration::from_secs(11));
    }
}
