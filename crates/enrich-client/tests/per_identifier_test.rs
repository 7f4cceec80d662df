use async_trait::async_trait;
use enrich_client::{
    split_batches, BatchEnricher, ClientError, ContactLookupApi, FailureKind,
    PerIdentifierClient, RawResult, Result,
};
use enrich_core::{Identifier, PerIdentifierConfig};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How the lookup double answers.
#[derive(Clone, Copy)]
enum Behaviour {
    /// Always answer with one personal email
    Succeed,
    /// Always 429 without a hint
    AlwaysRateLimited,
    /// 429 with a one-second hint on the first call, then succeed
    HintOnce,
    /// Always 500
    ServerError,
    /// 401 for the identifier ending in `/p3`, success otherwise
    RejectP3,
}

struct MockLookup {
    behaviour: Behaviour,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockLookup {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Self::with_latency(behaviour, Duration::ZERO)
    }

    fn with_latency(behaviour: Behaviour, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            latency,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn personal_email(identifier: &Identifier) -> RawResult {
    serde_json::from_value(json!({
        "contacts": [{"type": "email", "subType": "personal", "value": format!("{}@gmail.com", identifier.as_str().len())}]
    }))
    .expect("raw result")
}

#[async_trait]
impl ContactLookupApi for MockLookup {
    async fn lookup(&self, identifier: &Identifier) -> Result<RawResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.behaviour {
            Behaviour::Succeed => Ok(personal_email(identifier)),
            Behaviour::AlwaysRateLimited => Err(ClientError::RateLimited {
                message: "Rate limit exceeded".to_string(),
                retry_after: None,
            }),
            Behaviour::HintOnce if call == 0 => Err(ClientError::RateLimited {
                message: "Try again in 1 seconds".to_string(),
                retry_after: Some(Duration::from_secs(1)),
            }),
            Behaviour::HintOnce => Ok(personal_email(identifier)),
            Behaviour::ServerError => Err(ClientError::Http {
                status: 500,
                message: "internal".to_string(),
            }),
            Behaviour::RejectP3 if identifier.as_str().ends_with("/p3") => {
                Err(ClientError::Unauthorized {
                    message: "invalid key".to_string(),
                })
            }
            Behaviour::RejectP3 => Ok(personal_email(identifier)),
        }
    }
}

fn ids(n: usize) -> Vec<Identifier> {
    (0..n)
        .map(|i| Identifier::new(format!("https://linkedin.com/in/p{i}")).expect("valid identifier"))
        .collect()
}

fn config(max_concurrent_requests: usize, pacing_delay_ms: u64) -> PerIdentifierConfig {
    PerIdentifierConfig {
        max_concurrent_requests,
        pacing_delay_ms,
        max_retries: 3,
        initial_backoff_secs: 5,
        retry_after_margin_secs: 2,
    }
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_exhaustion_makes_four_calls() {
    let api = MockLookup::new(Behaviour::AlwaysRateLimited);
    let client = PerIdentifierClient::new(api.clone(), &config(10, 0), CancellationToken::new());

    let started = tokio::time::Instant::now();
    let records = client.enrich_all(&ids(1)).await;

    assert_eq!(api.calls(), 4);
    let failure = records[0].failure().expect("failed");
    assert_eq!(failure.kind, FailureKind::MaxRetriesExceeded);
    assert_eq!(failure.message, "Max retries exceeded");
    // 5s + 10s + 20s of backoff between the four calls
    assert!(started.elapsed() >= Duration::from_secs(35));
    assert!(started.elapsed() < Duration::from_secs(40));
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_hint_is_honoured() {
    let api = MockLookup::new(Behaviour::HintOnce);
    let client = PerIdentifierClient::new(api.clone(), &config(10, 0), CancellationToken::new());

    let started = tokio::time::Instant::now();
    let records = client.enrich_all(&ids(1)).await;

    assert!(records[0].is_success());
    assert_eq!(api.calls(), 2);
    // hint (1s) + margin (2s), not the 5s computed backoff
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_never_exceeds_limit() {
    let api = MockLookup::with_latency(Behaviour::Succeed, Duration::from_millis(200));
    let client = PerIdentifierClient::new(api.clone(), &config(3, 100), CancellationToken::new());
    let input = ids(25);

    let records = client.enrich_all(&input).await;

    assert_eq!(api.calls(), 25);
    assert!(api.max_in_flight.load(Ordering::SeqCst) <= 3);
    assert!(api.max_in_flight.load(Ordering::SeqCst) >= 1);
    let order: Vec<&Identifier> = records.iter().map(|r| &r.identifier).collect();
    assert_eq!(order, input.iter().collect::<Vec<_>>());
    assert!(records.iter().all(|r| r.is_success()));
}

#[tokio::test(start_paused = true)]
async fn test_pacing_holds_the_permit() {
    let api = MockLookup::new(Behaviour::Succeed);
    let client = PerIdentifierClient::new(api, &config(1, 1000), CancellationToken::new());

    let started = tokio::time::Instant::now();
    client.enrich_all(&ids(3)).await;

    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_other_http_errors_are_not_retried() {
    let api = MockLookup::new(Behaviour::ServerError);
    let client = PerIdentifierClient::new(api.clone(), &config(10, 0), CancellationToken::new());

    let records = client.enrich_all(&ids(2)).await;

    assert_eq!(api.calls(), 2);
    assert!(records
        .iter()
        .all(|r| r.failure().map(|f| f.kind) == Some(FailureKind::Http)));
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_aborts_batch() {
    let api = MockLookup::new(Behaviour::RejectP3);
    let client = PerIdentifierClient::new(api, &config(2, 0), CancellationToken::new());
    let batch = split_batches(&ids(6), 500).remove(0);

    let result = client.enrich_batch(&batch).await;

    assert!(matches!(result, Err(ClientError::Unauthorized { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let api = MockLookup::new(Behaviour::Succeed);
    let client = PerIdentifierClient::new(api.clone(), &config(2, 0), cancel);
    let batch = split_batches(&ids(2), 500).remove(0);

    let result = client.enrich_batch(&batch).await;

    assert!(matches!(result, Err(ClientError::Cancelled)));
    assert_eq!(api.calls(), 0);
}
