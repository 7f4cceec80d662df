//! reqwest transport for the enrichment service.

use crate::api::{JobHandle, JobSnapshot, LookupResponse, RawResult, SubmitRequest, SubmitResponse};
use crate::backoff::parse_retry_after;
use crate::batch::Batch;
use crate::error::{ClientError, Result};
use crate::provider::{BulkEnrichmentApi, ContactLookupApi};
use async_trait::async_trait;
use enrich_core::{ApiConfig, Identifier};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// HTTP client implementing both transport traits.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone)]
pub struct HttpEnrichmentClient {
    client: Client,
    base_url: String,
    api_key: String,
    email_enrichment: bool,
    phone_enrichment: bool,
}

impl HttpEnrichmentClient {
    /// Create a client from the `[api]` configuration section.
    ///
    /// # Errors
    /// Returns `Unauthorized` if no API key is configured, or `Internal` if the
    /// HTTP client cannot be created.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ClientError::Unauthorized {
                message: "no API key configured (set ENRICH_API_KEY)".to_string(),
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            email_enrichment: config.email_enrichment,
            phone_enrichment: config.phone_enrichment,
        })
    }

    async fn read_json<T: DeserializeOwned>(
        response: Response,
        job_id: Option<&str>,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(status, body, job_id));
        }

        response.json().await.map_err(|e| ClientError::Parse {
            message: format!("Failed to parse response: {e}"),
        })
    }
}

/// Map a non-success HTTP status to a client error.
///
/// `job_id` is set for poll requests, where 404 means the job has expired.
#[must_use]
pub fn classify_status(status: StatusCode, body: String, job_id: Option<&str>) -> ClientError {
    match (status, job_id) {
        (StatusCode::UNAUTHORIZED, _) => ClientError::Unauthorized { message: body },
        (StatusCode::PAYMENT_REQUIRED, _) => ClientError::QuotaExceeded { message: body },
        (StatusCode::NOT_FOUND, Some(job_id)) => ClientError::JobExpired {
            job_id: job_id.to_string(),
        },
        (StatusCode::TOO_MANY_REQUESTS, _) => ClientError::RateLimited {
            retry_after: parse_retry_after(&body),
            message: body,
        },
        _ => ClientError::Http {
            status: status.as_u16(),
            message: body,
        },
    }
}

#[async_trait]
impl BulkEnrichmentApi for HttpEnrichmentClient {
    async fn submit(&self, batch: &Batch) -> Result<JobHandle> {
        let request = SubmitRequest {
            identifiers: batch
                .identifiers
                .iter()
                .map(|id| id.as_str().to_string())
                .collect(),
            email_enrichment: self.email_enrichment,
            phone_enrichment: self.phone_enrichment,
        };

        let response = self
            .client
            .post(format!("{}/bulk-contacts", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let accepted: SubmitResponse = Self::read_json(response, None).await?;
        debug!(job_id = %accepted.job_id, size = batch.len(), "bulk job accepted");
        Ok(JobHandle::new(accepted.job_id))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobSnapshot> {
        let response = self
            .client
            .get(format!("{}/bulk-contacts/{}", self.base_url, handle.job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let mut snapshot: JobSnapshot = Self::read_json(response, Some(&handle.job_id)).await?;
        if snapshot.job_id.is_empty() {
            snapshot.job_id.clone_from(&handle.job_id);
        }
        Ok(snapshot)
    }
}

#[async_trait]
impl ContactLookupApi for HttpEnrichmentClient {
    async fn lookup(&self, identifier: &Identifier) -> Result<RawResult> {
        let response = self
            .client
            .get(format!("{}/contacts", self.base_url))
            .query(&[("linkedin_url", identifier.as_str())])
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let body: LookupResponse = Self::read_json(response, None).await?;
        Ok(body.data.into_iter().next().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_auth_and_quota() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "bad key".to_string(), None),
            ClientError::Unauthorized { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::PAYMENT_REQUIRED, String::new(), Some("j")),
            ClientError::QuotaExceeded { .. }
        ));
    }

    #[test]
    fn test_classify_not_found_depends_on_request() {
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, String::new(), Some("job-9")),
            ClientError::JobExpired { job_id } if job_id == "job-9"
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, String::new(), None),
            ClientError::Http { status: 404, .. }
        ));
    }

    #[test]
    fn test_classify_rate_limit_hint() {
        let err = classify_status(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": "Try again in 7 seconds"}"#.to_string(),
            None,
        );
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert!(err.is_retryable());

        let err = classify_status(StatusCode::TOO_MANY_REQUESTS, "busy".to_string(), None);
        assert_eq!(err.retry_after(), None);
    }

    #[test]
    fn test_classify_other_status() {
        let err = classify_status(StatusCode::BAD_GATEWAY, "upstream".to_string(), None);
        assert!(matches!(err, ClientError::Http { status: 502, .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = ApiConfig::default();
        assert!(matches!(
            HttpEnrichmentClient::new(&config),
            Err(ClientError::Unauthorized { .. })
        ));

        let config = ApiConfig {
            api_key: Some("sk-test".to_string()),
            ..ApiConfig::default()
        };
        let client = HttpEnrichmentClient::new(&config).expect("client");
        assert!(!client.base_url.ends_with('/'));
    }
}
