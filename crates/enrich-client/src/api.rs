//! Wire types exchanged with the enrichment service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of a bulk job creation request.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    /// Identifiers to enrich
    pub identifiers: Vec<String>,
    /// Request email lookups
    pub email_enrichment: bool,
    /// Request phone lookups
    pub phone_enrichment: bool,
}

/// Body of an accepted bulk job creation response.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned job id
    pub job_id: String,
}

/// Handle to a job accepted by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    /// Server-assigned job id
    pub job_id: String,
}

impl JobHandle {
    /// Wrap a job id.
    #[must_use]
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.job_id)
    }
}

/// Lifecycle status of a bulk job.
///
/// Statuses only move forward: `submitted` → `processing` → one of the
/// terminal statuses. `timed_out` is never sent by the service; the client
/// assigns it when it abandons a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, not started
    Submitted,
    /// Work in progress
    Processing,
    /// Finished; results are available
    Completed,
    /// Finished with a job-level failure
    #[serde(alias = "failed")]
    Error,
    /// Abandoned by the client after the poll budget ran out
    TimedOut,
    /// Status string this client does not know about
    #[default]
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Whether no further transitions can happen.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::TimedOut)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Submitted => 1,
            Self::Processing => 2,
            Self::Completed | Self::Error | Self::TimedOut => 3,
        }
    }

    /// Move to `next` unless that would go backwards or leave a terminal status.
    #[must_use]
    pub fn advance(self, next: Self) -> Self {
        if self.is_terminal() || next.rank() < self.rank() {
            self
        } else {
            next
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::TimedOut => "timed_out",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Status and progress of a bulk job as returned by a poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Server-assigned job id
    #[serde(default)]
    pub job_id: String,
    /// Current status
    #[serde(default)]
    pub status: JobStatus,
    /// Identifiers processed so far
    #[serde(default)]
    pub processed: u64,
    /// Identifiers enriched successfully so far
    #[serde(default)]
    pub successful: u64,
    /// Identifiers that failed so far
    #[serde(default)]
    pub failed: u64,
    /// Per-identifier results (complete once the job has completed)
    #[serde(default)]
    pub results: Vec<RawResult>,
}

/// Per-identifier result as sent by the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawResult {
    /// Identifier this result belongs to
    #[serde(default, alias = "linkedin_url")]
    pub identifier: Option<String>,
    /// Explicit success flag (absent in single lookups)
    #[serde(default)]
    pub success: Option<bool>,
    /// Error description
    #[serde(default)]
    pub error: Option<String>,
    /// Human-readable detail accompanying `error`
    #[serde(default)]
    pub message: Option<String>,
    /// Contact entries
    #[serde(default)]
    pub contacts: Vec<RawContact>,
    /// Social profile matches
    #[serde(default)]
    pub social: Vec<SocialEntry>,
    /// Nested payload used by some service versions
    #[serde(default)]
    pub data: Option<RawResultData>,
}

impl RawResult {
    /// Whether the service reported this identifier as enriched.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(self.error.is_none())
    }

    /// Best available error text.
    #[must_use]
    pub fn error_text(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "Unknown error".to_string())
    }

    /// Contacts from both the top level and the nested payload.
    pub fn all_contacts(&self) -> impl Iterator<Item = &RawContact> {
        self.contacts
            .iter()
            .chain(self.data.iter().flat_map(|d| d.contacts.iter()))
    }

    /// Social entries from both the top level and the nested payload.
    pub fn all_social(&self) -> impl Iterator<Item = &SocialEntry> {
        self.social
            .iter()
            .chain(self.data.iter().flat_map(|d| d.social.iter()))
    }
}

/// Nested result payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawResultData {
    /// Contact entries
    #[serde(default)]
    pub contacts: Vec<RawContact>,
    /// Social profile matches
    #[serde(default)]
    pub social: Vec<SocialEntry>,
}

/// A single contact entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContact {
    /// `email` or `phone`
    #[serde(rename = "type")]
    pub kind: String,
    /// `work` or `personal`
    #[serde(rename = "subType", default)]
    pub sub_type: Option<String>,
    /// The address or number
    #[serde(default)]
    pub value: Option<String>,
}

/// A social profile match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialEntry {
    /// Platform code (`fb`, `tw`, `ig`, ...)
    #[serde(rename = "type")]
    pub platform: String,
    /// Profile link
    #[serde(default)]
    pub link: Option<String>,
    /// Match rating (number or string depending on service version)
    #[serde(default)]
    pub rating: Option<serde_json::Value>,
}

/// Response of a single-identifier lookup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LookupResponse {
    /// Results; the first entry belongs to the requested identifier
    #[serde(default)]
    pub data: Vec<RawResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_moves_forward() {
        let status = JobStatus::Processing;
        assert_eq!(status.advance(JobStatus::Submitted), JobStatus::Processing);
        assert_eq!(status.advance(JobStatus::Completed), JobStatus::Completed);
        assert_eq!(
            JobStatus::Completed.advance(JobStatus::Error),
            JobStatus::Completed
        );
        assert_eq!(
            JobStatus::Submitted.advance(JobStatus::Unknown),
            JobStatus::Submitted
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(JobStatus::TimedOut.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(!JobStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_snapshot_parsing() {
        let json = r#"{
            "status": "completed",
            "processed": 2,
            "successful": 1,
            "failed": 1,
            "results": [
                {"linkedin_url": "https://linkedin.com/in/a", "success": true,
                 "data": {"contacts": [{"type": "email", "subType": "work", "value": "a@corp.com"}]}},
                {"identifier": "https://linkedin.com/in/b", "success": false, "error": "not found"}
            ]
        }"#;
        let snapshot: JobSnapshot = serde_json::from_str(json).expect("parse snapshot");
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.results.len(), 2);
        assert_eq!(
            snapshot.results[0].identifier.as_deref(),
            Some("https://linkedin.com/in/a")
        );
        assert_eq!(snapshot.results[0].all_contacts().count(), 1);
        assert!(!snapshot.results[1].is_success());
        assert_eq!(snapshot.results[1].error_text(), "not found");
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let snapshot: JobSnapshot =
            serde_json::from_str(r#"{"status": "queued"}"#).expect("parse snapshot");
        assert_eq!(snapshot.status, JobStatus::Unknown);
    }

    #[test]
    fn test_lookup_without_success_flag() {
        let json = r#"{"data": [{"contacts": [{"type": "phone", "value": "+1 555"}]}]}"#;
        let response: LookupResponse = serde_json::from_str(json).expect("parse lookup");
        assert!(response.data[0].is_success());
    }
}
