//! Per-identifier enrichment outcomes.
//!
//! Every identifier handed to the client ends up as exactly one
//! [`EnrichmentRecord`]: either enriched (possibly with no contacts) or failed
//! with a classified [`Failure`]. Email lists are derived from the contacts on
//! demand rather than stored next to them.

use crate::api::{RawContact, RawResult, SocialEntry};
use enrich_core::Identifier;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a contact entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    /// Email address
    Email,
    /// Phone number
    Phone,
}

/// Sub-kind of a contact entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactSubKind {
    /// Work address/number
    Work,
    /// Personal address/number
    Personal,
}

/// A typed contact entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Email or phone
    pub kind: ContactKind,
    /// Work or personal, when the service says so
    pub subkind: Option<ContactSubKind>,
    /// The address or number
    pub value: String,
}

impl Contact {
    fn from_raw(raw: &RawContact) -> Option<Self> {
        let value = raw.value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let kind = match raw.kind.to_ascii_lowercase().as_str() {
            "email" => ContactKind::Email,
            "phone" => ContactKind::Phone,
            _ => return None,
        };
        let subkind = match raw.sub_type.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("work") => Some(ContactSubKind::Work),
            Some("personal") => Some(ContactSubKind::Personal),
            _ => None,
        };
        Some(Self {
            kind,
            subkind,
            value: value.to_string(),
        })
    }
}

/// A matched social profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialProfile {
    /// Platform code as sent by the service (`fb`, `tw`, `ig`, ...)
    pub platform: String,
    /// Profile link
    pub link: Option<String>,
    /// Match rating rendered as text
    pub rating: Option<String>,
}

impl SocialProfile {
    fn from_raw(raw: &SocialEntry) -> Self {
        let rating = raw.rating.as_ref().and_then(|value| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });
        Self {
            platform: raw.platform.to_ascii_lowercase(),
            link: raw.link.clone().filter(|l| !l.is_empty()),
            rating,
        }
    }

    /// Human-readable platform name, if the platform is one we report.
    #[must_use]
    pub fn platform_name(&self) -> Option<&'static str> {
        match self.platform.as_str() {
            "fb" | "facebook" => Some("Facebook"),
            "tw" | "twitter" => Some("Twitter"),
            "ig" | "instagram" => Some("Instagram"),
            _ => None,
        }
    }
}

/// Classification of a failed identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Authentication rejected
    Auth,
    /// No credits left
    QuotaExceeded,
    /// Rate limited (and not retried further)
    RateLimited,
    /// Rate limited on every allowed attempt
    MaxRetriesExceeded,
    /// Job unknown to the service when polled
    JobExpired,
    /// Job abandoned after the poll budget ran out
    JobTimeout,
    /// Job finished with a job-level error
    JobFailed,
    /// Job could not be created
    SubmissionFailed,
    /// Transport failure
    Network,
    /// Unexpected HTTP status or unreadable response
    Http,
    /// The service reported an error for this identifier
    Remote,
    /// A completed job did not include this identifier
    MissingResult,
    /// Work stopped by a cancellation request
    Cancelled,
}

impl FailureKind {
    /// Whether this failure must abort the whole run.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Auth | Self::QuotaExceeded)
    }
}

/// A classified failure with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Classification
    pub kind: FailureKind,
    /// Reason
    pub message: String,
}

impl Failure {
    /// Create a failure.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Outcome for one identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    /// The service answered for this identifier
    Enriched {
        /// Contact entries (may be empty)
        contacts: Vec<Contact>,
        /// Social profile matches
        social: Vec<SocialProfile>,
    },
    /// The identifier could not be enriched
    Failed(Failure),
}

/// Outcome for one identifier, keyed by that identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRecord {
    /// The identifier this record is about
    pub identifier: Identifier,
    /// What happened
    pub outcome: EnrichmentOutcome,
}

impl EnrichmentRecord {
    /// Build a record from a raw service result.
    #[must_use]
    pub fn from_raw(identifier: Identifier, raw: &RawResult) -> Self {
        if !raw.is_success() {
            return Self::failed(
                identifier,
                Failure::new(FailureKind::Remote, raw.error_text()),
            );
        }

        let contacts = raw.all_contacts().filter_map(Contact::from_raw).collect();
        let social = raw.all_social().map(SocialProfile::from_raw).collect();
        Self {
            identifier,
            outcome: EnrichmentOutcome::Enriched { contacts, social },
        }
    }

    /// Build a failed record.
    #[must_use]
    pub fn failed(identifier: Identifier, failure: Failure) -> Self {
        Self {
            identifier,
            outcome: EnrichmentOutcome::Failed(failure),
        }
    }

    /// The failure, if this record failed.
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match &self.outcome {
            EnrichmentOutcome::Failed(failure) => Some(failure),
            EnrichmentOutcome::Enriched { .. } => None,
        }
    }

    /// Whether the service answered for this identifier.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, EnrichmentOutcome::Enriched { .. })
    }

    fn contacts(&self) -> &[Contact] {
        match &self.outcome {
            EnrichmentOutcome::Enriched { contacts, .. } => contacts,
            EnrichmentOutcome::Failed(_) => &[],
        }
    }

    /// Social profile matches (empty for failures).
    #[must_use]
    pub fn social(&self) -> &[SocialProfile] {
        match &self.outcome {
            EnrichmentOutcome::Enriched { social, .. } => social,
            EnrichmentOutcome::Failed(_) => &[],
        }
    }

    /// Emails tagged as work addresses.
    #[must_use]
    pub fn work_emails(&self) -> Vec<&str> {
        self.contacts()
            .iter()
            .filter(|c| c.kind == ContactKind::Email && c.subkind == Some(ContactSubKind::Work))
            .map(|c| c.value.as_str())
            .collect()
    }

    /// Emails not tagged as work addresses.
    #[must_use]
    pub fn personal_emails(&self) -> Vec<&str> {
        self.contacts()
            .iter()
            .filter(|c| c.kind == ContactKind::Email && c.subkind != Some(ContactSubKind::Work))
            .map(|c| c.value.as_str())
            .collect()
    }

    /// Phone numbers.
    #[must_use]
    pub fn phones(&self) -> Vec<&str> {
        self.contacts()
            .iter()
            .filter(|c| c.kind == ContactKind::Phone)
            .map(|c| c.value.as_str())
            .collect()
    }

    /// Status text written to the dataset.
    #[must_use]
    pub fn status_label(&self) -> String {
        match &self.outcome {
            EnrichmentOutcome::Enriched { contacts, .. } if contacts.is_empty() => {
                "No contacts found".to_string()
            }
            EnrichmentOutcome::Enriched { .. } => "Success".to_string(),
            EnrichmentOutcome::Failed(failure) => format!("Error: {}", failure.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> Identifier {
        Identifier::new("https://linkedin.com/in/jane").unwrap()
    }

    fn raw(json: &str) -> RawResult {
        serde_json::from_str(json).expect("parse raw result")
    }

    #[test]
    fn test_contacts_are_split_by_subtype() {
        let record = EnrichmentRecord::from_raw(
            id(),
            &raw(r#"{"success": true, "contacts": [
                {"type": "email", "subType": "work", "value": "jane@corp.com"},
                {"type": "email", "subType": "personal", "value": "jane@gmail.com"},
                {"type": "email", "value": "jd@yahoo.com"},
                {"type": "phone", "subType": "work", "value": "+1 555 0100"},
                {"type": "fax", "value": "ignored"},
                {"type": "email", "value": "  "}
            ]}"#),
        );
        assert!(record.is_success());
        assert_eq!(record.work_emails(), vec!["jane@corp.com"]);
        assert_eq!(
            record.personal_emails(),
            vec!["jane@gmail.com", "jd@yahoo.com"]
        );
        assert_eq!(record.phones(), vec!["+1 555 0100"]);
        assert_eq!(record.status_label(), "Success");
    }

    #[test]
    fn test_no_contacts_label() {
        let record = EnrichmentRecord::from_raw(id(), &raw(r#"{"success": true}"#));
        assert_eq!(record.status_label(), "No contacts found");
    }

    #[test]
    fn test_remote_error_becomes_failure() {
        let record = EnrichmentRecord::from_raw(
            id(),
            &raw(r#"{"success": false, "error": "profile not found"}"#),
        );
        let failure = record.failure().expect("failed record");
        assert_eq!(failure.kind, FailureKind::Remote);
        assert_eq!(record.status_label(), "Error: profile not found");
        assert!(record.work_emails().is_empty());
    }

    #[test]
    fn test_social_profiles() {
        let record = EnrichmentRecord::from_raw(
            id(),
            &raw(r#"{"social": [
                {"type": "fb", "link": "https://facebook.com/jane", "rating": 0.9},
                {"type": "ig", "link": "https://instagram.com/jane", "rating": "high"},
                {"type": "xx"}
            ]}"#),
        );
        let social = record.social();
        assert_eq!(social.len(), 3);
        assert_eq!(social[0].platform_name(), Some("Facebook"));
        assert_eq!(social[0].rating.as_deref(), Some("0.9"));
        assert_eq!(social[1].rating.as_deref(), Some("high"));
        assert_eq!(social[2].platform_name(), None);
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(FailureKind::Auth.is_fatal());
        assert!(FailureKind::QuotaExceeded.is_fatal());
        assert!(!FailureKind::MaxRetriesExceeded.is_fatal());
    }
}
