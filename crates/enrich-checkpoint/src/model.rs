//! Checkpoint envelope and format migration.

use crate::error::{CheckpointError, Result};
use crate::step::Step;
use chrono::{DateTime, NaiveDateTime, Utc};
use enrich_core::DatasetName;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Envelope format written by this build.
pub const FORMAT_VERSION: u32 = 1;

/// Free-form metadata attached to a checkpoint.
pub type Metadata = serde_json::Map<String, Value>;

/// A persisted snapshot of pipeline state at a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint<S> {
    /// Envelope format version
    pub format_version: u32,
    /// Dataset the checkpoint belongs to
    pub dataset_name: DatasetName,
    /// Step key
    pub step: Step,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Additional metadata (`error`, `stage`, `batches_completed`, ...)
    #[serde(default)]
    pub metadata: Metadata,
    /// Opaque state payload
    pub state: S,
}

impl<S> Checkpoint<S> {
    /// Wrap `state` in a current-format envelope stamped now.
    pub fn new(dataset_name: DatasetName, step: Step, state: S, metadata: Metadata) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            dataset_name,
            step,
            created_at: Utc::now(),
            metadata,
            state,
        }
    }

    /// The step ordinal, if this is an ordinal checkpoint.
    #[must_use]
    pub fn ordinal(&self) -> Option<u32> {
        self.step.ordinal()
    }

    /// A string metadata entry.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// An unsigned integer metadata entry.
    #[must_use]
    pub fn metadata_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(Value::as_u64)
    }
}

/// Envelope written before format versioning existed.
#[derive(Debug, Deserialize)]
struct LegacyEnvelope {
    dataset_name: DatasetName,
    step: Step,
    timestamp: Option<String>,
    dataframe: Value,
    #[serde(default)]
    extra_data: Option<Metadata>,
}

fn parse_legacy_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Decode an artifact, migrating older envelope formats.
///
/// # Errors
/// `UnsupportedVersion` for envelopes newer than [`FORMAT_VERSION`],
/// `Malformed` or `Serialization` for anything that is not a checkpoint.
pub fn decode<S: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<Checkpoint<S>> {
    let serialization = |source| CheckpointError::Serialization {
        path: path.display().to_string(),
        source,
    };

    let value: Value = serde_json::from_slice(bytes).map_err(serialization)?;
    let Some(object) = value.as_object() else {
        return Err(CheckpointError::Malformed {
            path: path.display().to_string(),
            reason: "envelope is not a JSON object".to_string(),
        });
    };

    match object.get("format_version") {
        None => {
            let legacy: LegacyEnvelope = serde_json::from_value(value).map_err(serialization)?;
            migrate_legacy(legacy).map_err(serialization)
        }
        Some(version) => {
            let found = version.as_u64().ok_or_else(|| CheckpointError::Malformed {
                path: path.display().to_string(),
                reason: format!("format_version must be an unsigned integer, got {version}"),
            })?;
            if found > u64::from(FORMAT_VERSION) {
                return Err(CheckpointError::UnsupportedVersion {
                    path: path.display().to_string(),
                    found,
                    supported: FORMAT_VERSION,
                });
            }
            serde_json::from_value(value).map_err(serialization)
        }
    }
}

fn migrate_legacy<S: DeserializeOwned>(
    legacy: LegacyEnvelope,
) -> std::result::Result<Checkpoint<S>, serde_json::Error> {
    let created_at = legacy
        .timestamp
        .as_deref()
        .and_then(parse_legacy_timestamp)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    Ok(Checkpoint {
        format_version: FORMAT_VERSION,
        dataset_name: legacy.dataset_name,
        step: legacy.step,
        created_at,
        metadata: legacy.extra_data.unwrap_or_default(),
        state: serde_json::from_value(legacy.dataframe)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path() -> &'static Path {
        Path::new("checkpoints/leads_step_2.json")
    }

    #[test]
    fn test_current_format_round_trip() {
        let checkpoint = Checkpoint::new(
            DatasetName::new("leads").expect("valid dataset name"),
            Step::Ordinal(2),
            vec!["a".to_string(), "b".to_string()],
            Metadata::new(),
        );
        let bytes = serde_json::to_vec(&checkpoint).expect("encode");
        let decoded: Checkpoint<Vec<String>> = decode(path(), &bytes).expect("decode");
        assert_eq!(decoded, checkpoint);
    }

    #[test]
    fn test_legacy_envelope_is_migrated() {
        let bytes = serde_json::to_vec(&json!({
            "dataset_name": "leads",
            "step": 4,
            "timestamp": "2025-07-01T12:30:45.123456",
            "dataframe": [1, 2, 3],
            "extra_data": {"note": "old"}
        }))
        .expect("encode");

        let decoded: Checkpoint<Vec<u32>> = decode(path(), &bytes).expect("decode");
        assert_eq!(decoded.format_version, FORMAT_VERSION);
        assert_eq!(decoded.step, Step::Ordinal(4));
        assert_eq!(decoded.state, vec![1, 2, 3]);
        assert_eq!(decoded.metadata_str("note"), Some("old"));
        assert_eq!(decoded.created_at.to_rfc3339(), "2025-07-01T12:30:45.123456+00:00");
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let bytes = serde_json::to_vec(&json!({
            "format_version": 2,
            "dataset_name": "leads",
            "step": 1,
            "created_at": "2025-07-01T00:00:00Z",
            "state": null
        }))
        .expect("encode");

        let err = decode::<Value>(path(), &bytes).expect_err("unsupported");
        assert!(matches!(
            err,
            CheckpointError::UnsupportedVersion { found: 2, supported: 1, .. }
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            decode::<Value>(path(), b"not json"),
            Err(CheckpointError::Serialization { .. })
        ));
        assert!(matches!(
            decode::<Value>(path(), b"[1, 2]"),
            Err(CheckpointError::Malformed { .. })
        ));
    }
}
