//! Checkpoint step keys.
//!
//! A step is either a pipeline ordinal (`3`) or a free-form label
//! (`enrich_batch_4`, `error_1717000000`). Labels never parse as an integer,
//! so the two kinds stay distinguishable in artifact names.

use crate::error::{CheckpointError, Result};
use enrich_core::{DatasetName, STEP_SEPARATOR};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// File extension of checkpoint artifacts.
pub const ARTIFACT_EXTENSION: &str = "json";

/// Key of a checkpoint within a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// Position in the stage sequence
    Ordinal(u32),
    /// Named intermediate or error checkpoint
    Label(String),
}

impl Step {
    /// Create a label step.
    ///
    /// # Errors
    /// Returns `InvalidStep` if the label is empty, numeric, or contains
    /// characters other than ASCII letters, digits, `_` and `-`.
    pub fn label(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let invalid = |reason: &str| CheckpointError::InvalidStep {
            step: label.clone(),
            reason: reason.to_string(),
        };

        if label.is_empty() {
            return Err(invalid("label must not be empty"));
        }
        if label.parse::<u64>().is_ok() {
            return Err(invalid("label must not be a number"));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("label may only contain letters, digits, '_' and '-'"));
        }
        Ok(Self::Label(label))
    }

    /// The ordinal, if this is an ordinal step.
    #[must_use]
    pub fn ordinal(&self) -> Option<u32> {
        match self {
            Self::Ordinal(n) => Some(*n),
            Self::Label(_) => None,
        }
    }

    /// The label, if this is a labelled step.
    #[must_use]
    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Ordinal(_) => None,
            Self::Label(label) => Some(label),
        }
    }

    /// Artifact file name for this step of `dataset`.
    #[must_use]
    pub fn file_name(&self, dataset: &DatasetName) -> String {
        format!("{dataset}{STEP_SEPARATOR}{self}.{ARTIFACT_EXTENSION}")
    }

    /// Recover the step from an artifact file name belonging to `dataset`.
    ///
    /// Returns `None` for files of other datasets or unrelated files.
    #[must_use]
    pub fn from_file_name(dataset: &DatasetName, file_name: &str) -> Option<Self> {
        let rest = file_name
            .strip_prefix(dataset.as_str())?
            .strip_prefix(STEP_SEPARATOR)?
            .strip_suffix(ARTIFACT_EXTENSION)?
            .strip_suffix('.')?;
        rest.parse().ok()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordinal(n) => write!(f, "{n}"),
            Self::Label(label) => write!(f, "{label}"),
        }
    }
}

impl FromStr for Step {
    type Err = CheckpointError;

    fn from_str(s: &str) -> Result<Self> {
        match s.parse::<u32>() {
            Ok(n) => Ok(Self::Ordinal(n)),
            Err(_) => Self::label(s),
        }
    }
}

impl From<u32> for Step {
    fn from(n: u32) -> Self {
        Self::Ordinal(n)
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Ordinal(n) => serializer.serialize_u32(*n),
            Self::Label(label) => serializer.serialize_str(label),
        }
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawStep {
            Number(u32),
            Text(String),
        }

        match RawStep::deserialize(deserializer)? {
            RawStep::Number(n) => Ok(Self::Ordinal(n)),
            RawStep::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> DatasetName {
        DatasetName::new("leads").expect("valid dataset name")
    }

    #[test]
    fn test_parse_ordinal_and_label() {
        assert_eq!("4".parse::<Step>().expect("ordinal"), Step::Ordinal(4));
        assert_eq!(
            "enrich_batch_2".parse::<Step>().expect("label"),
            Step::Label("enrich_batch_2".to_string())
        );
    }

    #[test]
    fn test_label_validation() {
        assert!(Step::label("").is_err());
        assert!(Step::label("12").is_err());
        assert!(Step::label("../escape").is_err());
        assert!(Step::label("with space").is_err());
        assert!(Step::label("error_1717000000").is_ok());
    }

    #[test]
    fn test_file_name_round_trip() {
        let ds = dataset();
        for step in [Step::Ordinal(7), Step::label("enrich_batch_4").expect("label")] {
            let name = step.file_name(&ds);
            assert_eq!(Step::from_file_name(&ds, &name), Some(step));
        }
        assert_eq!(dataset().to_string(), "leads");
        assert_eq!(Step::Ordinal(3).file_name(&ds), "leads_step_3.json");
    }

    #[test]
    fn test_foreign_files_are_ignored() {
        let ds = dataset();
        assert_eq!(Step::from_file_name(&ds, "leads_2024_step_3.json"), None);
        assert_eq!(Step::from_file_name(&ds, "leads_step_3.pkl"), None);
        assert_eq!(Step::from_file_name(&ds, "other_step_3.json"), None);
        assert_eq!(Step::from_file_name(&ds, ".tmpAbC123"), None);
    }

    #[test]
    fn test_serde_representation() {
        assert_eq!(serde_json::to_string(&Step::Ordinal(5)).expect("json"), "5");
        let step: Step = serde_json::from_str("\"error_1\"").expect("label");
        assert_eq!(step, Step::Label("error_1".to_string()));
        let step: Step = serde_json::from_str("\"6\"").expect("numeric string");
        assert_eq!(step, Step::Ordinal(6));
    }
}
