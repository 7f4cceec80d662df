//! Shared types used across the enrichment pipeline.
//!
//! This module defines the newtypes that give identifiers and dataset names
//! their invariants once, at construction.

use crate::error::EnrichError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used in checkpoint artifact names; dataset names may not contain it.
pub const STEP_SEPARATOR: &str = "_step_";

/// Opaque identifier of a profile to enrich (typically a profile URL).
///
/// Identifiers are trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Create a new `Identifier`, trimming surrounding whitespace.
    ///
    /// # Errors
    /// Returns error if the value is empty after trimming.
    pub fn new(id: impl Into<String>) -> Result<Self, EnrichError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(EnrichError::Validation(
                "identifier must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Parse an optional table cell, treating blank cells as absent.
    #[must_use]
    pub fn from_cell(cell: Option<&str>) -> Option<Self> {
        cell.and_then(|value| Self::new(value).ok())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Identifier {
    type Error = EnrichError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// Name of a dataset, used as the key prefix of its checkpoints.
///
/// Dataset names must be non-empty, may not contain path separators, may not
/// start with a dot and may not contain the checkpoint step separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetName(String);

impl DatasetName {
    /// Create a new `DatasetName`.
    ///
    /// # Errors
    /// Returns error if the name violates the constraints above.
    pub fn new(name: impl Into<String>) -> Result<Self, EnrichError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Derive a dataset name from an input file path (its file stem).
    ///
    /// # Errors
    /// Returns error if the path has no usable stem.
    pub fn from_path(path: &std::path::Path) -> Result<Self, EnrichError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                EnrichError::Validation(format!(
                    "cannot derive dataset name from '{}'",
                    path.display()
                ))
            })?;
        Self::new(stem)
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<(), EnrichError> {
        if name.trim().is_empty() {
            return Err(EnrichError::Validation(
                "invalid dataset name: must not be empty".to_string(),
            ));
        }
        if name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(EnrichError::Validation(format!(
                "invalid dataset name: '{name}' must be a plain file name"
            )));
        }
        if name.contains(STEP_SEPARATOR) {
            return Err(EnrichError::Validation(format!(
                "invalid dataset name: '{name}' contains reserved sequence '{STEP_SEPARATOR}'"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DatasetName {
    type Error = EnrichError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DatasetName> for String {
    fn from(name: DatasetName) -> Self {
        name.0
    }
}
