//! Checkpoint store backed by a directory of JSON artifacts.

use crate::error::{CheckpointError, Result};
use crate::model::{decode, Checkpoint, Metadata};
use crate::step::Step;
use chrono::{DateTime, Utc};
use enrich_core::DatasetName;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// An artifact found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactInfo {
    /// Step key parsed from the file name
    pub step: Step,
    /// Full path to the artifact
    pub path: PathBuf,
    /// Last modification time
    pub modified: DateTime<Utc>,
}

/// Reads and writes checkpoints under a single directory.
///
/// Artifacts are named `<dataset>_step_<step>.json`. Writes go through a
/// temporary file in the same directory and are renamed into place, so an
/// interrupted write never damages an existing artifact.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the artifacts.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for `step` of `dataset`.
    #[must_use]
    pub fn artifact_path(&self, dataset: &DatasetName, step: &Step) -> PathBuf {
        self.dir.join(step.file_name(dataset))
    }

    /// Persist `state` as the checkpoint for `step`, replacing any previous
    /// artifact for the same step.
    ///
    /// # Errors
    /// Returns `Io` or `Serialization` if the artifact cannot be written.
    pub fn save<S: Serialize>(
        &self,
        dataset: &DatasetName,
        step: &Step,
        state: &S,
        metadata: Metadata,
    ) -> Result<PathBuf> {
        if let Some(ordinal) = step.ordinal() {
            if let Some(latest) = self.latest_ordinal(dataset)? {
                if ordinal < latest {
                    warn!(
                        dataset = %dataset,
                        ordinal,
                        latest,
                        "saving checkpoint behind the latest ordinal"
                    );
                }
            }
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| CheckpointError::io(&self.dir, e))?;

        let path = self.artifact_path(dataset, step);
        let checkpoint = Checkpoint::new(dataset.clone(), step.clone(), state, metadata);

        let temp = NamedTempFile::new_in(&self.dir).map_err(|e| CheckpointError::io(&self.dir, e))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer(&mut writer, &checkpoint).map_err(|source| {
                CheckpointError::Serialization {
                    path: path.display().to_string(),
                    source,
                }
            })?;
            writer.flush().map_err(|e| CheckpointError::io(&path, e))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(|e| CheckpointError::io(&path, e))?;
        temp.persist(&path)
            .map_err(|e| CheckpointError::io(&path, e.error))?;

        info!(dataset = %dataset, step = %step, path = %path.display(), "checkpoint saved");
        Ok(path)
    }

    /// Load the checkpoint stored under exactly `step`.
    ///
    /// # Errors
    /// Returns an error if the artifact exists but cannot be read or decoded.
    pub fn load_step<S: DeserializeOwned>(
        &self,
        dataset: &DatasetName,
        step: &Step,
    ) -> Result<Option<Checkpoint<S>>> {
        let path = self.artifact_path(dataset, step);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckpointError::io(&path, e)),
        };

        let checkpoint = decode(&path, &bytes)?;
        debug!(dataset = %dataset, step = %step, "checkpoint loaded");
        Ok(Some(checkpoint))
    }

    /// Load the checkpoint with the highest ordinal. Labels are ignored.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be listed or the artifact
    /// cannot be decoded.
    pub fn load_latest<S: DeserializeOwned>(
        &self,
        dataset: &DatasetName,
    ) -> Result<Option<Checkpoint<S>>> {
        match self.latest_ordinal(dataset)? {
            Some(ordinal) => self.load_step(dataset, &Step::Ordinal(ordinal)),
            None => Ok(None),
        }
    }

    /// Highest ordinal stored for `dataset`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be listed.
    pub fn latest_ordinal(&self, dataset: &DatasetName) -> Result<Option<u32>> {
        Ok(self
            .list(dataset)?
            .iter()
            .filter_map(|a| a.step.ordinal())
            .max())
    }

    /// All artifacts of `dataset`, oldest first.
    ///
    /// A missing directory yields an empty list.
    ///
    /// # Errors
    /// Returns an error if the directory exists but cannot be read.
    pub fn list(&self, dataset: &DatasetName) -> Result<Vec<ArtifactInfo>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CheckpointError::io(&self.dir, e)),
        };

        let mut artifacts = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CheckpointError::io(&self.dir, e))?;
            let file_name = entry.file_name();
            let Some(step) = file_name
                .to_str()
                .and_then(|name| Step::from_file_name(dataset, name))
            else {
                continue;
            };

            let path = entry.path();
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| CheckpointError::io(&path, e))?;

            artifacts.push(ArtifactInfo {
                step,
                path,
                modified: DateTime::<Utc>::from(modified),
            });
        }

        artifacts.sort_by(|a, b| recency_key(a).cmp(&recency_key(b)));
        Ok(artifacts)
    }

    /// Remove all but the `keep_latest` most recently modified artifacts of
    /// `dataset`. At least one artifact is always kept.
    ///
    /// Returns the number of artifacts removed. Failures to remove a single
    /// file are logged and skipped.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be listed.
    pub fn cleanup(&self, dataset: &DatasetName, keep_latest: usize) -> Result<usize> {
        let artifacts = self.list(dataset)?;
        let keep = keep_latest.max(1);
        if artifacts.len() <= keep {
            return Ok(0);
        }

        let stale = artifacts.len() - keep;
        let mut removed = 0;
        for artifact in artifacts.iter().take(stale) {
            match std::fs::remove_file(&artifact.path) {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %artifact.path.display(), "removed old checkpoint");
                }
                Err(e) => {
                    warn!(path = %artifact.path.display(), error = %e, "failed to remove old checkpoint");
                }
            }
        }

        if removed > 0 {
            info!(dataset = %dataset, removed, kept = keep, "cleaned up old checkpoints");
        }
        Ok(removed)
    }
}

/// Ordering used to decide recency: modification time, then ordinal, then label.
fn recency_key(artifact: &ArtifactInfo) -> (DateTime<Utc>, i64, String) {
    let ordinal = artifact.step.ordinal().map_or(-1, i64::from);
    (artifact.modified, ordinal, artifact.step.to_string())
}
