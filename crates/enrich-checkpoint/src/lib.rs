//! Enrich Checkpoint - Versioned on-disk checkpoints for resumable runs.
//!
//! Every completed pipeline stage leaves a checkpoint behind so a restarted
//! run can continue where the previous one stopped. Checkpoints are JSON
//! envelopes keyed by dataset and step, written atomically.
//!
//! # Features
//!
//! - **Ordinal and label steps**: stage checkpoints (`3`) next to intermediate
//!   and error checkpoints (`enrich_batch_4`, `error_1717000000`)
//! - **Atomic writes**: temp file in the same directory, then rename
//! - **Format versioning**: legacy unversioned envelopes are migrated on load,
//!   newer formats are rejected
//! - **Retention**: keep only the most recent artifacts per dataset
//!
//! # Example
//!
//! ```rust,no_run
//! use enrich_checkpoint::{CheckpointStore, Metadata, Step};
//! use enrich_core::DatasetName;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CheckpointStore::new("checkpoints");
//! let dataset = DatasetName::new("leads")?;
//!
//! store.save(&dataset, &Step::Ordinal(1), &vec!["row"], Metadata::new())?;
//! let latest = store.load_latest::<Vec<String>>(&dataset)?;
//! assert_eq!(latest.and_then(|c| c.ordinal()), Some(1));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod model;
pub mod step;
pub mod store;

// Re-export commonly used types
pub use error::{CheckpointError, Result};
pub use model::{Checkpoint, Metadata, FORMAT_VERSION};
pub use step::Step;
pub use store::{ArtifactInfo, CheckpointStore};
