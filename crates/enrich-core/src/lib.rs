//! Enrich Core - Foundation crate for the contact enrichment pipeline.
//!
//! This crate provides shared types, error handling and configuration
//! management that the client, checkpoint and pipeline crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared newtypes (`Identifier`, `DatasetName`)
//!
//! # Example
//!
//! ```rust
//! use enrich_core::{AppConfig, Identifier};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.validate()?;
//! assert_eq!(config.bulk.max_batch_size, 500);
//!
//! let id = Identifier::new("https://www.linkedin.com/in/jane-doe")?;
//! assert!(id.as_str().starts_with("https://"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    ApiConfig, AppConfig, BulkConfig, CheckpointConfig, EnrichmentMode, PerIdentifierConfig,
    PipelineConfig,
};
pub use error::{ConfigError, ConfigResult, EnrichError, Result};
pub use types::{DatasetName, Identifier, STEP_SEPARATOR};
