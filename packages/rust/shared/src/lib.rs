//! Shared types, error model, and configuration for mdigest.
//!
//! This crate is the foundation depended on by all other mdigest crates.
//! It provides:
//! - [`DigestError`], the unified error type
//! - Domain types ([`SourceItem`], [`FetchOutcome`], [`TaskId`], [`ProgressEvent`])
//! - Configuration ([`AppConfig`], [`DispatchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DispatchConfig, GenerationConfig, ProcessingConfig, ProgressConfig, RenderConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_generation,
};
pub use error::{DigestError, Result};
pub use types::{FetchOutcome, FetchStatus, ProgressEvent, SourceItem, TaskId};
