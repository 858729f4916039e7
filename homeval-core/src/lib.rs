//! # homeval-core
//!
//! Shared foundation for the homeval workflow: layered configuration,
//! configuration errors, and atomic persistence helpers used by the dataset
//! and artifact stores.

pub mod config;
pub mod error;
pub mod persistence;

// Re-export commonly used types at the crate root.
pub use config::{
    ArtifactRef, ArtifactRefs, BoosterParams, HomevalConfig, OutlierMethod, OutlierParams,
    PipelineSettings, StageParams, UnknownCategory, config_exists, load_config,
};
pub use error::ConfigError;
