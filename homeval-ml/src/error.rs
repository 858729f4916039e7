//! Error types for the homeval-ml crate.

use homeval_core::ConfigError;
use thiserror::Error;

/// Top-level error type for dataset, transform, training and stage operations.
#[derive(Debug, Error)]
pub enum MlError {
    /// A required upstream dataset or artifact does not exist.
    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    /// A table does not have the columns a fitted component expects.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0} used before fit")]
    NotFitted(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Processor error: {0}")]
    Processor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl MlError {
    pub fn missing_artifact(msg: impl Into<String>) -> Self {
        Self::MissingArtifact(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    pub fn not_fitted(component: impl Into<String>) -> Self {
        Self::NotFitted(component.into())
    }

    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn processor(msg: impl Into<String>) -> Self {
        Self::Processor(msg.into())
    }
}
