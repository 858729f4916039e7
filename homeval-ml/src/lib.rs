//! # homeval-ml
//!
//! Housing-price workflow: tabular datasets with a versioned store, feature
//! transforms (stratified splitting, one-hot encoding, median imputation,
//! outlier treatment), a gradient-boosted regression tree model, and the
//! processors that chain them from raw data to scored predictions.

pub mod artifacts;
pub mod data;
pub mod error;
pub mod features;
pub mod stages;
pub mod training;

pub use artifacts::{ArtifactId, ArtifactKind, ArtifactStore, ManifestEntry};
pub use data::{Column, DataFrame, DatasetEntry, DatasetStore};
pub use error::MlError;
pub use features::{ColumnSelector, ColumnTransformer, FeaturePipeline, StratifiedShuffleSplit};
pub use stages::{
    Processor, ProcessorRegistry, StageContext, StageReport, Workflow, default_registry,
};
pub use training::{GbdtRegressor, RegressionMetrics, TrainedModel};
