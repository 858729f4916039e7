//! What every processor receives, and what it reports back.

use crate::artifacts::{ArtifactId, ArtifactStore};
use crate::data::frame::DataFrame;
use crate::data::storage::{DatasetEntry, DatasetStore};
use crate::error::MlError;
use crate::training::metrics::RegressionMetrics;
use homeval_core::{ArtifactRefs, HomevalConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

/// Shared, read-only environment of a stage run.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub random_seed: u64,
    pub datasets: DatasetStore,
    pub artifacts: ArtifactStore,
    pub refs: ArtifactRefs,
}

impl StageContext {
    pub fn new(
        random_seed: u64,
        datasets: DatasetStore,
        artifacts: ArtifactStore,
        refs: ArtifactRefs,
    ) -> Self {
        Self {
            random_seed,
            datasets,
            artifacts,
            refs,
        }
    }

    /// Stores rooted in `workspace` as laid out by `config`.
    pub fn from_config(config: &HomevalConfig, workspace: &Path) -> Self {
        Self::new(
            config.pipeline.random_seed,
            DatasetStore::new(config.pipeline.data_path(workspace)),
            ArtifactStore::new(config.pipeline.artifacts_path(workspace)),
            config.artifacts.clone(),
        )
    }

    /// Subsample `df` when a sampling fraction below 1 is configured.
    pub(crate) fn maybe_sample(&self, df: DataFrame, fraction: Option<f64>) -> DataFrame {
        match fraction {
            Some(f) if f < 1.0 => {
                let sampled = df.sample(f, self.random_seed);
                warn!(
                    fraction = f,
                    rows = sampled.n_rows(),
                    of = df.n_rows(),
                    "Sampling training rows"
                );
                sampled
            }
            _ => df,
        }
    }
}

/// A dataset version written by a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenDataset {
    pub name: String,
    pub version: u32,
    pub rows: usize,
}

impl From<&DatasetEntry> for WrittenDataset {
    fn from(entry: &DatasetEntry) -> Self {
        Self {
            name: entry.name.clone(),
            version: entry.version,
            rows: entry.row_count,
        }
    }
}

/// Outcome of one processor run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub run_id: Uuid,
    pub job: String,
    pub name: String,
    pub datasets: Vec<WrittenDataset>,
    pub artifacts: Vec<ArtifactId>,
    /// Rows in the stage's main output.
    pub rows: usize,
    /// Input rows left out of the output (missing keys, dropped outliers).
    pub excluded_rows: usize,
    pub elapsed_ms: u64,
    pub metrics: Option<RegressionMetrics>,
}

impl StageReport {
    pub fn new(job: &str, name: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job: job.to_string(),
            name: name.to_string(),
            datasets: Vec::new(),
            artifacts: Vec::new(),
            rows: 0,
            excluded_rows: 0,
            elapsed_ms: 0,
            metrics: None,
        }
    }

    /// Save `df` under `name` and record the written version.
    pub(crate) fn save_dataset(
        &mut self,
        ctx: &StageContext,
        name: &str,
        df: &DataFrame,
    ) -> Result<(), MlError> {
        let entry = ctx.datasets.save(name, df)?;
        self.datasets.push(WrittenDataset::from(&entry));
        Ok(())
    }
}
