//! `feat-engg` processor: fits outlier treatment and the column transformer
//! on training features.

use crate::artifacts::ArtifactKind;
use crate::error::MlError;
use crate::features::pipeline::FeaturePipeline;
use crate::stages::cleaning::TRAIN_FEATURES;
use crate::stages::context::{StageContext, StageReport};
use crate::stages::registry::Processor;
use homeval_core::StageParams;
use tracing::{info, warn};

pub const JOB: &str = "feat-engg";
pub const NAME: &str = "transform-features";

pub struct TransformFeatures;

impl Processor for TransformFeatures {
    fn job(&self) -> &str {
        JOB
    }

    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Fit outlier bounds, one-hot encoding and median imputation"
    }

    fn run(&self, ctx: &StageContext, params: &StageParams) -> Result<StageReport, MlError> {
        let fraction = params.sampling_fraction()?;
        let mut report = StageReport::new(JOB, NAME);

        let features = ctx.datasets.load(TRAIN_FEATURES)?;
        let features = ctx.maybe_sample(features, fraction);

        let (pipeline, transformed, outliers) =
            FeaturePipeline::fit(&features, &params.outliers, params.handle_unknown)?;
        if outliers.rows_dropped > 0 {
            warn!(
                rows = outliers.rows_dropped,
                method = %params.outliers.method,
                "Dropped training rows with outliers"
            );
        }
        info!(
            method = %params.outliers.method,
            clipped = outliers.values_clipped,
            outputs = transformed.n_cols(),
            "Fitted feature pipeline"
        );

        let pipeline_id = ctx.artifacts.save(
            &ctx.refs.column_transformer.name,
            ArtifactKind::FeaturePipeline,
            &pipeline,
        )?;
        let curated_id = ctx.artifacts.save(
            &ctx.refs.curated_columns.name,
            ArtifactKind::CuratedColumns,
            &pipeline.output_names()?,
        )?;

        report.artifacts = vec![pipeline_id, curated_id];
        report.rows = transformed.n_rows();
        report.excluded_rows = outliers.rows_dropped;
        Ok(report)
    }
}
