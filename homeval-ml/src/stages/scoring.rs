//! `model-eval` processor: scores held-out features with the trained model.
//!
//! The output is the curated feature table with a `yhat` column appended.

use crate::artifacts::ArtifactKind;
use crate::data::frame::{Column, DataFrame};
use crate::error::MlError;
use crate::stages::cleaning::{TEST_FEATURES, TEST_TARGET};
use crate::stages::context::{StageContext, StageReport};
use crate::stages::registry::Processor;
use crate::stages::training::load_feature_pipeline;
use crate::training::metrics::RegressionMetrics;
use crate::training::model::TrainedModel;
use homeval_core::StageParams;
use std::collections::HashMap;
use tracing::{info, warn};

pub const JOB: &str = "model-eval";
pub const NAME: &str = "score-model";

pub const SCORE_OUTPUT: &str = "score/housing/output";
pub const PREDICTION_COLUMN: &str = "yhat";

pub struct ScoreModel;

impl Processor for ScoreModel {
    fn job(&self) -> &str {
        JOB
    }

    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Predict on held-out features and evaluate against held-out targets"
    }

    fn run(&self, ctx: &StageContext, _params: &StageParams) -> Result<StageReport, MlError> {
        let mut report = StageReport::new(JOB, NAME);

        let features = ctx.datasets.load(TEST_FEATURES)?;
        let (pipeline, pipeline_id) = load_feature_pipeline(ctx)?;
        let (model, _): (TrainedModel, _) =
            ctx.artifacts.load(&ctx.refs.model, ArtifactKind::Model)?;
        model.check_pipeline(&pipeline_id)?;

        let x = pipeline.transform_scoring(&features)?;
        let yhat = model.predict(&x)?;
        let mut output = x;
        output.push_column(
            PREDICTION_COLUMN,
            Column::Numeric(yhat.into_iter().map(Some).collect()),
        )?;
        report.save_dataset(ctx, SCORE_OUTPUT, &output)?;
        report.rows = output.n_rows();

        if ctx.datasets.exists(TEST_TARGET)? {
            let target = ctx.datasets.load(TEST_TARGET)?;
            match evaluate(&target, &output)? {
                Some(metrics) => {
                    info!(
                        rmse = metrics.rmse,
                        mae = metrics.mae,
                        r_squared = metrics.r_squared,
                        n = metrics.n_samples,
                        "Scored model"
                    );
                    let id = ctx.artifacts.save(
                        &ctx.refs.score_metrics.name,
                        ArtifactKind::Metrics,
                        &metrics,
                    )?;
                    report.artifacts.push(id);
                    report.metrics = Some(metrics);
                }
                None => warn!(
                    dataset = TEST_TARGET,
                    "No scored row has a held-out target, skipping metrics"
                ),
            }
        } else {
            info!(dataset = TEST_TARGET, "No held-out target, skipping metrics");
        }
        Ok(report)
    }
}

/// Metrics over the scored rows that have an observed target. `None` when
/// no row qualifies.
fn evaluate(
    target: &DataFrame,
    output: &DataFrame,
) -> Result<Option<RegressionMetrics>, MlError> {
    let [name] = target.column_names() else {
        return Err(MlError::schema("target table must have exactly one column"));
    };
    let observed: HashMap<usize, f64> = target
        .index()
        .iter()
        .zip(target.numeric(name)?)
        .filter_map(|(&id, v)| v.map(|v| (id, v)))
        .collect();

    let (actual, predicted): (Vec<f64>, Vec<f64>) = output
        .index()
        .iter()
        .zip(output.numeric(PREDICTION_COLUMN)?)
        .filter_map(|(id, p)| Some((*observed.get(id)?, (*p)?)))
        .unzip();
    if actual.is_empty() {
        return Ok(None);
    }
    RegressionMetrics::compute(&actual, &predicted).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_skips_missing_targets() {
        let target = DataFrame::new(vec![(
            "median_house_value".into(),
            Column::Numeric(vec![Some(1.0), None, Some(3.0)]),
        )])
        .unwrap();
        let output = DataFrame::with_index(
            vec![2, 1, 0],
            vec![(
                "yhat".into(),
                Column::Numeric(vec![Some(3.0), Some(9.0), Some(2.0)]),
            )],
        )
        .unwrap();
        let m = evaluate(&target, &output).unwrap().unwrap();
        assert_eq!(m.n_samples, 2);
        assert_eq!(m.mae, 0.5);
    }

    #[test]
    fn test_evaluate_without_overlap() {
        let target = DataFrame::with_index(
            vec![10],
            vec![("y".into(), Column::Numeric(vec![Some(1.0)]))],
        )
        .unwrap();
        let output = DataFrame::new(vec![("yhat".into(), Column::Numeric(vec![Some(1.0)]))]).unwrap();
        assert_eq!(evaluate(&target, &output).unwrap(), None);
    }
}
