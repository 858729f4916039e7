//! `model-gen` processor: trains the booster on pipeline-transformed
//! training features.

use crate::artifacts::{ArtifactId, ArtifactKind};
use crate::data::frame::DataFrame;
use crate::error::MlError;
use crate::features::pipeline::FeaturePipeline;
use crate::features::selector::ColumnSelector;
use crate::stages::cleaning::{TRAIN_FEATURES, TRAIN_TARGET};
use crate::stages::context::{StageContext, StageReport};
use crate::stages::registry::Processor;
use crate::training::gbdt::GbdtRegressor;
use crate::training::model::TrainedModel;
use chrono::Utc;
use homeval_core::StageParams;
use tracing::info;

pub const JOB: &str = "model-gen";
pub const NAME: &str = "train-model";

pub struct TrainModel;

impl Processor for TrainModel {
    fn job(&self) -> &str {
        JOB
    }

    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Fit the gradient-boosted regressor on the important columns"
    }

    fn run(&self, ctx: &StageContext, params: &StageParams) -> Result<StageReport, MlError> {
        let fraction = params.sampling_fraction()?;
        params.xgboost.validate()?;
        let mut report = StageReport::new(JOB, NAME);

        let features = ctx.datasets.load(TRAIN_FEATURES)?;
        let target = ctx.datasets.load(TRAIN_TARGET)?;
        let (pipeline, pipeline_id) = load_feature_pipeline(ctx)?;

        let features = ctx.maybe_sample(features, fraction);
        let (x, outliers) = pipeline.transform_training(&features)?;
        let y = target_values(&target, x.index())?;

        let selector = ColumnSelector::new(params.important_features.clone());
        let x = selector.apply(&x)?;
        let booster = GbdtRegressor::fit(&x, &y, &params.xgboost)?;
        info!(
            trees = booster.n_trees(),
            features = x.n_cols(),
            rows = x.n_rows(),
            loss = booster.history.final_loss().unwrap_or_default(),
            "Trained model"
        );

        let model = TrainedModel {
            selector,
            booster,
            feature_pipeline: pipeline_id,
            trained_at: Utc::now(),
        };
        let model_id = ctx
            .artifacts
            .save(&ctx.refs.model.name, ArtifactKind::Model, &model)?;

        report.artifacts.push(model_id);
        report.rows = x.n_rows();
        report.excluded_rows = outliers.rows_dropped;
        Ok(report)
    }
}

/// Load the feature pipeline and check it against the curated column list.
pub(crate) fn load_feature_pipeline(
    ctx: &StageContext,
) -> Result<(FeaturePipeline, ArtifactId), MlError> {
    let (pipeline, pipeline_id): (FeaturePipeline, _) = ctx
        .artifacts
        .load(&ctx.refs.column_transformer, ArtifactKind::FeaturePipeline)?;
    let (curated, curated_id): (Vec<String>, _) = ctx
        .artifacts
        .load(&ctx.refs.curated_columns, ArtifactKind::CuratedColumns)?;

    if pipeline.output_names()? != curated.as_slice() {
        return Err(MlError::schema(format!(
            "curated columns {curated_id} do not match the outputs of {pipeline_id}"
        )));
    }
    Ok((pipeline, pipeline_id))
}

/// Values of a single-column target table, aligned to `index`.
pub(crate) fn target_values(target: &DataFrame, index: &[usize]) -> Result<Vec<f64>, MlError> {
    let [name] = target.column_names() else {
        return Err(MlError::schema(format!(
            "target table must have exactly one column, found {}",
            target.n_cols()
        )));
    };
    target
        .reindex(index)?
        .numeric(name)?
        .iter()
        .map(|v| v.ok_or_else(|| MlError::training(format!("target '{name}' has missing values"))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::Column;
    use crate::stages::feature_engineering::TransformFeatures;
    use homeval_core::{ArtifactRef, HomevalConfig};
    use tempfile::TempDir;

    fn setup(dir: &TempDir) -> (StageContext, StageParams) {
        let mut config = HomevalConfig::housing_preset();
        config.params.important_features = vec!["median_income".into(), "ocean_proximity_INLAND".into()];
        config.params.xgboost.n_estimators = 10;
        let ctx = StageContext::from_config(&config, dir.path());

        let n = 40;
        let features = DataFrame::new(vec![
            (
                "ocean_proximity".into(),
                Column::Categorical(
                    (0..n)
                        .map(|i| Some(if i % 2 == 0 { "INLAND" } else { "NEAR BAY" }.to_string()))
                        .collect(),
                ),
            ),
            (
                "median_income".into(),
                Column::Numeric((0..n).map(|i| Some(i as f64 / 4.0)).collect()),
            ),
        ])
        .unwrap();
        let target = DataFrame::new(vec![(
            "median_house_value".into(),
            Column::Numeric((0..n).map(|i| Some(1000.0 * i as f64)).collect()),
        )])
        .unwrap();
        ctx.datasets.save(TRAIN_FEATURES, &features).unwrap();
        ctx.datasets.save(TRAIN_TARGET, &target).unwrap();
        (ctx, config.params)
    }

    #[test]
    fn test_trains_and_records_pipeline_id() {
        let dir = TempDir::new().unwrap();
        let (ctx, params) = setup(&dir);
        let fe = TransformFeatures.run(&ctx, &params).unwrap();

        let report = TrainModel.run(&ctx, &params).unwrap();
        assert_eq!(report.rows, 40);

        let (model, _): (TrainedModel, _) = ctx
            .artifacts
            .load(&ArtifactRef::latest("train_pipeline"), ArtifactKind::Model)
            .unwrap();
        assert_eq!(model.feature_pipeline, fe.artifacts[0]);
        assert_eq!(model.booster.n_trees(), 10);
        assert_eq!(
            model.booster.feature_names,
            vec!["median_income", "ocean_proximity_INLAND"]
        );
    }

    #[test]
    fn test_missing_pipeline_is_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let (ctx, params) = setup(&dir);
        assert!(matches!(
            TrainModel.run(&ctx, &params),
            Err(MlError::MissingArtifact(_))
        ));
    }

    #[test]
    fn test_unknown_important_column_fails() {
        let dir = TempDir::new().unwrap();
        let (ctx, mut params) = setup(&dir);
        TransformFeatures.run(&ctx, &params).unwrap();
        params.important_features.push("ocean_proximity_ISLAND".into());
        let err = TrainModel.run(&ctx, &params).unwrap_err();
        assert!(matches!(err, MlError::SchemaMismatch(_)));
    }

    #[test]
    fn test_curated_list_mismatch_detected() {
        let dir = TempDir::new().unwrap();
        let (ctx, params) = setup(&dir);
        TransformFeatures.run(&ctx, &params).unwrap();
        ctx.artifacts
            .save(
                "curated_columns",
                ArtifactKind::CuratedColumns,
                &vec!["median_income".to_string()],
            )
            .unwrap();
        assert!(matches!(
            TrainModel.run(&ctx, &params),
            Err(MlError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_target_values_realign_by_row_id() {
        let target = DataFrame::new(vec![(
            "y".into(),
            Column::Numeric(vec![Some(10.0), Some(20.0), Some(30.0)]),
        )])
        .unwrap();
        assert_eq!(target_values(&target, &[2, 0]).unwrap(), vec![30.0, 10.0]);

        let gappy = DataFrame::new(vec![("y".into(), Column::Numeric(vec![None]))]).unwrap();
        assert!(matches!(
            target_values(&gappy, &[0]),
            Err(MlError::Training(_))
        ));
    }
}
