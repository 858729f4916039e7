//! The trained-model artifact: important-columns filter plus booster, tied
//! to the feature pipeline version it was trained against.

use crate::artifacts::ArtifactId;
use crate::data::frame::DataFrame;
use crate::error::MlError;
use crate::features::selector::ColumnSelector;
use crate::training::gbdt::GbdtRegressor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub selector: ColumnSelector,
    pub booster: GbdtRegressor,
    /// Feature pipeline artifact the training features came from.
    pub feature_pipeline: ArtifactId,
    pub trained_at: DateTime<Utc>,
}

impl TrainedModel {
    /// Filter then predict. `x` is the output of the feature pipeline.
    pub fn predict(&self, x: &DataFrame) -> Result<Vec<f64>, MlError> {
        let selected = self.selector.apply(x)?;
        self.booster.predict(&selected)
    }

    /// Fail unless this model was trained against `pipeline`.
    pub fn check_pipeline(&self, pipeline: &ArtifactId) -> Result<(), MlError> {
        if &self.feature_pipeline != pipeline {
            return Err(MlError::schema(format!(
                "model was trained against {} (hash {}), but {} (hash {}) was loaded",
                self.feature_pipeline, self.feature_pipeline.hash, pipeline, pipeline.hash
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::Column;
    use homeval_core::BoosterParams;

    fn id(version: u32) -> ArtifactId {
        ArtifactId {
            name: "features".into(),
            version,
            hash: format!("hash{version}"),
        }
    }

    fn model() -> TrainedModel {
        let x = DataFrame::new(vec![
            ("a".into(), Column::Numeric((0..10).map(|i| Some(i as f64)).collect())),
            ("b".into(), Column::Numeric(vec![Some(0.0); 10])),
        ])
        .unwrap();
        let selector = ColumnSelector::new(vec!["a".into()]);
        let y: Vec<f64> = (0..10).map(|i| i as f64 * 2.0).collect();
        let booster = GbdtRegressor::fit(
            &selector.apply(&x).unwrap(),
            &y,
            &BoosterParams {
                n_estimators: 5,
                ..BoosterParams::default()
            },
        )
        .unwrap();
        TrainedModel {
            selector,
            booster,
            feature_pipeline: id(1),
            trained_at: Utc::now(),
        }
    }

    #[test]
    fn test_predict_applies_selector() {
        let m = model();
        let x = DataFrame::new(vec![
            ("b".into(), Column::Numeric(vec![Some(9.0)])),
            ("a".into(), Column::Numeric(vec![Some(3.0)])),
        ])
        .unwrap();
        assert_eq!(m.predict(&x).unwrap().len(), 1);

        let missing = DataFrame::new(vec![("b".into(), Column::Numeric(vec![Some(9.0)]))]).unwrap();
        assert!(matches!(m.predict(&missing), Err(MlError::SchemaMismatch(_))));
    }

    #[test]
    fn test_check_pipeline() {
        let m = model();
        assert!(m.check_pipeline(&id(1)).is_ok());
        assert!(matches!(
            m.check_pipeline(&id(2)),
            Err(MlError::SchemaMismatch(_))
        ));
    }
}
