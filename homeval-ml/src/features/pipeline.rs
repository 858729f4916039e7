//! The fitted feature pipeline: outlier treatment followed by the column
//! transformer. Persisted as one artifact so training and scoring apply the
//! exact transformation that was fitted.

use crate::data::frame::DataFrame;
use crate::error::MlError;
use crate::features::encoding::ColumnTransformer;
use crate::features::outliers::{OutlierHandler, OutlierSummary};
use homeval_core::{OutlierParams, UnknownCategory};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    pub outliers: OutlierHandler,
    pub drop_outliers: bool,
    pub columns: ColumnTransformer,
}

impl FeaturePipeline {
    /// Fit on training features. Returns the pipeline together with the
    /// transformed training table.
    pub fn fit(
        features: &DataFrame,
        outliers: &OutlierParams,
        handle_unknown: UnknownCategory,
    ) -> Result<(Self, DataFrame, OutlierSummary), MlError> {
        let mut handler = OutlierHandler::from_params(outliers);
        handler.fit(features)?;
        let (treated, summary) = handler.apply(features, outliers.drop)?;
        if treated.n_rows() == 0 {
            return Err(MlError::dataset("outlier treatment removed every training row"));
        }

        let mut columns = ColumnTransformer::for_frame(&treated, handle_unknown);
        let transformed = columns.fit_transform(&treated)?;

        let pipeline = Self {
            outliers: handler,
            drop_outliers: outliers.drop,
            columns,
        };
        Ok((pipeline, transformed, summary))
    }

    pub fn output_names(&self) -> Result<&[String], MlError> {
        self.columns.output_names()
    }

    /// Transform training rows: the fitted outlier treatment (drop or clip)
    /// is re-applied, then the column transformer. Nothing is refitted.
    pub fn transform_training(
        &self,
        features: &DataFrame,
    ) -> Result<(DataFrame, OutlierSummary), MlError> {
        let (treated, summary) = self.outliers.apply(features, self.drop_outliers)?;
        Ok((self.columns.transform(&treated)?, summary))
    }

    /// Transform held-out rows. Outliers are clipped, never dropped.
    pub fn transform_scoring(&self, features: &DataFrame) -> Result<DataFrame, MlError> {
        let (treated, _) = self.outliers.apply(features, false)?;
        self.columns.transform(&treated)
    }
}
