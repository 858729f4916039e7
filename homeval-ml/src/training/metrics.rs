//! Training history and regression metrics.

use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// Per-round training loss of a boosting run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub rounds_completed: usize,
    pub loss_history: Vec<f64>,
    pub best_round: Option<usize>,
    pub best_loss: Option<f64>,
}

impl TrainingHistory {
    pub fn record_round(&mut self, loss: f64) {
        self.loss_history.push(loss);
        self.rounds_completed += 1;
        if self.best_loss.is_none_or(|best| loss < best) {
            self.best_loss = Some(loss);
            self.best_round = Some(self.rounds_completed);
        }
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.loss_history.last().copied()
    }
}

/// Regression metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r_squared: f64,
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compare predictions with observed values of equal length.
    ///
    /// `r_squared` is 0 when the observed values have no variance.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Result<Self, MlError> {
        if actual.len() != predicted.len() {
            return Err(MlError::dataset(format!(
                "{} observations for {} predictions",
                actual.len(),
                predicted.len()
            )));
        }
        if actual.is_empty() {
            return Err(MlError::dataset("cannot compute metrics on zero rows"));
        }

        let n = actual.len() as f64;
        let mean = actual.iter().sum::<f64>() / n;
        let (mut sse, mut sae, mut sst) = (0.0, 0.0, 0.0);
        for (a, p) in actual.iter().zip(predicted) {
            let err = a - p;
            sse += err * err;
            sae += err.abs();
            sst += (a - mean).powi(2);
        }

        let mse = sse / n;
        Ok(Self {
            mse,
            rmse: mse.sqrt(),
            mae: sae / n,
            r_squared: if sst > 0.0 { 1.0 - sse / sst } else { 0.0 },
            n_samples: actual.len(),
        })
    }
}

/// Mean squared error; 0 for empty input.
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}
