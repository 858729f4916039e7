//! Outlier treatment for numeric feature columns.
//!
//! Bounds are fitted on training data only. Applying the handler either
//! clips values into the bounds or drops the rows that fall outside them.

use crate::data::frame::{Column, DataFrame};
use crate::data::schema::ColumnType;
use crate::error::MlError;
use homeval_core::{OutlierMethod, OutlierParams};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Inclusive valid range of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBounds {
    pub column: String,
    pub lower: f64,
    pub upper: f64,
}

impl ColumnBounds {
    fn contains(&self, v: f64) -> bool {
        v >= self.lower && v <= self.upper
    }
}

/// Effect of applying the handler to one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutlierSummary {
    pub rows_dropped: usize,
    pub values_clipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierHandler {
    method: OutlierMethod,
    std_multiplier: f64,
    bounds: Option<Vec<ColumnBounds>>,
}

impl OutlierHandler {
    pub fn new(method: OutlierMethod, std_multiplier: f64) -> Self {
        Self {
            method,
            std_multiplier,
            bounds: None,
        }
    }

    pub fn from_params(params: &OutlierParams) -> Self {
        Self::new(params.method, params.std_multiplier)
    }

    pub fn method(&self) -> OutlierMethod {
        self.method
    }

    pub fn bounds(&self) -> Result<&[ColumnBounds], MlError> {
        self.bounds
            .as_deref()
            .ok_or_else(|| MlError::not_fitted("OutlierHandler"))
    }

    /// Fit bounds for every numeric column of `df`.
    ///
    /// Bounds come from finite values only. A column with fewer than two
    /// finite values gets no bounds and is left untouched by `apply`.
    pub fn fit(&mut self, df: &DataFrame) -> Result<(), MlError> {
        let mut bounds = Vec::new();
        for name in df.names_of(ColumnType::Numeric) {
            let values: Vec<f64> = df
                .numeric(&name)?
                .iter()
                .flatten()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            let fitted = match self.method {
                OutlierMethod::Mean => mean_bounds(&values, self.std_multiplier),
                OutlierMethod::Percentile => iqr_bounds(&values),
            };
            match fitted {
                Some((lower, upper)) if lower.is_finite() && upper.is_finite() => {
                    bounds.push(ColumnBounds {
                        column: name,
                        lower: lower.min(upper),
                        upper: lower.max(upper),
                    })
                }
                _ => debug!(column = %name, "No finite outlier bounds, column left as is"),
            }
        }
        self.bounds = Some(bounds);
        Ok(())
    }

    /// Clip (`drop = false`) or drop (`drop = true`) out-of-bounds values.
    /// Missing values are left alone.
    pub fn apply(&self, df: &DataFrame, drop: bool) -> Result<(DataFrame, OutlierSummary), MlError> {
        let bounds = self.bounds()?;
        let mut summary = OutlierSummary::default();

        if drop {
            let mut keep = vec![true; df.n_rows()];
            for b in bounds {
                for (row, v) in df.numeric(&b.column)?.iter().enumerate() {
                    if v.is_some_and(|v| !b.contains(v)) {
                        keep[row] = false;
                    }
                }
            }
            summary.rows_dropped = keep.iter().filter(|k| !**k).count();
            return Ok((df.filter_rows(&keep), summary));
        }

        let mut out = df.clone();
        for b in bounds {
            let clipped: Vec<Option<f64>> = df
                .numeric(&b.column)?
                .iter()
                .map(|v| {
                    v.map(|v| {
                        if b.contains(v) {
                            v
                        } else {
                            summary.values_clipped += 1;
                            v.clamp(b.lower, b.upper)
                        }
                    })
                })
                .collect();
            out.replace_column(&b.column, Column::Numeric(clipped))?;
        }
        Ok((out, summary))
    }
}

fn mean_bounds(values: &[f64], k: f64) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let spread = k * var.sqrt();
    Some((mean - spread, mean + spread))
}

fn iqr_bounds(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    Some((q1 - 1.5 * iqr, q3 + 1.5 * iqr))
}

/// Linear-interpolation quantile of sorted data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = (sorted.len() - 1) as f64 * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
