//! Column-wise encoding of a mixed table into a purely numeric one.
//!
//! Categorical columns are one-hot encoded, numeric columns get their
//! fit-time median substituted for missing values. Output columns are all
//! categorical blocks (in input order) followed by the numeric columns.

use crate::data::frame::{Column, DataFrame};
use crate::data::schema::ColumnType;
use crate::error::MlError;
use homeval_core::UnknownCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Category label as it appears in output column names.
///
/// Leading `<` is dropped so `<1H OCEAN` becomes `1H OCEAN`.
pub fn normalize_label(label: &str) -> String {
    label.trim_start_matches('<').to_string()
}

/// One-hot encoder for a single categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub column: String,
    /// Sorted categories seen at fit time.
    pub categories: Vec<String>,
    pub handle_unknown: UnknownCategory,
}

impl OneHotEncoder {
    pub fn fit(
        column: &str,
        values: &[Option<String>],
        handle_unknown: UnknownCategory,
    ) -> Result<Self, MlError> {
        let categories: Vec<String> = values
            .iter()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let labels: BTreeSet<String> = categories.iter().map(|c| normalize_label(c)).collect();
        if labels.len() != categories.len() {
            return Err(MlError::dataset(format!(
                "categories of '{column}' collide after label normalisation"
            )));
        }

        Ok(Self {
            column: column.to_string(),
            categories,
            handle_unknown,
        })
    }

    pub fn output_names(&self) -> Vec<String> {
        self.categories
            .iter()
            .map(|c| format!("{}_{}", self.column, normalize_label(c)))
            .collect()
    }

    /// One output vector per category. Missing values encode as all zeros.
    pub fn transform(&self, values: &[Option<String>]) -> Result<Vec<Vec<f64>>, MlError> {
        let mut out = vec![vec![0.0; values.len()]; self.categories.len()];
        for (row, value) in values.iter().enumerate() {
            let Some(value) = value else { continue };
            match self.categories.binary_search(value) {
                Ok(k) => out[k][row] = 1.0,
                Err(_) if self.handle_unknown == UnknownCategory::Ignore => {}
                Err(_) => {
                    return Err(MlError::schema(format!(
                        "unknown category '{}' in column '{}'",
                        value, self.column
                    )));
                }
            }
        }
        Ok(out)
    }
}

/// Median imputer for a single numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianImputer {
    pub column: String,
    pub median: f64,
}

impl MedianImputer {
    pub fn fit(column: &str, values: &[Option<f64>]) -> Result<Self, MlError> {
        let median = median(values).ok_or_else(|| {
            MlError::dataset(format!(
                "column '{column}' has no observed values to compute a median"
            ))
        })?;
        Ok(Self {
            column: column.to_string(),
            median,
        })
    }

    pub fn transform(&self, values: &[Option<f64>]) -> Vec<f64> {
        values.iter().map(|v| v.unwrap_or(self.median)).collect()
    }
}

/// Median of the present values; the mean of the two middle values for an
/// even count.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(f64::total_cmp);
    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedColumns {
    encoders: Vec<OneHotEncoder>,
    imputers: Vec<MedianImputer>,
    output_names: Vec<String>,
}

/// Fits once on training features; later stages only call [`transform`].
///
/// [`transform`]: ColumnTransformer::transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTransformer {
    categorical: Vec<String>,
    numeric: Vec<String>,
    handle_unknown: UnknownCategory,
    fitted: Option<FittedColumns>,
}

impl ColumnTransformer {
    pub fn new(
        categorical: Vec<String>,
        numeric: Vec<String>,
        handle_unknown: UnknownCategory,
    ) -> Self {
        Self {
            categorical,
            numeric,
            handle_unknown,
            fitted: None,
        }
    }

    /// Route every column of `df` by its dtype.
    pub fn for_frame(df: &DataFrame, handle_unknown: UnknownCategory) -> Self {
        Self::new(
            df.names_of(ColumnType::Categorical),
            df.names_of(ColumnType::Numeric),
            handle_unknown,
        )
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical
    }

    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Output column names, i.e. the curated column list.
    pub fn output_names(&self) -> Result<&[String], MlError> {
        self.fitted
            .as_ref()
            .map(|f| f.output_names.as_slice())
            .ok_or_else(|| MlError::not_fitted("ColumnTransformer"))
    }

    pub fn fit(&mut self, df: &DataFrame) -> Result<(), MlError> {
        let encoders = self
            .categorical
            .iter()
            .map(|name| OneHotEncoder::fit(name, categorical(df, name)?, self.handle_unknown))
            .collect::<Result<Vec<_>, _>>()?;
        let imputers = self
            .numeric
            .iter()
            .map(|name| MedianImputer::fit(name, df.numeric(name)?))
            .collect::<Result<Vec<_>, _>>()?;

        let output_names: Vec<String> = encoders
            .iter()
            .flat_map(OneHotEncoder::output_names)
            .chain(imputers.iter().map(|i| i.column.clone()))
            .collect();
        let unique: BTreeSet<&String> = output_names.iter().collect();
        if unique.len() != output_names.len() {
            return Err(MlError::dataset(
                "encoded column names are not unique; rename input columns",
            ));
        }

        tracing::debug!(
            categorical = encoders.len(),
            numeric = imputers.len(),
            outputs = output_names.len(),
            "Fitted column transformer"
        );
        self.fitted = Some(FittedColumns {
            encoders,
            imputers,
            output_names,
        });
        Ok(())
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame, MlError> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| MlError::not_fitted("ColumnTransformer"))?;

        let mut columns = Vec::with_capacity(fitted.output_names.len());
        let mut names = fitted.output_names.iter();
        for encoder in &fitted.encoders {
            for values in encoder.transform(categorical(df, &encoder.column)?)? {
                columns.push(numeric_output(names.next(), values)?);
            }
        }
        for imputer in &fitted.imputers {
            let values = imputer.transform(df.numeric(&imputer.column)?);
            columns.push(numeric_output(names.next(), values)?);
        }

        DataFrame::with_index(df.index().to_vec(), columns)
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame, MlError> {
        self.fit(df)?;
        self.transform(df)
    }
}

fn categorical<'a>(df: &'a DataFrame, name: &str) -> Result<&'a [Option<String>], MlError> {
    df.require(name)?
        .as_categorical()
        .ok_or_else(|| MlError::schema(format!("column '{name}' is not categorical")))
}

fn numeric_output(name: Option<&String>, values: Vec<f64>) -> Result<(String, Column), MlError> {
    let name = name.ok_or_else(|| MlError::schema("encoder produced more columns than names"))?;
    Ok((
        name.clone(),
        Column::Numeric(values.into_iter().map(Some).collect()),
    ))
}
