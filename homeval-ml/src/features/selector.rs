//! Important-column filter applied before model fitting and scoring.

use crate::data::frame::DataFrame;
use crate::error::MlError;
use serde::{Deserialize, Serialize};

/// Keeps exactly the configured columns, in configured order.
///
/// An empty list is a passthrough. A configured column that is absent from
/// the input is an error rather than being skipped silently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSelector {
    columns: Vec<String>,
}

impl ColumnSelector {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_passthrough(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame, MlError> {
        if self.is_passthrough() {
            return Ok(df.clone());
        }
        df.select(&self.columns)
    }

    /// Names the selector would emit for a table with `available` columns.
    pub fn output_names(&self, available: &[String]) -> Result<Vec<String>, MlError> {
        if self.is_passthrough() {
            return Ok(available.to_vec());
        }
        let missing: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| !available.contains(c))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(MlError::schema(format!(
                "important columns not found: {}",
                missing.join(", ")
            )));
        }
        Ok(self.columns.clone())
    }
}
