//! In-memory tabular data: named, typed columns plus a stable row index.
//!
//! The row index is the original row id of each record. It survives row
//! selection, so a feature table and its target table can always be realigned
//! after sampling or outlier removal.

use crate::data::schema::{ColumnSchema, ColumnType, SchemaDefinition};
use crate::error::MlError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use std::collections::{HashMap, HashSet};

/// A single typed column. `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> ColumnType {
        match self {
            Column::Numeric(_) => ColumnType::Numeric,
            Column::Categorical(_) => ColumnType::Categorical,
        }
    }

    pub fn null_count(&self) -> usize {
        match self {
            Column::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            Column::Categorical(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match self {
            Column::Numeric(v) => Some(v),
            Column::Categorical(_) => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&[Option<String>]> {
        match self {
            Column::Categorical(v) => Some(v),
            Column::Numeric(_) => None,
        }
    }

    fn take(&self, positions: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(positions.iter().map(|&i| v[i]).collect()),
            Column::Categorical(v) => {
                Column::Categorical(positions.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// A table of equally long named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    index: Vec<usize>,
    names: Vec<String>,
    columns: Vec<Column>,
}

impl DataFrame {
    /// Build a table whose index is `0..n_rows`.
    pub fn new(columns: Vec<(String, Column)>) -> Result<Self, MlError> {
        let n_rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);
        Self::with_index((0..n_rows).collect(), columns)
    }

    pub fn with_index(index: Vec<usize>, columns: Vec<(String, Column)>) -> Result<Self, MlError> {
        let mut seen = HashSet::new();
        for (name, column) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(MlError::dataset(format!("duplicate column '{name}'")));
            }
            if column.len() != index.len() {
                return Err(MlError::dataset(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    column.len(),
                    index.len()
                )));
            }
        }
        let (names, columns) = columns.into_iter().unzip();
        Ok(Self {
            index,
            names,
            columns,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    /// Like [`column`](Self::column) but a missing column is a schema mismatch.
    pub fn require(&self, name: &str) -> Result<&Column, MlError> {
        self.column(name)
            .ok_or_else(|| MlError::schema(format!("column '{name}' not found")))
    }

    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>], MlError> {
        self.require(name)?
            .as_numeric()
            .ok_or_else(|| MlError::schema(format!("column '{name}' is not numeric")))
    }

    pub fn names_of(&self, dtype: ColumnType) -> Vec<String> {
        self.columns()
            .filter(|(_, c)| c.dtype() == dtype)
            .map(|(n, _)| n.to_string())
            .collect()
    }

    pub fn schema(&self) -> SchemaDefinition {
        SchemaDefinition {
            columns: self
                .columns()
                .map(|(name, c)| ColumnSchema {
                    name: name.to_string(),
                    dtype: c.dtype(),
                    nullable: c.null_count() > 0,
                })
                .collect(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<(), MlError> {
        let name = name.into();
        if self.position(&name).is_some() {
            return Err(MlError::dataset(format!("duplicate column '{name}'")));
        }
        if column.len() != self.n_rows() {
            return Err(MlError::dataset(format!(
                "column '{}' has {} rows, expected {}",
                name,
                column.len(),
                self.n_rows()
            )));
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Swap the values of an existing column, keeping its position.
    pub fn replace_column(&mut self, name: &str, column: Column) -> Result<(), MlError> {
        let i = self
            .position(name)
            .ok_or_else(|| MlError::schema(format!("column '{name}' not found")))?;
        if column.len() != self.n_rows() {
            return Err(MlError::dataset(format!(
                "replacement for '{name}' has {} rows, expected {}",
                column.len(),
                self.n_rows()
            )));
        }
        self.columns[i] = column;
        Ok(())
    }

    /// Project onto `names`, in that order. Every name must exist.
    pub fn select(&self, names: &[String]) -> Result<DataFrame, MlError> {
        let missing: Vec<&str> = names
            .iter()
            .filter(|n| self.position(n).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(MlError::schema(format!(
                "columns not found: {}",
                missing.join(", ")
            )));
        }
        let columns = names
            .iter()
            .filter_map(|n| self.position(n).map(|i| (n.clone(), self.columns[i].clone())))
            .collect();
        DataFrame::with_index(self.index.clone(), columns)
    }

    pub fn drop_columns(&self, names: &[&str]) -> DataFrame {
        let (names, columns) = self
            .columns()
            .filter(|(n, _)| !names.contains(n))
            .map(|(n, c)| (n.to_string(), c.clone()))
            .unzip();
        DataFrame {
            index: self.index.clone(),
            names,
            columns,
        }
    }

    /// Rows at the given positions (not row ids), in the given order.
    pub fn take(&self, positions: &[usize]) -> DataFrame {
        DataFrame {
            index: positions.iter().map(|&i| self.index[i]).collect(),
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(positions)).collect(),
        }
    }

    pub fn filter_rows(&self, keep: &[bool]) -> DataFrame {
        let positions: Vec<usize> = keep
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();
        self.take(&positions)
    }

    /// Rows looked up by row id, in the order of `row_ids`.
    pub fn reindex(&self, row_ids: &[usize]) -> Result<DataFrame, MlError> {
        let lookup: HashMap<usize, usize> = self
            .index
            .iter()
            .enumerate()
            .map(|(pos, &id)| (id, pos))
            .collect();
        let positions = row_ids
            .iter()
            .map(|id| {
                lookup
                    .get(id)
                    .copied()
                    .ok_or_else(|| MlError::schema(format!("row id {id} not present")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.take(&positions))
    }

    /// Rename every column through `f`. Fails if two names collide.
    pub fn rename_columns(&mut self, f: impl Fn(&str) -> String) -> Result<(), MlError> {
        let renamed: Vec<String> = self.names.iter().map(|n| f(n)).collect();
        let mut seen = HashSet::new();
        for name in &renamed {
            if !seen.insert(name.as_str()) {
                return Err(MlError::dataset(format!(
                    "renaming produces duplicate column '{name}'"
                )));
            }
        }
        self.names = renamed;
        Ok(())
    }

    /// Split into (features, target) sharing the same row index.
    pub fn split_target(&self, target: &str) -> Result<(DataFrame, DataFrame), MlError> {
        let target_col = self.require(target)?.clone();
        let features = self.drop_columns(&[target]);
        let target = DataFrame::with_index(
            self.index.clone(),
            vec![(target.to_string(), target_col)],
        )?;
        Ok((features, target))
    }

    /// Random subsample of `round(fraction * n_rows)` rows without
    /// replacement, kept in their original order.
    pub fn sample(&self, fraction: f64, seed: u64) -> DataFrame {
        let n = self.n_rows();
        let amount = ((n as f64) * fraction).round() as usize;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut positions = sample(&mut rng, n, amount.min(n)).into_vec();
        positions.sort_unstable();
        self.take(&positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_frame() -> DataFrame {
        DataFrame::new(vec![
            (
                "median_income".into(),
                Column::Numeric(vec![Some(1.0), Some(2.5), None, Some(8.0)]),
            ),
            (
                "ocean_proximity".into(),
                Column::Categorical(vec![
                    Some("INLAND".into()),
                    Some("NEAR BAY".into()),
                    None,
                    Some("INLAND".into()),
                ]),
            ),
            (
                "median_house_value".into(),
                Column::Numeric(vec![Some(100.0), Some(200.0), Some(300.0), Some(400.0)]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_ragged_columns() {
        let err = DataFrame::new(vec![
            ("a".into(), Column::Numeric(vec![Some(1.0)])),
            ("b".into(), Column::Numeric(vec![Some(1.0), Some(2.0)])),
        ])
        .unwrap_err();
        assert!(matches!(err, MlError::Dataset(_)));
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let err = DataFrame::new(vec![
            ("a".into(), Column::Numeric(vec![Some(1.0)])),
            ("a".into(), Column::Numeric(vec![Some(2.0)])),
        ])
        .unwrap_err();
        assert!(matches!(err, MlError::Dataset(_)));
    }

    #[test]
    fn test_select_orders_columns() {
        let df = sample_frame();
        let out = df
            .select(&["ocean_proximity".into(), "median_income".into()])
            .unwrap();
        assert_eq!(out.column_names(), &["ocean_proximity", "median_income"]);
    }

    #[test]
    fn test_select_missing_is_schema_mismatch() {
        let df = sample_frame();
        let err = df.select(&["nope".into()]).unwrap_err();
        assert!(matches!(err, MlError::SchemaMismatch(_)));
    }

    #[test]
    fn test_split_target_keeps_index() {
        let df = sample_frame().take(&[3, 1]);
        let (x, y) = df.split_target("median_house_value").unwrap();
        assert_eq!(x.column_names(), &["median_income", "ocean_proximity"]);
        assert_eq!(y.column_names(), &["median_house_value"]);
        assert_eq!(x.index(), &[3, 1]);
        assert_eq!(y.index(), &[3, 1]);
        assert_eq!(
            y.numeric("median_house_value").unwrap(),
            &[Some(400.0), Some(200.0)]
        );
    }

    #[test]
    fn test_reindex_by_row_id() {
        let df = sample_frame();
        let out = df.reindex(&[2, 0]).unwrap();
        assert_eq!(out.index(), &[2, 0]);
        assert_eq!(out.numeric("median_income").unwrap(), &[None, Some(1.0)]);
        assert!(df.reindex(&[99]).is_err());
    }

    #[test]
    fn test_filter_rows() {
        let df = sample_frame();
        let out = df.filter_rows(&[true, false, false, true]);
        assert_eq!(out.index(), &[0, 3]);
    }

    #[test]
    fn test_sample_is_seeded() {
        let df = DataFrame::new(vec![(
            "x".into(),
            Column::Numeric((0..100).map(|i| Some(i as f64)).collect()),
        )])
        .unwrap();
        let a = df.sample(0.25, 7);
        let b = df.sample(0.25, 7);
        assert_eq!(a.n_rows(), 25);
        assert_eq!(a, b);
        assert!(a.index().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_rename_collision() {
        let mut df = sample_frame();
        assert!(df.rename_columns(|_| "same".to_string()).is_err());
        df.rename_columns(|n| n.to_uppercase()).unwrap();
        assert_eq!(df.column_names()[0], "MEDIAN_INCOME");
    }

    #[test]
    fn test_schema_reports_nullability() {
        let schema = sample_frame().schema();
        assert!(schema.columns[0].nullable);
        assert!(!schema.columns[2].nullable);
        assert_eq!(schema.columns[1].dtype, ColumnType::Categorical);
    }
}
