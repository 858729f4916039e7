//! Schema definition and type inference for datasets.

use serde::{Deserialize, Serialize};

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Numeric,
    Categorical,
}

/// Schema definition for a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub columns: Vec<ColumnSchema>,
}

impl SchemaDefinition {
    pub fn dtype_of(&self, name: &str) -> Option<ColumnType> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.dtype)
    }
}

/// Schema for a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: ColumnType,
    pub nullable: bool,
}

/// Infer a column type from raw cell text. `None` cells are missing.
///
/// A column is numeric when every present cell parses as a float; a column
/// with no present cells is numeric as well.
pub fn infer_column_type(values: &[Option<&str>]) -> ColumnType {
    let all_numeric = values
        .iter()
        .flatten()
        .all(|v| v.trim().parse::<f64>().is_ok());
    if all_numeric {
        ColumnType::Numeric
    } else {
        ColumnType::Categorical
    }
}

/// Infer a schema from a header and raw rows.
pub fn infer_schema(columns: &[String], rows: &[Vec<Option<String>>]) -> SchemaDefinition {
    let columns = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let values: Vec<Option<&str>> = rows
                .iter()
                .map(|row| row.get(i).and_then(|c| c.as_deref()))
                .collect();
            ColumnSchema {
                name: name.clone(),
                dtype: infer_column_type(&values),
                nullable: values.iter().any(|v| v.is_none()),
            }
        })
        .collect();

    SchemaDefinition { columns }
}
