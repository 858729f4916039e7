//! Raw-table cleaning: blank strings become missing values and column names
//! are normalised to snake_case.

use crate::data::frame::{Column, DataFrame};
use crate::error::MlError;

/// What a cleaning pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanSummary {
    pub blanks_replaced: usize,
    pub renamed_columns: Vec<(String, String)>,
}

/// Convert a column name to snake_case.
///
/// `totalRooms` → `total_rooms`, `Median Income ($)` → `median_income`.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for ch in name.trim().chars() {
        if ch.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
            out.push('_');
        }
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else {
            out.push('_');
        }
        prev = Some(ch);
    }

    let mut collapsed = String::with_capacity(out.len());
    for ch in out.chars() {
        if ch == '_' && collapsed.ends_with('_') {
            continue;
        }
        collapsed.push(ch);
    }
    collapsed.trim_matches('_').to_string()
}

/// Clean a raw table without touching the input.
pub fn clean_table(df: &DataFrame) -> Result<(DataFrame, CleanSummary), MlError> {
    let mut cleaned = df.clone();
    let mut summary = CleanSummary::default();

    let categorical: Vec<String> = cleaned
        .columns()
        .filter(|(_, c)| c.as_categorical().is_some())
        .map(|(n, _)| n.to_string())
        .collect();
    for name in categorical {
        if let Some(values) = cleaned.column(&name).and_then(Column::as_categorical) {
            let mut replaced = 0;
            let values: Vec<Option<String>> = values
                .iter()
                .map(|v| match v {
                    Some(s) if s.trim().is_empty() => {
                        replaced += 1;
                        None
                    }
                    other => other.clone(),
                })
                .collect();
            if replaced > 0 {
                summary.blanks_replaced += replaced;
                cleaned.replace_column(&name, Column::Categorical(values))?;
            }
        }
    }

    let before: Vec<String> = cleaned.column_names().to_vec();
    cleaned.rename_columns(snake_case)?;
    summary.renamed_columns = before
        .into_iter()
        .zip(cleaned.column_names().iter().cloned())
        .filter(|(a, b)| a != b)
        .collect();

    if cleaned.column_names().iter().any(String::is_empty) {
        return Err(MlError::dataset(
            "a column name is empty after snake_case normalisation",
        ));
    }

    Ok((cleaned, summary))
}
