//! CSV reading and writing for datasets.
//!
//! Cells are split on the delimiter with double-quote escaping. An unquoted
//! empty cell is a missing value; a quoted empty cell (`""`) is an empty
//! string. A leading `row_id` column, when present, becomes the row index.

use crate::data::frame::{Column, DataFrame};
use crate::data::schema::{ColumnType, SchemaDefinition, infer_schema};
use crate::error::MlError;
use std::path::{Path, PathBuf};

/// Name of the column that carries the row index on disk.
pub const INDEX_COLUMN: &str = "row_id";

/// Header plus raw cells, before typing.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// CSV file data source.
pub struct CsvSource {
    pub path: PathBuf,
    pub delimiter: char,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            delimiter: ',',
        }
    }

    pub fn read_raw(&self) -> Result<RawTable, MlError> {
        let content = std::fs::read_to_string(&self.path)?;
        parse_csv(&content, self.delimiter).map_err(|e| self.with_path(e))
    }

    /// Load and type the file. Without a schema, types are inferred.
    pub fn load(&self, schema: Option<&SchemaDefinition>) -> Result<DataFrame, MlError> {
        let raw = self.read_raw()?;
        into_frame(raw, schema).map_err(|e| self.with_path(e))
    }

    fn with_path(&self, err: MlError) -> MlError {
        match err {
            MlError::Dataset(msg) => MlError::dataset(format!("{}: {}", self.path.display(), msg)),
            other => other,
        }
    }
}

fn parse_csv(content: &str, delimiter: char) -> Result<RawTable, MlError> {
    let mut records = parse_records(content, delimiter)?.into_iter();

    let (_, header) = records
        .next()
        .ok_or_else(|| MlError::dataset("empty CSV file"))?;
    let columns: Vec<String> = header
        .into_iter()
        .map(|c| c.unwrap_or_default().trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, row) in records {
        if row.len() != columns.len() {
            return Err(MlError::dataset(format!(
                "line {}: expected {} fields, found {}",
                line,
                columns.len(),
                row.len()
            )));
        }
        rows.push(row);
    }

    Ok(RawTable { columns, rows })
}

/// Split `content` into records tagged with the line they start on.
///
/// Line breaks inside a quoted field belong to the field. Blank lines
/// outside quotes are skipped.
fn parse_records(
    content: &str,
    delimiter: char,
) -> Result<Vec<(usize, Vec<Option<String>>)>, MlError> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_start = 1;
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => {
                    if ch == '\n' {
                        line += 1;
                    }
                    current.push(ch);
                }
            }
            continue;
        }
        match ch {
            '"' => {
                in_quotes = true;
                quoted = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                fields.push(finish_field(&mut current, &mut quoted));
                push_record(&mut records, record_start, std::mem::take(&mut fields));
                line += 1;
                record_start = line;
            }
            c if c == delimiter => fields.push(finish_field(&mut current, &mut quoted)),
            _ => current.push(ch),
        }
    }
    if in_quotes {
        return Err(MlError::dataset(format!(
            "line {record_start}: unterminated quote"
        )));
    }
    if !fields.is_empty() || !current.is_empty() || quoted {
        fields.push(finish_field(&mut current, &mut quoted));
        push_record(&mut records, record_start, fields);
    }
    Ok(records)
}

fn push_record(
    records: &mut Vec<(usize, Vec<Option<String>>)>,
    line: usize,
    fields: Vec<Option<String>>,
) {
    let blank = matches!(fields.as_slice(), [None]);
    if !blank {
        records.push((line, fields));
    }
}

fn finish_field(current: &mut String, quoted: &mut bool) -> Option<String> {
    let field = std::mem::take(current);
    let was_quoted = std::mem::replace(quoted, false);
    if !was_quoted && field.trim().is_empty() {
        None
    } else if was_quoted {
        Some(field)
    } else {
        Some(field.trim().to_string())
    }
}

fn into_frame(raw: RawTable, schema: Option<&SchemaDefinition>) -> Result<DataFrame, MlError> {
    let RawTable { mut columns, mut rows } = raw;

    let index: Vec<usize> = if columns.first().map(String::as_str) == Some(INDEX_COLUMN) {
        columns.remove(0);
        rows.iter_mut()
            .enumerate()
            .map(|(i, row)| {
                let cell = row.remove(0);
                cell.as_deref()
                    .and_then(|c| c.trim().parse::<usize>().ok())
                    .ok_or_else(|| MlError::dataset(format!("row {i}: invalid {INDEX_COLUMN}")))
            })
            .collect::<Result<_, _>>()?
    } else {
        (0..rows.len()).collect()
    };

    let inferred;
    let schema = match schema {
        Some(s) => s,
        None => {
            inferred = infer_schema(&columns, &rows);
            &inferred
        }
    };

    let mut typed = Vec::with_capacity(columns.len());
    for (i, name) in columns.iter().enumerate() {
        let dtype = schema.dtype_of(name).ok_or_else(|| {
            MlError::schema(format!("column '{name}' is not part of the registered schema"))
        })?;
        let column = match dtype {
            ColumnType::Numeric => Column::Numeric(
                rows.iter()
                    .enumerate()
                    .map(|(r, row)| parse_number(row[i].as_deref(), name, r))
                    .collect::<Result<_, _>>()?,
            ),
            ColumnType::Categorical => {
                Column::Categorical(rows.iter().map(|row| row[i].clone()).collect())
            }
        };
        typed.push((name.clone(), column));
    }

    DataFrame::with_index(index, typed)
}

fn parse_number(cell: Option<&str>, column: &str, row: usize) -> Result<Option<f64>, MlError> {
    match cell {
        None => Ok(None),
        Some(text) => {
            let value: f64 = text.trim().parse().map_err(|_| {
                MlError::dataset(format!(
                    "row {row}: column '{column}' value '{text}' is not numeric"
                ))
            })?;
            Ok((!value.is_nan()).then_some(value))
        }
    }
}

/// Render a table as CSV, index first.
pub fn to_csv(df: &DataFrame) -> String {
    let mut out = String::new();
    out.push_str(INDEX_COLUMN);
    for name in df.column_names() {
        out.push(',');
        out.push_str(&escape(name));
    }
    out.push('\n');

    for (pos, row_id) in df.index().iter().enumerate() {
        out.push_str(&row_id.to_string());
        for (_, column) in df.columns() {
            out.push(',');
            match column {
                Column::Numeric(v) => {
                    if let Some(x) = v[pos] {
                        out.push_str(&x.to_string());
                    }
                }
                Column::Categorical(v) => {
                    if let Some(s) = &v[pos] {
                        out.push_str(&escape(s));
                    }
                }
            }
        }
        out.push('\n');
    }
    out
}

fn escape(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.trim() != value
        || value.contains([',', '"', '\n', '\r']);
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Read a CSV file with an optional schema.
pub fn read_csv(path: &Path, schema: Option<&SchemaDefinition>) -> Result<DataFrame, MlError> {
    CsvSource::new(path).load(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_parse_records_quotes_and_missing() {
        let records = parse_records(r#"1,,"<1H OCEAN","say ""hi""","""#, ',').unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].1,
            vec![
                Some("1".to_string()),
                None,
                Some("<1H OCEAN".to_string()),
                Some("say \"hi\"".to_string()),
                Some(String::new()),
            ]
        );
    }

    #[test]
    fn test_unterminated_quote() {
        let err = parse_records("a,b\n1,\"open\n2,3\n", ',').unwrap_err();
        assert!(err.to_string().contains("line 2: unterminated quote"), "{err}");
    }

    #[test]
    fn test_line_breaks_inside_quotes_stay_in_field() {
        let records = parse_records("a,b\r\n1,\"x\n\ny\"\r\n\n2,z\n", ',').unwrap();
        assert_eq!(
            records,
            vec![
                (1, vec![Some("a".to_string()), Some("b".to_string())]),
                (2, vec![Some("1".to_string()), Some("x\n\ny".to_string())]),
                (6, vec![Some("2".to_string()), Some("z".to_string())]),
            ]
        );
    }

    #[test]
    fn test_load_error_names_path_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "a\n\"open\n").unwrap();
        let msg = read_csv(&path, None).unwrap_err().to_string();
        assert_eq!(msg.matches("Dataset error").count(), 1, "{msg}");
        assert!(msg.contains("bad.csv"));
    }

    #[test]
    fn test_load_infers_types() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("housing.csv");
        std::fs::write(
            &path,
            "longitude,total_bedrooms,ocean_proximity\n-122.23,129,NEAR BAY\n-122.22,,INLAND\n",
        )
        .unwrap();

        let df = read_csv(&path, None).unwrap();
        assert_eq!(df.n_rows(), 2);
        assert_eq!(df.index(), &[0, 1]);
        assert_eq!(
            df.numeric("total_bedrooms").unwrap(),
            &[Some(129.0), None]
        );
        assert_eq!(
            df.column("ocean_proximity").unwrap().dtype(),
            ColumnType::Categorical
        );
    }

    #[test]
    fn test_field_count_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "a,b\n1,2,3\n").unwrap();
        let err = read_csv(&path, None).unwrap_err();
        assert!(err.to_string().contains("expected 2 fields"));
    }

    #[test]
    fn test_csv_roundtrip_preserves_index_and_strings() {
        let df = DataFrame::with_index(
            vec![5, 2, 9],
            vec![
                ("x".into(), Column::Numeric(vec![Some(0.1), None, Some(3.0)])),
                (
                    "cat".into(),
                    Column::Categorical(vec![
                        Some("a, b".into()),
                        Some(String::new()),
                        Some("line\none\r\n\ntwo".into()),
                    ]),
                ),
            ],
        )
        .unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rt.csv");
        std::fs::write(&path, to_csv(&df)).unwrap();

        let loaded = read_csv(&path, Some(&df.schema())).unwrap();
        assert_eq!(loaded, df);
    }

    #[test]
    fn test_schema_forces_categorical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("codes.csv");
        std::fs::write(&path, "code\n1\n2\n").unwrap();

        let schema = SchemaDefinition {
            columns: vec![crate::data::schema::ColumnSchema {
                name: "code".into(),
                dtype: ColumnType::Categorical,
                nullable: false,
            }],
        };
        let df = read_csv(&path, Some(&schema)).unwrap();
        assert_eq!(
            df.column("code").unwrap().as_categorical().unwrap(),
            &[Some("1".to_string()), Some("2".to_string())]
        );
    }
}
