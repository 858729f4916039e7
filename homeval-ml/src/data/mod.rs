//! Tabular data: the in-memory frame, CSV I/O, schemas, the versioned
//! dataset store and raw-table cleaning.

pub mod clean;
pub mod frame;
pub mod schema;
pub mod source;
pub mod storage;

pub use clean::{CleanSummary, clean_table, snake_case};
pub use frame::{Column, DataFrame};
pub use schema::{ColumnSchema, ColumnType, SchemaDefinition};
pub use source::{CsvSource, INDEX_COLUMN};
pub use storage::{DatasetEntry, DatasetRegistry, DatasetStore};
