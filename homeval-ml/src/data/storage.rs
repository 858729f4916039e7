//! Dataset versioning and registry.
//!
//! Datasets are addressed by logical names such as `train/housing/features`.
//! Each save writes a new immutable version under
//! `<root>/<name>/v<N>.csv` and appends an entry to `<root>/registry.json`;
//! loads resolve the latest version.

use crate::data::frame::DataFrame;
use crate::data::schema::SchemaDefinition;
use crate::data::source::{read_csv, to_csv};
use crate::error::MlError;
use chrono::{DateTime, Utc};
use homeval_core::persistence::{atomic_write, atomic_write_json, load_json};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const REGISTRY_FILE: &str = "registry.json";

/// A registered dataset version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    pub version: u32,
    pub schema: SchemaDefinition,
    /// Path relative to the store root.
    pub path: PathBuf,
    pub hash: String,
    pub row_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Registry of all stored dataset versions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetRegistry {
    pub datasets: Vec<DatasetEntry>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self {
            datasets: Vec::new(),
        }
    }

    /// Load registry from a JSON file; a missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self, MlError> {
        Ok(load_json(path)?.unwrap_or_default())
    }

    /// Save registry to a JSON file (atomic write).
    pub fn save(&self, path: &Path) -> Result<(), MlError> {
        atomic_write_json(path, self)?;
        Ok(())
    }

    pub fn add(&mut self, entry: DatasetEntry) {
        self.datasets.push(entry);
    }

    /// Latest version of a dataset.
    pub fn find_by_name(&self, name: &str) -> Option<&DatasetEntry> {
        self.datasets
            .iter()
            .filter(|d| d.name == name)
            .max_by_key(|d| d.version)
    }

    pub fn find_version(&self, name: &str, version: u32) -> Option<&DatasetEntry> {
        self.datasets
            .iter()
            .find(|d| d.name == name && d.version == version)
    }

    pub fn list(&self) -> &[DatasetEntry] {
        &self.datasets
    }
}

/// Named, versioned tabular storage on the local filesystem.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    root: PathBuf,
}

impl DatasetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn registry_path(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn registry(&self) -> Result<DatasetRegistry, MlError> {
        DatasetRegistry::load(&self.registry_path())
    }

    /// Persist `df` as the next version of `name`.
    pub fn save(&self, name: &str, df: &DataFrame) -> Result<DatasetEntry, MlError> {
        validate_name(name)?;
        let mut registry = self.registry()?;
        let version = registry
            .find_by_name(name)
            .map(|e| e.version + 1)
            .unwrap_or(1);

        let rel_path = PathBuf::from(name).join(format!("v{version}.csv"));
        let content = to_csv(df);
        atomic_write(&self.root.join(&rel_path), content.as_bytes())?;

        let entry = DatasetEntry {
            name: name.to_string(),
            version,
            schema: df.schema(),
            path: rel_path,
            hash: hash_bytes(content.as_bytes()),
            row_count: df.n_rows(),
            created_at: Utc::now(),
        };
        registry.add(entry.clone());
        registry.save(&self.registry_path())?;

        info!(
            dataset = %name,
            version,
            rows = df.n_rows(),
            cols = df.n_cols(),
            "Saved dataset"
        );
        Ok(entry)
    }

    /// Load the latest version of `name`.
    ///
    /// An unregistered name falls back to a flat `<root>/<name>.csv` file with
    /// inferred column types; this is how raw inputs enter the store.
    pub fn load(&self, name: &str) -> Result<DataFrame, MlError> {
        validate_name(name)?;
        let registry = self.registry()?;
        if let Some(entry) = registry.find_by_name(name) {
            return self.load_entry(entry);
        }

        let flat = self.root.join(format!("{name}.csv"));
        if flat.exists() {
            debug!(dataset = %name, path = %flat.display(), "Loading unregistered dataset file");
            return read_csv(&flat, None);
        }

        Err(MlError::missing_artifact(format!(
            "dataset '{}' not found in {}",
            name,
            self.root.display()
        )))
    }

    pub fn load_version(&self, name: &str, version: u32) -> Result<DataFrame, MlError> {
        let registry = self.registry()?;
        let entry = registry.find_version(name, version).ok_or_else(|| {
            MlError::missing_artifact(format!("dataset '{name}' version {version} not found"))
        })?;
        self.load_entry(entry)
    }

    fn load_entry(&self, entry: &DatasetEntry) -> Result<DataFrame, MlError> {
        let path = self.root.join(&entry.path);
        if !path.exists() {
            return Err(MlError::missing_artifact(format!(
                "dataset '{}' v{} is registered but {} is missing",
                entry.name,
                entry.version,
                path.display()
            )));
        }
        let df = read_csv(&path, Some(&entry.schema))?;
        debug!(dataset = %entry.name, version = entry.version, rows = df.n_rows(), "Loaded dataset");
        Ok(df)
    }

    /// Whether `name` can be loaded.
    pub fn exists(&self, name: &str) -> Result<bool, MlError> {
        Ok(self.registry()?.find_by_name(name).is_some()
            || self.root.join(format!("{name}.csv")).exists())
    }

    /// Latest version of every registered dataset, sorted by name.
    pub fn list(&self) -> Result<Vec<DatasetEntry>, MlError> {
        let registry = self.registry()?;
        let mut names: Vec<&str> = registry.list().iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        Ok(names
            .into_iter()
            .filter_map(|n| registry.find_by_name(n).cloned())
            .collect())
    }

    /// Register an external CSV file under `name`.
    pub fn ingest(&self, name: &str, file: &Path) -> Result<DatasetEntry, MlError> {
        let df = read_csv(file, None)?;
        self.save(name, &df)
    }
}

fn validate_name(name: &str) -> Result<(), MlError> {
    let ok = !name.is_empty()
        && !name.starts_with('/')
        && name
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..");
    if ok {
        Ok(())
    } else {
        Err(MlError::dataset(format!("invalid dataset name '{name}'")))
    }
}

/// Compute SHA-256 hash of arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::Column;
    use tempfile::TempDir;

    fn frame(values: &[f64]) -> DataFrame {
        DataFrame::new(vec![(
            "median_income".into(),
            Column::Numeric(values.iter().map(|v| Some(*v)).collect()),
        )])
        .unwrap()
    }

    #[test]
    fn test_save_then_load_latest() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::new(dir.path());

        let e1 = store.save("cleaned/housing", &frame(&[1.0])).unwrap();
        let e2 = store.save("cleaned/housing", &frame(&[1.0, 2.0])).unwrap();
        assert_eq!(e1.version, 1);
        assert_eq!(e2.version, 2);

        let latest = store.load("cleaned/housing").unwrap();
        assert_eq!(latest.n_rows(), 2);

        // Earlier versions stay untouched.
        let v1 = store.load_version("cleaned/housing", 1).unwrap();
        assert_eq!(v1.n_rows(), 1);
        assert!(dir.path().join("cleaned/housing/v1.csv").exists());
    }

    #[test]
    fn test_multiline_category_survives_store_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::new(dir.path());
        let df = DataFrame::new(vec![(
            "ocean_proximity".into(),
            Column::Categorical(vec![Some("a\nb".into()), Some("INLAND".into())]),
        )])
        .unwrap();

        store.save("cleaned/housing", &df).unwrap();
        assert_eq!(store.load("cleaned/housing").unwrap(), df);
    }

    #[test]
    fn test_missing_dataset_is_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::new(dir.path());
        let err = store.load("train/housing/features").unwrap_err();
        assert!(matches!(err, MlError::MissingArtifact(_)));
    }

    #[test]
    fn test_flat_file_fallback() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("raw")).unwrap();
        std::fs::write(dir.path().join("raw/housing.csv"), "a,b\n1,x\n").unwrap();

        let store = DatasetStore::new(dir.path());
        assert!(store.exists("raw/housing").unwrap());
        let df = store.load("raw/housing").unwrap();
        assert_eq!(df.column_names(), &["a", "b"]);
    }

    #[test]
    fn test_invalid_names_rejected() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::new(dir.path());
        assert!(store.save("../escape", &frame(&[1.0])).is_err());
        assert!(store.save("a//b", &frame(&[1.0])).is_err());
        assert!(store.save("", &frame(&[1.0])).is_err());
    }

    #[test]
    fn test_registry_records_hash_and_rows() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::new(dir.path());
        let entry = store.save("x", &frame(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(entry.row_count, 3);
        assert_eq!(entry.hash.len(), 64);

        let registry = store.registry().unwrap();
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_list_reports_latest_versions() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::new(dir.path());
        store.save("train/housing/target", &frame(&[1.0])).unwrap();
        store.save("cleaned/housing", &frame(&[1.0])).unwrap();
        store.save("cleaned/housing", &frame(&[1.0, 2.0])).unwrap();

        let listed = store.list().unwrap();
        let names: Vec<(&str, u32)> = listed.iter().map(|e| (e.name.as_str(), e.version)).collect();
        assert_eq!(names, vec![("cleaned/housing", 2), ("train/housing/target", 1)]);
    }

    #[test]
    fn test_hash_bytes_deterministic() {
        assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }
}
