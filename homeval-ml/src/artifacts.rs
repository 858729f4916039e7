//! Versioned storage for fitted transformers, models and metrics.
//!
//! Each save writes `<root>/<name>/v<N>.json` and records
//! `{name, version, kind, hash, created_at}` in `<root>/manifest.json`.
//! Artifacts are looked up through an [`ArtifactRef`]: a name plus an
//! optional pinned version.

use crate::data::storage::hash_bytes;
use crate::error::MlError;
use chrono::{DateTime, Utc};
use homeval_core::ArtifactRef;
use homeval_core::persistence::{atomic_write, atomic_write_json, load_json};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MANIFEST_FILE: &str = "manifest.json";

/// What an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    CuratedColumns,
    FeaturePipeline,
    Model,
    Metrics,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::CuratedColumns => write!(f, "curated_columns"),
            ArtifactKind::FeaturePipeline => write!(f, "feature_pipeline"),
            ArtifactKind::Model => write!(f, "model"),
            ArtifactKind::Metrics => write!(f, "metrics"),
        }
    }
}

/// Identity of one stored artifact version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactId {
    pub name: String,
    pub version: u32,
    pub hash: String,
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@v{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub version: u32,
    pub kind: ArtifactKind,
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

impl ManifestEntry {
    pub fn id(&self) -> ArtifactId {
        ArtifactId {
            name: self.name.clone(),
            version: self.version,
            hash: self.hash.clone(),
        }
    }

    fn rel_path(&self) -> PathBuf {
        PathBuf::from(&self.name).join(format!("v{}.json", self.version))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub artifacts: Vec<ManifestEntry>,
}

impl ArtifactManifest {
    fn latest(&self, name: &str) -> Option<&ManifestEntry> {
        self.artifacts
            .iter()
            .filter(|a| a.name == name)
            .max_by_key(|a| a.version)
    }

    fn find(&self, reference: &ArtifactRef) -> Option<&ManifestEntry> {
        match reference.version {
            Some(v) => self
                .artifacts
                .iter()
                .find(|a| a.name == reference.name && a.version == v),
            None => self.latest(&reference.name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    fn manifest(&self) -> Result<ArtifactManifest, MlError> {
        Ok(load_json(&self.manifest_path())?.unwrap_or_default())
    }

    /// Store `value` as the next version of `name`.
    pub fn save<T: Serialize>(
        &self,
        name: &str,
        kind: ArtifactKind,
        value: &T,
    ) -> Result<ArtifactId, MlError> {
        if name.is_empty() || name.contains("..") || name.starts_with('/') {
            return Err(MlError::dataset(format!("invalid artifact name '{name}'")));
        }
        let mut manifest = self.manifest()?;
        let version = manifest.latest(name).map(|a| a.version + 1).unwrap_or(1);

        let bytes = serde_json::to_vec_pretty(value)?;
        let entry = ManifestEntry {
            name: name.to_string(),
            version,
            kind,
            hash: hash_bytes(&bytes),
            created_at: Utc::now(),
        };
        atomic_write(&self.root.join(entry.rel_path()), &bytes)?;
        manifest.artifacts.push(entry.clone());
        atomic_write_json(&self.manifest_path(), &manifest)?;

        let id = entry.id();
        info!(artifact = %id, %kind, "Saved artifact");
        Ok(id)
    }

    /// The manifest entry a reference points at.
    pub fn resolve(&self, reference: &ArtifactRef) -> Result<ManifestEntry, MlError> {
        self.manifest()?
            .find(reference)
            .cloned()
            .ok_or_else(|| MlError::missing_artifact(format!("artifact {reference} not found")))
    }

    /// Load and deserialize an artifact, checking its kind and content hash.
    pub fn load<T: DeserializeOwned>(
        &self,
        reference: &ArtifactRef,
        kind: ArtifactKind,
    ) -> Result<(T, ArtifactId), MlError> {
        let entry = self.resolve(reference)?;
        if entry.kind != kind {
            return Err(MlError::schema(format!(
                "artifact {} holds {}, expected {}",
                entry.id(),
                entry.kind,
                kind
            )));
        }

        let path = self.root.join(entry.rel_path());
        let bytes = std::fs::read(&path).map_err(|e| {
            MlError::missing_artifact(format!("artifact {} unreadable at {}: {e}", entry.id(), path.display()))
        })?;
        if hash_bytes(&bytes) != entry.hash {
            return Err(MlError::dataset(format!(
                "artifact {} does not match its recorded hash",
                entry.id()
            )));
        }

        let value = serde_json::from_slice(&bytes)?;
        debug!(artifact = %entry.id(), "Loaded artifact");
        Ok((value, entry.id()))
    }

    pub fn exists(&self, reference: &ArtifactRef) -> Result<bool, MlError> {
        Ok(self.manifest()?.find(reference).is_some())
    }

    /// Every stored version, in save order.
    pub fn list(&self) -> Result<Vec<ManifestEntry>, MlError> {
        Ok(self.manifest()?.artifacts)
    }
}
