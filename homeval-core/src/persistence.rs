//! Shared persistence utilities: atomic file writes, JSON load/save.
//!
//! Every dataset version, artifact and registry goes through these helpers so
//! a stage either leaves a complete file behind or nothing at all.

use std::io::{self, Write};
use std::path::Path;

/// Atomically write `data` as pretty-printed JSON.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, &json)
}

/// Atomically write raw bytes to `path`, creating parent directories.
///
/// The bytes go to a uniquely named temp file in the target directory,
/// which is synced and then renamed over `path`. Concurrent writers never
/// share a temp file.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let prefix = path
        .file_name()
        .map(|n| format!(".{}.", n.to_string_lossy()))
        .unwrap_or_else(|| ".homeval.".to_string());
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read a JSON document written by [`atomic_write_json`].
///
/// A missing file is `Ok(None)`; unparseable content is `InvalidData`.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
