//! Persistent chunk storage.
//!
//! Chunks are stored as plain text files with a `.meta.json` sidecar each,
//! under `<root>/<company>/chunks/`. A snapshot file collects the whole
//! corpus in one document so later runs skip the per-file reload.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::IngestError;

const META_SUFFIX: &str = ".meta.json";

/// Provenance stored alongside each chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageMeta {
    pub company_name: String,
    pub filed_at: DateTime<Utc>,
    pub filing_url: String,
    pub chunk_index: usize,
}

pub trait ObjectStore {
    /// Store one chunk with its metadata under a relative path.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk or its sidecar cannot be written.
    fn put(&self, path: &str, content: &str, meta: &PassageMeta) -> Result<(), IngestError>;

    /// Return all stored chunks with their metadata, ordered by company,
    /// filing date and chunk index.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn list(&self) -> Result<Vec<(String, PassageMeta)>, IngestError>;
}

/// Filesystem-backed [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collect(&self, dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), IngestError> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect(&path, paths)?;
            } else if !path.to_string_lossy().ends_with(META_SUFFIX) {
                paths.push(path);
            }
        }
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, path: &str, content: &str, meta: &PassageMeta) -> Result<(), IngestError> {
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, content)?;
        let sidecar = self.root.join(format!("{path}{META_SUFFIX}"));
        std::fs::write(&sidecar, serde_json::to_string_pretty(meta)?)?;
        debug!(path = %path, "chunk stored");
        Ok(())
    }

    fn list(&self) -> Result<Vec<(String, PassageMeta)>, IngestError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        self.collect(&self.root, &mut paths)?;
        paths.sort();

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let sidecar = PathBuf::from(format!("{}{META_SUFFIX}", path.display()));
            if !sidecar.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let meta: PassageMeta = serde_json::from_str(&std::fs::read_to_string(&sidecar)?)?;
            entries.push((content, meta));
        }
        // Lexicographic path order would put chunk 10 before chunk 2; order
        // by provenance instead.
        entries.sort_by(|a, b| {
            (&a.1.company_name, a.1.filed_at, a.1.chunk_index)
                .cmp(&(&b.1.company_name, b.1.filed_at, b.1.chunk_index))
        });
        Ok(entries)
    }
}

/// The full corpus in one file, written after a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub chunks: Vec<String>,
    pub metadata: Vec<PassageMeta>,
}

impl Snapshot {
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>, IngestError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<(), IngestError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meta(chunk_index: usize) -> PassageMeta {
        PassageMeta {
            company_name: "Apple Inc.".into(),
            filed_at: Utc.with_ymd_and_hms(2023, 10, 27, 0, 0, 0).unwrap(),
            filing_url: "https://example.com/aapl".into(),
            chunk_index,
        }
    }

    #[test]
    fn put_then_list_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        store
            .put("Apple Inc./chunks/0.txt", "Revenue grew 10%.", &meta(0))
            .unwrap();
        store
            .put("Apple Inc./chunks/1.txt", "Margins held.", &meta(1))
            .unwrap();

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "Revenue grew 10%.");
        assert_eq!(entries[0].1, meta(0));
        assert_eq!(entries[1].1.chunk_index, 1);
    }

    #[test]
    fn list_orders_chunks_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        for i in [0usize, 2, 10, 1] {
            store
                .put(
                    &format!("Apple Inc./chunks/{i}.txt"),
                    &format!("chunk {i}"),
                    &meta(i),
                )
                .unwrap();
        }

        let order: Vec<usize> = store
            .list()
            .unwrap()
            .into_iter()
            .map(|(_, m)| m.chunk_index)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 10]);
    }

    #[test]
    fn list_on_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn files_without_sidecar_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stray.txt"), "no metadata").unwrap();
        let store = FsObjectStore::new(dir.path());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let snapshot = Snapshot {
            chunks: vec!["a".into(), "b".into()],
            metadata: vec![meta(0), meta(1)],
        };
        snapshot.save(&path).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap().unwrap(), snapshot);
    }

    #[test]
    fn snapshot_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Snapshot::load(&dir.path().join("absent.json")).unwrap().is_none());
    }
}
