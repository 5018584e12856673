//! Resume journal for batch uploads.
//!
//! The manager writes a manifest next to each upload run so an interrupted
//! run can skip batches that already landed. The manifest is deleted once
//! every batch succeeds, so a later run over the same corpus uploads again
//! from scratch.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::types::Passage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadManifest {
    /// Hash over the datapoint ids of the corpus this manifest belongs to.
    pub fingerprint: String,
    pub batch_size: usize,
    pub total_batches: usize,
    pub completed: Vec<usize>,
    pub datapoint_count: u64,
}

impl UploadManifest {
    #[must_use]
    pub fn new(passages: &[Passage], batch_size: usize) -> Self {
        let total_batches = passages.len().div_ceil(batch_size);
        Self {
            fingerprint: fingerprint(passages),
            batch_size,
            total_batches,
            completed: Vec::new(),
            datapoint_count: passages.len() as u64,
        }
    }

    /// Load a manifest from disk. Returns `Ok(None)` when the file does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>, IndexError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the manifest cannot be serialized or written.
    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    #[must_use]
    pub fn is_completed(&self, batch: usize) -> bool {
        self.completed.contains(&batch)
    }

    pub fn mark_completed(&mut self, batch: usize) {
        if !self.is_completed(batch) {
            self.completed.push(batch);
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.completed.len() == self.total_batches
    }

    /// True when this manifest describes an interrupted upload of exactly
    /// the given corpus.
    #[must_use]
    pub fn matches(&self, passages: &[Passage], batch_size: usize) -> bool {
        self.batch_size == batch_size && self.fingerprint == fingerprint(passages)
    }
}

/// Order-sensitive hash over the corpus datapoint ids.
#[must_use]
pub fn fingerprint(passages: &[Passage]) -> String {
    let mut hasher = blake3::Hasher::new();
    for passage in passages {
        hasher.update(passage.datapoint_id().as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
