use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use log::debug;

use super::{atomic_write, read_to_string_opt, TargetKey};

/// Durable resume index, one record per [`TargetKey`].
///
/// The record holds the zero-based index of the next untried wordlist line.
/// Reads never fail (missing or garbled records mean "start from zero");
/// writes are atomic so a crash mid-checkpoint cannot corrupt the record.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    dir: PathBuf,
}

impl ProgressStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ProgressStore { dir: dir.into() }
    }

    pub fn path_for(&self, key: &TargetKey) -> PathBuf {
        self.dir.join(format!("{}.progress", key.file_stem()))
    }

    /// Saved resume index, or 0 when there is no usable record.
    pub fn read(&self, key: &TargetKey) -> usize {
        let path = self.path_for(key);
        read_to_string_opt(&path)
            .and_then(|content| content.trim().parse::<usize>().ok())
            .unwrap_or(0)
    }

    pub fn write(&self, key: &TargetKey, index: usize) -> Result<()> {
        atomic_write(&self.path_for(key), &index.to_string())
    }

    /// Idempotent: removing an absent record is success.
    pub fn remove(&self, key: &TargetKey) {
        let path = self.path_for(key);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!("could not remove {}: {}", path.display(), e);
            }
        }
    }
}
