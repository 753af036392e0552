use std::path::PathBuf;

use anyhow::Result;

use super::{atomic_write, read_to_string_opt, TargetKey};

/// Durable marker that a [`TargetKey`] has already been cracked.
///
/// Shares the key derivation with [`super::progress::ProgressStore`] but
/// lives under a disjoint `.success` suffix. Presence is authoritative: the
/// engine never re-attempts a key that has a record here. The normal flow
/// never removes a record.
#[derive(Debug, Clone)]
pub struct SuccessStore {
    dir: PathBuf,
}

impl SuccessStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SuccessStore { dir: dir.into() }
    }

    pub fn path_for(&self, key: &TargetKey) -> PathBuf {
        self.dir.join(format!("{}.success", key.file_stem()))
    }

    pub fn exists(&self, key: &TargetKey) -> bool {
        self.path_for(key).exists()
    }

    /// The recorded password, when a record exists and is readable.
    pub fn read(&self, key: &TargetKey) -> Option<String> {
        read_to_string_opt(&self.path_for(key))
    }

    /// Last writer wins; in practice written at most once per key.
    pub fn write(&self, key: &TargetKey, password: &str) -> Result<()> {
        atomic_write(&self.path_for(key), password)
    }
}
