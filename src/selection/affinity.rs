use dashmap::DashMap;
use std::path::{Path, PathBuf};

use crate::handlers::Capability;

/// Last capability assigned to a file in each directory.
///
/// Best-effort only: concurrent writers may overwrite each other, which can make a fallback
/// pick a stale capability but never corrupts a record.
#[derive(Default)]
pub struct DirectoryAffinityCache {
    entries: DashMap<PathBuf, Capability>,
}

impl DirectoryAffinityCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the capability chosen for `path`'s directory.
    pub fn remember(&self, path: &Path, capability: &Capability) {
        if let Some(directory) = path.parent() {
            self.entries
                .insert(directory.to_path_buf(), capability.clone());
        }
    }

    /// Capability last assigned in `path`'s directory.
    pub fn recall(&self, path: &Path) -> Option<Capability> {
        let directory = path.parent()?;
        self.entries
            .get(directory)
            .map(|entry| entry.value().clone())
    }

    /// Number of directories tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been remembered yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for DirectoryAffinityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryAffinityCache")
            .field("directories", &self.entries.len())
            .finish()
    }
}
