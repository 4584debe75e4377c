//! Bounded, path-keyed cache of loaded reference catalogs.
//!
//! Reference files rarely change mid-process, so whichever component composes
//! the pipeline owns one of these and hands out shared handles. Entries are
//! immutable `Arc`s; a duplicate concurrent load recomputes the same entry,
//! which is harmless.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::{ReferenceCatalog, ReferenceError};

const DEFAULT_CAPACITY: usize = 8;

pub struct CatalogCache {
    capacity: usize,
    /// LRU order: most recently used last.
    inner: Mutex<Vec<(PathBuf, Arc<ReferenceCatalog>)>>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl CatalogCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Cached catalog for `path`, loading it on a miss.
    ///
    /// The load runs outside the lock: two racing callers may both read the
    /// file, but the second insert just replaces an identical entry.
    pub fn get_or_load(&self, path: &Path) -> Result<Arc<ReferenceCatalog>, ReferenceError> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if let Ok(mut entries) = self.inner.lock() {
            if let Some(pos) = entries.iter().position(|(p, _)| p == &key) {
                let hit = entries.remove(pos);
                let catalog = hit.1.clone();
                entries.push(hit);
                return Ok(catalog);
            }
        }

        let catalog = Arc::new(ReferenceCatalog::load(path)?);
        debug!(path = %key.display(), "Reference catalog cached");

        if let Ok(mut entries) = self.inner.lock() {
            entries.retain(|(p, _)| p != &key);
            entries.push((key, catalog.clone()));
            while entries.len() > self.capacity {
                entries.remove(0);
            }
        }

        Ok(catalog)
    }

    #[cfg(test)]
    fn cached_paths(&self) -> usize {
        self.inner.lock().map(|e| e.len()).unwrap_or(0)
    }
}
