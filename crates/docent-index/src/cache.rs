//! Process-wide handle to a loaded index.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use docent_core::DocentError;

use crate::store::Index;

/// Lazily loads the index at a fixed path and shares it between callers.
///
/// The index itself is immutable; a rebuild is picked up by calling
/// [`IndexCache::invalidate`] (next [`IndexCache::get`] reloads) or
/// [`IndexCache::reload`]. Callers holding an older `Arc<Index>` keep a
/// complete, consistent view.
///
/// # Examples
///
/// ```no_run
/// use docent_index::cache::IndexCache;
///
/// let cache = IndexCache::new(".docent/index.json");
/// let index = cache.get().unwrap();
/// println!("{} chunks", index.len());
/// ```
#[derive(Debug)]
pub struct IndexCache {
    path: PathBuf,
    slot: RwLock<Option<Arc<Index>>>,
}

impl IndexCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            slot: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached index, loading it from disk on first use.
    ///
    /// # Errors
    ///
    /// Propagates [`Index::load`] errors; nothing is cached on failure.
    pub fn get(&self) -> Result<Arc<Index>, DocentError> {
        if let Some(index) = self.read_slot().as_ref() {
            return Ok(Arc::clone(index));
        }

        let mut slot = self.write_slot();
        // another caller may have loaded it while we waited
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }
        let index = Arc::new(Index::load(&self.path)?);
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }

    /// Drop the cached index; the next [`IndexCache::get`] reads the file again.
    pub fn invalidate(&self) {
        *self.write_slot() = None;
        tracing::debug!(path = %self.path.display(), "index cache invalidated");
    }

    /// Load the file now and swap it in. On failure the previous index stays
    /// cached.
    pub fn reload(&self) -> Result<Arc<Index>, DocentError> {
        let index = Arc::new(Index::load(&self.path)?);
        *self.write_slot() = Some(Arc::clone(&index));
        Ok(index)
    }

    pub fn is_loaded(&self) -> bool {
        self.read_slot().is_some()
    }

    fn read_slot(&self) -> std::sync::RwLockReadGuard<'_, Option<Arc<Index>>> {
        self.slot.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_slot(&self) -> std::sync::RwLockWriteGuard<'_, Option<Arc<Index>>> {
        self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
