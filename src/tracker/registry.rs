//! Process-wide map of per-file tracking state.

use super::cache::ChangeCache;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// Baseline snapshot and change cache for one file.
#[derive(Debug)]
pub struct FileState {
    baseline: Option<String>,
    cache: ChangeCache,
}

impl FileState {
    fn new(cache_size: usize) -> Self {
        Self {
            baseline: None,
            cache: ChangeCache::new(cache_size),
        }
    }

    /// The snapshot the next edit is diffed against, if any edit was seen.
    pub fn baseline(&self) -> Option<&str> {
        self.baseline.as_deref()
    }

    pub fn set_baseline(&mut self, content: String) {
        self.baseline = Some(content);
    }

    pub fn cache(&self) -> &ChangeCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ChangeCache {
        &mut self.cache
    }

    /// Make `content` the new baseline and drop every cached fragment.
    pub fn rebase(&mut self, content: String) {
        self.baseline = Some(content);
        self.cache.clear();
    }

    /// Return to the never-observed state.
    pub fn forget(&mut self) {
        self.baseline = None;
        self.cache.clear();
    }
}

/// Registry of [`FileState`] keyed by absolute path.
///
/// Each entry sits behind its own async mutex; holding it for the whole of
/// an edit keeps two edits of the same file from interleaving across await
/// points. The map itself is only locked briefly and never across an await.
#[derive(Debug)]
pub struct FileRegistry {
    cache_size: usize,
    entries: Mutex<HashMap<PathBuf, Arc<AsyncMutex<FileState>>>>,
}

impl FileRegistry {
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache_size,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The entry for `path`, created empty on first use.
    pub fn get_or_create(&self, path: &Path) -> Arc<AsyncMutex<FileState>> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(AsyncMutex::new(FileState::new(self.cache_size))))
            .clone()
    }

    /// Clear the baseline and cache for `path`, if it is tracked.
    pub async fn reset(&self, path: &Path) {
        let entry = {
            let entries = match self.entries.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            entries.get(path).cloned()
        };
        if let Some(entry) = entry {
            entry.lock().await.forget();
        }
    }

    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
