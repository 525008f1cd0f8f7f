//! LRU cache of open day-file readers.
//!
//! Opening a reader costs a header read and decode; query-heavy callers
//! keep readers for recently used days open here.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;
use tracing::debug;

use crate::error::{NdFileError, Result};
use crate::layout::DayFileId;
use crate::reader::DayFileReader;

/// Statistics for the reader cache
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReaderCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl ReaderCacheStats {
    /// Calculate the cache hit rate (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Open readers keyed by day-file identity.
pub struct ReaderCache {
    root: PathBuf,
    readers: LruCache<DayFileId, DayFileReader>,
    stats: ReaderCacheStats,
}

impl ReaderCache {
    /// Create a cache for day files under `root` holding at most `capacity` readers.
    pub fn new(root: impl Into<PathBuf>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            root: root.into(),
            readers: LruCache::new(capacity),
            stats: ReaderCacheStats::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reader for `id`, opening the file on a miss.
    pub fn get(&mut self, id: DayFileId) -> Result<&mut DayFileReader> {
        if self.readers.contains(&id) {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            let reader = DayFileReader::open(id.path_in(&self.root))?;
            if let Some((evicted, _)) = self.readers.push(id, reader) {
                if evicted != id {
                    self.stats.evictions += 1;
                    debug!(evicted = %evicted, "Evicted day-file reader");
                }
            }
        }

        self.stats.entries = self.readers.len();
        let path = id.path_in(&self.root);
        self.readers
            .get_mut(&id)
            .ok_or_else(|| NdFileError::corrupt(path, "reader vanished from cache"))
    }

    /// Drop the reader for `id`, e.g. after its file was replaced.
    pub fn invalidate(&mut self, id: DayFileId) -> bool {
        let removed = self.readers.pop(&id).is_some();
        self.stats.entries = self.readers.len();
        removed
    }

    pub fn clear(&mut self) {
        self.readers.clear();
        self.stats.entries = 0;
    }

    pub fn stats(&self) -> ReaderCacheStats {
        self.stats.clone()
    }
}
