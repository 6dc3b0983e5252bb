//! Library index cache
//!
//! Holds the current [`LibraryIndex`] and rebuilds it when the library's
//! fingerprint changes. At most one build runs at a time; callers that ask
//! for a rebuild while one is in flight wait for it and share its result.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::Result;

use super::book::LibraryScope;
use super::index::LibraryIndex;
use super::scanner::LibrarySource;

/// Cached library index with single-flight rebuilds
pub struct LibraryIndexCache {
    source: Arc<dyn LibrarySource>,
    scope: LibraryScope,
    current: RwLock<Arc<LibraryIndex>>,
    build_lock: Mutex<()>,
    generation: AtomicU64,
}

impl LibraryIndexCache {
    /// Create an empty cache; the first [`fresh`](Self::fresh) call builds
    pub fn new(source: Arc<dyn LibrarySource>, scope: LibraryScope) -> Self {
        Self {
            source,
            scope,
            current: RwLock::new(Arc::new(LibraryIndex::default())),
            build_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// The index as last built, without checking the library
    pub fn current(&self) -> Arc<LibraryIndex> {
        self.current.read().clone()
    }

    /// Number of completed builds
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Return an index matching the library's current fingerprint,
    /// rebuilding first if the library changed
    pub async fn fresh(&self) -> Result<Arc<LibraryIndex>> {
        let fingerprint = self.source.fingerprint().await?;
        let current = self.current();
        if self.generation() > 0 && current.fingerprint() == &fingerprint {
            return Ok(current);
        }

        let _guard = self.build_lock.lock().await;

        // Another caller may have rebuilt while we waited
        let current = self.current();
        if self.generation() > 0 && current.fingerprint() == &fingerprint {
            return Ok(current);
        }

        self.build_locked().await
    }

    /// Force a rebuild
    ///
    /// If a build is already running, waits for it and returns its index
    /// instead of scanning again.
    pub async fn refresh(&self) -> Result<Arc<LibraryIndex>> {
        let observed = self.generation();
        let _guard = self.build_lock.lock().await;

        if self.generation() != observed {
            return Ok(self.current());
        }

        self.build_locked().await
    }

    async fn build_locked(&self) -> Result<Arc<LibraryIndex>> {
        let snapshot = self.source.snapshot().await?;
        let index = Arc::new(LibraryIndex::build(&snapshot, &self.scope));

        *self.current.write() = index.clone();
        self.generation.fetch_add(1, Ordering::AcqRel);

        Ok(index)
    }
}
