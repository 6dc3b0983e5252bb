//! Per-book serialization

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::library::LibraryId;

/// One async mutex per library book
///
/// Load, merge and persist for a book happen while its lock is held, so two
/// imports never interleave on the same stored set.
#[derive(Default)]
pub struct BookLocks {
    locks: Mutex<HashMap<LibraryId, Arc<tokio::sync::Mutex<()>>>>,
}

impl BookLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, library_id: LibraryId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(library_id).or_default().clone()
    }
}
