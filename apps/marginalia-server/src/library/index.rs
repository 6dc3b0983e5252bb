//! Immutable identity index over a library snapshot
//!
//! Both lookup maps are built together from one snapshot and never mutated
//! afterwards; a rebuild produces a new index that replaces the old one as a
//! whole.

use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::time::Instant;

use super::book::{LibraryBook, LibraryFingerprint, LibraryId, LibraryScope, LibrarySnapshot};
use super::normalize::{normalize_author, normalize_title};

/// One library book as seen by the matcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryBookEntry {
    pub library_id: LibraryId,
    pub uuid: String,
    /// Display title, as stored in the library
    pub title: String,
    pub title_normalized: String,
    /// Authors in library order, as stored
    pub authors: Vec<String>,
    /// Same authors, normalized for comparison
    pub authors_normalized: Vec<String>,
}

impl LibraryBookEntry {
    /// True when the normalized author appears in this entry's author list
    pub fn has_author(&self, author_normalized: &str) -> bool {
        self.authors_normalized.iter().any(|a| a == author_normalized)
    }
}

/// Snapshot of the library keyed by uuid and normalized title
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryIndex {
    entries: BTreeMap<LibraryId, LibraryBookEntry>,
    by_uuid: BTreeMap<String, LibraryId>,
    by_title: BTreeMap<String, LibraryId>,
    fingerprint: LibraryFingerprint,
    skipped: usize,
}

impl LibraryIndex {
    /// Build an index from every book in scope
    ///
    /// Malformed entries (no uuid, empty title, duplicate id or uuid) are
    /// logged and skipped. When two books share a normalized title the lowest
    /// library id owns the title slot, so rebuilding from the same snapshot
    /// always yields the same index.
    pub fn build(snapshot: &LibrarySnapshot, scope: &LibraryScope) -> Self {
        let start = Instant::now();
        let mut index = LibraryIndex {
            fingerprint: snapshot.fingerprint.clone(),
            ..Default::default()
        };

        let mut books: Vec<&LibraryBook> = snapshot.books.iter().filter(|b| scope.contains(b)).collect();
        books.sort_by_key(|b| b.library_id);

        for book in books {
            match index.insert(book) {
                Ok(()) => {}
                Err(reason) => {
                    index.skipped += 1;
                    tracing::warn!(
                        library_id = %book.library_id,
                        "Skipping library entry '{}': {}",
                        book.title,
                        reason
                    );
                }
            }
        }

        tracing::info!(
            "Library index built: {} entries, {} skipped in {:?}",
            index.entries.len(),
            index.skipped,
            start.elapsed()
        );

        index
    }

    fn insert(&mut self, book: &LibraryBook) -> Result<(), &'static str> {
        let uuid = book
            .uuid
            .as_deref()
            .map(normalize_uuid)
            .filter(|u| !u.is_empty())
            .ok_or("missing uuid")?;
        let title_normalized = normalize_title(&book.title);
        if title_normalized.is_empty() {
            return Err("empty title");
        }
        if self.entries.contains_key(&book.library_id) {
            return Err("duplicate library id");
        }
        if self.by_uuid.contains_key(&uuid) {
            return Err("duplicate uuid");
        }

        let entry = LibraryBookEntry {
            library_id: book.library_id,
            uuid: uuid.clone(),
            title: book.title.clone(),
            title_normalized: title_normalized.clone(),
            authors: book.authors.clone(),
            authors_normalized: book.authors.iter().map(|a| normalize_author(a)).collect(),
        };

        self.by_uuid.insert(uuid, book.library_id);
        match self.by_title.entry(title_normalized) {
            Entry::Vacant(slot) => {
                slot.insert(book.library_id);
            }
            Entry::Occupied(slot) => {
                tracing::debug!(
                    "Title '{}' shared by books {} and {}",
                    book.title,
                    slot.get(),
                    book.library_id
                );
            }
        }
        self.entries.insert(book.library_id, entry);
        Ok(())
    }

    /// Look up by Calibre uuid
    pub fn by_uuid(&self, uuid: &str) -> Option<&LibraryBookEntry> {
        self.by_uuid
            .get(&normalize_uuid(uuid))
            .and_then(|id| self.entries.get(id))
    }

    /// Look up by an already-normalized title
    pub fn by_title(&self, title_normalized: &str) -> Option<&LibraryBookEntry> {
        self.by_title
            .get(title_normalized)
            .and_then(|id| self.entries.get(id))
    }

    /// Look up by a display title
    pub fn find_title(&self, title: &str) -> Option<&LibraryBookEntry> {
        self.by_title(&normalize_title(title))
    }

    pub fn get(&self, library_id: LibraryId) -> Option<&LibraryBookEntry> {
        self.entries.get(&library_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &LibraryBookEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of library books rejected during the build
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Fingerprint of the library state this index was built from
    pub fn fingerprint(&self) -> &LibraryFingerprint {
        &self.fingerprint
    }
}

fn normalize_uuid(uuid: &str) -> String {
    uuid.trim().to_lowercase()
}
