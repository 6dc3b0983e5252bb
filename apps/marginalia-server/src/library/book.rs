//! Library book types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Stable numeric id of a book in the target library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryId(i64);

impl LibraryId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A book in the Calibre library, as read from disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryBook {
    /// Calibre book id (the `(id)` suffix of the book folder)
    pub library_id: LibraryId,

    /// Calibre uuid, if the metadata carries one
    pub uuid: Option<String>,

    /// Book title
    pub title: String,

    /// Title sort key
    pub title_sort: Option<String>,

    /// Authors in metadata order
    pub authors: Vec<String>,

    /// Author sort name (e.g., "Lastname, Firstname")
    pub author_sort: Option<String>,

    /// Tags/genres
    pub tags: Vec<String>,

    /// Identifiers (isbn, uuid, amazon, etc.)
    pub identifiers: HashMap<String, String>,

    /// Folder relative to the library root (Author/Title (id))
    pub path: String,

    /// Modification time of the book's metadata.opf
    pub modified_at: Option<DateTime<Utc>>,
}

impl LibraryBook {
    /// Create a new book with minimal information
    pub fn new(library_id: LibraryId, title: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            library_id,
            uuid: None,
            title: title.into(),
            title_sort: None,
            authors: Vec::new(),
            author_sort: None,
            tags: Vec::new(),
            identifiers: HashMap::new(),
            path: path.into(),
            modified_at: None,
        }
    }

    /// Primary author
    pub fn author(&self) -> Option<&str> {
        self.authors.first().map(String::as_str)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Opaque digest over the library's on-disk state
///
/// Two scans of an unchanged library produce the same fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryFingerprint(String);

impl LibraryFingerprint {
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LibraryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every book visible in the library at one point in time
#[derive(Debug, Clone, Default)]
pub struct LibrarySnapshot {
    pub books: Vec<LibraryBook>,
    pub fingerprint: LibraryFingerprint,
}

/// Restricts which library books are candidates for matching
///
/// An empty tag list means the whole library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryScope {
    pub include_tags: Vec<String>,
}

impl LibraryScope {
    pub fn whole_library() -> Self {
        Self::default()
    }

    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include_tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, book: &LibraryBook) -> bool {
        self.include_tags.is_empty() || self.include_tags.iter().any(|tag| book.has_tag(tag))
    }
}
