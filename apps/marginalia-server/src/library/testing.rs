//! In-memory library for tests

use async_trait::async_trait;

use crate::error::Result;

use super::{LibraryBook, LibraryFingerprint, LibraryId, LibrarySnapshot, LibrarySource};

/// A fixed set of books with a fixed fingerprint
pub struct StaticLibrary {
    pub books: Vec<LibraryBook>,
    pub fingerprint: LibraryFingerprint,
}

impl StaticLibrary {
    pub fn new(books: Vec<LibraryBook>) -> Self {
        Self {
            books,
            fingerprint: LibraryFingerprint::new("static"),
        }
    }
}

/// Library book with a uuid and a single author
pub fn book(id: i64, title: &str, author: &str, uuid: &str) -> LibraryBook {
    let mut book = LibraryBook::new(LibraryId::new(id), title, format!("{}/{} ({})", author, title, id));
    book.authors = vec![author.to_string()];
    book.uuid = Some(uuid.to_string());
    book
}

#[async_trait]
impl LibrarySource for StaticLibrary {
    async fn fingerprint(&self) -> Result<LibraryFingerprint> {
        Ok(self.fingerprint.clone())
    }

    async fn snapshot(&self) -> Result<LibrarySnapshot> {
        Ok(LibrarySnapshot {
            books: self.books.clone(),
            fingerprint: self.fingerprint.clone(),
        })
    }
}
