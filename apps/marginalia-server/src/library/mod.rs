//! Library module
//!
//! Handles Calibre library scanning, metadata parsing, and the identity index
//! used to match imported books against the library.

mod book;
mod cache;
mod index;
mod metadata;
mod normalize;
mod scanner;

#[cfg(test)]
pub(crate) mod testing;

pub use book::*;
pub use cache::LibraryIndexCache;
pub use index::{LibraryBookEntry, LibraryIndex};
pub use metadata::CalibreMetadata;
pub use normalize::{normalize_author, normalize_title, split_authors};
pub use scanner::{LibraryScanner, LibrarySource};
