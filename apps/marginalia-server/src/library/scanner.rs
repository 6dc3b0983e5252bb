//! Library scanner for Calibre folder structure
//!
//! Walks a Calibre library on disk (`Author/Title (id)/metadata.opf`) and
//! produces a [`LibrarySnapshot`]. A folder that cannot be read or parsed is
//! logged and skipped; it never fails the scan.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::error::Result;

use super::book::{LibraryBook, LibraryFingerprint, LibraryId, LibrarySnapshot};
use super::metadata::CalibreMetadata;

const METADATA_FILE: &str = "metadata.opf";

/// Anything that can produce a library snapshot and a cheap change fingerprint
#[async_trait]
pub trait LibrarySource: Send + Sync {
    /// Digest of the current library state, without parsing metadata
    async fn fingerprint(&self) -> Result<LibraryFingerprint>;

    /// Full read of every book in the library
    async fn snapshot(&self) -> Result<LibrarySnapshot>;
}

/// Scanner for a Calibre library directory
pub struct LibraryScanner {
    root: PathBuf,
}

/// A `metadata.opf` found on disk, before parsing
#[derive(Debug)]
struct MetadataFile {
    library_id: LibraryId,
    folder: String,
    path: PathBuf,
    size: u64,
    modified: Option<DateTime<Utc>>,
}

impl LibraryScanner {
    /// Create a new library scanner
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scan the entire library and return all books
    pub async fn scan_library(&self) -> Result<LibrarySnapshot> {
        tracing::info!("Starting library scan of {}", self.root.display());
        let start = Instant::now();

        let files = self.list_metadata_files().await?;
        tracing::info!("Found {} book folders", files.len());

        let fingerprint = fingerprint_of(&files);
        let mut books = Vec::with_capacity(files.len());

        for file in &files {
            match self.process_book_folder(file).await {
                Ok(book) => books.push(book),
                Err(e) => {
                    tracing::warn!("Error processing folder {}: {}", file.folder, e);
                }
            }
        }

        tracing::info!(
            "Library scan complete: {} books in {:?}",
            books.len(),
            start.elapsed()
        );

        Ok(LibrarySnapshot { books, fingerprint })
    }

    /// Compute the fingerprint of the library without parsing any metadata
    pub async fn compute_fingerprint(&self) -> Result<LibraryFingerprint> {
        let files = self.list_metadata_files().await?;
        Ok(fingerprint_of(&files))
    }

    /// Collect `Author/Title (id)/metadata.opf` entries, sorted by folder
    async fn list_metadata_files(&self) -> Result<Vec<MetadataFile>> {
        let mut files = Vec::new();
        let mut authors = tokio::fs::read_dir(&self.root).await?;

        loop {
            let author_dir = match authors.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Cannot list library root {}: {}", self.root.display(), e);
                    break;
                }
            };
            let author_name = author_dir.file_name().to_string_lossy().into_owned();
            match author_dir.file_type().await {
                Ok(file_type) if file_type.is_dir() => {}
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("Cannot stat {}: {}", author_name, e);
                    continue;
                }
            }

            let mut titles = match tokio::fs::read_dir(author_dir.path()).await {
                Ok(titles) => titles,
                Err(e) => {
                    tracing::warn!("Cannot read author folder {}: {}", author_name, e);
                    continue;
                }
            };

            loop {
                let title_dir = match titles.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Cannot list author folder {}: {}", author_name, e);
                        break;
                    }
                };
                let title_name = title_dir.file_name().to_string_lossy().into_owned();
                let Some(library_id) = parse_book_id(&title_name) else {
                    tracing::debug!("Skipping folder without book id: {}/{}", author_name, title_name);
                    continue;
                };

                let path = title_dir.path().join(METADATA_FILE);
                let meta = match tokio::fs::metadata(&path).await {
                    Ok(meta) => meta,
                    Err(_) => {
                        tracing::debug!("No {} in {}/{}", METADATA_FILE, author_name, title_name);
                        continue;
                    }
                };

                let modified = meta.modified().ok().map(DateTime::<Utc>::from);

                files.push(MetadataFile {
                    library_id,
                    folder: format!("{}/{}", author_name, title_name),
                    path,
                    size: meta.len(),
                    modified,
                });
            }
        }

        files.sort_by(|a, b| a.folder.cmp(&b.folder));
        Ok(files)
    }

    /// Read and parse a single book folder
    async fn process_book_folder(&self, file: &MetadataFile) -> Result<LibraryBook> {
        let xml = tokio::fs::read_to_string(&file.path).await?;
        let meta = CalibreMetadata::parse(&xml)?;

        let fallback_title = file
            .folder
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once(" ("))
            .map(|(title, _)| title.to_string())
            .unwrap_or_default();

        let mut book = LibraryBook::new(
            file.library_id,
            meta.title.clone().unwrap_or(fallback_title),
            file.folder.clone(),
        );
        book.uuid = meta.uuid().map(str::to_string);
        book.title_sort = meta.title_sort;
        book.authors = meta.authors;
        book.author_sort = meta.author_sort;
        book.tags = meta.tags;
        book.identifiers = meta.identifiers;
        book.modified_at = file.modified;

        Ok(book)
    }
}

#[async_trait]
impl LibrarySource for LibraryScanner {
    async fn fingerprint(&self) -> Result<LibraryFingerprint> {
        self.compute_fingerprint().await
    }

    async fn snapshot(&self) -> Result<LibrarySnapshot> {
        self.scan_library().await
    }
}

/// Extract the numeric id from a Calibre book folder name, `Title (123)`
fn parse_book_id(folder_name: &str) -> Option<LibraryId> {
    let (_, suffix) = folder_name.rsplit_once(" (")?;
    let digits = suffix.strip_suffix(')')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(LibraryId::new)
}

/// MD5 over the sorted `(path, mtime, size)` of every metadata file
fn fingerprint_of(files: &[MetadataFile]) -> LibraryFingerprint {
    let mut context = md5::Context::new();
    for file in files {
        let mtime = file
            .modified
            .map(|m| m.timestamp_nanos_opt().unwrap_or_default())
            .unwrap_or_default();
        context.consume(format!("{}\t{}\t{}\n", file.folder, mtime, file.size).as_bytes());
    }
    LibraryFingerprint::new(format!("{:x}", context.compute()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn opf(title: &str, author: &str, uuid: &str) -> String {
        format!(
            r#"<?xml version='1.0' encoding='utf-8'?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
    <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
        <dc:identifier opf:scheme="uuid" id="uuid_id">{uuid}</dc:identifier>
        <dc:title>{title}</dc:title>
        <dc:creator opf:role="aut">{author}</dc:creator>
    </metadata>
</package>"#
        )
    }

    fn add_book(root: &Path, author: &str, folder: &str, xml: &str) {
        let dir = root.join(author).join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(METADATA_FILE), xml).unwrap();
    }

    #[test]
    fn test_parse_book_id() {
        assert_eq!(parse_book_id("Dune (12)"), Some(LibraryId::new(12)));
        assert_eq!(parse_book_id("Title (with parens) (3)"), Some(LibraryId::new(3)));
        assert_eq!(parse_book_id("Dune"), None);
        assert_eq!(parse_book_id("Dune (draft)"), None);
    }

    #[tokio::test]
    async fn test_scan_library() {
        let dir = tempfile::tempdir().unwrap();
        add_book(dir.path(), "Frank Herbert", "Dune (1)", &opf("Dune", "Frank Herbert", "u-1"));
        add_book(
            dir.path(),
            "Ursula K. Le Guin",
            "The Dispossessed (2)",
            &opf("The Dispossessed", "Ursula K. Le Guin", "u-2"),
        );
        add_book(dir.path(), "Broken", "Bad (3)", "<package><metadata>");
        fs::create_dir_all(dir.path().join("Loose").join("No id here")).unwrap();

        let scanner = LibraryScanner::new(dir.path());
        let snapshot = scanner.scan_library().await.unwrap();

        assert_eq!(snapshot.books.len(), 2);
        let dune = &snapshot.books[0];
        assert_eq!(dune.library_id, LibraryId::new(1));
        assert_eq!(dune.uuid.as_deref(), Some("u-1"));
        assert_eq!(dune.authors, vec!["Frank Herbert".to_string()]);
        assert_eq!(dune.path, "Frank Herbert/Dune (1)");
    }

    #[tokio::test]
    async fn test_fingerprint_tracks_changes() {
        let dir = tempfile::tempdir().unwrap();
        add_book(dir.path(), "A", "One (1)", &opf("One", "A", "u-1"));

        let scanner = LibraryScanner::new(dir.path());
        let first = scanner.compute_fingerprint().await.unwrap();
        assert_eq!(first, scanner.compute_fingerprint().await.unwrap());
        assert_eq!(first, scanner.scan_library().await.unwrap().fingerprint);

        add_book(dir.path(), "B", "Two (2)", &opf("Two", "B", "u-2"));
        assert_ne!(first, scanner.compute_fingerprint().await.unwrap());
    }
}
