//! Marginalia Server Library
//!
//! Imports reading annotations from e-reader apps, matches their books
//! against a Calibre library and keeps one reconciled annotation set per
//! library book.
//!
//! # Modules
//!
//! - `library`: Calibre scanning and the identity index
//! - `matching`: confidence-ranked book matching
//! - `location`: device-independent location sort keys
//! - `merge`: annotation set reconciliation
//! - `producers`: reader app adapters
//! - `import`: the batch pipeline tying the above together
//! - `render`: HTML and text output, and capture of rendered HTML

pub mod annotations;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod library;
pub mod location;
pub mod matching;
pub mod merge;
pub mod producers;
pub mod render;
pub mod routes;
pub mod state;
