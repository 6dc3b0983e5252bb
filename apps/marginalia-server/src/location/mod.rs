//! Location sort keys
//!
//! Turns heterogeneous source locations (flat numbers, EPUB CFIs, reader
//! XPaths, printed page labels) into fixed-width strings whose lexical order
//! is the reading order.

mod cfi;
mod generator;
mod ordinal;
mod types;
mod xpath;

pub use cfi::{parse as parse_cfi, CfiParseError, CfiPosition};
pub use generator::{chronological, LocationSortKeyGenerator, DEFAULT_FLAT_WIDTH, DEFAULT_MAX_ELEMENT_DEPTH};
pub use ordinal::{alphabetic_to_int, roman_to_int};
pub use types::{LocationDescriptor, LocationParseError, SourceKind};
