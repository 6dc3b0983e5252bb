//! Location descriptor types

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of positional information a source reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Flat page, location or byte offset number
    Numeric,
    /// EPUB canonical fragment identifier
    Cfi,
    /// Element path into a spine item (Marvin-style)
    XPath,
    /// Printed page label, possibly roman or alphabetic front matter
    PageLabel,
    /// No positional data at all
    Unavailable,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Numeric => "numeric",
            SourceKind::Cfi => "cfi",
            SourceKind::XPath => "xpath",
            SourceKind::PageLabel => "page label",
            SourceKind::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}

/// A source-specific location, tagged with the kind it must be parsed as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocationDescriptor {
    /// "Location 449", "449-452", "1234"
    Numeric { value: String },
    /// `epubcfi(/6/4[chap01]!/4/10/2/1,:0,:26)`
    Cfi { value: String },
    /// `/x:html[1]/x:body[1]/x:div[1]/x:div[1]/x:p[3]/text()` within `section`
    #[serde(rename = "xpath")]
    XPath { section: u32, path: String, offset: u32 },
    /// "Page 17", "xiv", "b"
    PageLabel { value: String },
    /// Order by the annotation's modification time instead
    Unavailable,
}

impl LocationDescriptor {
    pub fn numeric(value: impl Into<String>) -> Self {
        LocationDescriptor::Numeric { value: value.into() }
    }

    pub fn cfi(value: impl Into<String>) -> Self {
        LocationDescriptor::Cfi { value: value.into() }
    }

    pub fn page_label(value: impl Into<String>) -> Self {
        LocationDescriptor::PageLabel { value: value.into() }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            LocationDescriptor::Numeric { .. } => SourceKind::Numeric,
            LocationDescriptor::Cfi { .. } => SourceKind::Cfi,
            LocationDescriptor::XPath { .. } => SourceKind::XPath,
            LocationDescriptor::PageLabel { .. } => SourceKind::PageLabel,
            LocationDescriptor::Unavailable => SourceKind::Unavailable,
        }
    }

    /// The descriptor as the source reported it
    pub fn raw(&self) -> String {
        match self {
            LocationDescriptor::Numeric { value }
            | LocationDescriptor::Cfi { value }
            | LocationDescriptor::PageLabel { value } => value.clone(),
            LocationDescriptor::XPath { section, path, offset } => {
                format!("section {} {} offset {}", section, path, offset)
            }
            LocationDescriptor::Unavailable => String::new(),
        }
    }
}

/// A descriptor that could not be parsed under its declared kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse {kind} location '{raw}': {reason}")]
pub struct LocationParseError {
    pub raw: String,
    pub kind: SourceKind,
    pub reason: String,
}

impl LocationParseError {
    pub fn new(descriptor: &LocationDescriptor, reason: impl Into<String>) -> Self {
        Self {
            raw: descriptor.raw(),
            kind: descriptor.kind(),
            reason: reason.into(),
        }
    }
}
