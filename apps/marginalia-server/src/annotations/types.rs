//! Canonical annotation and book records
//!
//! These are the interchange shapes shared with producers (per-app parsers,
//! device readers) and with the storage layer. A field a source cannot
//! provide is carried as `None` and serialized as `null`, never dropped, so
//! consumers can tell "absent" from "empty".

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::hash::content_hash;
use crate::library::LibraryId;

/// Seconds since the Unix epoch (fractional seconds allowed)
///
/// Ordering and equality use the IEEE total order so timestamps can key
/// ordered maps.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(f64);

impl Timestamp {
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_micros()) / 1_000_000.0)
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn as_secs(self) -> f64 {
        self.0
    }

    /// Convert to a UTC datetime, if the value is representable
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        if !self.0.is_finite() {
            return None;
        }
        let secs = self.0.floor();
        let nanos = ((self.0 - secs) * 1_000_000_000.0).round() as u32;
        Utc.timestamp_opt(secs as i64, nanos.min(999_999_999)).single()
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Timestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{:.0}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Highlight color as reported by the reader app
///
/// Named colors cover what the supported apps emit; anything else that looks
/// like a CSS hex color is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HighlightColor {
    Blue,
    #[default]
    Gray,
    Green,
    Pink,
    Purple,
    Red,
    Underline,
    Yellow,
    /// `#rgb`, `#rgba`, `#rrggbb` or `#rrggbbaa`
    Custom(String),
}

impl HighlightColor {
    /// Parse a color name or hex value. Unknown names fall back to gray.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        match value.to_ascii_lowercase().as_str() {
            "blue" => HighlightColor::Blue,
            "gray" | "grey" => HighlightColor::Gray,
            "green" => HighlightColor::Green,
            "pink" => HighlightColor::Pink,
            "purple" => HighlightColor::Purple,
            "red" => HighlightColor::Red,
            "underline" => HighlightColor::Underline,
            "yellow" => HighlightColor::Yellow,
            _ if is_hex_color(value) => HighlightColor::Custom(value.to_string()),
            _ => {
                tracing::debug!("Unknown highlight color '{}', using gray", value);
                HighlightColor::Gray
            }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HighlightColor::Blue => "Blue",
            HighlightColor::Gray => "Gray",
            HighlightColor::Green => "Green",
            HighlightColor::Pink => "Pink",
            HighlightColor::Purple => "Purple",
            HighlightColor::Red => "Red",
            HighlightColor::Underline => "Underline",
            HighlightColor::Yellow => "Yellow",
            HighlightColor::Custom(hex) => hex,
        }
    }
}

fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(digits) => {
            matches!(digits.len(), 3 | 4 | 6 | 8) && digits.chars().all(|c| c.is_ascii_hexdigit())
        }
        None => false,
    }
}

impl From<String> for HighlightColor {
    fn from(value: String) -> Self {
        HighlightColor::parse(&value)
    }
}

impl From<HighlightColor> for String {
    fn from(color: HighlightColor) -> Self {
        color.as_str().to_string()
    }
}

impl fmt::Display for HighlightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single highlight, note, or annotated bookmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// Source-assigned id, if the reader app has one
    #[serde(default)]
    pub annotation_id: Option<String>,
    /// Source-local book id (unique only within its producer)
    pub book_id: String,
    #[serde(default)]
    pub highlight_color: HighlightColor,
    /// Highlighted passage, one entry per paragraph
    #[serde(default)]
    pub highlight_text: Option<Vec<String>>,
    /// User note, one entry per paragraph
    #[serde(default)]
    pub note_text: Option<Vec<String>>,
    /// Human-readable location ("Page 17", chapter title, ...)
    #[serde(default)]
    pub location: Option<String>,
    /// Fixed-width key; lexical order is reading order
    #[serde(default)]
    pub location_sort: String,
    pub last_modification: Timestamp,
    /// MD5 over highlight and note text, see [`content_hash`]
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub reader_app: Option<String>,
}

impl AnnotationRecord {
    /// Create an empty record for a book
    pub fn new(book_id: impl Into<String>, last_modification: Timestamp) -> Self {
        Self {
            annotation_id: None,
            book_id: book_id.into(),
            highlight_color: HighlightColor::default(),
            highlight_text: None,
            note_text: None,
            location: None,
            location_sort: String::new(),
            last_modification,
            content_hash: None,
            genre: None,
            reader_app: None,
        }
    }

    pub fn with_highlight<I, S>(mut self, paragraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.highlight_text = Some(paragraphs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_note<I, S>(mut self, paragraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.note_text = Some(paragraphs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>, location_sort: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self.location_sort = location_sort.into();
        self
    }

    pub fn with_color(mut self, color: HighlightColor) -> Self {
        self.highlight_color = color;
        self
    }

    /// True when either the highlight or the note has visible text
    pub fn has_content(&self) -> bool {
        fn non_blank(paragraphs: &Option<Vec<String>>) -> bool {
            paragraphs
                .as_ref()
                .map(|p| p.iter().any(|s| !s.trim().is_empty()))
                .unwrap_or(false)
        }
        non_blank(&self.highlight_text) || non_blank(&self.note_text)
    }

    /// Hash of the textual content; never depends on color or timestamps
    pub fn compute_hash(&self) -> String {
        content_hash(self.highlight_text.as_deref(), self.note_text.as_deref())
    }

    /// Fill in `content_hash` if the producer did not supply one
    ///
    /// An existing hash is kept: stored records must keep the identity they
    /// were first persisted with.
    pub fn ensure_hash(&mut self) -> &str {
        if self.content_hash.is_none() {
            self.content_hash = Some(self.compute_hash());
        }
        self.content_hash.as_deref().unwrap_or_default()
    }
}

/// Book metadata as reported by a producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Producer-local id
    pub book_id: String,
    pub title: String,
    #[serde(default)]
    pub title_sort: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub author_sort: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
    /// Comma separated genre list
    #[serde(default)]
    pub genre: Option<String>,
    /// Filled in by the producer when the payload leaves it out
    #[serde(default)]
    pub reader_app: String,
    #[serde(default)]
    pub last_update: Option<Timestamp>,
    /// Library id from an earlier match or an explicit user selection
    #[serde(default)]
    pub resolved_library_id: Option<LibraryId>,
}

impl BookRecord {
    pub fn new(book_id: impl Into<String>, title: impl Into<String>, reader_app: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            title: title.into(),
            title_sort: None,
            author: None,
            author_sort: None,
            uuid: None,
            genre: None,
            reader_app: reader_app.into(),
            last_update: None,
            resolved_library_id: None,
        }
    }

    pub fn genres(&self) -> impl Iterator<Item = &str> {
        self.genre
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
    }

    pub fn is_news(&self) -> bool {
        self.genres().any(|g| g == "News")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parsing() {
        assert_eq!(HighlightColor::parse("yellow"), HighlightColor::Yellow);
        assert_eq!(HighlightColor::parse(" Blue "), HighlightColor::Blue);
        assert_eq!(
            HighlightColor::parse("#A1b2C3"),
            HighlightColor::Custom("#A1b2C3".to_string())
        );
        assert_eq!(HighlightColor::parse("#12345"), HighlightColor::Gray);
        assert_eq!(HighlightColor::parse("chartreuse"), HighlightColor::Gray);
    }

    #[test]
    fn test_color_serde_as_string() {
        let json = serde_json::to_string(&HighlightColor::Pink).unwrap();
        assert_eq!(json, "\"Pink\"");
        let color: HighlightColor = serde_json::from_str("\"#fff\"").unwrap();
        assert_eq!(color, HighlightColor::Custom("#fff".to_string()));
    }

    #[test]
    fn test_has_content() {
        let ts = Timestamp::from_secs(1.0);
        assert!(!AnnotationRecord::new("1", ts).has_content());
        assert!(!AnnotationRecord::new("1", ts).with_highlight(["  "]).has_content());
        assert!(AnnotationRecord::new("1", ts).with_note(["a note"]).has_content());
    }

    #[test]
    fn test_ensure_hash_keeps_existing() {
        let mut record = AnnotationRecord::new("1", Timestamp::from_secs(1.0)).with_highlight(["text"]);
        record.content_hash = Some("stored".to_string());
        assert_eq!(record.ensure_hash(), "stored");

        record.content_hash = None;
        let computed = record.ensure_hash().to_string();
        assert_eq!(computed, record.compute_hash());
    }

    #[test]
    fn test_absent_fields_serialize_as_null() {
        let record = AnnotationRecord::new("7", Timestamp::from_secs(10.0));
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("note_text").unwrap().is_null());
        assert!(value.get("location").unwrap().is_null());
        assert_eq!(value["last_modification"], serde_json::json!(10.0));
    }

    #[test]
    fn test_timestamp_ordering_and_display() {
        let a = Timestamp::from_secs(1_354_608_900.0);
        let b = Timestamp::from_secs(1_354_608_900.5);
        assert!(a < b);
        assert_eq!(a.to_string(), "1354608900");
        assert_eq!(b.to_string(), "1354608900.5");
        assert_eq!(a.to_datetime().unwrap().timestamp(), 1_354_608_900);
    }

    #[test]
    fn test_book_genres() {
        let mut book = BookRecord::new("1", "Daily", "Kindle");
        book.genre = Some("Periodical, News".to_string());
        assert_eq!(book.genres().collect::<Vec<_>>(), vec!["Periodical", "News"]);
        assert!(book.is_news());
    }
}
