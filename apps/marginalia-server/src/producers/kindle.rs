//! Kindle "My Clippings.txt" producer
//!
//! Records are separated by a `==========` line:
//!
//! ```text
//! Moby Dick (Herman Melville)
//! - Your Highlight on page 12 | Location 180-182 | Added on Thursday, April 25, 2013 11:57:54 PM
//!
//! Call me Ishmael.
//! ==========
//! ```
//!
//! Only English status lines are understood. Bookmarks and records whose
//! status line cannot be read are skipped; a block that does not look like
//! a record at all is text that happened to contain the separator and is
//! joined back to the previous record.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::annotations::{AnnotationRecord, BookRecord, Timestamp};
use crate::location::LocationDescriptor;

use super::{AnnotationProducer, BookAnnotations, ProducerError, RawAnnotation};

pub const READER_APP: &str = "Kindle";

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september", "october",
    "november", "december",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClippingKind {
    Highlight,
    Note,
    Bookmark,
}

/// One parsed record of the clippings file
#[derive(Debug, Clone, PartialEq)]
struct Clipping {
    book_line: String,
    title: String,
    author: Option<String>,
    kind: ClippingKind,
    begin: Option<u64>,
    end: Option<u64>,
    page: Option<u64>,
    added_on: Option<Timestamp>,
    text: String,
}

fn separator_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^==========\n").expect("separator pattern is valid"))
}

fn record_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)\A\s*(\S[^\n]*)\n-\s+([^\n|]+\|[^\n]+)\n\s*\n(.*)\n\z").expect("record pattern is valid")
    })
}

fn location_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [r"\sLocation\s*", r"\slocation\s*", r"\sLoc\.\s*"].map(|prefix| {
            Regex::new(&format!("{}([0-9][0-9,.-]*[0-9]|[0-9])", prefix)).expect("location pattern is valid")
        })
    })
}

fn page_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s[Pp]age\s*([0-9][0-9,.]*[0-9]|[0-9])").expect("page pattern is valid"))
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)([0-2]?[0-9])[.:]([0-5][0-9])(?::([0-5][0-9])(?:\.([0-9]+))?)?\s*([AP]\.?M)?\s*(?:[A-Z]{3}?([+-][0-2]?[0-9](?::[0-5][0-9])?))?",
        )
        .expect("time pattern is valid")
    })
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]+").expect("number pattern is valid"))
}

/// Producer over the text of a "My Clippings.txt" file
#[derive(Debug, Clone, Default)]
pub struct KindleClippingsProducer {
    clippings: Vec<Clipping>,
}

pub(super) fn open(payload: &str) -> Result<Box<dyn AnnotationProducer>, ProducerError> {
    Ok(Box::new(KindleClippingsProducer::from_payload(payload)?))
}

impl KindleClippingsProducer {
    pub fn from_payload(payload: &str) -> Result<Self, ProducerError> {
        Ok(Self {
            clippings: parse_clippings(payload),
        })
    }

    /// Distinct books in first-seen order
    fn books(&self) -> Vec<BookRecord> {
        let mut books: Vec<BookRecord> = Vec::new();
        for clipping in &self.clippings {
            let last_update = clipping.added_on;
            match books.iter_mut().find(|b| b.book_id == clipping.book_line) {
                Some(book) => {
                    if last_update > book.last_update {
                        book.last_update = last_update;
                    }
                }
                None => {
                    let mut book = BookRecord::new(&clipping.book_line, &clipping.title, READER_APP);
                    book.author = clipping.author.clone();
                    book.last_update = last_update;
                    books.push(book);
                }
            }
        }
        books
    }
}

#[async_trait]
impl AnnotationProducer for KindleClippingsProducer {
    fn reader_app(&self) -> &str {
        READER_APP
    }

    async fn installed_books(&self) -> Result<Vec<BookRecord>, ProducerError> {
        Ok(self.books())
    }

    async fn active_annotations(&self) -> Result<Vec<BookAnnotations>, ProducerError> {
        let mut result: Vec<BookAnnotations> = self
            .books()
            .into_iter()
            .map(|book| BookAnnotations {
                book,
                annotations: Vec::new(),
            })
            .collect();

        for clipping in &self.clippings {
            let Some(raw) = to_raw_annotation(clipping) else {
                continue;
            };
            if let Some(entry) = result.iter_mut().find(|e| e.book.book_id == clipping.book_line) {
                entry.annotations.push(raw);
            }
        }

        result.retain(|entry| !entry.annotations.is_empty());
        Ok(result)
    }
}

fn to_raw_annotation(clipping: &Clipping) -> Option<RawAnnotation> {
    if clipping.kind == ClippingKind::Bookmark {
        return None;
    }
    let Some(added_on) = clipping.added_on else {
        tracing::warn!(book_id = %clipping.book_line, "Skipping clipping without a readable date");
        return None;
    };

    let paragraphs: Vec<String> = clipping.text.split('\n').map(|line| line.trim().to_string()).collect();
    let mut record = AnnotationRecord::new(&clipping.book_line, added_on);
    record.reader_app = Some(READER_APP.to_string());
    match clipping.kind {
        ClippingKind::Highlight => record.highlight_text = Some(paragraphs),
        _ => record.note_text = Some(paragraphs),
    }

    let descriptor = match (clipping.begin, clipping.page) {
        (Some(begin), _) => {
            record.location = Some(match clipping.end {
                Some(end) if end != begin => format!("Location {}-{}", begin, end),
                _ => format!("Location {}", begin),
            });
            Some(LocationDescriptor::numeric(begin.to_string()))
        }
        (None, Some(page)) => {
            record.location = Some(format!("Page {}", page));
            Some(LocationDescriptor::numeric(page.to_string()))
        }
        (None, None) => None,
    };

    Some(RawAnnotation::new(record, descriptor))
}

fn parse_clippings(text: &str) -> Vec<Clipping> {
    let mut text = text.replace('\u{feff}', "").replace("\r\n", "\n").replace('\r', "\n");
    if text.trim().is_empty() {
        return Vec::new();
    }
    if !text.ends_with('\n') {
        text.push('\n');
    }

    let mut records: Vec<&str> = separator_pattern().split(&text).collect();
    if records.last().is_some_and(|r| r.trim().is_empty()) {
        records.pop();
    } else {
        tracing::warn!("Clippings file does not end with a separator");
    }

    let mut clippings: Vec<Clipping> = Vec::new();
    for record in records {
        let Some(captures) = record_pattern().captures(record) else {
            match clippings.last_mut() {
                Some(previous) => {
                    tracing::debug!("Joining unparseable block to the previous clipping");
                    previous.text.push_str("\n==========\n");
                    previous.text.push_str(record.trim_end_matches('\n'));
                }
                None => tracing::warn!("Clippings file does not start with a record"),
            }
            continue;
        };

        let book_line = captures[1].trim().to_string();
        let status = &captures[2];
        let Some(split) = status.rfind('|') else {
            continue;
        };
        let (head, date) = (&status[..split], &status[split + 1..]);

        let Some(kind) = detect_kind(head) else {
            tracing::warn!("Unrecognized clipping status line '{}'", status);
            continue;
        };

        let (title, author) = title_and_author(&book_line);
        let (begin, end, page) = parse_location(head);
        clippings.push(Clipping {
            title,
            author,
            book_line,
            kind,
            begin,
            end,
            page,
            added_on: parse_added_on(date),
            text: captures[3].to_string(),
        });
    }

    tracing::debug!("Parsed {} clippings", clippings.len());
    clippings
}

fn detect_kind(status: &str) -> Option<ClippingKind> {
    let words: Vec<&str> = status.split_whitespace().take(3).collect();
    (1..=words.len()).find_map(|n| match words[..n].join(" ").as_str() {
        "Your Highlight" | "Highlight" => Some(ClippingKind::Highlight),
        "Your Note" | "Note" => Some(ClippingKind::Note),
        "Your Bookmark" | "Bookmark" => Some(ClippingKind::Bookmark),
        _ => None,
    })
}

/// Split `Title (Author)` on the last balanced parenthesized group
///
/// A line made only of a parenthesized group, or one that does not end in
/// `)`, is all title.
fn title_and_author(line: &str) -> (String, Option<String>) {
    if let Some(inner) = line.strip_suffix(')') {
        let mut depth = 1;
        for (i, c) in inner.char_indices().rev() {
            match c {
                ')' => depth += 1,
                '(' => {
                    depth -= 1;
                    if depth == 0 {
                        let title = inner[..i].trim();
                        if title.is_empty() {
                            break;
                        }
                        return (title.to_string(), Some(inner[i + 1..].trim().to_string()));
                    }
                }
                _ => {}
            }
        }
    }
    (line.to_string(), None)
}

fn parse_number(digits: &str) -> Option<u64> {
    digits.replace([',', '.'], "").parse().ok()
}

/// Location range and page number from the part of the status line before the date
fn parse_location(status: &str) -> (Option<u64>, Option<u64>, Option<u64>) {
    let mut status = status.to_string();
    let (mut begin, mut end, mut page) = (None, None, None);

    for pattern in location_patterns() {
        let matches: Vec<_> = pattern.captures_iter(&status).collect();
        if matches.len() != 1 {
            continue;
        }
        let location = matches[0][1].replace([',', '.'], "");
        match location.split_once('-') {
            Some((first, last)) => {
                // "1024-25" means 1024-1025
                let last = if last.len() < first.len() {
                    format!("{}{}", &first[..first.len() - last.len()], last)
                } else {
                    last.to_string()
                };
                begin = first.parse().ok();
                end = last.parse().ok();
            }
            None => {
                begin = location.parse().ok();
                end = begin;
            }
        }
        status = pattern.replace_all(&status, " ").into_owned();
        break;
    }

    let pages: Vec<_> = page_pattern().captures_iter(&status).collect();
    if pages.len() == 1 {
        page = parse_number(&pages[0][1]);
        status = page_pattern().replace_all(&status, " ").into_owned();
    }

    if begin.is_none() != page.is_none() {
        let numbers: Vec<&str> = number_pattern().find_iter(&status).map(|m| m.as_str()).collect();
        if numbers.len() == 1 {
            let number = numbers[0].parse().ok();
            if begin.is_none() {
                begin = number;
                end = number;
            } else {
                page = number;
            }
        }
    }

    (begin, end, page)
}

fn month_number(word: &str) -> Option<u32> {
    let word = word.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == word)
        .or_else(|| MONTHS.iter().position(|m| word.len() == 3 && m.starts_with(&word)))
        .map(|i| i as u32 + 1)
}

/// Parse the `Added on ...` part of the status line (read as UTC)
///
/// Accepts both "Thursday, April 25, 2013 11:57:54 PM" and
/// "Thursday, 25 April 13 23:45:11"; a two-digit year is in the 2000s.
fn parse_added_on(date: &str) -> Option<Timestamp> {
    let (mut hour, mut minute, mut second, mut micro) = (0u32, 0u32, 0u32, 0u32);
    let mut rest = date.to_string();

    if let Some(c) = time_pattern().captures(date) {
        hour = c[1].parse().ok()?;
        minute = c[2].parse().ok()?;
        if let Some(s) = c.get(3) {
            second = s.as_str().parse().ok()?;
        }
        if let Some(fraction) = c.get(4) {
            let scaled: f64 = format!("0.{}", fraction.as_str()).parse().ok()?;
            micro = (scaled * 1_000_000.0) as u32;
        }
        if let Some(meridiem) = c.get(5) {
            let pm = meridiem.as_str().replace('.', "").eq_ignore_ascii_case("PM");
            if pm && hour < 12 {
                hour += 12;
            } else if !pm && hour == 12 {
                hour = 0;
            }
        }
        rest = time_pattern().replace_all(date, " ").into_owned();
    }

    let month = rest
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .find_map(month_number)?;

    let numbers: Vec<u32> = number_pattern()
        .find_iter(&rest)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    if numbers.len() != 2 || numbers.iter().min().copied()? > 31 {
        return None;
    }
    let (day, mut year) = if numbers[0] > 31 {
        (numbers[1], numbers[0])
    } else {
        (numbers[0], numbers[1])
    };
    if year < 100 {
        year += 2000;
    }

    let naive = NaiveDate::from_ymd_opt(year as i32, month, day)?.and_hms_micro_opt(hour, minute, second, micro)?;
    Some(Timestamp::from_datetime(Utc.from_utc_datetime(&naive)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIPPINGS: &str = "\u{feff}Moby Dick (Herman Melville)\r\n\
- Your Highlight on page 12 | Location 180-82 | Added on Thursday, April 25, 2013 11:57:54 PM\r\n\
\r\n\
Call me Ishmael.\r\n\
==========\r\n\
Moby Dick (Herman Melville)\r\n\
- Your Bookmark Location 447 | Added on Thursday, 25 April 13 23:45:00\r\n\
\r\n\
\r\n\
==========\r\n\
Collected Essays (Orwell, George (Editor))\r\n\
- Your Note Location 20 | Added on Thursday, 25 April 13 23:45:11\r\n\
\r\n\
First line\r\n\
==========\r\n\
This block has no status line\r\n\
==========\r\n";

    fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Option<Timestamp> {
        let naive = NaiveDate::from_ymd_opt(y, mo, d).unwrap().and_hms_opt(h, mi, s).unwrap();
        Some(Timestamp::from_datetime(Utc.from_utc_datetime(&naive)))
    }

    #[test]
    fn test_parse_clippings() {
        let clippings = parse_clippings(CLIPPINGS);
        assert_eq!(clippings.len(), 3);

        let first = &clippings[0];
        assert_eq!(first.title, "Moby Dick");
        assert_eq!(first.author.as_deref(), Some("Herman Melville"));
        assert_eq!(first.kind, ClippingKind::Highlight);
        assert_eq!((first.begin, first.end, first.page), (Some(180), Some(182), Some(12)));
        assert_eq!(first.added_on, ts(2013, 4, 25, 23, 57, 54));
        assert_eq!(first.text, "Call me Ishmael.");

        assert_eq!(clippings[1].kind, ClippingKind::Bookmark);

        let note = &clippings[2];
        assert_eq!(note.title, "Collected Essays");
        assert_eq!(note.author.as_deref(), Some("Orwell, George (Editor)"));
        assert_eq!(note.added_on, ts(2013, 4, 25, 23, 45, 11));
        assert_eq!(note.text, "First line\n==========\nThis block has no status line");
    }

    #[test]
    fn test_title_and_author() {
        assert_eq!(title_and_author("Plain Title"), ("Plain Title".to_string(), None));
        assert_eq!(
            title_and_author("(Only Parens)"),
            ("(Only Parens)".to_string(), None)
        );
        assert_eq!(
            title_and_author("Dune (Frank Herbert)"),
            ("Dune".to_string(), Some("Frank Herbert".to_string()))
        );
    }

    #[test]
    fn test_parse_location_variants() {
        assert_eq!(parse_location("Your Highlight Location 1,024-25 "), (Some(1024), Some(1025), None));
        assert_eq!(parse_location("Highlight Loc. 143-46  "), (Some(143), Some(146), None));
        assert_eq!(parse_location("Your Bookmark on Page 87  "), (None, None, Some(87)));
        assert_eq!(parse_location("Bookmark on Page 415 | Loc. 6353  "), (Some(6353), Some(6353), Some(415)));
    }

    #[test]
    fn test_parse_added_on_formats() {
        assert_eq!(
            parse_added_on(" Added on Sunday, February 06, 2011, 10:03 AM"),
            ts(2011, 2, 6, 10, 3, 0)
        );
        assert_eq!(
            parse_added_on(" Added on Friday, 6 July 12 07:37:42 GMT+01:00"),
            ts(2012, 7, 6, 7, 37, 42)
        );
        assert_eq!(parse_added_on(" Added on sometime"), None);
    }

    #[tokio::test]
    async fn test_producer_output() {
        let producer = KindleClippingsProducer::from_payload(CLIPPINGS).unwrap();

        let books = producer.installed_books().await.unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].book_id, "Moby Dick (Herman Melville)");
        assert_eq!(books[0].reader_app, "Kindle");

        let active = producer.active_annotations().await.unwrap();
        assert_eq!(active.len(), 2);
        let highlight = &active[0].annotations;
        assert_eq!(highlight.len(), 1);
        assert_eq!(highlight[0].record.location.as_deref(), Some("Location 180-182"));
        assert_eq!(highlight[0].descriptor, Some(LocationDescriptor::numeric("180")));
        assert_eq!(
            highlight[0].record.highlight_text,
            Some(vec!["Call me Ishmael.".to_string()])
        );

        let note = &active[1].annotations[0];
        assert!(note.record.highlight_text.is_none());
        assert_eq!(note.record.note_text.as_ref().unwrap()[0], "First line");
    }

    #[tokio::test]
    async fn test_page_only_clippings_share_key_format() {
        let payload = "Persuasion (Jane Austen)\n\
- Your Highlight on page 12 | Added on Thursday, 25 April 13 23:45:00\n\
\n\
Anne\n\
==========\n\
Persuasion (Jane Austen)\n\
- Your Highlight Location 180 | Added on Thursday, 25 April 13 23:46:00\n\
\n\
Wentworth\n\
==========\n";
        let producer = KindleClippingsProducer::from_payload(payload).unwrap();
        let active = producer.active_annotations().await.unwrap();
        let annotations = &active[0].annotations;
        assert_eq!(annotations[0].record.location.as_deref(), Some("Page 12"));
        assert_eq!(annotations[0].descriptor, Some(LocationDescriptor::numeric("12")));

        let generator = crate::location::LocationSortKeyGenerator::default();
        let keys: Vec<String> = annotations
            .iter()
            .map(|raw| {
                let descriptor = raw.descriptor.as_ref().unwrap();
                generator.derive(descriptor, raw.record.last_modification).unwrap()
            })
            .collect();
        assert_eq!(keys, vec!["000012", "000180"]);
    }

    #[test]
    fn test_empty_payload() {
        assert!(parse_clippings("  \n").is_empty());
    }
}
