//! Capture of previously rendered annotation markup
//!
//! This is the only path from markup back to records. It understands the
//! markup produced by [`super::render_html`] and nothing more general.

use std::cell::RefCell;

use html_escape::decode_html_entities;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};

use crate::annotations::{AnnotationRecord, HighlightColor, Timestamp};

/// Errors raised while capturing rendered markup
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to parse annotation markup: {0}")]
    Markup(String),

    #[error("Annotation {index} has an invalid timestamp '{value}'")]
    InvalidTimestamp { index: usize, value: String },
}

/// A record as it is being assembled from markup events
#[derive(Debug, Default)]
struct PartialRecord {
    hash: Option<String>,
    location_sort: Option<String>,
    reader: Option<String>,
    genre: Option<String>,
    color: Option<String>,
    uts: Option<String>,
    highlight: Vec<String>,
    note: Vec<String>,
    location: String,
}

#[derive(Default)]
struct CaptureState {
    records: Vec<PartialRecord>,
}

impl CaptureState {
    fn current(&mut self) -> Option<&mut PartialRecord> {
        self.records.last_mut()
    }

    fn append_to_last(paragraphs: &mut [String], chunk: &str) {
        if let Some(last) = paragraphs.last_mut() {
            last.push_str(chunk);
        }
    }
}

/// Read rendered annotations back into records for `book_id`
pub fn capture_html(html: &str, book_id: &str) -> Result<Vec<AnnotationRecord>, CaptureError> {
    let state = RefCell::new(CaptureState::default());

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("div.annotation", |el| {
                    state.borrow_mut().records.push(PartialRecord {
                        hash: el.get_attribute("hash"),
                        location_sort: el.get_attribute("location_sort"),
                        reader: el.get_attribute("reader"),
                        genre: el.get_attribute("genre"),
                        ..PartialRecord::default()
                    });
                    Ok(())
                }),
                element!("div.annotation p.highlight", |_el| {
                    if let Some(record) = state.borrow_mut().current() {
                        record.highlight.push(String::new());
                    }
                    Ok(())
                }),
                element!("div.annotation p.note", |_el| {
                    if let Some(record) = state.borrow_mut().current() {
                        record.note.push(String::new());
                    }
                    Ok(())
                }),
                element!("div.annotation table", |el| {
                    if let Some(record) = state.borrow_mut().current() {
                        record.color = el.get_attribute("color");
                    }
                    Ok(())
                }),
                element!("div.annotation td.timestamp", |el| {
                    if let Some(record) = state.borrow_mut().current() {
                        record.uts = el.get_attribute("uts");
                    }
                    Ok(())
                }),
                text!("div.annotation p.highlight", |t| {
                    if let Some(record) = state.borrow_mut().current() {
                        CaptureState::append_to_last(&mut record.highlight, t.as_str());
                    }
                    Ok(())
                }),
                text!("div.annotation p.note", |t| {
                    if let Some(record) = state.borrow_mut().current() {
                        CaptureState::append_to_last(&mut record.note, t.as_str());
                    }
                    Ok(())
                }),
                text!("div.annotation td.location", |t| {
                    if let Some(record) = state.borrow_mut().current() {
                        record.location.push_str(t.as_str());
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| CaptureError::Markup(e.to_string()))?;

    let partials = state.into_inner().records;
    tracing::debug!("Captured {} annotations from markup", partials.len());

    partials
        .into_iter()
        .enumerate()
        .map(|(index, partial)| into_record(index, partial, book_id))
        .collect()
}

fn into_record(index: usize, partial: PartialRecord, book_id: &str) -> Result<AnnotationRecord, CaptureError> {
    let uts = partial.uts.unwrap_or_default();
    let secs: f64 = uts
        .trim()
        .parse()
        .map_err(|_| CaptureError::InvalidTimestamp {
            index,
            value: uts.clone(),
        })?;

    let decode = |paragraphs: Vec<String>| -> Option<Vec<String>> {
        if paragraphs.is_empty() {
            None
        } else {
            Some(
                paragraphs
                    .iter()
                    .map(|p| decode_html_entities(p).into_owned())
                    .collect(),
            )
        }
    };

    let location = decode_html_entities(partial.location.trim()).into_owned();

    let mut record = AnnotationRecord::new(book_id, Timestamp::from_secs(secs));
    record.highlight_text = decode(partial.highlight);
    record.note_text = decode(partial.note);
    record.location = (!location.is_empty()).then_some(location);
    record.location_sort = partial.location_sort.unwrap_or_default();
    record.highlight_color = partial
        .color
        .map(|c| HighlightColor::parse(&c))
        .unwrap_or_default();
    record.reader_app = partial.reader;
    record.genre = partial.genre;
    record.content_hash = partial.hash.filter(|h| !h.is_empty());
    record.ensure_hash();

    Ok(record)
}
