//! HTML rendering of annotation sets
//!
//! Output is a single `div.user_annotations` block. Each record becomes a
//! `div.annotation` whose attributes carry what [`super::capture`] needs to
//! read the record back: `hash`, `location_sort`, `reader`, `genre`, the
//! table `color` and the timestamp cell's `uts`.

use std::fmt::Write;

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::annotations::AnnotationRecord;

use super::colors::palette;
use super::options::RenderOptions;

const HIGHLIGHT_STYLE: &str = "font-family:serif;margin:0 0 0.5em 0";
const NOTE_STYLE: &str = "font-family:sans-serif;font-style:italic;margin:0 0 0.5em 0";
const TABLE_STYLE: &str = "font-size:80%;margin-bottom:1em;border-collapse:collapse";

/// Render annotations as HTML, ordered by `location_sort`
pub fn render_html(records: &[AnnotationRecord], options: &RenderOptions) -> String {
    let mut ordered: Vec<&AnnotationRecord> = records.iter().collect();
    ordered.sort_by(|a, b| a.location_sort.cmp(&b.location_sort));

    let mut html = String::from("<div class=\"user_annotations\" style=\"margin:0\">");
    for (i, record) in ordered.into_iter().enumerate() {
        if i > 0 && options.horizontal_rule {
            html.push_str("<hr width=\"80%\" />");
        }
        render_record(&mut html, record, options);
    }
    html.push_str("</div>");
    html
}

fn render_record(html: &mut String, record: &AnnotationRecord, options: &RenderOptions) {
    let hash = record
        .content_hash
        .clone()
        .unwrap_or_else(|| record.compute_hash());

    html.push_str("<div class=\"annotation\"");
    push_attribute(html, "hash", &hash);
    push_attribute(html, "location_sort", &record.location_sort);
    if let Some(reader) = &record.reader_app {
        push_attribute(html, "reader", reader);
    }
    if let Some(genre) = &record.genre {
        push_attribute(html, "genre", genre);
    }
    html.push('>');

    for paragraph in record.highlight_text.iter().flatten() {
        let _ = write!(
            html,
            "<p class=\"highlight\" style=\"{}\">{}</p>",
            HIGHLIGHT_STYLE,
            encode_text(paragraph)
        );
    }
    for paragraph in record.note_text.iter().flatten() {
        let _ = write!(
            html,
            "<p class=\"note\" style=\"{}\">{}</p>",
            NOTE_STYLE,
            encode_text(paragraph)
        );
    }

    let colors = palette(&record.highlight_color);
    let _ = write!(
        html,
        "<table cellpadding=\"0\" width=\"100%\" style=\"background-color:{};color:{};{}\" color=\"{}\">",
        encode_double_quoted_attribute(&colors.background),
        encode_double_quoted_attribute(&colors.foreground),
        TABLE_STYLE,
        encode_double_quoted_attribute(record.highlight_color.as_str()),
    );
    let _ = write!(
        html,
        "<tr><td class=\"location\" style=\"text-align:left\">{}</td>\
         <td class=\"timestamp\" uts=\"{}\" style=\"text-align:right\">{}</td></tr></table>",
        encode_text(record.location.as_deref().unwrap_or_default()),
        record.last_modification,
        encode_text(&options.friendly_timestamp(record.last_modification)),
    );

    html.push_str("</div>");
}

fn push_attribute(html: &mut String, name: &str, value: &str) {
    let _ = write!(html, " {}=\"{}\"", name, encode_double_quoted_attribute(value));
}
