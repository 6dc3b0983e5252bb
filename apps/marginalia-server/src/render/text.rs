//! Plain-text export

use crate::annotations::AnnotationRecord;

use super::options::RenderOptions;

const SEPARATOR: &str = "----------";

/// Render annotations as plain text, ordered by `location_sort`
///
/// Each record is a header line (`location (timestamp)`), the highlight
/// paragraphs, then note paragraphs prefixed with `Note:`.
pub fn render_text(records: &[AnnotationRecord], options: &RenderOptions) -> String {
    let mut ordered: Vec<&AnnotationRecord> = records.iter().collect();
    ordered.sort_by(|a, b| a.location_sort.cmp(&b.location_sort));

    let blocks: Vec<String> = ordered
        .into_iter()
        .map(|record| render_block(record, options))
        .collect();

    let joiner = if options.horizontal_rule {
        format!("\n{}\n\n", SEPARATOR)
    } else {
        "\n".to_string()
    };
    blocks.join(&joiner)
}

fn render_block(record: &AnnotationRecord, options: &RenderOptions) -> String {
    let when = options.friendly_timestamp(record.last_modification);
    let mut lines = vec![match record.location.as_deref() {
        Some(location) if !location.is_empty() => format!("{} ({})", location, when),
        _ => format!("({})", when),
    }];

    lines.extend(record.highlight_text.iter().flatten().cloned());
    lines.extend(
        record
            .note_text
            .iter()
            .flatten()
            .map(|paragraph| format!("Note: {}", paragraph)),
    );

    let mut block = lines.join("\n");
    block.push('\n');
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::Timestamp;

    #[test]
    fn test_render_text() {
        let records = vec![
            AnnotationRecord::new("1", Timestamp::from_secs(0.0))
                .with_highlight(["Later passage"])
                .with_location("Location 200", "000200"),
            AnnotationRecord::new("1", Timestamp::from_secs(0.0))
                .with_highlight(["Early passage"])
                .with_note(["Remember this"])
                .with_location("Location 10", "000010"),
        ];

        let text = render_text(&records, &RenderOptions::default());
        assert_eq!(
            text,
            "Location 10 (Thu 01 Jan 1970 00:00:00)\nEarly passage\nNote: Remember this\n\n\
             Location 200 (Thu 01 Jan 1970 00:00:00)\nLater passage\n"
        );
    }

    #[test]
    fn test_render_text_with_separator() {
        let records = vec![
            AnnotationRecord::new("1", Timestamp::from_secs(0.0)).with_note(["a"]),
            AnnotationRecord::new("1", Timestamp::from_secs(0.0)).with_note(["b"]),
        ];
        let options = RenderOptions {
            horizontal_rule: true,
            ..RenderOptions::default()
        };
        let text = render_text(&records, &options);
        assert!(text.contains("\n----------\n\n"));
        assert!(text.starts_with("(Thu 01 Jan 1970 00:00:00)\nNote: a\n"));
    }
}
