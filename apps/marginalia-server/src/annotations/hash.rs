//! Annotation content identity
//!
//! The digest is a persisted contract: MD5 over the UTF-8 bytes of the
//! highlight paragraphs joined with `\n`, followed directly by the note
//! paragraphs joined with `\n`, rendered as lowercase hex. Changing any part
//! of this reassigns the identity of every stored annotation.

/// Compute the content hash for a highlight/note pair
pub fn content_hash(highlight_text: Option<&[String]>, note_text: Option<&[String]>) -> String {
    let mut context = md5::Context::new();
    if let Some(paragraphs) = highlight_text {
        context.consume(paragraphs.join("\n").as_bytes());
    }
    if let Some(paragraphs) = note_text {
        context.consume(paragraphs.join("\n").as_bytes());
    }
    format!("{:x}", context.compute())
}
