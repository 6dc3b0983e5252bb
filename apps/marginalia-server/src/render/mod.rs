//! Annotation rendering
//!
//! Rendering is one-way: records go to HTML or plain text. Markup only turns
//! back into records through the explicit [`capture_html`] step.

mod capture;
mod colors;
mod html;
mod options;
mod text;

pub use capture::{capture_html, CaptureError};
pub use colors::{palette, ColorPair};
pub use html::render_html;
pub use options::{RenderOptions, DEFAULT_TIMESTAMP_FORMAT};
pub use text::render_text;
