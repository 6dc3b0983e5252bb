//! Rendering options shared by the HTML and text renderers

use chrono::format::{Item, StrftimeItems};

use crate::annotations::Timestamp;

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%a %d %b %Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// chrono strftime pattern for the human-readable timestamp
    pub timestamp_format: String,
    /// Separate rendered annotations with `<hr>` / a dashed line
    pub horizontal_rule: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            horizontal_rule: false,
        }
    }
}

impl RenderOptions {
    /// Format a timestamp (UTC) with the configured pattern
    ///
    /// An invalid pattern falls back to the default one instead of failing the
    /// whole render.
    pub fn friendly_timestamp(&self, ts: Timestamp) -> String {
        let Some(dt) = ts.to_datetime() else {
            return ts.to_string();
        };

        let items: Vec<Item<'_>> = StrftimeItems::new(&self.timestamp_format).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            tracing::warn!(
                "Invalid timestamp format '{}', using default",
                self.timestamp_format
            );
            return dt.format(DEFAULT_TIMESTAMP_FORMAT).to_string();
        }

        dt.format_with_items(items.into_iter()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format() {
        let options = RenderOptions::default();
        // 2012-12-04 08:15:00 UTC
        let ts = Timestamp::from_secs(1_354_608_900.0);
        assert_eq!(options.friendly_timestamp(ts), "Tue 04 Dec 2012 08:15:00");
    }

    #[test]
    fn test_invalid_format_falls_back() {
        let options = RenderOptions {
            timestamp_format: "%Q broken".to_string(),
            horizontal_rule: false,
        };
        let ts = Timestamp::from_secs(0.0);
        assert_eq!(options.friendly_timestamp(ts), "Thu 01 Jan 1970 00:00:00");
    }

    #[test]
    fn test_unrepresentable_timestamp() {
        let options = RenderOptions::default();
        assert_eq!(options.friendly_timestamp(Timestamp::from_secs(f64::NAN)), "NaN");
    }
}
