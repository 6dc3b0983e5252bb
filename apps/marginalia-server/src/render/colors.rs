//! Highlight color palette

use crate::annotations::HighlightColor;

/// Background and foreground CSS colors for a highlight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorPair {
    pub background: String,
    pub foreground: String,
}

impl ColorPair {
    fn new(background: &str, foreground: &str) -> Self {
        Self {
            background: background.to_string(),
            foreground: foreground.to_string(),
        }
    }
}

/// Resolve the display colors for a highlight color
///
/// Custom hex colors are used as the background; the foreground is black or
/// white depending on the color's HSL lightness.
pub fn palette(color: &HighlightColor) -> ColorPair {
    match color {
        HighlightColor::Blue => ColorPair::new("#b1ccf3", "black"),
        HighlightColor::Gray => ColorPair::new("LightGray", "black"),
        HighlightColor::Green => ColorPair::new("#c8eb7b", "black"),
        HighlightColor::Pink => ColorPair::new("#f4b0d2", "black"),
        HighlightColor::Purple => ColorPair::new("#d8b0ef", "black"),
        HighlightColor::Red => ColorPair::new("red", "black"),
        HighlightColor::Underline => ColorPair::new("transparent", "blue"),
        HighlightColor::Yellow => ColorPair::new("#f4e681", "black"),
        HighlightColor::Custom(hex) => {
            let foreground = match lightness(hex) {
                Some(l) if l >= 128 => "#000000",
                Some(_) => "#FFFFFF",
                None => "black",
            };
            ColorPair::new(hex, foreground)
        }
    }
}

/// HSL lightness on a 0-255 scale; alpha is ignored
fn lightness(hex: &str) -> Option<u32> {
    let digits = hex.strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();

    let (r, g, b) = match digits.len() {
        3 | 4 => {
            let expand = |i: usize| channel(&digits[i..=i].repeat(2));
            (expand(0)?, expand(1)?, expand(2)?)
        }
        6 | 8 => (channel(&digits[0..2])?, channel(&digits[2..4])?, channel(&digits[4..6])?),
        _ => return None,
    };

    let max = u32::from(r.max(g).max(b));
    let min = u32::from(r.min(g).min(b));
    Some((max + min) / 2)
}
