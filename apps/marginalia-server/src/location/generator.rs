//! Location sort key derivation
//!
//! Every key is fixed-width so lexical order equals reading order within a
//! source kind. The widths are part of the stored format:
//!
//! | kind        | key                                   |
//! |-------------|---------------------------------------|
//! | numeric     | `NNNNNN` (configured width)           |
//! | cfi / xpath | `SSSS.LLLL.LLLL.LLLL.LLLL.LLLL.LLLL.OOOO` |
//! | page label  | `WWWWW.DDDDD`                         |
//! | unavailable | `TTTTTTTTTT.FFFFFF` (epoch seconds)   |

use super::cfi;
use super::ordinal::{alphabetic_to_int, is_roman, roman_to_int};
use super::types::{LocationDescriptor, LocationParseError};
use super::xpath::element_ladder;
use crate::annotations::Timestamp;

/// Default number of ladder levels in a structural key
pub const DEFAULT_MAX_ELEMENT_DEPTH: usize = 6;

/// Default width of flat numeric keys
pub const DEFAULT_FLAT_WIDTH: usize = 6;

const LADDER_WIDTH: usize = 4;
const LADDER_MAX: u32 = 9_999;
const PAGE_WIDTH: usize = 5;
const PAGE_MAX: u32 = 99_999;
const CHRONO_MAX: f64 = 9_999_999_999.0;

/// Converts location descriptors into sortable keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationSortKeyGenerator {
    max_depth: usize,
    flat_width: usize,
}

impl Default for LocationSortKeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ELEMENT_DEPTH, DEFAULT_FLAT_WIDTH)
    }
}

impl LocationSortKeyGenerator {
    pub fn new(max_depth: usize, flat_width: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
            flat_width: flat_width.max(1),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn flat_width(&self) -> usize {
        self.flat_width
    }

    /// Derive the sort key for a descriptor
    ///
    /// `last_modification` is only used for [`LocationDescriptor::Unavailable`].
    /// A descriptor that does not parse under its kind is an error; nothing
    /// is guessed.
    pub fn derive(
        &self,
        descriptor: &LocationDescriptor,
        last_modification: Timestamp,
    ) -> Result<String, LocationParseError> {
        match descriptor {
            LocationDescriptor::Numeric { value } => self.flat(descriptor, value),
            LocationDescriptor::Cfi { value } => {
                let position =
                    cfi::parse(value).map_err(|e| LocationParseError::new(descriptor, e.to_string()))?;
                self.structural(descriptor, position.spine_index, &position.ladder(), position.offset)
            }
            LocationDescriptor::XPath { section, path, offset } => {
                let ladder = element_ladder(path)
                    .ok_or_else(|| LocationParseError::new(descriptor, "unrecognized element path"))?;
                self.structural(descriptor, *section, &ladder, *offset)
            }
            LocationDescriptor::PageLabel { value } => page_label(descriptor, value),
            LocationDescriptor::Unavailable => chronological(last_modification)
                .map_err(|reason| LocationParseError::new(descriptor, reason)),
        }
    }

    /// First run of digits, zero-padded to the flat width
    fn flat(&self, descriptor: &LocationDescriptor, value: &str) -> Result<String, LocationParseError> {
        let digits: String = value
            .trim_start_matches(|c: char| !c.is_ascii_digit())
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        if digits.is_empty() {
            return Err(LocationParseError::new(descriptor, "no location number"));
        }

        let number: u64 = digits
            .parse()
            .map_err(|_| LocationParseError::new(descriptor, "location number out of range"))?;
        let key = format!("{:0width$}", number, width = self.flat_width);
        if key.len() > self.flat_width {
            return Err(LocationParseError::new(
                descriptor,
                format!("location number exceeds {} digits", self.flat_width),
            ));
        }
        Ok(key)
    }

    /// `spine.ladder.offset`, ladder padded or truncated to `max_depth`
    fn structural(
        &self,
        descriptor: &LocationDescriptor,
        spine_index: u32,
        ladder: &[u32],
        offset: u32,
    ) -> Result<String, LocationParseError> {
        let check = |value: u32, what: &str| {
            if value > LADDER_MAX {
                Err(LocationParseError::new(
                    descriptor,
                    format!("{} {} exceeds {} digits", what, value, LADDER_WIDTH),
                ))
            } else {
                Ok(value)
            }
        };

        if ladder.len() > self.max_depth {
            tracing::debug!(
                "Truncating element ladder of depth {} to {}",
                ladder.len(),
                self.max_depth
            );
        }

        let mut parts = Vec::with_capacity(self.max_depth + 2);
        parts.push(format!("{:04}", check(spine_index, "spine index")?));
        for level in 0..self.max_depth {
            let value = ladder.get(level).copied().unwrap_or(0);
            parts.push(format!("{:04}", check(value, "ladder level")?));
        }
        parts.push(format!("{:04}", check(offset, "offset")?));

        Ok(parts.join("."))
    }
}

/// `whole.decimal`: arabic pages are `N.0`, front matter is `0.ordinal`
fn page_label(descriptor: &LocationDescriptor, value: &str) -> Result<String, LocationParseError> {
    let mut tokens = value.split_whitespace();
    let mut token = tokens.next().unwrap_or_default();
    if matches!(token.to_ascii_lowercase().as_str(), "page" | "p." | "pg" | "pg.") {
        token = tokens.next().unwrap_or_default();
    }
    let label: String = token.chars().take_while(|c| c.is_alphanumeric()).collect();
    if label.is_empty() {
        return Err(LocationParseError::new(descriptor, "no page label"));
    }

    let (whole, decimal) = if label.chars().all(|c| c.is_ascii_digit()) {
        let page = label
            .parse::<u32>()
            .map_err(|_| LocationParseError::new(descriptor, "page number out of range"))?;
        (page, 0)
    } else if is_roman(&label) {
        let ordinal =
            roman_to_int(&label).ok_or_else(|| LocationParseError::new(descriptor, "invalid roman numeral"))?;
        (0, ordinal)
    } else if let Some(ordinal) = alphabetic_to_int(&label) {
        (0, ordinal)
    } else {
        return Err(LocationParseError::new(descriptor, "unsupported page label"));
    };

    if whole > PAGE_MAX || decimal > PAGE_MAX {
        return Err(LocationParseError::new(
            descriptor,
            format!("page exceeds {} digits", PAGE_WIDTH),
        ));
    }

    Ok(format!("{:05}.{:05}", whole, decimal))
}

/// Chronological fallback key for records without a position
pub fn chronological(last_modification: Timestamp) -> Result<String, String> {
    let secs = last_modification.as_secs();
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("invalid timestamp {}", secs));
    }
    if secs > CHRONO_MAX {
        return Err(format!("timestamp {} out of range", secs));
    }
    Ok(format!("{:017.6}", secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::SourceKind;

    fn ts() -> Timestamp {
        Timestamp::from_secs(0.0)
    }

    #[test]
    fn test_flat_keys() {
        let generator = LocationSortKeyGenerator::default();
        assert_eq!(generator.derive(&LocationDescriptor::numeric("449"), ts()).unwrap(), "000449");
        assert_eq!(
            generator.derive(&LocationDescriptor::numeric("Location 449-452"), ts()).unwrap(),
            "000449"
        );

        let err = generator
            .derive(&LocationDescriptor::numeric("1234567"), ts())
            .unwrap_err();
        assert_eq!(err.kind, SourceKind::Numeric);
        assert!(generator.derive(&LocationDescriptor::numeric("none"), ts()).is_err());

        let narrow = LocationSortKeyGenerator::new(6, 5);
        assert_eq!(narrow.derive(&LocationDescriptor::numeric("12"), ts()).unwrap(), "00012");
    }

    #[test]
    fn test_flat_keys_are_strictly_increasing() {
        let generator = LocationSortKeyGenerator::default();
        let mut previous = String::new();
        for n in 1..=999_999u32 {
            let key = generator
                .derive(&LocationDescriptor::numeric(n.to_string()), ts())
                .unwrap();
            assert!(key > previous, "{} !> {}", key, previous);
            previous = key;
        }
    }

    #[test]
    fn test_cfi_key() {
        let generator = LocationSortKeyGenerator::default();
        let key = generator
            .derive(&LocationDescriptor::cfi("epubcfi(/6/60[id1247]!/4/10/2/1,:0,:26)"), ts())
            .unwrap();
        assert_eq!(key, "0030.0002.0005.0001.0000.0000.0000.0000");
    }

    #[test]
    fn test_cfi_keys_follow_reading_order() {
        let generator = LocationSortKeyGenerator::default();
        let derive = |cfi: &str| generator.derive(&LocationDescriptor::cfi(cfi), ts()).unwrap();

        let earlier_offset = derive("epubcfi(/6/8!/4/10/2/1,:5,:20)");
        let later_offset = derive("epubcfi(/6/8!/4/10/2/1,:40,:60)");
        let later_paragraph = derive("epubcfi(/6/8!/4/12/1,:0,:3)");
        let later_chapter = derive("epubcfi(/6/10!/4/2/1,:0,:3)");

        assert!(earlier_offset < later_offset);
        assert!(later_offset < later_paragraph);
        assert!(later_paragraph < later_chapter);
    }

    #[test]
    fn test_deep_ladder_is_truncated() {
        let generator = LocationSortKeyGenerator::new(2, 6);
        let a = generator
            .derive(&LocationDescriptor::cfi("epubcfi(/6/2!/4/6/8/1:0)"), ts())
            .unwrap();
        let b = generator
            .derive(&LocationDescriptor::cfi("epubcfi(/6/2!/4/6/10/1:0)"), ts())
            .unwrap();
        assert_eq!(a, "0001.0002.0003.0000");
        // Positions below the maximum depth collapse
        assert_eq!(a, b);
    }

    #[test]
    fn test_cfi_component_overflow() {
        let generator = LocationSortKeyGenerator::default();
        let err = generator
            .derive(&LocationDescriptor::cfi("epubcfi(/6/2!/4/1:12345)"), ts())
            .unwrap_err();
        assert_eq!(err.kind, SourceKind::Cfi);
        assert_eq!(err.raw, "epubcfi(/6/2!/4/1:12345)");
    }

    #[test]
    fn test_xpath_key() {
        let generator = LocationSortKeyGenerator::default();
        let descriptor = LocationDescriptor::XPath {
            section: 7,
            path: "/x:html[1]/x:body[1]/x:div[1]/x:div[1]/x:p[14]/x:span[2]/text()[1]".to_string(),
            offset: 33,
        };
        assert_eq!(
            generator.derive(&descriptor, ts()).unwrap(),
            "0007.0014.0002.0000.0000.0000.0000.0033"
        );

        let bad = LocationDescriptor::XPath {
            section: 7,
            path: "/p[1]".to_string(),
            offset: 0,
        };
        assert_eq!(generator.derive(&bad, ts()).unwrap_err().kind, SourceKind::XPath);
    }

    #[test]
    fn test_page_labels() {
        let generator = LocationSortKeyGenerator::default();
        let derive = |label: &str| generator.derive(&LocationDescriptor::page_label(label), ts());

        assert_eq!(derive("Page 17").unwrap(), "00017.00000");
        assert_eq!(derive("xiv").unwrap(), "00000.00014");
        assert_eq!(derive("Page b").unwrap(), "00000.00002");

        // Front matter precedes page 1
        assert!(derive("Page xiv").unwrap() < derive("Page 1").unwrap());
        assert!(derive("Page ii").unwrap() < derive("Page iv").unwrap());

        assert!(derive("Page").is_err());
        assert!(derive("Page 123456").is_err());
    }

    #[test]
    fn test_chronological_fallback() {
        let generator = LocationSortKeyGenerator::default();
        let early = generator
            .derive(&LocationDescriptor::Unavailable, Timestamp::from_secs(999_999_999.5))
            .unwrap();
        let late = generator
            .derive(&LocationDescriptor::Unavailable, Timestamp::from_secs(1_354_608_900.0))
            .unwrap();
        assert_eq!(early, "0999999999.500000");
        assert_eq!(late, "1354608900.000000");
        assert!(early < late);

        assert!(generator
            .derive(&LocationDescriptor::Unavailable, Timestamp::from_secs(-1.0))
            .is_err());
    }
}
