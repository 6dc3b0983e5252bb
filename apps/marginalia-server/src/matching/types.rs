//! Match outcome types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::library::LibraryId;

/// Certainty of an automatic book match, 0 (none) to 5 (exact)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Confidence(u8);

impl Confidence {
    pub const NONE: Confidence = Confidence(0);
    pub const EXACT: Confidence = Confidence(5);

    /// Default minimum for merging without confirmation
    pub const AUTOMATIC: Confidence = Confidence(3);

    /// Values outside 0..=5 are rejected
    pub fn new(value: u8) -> Option<Self> {
        (value <= 5).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// True at or above the given automatic-merge threshold
    pub fn meets(self, threshold: Confidence) -> bool {
        self >= threshold
    }

    pub fn is_automatic(self) -> bool {
        self.meets(Self::AUTOMATIC)
    }
}

impl TryFrom<u8> for Confidence {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Confidence::new(value).ok_or_else(|| format!("confidence {} outside 0..=5", value))
    }
}

impl From<Confidence> for u8 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which row of the decision table produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// The book already carried a library id
    AlreadyResolved,
    UuidTitleAuthor,
    UuidTitle,
    UuidOnly,
    TitleAuthor,
    TitleOnly,
    /// Routed to the configured news clippings book
    NewsClippings,
    NoMatch,
}

impl MatchRule {
    pub fn confidence(self) -> Confidence {
        let value = match self {
            MatchRule::AlreadyResolved
            | MatchRule::UuidTitleAuthor
            | MatchRule::NewsClippings => 5,
            MatchRule::UuidTitle => 4,
            MatchRule::UuidOnly => 3,
            MatchRule::TitleAuthor => 2,
            MatchRule::TitleOnly => 1,
            MatchRule::NoMatch => 0,
        };
        Confidence(value)
    }
}

/// Result of matching one imported book against the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub library_id: Option<LibraryId>,
    pub confidence: Confidence,
    pub rule: MatchRule,
}

impl MatchOutcome {
    pub fn new(library_id: LibraryId, rule: MatchRule) -> Self {
        Self {
            library_id: Some(library_id),
            confidence: rule.confidence(),
            rule,
        }
    }

    pub fn no_match() -> Self {
        Self {
            library_id: None,
            confidence: Confidence::NONE,
            rule: MatchRule::NoMatch,
        }
    }
}

/// Book field compared during matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Title,
    Author,
    Uuid,
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchField::Title => "title",
            MatchField::Author => "author",
            MatchField::Uuid => "uuid",
        })
    }
}

/// One field that differs between the imported book and its proposed match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMismatch {
    pub field: MatchField,
    pub library_value: Option<String>,
    pub imported_value: Option<String>,
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: library '{}', imported '{}'",
            self.field,
            self.library_value.as_deref().unwrap_or("-"),
            self.imported_value.as_deref().unwrap_or("-")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_range() {
        assert!(Confidence::new(5).is_some());
        assert!(Confidence::new(6).is_none());
        assert!(serde_json::from_str::<Confidence>("7").is_err());
        assert_eq!(serde_json::to_string(&Confidence::EXACT).unwrap(), "5");
    }

    #[test]
    fn test_rule_confidences() {
        assert_eq!(MatchRule::UuidTitle.confidence().value(), 4);
        assert_eq!(MatchRule::TitleOnly.confidence().value(), 1);
        assert!(MatchRule::UuidOnly.confidence().is_automatic());
        assert!(!MatchRule::TitleAuthor.confidence().is_automatic());
    }
}
