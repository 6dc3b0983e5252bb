//! Title and author normalization for identity lookups

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a title for comparison
///
/// Decomposes (NFKD), strips combining marks, lowercases and collapses
/// whitespace, so "  Les  Misérables" and "les miserables" compare equal.
pub fn normalize_title(title: &str) -> String {
    let folded: String = title
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize an author name; same folding as titles
pub fn normalize_author(author: &str) -> String {
    normalize_title(author)
}

/// Split a producer's author field into individual normalized names
///
/// Calibre joins multiple authors with `&`; some apps use `;`.
pub fn split_authors(author: &str) -> Vec<String> {
    author
        .split(['&', ';'])
        .map(normalize_author)
        .filter(|a| !a.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("Dune"), "dune");
        assert_eq!(normalize_title("  Les   Misérables "), "les miserables");
        assert_eq!(normalize_title("ÉCOLE"), "ecole");
        assert_eq!(normalize_title("ﬁne"), "fine");
    }

    #[test]
    fn test_split_authors() {
        assert_eq!(
            split_authors("Terry Pratchett & Neil Gaiman"),
            vec!["terry pratchett", "neil gaiman"]
        );
        assert_eq!(split_authors("Herbert"), vec!["herbert"]);
        assert!(split_authors("  ").is_empty());
    }
}
