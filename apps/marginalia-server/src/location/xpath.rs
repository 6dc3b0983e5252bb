//! Element ladders from reader XPaths
//!
//! Marvin reports highlight starts as an XPath rooted at its own content
//! wrapper, e.g. `/x:html[1]/x:body[1]/x:div[1]/x:div[1]/x:p[14]/x:span[2]/text()[1]`.
//! The ladder is the sibling index of every element below the wrapper.

use regex::Regex;
use std::sync::OnceLock;

fn wrapper_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^/(?:x:)?html\[1\]/(?:x:)?body\[1\]/(?:x:)?div\[1\]/(?:x:)?div\[1\]/(.+?)/text\(\).*$")
            .expect("wrapper pattern is valid")
    })
}

fn step_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(?:x:)?[\w.-]+\[(\d+)\]$").expect("step pattern is valid"))
}

/// Sibling indices of the element steps below the content wrapper
///
/// Returns `None` when the path does not have the expected wrapper or a step
/// lacks an index.
pub fn element_ladder(path: &str) -> Option<Vec<u32>> {
    let captures = wrapper_pattern().captures(path.trim())?;
    let interior = captures.get(1)?.as_str();

    interior
        .split('/')
        .map(|step| {
            step_pattern()
                .captures(step)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_ladder() {
        assert_eq!(
            element_ladder("/x:html[1]/x:body[1]/x:div[1]/x:div[1]/x:p[14]/x:span[2]/text()[1]"),
            Some(vec![14, 2])
        );
        assert_eq!(
            element_ladder("/html[1]/body[1]/div[1]/div[1]/p[3]/text()"),
            Some(vec![3])
        );
    }

    #[test]
    fn test_unexpected_paths() {
        assert_eq!(element_ladder("/x:html[1]/x:body[1]/x:p[3]/text()"), None);
        assert_eq!(
            element_ladder("/x:html[1]/x:body[1]/x:div[1]/x:div[1]/x:p/text()"),
            None
        );
        assert_eq!(element_ladder(""), None);
    }
}
