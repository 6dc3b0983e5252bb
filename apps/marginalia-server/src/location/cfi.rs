//! EPUB CFI position parser
//!
//! Extracts just what ordering needs from a CFI: the spine position, the
//! element steps inside the content document, and the starting character
//! offset.
//!
//! Grammar (subset):
//! ```text
//! cfi    = "epubcfi(" path ["," path "," path] ")"
//! path   = step* ["!" step*] [":" number [assertion]]
//! step   = "/" number [assertion]
//! assertion = "[" text "]"
//! ```

use thiserror::Error;

/// CFI parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CfiParseError {
    #[error("empty CFI string")]
    Empty,

    #[error("CFI must start with 'epubcfi('")]
    MissingPrefix,

    #[error("CFI must end with ')'")]
    MissingClosingParen,

    #[error("expected number at position {0}")]
    ExpectedNumber(usize),

    #[error("unclosed bracket at position {0}")]
    UnclosedBracket(usize),

    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("missing spine step before '!'")]
    MissingSpine,

    #[error("missing content document indirection '!'")]
    MissingIndirection,
}

/// The ordering-relevant parts of a CFI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfiPosition {
    /// Spine item index (the second package step, halved)
    pub spine_index: u32,
    /// Raw even/odd step values inside the content document, including the
    /// range start's own steps
    pub interior_steps: Vec<u32>,
    /// Character offset of the start point
    pub offset: u32,
}

impl CfiPosition {
    /// Element ladder: every interior step but the terminal one, halved
    pub fn ladder(&self) -> Vec<u32> {
        match self.interior_steps.split_last() {
            Some((_, elements)) => elements.iter().map(|s| s / 2).collect(),
            None => Vec::new(),
        }
    }
}

/// One path segment: steps, whether it crossed `!`, and an optional offset
#[derive(Debug, Default)]
struct PathPart {
    package_steps: Vec<u32>,
    content_steps: Vec<u32>,
    indirected: bool,
    offset: Option<u32>,
}

/// Parser state
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_str(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> CfiParseError {
        CfiParseError::UnexpectedChar(self.peek().unwrap_or('\0'), self.pos)
    }

    /// Parse a sequence of digits as u32
    fn parse_number(&mut self) -> Result<u32, CfiParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }

        if self.pos == start {
            return Err(CfiParseError::ExpectedNumber(start));
        }

        self.input[start..self.pos]
            .parse()
            .map_err(|_| CfiParseError::ExpectedNumber(start))
    }

    /// Skip an `[...]` assertion, honouring `^` escapes
    fn skip_assertion(&mut self) -> Result<(), CfiParseError> {
        if !self.skip_if('[') {
            return Ok(());
        }
        let start = self.pos;
        let mut escaped = false;
        while let Some(ch) = self.advance() {
            match ch {
                _ if escaped => escaped = false,
                '^' => escaped = true,
                ']' => return Ok(()),
                _ => {}
            }
        }
        Err(CfiParseError::UnclosedBracket(start))
    }

    fn parse_path(&mut self) -> Result<PathPart, CfiParseError> {
        let mut part = PathPart::default();

        loop {
            if self.skip_if('/') {
                let step = self.parse_number()?;
                self.skip_assertion()?;
                if part.indirected {
                    part.content_steps.push(step);
                } else {
                    part.package_steps.push(step);
                }
            } else if self.skip_if('!') {
                self.skip_assertion()?;
                part.indirected = true;
            } else {
                break;
            }
        }

        if self.skip_if(':') {
            part.offset = Some(self.parse_number()?);
            self.skip_assertion()?;
        }

        Ok(part)
    }

    fn parse_cfi(&mut self) -> Result<CfiPosition, CfiParseError> {
        if !self.skip_str("epubcfi(") {
            return Err(CfiParseError::MissingPrefix);
        }

        let common = self.parse_path()?;

        let start = if self.skip_if(',') {
            let start = self.parse_path()?;
            if !self.skip_if(',') {
                return Err(self.unexpected());
            }
            // The end point never affects ordering
            self.parse_path()?;
            Some(start)
        } else {
            None
        };

        if !self.skip_if(')') {
            return if self.peek().is_none() {
                Err(CfiParseError::MissingClosingParen)
            } else {
                Err(self.unexpected())
            };
        }
        if self.peek().is_some() {
            return Err(self.unexpected());
        }

        if !common.indirected {
            return Err(CfiParseError::MissingIndirection);
        }
        let spine_step = *common.package_steps.get(1).ok_or(CfiParseError::MissingSpine)?;

        let mut interior_steps = common.content_steps;
        let mut offset = common.offset;
        if let Some(start) = start {
            interior_steps.extend(start.content_steps);
            interior_steps.extend(start.package_steps);
            offset = start.offset.or(offset);
        }

        Ok(CfiPosition {
            spine_index: spine_step / 2,
            interior_steps,
            offset: offset.unwrap_or(0),
        })
    }
}

/// Parse a CFI string into its ordering position
pub fn parse(input: &str) -> Result<CfiPosition, CfiParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CfiParseError::Empty);
    }
    Parser::new(input).parse_cfi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_cfi() {
        let position = parse("epubcfi(/6/60[id1247]!/4/10/2/1,:0,:26)").unwrap();
        assert_eq!(position.spine_index, 30);
        assert_eq!(position.interior_steps, vec![4, 10, 2, 1]);
        assert_eq!(position.ladder(), vec![2, 5, 1]);
        assert_eq!(position.offset, 0);
    }

    #[test]
    fn test_parse_point_cfi() {
        let position = parse("epubcfi(/6/4[chap01ref]!/4[body01]/10[para05]/3:10)").unwrap();
        assert_eq!(position.spine_index, 2);
        assert_eq!(position.ladder(), vec![2, 5]);
        assert_eq!(position.offset, 10);
    }

    #[test]
    fn test_range_start_steps_extend_ladder() {
        let position = parse("epubcfi(/6/14!/4/2,/6/1:5,/8/1:2)").unwrap();
        assert_eq!(position.interior_steps, vec![4, 2, 6, 1]);
        assert_eq!(position.ladder(), vec![2, 1, 3]);
        assert_eq!(position.offset, 5);
    }

    #[test]
    fn test_escaped_assertion() {
        let position = parse("epubcfi(/6/4!/4[a^]b]/1:3)").unwrap();
        assert_eq!(position.ladder(), vec![2]);
        assert_eq!(position.offset, 3);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(""), Err(CfiParseError::Empty));
        assert_eq!(parse("/6/4!/4/1:0"), Err(CfiParseError::MissingPrefix));
        assert_eq!(parse("epubcfi(/6/4!/4/1:0"), Err(CfiParseError::MissingClosingParen));
        assert_eq!(parse("epubcfi(/6/4/4/1:0)"), Err(CfiParseError::MissingIndirection));
        assert_eq!(parse("epubcfi(/6!/4/1:0)"), Err(CfiParseError::MissingSpine));
        assert!(matches!(parse("epubcfi(/6/x!/4)"), Err(CfiParseError::ExpectedNumber(_))));
        assert!(matches!(parse("epubcfi(/6/4!/4[abc)"), Err(CfiParseError::UnclosedBracket(_))));
    }
}
