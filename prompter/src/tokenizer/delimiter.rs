//! Token delimiters.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{MatchError, Result};

/// Default delimiter: any of `\r\n`, `\r` or `\n`.
pub const LINE_ENDING: &str = r"\r\n|\r|\n";

static LINE_ENDING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LINE_ENDING).expect("line ending pattern is valid"));

/// Regex that separates tokens in a stream.
///
/// Delimiter text is never part of a token.
#[derive(Debug, Clone)]
pub struct Delimiter {
    pattern: Regex,
}

impl Delimiter {
    /// Compile a delimiter from a regex pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(pattern).map_err(MatchError::InvalidPattern)?,
        })
    }

    /// The default line ending delimiter.
    pub fn line() -> Self {
        Self {
            pattern: LINE_ENDING_REGEX.clone(),
        }
    }

    /// The underlying pattern string.
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    pub(crate) fn regex(&self) -> &Regex {
        &self.pattern
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::line()
    }
}
