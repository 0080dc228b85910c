//! Crisis detection gate for user turns.
//!
//! A best-effort pattern scan: any match routes the turn to the fixed
//! emergency reply and the backend is never contacted. The pattern list is
//! not exhaustive, so false negatives are expected.

use crate::error::{Result, SahayakError};
use crate::phrases::PhraseBook;
use regex::{Regex, RegexBuilder};

/// Case-insensitive matcher over the phrase book's crisis patterns.
#[derive(Debug, Clone)]
pub struct CrisisDetector {
    patterns: Vec<Regex>,
}

impl CrisisDetector {
    /// Compile the crisis patterns from a phrase book.
    ///
    /// # Errors
    ///
    /// Returns [`SahayakError::Config`] if the book fails validation.
    pub fn new(book: &PhraseBook) -> Result<Self> {
        book.validate()?;
        let patterns = book
            .crisis_patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| SahayakError::Config(format!("invalid crisis pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Returns `true` when `text` matches any crisis pattern.
    pub fn detect(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the detector has no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
