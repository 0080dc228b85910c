//! Versioned phrase book: crisis patterns, softeners, advice terms and the
//! canned agent messages.
//!
//! The built-in book matches what ships by default. A replacement book can be
//! loaded from TOML (`phrase_book` in the main config) for localization or
//! testing. Every book is validated on load so the tone filter's guarantees
//! hold for any data it is given.

use crate::error::{Result, SahayakError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current built-in phrase book version.
pub const BUILTIN_VERSION: u32 = 1;

const CRISIS_PATTERNS: &[&str] = &[
    r"\b(i want to die|i'm going to die|kill myself|end my life|want to die|suicide|hurt myself)\b",
    r"\b(can't go on|cant go on|no reason to live|finish it all|i will die)\b",
];

const SOFTENERS: &[&str] = &[
    "I hear you.",
    "That makes sense.",
    "You are not alone.",
    "Take a breath with me.",
];

const ADVICE_TERMS: &[&str] = &[
    "should",
    "must",
    "need to",
    "have to",
    "you must",
    "see a doctor",
    "get help",
];

const ADVICE_REPLACEMENT: &str = "you might consider talking to someone you trust";

/// Fixed agent messages used by the pipeline's recovery branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CannedMessages {
    /// Reply to empty or whitespace-only input.
    pub clarification: String,
    /// Emergency reply for a detected crisis, including a helpline contact.
    pub crisis: String,
    /// Reply when the text backend is unavailable.
    pub backend_apology: String,
    /// Notice appended when speech synthesis fails.
    pub audio_trouble: String,
}

impl Default for CannedMessages {
    fn default() -> Self {
        Self {
            clarification: "I didn't catch anything — can you type or speak again?".to_owned(),
            crisis: "I'm really sorry you're feeling so overwhelmed. If you are in immediate \
                     danger, please contact local emergency services now. In India, you can \
                     call the Aasra helpline at 9820466726. Would you like a grounding exercise?"
                .to_owned(),
            backend_apology: "I'm having a little trouble connecting right now. Let's take a \
                              deep breath and try again in a moment."
                .to_owned(),
            audio_trouble: "Sorry, I had trouble generating audio for my response.".to_owned(),
        }
    }
}

/// All swappable phrase data used by the safety gate and tone filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseBook {
    /// Schema/content version of this book.
    pub version: u32,
    /// Case-insensitive regular expressions for crisis phrasing.
    pub crisis_patterns: Vec<String>,
    /// Empathetic phrases; the first is appended when none is present.
    pub softeners: Vec<String>,
    /// Directive or clinical terms that are rewritten.
    pub advice_terms: Vec<String>,
    /// Non-directive phrase substituted for each advice term.
    pub advice_replacement: String,
    /// Canned agent messages.
    pub messages: CannedMessages,
}

impl Default for PhraseBook {
    fn default() -> Self {
        Self {
            version: BUILTIN_VERSION,
            crisis_patterns: CRISIS_PATTERNS.iter().map(|s| (*s).to_owned()).collect(),
            softeners: SOFTENERS.iter().map(|s| (*s).to_owned()).collect(),
            advice_terms: ADVICE_TERMS.iter().map(|s| (*s).to_owned()).collect(),
            advice_replacement: ADVICE_REPLACEMENT.to_owned(),
            messages: CannedMessages::default(),
        }
    }
}

impl PhraseBook {
    /// Load and validate a phrase book from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SahayakError::Config(format!(
                "failed to read phrase book ({}): {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&raw).map_err(|e| match e {
            SahayakError::Config(msg) => {
                SahayakError::Config(format!("{msg} ({})", path.display()))
            }
            other => other,
        })
    }

    /// Parse and validate a phrase book from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let book: Self = toml::from_str(raw)
            .map_err(|e| SahayakError::Config(format!("invalid phrase book: {e}")))?;
        book.validate()?;
        Ok(book)
    }

    /// Check the invariants the safety gate and tone filter rely on.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 {
            return Err(SahayakError::Config(
                "phrase book version must be at least 1".to_owned(),
            ));
        }
        if self.crisis_patterns.is_empty() {
            return Err(SahayakError::Config(
                "phrase book has no crisis patterns".to_owned(),
            ));
        }
        for pattern in &self.crisis_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                SahayakError::Config(format!("invalid crisis pattern {pattern:?}: {e}"))
            })?;
        }
        if self.softeners.iter().all(|s| s.trim().is_empty()) {
            return Err(SahayakError::Config("phrase book has no softeners".to_owned()));
        }
        if self.advice_terms.iter().all(|t| t.trim().is_empty()) {
            return Err(SahayakError::Config(
                "phrase book has no advice terms".to_owned(),
            ));
        }

        let advice = self.advice_regex()?;
        if let Some(softener) = self.softeners.iter().find(|s| advice.is_match(s)) {
            return Err(SahayakError::Config(format!(
                "softener {softener:?} contains an advice term"
            )));
        }
        if advice.is_match(&self.advice_replacement) {
            return Err(SahayakError::Config(
                "advice replacement contains an advice term".to_owned(),
            ));
        }
        if self
            .advice_replacement
            .contains(|c| matches!(c, '.' | '!' | '?'))
        {
            return Err(SahayakError::Config(
                "advice replacement must not contain sentence punctuation".to_owned(),
            ));
        }
        Ok(())
    }

    /// Build the word-boundary, case-insensitive matcher over all advice terms.
    ///
    /// Longer terms are tried first so `you must` wins over `must`.
    pub fn advice_regex(&self) -> Result<regex::Regex> {
        let mut terms: Vec<&str> = self
            .advice_terms
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        terms.sort_by(|a, b| b.len().cmp(&a.len()));
        let alternation = terms
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        regex::RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
            .case_insensitive(true)
            .build()
            .map_err(|e| SahayakError::Config(format!("invalid advice terms: {e}")))
    }
}
