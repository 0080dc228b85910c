//! Tone moderation for backend replies.
//!
//! Every reply passes through four steps, in this order:
//!
//! 1. Trim surrounding whitespace.
//! 2. Keep at most [`MAX_SENTENCES`] sentences.
//! 3. Append the first softener when the text carries none.
//! 4. Rewrite directive or clinical phrasing to a non-directive phrase.
//!
//! Truncation runs before the softener check so an appended softener is never
//! cut, and the rewrite runs last so it also covers the appended softener.
//! The filter validates its phrase book on construction; softeners carrying
//! no advice terms is what keeps `filter(filter(x)) == filter(x)`.

use crate::error::{Result, SahayakError};
use crate::phrases::PhraseBook;
use regex::{NoExpand, Regex, RegexBuilder};

/// Maximum number of backend sentences kept in a reply.
pub const MAX_SENTENCES: usize = 3;

/// Pure text filter built from a phrase book.
#[derive(Debug, Clone)]
pub struct ToneFilter {
    softeners: Vec<String>,
    /// Whole-word match for any softener, ignoring its trailing punctuation.
    softener_match: Regex,
    advice: Regex,
    replacement: String,
}

impl ToneFilter {
    /// Build a filter from a phrase book.
    ///
    /// # Errors
    ///
    /// Returns [`SahayakError::Config`] if the book fails validation.
    pub fn new(book: &PhraseBook) -> Result<Self> {
        book.validate()?;
        let softeners: Vec<String> = book
            .softeners
            .iter()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(Self {
            softener_match: softener_regex(&softeners)?,
            softeners,
            advice: book.advice_regex()?,
            replacement: book.advice_replacement.clone(),
        })
    }

    /// Apply the tone rules to a raw backend reply.
    pub fn filter(&self, reply: &str) -> String {
        let trimmed = reply.trim();

        let sentences = split_sentences(trimmed);
        let mut text = if sentences.len() > MAX_SENTENCES {
            sentences[..MAX_SENTENCES].join(" ")
        } else {
            trimmed.to_owned()
        };

        if !self.has_softener(&text)
            && let Some(first) = self.softeners.first()
        {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(first);
        }

        self.advice
            .replace_all(&text, NoExpand(&self.replacement))
            .into_owned()
    }

    /// Whether `text` already contains one of the softeners.
    ///
    /// Matching is case-insensitive, whole-word, and ignores the softener's
    /// own trailing punctuation, so `"... i hear you"` counts as containing
    /// `"I hear you."` but `"I hear your"` does not.
    pub fn has_softener(&self, text: &str) -> bool {
        self.softener_match.is_match(text)
    }

    /// Whether `text` still contains a directive or clinical term.
    pub fn contains_advice(&self, text: &str) -> bool {
        self.advice.is_match(text)
    }
}

fn softener_regex(softeners: &[String]) -> Result<Regex> {
    let alternation = softeners
        .iter()
        .map(|s| s.trim_end_matches(is_terminal).trim_end())
        .filter(|core| !core.is_empty())
        .map(|core| {
            let open = if core.starts_with(is_word) { r"\b" } else { "" };
            let close = if core.ends_with(is_word) { r"\b" } else { "" };
            format!("{open}{}{close}", regex::escape(core))
        })
        .collect::<Vec<_>>()
        .join("|");
    if alternation.is_empty() {
        return Err(SahayakError::Config(
            "phrase book has no usable softeners".to_owned(),
        ));
    }
    RegexBuilder::new(&format!("(?:{alternation})"))
        .case_insensitive(true)
        .build()
        .map_err(|e| SahayakError::Config(format!("invalid softener: {e}")))
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Split text into sentences ending in one or more `.`, `!` or `?`.
///
/// A trailing fragment without terminal punctuation is its own sentence, so
/// text with no punctuation at all is a single sentence. Returned slices are
/// trimmed; empty input yields no sentences.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }
        let mut end = idx + c.len_utf8();
        while let Some(&(next_idx, next)) = chars.peek() {
            if !is_terminal(next) {
                break;
            }
            end = next_idx + next.len_utf8();
            chars.next();
        }
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = end;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}
