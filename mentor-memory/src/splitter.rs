//! Recursive text splitting.
//!
//! [`RecursiveSplitter`] breaks text at the largest available boundary:
//! paragraphs, then lines, then sentences, then words, and finally raw
//! characters. Separators stay attached to the segment that precedes them,
//! so concatenating the output reproduces the input exactly.
//!
//! Sizes are measured in characters, never bytes, so multi-byte text is
//! never cut inside a code point.

use crate::error::{MemoryError, Result};

/// Boundary levels from coarsest to finest. Each level may have several
/// separators; a split happens after whichever one occurs.
const LEVELS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

/// A strategy for splitting text into bounded segments.
pub trait Splitter: Send + Sync {
    /// Split `text` into ordered segments no longer than [`max_size`](Splitter::max_size).
    ///
    /// Returns an empty `Vec` for empty input.
    fn split(&self, text: &str) -> Vec<String>;

    /// Maximum segment length in characters.
    fn max_size(&self) -> usize;
}

/// Splits text hierarchically: paragraphs → lines → sentences → words → characters.
///
/// Adjacent pieces are merged greedily while they fit within `max_size`. The
/// function is pure: the same text and size always produce the same segments.
///
/// # Example
///
/// ```rust
/// use mentor_memory::{RecursiveSplitter, Splitter};
///
/// let splitter = RecursiveSplitter::new(20).unwrap();
/// let parts = splitter.split("The sky is blue. Water is wet.");
/// assert_eq!(parts.concat(), "The sky is blue. Water is wet.");
/// assert!(parts.iter().all(|p| p.chars().count() <= 20));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecursiveSplitter {
    max_size: usize,
}

impl RecursiveSplitter {
    /// Create a splitter producing segments of at most `max_size` characters.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Config`] if `max_size` is zero.
    pub fn new(max_size: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(MemoryError::Config("splitter max_size must be greater than zero".into()));
        }
        Ok(Self { max_size })
    }
}

impl Splitter for RecursiveSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        split_text(text, self.max_size)
    }

    fn max_size(&self) -> usize {
        self.max_size
    }
}

/// Split `text` into segments of at most `max_size` characters.
///
/// A `max_size` of zero is treated as one.
pub fn split_text(text: &str, max_size: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    split_recursive(text, max_size.max(1), LEVELS)
}

fn split_recursive(text: &str, max_size: usize, levels: &[&[&str]]) -> Vec<String> {
    if char_len(text) <= max_size {
        return vec![text.to_string()];
    }
    let Some((separators, finer)) = levels.split_first() else {
        return split_chars(text, max_size);
    };

    let segments = split_keeping_separators(text, separators);
    if segments.len() <= 1 {
        return split_recursive(text, max_size, finer);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for segment in segments {
        let segment_len = char_len(segment);
        if current.is_empty() {
            current.push_str(segment);
            current_len = segment_len;
        } else if current_len + segment_len <= max_size {
            current.push_str(segment);
            current_len += segment_len;
        } else {
            flush(&mut chunks, &current, current_len, max_size, finer);
            current = segment.to_string();
            current_len = segment_len;
        }
    }
    if !current.is_empty() {
        flush(&mut chunks, &current, current_len, max_size, finer);
    }

    chunks
}

/// Emit a merged segment, descending a level if it is still oversized.
fn flush(
    chunks: &mut Vec<String>,
    segment: &str,
    segment_len: usize,
    max_size: usize,
    finer: &[&[&str]],
) {
    if segment_len > max_size {
        chunks.extend(split_recursive(segment, max_size, finer));
    } else {
        chunks.push(segment.to_string());
    }
}

/// Split after every occurrence of any separator, keeping it on the preceding piece.
fn split_keeping_separators<'a>(text: &'a str, separators: &[&str]) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    loop {
        let next = separators
            .iter()
            .filter_map(|sep| text[start..].find(sep).map(|pos| start + pos + sep.len()))
            .min();
        match next {
            Some(end) => {
                result.push(&text[start..end]);
                start = end;
            }
            None => break,
        }
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Last resort: fixed windows of `max_size` characters.
fn split_chars(text: &str, max_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(max_size).map(|window| window.iter().collect()).collect()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_segment() {
        assert_eq!(split_text("The sky is blue. Water is wet.", 2000), vec![
            "The sky is blue. Water is wet."
        ]);
    }

    #[test]
    fn empty_text_produces_nothing() {
        assert!(split_text("", 10).is_empty());
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let parts = split_text(text, 30);
        assert_eq!(parts, vec!["First paragraph here.\n\n", "Second paragraph here."]);
    }

    #[test]
    fn falls_back_to_sentences_then_words() {
        let text = "One two three. Four five six! Seven eight nine?";
        let parts = split_text(text, 16);
        assert_eq!(parts.concat(), text);
        assert!(parts.iter().all(|p| p.chars().count() <= 16));
        assert_eq!(parts[0], "One two three. ");
    }

    #[test]
    fn words_are_not_cut_when_a_space_is_available() {
        let text = "alpha beta gamma delta epsilon";
        let parts = split_text(text, 12);
        for part in &parts {
            for word in part.split_whitespace() {
                assert!(text.split(' ').any(|w| w == word), "cut word: {word}");
            }
        }
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn unbroken_text_is_cut_by_characters() {
        let parts = split_text("abcdefghij", 4);
        assert_eq!(parts, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn multibyte_text_is_measured_in_characters() {
        let text = "åäöåäöåäö";
        let parts = split_text(text, 4);
        assert_eq!(parts, vec!["åäöå", "äöåä", "ö"]);
    }

    #[test]
    fn zero_max_size_is_rejected() {
        assert!(matches!(RecursiveSplitter::new(0), Err(MemoryError::Config(_))));
    }
}
