//! Focus reading: one sentence at a time.

use std::sync::LazyLock;

use regex::Regex;

use clearmind_shared::TaskResult;

/// Cursor over a non-empty list of sentences. Movement clamps at both ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusCursor {
    sentences: Vec<String>,
    index: usize,
}

impl FocusCursor {
    /// `None` when there is nothing to read.
    pub fn new(sentences: Vec<String>) -> Option<Self> {
        if sentences.is_empty() {
            return None;
        }
        Some(Self {
            sentences,
            index: 0,
        })
    }

    /// Start reading a segmentation result.
    pub fn from_result(result: &TaskResult) -> Option<Self> {
        match result {
            TaskResult::SentenceList(sentences) => Self::new(sentences.clone()),
            _ => None,
        }
    }

    pub fn current(&self) -> &str {
        &self.sentences[self.index]
    }

    /// Advance one sentence. Returns `false` at the last sentence.
    pub fn next(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.index += 1;
        true
    }

    /// Go back one sentence. Returns `false` at the first sentence.
    pub fn previous(&mut self) -> bool {
        if self.is_first() {
            return false;
        }
        self.index -= 1;
        true
    }

    /// 1-based position and total, for "3 / 7" style display.
    pub fn position(&self) -> (usize, usize) {
        (self.index + 1, self.sentences.len())
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.sentences.len()
    }

    pub fn sentences(&self) -> &[String] {
        &self.sentences
    }
}

/// Split text on terminal punctuation without calling the model.
///
/// A trailing fragment without punctuation is kept as its own sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    static SENTENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"[^.!?]+(?:[.!?]+|$)").expect("valid regex")
    });

    SENTENCE_RE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
