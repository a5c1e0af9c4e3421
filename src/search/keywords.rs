//! Important-word extraction and the Stage 1 keyword pattern.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::LazyLock;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").unwrap());

static STOP_WORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORD_LIST.iter().copied().collect());

const STOP_WORD_LIST: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "couldn", "d", "did", "didn", "do", "does", "doesn", "doing",
    "don", "down", "during", "each", "few", "for", "from", "further", "had", "hadn", "has",
    "hasn", "have", "haven", "having", "he", "her", "here", "hers", "herself", "him", "himself",
    "his", "how", "i", "if", "in", "into", "is", "isn", "it", "its", "itself", "just", "ll", "m",
    "me", "might", "more", "most", "must", "my", "myself", "no", "nor", "not", "now", "o", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "re", "s", "same", "shall", "she", "should", "shouldn", "so", "some", "such", "t", "than",
    "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these", "they",
    "this", "those", "through", "to", "too", "under", "until", "up", "ve", "very", "was",
    "wasn", "we", "were", "weren", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "won", "would", "wouldn", "y", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Lowercase, split on word boundaries, drop stop words. Order and
/// duplicates are kept: the ordered pattern depends on both.
pub fn extract_important_words(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    WORD_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|w| !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// How Stage 1 matches the important words against chunk text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMatch {
    /// Words appear in query order, each after the previous one
    /// (`%w1%w2%…%`).
    #[default]
    Ordered,
    /// Every word appears somewhere, in any order.
    AnyOrder,
}

impl FromStr for KeywordMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ordered" => Ok(KeywordMatch::Ordered),
            "any_order" | "any-order" | "anyorder" => Ok(KeywordMatch::AnyOrder),
            other => Err(format!("unknown keyword match mode: {other}")),
        }
    }
}

/// Case-insensitive keyword filter over chunk text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordPattern {
    words: Vec<String>,
    mode: KeywordMatch,
}

impl KeywordPattern {
    /// Returns `None` when there is nothing to match on.
    pub fn new(words: &[String], mode: KeywordMatch) -> Option<Self> {
        let words: Vec<String> = words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            None
        } else {
            Some(Self { words, mode })
        }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn mode(&self) -> KeywordMatch {
        self.mode
    }

    pub fn matches(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        match self.mode {
            KeywordMatch::Ordered => {
                let mut rest = haystack.as_str();
                for word in &self.words {
                    match rest.find(word.as_str()) {
                        Some(pos) => rest = &rest[pos + word.len()..],
                        None => return false,
                    }
                }
                true
            }
            KeywordMatch::AnyOrder => self.words.iter().all(|w| haystack.contains(w.as_str())),
        }
    }

    /// LIKE patterns to bind as query parameters, all of which must match.
    /// Wildcards in the words are escaped with `\`.
    pub fn like_patterns(&self) -> Vec<String> {
        match self.mode {
            KeywordMatch::Ordered => {
                let joined: Vec<String> = self.words.iter().map(|w| escape_like(w)).collect();
                vec![format!("%{}%", joined.join("%"))]
            }
            KeywordMatch::AnyOrder => self
                .words
                .iter()
                .map(|w| format!("%{}%", escape_like(w)))
                .collect(),
        }
    }
}

fn escape_like(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for ch in word.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
