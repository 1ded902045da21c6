//! Search token generation.
//!
//! Every write path and every query path goes through this module so the tokens
//! stored next to an item and the tokens a query looks up are produced by the
//! same rules. A store indexed under one [`TokenPolicy`] and queried under
//! another loses recall without any error, which is why stores persist the
//! policy they indexed with (see `database.rs`).
//!
//! Normalization: lowercase, every character outside `[a-z0-9]` becomes a word
//! break. Words shorter than `min_word_len` are not indexed. Each remaining word
//! expands to either all of its contiguous substrings or all of its prefixes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default minimum word length. Single-character words ("a", "x") are not
/// indexed on their own; their characters still appear as substrings of the
/// longer words around them.
pub const DEFAULT_MIN_WORD_LEN: usize = 2;

/// How a word expands into tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenMode {
    /// Every contiguous substring (`n(n+1)/2` tokens per word). Enables
    /// any-substring lookups.
    #[default]
    AllSubstrings,
    /// Every prefix (`n` tokens per word). Enables prefix lookups only.
    Prefixes,
}

/// Tokenization policy shared by indexing and querying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenPolicy {
    pub mode: TokenMode,
    pub min_word_len: usize,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            mode: TokenMode::AllSubstrings,
            min_word_len: DEFAULT_MIN_WORD_LEN,
        }
    }
}

impl TokenPolicy {
    pub fn all_substrings(min_word_len: usize) -> Self {
        Self { mode: TokenMode::AllSubstrings, min_word_len }
    }

    pub fn prefixes(min_word_len: usize) -> Self {
        Self { mode: TokenMode::Prefixes, min_word_len }
    }

    /// Build the token set for a list of field values.
    pub fn tokenize<'a, I>(&self, fields: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tokens = BTreeSet::new();
        for field in fields {
            let normalized = normalize_text(field);
            for word in normalized.split_whitespace() {
                if word.len() < self.min_word_len {
                    continue;
                }
                self.expand_word(word, &mut tokens);
            }
        }
        tokens
    }

    /// Add the tokens of one normalized word to `out`.
    fn expand_word(&self, word: &str, out: &mut BTreeSet<String>) {
        // Normalized words are ASCII, so byte offsets are char boundaries.
        let len = word.len();
        match self.mode {
            TokenMode::AllSubstrings => {
                for start in 0..len {
                    for end in (start + 1)..=len {
                        out.insert(word[start..end].to_string());
                    }
                }
            }
            TokenMode::Prefixes => {
                for end in 1..=len {
                    out.insert(word[..end].to_string());
                }
            }
        }
    }
}

/// Tokenize with the default policy.
pub fn tokenize(fields: &[&str]) -> BTreeSet<String> {
    TokenPolicy::default().tokenize(fields.iter().copied())
}

/// Lowercase and map every character outside `[a-z0-9]` to a space.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { ' ' })
        .collect()
}

/// Normalized words of `text`, in order, empty words removed.
pub fn normalize_words(text: &str) -> Vec<String> {
    normalize_text(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
