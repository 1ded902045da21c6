//! Relevance ranking for matched items.
//!
//! Each query word scores against every field and keeps its best tier:
//!
//! | Tier      | Condition                        | Score |
//! |-----------|----------------------------------|-------|
//! | Exact     | field equals the word            | 100   |
//! | Prefix    | field starts with the word       | 50    |
//! | Substring | field contains the word          | 10    |
//!
//! The item score is the sum over query words. Sorting is stable, so equal
//! scores keep the order the store returned them in. Items scoring zero are
//! dropped even if the matcher kept them.

use crate::interface::RankedItem;
use crate::models::StoredItem;
use rayon::prelude::*;

pub const EXACT_FIELD_SCORE: u32 = 100;
pub const PREFIX_FIELD_SCORE: u32 = 50;
pub const SUBSTRING_FIELD_SCORE: u32 = 10;

/// How a word relates to one field. Ordered weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldMatchKind {
    None,
    Substring,
    Prefix,
    Exact,
}

impl FieldMatchKind {
    pub fn score(self) -> u32 {
        match self {
            FieldMatchKind::None => 0,
            FieldMatchKind::Substring => SUBSTRING_FIELD_SCORE,
            FieldMatchKind::Prefix => PREFIX_FIELD_SCORE,
            FieldMatchKind::Exact => EXACT_FIELD_SCORE,
        }
    }
}

/// Classify `word` (already lowercase) against a lowercased field.
pub fn field_match(field_lower: &str, word: &str) -> FieldMatchKind {
    if word.is_empty() || field_lower.is_empty() {
        FieldMatchKind::None
    } else if field_lower == word {
        FieldMatchKind::Exact
    } else if field_lower.starts_with(word) {
        FieldMatchKind::Prefix
    } else if field_lower.contains(word) {
        FieldMatchKind::Substring
    } else {
        FieldMatchKind::None
    }
}

/// Total relevance score of `item` for `words`.
pub fn score_item(item: &StoredItem, words: &[String]) -> u32 {
    let fields: Vec<String> = item
        .field_values()
        .iter()
        .map(|f| f.to_lowercase())
        .collect();

    words
        .iter()
        .map(|word| {
            fields
                .iter()
                .map(|field| field_match(field, word))
                .max()
                .unwrap_or(FieldMatchKind::None)
                .score()
        })
        .sum()
}

/// Score, filter and order `matched`. Ranks are 0-based positions.
pub fn rank(matched: Vec<StoredItem>, words: &[String]) -> Vec<RankedItem> {
    // Collecting a rayon iterator into a Vec keeps input order even after
    // `filter`; the stable sort below relies on it for ties.
    let mut scored: Vec<(u32, StoredItem)> = matched
        .into_par_iter()
        .map(|item| (score_item(&item, words), item))
        .filter(|(score, _)| *score > 0)
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    scored
        .into_iter()
        .enumerate()
        .map(|(position, (score, item))| RankedItem {
            item: item.to_catalog_item(),
            score,
            rank: position as u32,
        })
        .collect()
}
