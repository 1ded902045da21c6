//! In-memory token index: token → ids of the items whose token set contains it.
//!
//! Built by running every item through the shared tokenizer, never persisted.

use crate::models::StoredItem;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Default, Clone)]
pub struct TokenIndex {
    postings: HashMap<String, BTreeSet<i64>>,
    /// Reverse map so `remove` does not need the item's old fields
    item_tokens: HashMap<i64, BTreeSet<String>>,
}

impl TokenIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from items. Items without an id are skipped.
    pub fn build<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a StoredItem>,
    {
        let mut index = Self::new();
        for item in items {
            index.insert(item);
        }
        index
    }

    /// Insert or replace the postings of `item`.
    pub fn insert(&mut self, item: &StoredItem) {
        let Some(id) = item.id else {
            return;
        };
        self.remove(id);
        for token in &item.search_tokens {
            self.postings.entry(token.clone()).or_default().insert(id);
        }
        self.item_tokens.insert(id, item.search_tokens.clone());
    }

    pub fn remove(&mut self, id: i64) {
        let Some(tokens) = self.item_tokens.remove(&id) else {
            return;
        };
        for token in tokens {
            if let Some(ids) = self.postings.get_mut(&token) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.postings.remove(&token);
                }
            }
        }
    }

    /// Ids whose token set contains `token`, ascending.
    pub fn lookup(&self, token: &str) -> Vec<i64> {
        self.postings
            .get(token)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Ids whose token set contains any of `tokens`, ascending, deduplicated.
    pub fn lookup_any<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<i64> {
        let mut ids = BTreeSet::new();
        for token in tokens {
            if let Some(found) = self.postings.get(token.as_ref()) {
                ids.extend(found.iter().copied());
            }
        }
        ids.into_iter().collect()
    }

    pub fn num_items(&self) -> usize {
        self.item_tokens.len()
    }

    pub fn num_tokens(&self) -> usize {
        self.postings.len()
    }
}
