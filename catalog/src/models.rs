//! Core data models for catalog storage

use crate::interface::{CatalogItem, ItemFields};
use crate::tokenizer::TokenPolicy;
use std::collections::BTreeSet;

// ─────────────────────────────────────────────────────────────────────────────
// INTERNAL ITEM (not exposed via FFI, used for storage)
// ─────────────────────────────────────────────────────────────────────────────

/// Internal catalog item representation: fields plus the denormalized token set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    /// Store-assigned id; `None` until first saved
    pub id: Option<i64>,
    pub fields: ItemFields,
    /// Derived from `fields`; regenerated by every store write
    pub search_tokens: BTreeSet<String>,
    pub created_at_unix: i64,
    pub updated_at_unix: i64,
}

impl StoredItem {
    /// Create a new, unsaved item with tokens derived under `policy`
    pub fn new(fields: ItemFields, policy: &TokenPolicy) -> Self {
        let now = chrono::Utc::now().timestamp();
        let mut item = Self {
            id: None,
            fields: fields.normalized(),
            search_tokens: BTreeSet::new(),
            created_at_unix: now,
            updated_at_unix: now,
        };
        item.refresh_tokens(policy);
        item
    }

    /// An edit of an existing item (admin update path)
    pub fn existing(id: i64, fields: ItemFields, policy: &TokenPolicy) -> Self {
        let mut item = Self::new(fields, policy);
        item.id = Some(id);
        item
    }

    /// Field values in indexing order
    pub fn field_values(&self) -> [&str; 5] {
        self.fields.values()
    }

    /// Regenerate the token set from the current field values.
    pub fn refresh_tokens(&mut self, policy: &TokenPolicy) {
        self.search_tokens = policy.tokenize(self.fields.values());
    }

    /// Prepare for a write: regenerate tokens and stamp the update time.
    pub fn prepare_for_write(&mut self, policy: &TokenPolicy) {
        self.refresh_tokens(policy);
        self.updated_at_unix = chrono::Utc::now().timestamp();
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.search_tokens.contains(token)
    }

    /// Convert to the FFI-facing representation
    pub fn to_catalog_item(&self) -> CatalogItem {
        CatalogItem {
            item_id: self.id.unwrap_or(0),
            fields: self.fields.clone(),
            updated_at_unix: self.updated_at_unix,
        }
    }
}
