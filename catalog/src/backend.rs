//! The backing-store capability surface consumed by the search core.
//!
//! Stores return unordered batches; nothing downstream relies on their order
//! beyond using it as the ranking tiebreak.

use crate::interface::CatalogResult;
use crate::models::StoredItem;

/// What containment queries a store can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCapabilities {
    /// Store can filter by "token set contains token".
    pub token_lookup: bool,
    /// Largest disjunction `fetch_by_any_token` accepts. `0` or `1` means the
    /// store cannot OR tokens together.
    pub max_any_tokens: usize,
}

impl StoreCapabilities {
    pub fn supports_disjunction(&self) -> bool {
        self.token_lookup && self.max_any_tokens > 1
    }
}

#[async_trait::async_trait]
pub trait ItemStore: Send + Sync {
    fn capabilities(&self) -> StoreCapabilities;

    /// Bounded scan of all items.
    async fn fetch_all(&self, limit: usize) -> CatalogResult<Vec<StoredItem>>;

    /// Items whose token set contains `token` exactly.
    async fn fetch_by_token(&self, token: &str, limit: usize) -> CatalogResult<Vec<StoredItem>>;

    /// Items whose token set contains any of `tokens`. Callers keep
    /// `tokens.len()` within `capabilities().max_any_tokens`.
    async fn fetch_by_any_token(&self, tokens: &[String], limit: usize) -> CatalogResult<Vec<StoredItem>>;

    /// Persist `item`, assigning an id if it has none. Implementations
    /// regenerate the token set from the fields before writing.
    async fn save(&self, item: StoredItem) -> CatalogResult<StoredItem>;

    async fn delete(&self, id: i64) -> CatalogResult<()>;
}
