//! In-memory `ItemStore` backed by a [`TokenIndex`].
//!
//! Answers containment lookups from the index instead of a database. Used for
//! previews, tests and as the reference for what a containment-filter store
//! must return.

use crate::backend::{ItemStore, StoreCapabilities};
use crate::config::DEFAULT_MAX_LOOKUP_TOKENS;
use crate::index::TokenIndex;
use crate::interface::{CatalogError, CatalogResult, ItemFields};
use crate::models::StoredItem;
use crate::tokenizer::TokenPolicy;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

#[derive(Default)]
struct Inner {
    items: BTreeMap<i64, StoredItem>,
    index: TokenIndex,
}

pub struct MemoryStore {
    policy: TokenPolicy,
    capabilities: StoreCapabilities,
    inner: RwLock<Inner>,
    next_id: AtomicI64,
    fetch_calls: AtomicUsize,
    scan_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_policy(TokenPolicy::default())
    }

    pub fn with_policy(policy: TokenPolicy) -> Self {
        Self {
            policy,
            capabilities: StoreCapabilities {
                token_lookup: true,
                max_any_tokens: DEFAULT_MAX_LOOKUP_TOKENS,
            },
            inner: RwLock::new(Inner::default()),
            next_id: AtomicI64::new(1),
            fetch_calls: AtomicUsize::new(0),
            scan_calls: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// A store that can only scan, like a collection without a token field.
    pub fn without_token_lookup() -> Self {
        Self::new().with_capabilities(StoreCapabilities { token_lookup: false, max_any_tokens: 0 })
    }

    pub fn with_capabilities(mut self, capabilities: StoreCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn policy(&self) -> TokenPolicy {
        self.policy
    }

    /// Save a new item synchronously.
    pub fn insert(&self, fields: ItemFields) -> StoredItem {
        let mut inner = self.inner.write();
        let mut item = StoredItem::new(fields, &self.policy);
        item.id = Some(self.next_id.fetch_add(1, Ordering::SeqCst));
        Self::put(&mut inner, item)
    }

    /// Synchronous write path shared by `insert` and `ItemStore::save`.
    pub fn save_sync(&self, mut item: StoredItem) -> CatalogResult<StoredItem> {
        self.check_available()?;
        let mut inner = self.inner.write();
        item.prepare_for_write(&self.policy);
        match item.id {
            Some(id) => {
                let existing = inner
                    .items
                    .get(&id)
                    .ok_or_else(|| CatalogError::InvalidInput(format!("no item with id {}", id)))?;
                item.created_at_unix = existing.created_at_unix;
            }
            None => item.id = Some(self.next_id.fetch_add(1, Ordering::SeqCst)),
        }
        Ok(Self::put(&mut inner, item))
    }

    fn put(inner: &mut Inner, item: StoredItem) -> StoredItem {
        inner.index.insert(&item);
        if let Some(id) = item.id {
            inner.items.insert(id, item.clone());
        }
        item
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fetch calls of any kind served so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_all` calls served so far.
    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    /// Simulate an outage: every call fails with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> CatalogResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::StoreUnavailable("memory store offline".into()));
        }
        Ok(())
    }

    fn begin_fetch(&self) -> CatalogResult<()> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()
    }

    fn collect(&self, ids: Vec<i64>, limit: usize) -> Vec<StoredItem> {
        let inner = self.inner.read();
        ids.into_iter()
            .filter_map(|id| inner.items.get(&id).cloned())
            .take(limit)
            .collect()
    }
}

#[async_trait::async_trait]
impl ItemStore for MemoryStore {
    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities
    }

    async fn fetch_all(&self, limit: usize) -> CatalogResult<Vec<StoredItem>> {
        self.begin_fetch()?;
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.read().items.values().take(limit).cloned().collect())
    }

    async fn fetch_by_token(&self, token: &str, limit: usize) -> CatalogResult<Vec<StoredItem>> {
        self.begin_fetch()?;
        if !self.capabilities.token_lookup {
            return Err(CatalogError::InvalidInput("store has no token lookup".into()));
        }
        let ids = self.inner.read().index.lookup(token);
        Ok(self.collect(ids, limit))
    }

    async fn fetch_by_any_token(&self, tokens: &[String], limit: usize) -> CatalogResult<Vec<StoredItem>> {
        self.begin_fetch()?;
        if !self.capabilities.supports_disjunction() {
            return Err(CatalogError::InvalidInput("store has no disjunctive lookup".into()));
        }
        if tokens.len() > self.capabilities.max_any_tokens {
            return Err(CatalogError::InvalidInput(format!(
                "{} lookup tokens exceed the store limit of {}",
                tokens.len(),
                self.capabilities.max_any_tokens
            )));
        }
        let ids = self.inner.read().index.lookup_any(tokens);
        Ok(self.collect(ids, limit))
    }

    async fn save(&self, item: StoredItem) -> CatalogResult<StoredItem> {
        self.save_sync(item)
    }

    async fn delete(&self, id: i64) -> CatalogResult<()> {
        self.check_available()?;
        let mut inner = self.inner.write();
        inner.items.remove(&id);
        inner.index.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(description: &str) -> ItemFields {
        ItemFields { description: Some(description.into()), ..Default::default() }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = store.insert(fields("Coca Cola"));
        let b = store.insert(fields("Pepsi"));
        assert_eq!(a.id, Some(1));
        assert_eq!(b.id, Some(2));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_save_regenerates_tokens() {
        let store = MemoryStore::new();
        let mut item = store.insert(fields("Coca Cola"));
        item.fields.description = Some("Sprite".into());
        // Caller-supplied tokens are ignored
        item.search_tokens.insert("bogus".into());
        let saved = store.save(item).await.unwrap();

        assert!(saved.has_token("sprite"));
        assert!(!saved.has_token("bogus"));
        assert!(store.fetch_by_token("cola", 10).await.unwrap().is_empty());
        assert_eq!(store.fetch_by_token("prit", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_unknown_id_rejected() {
        let store = MemoryStore::new();
        let item = StoredItem::existing(99, fields("Ghost"), &store.policy());
        let err = store.save(item).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_update_keeps_created_at() {
        let store = MemoryStore::new();
        let original = store.insert(fields("Coca Cola"));
        let mut edit = original.clone();
        edit.created_at_unix = 0;
        let saved = store.save(edit).await.unwrap();
        assert_eq!(saved.created_at_unix, original.created_at_unix);
    }

    #[tokio::test]
    async fn test_delete_removes_from_lookups() {
        let store = MemoryStore::new();
        let item = store.insert(fields("Coca Cola"));
        store.delete(item.id.unwrap()).await.unwrap();
        assert!(store.fetch_by_token("cola", 10).await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_limit_applied() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.insert(fields(&format!("Cola {}", i)));
        }
        assert_eq!(store.fetch_by_token("cola", 3).await.unwrap().len(), 3);
        assert_eq!(store.fetch_all(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_disjunction_limit_enforced() {
        let store = MemoryStore::new().with_capabilities(StoreCapabilities { token_lookup: true, max_any_tokens: 2 });
        let tokens: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert!(store.fetch_by_any_token(&tokens, 10).await.is_err());
        assert!(store.fetch_by_any_token(&tokens[..2], 10).await.is_ok());
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_call() {
        let store = MemoryStore::new();
        store.insert(fields("Coca Cola"));
        store.set_unavailable(true);
        assert!(matches!(store.fetch_all(10).await, Err(CatalogError::StoreUnavailable(_))));
        assert!(matches!(store.delete(1).await, Err(CatalogError::StoreUnavailable(_))));
        store.set_unavailable(false);
        assert_eq!(store.fetch_all(10).await.unwrap().len(), 1);
    }
}
