//! CatalogStore - Main API for the presentation layer
//!
//! Persistent `ItemStore` over SQLite, designed for UniFFI export. The token
//! child table is the containment filter; matching and ranking run in the
//! shared search pipeline.
//!
//! Async Cancellation Architecture:
//! When the caller cancels an async task, UniFFI drops the Rust Future. We intercept this
//! via a DropGuard that triggers a CancellationToken. The blocking fetch thread
//! watches this token and interrupts SQLite mid-statement.

use crate::backend::{ItemStore, StoreCapabilities};
use crate::config::SearchConfig;
use crate::database::{Database, DatabaseError, DatabaseResult};
use crate::interface::{CatalogError, CatalogItem, CatalogResult, ItemFields, SearchResult};
use crate::live::LiveQuery;
use crate::models::StoredItem;
use crate::search::run_search;
use crate::tokenizer::TokenPolicy;
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::{Arc, Once};
use tokio_util::sync::CancellationToken;

/// Global fallback Tokio runtime for when async functions are called outside any runtime context.
/// This is shared across all CatalogStore instances and never dropped.
/// Used by UniFFI which doesn't provide a tokio runtime.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

static RAYON_INIT: Once = Once::new();

/// Initialize global Rayon thread pool, leaving cores for Tokio
fn init_rayon() {
    RAYON_INIT.call_once(|| {
        let num_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        let rayon_threads = num_threads.saturating_sub(2).max(1);

        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(rayon_threads)
            .thread_name(|i| format!("catalog-rayon-{}", i))
            .build_global();
    });
}

/// RAII guard that cancels a token when dropped.
/// When the caller cancels an async task, UniFFI drops the Future, which drops this guard,
/// which triggers the cancellation token.
struct DropGuard {
    token: CancellationToken,
}

impl DropGuard {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Thread-safe catalog store with SQLite
///
/// Concurrency Model:
/// - Database uses r2d2 connection pool (concurrent reads, no mutex blocking)
/// - Fetches are async with cancellation support via CancellationToken
/// - Blocking work runs on tokio::spawn_blocking threads
/// - Uses global FALLBACK_RUNTIME when called outside any runtime (e.g., from UniFFI)
#[derive(uniffi::Object)]
pub struct CatalogStore {
    db: Arc<Database>,
    config: SearchConfig,
}

// Internal implementation (not exported via FFI)
impl CatalogStore {
    /// Open a store at `path` with an explicit configuration. Re-tokenizes
    /// every item when the stored token policy differs from the configured one.
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: SearchConfig) -> CatalogResult<Self> {
        config.validate()?;
        init_rayon();
        let db = Database::open(path)?;
        let store = Self { db: Arc::new(db), config };
        store.sync_token_policy()?;
        Ok(store)
    }

    /// Create a store with an in-memory database (for testing)
    #[cfg(test)]
    pub(crate) fn new_in_memory() -> CatalogResult<Self> {
        Self::in_memory_with_config(SearchConfig::default())
    }

    #[cfg(test)]
    pub(crate) fn in_memory_with_config(config: SearchConfig) -> CatalogResult<Self> {
        init_rayon();
        let db = Database::open_in_memory()?;
        let store = Self { db: Arc::new(db), config };
        store.sync_token_policy()?;
        Ok(store)
    }

    pub fn token_policy(&self) -> TokenPolicy {
        self.config.token_policy
    }

    /// Get a tokio runtime handle - uses current runtime if available, otherwise global fallback
    fn runtime_handle(&self) -> tokio::runtime::Handle {
        tokio::runtime::Handle::try_current()
            .unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
    }

    fn sync_token_policy(&self) -> CatalogResult<()> {
        let policy = self.token_policy();
        let stored = self.db.stored_token_policy()?;
        if stored == Some(policy) {
            return Ok(());
        }

        if self.db.count_items()? > 0 {
            tracing::info!(?stored, ?policy, "token policy changed, re-tokenizing catalog");
            Self::retokenize(&self.db, &policy)?;
        }
        self.db.set_stored_token_policy(&policy)?;
        Ok(())
    }

    fn retokenize(db: &Database, policy: &TokenPolicy) -> DatabaseResult<u64> {
        use rayon::prelude::*;

        let mut items = db.fetch_all_items()?;
        items.par_iter_mut().for_each(|item| item.refresh_tokens(policy));
        db.replace_tokens(&items)?;
        Ok(items.len() as u64)
    }

    /// Write path shared by the FFI methods and `ItemStore::save`.
    fn write_item(db: &Database, policy: &TokenPolicy, mut item: StoredItem) -> DatabaseResult<StoredItem> {
        item.prepare_for_write(policy);
        if let Some(id) = item.id {
            let existing = db
                .fetch_items_by_ids(&[id])?
                .into_iter()
                .next()
                .ok_or(DatabaseError::NotFound(id))?;
            item.created_at_unix = existing.created_at_unix;
        }
        let id = db.save_item(&item)?;
        item.id = Some(id);
        Ok(item)
    }

    /// Import a batch of new items in a single transaction.
    pub fn import_batch(&self, batch: Vec<ItemFields>) -> CatalogResult<usize> {
        let policy = self.token_policy();
        let mut items: Vec<StoredItem> = batch
            .into_iter()
            .map(|fields| fields.normalized())
            .filter(|fields| !fields.is_empty())
            .map(|fields| StoredItem::new(fields, &policy))
            .collect();
        Ok(self.db.save_items(&mut items)?)
    }

    /// Run blocking database work on the runtime's blocking pool. Dropping
    /// the returned future cancels the token handed to `work`.
    async fn run_blocking<T, F>(&self, work: F) -> CatalogResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database, &CancellationToken, &tokio::runtime::Handle) -> DatabaseResult<T> + Send + 'static,
    {
        // Create cancellation token and guard
        let token = CancellationToken::new();
        let _guard = DropGuard::new(token.clone());

        let runtime = self.runtime_handle();
        let runtime_for_closure = runtime.clone();
        let db = Arc::clone(&self.db);
        let token_clone = token.clone();

        // We use runtime.spawn_blocking() instead of tokio::task::spawn_blocking()
        // because UniFFI doesn't provide a tokio runtime context
        let handle = runtime.spawn_blocking(move || work(&db, &token_clone, &runtime_for_closure));

        match handle.await {
            Ok(result) => result.map_err(CatalogError::from),
            // JoinError means the task panicked or was aborted
            Err(_join_error) => Err(CatalogError::Cancelled),
        }
    }
}

// FFI-exported constructor (must be in standalone impl block)
#[uniffi::export]
impl CatalogStore {
    /// Create a new store with a database at the given path
    #[uniffi::constructor]
    pub fn new(db_path: String) -> Result<Self, CatalogError> {
        Self::open_with_config(db_path, SearchConfig::default())
    }
}

#[uniffi::export]
impl CatalogStore {
    /// Get the database size in bytes
    pub fn database_size(&self) -> i64 {
        self.db.database_size().unwrap_or(0)
    }

    pub fn item_count(&self) -> Result<u64, CatalogError> {
        Ok(self.db.count_items()?)
    }

    /// Save an item. With `item_id` set this is an edit of an existing item;
    /// either way the token set is regenerated from `fields`.
    pub fn save_item(&self, fields: ItemFields, item_id: Option<i64>) -> Result<CatalogItem, CatalogError> {
        let fields = fields.normalized();
        if fields.is_empty() {
            return Err(CatalogError::InvalidInput("item has no field values".into()));
        }
        let policy = self.token_policy();
        let item = match item_id {
            Some(id) => StoredItem::existing(id, fields, &policy),
            None => StoredItem::new(fields, &policy),
        };
        let saved = Self::write_item(&self.db, &policy, item)?;
        Ok(saved.to_catalog_item())
    }

    pub fn delete_item(&self, item_id: i64) -> Result<(), CatalogError> {
        self.db.delete_item(item_id)?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CatalogError> {
        self.db.clear_all()?;
        Ok(())
    }

    /// Fetch full items by IDs for detail views, in the requested order
    pub fn fetch_by_ids(&self, item_ids: Vec<i64>) -> Result<Vec<CatalogItem>, CatalogError> {
        let stored_items = self.db.fetch_items_by_ids(&item_ids)?;
        Ok(stored_items.iter().map(StoredItem::to_catalog_item).collect())
    }

    /// Oldest-first listing for the admin view
    pub fn list_items(&self, limit: u32) -> Result<Vec<CatalogItem>, CatalogError> {
        let token = CancellationToken::new();
        let items = self
            .db
            .fetch_page_interruptible(limit as usize, &token, &self.runtime_handle())?;
        Ok(items.iter().map(StoredItem::to_catalog_item).collect())
    }

    /// Rebuild every item's token set under the current policy
    pub fn reindex(&self) -> Result<u64, CatalogError> {
        let count = Self::retokenize(&self.db, &self.token_policy())?;
        self.db.set_stored_token_policy(&self.token_policy())?;
        tracing::info!(count, "re-tokenized catalog");
        Ok(count)
    }

    /// One-shot search. Empty queries return an empty result without a fetch.
    ///
    /// This is an async function that supports cancellation. When the caller drops the task,
    /// the DropGuard on the fetch triggers the CancellationToken, interrupting SQLite.
    pub async fn search(&self, query: String) -> Result<SearchResult, CatalogError> {
        run_search(self, &query, &self.config).await
    }

    /// Start a live query session over this store
    pub fn open_session(self: Arc<Self>) -> Arc<LiveQuery> {
        let runtime = self.runtime_handle();
        let config = self.config.clone();
        Arc::new(LiveQuery::new(self, config, runtime))
    }
}

#[async_trait::async_trait]
impl ItemStore for CatalogStore {
    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            token_lookup: true,
            max_any_tokens: self.config.max_lookup_tokens,
        }
    }

    async fn fetch_all(&self, limit: usize) -> CatalogResult<Vec<StoredItem>> {
        self.run_blocking(move |db, token, runtime| db.fetch_page_interruptible(limit, token, runtime))
            .await
    }

    async fn fetch_by_token(&self, token: &str, limit: usize) -> CatalogResult<Vec<StoredItem>> {
        let tokens = vec![token.to_string()];
        self.run_blocking(move |db, cancel, runtime| {
            db.fetch_by_tokens_interruptible(&tokens, limit, cancel, runtime)
        })
        .await
    }

    async fn fetch_by_any_token(&self, tokens: &[String], limit: usize) -> CatalogResult<Vec<StoredItem>> {
        if tokens.len() > self.config.max_lookup_tokens {
            return Err(CatalogError::InvalidInput(format!(
                "{} lookup tokens exceed the store limit of {}",
                tokens.len(),
                self.config.max_lookup_tokens
            )));
        }
        let tokens = tokens.to_vec();
        self.run_blocking(move |db, cancel, runtime| {
            db.fetch_by_tokens_interruptible(&tokens, limit, cancel, runtime)
        })
        .await
    }

    async fn save(&self, item: StoredItem) -> CatalogResult<StoredItem> {
        let policy = self.token_policy();
        self.run_blocking(move |db, _, _| Self::write_item(db, &policy, item)).await
    }

    async fn delete(&self, id: i64) -> CatalogResult<()> {
        self.run_blocking(move |db, _, _| db.delete_item(id)).await
    }
}
