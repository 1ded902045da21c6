//! SQLite database layer for catalog storage
//!
//! Schema: `items` holds the fields plus the token set as a JSON column;
//! `item_tokens` holds one row per (token, item) and acts as the exact-match
//! containment filter. Both are rewritten together in every write transaction.
//! Uses r2d2 connection pooling to allow concurrent reads without mutex blocking.

use crate::interface::ItemFields;
use crate::models::StoredItem;
use crate::tokenizer::TokenPolicy;
use chrono::{DateTime, TimeZone, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No item with id {0}")]
    NotFound(i64),
    #[error("Query interrupted")]
    Interrupted,
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ffi::ErrorCode::OperationInterrupted =>
            {
                DatabaseError::Interrupted
            }
            _ => DatabaseError::Sqlite(e),
        }
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

const ITEM_COLUMNS: &str =
    "id, itemDescription, category, itemNumber, upcRetail, upcCase, searchTokens, createdAt, updatedAt";

const TOKEN_POLICY_KEY: &str = "token_policy";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse timestamp string from database to DateTime<Utc>
fn parse_db_timestamp(timestamp_str: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(timestamp_str, TIMESTAMP_FORMAT)
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(timestamp_str, "%Y-%m-%d %H:%M:%S"))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or_else(|_| Utc::now())
}

fn format_db_timestamp(unix: i64) -> String {
    Utc.timestamp_opt(unix, 0)
        .single()
        .unwrap_or_else(Utc::now)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Thread-safe database wrapper using connection pooling
///
/// Uses r2d2 connection pool for concurrent read access.
/// WAL mode enables readers to proceed without blocking each other.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create a database at the given path with connection pooling
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| {
                conn.execute_batch("
                    PRAGMA journal_mode=WAL;
                    PRAGMA synchronous=NORMAL;
                    PRAGMA foreign_keys=ON;
                    PRAGMA cache_size=-32000;
                ")?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(8)
            .build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| {
                conn.execute_batch("PRAGMA foreign_keys=ON;")?;
                Ok(())
            });

        // In-memory needs single connection to maintain state
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)?;

        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// Get a connection from the pool
    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                itemDescription TEXT,
                category TEXT,
                itemNumber TEXT,
                upcRetail TEXT,
                upcCase TEXT,
                searchTokens TEXT NOT NULL DEFAULT '[]',
                createdAt TEXT NOT NULL,
                updatedAt TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS item_tokens (
                token TEXT NOT NULL,
                itemId INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
                PRIMARY KEY (token, itemId)
            ) WITHOUT ROWID;

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_item_tokens_item ON item_tokens(itemId);
        "#)?;
        Ok(())
    }

    /// Get the database size in bytes
    pub fn database_size(&self) -> DatabaseResult<i64> {
        let conn = self.get_conn()?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok(page_count * page_size)
    }

    /// Get total number of items in the database
    pub fn count_items(&self) -> DatabaseResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Token policy bookkeeping
    // ─────────────────────────────────────────────────────────────────────────

    /// The policy the stored token rows were generated with, if recorded
    pub fn stored_token_policy(&self) -> DatabaseResult<Option<TokenPolicy>> {
        let conn = self.get_conn()?;
        let result = conn.query_row(
            "SELECT value FROM meta WHERE key = ?1",
            [TOKEN_POLICY_KEY],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_stored_token_policy(&self, policy: &TokenPolicy) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![TOKEN_POLICY_KEY, serde_json::to_string(policy)?],
        )?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or update one item and its token rows in a single transaction.
    /// Returns the item id. The caller is responsible for having refreshed
    /// `item.search_tokens`.
    pub fn save_item(&self, item: &StoredItem) -> DatabaseResult<i64> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let id = Self::write_item(&tx, item)?;
        tx.commit()?;
        Ok(id)
    }

    /// Write a batch of items in one transaction, assigning ids to new ones.
    pub fn save_items(&self, items: &mut [StoredItem]) -> DatabaseResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        for item in items.iter_mut() {
            let id = Self::write_item(&tx, item)?;
            item.id = Some(id);
        }
        tx.commit()?;
        Ok(items.len())
    }

    fn write_item(conn: &Connection, item: &StoredItem) -> DatabaseResult<i64> {
        let tokens_json = serde_json::to_string(&item.search_tokens)?;
        let fields = &item.fields;

        let item_id = match item.id {
            Some(id) => {
                let changed = conn.execute(
                    r#"UPDATE items SET itemDescription = ?1, category = ?2, itemNumber = ?3,
                           upcRetail = ?4, upcCase = ?5, searchTokens = ?6, updatedAt = ?7
                       WHERE id = ?8"#,
                    params![
                        fields.description,
                        fields.category,
                        fields.item_number,
                        fields.upc_retail,
                        fields.upc_case,
                        tokens_json,
                        format_db_timestamp(item.updated_at_unix),
                        id,
                    ],
                )?;
                if changed == 0 {
                    return Err(DatabaseError::NotFound(id));
                }
                conn.execute("DELETE FROM item_tokens WHERE itemId = ?1", [id])?;
                id
            }
            None => {
                conn.execute(
                    r#"INSERT INTO items (itemDescription, category, itemNumber, upcRetail, upcCase, searchTokens, createdAt, updatedAt)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                    params![
                        fields.description,
                        fields.category,
                        fields.item_number,
                        fields.upc_retail,
                        fields.upc_case,
                        tokens_json,
                        format_db_timestamp(item.created_at_unix),
                        format_db_timestamp(item.updated_at_unix),
                    ],
                )?;
                conn.last_insert_rowid()
            }
        };

        let mut stmt = conn.prepare_cached("INSERT INTO item_tokens (token, itemId) VALUES (?1, ?2)")?;
        for token in &item.search_tokens {
            stmt.execute(params![token, item_id])?;
        }

        Ok(item_id)
    }

    /// Replace the token column and token rows of every item, in one
    /// transaction. Used after a token policy change.
    pub fn replace_tokens(&self, items: &[StoredItem]) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM item_tokens", [])?;
        {
            let mut update = tx.prepare_cached("UPDATE items SET searchTokens = ?1 WHERE id = ?2")?;
            let mut insert = tx.prepare_cached("INSERT INTO item_tokens (token, itemId) VALUES (?1, ?2)")?;
            for item in items {
                let Some(id) = item.id else { continue };
                update.execute(params![serde_json::to_string(&item.search_tokens)?, id])?;
                for token in &item.search_tokens {
                    insert.execute(params![token, id])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete an item (CASCADE removes its token rows)
    pub fn delete_item(&self, id: i64) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM items WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn clear_all(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM items", [])?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch items by IDs, preserving the order of the input IDs
    pub fn fetch_items_by_ids(&self, ids: &[i64]) -> DatabaseResult<Vec<StoredItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!("SELECT {} FROM items WHERE id IN ({})", ITEM_COLUMNS, placeholders);

        let mut stmt = conn.prepare(&sql)?;
        let items: Vec<StoredItem> = stmt
            .query_map(params_from_iter(ids.iter()), Self::row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;

        // Re-sort to match input ID order
        let mut id_to_item: HashMap<i64, StoredItem> = items
            .into_iter()
            .filter_map(|item| item.id.map(|id| (id, item)))
            .collect();

        Ok(ids.iter().filter_map(|id| id_to_item.remove(id)).collect())
    }

    /// Fetch every item, oldest first (for re-tokenization)
    pub fn fetch_all_items(&self) -> DatabaseResult<Vec<StoredItem>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM items ORDER BY id", ITEM_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map([], Self::row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Bounded scan, oldest first, with SQLite C-level interrupt support.
    pub fn fetch_page_interruptible(
        &self,
        limit: usize,
        token: &CancellationToken,
        runtime: &tokio::runtime::Handle,
    ) -> DatabaseResult<Vec<StoredItem>> {
        let sql = format!("SELECT {} FROM items ORDER BY id LIMIT ?1", ITEM_COLUMNS);
        let params = vec![rusqlite::types::Value::Integer(limit as i64)];
        self.query_items_interruptible(&sql, params, token, runtime)
    }

    /// Items whose token rows contain any of `tokens`, oldest first, with
    /// SQLite C-level interrupt support. A single token is a plain containment
    /// lookup.
    pub fn fetch_by_tokens_interruptible(
        &self,
        tokens: &[String],
        limit: usize,
        token: &CancellationToken,
        runtime: &tokio::runtime::Handle,
    ) -> DatabaseResult<Vec<StoredItem>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = tokens.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            r#"SELECT {} FROM items
               WHERE id IN (SELECT itemId FROM item_tokens WHERE token IN ({}))
               ORDER BY id
               LIMIT ?"#,
            ITEM_COLUMNS, placeholders
        );

        let mut params: Vec<rusqlite::types::Value> =
            tokens.iter().map(|t| rusqlite::types::Value::Text(t.clone())).collect();
        params.push(rusqlite::types::Value::Integer(limit as i64));

        self.query_items_interruptible(&sql, params, token, runtime)
    }

    /// Run an item query; cancelling `token` interrupts the statement.
    fn query_items_interruptible(
        &self,
        sql: &str,
        params: Vec<rusqlite::types::Value>,
        token: &CancellationToken,
        runtime: &tokio::runtime::Handle,
    ) -> DatabaseResult<Vec<StoredItem>> {
        use tokio_util::task::AbortOnDropHandle;

        if token.is_cancelled() {
            return Err(DatabaseError::Interrupted);
        }

        let conn = self.get_conn()?;
        let interrupt_handle = conn.get_interrupt_handle();

        let token_clone = token.clone();
        let watcher = runtime.spawn(async move {
            token_clone.cancelled().await;
            interrupt_handle.interrupt();
        });
        let _abort_guard = AbortOnDropHandle::new(watcher);

        let mut stmt = conn.prepare(sql)?;
        let items = stmt
            .query_map(params_from_iter(params), Self::row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<StoredItem> {
        let id: i64 = row.get(0)?;
        let fields = ItemFields {
            description: row.get(1)?,
            category: row.get(2)?,
            item_number: row.get(3)?,
            upc_retail: row.get(4)?,
            upc_case: row.get(5)?,
        };
        let tokens_json: String = row.get(6)?;
        let created_at: String = row.get(7)?;
        let updated_at: String = row.get(8)?;

        let search_tokens: BTreeSet<String> = serde_json::from_str(&tokens_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(StoredItem {
            id: Some(id),
            fields,
            search_tokens,
            created_at_unix: parse_db_timestamp(&created_at).timestamp(),
            updated_at_unix: parse_db_timestamp(&updated_at).timestamp(),
        })
    }
}
