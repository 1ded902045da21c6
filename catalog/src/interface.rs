//! Catalog Search FFI Interface Definition
//!
//! This file defines the public types exposed to the presentation layer via UniFFI.
//! It acts as the source of truth for shared types.

use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle of a live search session.
///
/// `Idle → Debouncing → Fetching → Displaying`, with `Failed` as the explicit
/// error state a failed fetch clears to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, uniffi::Enum)]
pub enum SearchPhase {
    #[default]
    Idle,
    Debouncing,
    Fetching,
    Displaying,
    Failed,
}

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// Editable fields of a catalog item. Absent fields are treated as empty text.
#[derive(Debug, Clone, PartialEq, Eq, Default, uniffi::Record)]
pub struct ItemFields {
    pub description: Option<String>,
    pub category: Option<String>,
    pub item_number: Option<String>,
    pub upc_retail: Option<String>,
    pub upc_case: Option<String>,
}

impl ItemFields {
    /// Field values in indexing order. Absent fields yield `""`.
    pub fn values(&self) -> [&str; 5] {
        [
            self.description.as_deref().unwrap_or(""),
            self.category.as_deref().unwrap_or(""),
            self.item_number.as_deref().unwrap_or(""),
            self.upc_retail.as_deref().unwrap_or(""),
            self.upc_case.as_deref().unwrap_or(""),
        ]
    }

    /// Trim every field and drop the ones left empty.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            description: clean(self.description),
            category: clean(self.category),
            item_number: clean(self.item_number),
            upc_retail: clean(self.upc_retail),
            upc_case: clean(self.upc_case),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values().iter().all(|v| v.trim().is_empty())
    }
}

/// A persisted catalog item as shown to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct CatalogItem {
    pub item_id: i64,
    pub fields: ItemFields,
    pub updated_at_unix: i64,
}

/// An item with its relevance score and 0-based position in the result list
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct RankedItem {
    pub item: CatalogItem,
    pub score: u32,
    pub rank: u32,
}

/// Search result container
#[derive(Debug, Clone, PartialEq, Eq, Default, uniffi::Record)]
pub struct SearchResult {
    /// Normalized query words the result was computed for
    pub words: Vec<String>,
    pub items: Vec<RankedItem>,
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Point-in-time view of a live search session
#[derive(Debug, Clone, PartialEq, Eq, Default, uniffi::Record)]
pub struct LiveSnapshot {
    pub phase: SearchPhase,
    /// Raw input the user last typed
    pub input: String,
    /// Sequence number of the request whose result is displayed (0 = none yet)
    pub displayed_seq: u64,
    /// Query the displayed results belong to
    pub displayed_query: String,
    pub results: Vec<RankedItem>,
    pub error: Option<String>,
}

/// Error type for catalog operations
#[derive(Debug, Error, uniffi::Error)]
pub enum CatalogError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Operation cancelled")]
    Cancelled,
}

pub type CatalogResult<T> = Result<T, CatalogError>;

impl From<crate::database::DatabaseError> for CatalogError {
    fn from(e: crate::database::DatabaseError) -> Self {
        use crate::database::DatabaseError;
        match e {
            DatabaseError::NotFound(id) => CatalogError::InvalidInput(format!("no item with id {}", id)),
            DatabaseError::Interrupted => CatalogError::Cancelled,
            other => CatalogError::StoreUnavailable(other.to_string()),
        }
    }
}
