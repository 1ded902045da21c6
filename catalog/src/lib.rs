//! Catalog Search Core - substring search over a product catalog
//!
//! Items are indexed by precomputing a token set per item (every substring of
//! every word) so that a store offering only exact "token set contains token"
//! filters can answer substring queries. Query text is planned into a single
//! containment lookup, refined client-side with ALL-words matching, and ranked
//! by field match quality. A live session debounces input and only ever
//! displays the latest issued request.
//!
//! Types are exported via UniFFI proc-macros (#[derive(uniffi::Record/Enum/Object)]).

pub mod backend;
pub mod config;
pub mod database;
pub mod index;
pub mod interface;
pub mod live;
pub mod matcher;
pub mod memory;
pub mod models;
pub mod planner;
pub mod ranking;
pub mod search;
mod store;
pub mod tokenizer;

pub use backend::{ItemStore, StoreCapabilities};
pub use config::{LookupStrategy, MatchPolicy, SearchConfig};
pub use interface::*;
pub use live::LiveQuery;
pub use memory::MemoryStore;
pub use search::run_search;
pub use store::CatalogStore;
pub use tokenizer::{tokenize, TokenMode, TokenPolicy};

uniffi::setup_scaffolding!("catalog_search");
