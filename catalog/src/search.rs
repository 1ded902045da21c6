//! Search pipeline: plan → containment fetch → match → rank.
//!
//! Shared by the one-shot `CatalogStore::search` and the live controller so
//! every read path evaluates queries the same way.

use crate::backend::ItemStore;
use crate::config::SearchConfig;
use crate::interface::{CatalogResult, SearchResult};
use crate::matcher::filter_matches;
use crate::planner::{Lookup, QueryPlanner};
use crate::ranking::rank;

/// Run `query` against `store`. An empty query returns an empty result
/// without touching the store.
pub async fn run_search(
    store: &dyn ItemStore,
    query: &str,
    config: &SearchConfig,
) -> CatalogResult<SearchResult> {
    let Some(plan) = QueryPlanner::new(config).plan(query, store.capabilities()) else {
        return Ok(SearchResult::default());
    };

    let candidates = match &plan.lookup {
        Lookup::AnyOf(tokens) => store.fetch_by_any_token(tokens, config.fetch_limit).await?,
        Lookup::Token(token) => store.fetch_by_token(token, config.fetch_limit).await?,
        Lookup::Scan => store.fetch_all(config.full_scan_limit).await?,
    };
    let fetched = candidates.len();

    let matched = filter_matches(candidates, &plan.words, config.match_policy);
    let items = rank(matched, &plan.words);

    tracing::debug!(
        words = ?plan.words,
        lookup = ?plan.lookup,
        fetched,
        returned = items.len(),
        "search complete"
    );

    Ok(SearchResult { words: plan.words, items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LookupStrategy;
    use crate::interface::ItemFields;
    use crate::memory::MemoryStore;
    use crate::tokenizer::TokenPolicy;

    fn fields(description: &str, item_number: &str) -> ItemFields {
        ItemFields {
            description: Some(description.into()),
            item_number: Some(item_number.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_query_skips_store() {
        let store = MemoryStore::new();
        store.insert(fields("Coca Cola", "4001"));
        let result = run_search(&store, "   ", &SearchConfig::default()).await.unwrap();
        assert!(result.is_empty());
        assert!(result.words.is_empty());
        assert_eq!(store.fetch_calls(), 0);
    }

    #[tokio::test]
    async fn test_multi_word_and_semantics() {
        let store = MemoryStore::new();
        store.insert(fields("Coca Cola 12oz", "4001"));
        store.insert(fields("Coca Cola 2L", "4002"));
        store.insert(fields("Pepsi", "4001"));

        let result = run_search(&store, "coca 4001", &SearchConfig::default()).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].item.fields.description.as_deref(), Some("Coca Cola 12oz"));
        assert_eq!(result.words, vec!["coca", "4001"]);
        assert_eq!(store.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_disjunction_recovers_items_indexed_under_other_policy() {
        // Indexed with prefixes only: "tain" is not a stored token
        let store = MemoryStore::with_policy(TokenPolicy::prefixes(2));
        store.insert(fields("Mountain Dew", "7001"));

        let any = SearchConfig::default();
        let result = run_search(&store, "tain 7001", &any).await.unwrap();
        assert_eq!(result.items.len(), 1);

        let first = SearchConfig { lookup: LookupStrategy::FirstWord, ..Default::default() };
        let result = run_search(&store, "tain 7001", &first).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_full_scan_path() {
        let store = MemoryStore::without_token_lookup();
        store.insert(fields("Coca Cola", "4001"));
        store.insert(fields("Pepsi", "5001"));
        let result = run_search(&store, "cola", &SearchConfig::default()).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(store.scan_calls(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = MemoryStore::new();
        store.insert(fields("Coca Cola", "4001"));
        store.set_unavailable(true);
        let err = run_search(&store, "cola", &SearchConfig::default()).await.unwrap_err();
        assert!(matches!(err, crate::interface::CatalogError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn test_any_policy_finds_items_matching_only_a_later_word() {
        let store = MemoryStore::new();
        store.insert(fields("Pepsi 12oz", "5001"));

        let capped = SearchConfig {
            match_policy: crate::config::MatchPolicy::Any,
            max_lookup_tokens: 2,
            ..Default::default()
        };
        let result = run_search(&store, "zzz yyy pepsi", &capped).await.unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(store.scan_calls(), 1);

        let first = SearchConfig {
            match_policy: crate::config::MatchPolicy::Any,
            lookup: LookupStrategy::FirstWord,
            ..Default::default()
        };
        let result = run_search(&store, "zzz pepsi", &first).await.unwrap();
        assert_eq!(result.items.len(), 1);
    }
}
