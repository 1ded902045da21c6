//! Search configuration.
//!
//! Every knob has a default, so an empty JSON object is a valid config file.

use crate::interface::{CatalogError, CatalogResult};
use crate::tokenizer::TokenPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Maximum number of literal tokens one disjunctive lookup may carry.
pub const DEFAULT_MAX_LOOKUP_TOKENS: usize = 30;

/// Candidate batch size for token lookups.
pub const DEFAULT_FETCH_LIMIT: usize = 200;

/// Candidate batch size when the store can only scan.
pub const DEFAULT_FULL_SCAN_LIMIT: usize = 5000;

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Which containment lookup a query is sent to the store as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStrategy {
    /// One disjunctive lookup over all query words, AND applied client-side.
    #[default]
    AnyWord,
    /// Only the first word is looked up; the rest are refined client-side.
    /// Misses items whose first word is not a stored token.
    FirstWord,
    /// Bounded scan of the whole collection.
    FullScan,
}

/// How many query words an item must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub token_policy: TokenPolicy,
    pub lookup: LookupStrategy,
    pub match_policy: MatchPolicy,
    pub fetch_limit: usize,
    pub full_scan_limit: usize,
    pub max_lookup_tokens: usize,
    pub debounce_ms: u64,
    /// Cancel the in-flight request when a newer one is issued.
    pub cancel_superseded: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            token_policy: TokenPolicy::default(),
            lookup: LookupStrategy::default(),
            match_policy: MatchPolicy::default(),
            fetch_limit: DEFAULT_FETCH_LIMIT,
            full_scan_limit: DEFAULT_FULL_SCAN_LIMIT,
            max_lookup_tokens: DEFAULT_MAX_LOOKUP_TOKENS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            cancel_superseded: true,
        }
    }
}

impl SearchConfig {
    pub fn from_json_str(json: &str) -> CatalogResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CatalogError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> CatalogResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> CatalogResult<()> {
        if self.token_policy.min_word_len == 0 {
            return Err(CatalogError::InvalidConfig("token_policy.min_word_len must be at least 1".into()));
        }
        if self.fetch_limit == 0 || self.full_scan_limit == 0 {
            return Err(CatalogError::InvalidConfig("fetch limits must be positive".into()));
        }
        if self.max_lookup_tokens == 0 {
            return Err(CatalogError::InvalidConfig("max_lookup_tokens must be positive".into()));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::TokenMode;

    #[test]
    fn test_empty_object_is_default() {
        let config = SearchConfig::from_json_str("{}").unwrap();
        assert_eq!(config, SearchConfig::default());
        assert_eq!(config.debounce(), Duration::from_millis(300));
    }

    #[test]
    fn test_partial_override() {
        let config = SearchConfig::from_json_str(
            r#"{"lookup":"first_word","token_policy":{"mode":"prefixes","min_word_len":1},"debounce_ms":250}"#,
        )
        .unwrap();
        assert_eq!(config.lookup, LookupStrategy::FirstWord);
        assert_eq!(config.token_policy.mode, TokenMode::Prefixes);
        assert_eq!(config.token_policy.min_word_len, 1);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.fetch_limit, DEFAULT_FETCH_LIMIT);
    }

    #[test]
    fn test_rejects_zero_min_word_len() {
        let err = SearchConfig::from_json_str(r#"{"token_policy":{"min_word_len":0}}"#).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = SearchConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, CatalogError::InvalidConfig(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.json");
        std::fs::write(&path, r#"{"fetch_limit":50}"#).unwrap();
        let config = SearchConfig::load(&path).unwrap();
        assert_eq!(config.fetch_limit, 50);

        let missing = SearchConfig::load(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(CatalogError::InvalidConfig(_))));
    }
}
