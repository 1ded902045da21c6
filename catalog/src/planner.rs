//! Query planning: free text → ordered query words + the store lookup to run.

use crate::backend::StoreCapabilities;
use crate::config::{LookupStrategy, MatchPolicy, SearchConfig};
use crate::tokenizer::normalize_words;

/// The containment lookup sent to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Disjunction over these tokens (OR at the store).
    AnyOf(Vec<String>),
    /// A single containment lookup.
    Token(String),
    /// Bounded scan; the store cannot filter by token.
    Scan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Lowercased, normalized, deduplicated words in typed order
    pub words: Vec<String>,
    pub lookup: Lookup,
}

/// Normalize query text into words using the tokenizer's character rules.
/// Repeated words keep their first position.
pub fn query_words(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for word in normalize_words(text) {
        if !words.contains(&word) {
            words.push(word);
        }
    }
    words
}

pub struct QueryPlanner<'a> {
    config: &'a SearchConfig,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(config: &'a SearchConfig) -> Self {
        Self { config }
    }

    /// Plan `text` against a store with `caps`. `None` means there is nothing
    /// to search and no store call should be made.
    pub fn plan(&self, text: &str, caps: StoreCapabilities) -> Option<QueryPlan> {
        let words = query_words(text);
        if words.is_empty() {
            return None;
        }
        let lookup = self.choose_lookup(&words, caps);
        Some(QueryPlan { words, lookup })
    }

    fn choose_lookup(&self, words: &[String], caps: StoreCapabilities) -> Lookup {
        if !caps.token_lookup || self.config.lookup == LookupStrategy::FullScan {
            return Lookup::Scan;
        }
        if words.len() == 1 {
            return Lookup::Token(words[0].clone());
        }

        // Under ALL matching every retained item contains every word, so any
        // subset of the words is a complete pre-filter. Under ANY matching the
        // lookup must cover every word or the store has to be scanned.
        let must_cover_all = self.config.match_policy == MatchPolicy::Any;

        if self.config.lookup == LookupStrategy::FirstWord || !caps.supports_disjunction() {
            if must_cover_all {
                tracing::debug!(words = words.len(), "single-token lookup cannot cover ANY query, scanning");
                return Lookup::Scan;
            }
            if !caps.supports_disjunction() {
                tracing::debug!(words = words.len(), "store cannot OR tokens, looking up first word only");
            }
            return Lookup::Token(words[0].clone());
        }

        let cap = caps.max_any_tokens.min(self.config.max_lookup_tokens).max(1);
        if must_cover_all && words.len() > cap {
            tracing::debug!(words = words.len(), cap, "ANY query exceeds lookup cap, scanning");
            return Lookup::Scan;
        }
        Lookup::AnyOf(words.iter().take(cap).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: StoreCapabilities = StoreCapabilities { token_lookup: true, max_any_tokens: 30 };

    fn plan(text: &str) -> Option<QueryPlan> {
        let config = SearchConfig::default();
        QueryPlanner::new(&config).plan(text, FULL)
    }

    #[test]
    fn test_empty_query_is_no_plan() {
        assert_eq!(plan(""), None);
        assert_eq!(plan("   \t"), None);
        assert_eq!(plan("-- //"), None);
    }

    #[test]
    fn test_words_lowercased_in_order() {
        let plan = plan("  Coca  COLA 4001").unwrap();
        assert_eq!(plan.words, vec!["coca", "cola", "4001"]);
    }

    #[test]
    fn test_duplicate_words_collapsed() {
        assert_eq!(query_words("cola Cola coca cola"), vec!["cola", "coca"]);
    }

    #[test]
    fn test_single_word_uses_token_lookup() {
        assert_eq!(plan("cola").unwrap().lookup, Lookup::Token("cola".into()));
    }

    #[test]
    fn test_multi_word_defaults_to_disjunction() {
        assert_eq!(
            plan("coca 4001").unwrap().lookup,
            Lookup::AnyOf(vec!["coca".into(), "4001".into()])
        );
    }

    #[test]
    fn test_disjunction_capped() {
        let config = SearchConfig { max_lookup_tokens: 2, ..Default::default() };
        let plan = QueryPlanner::new(&config).plan("a b c d", FULL).unwrap();
        assert_eq!(plan.words.len(), 4);
        assert_eq!(plan.lookup, Lookup::AnyOf(vec!["a".into(), "b".into()]));

        let caps = StoreCapabilities { token_lookup: true, max_any_tokens: 3 };
        let config = SearchConfig::default();
        let plan = QueryPlanner::new(&config).plan("a b c d", caps).unwrap();
        assert_eq!(plan.lookup, Lookup::AnyOf(vec!["a".into(), "b".into(), "c".into()]));
    }

    #[test]
    fn test_falls_back_to_first_word_without_disjunction() {
        let caps = StoreCapabilities { token_lookup: true, max_any_tokens: 1 };
        let config = SearchConfig::default();
        let plan = QueryPlanner::new(&config).plan("coca 4001", caps).unwrap();
        assert_eq!(plan.lookup, Lookup::Token("coca".into()));
    }

    #[test]
    fn test_first_word_strategy() {
        let config = SearchConfig { lookup: LookupStrategy::FirstWord, ..Default::default() };
        let plan = QueryPlanner::new(&config).plan("coca 4001", FULL).unwrap();
        assert_eq!(plan.lookup, Lookup::Token("coca".into()));
    }

    #[test]
    fn test_scan_without_token_lookup() {
        let caps = StoreCapabilities { token_lookup: false, max_any_tokens: 0 };
        let config = SearchConfig::default();
        let plan = QueryPlanner::new(&config).plan("coca", caps).unwrap();
        assert_eq!(plan.lookup, Lookup::Scan);

        let config = SearchConfig { lookup: LookupStrategy::FullScan, ..Default::default() };
        let plan = QueryPlanner::new(&config).plan("coca", FULL).unwrap();
        assert_eq!(plan.lookup, Lookup::Scan);
    }

    #[test]
    fn test_any_policy_never_truncates_lookup() {
        let config = SearchConfig {
            match_policy: MatchPolicy::Any,
            max_lookup_tokens: 2,
            ..Default::default()
        };
        let planner = QueryPlanner::new(&config);
        assert_eq!(
            planner.plan("a b", FULL).unwrap().lookup,
            Lookup::AnyOf(vec!["a".into(), "b".into()])
        );
        assert_eq!(planner.plan("a b c", FULL).unwrap().lookup, Lookup::Scan);
    }

    #[test]
    fn test_any_policy_scans_instead_of_first_word() {
        let config = SearchConfig {
            match_policy: MatchPolicy::Any,
            lookup: LookupStrategy::FirstWord,
            ..Default::default()
        };
        let plan = QueryPlanner::new(&config).plan("coca 4001", FULL).unwrap();
        assert_eq!(plan.lookup, Lookup::Scan);

        let config = SearchConfig { match_policy: MatchPolicy::Any, ..Default::default() };
        let caps = StoreCapabilities { token_lookup: true, max_any_tokens: 1 };
        let plan = QueryPlanner::new(&config).plan("coca 4001", caps).unwrap();
        assert_eq!(plan.lookup, Lookup::Scan);

        // A single word is still one exact lookup
        let plan = QueryPlanner::new(&config).plan("coca", caps).unwrap();
        assert_eq!(plan.lookup, Lookup::Token("coca".into()));
    }
}
