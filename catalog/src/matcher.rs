//! Client-side refinement of a candidate batch against the full query.
//!
//! A word is satisfied when it is one of the item's tokens, or failing that a
//! literal substring of one of its fields. The second clause catches items
//! whose token set was built under an older policy or is missing.

use crate::config::MatchPolicy;
use crate::models::StoredItem;
use std::collections::HashSet;

/// Whether `item` satisfies a single normalized query word.
pub fn word_matches(item: &StoredItem, word: &str) -> bool {
    if item.has_token(word) {
        return true;
    }
    item.field_values()
        .iter()
        .any(|field| !field.is_empty() && field.to_lowercase().contains(word))
}

/// Whether `item` satisfies `words` under `policy`. An empty word list
/// matches nothing.
pub fn item_matches(item: &StoredItem, words: &[String], policy: MatchPolicy) -> bool {
    if words.is_empty() {
        return false;
    }
    match policy {
        MatchPolicy::All => words.iter().all(|w| word_matches(item, w)),
        MatchPolicy::Any => words.iter().any(|w| word_matches(item, w)),
    }
}

/// Keep the candidates that satisfy `words`, in batch order. Candidates
/// repeated in the batch are kept once, at their first position.
pub fn filter_matches(candidates: Vec<StoredItem>, words: &[String], policy: MatchPolicy) -> Vec<StoredItem> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|item| item.id.map_or(true, |id| seen.insert(id)))
        .filter(|item| item_matches(item, words, policy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::ItemFields;
    use crate::tokenizer::TokenPolicy;

    fn words(text: &str) -> Vec<String> {
        crate::planner::query_words(text)
    }

    fn coca_cola() -> StoredItem {
        StoredItem::existing(
            1,
            ItemFields {
                description: Some("Coca Cola 12oz".into()),
                item_number: Some("4001".into()),
                upc_retail: Some("049000001234".into()),
                ..Default::default()
            },
            &TokenPolicy::default(),
        )
    }

    #[test]
    fn test_all_words_must_match() {
        let item = coca_cola();
        assert!(item_matches(&item, &words("coca 4001"), MatchPolicy::All));
        assert!(!item_matches(&item, &words("coca 9999"), MatchPolicy::All));
        assert!(item_matches(&item, &words("coca 9999"), MatchPolicy::Any));
    }

    #[test]
    fn test_empty_words_match_nothing() {
        assert!(!item_matches(&coca_cola(), &[], MatchPolicy::All));
        assert!(!item_matches(&coca_cola(), &[], MatchPolicy::Any));
    }

    #[test]
    fn test_substring_safety_net_without_tokens() {
        let mut item = coca_cola();
        item.search_tokens.clear();
        assert!(word_matches(&item, "cola"));
        assert!(word_matches(&item, "0000012"));
        assert!(!word_matches(&item, "pepsi"));
    }

    #[test]
    fn test_safety_net_covers_prefix_indexed_items() {
        // Indexed with prefixes only, queried for an inner substring
        let item = StoredItem::existing(
            2,
            ItemFields { description: Some("Chocolate Milk".into()), ..Default::default() },
            &TokenPolicy::prefixes(2),
        );
        assert!(!item.has_token("late"));
        assert!(word_matches(&item, "late"));
    }

    #[test]
    fn test_removing_a_word_never_shrinks_results() {
        let items = vec![
            coca_cola(),
            StoredItem::existing(
                2,
                ItemFields { description: Some("Cola Classic".into()), ..Default::default() },
                &TokenPolicy::default(),
            ),
            StoredItem::existing(
                3,
                ItemFields { description: Some("Pepsi".into()), item_number: Some("4001".into()), ..Default::default() },
                &TokenPolicy::default(),
            ),
        ];
        let full = words("cola 4001 coca");
        let narrow = filter_matches(items.clone(), &full, MatchPolicy::All);
        for i in 0..full.len() {
            let mut relaxed = full.clone();
            relaxed.remove(i);
            let broader = filter_matches(items.clone(), &relaxed, MatchPolicy::All);
            assert!(narrow.iter().all(|item| broader.contains(item)));
            assert!(broader.len() >= narrow.len());
        }
    }

    #[test]
    fn test_filter_dedupes_and_keeps_order() {
        let first = coca_cola();
        let second = StoredItem::existing(
            2,
            ItemFields { description: Some("Cola Classic".into()), ..Default::default() },
            &TokenPolicy::default(),
        );
        let batch = vec![second.clone(), first.clone(), second.clone()];
        let kept = filter_matches(batch, &words("cola"), MatchPolicy::All);
        let ids: Vec<_> = kept.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![Some(2), Some(1)]);
    }
}
