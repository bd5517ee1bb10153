//! Recommendation ranking over the precomputed catalog tables.
//!
//! Ranking is deliberately boring: a pure, deterministic function of the
//! catalog and the request signal. Identical inputs against an unchanged
//! catalog always produce identical output. The conversational layer may
//! phrase the result however it likes but never changes what is in it.

use crate::catalog::{AssociationRule, CatalogStore};

/// Purchase/interest signal extracted from the conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecommendationRequest {
    /// Rank products frequently bought together with the given items.
    Apriori { purchased_items: Vec<String> },
    /// Rank by raw popularity, optionally restricted to categories.
    Popular { categories: Option<Vec<String>> },
}

/// Ranking knobs; configuration constants, not structural requirements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankingPolicy {
    /// Maximum number of products one ranking call may return.
    pub top_k: usize,
    /// Maximum accepted products sharing one category per call.
    pub category_cap: usize,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self { top_k: 5, category_cap: 2 }
    }
}

/// Produce the ranked, deduplicated, category-capped product list for a
/// request. An empty result is a defined terminal state, not an error.
pub fn rank(
    store: &CatalogStore,
    request: &RecommendationRequest,
    policy: RankingPolicy,
) -> Vec<String> {
    match request {
        RecommendationRequest::Apriori { purchased_items } => {
            rank_apriori(store, purchased_items, policy)
        }
        RecommendationRequest::Popular { categories } => {
            rank_popular(store, categories.as_deref(), policy.top_k)
        }
    }
}

/// Association-rule traversal: merge the rules of every purchased item,
/// order by descending confidence (stable, so ties keep encounter order),
/// then walk greedily skipping already-emitted products and categories
/// that reached the cap.
pub fn rank_apriori(
    store: &CatalogStore,
    purchased_items: &[String],
    policy: RankingPolicy,
) -> Vec<String> {
    let mut candidates: Vec<&AssociationRule> = Vec::new();
    for purchased in purchased_items {
        // Items without rules contribute nothing; not an error.
        candidates.extend(store.rules_for(purchased));
    }

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut shortlisted: Vec<String> = Vec::new();
    let mut per_category: Vec<(&str, usize)> = Vec::new();

    for rule in candidates {
        if shortlisted.iter().any(|product| product == &rule.product) {
            continue;
        }

        let slot = per_category.iter_mut().find(|(category, _)| *category == rule.category);
        match slot {
            Some((_, count)) if *count >= policy.category_cap => continue,
            Some((_, count)) => *count += 1,
            None => per_category.push((rule.category.as_str(), 1)),
        }

        shortlisted.push(rule.product.clone());
        if shortlisted.len() >= policy.top_k {
            break;
        }
    }

    shortlisted
}

/// Popularity fallback: optional category filter, then descending
/// transaction count (stable), then the first `top_k` product names.
pub fn rank_popular(
    store: &CatalogStore,
    categories: Option<&[String]>,
    top_k: usize,
) -> Vec<String> {
    let mut rows: Vec<_> = store
        .popularity()
        .iter()
        .filter(|record| match categories {
            Some(filter) => filter.iter().any(|category| category == &record.category),
            None => true,
        })
        .collect();

    rows.sort_by(|a, b| b.transaction_count.cmp(&a.transaction_count));
    rows.into_iter().take(top_k).map(|record| record.product.clone()).collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{rank, rank_apriori, rank_popular, RankingPolicy, RecommendationRequest};
    use crate::catalog::CatalogStore;

    const POPULARITY: &str = "\
product,product_category,number_of_transactions
espresso,coffee,500
latte,coffee,450
cappuccino,coffee,400
green_tea,tea,300
chai,tea,220
biscotti,pastry,250
";

    fn store_with(apriori: &str) -> CatalogStore {
        CatalogStore::from_readers(
            apriori.as_bytes(),
            POPULARITY.as_bytes(),
            Path::new("test/apriori.json"),
        )
        .expect("fixture catalog should load")
    }

    fn items(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn single_item_rules_rank_by_descending_confidence() {
        // Scenario A: no capping triggers, output is pure confidence order.
        let store = store_with(
            r#"{"espresso": [
                {"product": "biscotti", "product_category": "pastry", "confidence": 0.8},
                {"product": "croissant", "product_category": "pastry", "confidence": 0.6},
                {"product": "oat_milk", "product_category": "dairy", "confidence": 0.5}
            ]}"#,
        );

        let ranked = rank_apriori(&store, &items(&["espresso"]), RankingPolicy::default());
        assert_eq!(ranked, vec!["biscotti", "croissant", "oat_milk"]);
    }

    #[test]
    fn category_cap_limits_to_two_per_category() {
        // Scenario B: three pastry rules, only the top two survive.
        let store = store_with(
            r#"{"espresso": [
                {"product": "muffin", "product_category": "pastry", "confidence": 0.9},
                {"product": "croissant", "product_category": "pastry", "confidence": 0.7},
                {"product": "scone", "product_category": "pastry", "confidence": 0.65},
                {"product": "oat_milk", "product_category": "dairy", "confidence": 0.5}
            ]}"#,
        );

        let ranked = rank_apriori(&store, &items(&["espresso"]), RankingPolicy::default());
        assert_eq!(ranked, vec!["muffin", "croissant", "oat_milk"]);
        assert!(ranked.len() <= 5);
    }

    #[test]
    fn duplicate_products_across_items_are_emitted_once() {
        let store = store_with(
            r#"{
                "espresso": [
                    {"product": "biscotti", "product_category": "pastry", "confidence": 0.8}
                ],
                "latte": [
                    {"product": "biscotti", "product_category": "pastry", "confidence": 0.7},
                    {"product": "chai", "product_category": "tea", "confidence": 0.4}
                ]
            }"#,
        );

        let ranked = rank_apriori(&store, &items(&["espresso", "latte"]), RankingPolicy::default());
        assert_eq!(ranked, vec!["biscotti", "chai"]);
    }

    #[test]
    fn unknown_items_contribute_nothing_but_others_still_count() {
        let store = store_with(
            r#"{"espresso": [
                {"product": "biscotti", "product_category": "pastry", "confidence": 0.8}
            ]}"#,
        );

        let ranked =
            rank_apriori(&store, &items(&["matcha", "espresso"]), RankingPolicy::default());
        assert_eq!(ranked, vec!["biscotti"]);

        let nothing = rank_apriori(&store, &items(&["matcha"]), RankingPolicy::default());
        assert!(nothing.is_empty());
    }

    #[test]
    fn confidence_ties_keep_encounter_order() {
        // The stable sort is a deliberate, observable tie-break: the rule
        // gathered first wins the tie.
        let store = store_with(
            r#"{
                "espresso": [
                    {"product": "croissant", "product_category": "pastry", "confidence": 0.6}
                ],
                "latte": [
                    {"product": "muffin", "product_category": "pastry", "confidence": 0.6}
                ]
            }"#,
        );

        let ranked = rank_apriori(&store, &items(&["espresso", "latte"]), RankingPolicy::default());
        assert_eq!(ranked, vec!["croissant", "muffin"]);

        let reversed =
            rank_apriori(&store, &items(&["latte", "espresso"]), RankingPolicy::default());
        assert_eq!(reversed, vec!["muffin", "croissant"]);
    }

    #[test]
    fn output_never_exceeds_top_k() {
        let store = store_with(
            r#"{"espresso": [
                {"product": "a", "product_category": "c1", "confidence": 0.9},
                {"product": "b", "product_category": "c2", "confidence": 0.8},
                {"product": "c", "product_category": "c3", "confidence": 0.7},
                {"product": "d", "product_category": "c4", "confidence": 0.6}
            ]}"#,
        );

        let ranked = rank_apriori(
            &store,
            &items(&["espresso"]),
            RankingPolicy { top_k: 2, category_cap: 2 },
        );
        assert_eq!(ranked, vec!["a", "b"]);
    }

    #[test]
    fn popular_filter_restricts_to_requested_categories() {
        // Scenario C: only tea products, highest transaction count first.
        let store = store_with("{}");
        let ranked = rank_popular(&store, Some(&items(&["tea"])), 5);
        assert_eq!(ranked, vec!["green_tea", "chai"]);
    }

    #[test]
    fn popular_without_filter_uses_the_whole_table() {
        let store = store_with("{}");
        let ranked = rank_popular(&store, None, 5);
        assert_eq!(ranked, vec!["espresso", "latte", "cappuccino", "green_tea", "biscotti"]);
    }

    #[test]
    fn popular_with_unmatched_filter_is_empty() {
        let store = store_with("{}");
        assert!(rank_popular(&store, Some(&items(&["smoothie"])), 5).is_empty());
    }

    #[test]
    fn ranking_is_deterministic_across_calls() {
        let store = store_with(
            r#"{"espresso": [
                {"product": "biscotti", "product_category": "pastry", "confidence": 0.8},
                {"product": "oat_milk", "product_category": "dairy", "confidence": 0.5}
            ]}"#,
        );
        let request = RecommendationRequest::Apriori { purchased_items: items(&["espresso"]) };

        let first = rank(&store, &request, RankingPolicy::default());
        let second = rank(&store, &request, RankingPolicy::default());
        assert_eq!(first, second);
    }
}
