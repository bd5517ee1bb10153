//! Run the deterministic ranking engine directly from the catalog files.
//! No model call happens anywhere on this path, so the same invocation
//! always prints the same list.

use brewline_core::catalog::CatalogStore;
use brewline_core::config::{AppConfig, LoadOptions};
use brewline_core::recommend::{rank, RankingPolicy, RecommendationRequest};

use super::CommandResult;

pub fn run(items: Vec<String>, popular: bool, categories: Vec<String>) -> CommandResult {
    if popular && !items.is_empty() {
        return CommandResult::failure(
            "rank",
            "usage",
            "--item and --popular are mutually exclusive",
            2,
        );
    }
    if !popular && items.is_empty() {
        return CommandResult::failure(
            "rank",
            "usage",
            "pass --item at least once, or --popular",
            2,
        );
    }

    let request = if popular {
        let categories = (!categories.is_empty()).then_some(categories);
        RecommendationRequest::Popular { categories }
    } else {
        RecommendationRequest::Apriori { purchased_items: items }
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("rank", "config", error.to_string(), 2),
    };
    let catalog = match CatalogStore::load(&config.catalog) {
        Ok(catalog) => catalog,
        Err(error) => return CommandResult::failure("rank", "catalog", error.to_string(), 2),
    };

    let policy = RankingPolicy {
        top_k: config.ranking.top_k,
        category_cap: config.ranking.category_cap,
    };

    CommandResult { exit_code: 0, output: ranked_output(&catalog, policy, &request) }
}

fn ranked_output(
    catalog: &CatalogStore,
    policy: RankingPolicy,
    request: &RecommendationRequest,
) -> String {
    let ranked = rank(catalog, request, policy);
    serde_json::to_string_pretty(&ranked).unwrap_or_else(|_| format!("{ranked:?}"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use brewline_core::catalog::CatalogStore;
    use brewline_core::recommend::{RankingPolicy, RecommendationRequest};

    use super::ranked_output;

    const APRIORI: &str = r#"{
        "latte": [
            {"product": "biscotti", "product_category": "pastry", "confidence": 0.7},
            {"product": "croissant", "product_category": "pastry", "confidence": 0.9},
            {"product": "oat_milk", "product_category": "dairy", "confidence": 0.4}
        ]
    }"#;

    const POPULARITY: &str = "\
product,product_category,number_of_transactions
latte,coffee,450
espresso,coffee,500
biscotti,pastry,250
";

    fn catalog() -> CatalogStore {
        CatalogStore::from_readers(
            APRIORI.as_bytes(),
            POPULARITY.as_bytes(),
            Path::new("test/apriori.json"),
        )
        .expect("fixture catalog")
    }

    #[test]
    fn apriori_output_is_confidence_ordered_json() {
        let output = ranked_output(
            &catalog(),
            RankingPolicy::default(),
            &RecommendationRequest::Apriori { purchased_items: vec!["latte".to_string()] },
        );

        let ranked: Vec<String> = serde_json::from_str(&output).expect("json list");
        assert_eq!(ranked, ["croissant", "biscotti", "oat_milk"]);
    }

    #[test]
    fn popular_output_respects_category_filter() {
        let output = ranked_output(
            &catalog(),
            RankingPolicy::default(),
            &RecommendationRequest::Popular { categories: Some(vec!["coffee".to_string()]) },
        );

        let ranked: Vec<String> = serde_json::from_str(&output).expect("json list");
        assert_eq!(ranked, ["espresso", "latte"]);
    }

    #[test]
    fn same_request_always_prints_the_same_list() {
        let request =
            RecommendationRequest::Apriori { purchased_items: vec!["latte".to_string()] };
        let first = ranked_output(&catalog(), RankingPolicy::default(), &request);
        let second = ranked_output(&catalog(), RankingPolicy::default(), &request);
        assert_eq!(first, second);
    }
}
