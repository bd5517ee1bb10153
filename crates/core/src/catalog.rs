//! Immutable in-memory view of the two precomputed recommendation tables.
//!
//! Both tables are produced offline from co-purchase statistics and loaded
//! exactly once at startup. A missing or malformed file is fatal at process
//! start; nothing here is ever deferred to request time or mutated after
//! construction, which is what makes the store safe to share across
//! concurrent requests without synchronization.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::config::CatalogConfig;

/// One precomputed `(antecedent item -> product)` association fact.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AssociationRule {
    pub product: String,
    #[serde(rename = "product_category")]
    pub category: String,
    pub confidence: f64,
}

/// One row of the popularity table, ordered as loaded.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PopularityRecord {
    pub product: String,
    #[serde(rename = "product_category")]
    pub category: String,
    #[serde(rename = "number_of_transactions")]
    pub transaction_count: u64,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse apriori table `{path}`: {source}")]
    ParseApriori { path: PathBuf, source: serde_json::Error },
    #[error("could not parse popularity table: {0}")]
    ParsePopularity(#[from] csv::Error),
    #[error("association rule `{item}` -> `{product}` has confidence {confidence} outside [0, 1]")]
    ConfidenceOutOfRange { item: String, product: String, confidence: f64 },
    #[error("popularity table has no rows")]
    EmptyPopularityTable,
}

/// The loaded catalog: an apriori multi-map keyed by antecedent item plus
/// the popularity table in file order.
#[derive(Clone, Debug)]
pub struct CatalogStore {
    rules: HashMap<String, Vec<AssociationRule>>,
    popularity: Vec<PopularityRecord>,
}

impl CatalogStore {
    pub fn load(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let apriori = open(&config.apriori_path)?;
        let popularity = open(&config.popularity_path)?;
        Self::from_readers(apriori, popularity, &config.apriori_path)
    }

    /// Shared by `load` and tests; `apriori_path` only labels parse errors.
    pub fn from_readers<R1: Read, R2: Read>(
        apriori: R1,
        popularity: R2,
        apriori_path: &Path,
    ) -> Result<Self, CatalogError> {
        let rules: HashMap<String, Vec<AssociationRule>> = serde_json::from_reader(apriori)
            .map_err(|source| CatalogError::ParseApriori {
                path: apriori_path.to_path_buf(),
                source,
            })?;

        for (item, item_rules) in &rules {
            for rule in item_rules {
                if !(0.0..=1.0).contains(&rule.confidence) {
                    return Err(CatalogError::ConfidenceOutOfRange {
                        item: item.clone(),
                        product: rule.product.clone(),
                        confidence: rule.confidence,
                    });
                }
            }
        }

        let mut reader = csv::Reader::from_reader(popularity);
        let popularity = reader
            .deserialize::<PopularityRecord>()
            .collect::<Result<Vec<_>, _>>()?;

        if popularity.is_empty() {
            return Err(CatalogError::EmptyPopularityTable);
        }

        Ok(Self { rules, popularity })
    }

    /// Association rules keyed by the given antecedent item. Unknown items
    /// yield an empty slice rather than an error.
    pub fn rules_for(&self, item: &str) -> &[AssociationRule] {
        self.rules.get(item).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn popularity(&self) -> &[PopularityRecord] {
        &self.popularity
    }

    /// Product names in popularity-table order, for prompt construction.
    pub fn products(&self) -> Vec<&str> {
        self.popularity.iter().map(|record| record.product.as_str()).collect()
    }

    /// Distinct category names, first-seen order preserved.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for record in &self.popularity {
            if !seen.contains(&record.category.as_str()) {
                seen.push(record.category.as_str());
            }
        }
        seen
    }

    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn popularity_count(&self) -> usize {
        self.popularity.len()
    }
}

fn open(path: &Path) -> Result<File, CatalogError> {
    File::open(path).map_err(|source| CatalogError::Read { path: path.to_path_buf(), source })
}
