//! Deterministic core of the brewline service.
//!
//! Everything in this crate is synchronous and side-effect free after
//! startup: configuration loading, the immutable catalog store, and the
//! recommendation ranking engine. The LLM never decides what gets
//! recommended: ranking is a pure function of the catalog and the
//! request signal, and the conversational layer (`brewline-agent`) only
//! renders what this crate produces.

pub mod catalog;
pub mod config;
pub mod recommend;

pub use catalog::{AssociationRule, CatalogError, CatalogStore, PopularityRecord};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use recommend::{RankingPolicy, RecommendationRequest};
