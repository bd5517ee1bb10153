//! The gate, route, dispatch pipeline that turns dialog history into a
//! single reply.
//!
//! Stage order is fixed: the gate runs first and is the only stage that
//! can short-circuit; the router picks a key; the dispatch table resolves
//! the key to a responder whose reply is returned verbatim.

use std::collections::HashMap;
use std::sync::Arc;

use brewline_core::catalog::CatalogStore;
use brewline_core::config::AppConfig;
use brewline_core::recommend::RankingPolicy;
use uuid::Uuid;

use crate::classify::StructuredClassifier;
use crate::details::DetailsResponder;
use crate::error::AgentError;
use crate::guard::{self, GuardResponder, NOT_ALLOWED};
use crate::llm::{
    ChatClient, ChatCompletion, EmbeddingClient, UngroundedIndex, VectorIndex, VectorIndexClient,
};
use crate::order::OrderTakingResponder;
use crate::recommendation::RecommendationResponder;
use crate::responder::{DialogMessage, Responder, ResponderReply};
use crate::router::{RouteTarget, Router};

/// Ordered key-to-responder registry. Order matters: the router's prompt
/// enumerates the keys in insertion order.
#[derive(Default)]
pub struct DispatchTable {
    order: Vec<RouteTarget>,
    responders: HashMap<String, Arc<dyn Responder>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        key: impl Into<String>,
        description: impl Into<String>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        let key = key.into();
        self.order.push(RouteTarget::new(key.clone(), description));
        self.responders.insert(key, responder);
        self
    }

    /// The key set the router classifies against.
    pub fn targets(&self) -> Vec<RouteTarget> {
        self.order.clone()
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn Responder>> {
        self.responders.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

pub struct AgentPipeline {
    gate: Arc<dyn Responder>,
    router: Router,
    table: DispatchTable,
}

impl AgentPipeline {
    pub fn new(gate: Arc<dyn Responder>, router: Router, table: DispatchTable) -> Self {
        Self { gate, router, table }
    }

    pub async fn handle(&self, history: &[DialogMessage]) -> Result<ResponderReply, AgentError> {
        if history.is_empty() {
            return Err(AgentError::EmptyHistory);
        }

        let correlation_id = Uuid::new_v4();
        tracing::info!(
            event_name = "pipeline.turn_started",
            %correlation_id,
            history_len = history.len(),
        );

        let verdict = self.gate.get_response(history).await?;
        if verdict.memory_str("guard_decision") == Some(NOT_ALLOWED) {
            tracing::info!(
                event_name = "pipeline.turn_vetoed",
                %correlation_id,
                agent = guard::AGENT_NAME,
            );
            return Ok(verdict);
        }

        let routed = self.router.classify(history).await?;
        let responder = self
            .table
            .get(&routed.decision)
            .ok_or_else(|| AgentError::UnknownResponderKey(routed.decision.clone()))?;

        tracing::info!(
            event_name = "pipeline.turn_dispatched",
            %correlation_id,
            agent = responder.name(),
        );

        // The dispatched responder's reply is final; the pipeline never
        // rewrites content or memory on the way out.
        responder.get_response(history).await
    }
}

/// The standard wiring: HTTP-backed clients, the three dispatchable
/// responders in their canonical order, and the gate in front.
pub fn standard_pipeline(
    config: &AppConfig,
    catalog: Arc<CatalogStore>,
) -> anyhow::Result<AgentPipeline> {
    let llm: Arc<dyn ChatCompletion> = Arc::new(ChatClient::new(&config.llm)?);
    let embedder =
        Arc::new(EmbeddingClient::new(&config.embedding, config.llm.timeout_secs)?);
    let index: Arc<dyn VectorIndex> = if config.vector.base_url.is_empty() {
        Arc::new(UngroundedIndex)
    } else {
        Arc::new(VectorIndexClient::new(&config.vector, config.llm.timeout_secs)?)
    };

    let classifier = || StructuredClassifier::new(config.agent.context_window);
    let policy = RankingPolicy {
        top_k: config.ranking.top_k,
        category_cap: config.ranking.category_cap,
    };

    let recommendation = Arc::new(RecommendationResponder::new(
        llm.clone(),
        catalog.clone(),
        policy,
        classifier(),
        config.agent.context_window,
    ));
    let details = Arc::new(DetailsResponder::new(
        llm.clone(),
        embedder,
        index,
        config.vector.top_k,
        config.agent.context_window,
    ));
    let order_taking = Arc::new(OrderTakingResponder::new(
        llm.clone(),
        catalog,
        classifier(),
        recommendation.clone(),
    ));

    let table = DispatchTable::new()
        .register(
            "details",
            "questions about the coffee shop, like location, delivery, working hours, \
             and questions about menu items",
            details,
        )
        .register("order_taking", "taking the user's order", order_taking)
        .register(
            "recommendation",
            "giving the user recommendations about what to buy",
            recommendation,
        );

    let gate = Arc::new(GuardResponder::new(llm.clone(), classifier()));
    let router = Router::new(llm, classifier(), table.targets());
    Ok(AgentPipeline::new(gate, router, table))
}
