//! Multi-turn order-taking responder.
//!
//! The running order is carried in reply memory: each turn the model
//! re-emits the accumulated order as part of its structured output, and
//! the previous state is recovered from the most recent assistant message
//! the client echoed back. When the order is complete, the checkout hook
//! of the recommendation responder is invoked once per conversation.

use std::sync::Arc;

use async_trait::async_trait;
use brewline_core::catalog::CatalogStore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::classify::StructuredClassifier;
use crate::error::AgentError;
use crate::llm::ChatCompletion;
use crate::recommendation::RecommendationResponder;
use crate::responder::{DialogMessage, Responder, ResponderReply, Role};

pub const AGENT_NAME: &str = "order_taking";

/// The step at which the model declares the order complete.
const CHECKOUT_STEP: u32 = 5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderedItem {
    pub item: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub price: f64,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct OrderStep {
    #[serde(default)]
    #[allow(dead_code)]
    chain_of_thought: String,
    step_number: u32,
    #[serde(default)]
    order: Vec<OrderedItem>,
    response: String,
}

#[derive(Debug, Default)]
struct PriorState {
    step_number: u32,
    order: Vec<OrderedItem>,
    asked_recommendation_before: bool,
}

pub struct OrderTakingResponder {
    llm: Arc<dyn ChatCompletion>,
    catalog: Arc<CatalogStore>,
    classifier: StructuredClassifier,
    recommendation: Arc<RecommendationResponder>,
}

impl OrderTakingResponder {
    pub fn new(
        llm: Arc<dyn ChatCompletion>,
        catalog: Arc<CatalogStore>,
        classifier: StructuredClassifier,
        recommendation: Arc<RecommendationResponder>,
    ) -> Self {
        Self { llm, catalog, classifier, recommendation }
    }

    fn system_prompt(&self, prior: &PriorState) -> String {
        let prior_order =
            serde_json::to_string(&prior.order).unwrap_or_else(|_| "[]".to_string());

        format!(
            "You are a customer support agent for a coffee shop called Merry's Way, taking \
             the user's order. Here is the menu:\n{}\n\n\
             Walk through these steps and keep track of which step you are on:\n\
             1. Take the user's order.\n\
             2. Validate that every item is on the menu.\n\
             3. If an item is not on the menu, tell the user and repeat the remaining valid order.\n\
             4. Ask if they need anything else.\n\
             5. If they don't, close the order: list the items with their quantities, thank \
             the user and say goodbye. Use step number {CHECKOUT_STEP} for this.\n\n\
             The order so far (from previous turns): {prior_order}\n\
             You were last on step number: {}\n\n\
             Your output should be in a structured json format like so. Make sure to follow \
             the format exactly:\n\
             {{\n\
             \"chain_of_thought\": \"think about which step you are on and what the accumulated order is\",\n\
             \"step_number\": the step you are on as an integer,\n\
             \"order\": a json list of the full accumulated order, each entry {{\"item\": string, \"quantity\": integer, \"price\": number}},\n\
             \"response\": your reply to the user.\n\
             }}",
            self.catalog.products().join(", "),
            prior.step_number.max(1)
        )
    }

    /// Walk history newest-first for the last state this responder wrote.
    fn recover_state(history: &[DialogMessage]) -> PriorState {
        for message in history.iter().rev() {
            if message.role != Role::Assistant {
                continue;
            }
            let agent = message.memory.get("agent").and_then(Value::as_str);
            if agent != Some(AGENT_NAME) {
                continue;
            }

            let order = message
                .memory
                .get("order")
                .and_then(|value| serde_json::from_value(value.clone()).ok())
                .unwrap_or_default();
            let step_number = message
                .memory
                .get("step_number")
                .and_then(Value::as_u64)
                .unwrap_or(1) as u32;
            let asked_recommendation_before = message
                .memory
                .get("asked_recommendation_before")
                .and_then(Value::as_bool)
                .unwrap_or(false);

            return PriorState { step_number, order, asked_recommendation_before };
        }

        PriorState::default()
    }

    fn order_memory(reply: ResponderReply, step: &OrderStep, asked: bool) -> ResponderReply {
        reply
            .with_memory("agent", AGENT_NAME)
            .with_memory("step_number", step.step_number)
            .with_memory("order", json!(step.order))
            .with_memory("asked_recommendation_before", asked)
    }
}

#[async_trait]
impl Responder for OrderTakingResponder {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    async fn get_response(
        &self,
        history: &[DialogMessage],
    ) -> Result<ResponderReply, AgentError> {
        let prior = Self::recover_state(history);
        let step: OrderStep = self
            .classifier
            .classify(self.llm.as_ref(), &self.system_prompt(&prior), history, "order step")
            .await?;

        let checkout = step.step_number >= CHECKOUT_STEP && !step.order.is_empty();
        if checkout && !prior.asked_recommendation_before {
            // Offer co-purchase suggestions exactly once per conversation,
            // keeping the order state attached to the rendered reply.
            let suggestion =
                self.recommendation.recommend_from_order(history, &step.order).await?;
            let content = format!("{}\n{}", step.response, suggestion.content);
            let reply = ResponderReply::from_agent(AGENT_NAME, content.trim().to_string());
            return Ok(Self::order_memory(reply, &step, true));
        }

        let reply = ResponderReply::from_agent(AGENT_NAME, step.response.clone());
        Ok(Self::order_memory(reply, &step, prior.asked_recommendation_before))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use brewline_core::catalog::CatalogStore;
    use brewline_core::recommend::RankingPolicy;

    use super::{OrderTakingResponder, OrderedItem};
    use crate::classify::StructuredClassifier;
    use crate::recommendation::RecommendationResponder;
    use crate::responder::{DialogMessage, Responder, ResponderReply};
    use crate::test_support::ScriptedChat;

    const APRIORI: &str = r#"{
        "latte": [
            {"product": "biscotti", "product_category": "pastry", "confidence": 0.7}
        ]
    }"#;

    const POPULARITY: &str = "\
product,product_category,number_of_transactions
latte,coffee,450
biscotti,pastry,250
";

    fn catalog() -> Arc<CatalogStore> {
        Arc::new(
            CatalogStore::from_readers(
                APRIORI.as_bytes(),
                POPULARITY.as_bytes(),
                Path::new("test/apriori.json"),
            )
            .expect("fixture catalog"),
        )
    }

    fn responder(responses: Vec<&str>) -> (OrderTakingResponder, Arc<ScriptedChat>) {
        let llm = Arc::new(ScriptedChat::new(responses));
        let catalog = catalog();
        let recommendation = Arc::new(RecommendationResponder::new(
            llm.clone(),
            catalog.clone(),
            RankingPolicy::default(),
            StructuredClassifier::new(3),
            3,
        ));
        let responder = OrderTakingResponder::new(
            llm.clone(),
            catalog,
            StructuredClassifier::new(3),
            recommendation,
        );
        (responder, llm)
    }

    #[tokio::test]
    async fn mid_order_turn_carries_state_in_memory() {
        let (responder, llm) = responder(vec![
            r#"{"chain_of_thought": "", "step_number": 4,
                "order": [{"item": "latte", "quantity": 1, "price": 4.5}],
                "response": "One latte! Anything else?"}"#,
        ]);

        let reply =
            responder.get_response(&[DialogMessage::user("a latte please")]).await.expect("reply");

        assert_eq!(reply.agent(), Some("order_taking"));
        assert_eq!(reply.content, "One latte! Anything else?");
        assert_eq!(reply.memory["step_number"], 4);
        assert_eq!(reply.memory["order"][0]["item"], "latte");
        assert_eq!(reply.memory["asked_recommendation_before"], false);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn completed_order_triggers_the_checkout_recommendation_once() {
        let (responder, llm) = responder(vec![
            r#"{"chain_of_thought": "", "step_number": 5,
                "order": [{"item": "latte", "quantity": 1, "price": 4.5}],
                "response": "That's one latte. Thank you!"}"#,
            "A biscotti goes great with a latte!",
        ]);

        let reply = responder
            .get_response(&[DialogMessage::user("that's all, thanks")])
            .await
            .expect("reply");

        assert_eq!(reply.agent(), Some("order_taking"));
        assert!(reply.content.contains("That's one latte"));
        assert!(reply.content.contains("biscotti"));
        assert_eq!(reply.memory["asked_recommendation_before"], true);
        assert_eq!(llm.calls(), 2, "order extraction plus one rendering call");
    }

    #[tokio::test]
    async fn checkout_recommendation_is_not_repeated() {
        let (responder, llm) = responder(vec![
            r#"{"chain_of_thought": "", "step_number": 5,
                "order": [{"item": "latte", "quantity": 1, "price": 4.5}],
                "response": "Anything else before I close the order?"}"#,
        ]);

        let prior = ResponderReply::from_agent("order_taking", "earlier reply")
            .with_memory("step_number", 5)
            .with_memory("order", serde_json::json!([{"item": "latte", "quantity": 1, "price": 4.5}]))
            .with_memory("asked_recommendation_before", true);

        let history = vec![
            DialogMessage::user("a latte please"),
            prior.into_dialog_message(),
            DialogMessage::user("that's all"),
        ];

        let reply = responder.get_response(&history).await.expect("reply");

        assert_eq!(llm.calls(), 1, "no second recommendation rendering");
        assert_eq!(reply.memory["asked_recommendation_before"], true);
    }

    #[tokio::test]
    async fn prior_order_state_is_fed_back_into_the_prompt() {
        let (responder, llm) = responder(vec![
            r#"{"chain_of_thought": "", "step_number": 4,
                "order": [{"item": "latte", "quantity": 2, "price": 9.0}],
                "response": "Two lattes now. Anything else?"}"#,
        ]);

        let prior = ResponderReply::from_agent("order_taking", "One latte! Anything else?")
            .with_memory("step_number", 4)
            .with_memory("order", serde_json::json!([{"item": "latte", "quantity": 1, "price": 4.5}]))
            .with_memory("asked_recommendation_before", false);

        let history = vec![
            DialogMessage::user("a latte please"),
            prior.into_dialog_message(),
            DialogMessage::user("make it two"),
        ];

        responder.get_response(&history).await.expect("reply");

        let system = llm.last_request()[0].content.clone();
        assert!(system.contains(r#""item":"latte""#));
        assert!(system.contains("last on step number: 4"));
    }

    #[test]
    fn ordered_item_defaults_fill_missing_fields() {
        let item: OrderedItem = serde_json::from_str(r#"{"item": "latte"}"#).expect("parse");
        assert_eq!(item.quantity, 1);
        assert_eq!(item.price, 0.0);
    }
}
