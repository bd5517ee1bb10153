//! Recommendation responder: classify the purchase/interest signal, rank
//! deterministically against the catalog, then let the model phrase the
//! result, and only the result.

use std::sync::Arc;

use async_trait::async_trait;
use brewline_core::catalog::CatalogStore;
use brewline_core::recommend::{rank, RankingPolicy, RecommendationRequest};
use serde::Deserialize;

use crate::classify::StructuredClassifier;
use crate::error::AgentError;
use crate::llm::ChatCompletion;
use crate::order::OrderedItem;
use crate::responder::{context_window, DialogMessage, Responder, ResponderReply};

pub const AGENT_NAME: &str = "recommendation";

/// Returned when ranking yields nothing; deliberately not generated, so
/// the model is never asked to recommend an empty list.
pub const EMPTY_RESULT_REPLY: &str =
    "Sorry, I can't help with that. Can I help you with your order?";

#[derive(Debug, Deserialize)]
struct IntentRecord {
    #[serde(default)]
    #[allow(dead_code)]
    chain_of_thought: String,
    recommendation_type: String,
    #[serde(default)]
    parameters: Vec<String>,
}

pub struct RecommendationResponder {
    llm: Arc<dyn ChatCompletion>,
    catalog: Arc<CatalogStore>,
    policy: RankingPolicy,
    classifier: StructuredClassifier,
    context_window: usize,
}

impl RecommendationResponder {
    pub fn new(
        llm: Arc<dyn ChatCompletion>,
        catalog: Arc<CatalogStore>,
        policy: RankingPolicy,
        classifier: StructuredClassifier,
        context_window: usize,
    ) -> Self {
        Self { llm, catalog, policy, classifier, context_window }
    }

    fn intent_prompt(&self) -> String {
        format!(
            "You are a helpful AI assistant for a coffee shop application which serves \
             drinks and pastries. We have 3 types of recommendations:\n\
             1. Apriori Recommendations: based on the items in the user's order, we recommend \
             items that are frequently bought together with them.\n\
             2. Popular Recommendations: we recommend items that are popular among customers.\n\
             3. Popular Recommendations by Category: the user asks for recommendations within \
             a category, like \"what coffee do you recommend?\".\n\n\
             Here is the list of items in the coffee shop:\n{}\n\
             Here is the list of categories we have in the coffee shop:\n{}\n\n\
             Your task is to determine which type of recommendation to provide based on the \
             user's message.\n\n\
             Your output should be in a structured json format like so. Make sure to follow \
             the format exactly:\n\
             {{\n\
             \"chain_of_thought\": \"write your critical thinking about which type of recommendation this input is relevant to\",\n\
             \"recommendation_type\": \"apriori\" or \"popular\" or \"popular by category\". Pick one of those and only write the words.\n\
             \"parameters\": a json list of strings. Either a list of items for apriori recommendations or a list of categories for popular by category recommendations. Leave it empty for popular recommendations. Use the exact strings from the lists above.\n\
             }}",
            self.catalog.products().join(","),
            self.catalog.categories().join(",")
        )
    }

    /// One classification call over the bounded context window, mapped
    /// into the typed request the ranking engine understands.
    pub async fn classify_intent(
        &self,
        history: &[DialogMessage],
    ) -> Result<RecommendationRequest, AgentError> {
        let record: IntentRecord = self
            .classifier
            .classify(self.llm.as_ref(), &self.intent_prompt(), history, "recommendation intent")
            .await?;

        match record.recommendation_type.trim().to_ascii_lowercase().as_str() {
            "apriori" => Ok(RecommendationRequest::Apriori { purchased_items: record.parameters }),
            "popular" => Ok(RecommendationRequest::Popular { categories: None }),
            "popular by category" | "popular_by_category" => {
                Ok(RecommendationRequest::Popular { categories: Some(record.parameters) })
            }
            other => Err(AgentError::malformed(
                "recommendation intent",
                format!("unknown recommendation_type `{other}`"),
            )),
        }
    }

    /// Phrase a non-empty ranked list. The prompt pins the model to the
    /// ranked items, in ranked order; it adds wording, never items.
    async fn render(
        &self,
        history: &[DialogMessage],
        ranked: &[String],
    ) -> Result<ResponderReply, AgentError> {
        let readable = ranked.join(", ");
        let last_turn = history.last().map(|message| message.content.as_str()).unwrap_or_default();

        let system_prompt = "You are a helpful AI assistant for a coffee shop application \
             which serves drinks and pastries. Your task is to recommend items to the user \
             based on their input message. Respond in a friendly but concise way, and put the \
             items in an unordered list with a very small description.";
        let user_prompt =
            format!("{last_turn}\n\nPlease recommend me those items exactly: {readable}");

        let mut messages = vec![DialogMessage::system(system_prompt)];
        let window = context_window(history, self.context_window);
        if let Some((_, earlier)) = window.split_last() {
            messages.extend_from_slice(earlier);
        }
        messages.push(DialogMessage::user(user_prompt));

        let text = self
            .llm
            .complete(&messages)
            .await
            .map_err(|error| AgentError::upstream("completion", error))?;

        Ok(ResponderReply::from_agent(AGENT_NAME, text))
    }

    /// Checkout hook for the order-taking responder: always the apriori
    /// path, seeded with the ordered items' product names.
    pub async fn recommend_from_order(
        &self,
        history: &[DialogMessage],
        ordered_items: &[OrderedItem],
    ) -> Result<ResponderReply, AgentError> {
        let purchased_items: Vec<String> =
            ordered_items.iter().map(|item| item.item.clone()).collect();

        let ranked = rank(
            &self.catalog,
            &RecommendationRequest::Apriori { purchased_items },
            self.policy,
        );

        if ranked.is_empty() {
            return Ok(ResponderReply::from_agent(AGENT_NAME, EMPTY_RESULT_REPLY));
        }

        self.render(history, &ranked).await
    }
}

#[async_trait]
impl Responder for RecommendationResponder {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    async fn get_response(
        &self,
        history: &[DialogMessage],
    ) -> Result<ResponderReply, AgentError> {
        let request = self.classify_intent(history).await?;
        let ranked = rank(&self.catalog, &request, self.policy);

        tracing::debug!(
            event_name = "recommendation.ranked",
            count = ranked.len(),
            "ranking produced {} candidate items",
            ranked.len()
        );

        if ranked.is_empty() {
            // Terminal state, not an error: skip generation entirely.
            return Ok(ResponderReply::from_agent(AGENT_NAME, EMPTY_RESULT_REPLY));
        }

        self.render(history, &ranked).await
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use brewline_core::catalog::CatalogStore;
    use brewline_core::recommend::{RankingPolicy, RecommendationRequest};

    use super::{RecommendationResponder, EMPTY_RESULT_REPLY};
    use crate::classify::StructuredClassifier;
    use crate::order::OrderedItem;
    use crate::responder::{DialogMessage, Responder};
    use crate::test_support::ScriptedChat;

    const APRIORI: &str = r#"{
        "espresso": [
            {"product": "biscotti", "product_category": "pastry", "confidence": 0.8},
            {"product": "croissant", "product_category": "pastry", "confidence": 0.6},
            {"product": "oat_milk", "product_category": "dairy", "confidence": 0.5}
        ]
    }"#;

    const POPULARITY: &str = "\
product,product_category,number_of_transactions
espresso,coffee,500
green_tea,tea,300
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

    fn responder(responses: Vec<&str>) -> (RecommendationResponder, Arc<ScriptedChat>) {
        let llm = Arc::new(ScriptedChat::new(responses));
        let responder = RecommendationResponder::new(
            llm.clone(),
            catalog(),
            RankingPolicy::default(),
            StructuredClassifier::new(3),
            3,
        );
        (responder, llm)
    }

    #[tokio::test]
    async fn apriori_intent_ranks_then_renders_the_exact_items() {
        let (responder, llm) = responder(vec![
            r#"{"chain_of_thought": "", "recommendation_type": "apriori", "parameters": ["espresso"]}"#,
            "How about a biscotti, a croissant, or some oat milk?",
        ]);

        let reply = responder
            .get_response(&[DialogMessage::user("I just got an espresso, what goes well with it?")])
            .await
            .expect("reply");

        assert_eq!(reply.agent(), Some("recommendation"));
        assert_eq!(llm.calls(), 2, "one classification call, one rendering call");

        let rendered_prompt = llm.last_request();
        let user_turn = &rendered_prompt.last().expect("user turn").content;
        assert!(user_turn.contains("biscotti, croissant, oat_milk"));
    }

    #[tokio::test]
    async fn empty_ranking_returns_fixed_apology_without_generation() {
        // Scenario: category filter matches nothing.
        let (responder, llm) = responder(vec![
            r#"{"chain_of_thought": "", "recommendation_type": "popular by category", "parameters": ["smoothies"]}"#,
        ]);

        let reply = responder
            .get_response(&[DialogMessage::user("what smoothies do you recommend")])
            .await
            .expect("reply");

        assert_eq!(reply.content, EMPTY_RESULT_REPLY);
        assert_eq!(llm.calls(), 1, "no rendering call for an empty ranking");
    }

    #[tokio::test]
    async fn popular_intent_uses_the_whole_table() {
        let (responder, llm) = responder(vec![
            r#"{"chain_of_thought": "", "recommendation_type": "popular", "parameters": []}"#,
            "Our most popular items are espresso, green tea, and biscotti!",
        ]);

        let reply = responder
            .get_response(&[DialogMessage::user("what is popular here")])
            .await
            .expect("reply");

        assert_eq!(reply.agent(), Some("recommendation"));
        let user_turn = llm.last_request().last().expect("user turn").content.clone();
        assert!(user_turn.contains("espresso, green_tea, biscotti"));
        assert!(!reply.content.is_empty());
    }

    #[tokio::test]
    async fn intent_classification_sees_catalog_products_and_categories() {
        let (responder, llm) = responder(vec![
            r#"{"chain_of_thought": "", "recommendation_type": "popular", "parameters": []}"#,
            "rendered",
        ]);

        responder
            .get_response(&[DialogMessage::user("anything good?")])
            .await
            .expect("reply");

        let first_request = llm.requests_at(0);
        let system = &first_request[0].content;
        assert!(system.contains("espresso,green_tea,biscotti"));
        assert!(system.contains("coffee,tea,pastry"));
    }

    #[tokio::test]
    async fn checkout_hook_always_takes_the_apriori_path() {
        let (responder, llm) = responder(vec!["Great choices! A biscotti would go nicely."]);

        let order = vec![OrderedItem { item: "espresso".to_string(), quantity: 1, price: 3.5 }];
        let reply = responder
            .recommend_from_order(&[DialogMessage::user("that's everything")], &order)
            .await
            .expect("reply");

        assert_eq!(reply.agent(), Some("recommendation"));
        assert_eq!(llm.calls(), 1, "no intent classification on the checkout path");
        let user_turn = llm.last_request().last().expect("user turn").content.clone();
        assert!(user_turn.contains("biscotti"));
    }

    #[tokio::test]
    async fn checkout_hook_with_unknown_items_returns_the_apology() {
        let (responder, llm) = responder(vec![]);

        let order = vec![OrderedItem { item: "matcha".to_string(), quantity: 1, price: 4.0 }];
        let reply = responder
            .recommend_from_order(&[DialogMessage::user("done")], &order)
            .await
            .expect("reply");

        assert_eq!(reply.content, EMPTY_RESULT_REPLY);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn classify_intent_maps_every_type() {
        let (responder, _) = responder(vec![
            r#"{"recommendation_type": "popular by category", "parameters": ["tea"]}"#,
        ]);

        let request = responder
            .classify_intent(&[DialogMessage::user("what tea do you recommend")])
            .await
            .expect("intent");

        assert_eq!(
            request,
            RecommendationRequest::Popular { categories: Some(vec!["tea".to_string()]) }
        );
    }
}
