//! Retrieval-grounded Q&A responder for questions about the shop itself:
//! hours, location, delivery, menu details.
//!
//! Retrieval failures and empty result sets are treated as "no grounding"
//! rather than request failures: the answer proceeds with an empty
//! context block. Availability over precision.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::llm::{ChatCompletion, Embedder, VectorIndex};
use crate::responder::{context_window, DialogMessage, Responder, ResponderReply, Role};

pub const AGENT_NAME: &str = "details";

const SYSTEM_PROMPT: &str = "You are a customer support agent for a coffee shop called \
     Merry's Way. Answer every question as if you were a waiter and provide the necessary \
     information to the user regarding their orders.";

pub struct DetailsResponder {
    llm: Arc<dyn ChatCompletion>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    retrieval_top_k: usize,
    context_window: usize,
}

impl DetailsResponder {
    pub fn new(
        llm: Arc<dyn ChatCompletion>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        retrieval_top_k: usize,
        context_window: usize,
    ) -> Self {
        Self { llm, embedder, index, retrieval_top_k, context_window }
    }

    /// Nearest-passage text for the query, or empty when anything in the
    /// retrieval path fails.
    async fn grounding_context(&self, query: &str) -> String {
        let vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(error) => {
                tracing::warn!(
                    event_name = "details.embedding_failed",
                    error = %error,
                    "answering without grounding context"
                );
                return String::new();
            }
        };

        match self.index.query(&vector, self.retrieval_top_k).await {
            Ok(passages) => passages
                .iter()
                .map(|passage| passage.text.trim())
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            Err(error) => {
                tracing::warn!(
                    event_name = "details.retrieval_failed",
                    error = %error,
                    "answering without grounding context"
                );
                String::new()
            }
        }
    }
}

#[async_trait]
impl Responder for DetailsResponder {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    async fn get_response(
        &self,
        history: &[DialogMessage],
    ) -> Result<ResponderReply, AgentError> {
        let query = history
            .iter()
            .rev()
            .find(|message| message.role == Role::User)
            .or_else(|| history.last())
            .map(|message| message.content.clone())
            .ok_or(AgentError::EmptyHistory)?;

        let grounding = self.grounding_context(&query).await;
        let grounded_query =
            format!("Using the contexts below, answer the query.\n\nContexts:\n{grounding}\n\nQuery: {query}");

        let mut messages = vec![DialogMessage::system(SYSTEM_PROMPT)];
        let window = context_window(history, self.context_window);
        if let Some((_, earlier)) = window.split_last() {
            messages.extend_from_slice(earlier);
        }
        messages.push(DialogMessage::user(grounded_query));

        let text = self
            .llm
            .complete(&messages)
            .await
            .map_err(|error| AgentError::upstream("completion", error))?;

        Ok(ResponderReply::from_agent(AGENT_NAME, text))
    }
}
