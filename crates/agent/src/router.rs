//! Turn classification: decides which responder key handles the turn.
//!
//! The router is a pure function of the most recent messages; it never
//! inspects memory from earlier turns. Its key set is whatever the
//! dispatch table was built with, not a hard-coded policy.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::classify::StructuredClassifier;
use crate::error::AgentError;
use crate::llm::ChatCompletion;
use crate::responder::{DialogMessage, Responder, ResponderReply};

pub const AGENT_NAME: &str = "router";

/// One dispatchable responder key and the one-line responsibility the
/// router's prompt advertises for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTarget {
    pub key: String,
    pub description: String,
}

impl RouteTarget {
    pub fn new(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self { key: key.into(), description: description.into() }
    }
}

#[derive(Debug, Deserialize)]
struct RouteDecision {
    #[serde(default)]
    #[allow(dead_code)]
    chain_of_thought: String,
    decision: String,
    #[serde(default)]
    message: String,
}

pub struct Router {
    llm: Arc<dyn ChatCompletion>,
    classifier: StructuredClassifier,
    targets: Vec<RouteTarget>,
}

impl Router {
    pub fn new(
        llm: Arc<dyn ChatCompletion>,
        classifier: StructuredClassifier,
        targets: Vec<RouteTarget>,
    ) -> Self {
        Self { llm, classifier, targets }
    }

    fn system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are a helpful AI assistant for a coffee shop application.\n\
             Your task is to determine what agent should handle the user input. \
             You have the following agents to choose from:\n",
        );
        for (index, target) in self.targets.iter().enumerate() {
            prompt.push_str(&format!("{}. {}: {}\n", index + 1, target.key, target.description));
        }
        prompt.push_str(
            "\nYour output should be in a structured json format like so. Each key is a \
             string and each value is a string. Make sure to follow the format exactly:\n\
             {\n\
             \"chain_of_thought\": \"go over each of the agents above and write your thoughts about what agent this input is relevant to\",\n\
             \"decision\": the key of the chosen agent. Pick one of the keys above and only write the word.\n\
             \"message\": leave the message empty.\n\
             }",
        );
        prompt
    }

    /// Classify the turn and validate the decision against the configured
    /// key set. An out-of-set decision is fatal for the request and never
    /// silently defaulted.
    pub async fn classify(&self, history: &[DialogMessage]) -> Result<RoutedTurn, AgentError> {
        let decision: RouteDecision = self
            .classifier
            .classify(self.llm.as_ref(), &self.system_prompt(), history, "route decision")
            .await?;

        let key = decision.decision.trim().to_string();
        if !self.targets.iter().any(|target| target.key == key) {
            return Err(AgentError::UnknownResponderKey(key));
        }

        Ok(RoutedTurn { decision: key, message: decision.message })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutedTurn {
    pub decision: String,
    pub message: String,
}

#[async_trait]
impl Responder for Router {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    async fn get_response(
        &self,
        history: &[DialogMessage],
    ) -> Result<ResponderReply, AgentError> {
        let routed = self.classify(history).await?;
        Ok(ResponderReply::from_agent(AGENT_NAME, routed.message)
            .with_memory("decision", routed.decision))
    }
}
