//! Content-safety gate: the first pipeline stage and the only one that
//! can short-circuit a request.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::classify::StructuredClassifier;
use crate::error::AgentError;
use crate::llm::ChatCompletion;
use crate::responder::{DialogMessage, Responder, ResponderReply};

pub const AGENT_NAME: &str = "guard";
pub const ALLOWED: &str = "allowed";
pub const NOT_ALLOWED: &str = "not allowed";

const SYSTEM_PROMPT: &str = "\
You are a helpful AI assistant for a coffee shop application which serves drinks and pastries.

Your task is to determine whether it is allowed for the user to ask this question or not. \
The user is ALLOWED to: ask questions about the coffee shop, like its location, working hours, \
menu items and related questions; ask about menu items and what we have; make an order; \
ask for recommendations about what to buy.

The user is NOT ALLOWED to: ask questions about anything unrelated to our coffee shop; \
ask questions about the staff; ask for a recipe or how to make a menu item.

Your output should be in a structured json format like so. Each key is a string and each \
value is a string. Make sure to follow the format exactly:
{
\"chain_of_thought\": \"go over each point above and write your thoughts about whether the input is allowed or not\",
\"decision\": \"allowed\" or \"not allowed\". Pick one of those and only write the word.
\"message\": leave the message empty if it is allowed, otherwise write \"Sorry, I can't help with that. Can I help you with your order?\"
}";

#[derive(Debug, Deserialize)]
struct GuardVerdict {
    #[serde(default)]
    #[allow(dead_code)]
    chain_of_thought: String,
    decision: String,
    #[serde(default)]
    message: String,
}

pub struct GuardResponder {
    llm: Arc<dyn ChatCompletion>,
    classifier: StructuredClassifier,
}

impl GuardResponder {
    pub fn new(llm: Arc<dyn ChatCompletion>, classifier: StructuredClassifier) -> Self {
        Self { llm, classifier }
    }
}

#[async_trait]
impl Responder for GuardResponder {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    async fn get_response(
        &self,
        history: &[DialogMessage],
    ) -> Result<ResponderReply, AgentError> {
        let verdict: GuardVerdict = self
            .classifier
            .classify(self.llm.as_ref(), SYSTEM_PROMPT, history, "guard verdict")
            .await?;

        let decision = verdict.decision.trim().to_ascii_lowercase();
        if decision != ALLOWED && decision != NOT_ALLOWED {
            return Err(AgentError::malformed(
                "guard verdict",
                format!("decision must be `allowed` or `not allowed`, got `{}`", verdict.decision),
            ));
        }

        Ok(ResponderReply::from_agent(AGENT_NAME, verdict.message)
            .with_memory("guard_decision", decision))
    }
}
