//! Bounded-context structured classification.
//!
//! The router, the safety gate, and the recommendation intent step all
//! follow the same two-step pattern: a fixed system prompt plus the last N
//! dialog messages go out as one completion request, and the answer must
//! parse into a typed record. On a parse failure the classifier makes
//! exactly one repair call asking the model to correct its own malformed
//! JSON, then re-parses; a second failure is `MalformedModelOutput`,
//! never a silently guessed decision.

use serde::de::DeserializeOwned;

use crate::error::AgentError;
use crate::llm::ChatCompletion;
use crate::responder::{context_window, DialogMessage};

#[derive(Clone, Copy, Debug)]
pub struct StructuredClassifier {
    context_window: usize,
}

impl StructuredClassifier {
    pub fn new(context_window: usize) -> Self {
        Self { context_window }
    }

    pub async fn classify<T: DeserializeOwned>(
        &self,
        llm: &dyn ChatCompletion,
        system_prompt: &str,
        history: &[DialogMessage],
        expected: &'static str,
    ) -> Result<T, AgentError> {
        let mut messages = vec![DialogMessage::system(system_prompt)];
        messages.extend_from_slice(context_window(history, self.context_window));

        let raw = llm
            .complete(&messages)
            .await
            .map_err(|error| AgentError::upstream("completion", error))?;

        match parse_structured::<T>(&raw) {
            Ok(record) => Ok(record),
            Err(first_error) => {
                tracing::warn!(
                    event_name = "classify.repair_attempt",
                    expected,
                    error = %first_error,
                    "structured output failed to parse, issuing one repair call"
                );
                let repaired = llm
                    .complete(&[DialogMessage::user(repair_prompt(&raw))])
                    .await
                    .map_err(|error| AgentError::upstream("completion", error))?;

                parse_structured::<T>(&repaired)
                    .map_err(|error| AgentError::malformed(expected, error.to_string()))
            }
        }
    }
}

fn repair_prompt(malformed: &str) -> String {
    format!(
        "You will check this json string and correct any mistakes that make it invalid, \
         then return the corrected json string and nothing else. If the json is already \
         valid, return it unchanged. Do not return a single character outside the json \
         string.\n\n{malformed}"
    )
}

/// Parse a model answer as JSON, tolerating markdown code fences and
/// leading/trailing chatter around the object.
fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let stripped = strip_code_fences(raw);
    match serde_json::from_str::<T>(stripped) {
        Ok(record) => Ok(record),
        Err(error) => match extract_json_object(stripped) {
            Some(candidate) => serde_json::from_str::<T>(candidate),
            None => Err(error),
        },
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
