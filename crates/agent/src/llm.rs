//! Outbound client seams: chat completion, embedding, vector retrieval.
//!
//! Every call is a blocking request/response with a bounded timeout; an
//! exceeded timeout is that call's failure and is never retried here.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use brewline_core::config::{EmbeddingConfig, LlmConfig, VectorConfig};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::responder::{DialogMessage, Role};

/// Generation defaults: deterministic-leaning on purpose, so routing and
/// intent classification behave the same way run to run.
pub const TEMPERATURE: f32 = 0.0;
pub const TOP_P: f32 = 0.8;
pub const MAX_TOKENS: u32 = 2000;

#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[DialogMessage]) -> Result<String>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetrievedPassage {
    pub score: f32,
    pub text: String,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedPassage>>;
}

/// Stand-in for a configured vector index when none is. Q&A then always
/// answers with an empty grounding context.
pub struct UngroundedIndex;

#[async_trait]
impl VectorIndex for UngroundedIndex {
    async fn query(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<RetrievedPassage>> {
        Ok(Vec::new())
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn wire_messages(messages: &[DialogMessage]) -> Vec<serde_json::Value> {
    // Memory never goes over the wire to the model.
    messages
        .iter()
        .map(|message| json!({ "role": role_name(message.role), "content": message.content }))
        .collect()
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build http client")
}

fn classify_send_error(endpoint: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        anyhow!("request to {endpoint} timed out")
    } else if error.is_connect() {
        anyhow!("failed to connect to {endpoint}: {error}")
    } else {
        anyhow!("request to {endpoint} failed: {error}")
    }
}

/// OpenAI-compatible `chat/completions` client.
pub struct ChatClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            http: http_client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key_value(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatCompletion for ChatClient {
    async fn complete(&self, messages: &[DialogMessage]) -> Result<String> {
        let endpoint = format!("{}/chat/completions", self.base_url);
        let request = json!({
            "model": self.model,
            "messages": wire_messages(messages),
            "temperature": TEMPERATURE,
            "top_p": TOP_P,
            "max_tokens": MAX_TOKENS,
            "stream": false,
        });

        let mut builder = self.http.post(&endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|error| classify_send_error(&endpoint, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("completion API error ({status}): {body}"));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .with_context(|| format!("invalid completion response from {endpoint}"))?;

        let choice =
            parsed.choices.into_iter().next().ok_or_else(|| anyhow!("no choices returned"))?;
        Ok(choice.message.content)
    }
}

/// OpenAI-compatible `/embeddings` client.
pub struct EmbeddingClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl EmbeddingClient {
    pub fn new(config: &EmbeddingConfig, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key_value(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let endpoint = format!("{}/embeddings", self.base_url);
        let request = json!({ "model": self.model, "input": text });

        let mut builder = self.http.post(&endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|error| classify_send_error(&endpoint, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("embedding API error ({status}): {body}"));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .with_context(|| format!("invalid embedding response from {endpoint}"))?;

        let first =
            parsed.data.into_iter().next().ok_or_else(|| anyhow!("no embedding returned"))?;
        Ok(first.embedding)
    }
}

/// Pinecone-style `/query` client. Passage text travels in match metadata.
pub struct VectorIndexClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    namespace: String,
}

impl VectorIndexClient {
    pub fn new(config: &VectorConfig, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key_value(),
            namespace: config.namespace.clone(),
        })
    }
}

#[async_trait]
impl VectorIndex for VectorIndexClient {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedPassage>> {
        let endpoint = format!("{}/query", self.base_url);
        let request = json!({
            "namespace": self.namespace,
            "vector": vector,
            "topK": top_k,
            "includeValues": false,
            "includeMetadata": true,
        });

        let mut builder = self.http.post(&endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Api-Key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| classify_send_error(&endpoint, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("vector index API error ({status}): {body}"));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .with_context(|| format!("invalid query response from {endpoint}"))?;

        Ok(parsed
            .matches
            .into_iter()
            .map(|hit| RetrievedPassage { score: hit.score, text: hit.metadata.text })
            .collect())
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRecord>,
}

#[derive(Deserialize)]
struct EmbeddingRecord {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    #[serde(default)]
    score: f32,
    metadata: QueryMetadata,
}

#[derive(Deserialize)]
struct QueryMetadata {
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::wire_messages;
    use crate::responder::{DialogMessage, ResponderReply};

    #[test]
    fn wire_messages_drop_memory_and_keep_order() {
        let history = vec![
            DialogMessage::system("be helpful"),
            ResponderReply::from_agent("router", "ack")
                .with_memory("decision", "details")
                .into_dialog_message(),
            DialogMessage::user("hi"),
        ];

        let wire = wire_messages(&history);
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[1]["role"], "assistant");
        assert!(wire[1].get("memory").is_none());
        assert_eq!(wire[2]["content"], "hi");
    }
}
