//! Scripted stand-ins for the outbound clients, used across the crate's
//! tests so no test ever touches the network.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::llm::{ChatCompletion, Embedder, RetrievedPassage, VectorIndex};
use crate::responder::DialogMessage;

/// Replays a fixed sequence of completions and records every request.
pub struct ScriptedChat {
    responses: Mutex<Vec<String>>,
    requests: Mutex<Vec<Vec<DialogMessage>>>,
}

impl ScriptedChat {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }

    pub fn last_request(&self) -> Vec<DialogMessage> {
        self.requests.lock().expect("lock").last().cloned().expect("at least one request")
    }

    pub fn requests_at(&self, index: usize) -> Vec<DialogMessage> {
        self.requests.lock().expect("lock").get(index).cloned().expect("request at index")
    }
}

#[async_trait]
impl ChatCompletion for ScriptedChat {
    async fn complete(&self, messages: &[DialogMessage]) -> Result<String> {
        self.requests.lock().expect("lock").push(messages.to_vec());
        let mut responses = self.responses.lock().expect("lock");
        if responses.is_empty() {
            return Err(anyhow!("scripted chat exhausted"));
        }
        Ok(responses.remove(0))
    }
}

pub struct FixedEmbedder {
    pub vector: Vec<f32>,
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(anyhow!("embedding service unavailable"))
    }
}

pub struct FixedIndex {
    pub passages: Vec<RetrievedPassage>,
}

#[async_trait]
impl VectorIndex for FixedIndex {
    async fn query(&self, _vector: &[f32], top_k: usize) -> Result<Vec<RetrievedPassage>> {
        Ok(self.passages.iter().take(top_k).cloned().collect())
    }
}

pub struct FailingIndex;

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn query(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<RetrievedPassage>> {
        Err(anyhow!("vector index unreachable"))
    }
}
