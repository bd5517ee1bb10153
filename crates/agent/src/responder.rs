//! Dialog contracts shared by every pipeline stage.
//!
//! History is append-only and oldest-first. Stages receive an immutable
//! view and read a bounded suffix; no stage mutates a caller-visible
//! message in place.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Structured metadata attached to a reply, distinct from its user-facing
/// text. Always carries `agent: <responder-name>`; the router adds
/// `decision`, the gate adds `guard_decision`, the order taker its running
/// order state.
pub type Memory = serde_json::Map<String, Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialogMessage {
    pub role: Role,
    pub content: String,
    /// Present on assistant messages a client echoed back from an earlier
    /// reply; how multi-turn responders recover their state.
    #[serde(default, skip_serializing_if = "Memory::is_empty")]
    pub memory: Memory,
}

impl DialogMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), memory: Memory::new() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), memory: Memory::new() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), memory: Memory::new() }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponderReply {
    pub role: Role,
    pub content: String,
    pub memory: Memory,
}

impl ResponderReply {
    pub fn from_agent(agent: &str, content: impl Into<String>) -> Self {
        let mut memory = Memory::new();
        memory.insert("agent".to_string(), Value::String(agent.to_string()));
        Self { role: Role::Assistant, content: content.into(), memory }
    }

    pub fn with_memory(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.memory.insert(key.to_string(), value.into());
        self
    }

    pub fn agent(&self) -> Option<&str> {
        self.memory_str("agent")
    }

    pub fn memory_str(&self, key: &str) -> Option<&str> {
        self.memory.get(key).and_then(Value::as_str)
    }

    /// The reply as a history entry, memory included, so a client can
    /// append it and multi-turn responders can recover their state.
    pub fn into_dialog_message(self) -> DialogMessage {
        DialogMessage { role: self.role, content: self.content, memory: self.memory }
    }
}

/// The last `n` messages of history, oldest-first. Every classification
/// prompt sees this bounded window rather than the full transcript.
pub fn context_window(history: &[DialogMessage], n: usize) -> &[DialogMessage] {
    &history[history.len().saturating_sub(n)..]
}

/// Any component that can consume dialog history and produce a reply.
/// Implemented by the gate, the router, and every dispatched variant;
/// this is the sole extension point for adding a responder key.
#[async_trait]
pub trait Responder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_response(&self, history: &[DialogMessage])
        -> Result<ResponderReply, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::{context_window, DialogMessage, ResponderReply};

    #[test]
    fn reply_memory_always_carries_the_agent_name() {
        let reply = ResponderReply::from_agent("details", "We open at 8am.")
            .with_memory("decision", "details");

        assert_eq!(reply.agent(), Some("details"));
        assert_eq!(reply.memory_str("decision"), Some("details"));
    }

    #[test]
    fn context_window_takes_the_newest_suffix() {
        let history = vec![
            DialogMessage::user("one"),
            DialogMessage::assistant("two"),
            DialogMessage::user("three"),
            DialogMessage::user("four"),
        ];

        let window = context_window(&history, 3);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].content, "two");
        assert_eq!(window[2].content, "four");

        assert_eq!(context_window(&history, 10).len(), 4);
    }

    #[test]
    fn empty_memory_is_omitted_from_the_wire_shape() {
        let plain = serde_json::to_string(&DialogMessage::user("hi")).expect("serialize");
        assert!(!plain.contains("memory"));

        let reply = ResponderReply::from_agent("router", "").into_dialog_message();
        let tagged = serde_json::to_string(&reply).expect("serialize");
        assert!(tagged.contains("\"agent\":\"router\""));
    }

    #[test]
    fn roles_serialize_lowercase() {
        let message = DialogMessage::assistant("hello");
        let json = serde_json::to_string(&message).expect("serialize");
        assert!(json.contains("\"role\":\"assistant\""));
    }
}
