use thiserror::Error;

/// Request-scoped failure taxonomy of the dispatch pipeline.
///
/// None of these are retried here: callers may wrap the pipeline with a
/// retry policy, but the core performs a single attempt per stage and
/// never substitutes a guessed decision for a failed one.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A completion expected to be structured failed to parse even after
    /// the single repair attempt.
    #[error("model output could not be parsed as {expected}: {detail}")]
    MalformedModelOutput { expected: &'static str, detail: String },

    /// The router (or its repair) produced a decision outside the
    /// configured key set. Fatal for the request.
    #[error("decision `{0}` is not a configured responder key")]
    UnknownResponderKey(String),

    /// Caller error: the pipeline needs at least one dialog message.
    #[error("dialog history must contain at least one message")]
    EmptyHistory,

    /// An outbound call (completion, embedding, retrieval) errored or
    /// timed out.
    #[error("{service} call failed: {source}")]
    UpstreamCall {
        service: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl AgentError {
    pub fn upstream(service: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::UpstreamCall { service, source: source.into() }
    }

    pub fn malformed(expected: &'static str, detail: impl Into<String>) -> Self {
        Self::MalformedModelOutput { expected, detail: detail.into() }
    }
}
