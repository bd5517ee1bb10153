//! JSON dispatch surface.
//!
//! Endpoints:
//! - `POST /v1/respond` - run one dialog turn through the pipeline and
//!   return the reply, memory included, as the next history entry.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use brewline_agent::{AgentError, AgentPipeline, DialogMessage, ResponderReply};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AgentPipeline>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub input: RespondInput,
}

#[derive(Debug, Deserialize)]
pub struct RespondInput {
    #[serde(default)]
    pub messages: Vec<DialogMessage>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

pub fn router(state: AppState) -> Router {
    Router::new().route("/v1/respond", post(respond)).with_state(state)
}

pub async fn respond(
    State(state): State<AppState>,
    Json(request): Json<RespondRequest>,
) -> Result<Json<ResponderReply>, (StatusCode, Json<ErrorBody>)> {
    state
        .pipeline
        .handle(&request.input.messages)
        .await
        .map(Json)
        .map_err(error_response)
}

fn error_response(agent_error: AgentError) -> (StatusCode, Json<ErrorBody>) {
    let correlation_id = Uuid::new_v4().to_string();
    let status = match &agent_error {
        AgentError::EmptyHistory => StatusCode::BAD_REQUEST,
        AgentError::MalformedModelOutput { .. }
        | AgentError::UpstreamCall { .. }
        | AgentError::UnknownResponderKey(_) => StatusCode::BAD_GATEWAY,
    };

    if status.is_server_error() {
        error!(
            event_name = "http.respond.failed",
            %correlation_id,
            error = %agent_error,
            "turn failed"
        );
    } else {
        warn!(
            event_name = "http.respond.rejected",
            %correlation_id,
            error = %agent_error,
            "turn rejected"
        );
    }

    (status, Json(ErrorBody { error: agent_error.to_string(), correlation_id }))
}
