//! HTTP side of the agent protocol:
//!
//! - `GET  /.well-known/agent-card.json` returns the agent card verbatim
//! - `POST /a2a/tasks/send` runs one JSON-RPC task
//! - `GET  /health` is the liveness check
//!
//! Protocol errors travel in the JSON-RPC body; the HTTP status is always 200.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{error, info, warn};

use quarry_agent::{DataAgent, Orchestrator};
use quarry_core::domain::{AgentCard, QueryResult};
use quarry_core::protocol::{
    parse_task_request, ErrorCode, RpcResponse, TaskResult, AGENT_CARD_PATH, HEALTH_PATH,
    TASKS_SEND_PATH,
};

/// Anything that can answer a `tasks/send` text. `Err` becomes a `-32603` response.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, text: &str) -> Result<QueryResult, String>;
}

#[async_trait]
impl TaskHandler for DataAgent {
    async fn handle(&self, text: &str) -> Result<QueryResult, String> {
        Ok(self.process_query(text).await)
    }
}

#[async_trait]
impl TaskHandler for Orchestrator {
    async fn handle(&self, text: &str) -> Result<QueryResult, String> {
        let aggregated = self.process_query(text).await.map_err(|error| error.to_string())?;
        if aggregated.success {
            Ok(QueryResult::success(
                aggregated.response_text,
                aggregated.combined_data.unwrap_or_default(),
            ))
        } else {
            Ok(QueryResult::failure(aggregated.response_text))
        }
    }
}

#[derive(Clone)]
pub struct AgentState {
    card: Arc<AgentCard>,
    handler: Arc<dyn TaskHandler>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub agent: String,
}

pub fn router(card: AgentCard, handler: Arc<dyn TaskHandler>) -> Router {
    Router::new()
        .route(AGENT_CARD_PATH, get(agent_card))
        .route(TASKS_SEND_PATH, post(send_task))
        .route(HEALTH_PATH, get(liveness))
        .with_state(AgentState { card: Arc::new(card), handler })
}

async fn agent_card(State(state): State<AgentState>) -> Json<AgentCard> {
    Json(state.card.as_ref().clone())
}

async fn liveness(State(state): State<AgentState>) -> Json<Liveness> {
    Json(Liveness { status: "healthy", agent: state.card.name.clone() })
}

async fn send_task(State(state): State<AgentState>, body: Bytes) -> Json<RpcResponse> {
    let task = match parse_task_request(&body) {
        Ok(task) => task,
        Err(rejection) => {
            warn!(
                event_name = "system.a2a.request_rejected",
                agent = %state.card.name,
                "rejected malformed tasks/send request"
            );
            return Json(rejection);
        }
    };

    info!(
        event_name = "system.a2a.task_received",
        agent = %state.card.name,
        chars = task.text.len(),
        "task received"
    );

    match state.handler.handle(&task.text).await {
        Ok(result) => Json(RpcResponse::result(task.id, TaskResult::from_query_result(result))),
        Err(message) => {
            error!(
                event_name = "system.a2a.task_failed",
                agent = %state.card.name,
                error = %message,
                "task handler failed"
            );
            Json(RpcResponse::error(task.id, ErrorCode::InternalError, message))
        }
    }
}
