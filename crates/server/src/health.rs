use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use quarry_db::DbPool;
use serde::Serialize;

pub const READY_PATH: &str = "/ready";

#[derive(Clone)]
pub struct ReadinessState {
    agent: String,
    db_pool: DbPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub agent: String,
    pub database: HealthCheck,
    pub checked_at: String,
}

/// Readiness for data agents: liveness says the process is up, this says it can reach its table.
pub fn readiness_router(agent: impl Into<String>, db_pool: DbPool) -> Router {
    Router::new()
        .route(READY_PATH, get(readiness))
        .with_state(ReadinessState { agent: agent.into(), db_pool })
}

pub async fn readiness(
    State(state): State<ReadinessState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = ReadinessResponse {
        status: if ready { "ready" } else { "degraded" },
        agent: state.agent,
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}
