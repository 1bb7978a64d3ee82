use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::agent_run::{AgentRun, UpsertAgentRun};
use serde::Deserialize;
use services::services::status_files::AgentStatusFile;
use utils::response::ApiResponse;

use crate::{Deployment, error::ApiError, http::auth::require_agent_auth, routes::require_json};

pub fn router(deployment: &Deployment) -> Router<Deployment> {
    let protected = Router::new()
        .route("/agent-logs", post(report_agent_run))
        .layer(from_fn_with_state(deployment.clone(), require_agent_auth));

    Router::new()
        .route("/agent-logs", get(get_agent_runs))
        .route("/agent-logs/files", get(get_agent_status_files))
        .merge(protected)
}

#[derive(Debug, Deserialize)]
pub struct AgentRunListQuery {
    pub project: Option<String>,
    pub limit: Option<u64>,
    pub running: Option<bool>,
}

pub async fn get_agent_runs(
    State(deployment): State<Deployment>,
    Query(query): Query<AgentRunListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<AgentRun>>>, ApiError> {
    let runs = if query.running.unwrap_or(false) {
        AgentRun::find_running(&deployment.db().pool).await?
    } else {
        AgentRun::find_all(&deployment.db().pool, query.project.as_deref(), query.limit).await?
    };
    Ok(ResponseJson(ApiResponse::success(runs)))
}

/// Out-of-band variant backed by `agent-<id>.status` files on disk.
pub async fn get_agent_status_files(
    State(deployment): State<Deployment>,
) -> Result<ResponseJson<ApiResponse<Vec<AgentStatusFile>>>, ApiError> {
    let files = deployment.status_source().list()?;
    Ok(ResponseJson(ApiResponse::success(files)))
}

pub async fn report_agent_run(
    State(deployment): State<Deployment>,
    payload: Result<Json<UpsertAgentRun>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<AgentRun>>, ApiError> {
    let payload = require_json(payload)?;
    if payload.agent_id.trim().is_empty() {
        return Err(ApiError::BadRequest("agentId must not be empty".to_string()));
    }

    let run = AgentRun::upsert_by_agent_id(&deployment.db().pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(run)))
}
