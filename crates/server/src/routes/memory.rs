use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::memory_file::{MemoryFile, UpsertMemoryFile};
use serde::{Deserialize, Serialize};
use utils::response::ApiResponse;

use crate::{Deployment, error::ApiError, http::auth::require_agent_auth, routes::require_json};

pub fn router(deployment: &Deployment) -> Router<Deployment> {
    let protected = Router::new()
        .route("/memory", post(upsert_memory_file))
        .layer(from_fn_with_state(deployment.clone(), require_agent_auth));

    Router::new()
        .route("/memory", get(get_memory))
        .merge(protected)
}

#[derive(Debug, Deserialize)]
pub struct MemoryQuery {
    pub file: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MemoryResponse {
    One(MemoryFile),
    Many(Vec<MemoryFile>),
}

pub async fn get_memory(
    State(deployment): State<Deployment>,
    Query(query): Query<MemoryQuery>,
) -> Result<ResponseJson<ApiResponse<MemoryResponse>>, ApiError> {
    let response = match query.file.as_deref() {
        Some(filename) => {
            let file = MemoryFile::find_by_filename(&deployment.db().pool, filename)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("No memory file '{filename}'")))?;
            MemoryResponse::One(file)
        }
        None => MemoryResponse::Many(MemoryFile::find_all(&deployment.db().pool).await?),
    };
    Ok(ResponseJson(ApiResponse::success(response)))
}

pub async fn upsert_memory_file(
    State(deployment): State<Deployment>,
    payload: Result<Json<UpsertMemoryFile>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<MemoryFile>>, ApiError> {
    let payload = require_json(payload)?;
    if payload.filename.trim().is_empty() {
        return Err(ApiError::BadRequest("filename must not be empty".to_string()));
    }

    let file = MemoryFile::upsert_by_filename(&deployment.db().pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(file)))
}
