use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::activity::{Activity, CreateActivity};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{Deployment, error::ApiError, http::auth::require_agent_auth, routes::require_json};

pub fn router(deployment: &Deployment) -> Router<Deployment> {
    let protected = Router::new()
        .route("/activity", post(create_activity))
        .layer(from_fn_with_state(deployment.clone(), require_agent_auth));

    Router::new()
        .route("/activity", get(get_activity))
        .merge(protected)
}

#[derive(Debug, Deserialize)]
pub struct ActivityListQuery {
    pub project: Option<String>,
    pub limit: Option<u64>,
}

pub async fn get_activity(
    State(deployment): State<Deployment>,
    Query(query): Query<ActivityListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Activity>>>, ApiError> {
    let entries =
        Activity::find_recent(&deployment.db().pool, query.project.as_deref(), query.limit)
            .await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

pub async fn create_activity(
    State(deployment): State<Deployment>,
    payload: Result<Json<CreateActivity>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<Activity>>, ApiError> {
    let payload = require_json(payload)?;
    let entry = Activity::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(entry)))
}
