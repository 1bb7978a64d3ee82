use std::str::FromStr;

use axum::{
    Extension, Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::decision::{CreateDecision, Decision, DecisionStatus};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    Deployment, error::ApiError, middleware::load_decision_middleware, routes::require_json,
};

pub fn router(deployment: &Deployment) -> Router<Deployment> {
    let decision_scoped = Router::new()
        .route("/decisions/{decision_id}/resolve", post(resolve_decision))
        .route("/decisions/{decision_id}/defer", post(defer_decision))
        .route("/decisions/{decision_id}/comment", post(comment_decision))
        .layer(from_fn_with_state(
            deployment.clone(),
            load_decision_middleware,
        ));

    Router::new()
        .route("/decisions", get(get_decisions).post(create_decision))
        .merge(decision_scoped)
}

#[derive(Debug, Deserialize)]
pub struct DecisionListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveDecisionRequest {
    pub resolution: String,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeferDecisionRequest {
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentDecisionRequest {
    pub comment: String,
}

pub async fn get_decisions(
    State(deployment): State<Deployment>,
    Query(query): Query<DecisionListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Decision>>>, ApiError> {
    let decisions = match query.status.as_deref() {
        None => Decision::find_all(&deployment.db().pool).await?,
        Some("pending") => Decision::find_pending(&deployment.db().pool).await?,
        Some(raw) => {
            let status = DecisionStatus::from_str(raw)
                .map_err(|_| ApiError::BadRequest(format!("Unknown decision status '{raw}'")))?;
            Decision::find_by_status(&deployment.db().pool, status).await?
        }
    };
    Ok(ResponseJson(ApiResponse::success(decisions)))
}

pub async fn create_decision(
    State(deployment): State<Deployment>,
    payload: Result<Json<CreateDecision>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<Decision>>, ApiError> {
    let payload = require_json(payload)?;
    if payload.project_slug.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "projectSlug must not be empty".to_string(),
        ));
    }
    let decision = Decision::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(decision)))
}

pub async fn resolve_decision(
    Extension(decision): Extension<Decision>,
    State(deployment): State<Deployment>,
    payload: Result<Json<ResolveDecisionRequest>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<Decision>>, ApiError> {
    let payload = require_json(payload)?;
    let decision = Decision::resolve(
        &deployment.db().pool,
        decision.id,
        &payload.resolution,
        payload.comment.as_deref(),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(decision)))
}

pub async fn defer_decision(
    Extension(decision): Extension<Decision>,
    State(deployment): State<Deployment>,
    payload: Option<Json<DeferDecisionRequest>>,
) -> Result<ResponseJson<ApiResponse<Decision>>, ApiError> {
    let comment = payload.as_ref().and_then(|Json(body)| body.comment.clone());
    let decision =
        Decision::defer(&deployment.db().pool, decision.id, comment.as_deref()).await?;
    Ok(ResponseJson(ApiResponse::success(decision)))
}

pub async fn comment_decision(
    Extension(decision): Extension<Decision>,
    State(deployment): State<Deployment>,
    payload: Result<Json<CommentDecisionRequest>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<Decision>>, ApiError> {
    let payload = require_json(payload)?;
    let decision =
        Decision::add_comment(&deployment.db().pool, decision.id, &payload.comment).await?;
    Ok(ResponseJson(ApiResponse::success(decision)))
}
