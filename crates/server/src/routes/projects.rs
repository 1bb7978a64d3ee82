use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, patch, post},
};
use db::models::project::{CreateProject, Project, UpdateProject};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{Deployment, error::ApiError, http::auth::require_agent_auth, routes::require_json};

pub fn router(deployment: &Deployment) -> Router<Deployment> {
    let protected = Router::new()
        .route("/projects", post(create_project))
        .route("/projects/{slug}", patch(update_project))
        .layer(from_fn_with_state(deployment.clone(), require_agent_auth));

    Router::new()
        .route("/projects", get(get_projects))
        .route("/projects/{slug}", get(get_project))
        .merge(protected)
}

pub async fn get_projects(
    State(deployment): State<Deployment>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = Project::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_project(
    State(deployment): State<Deployment>,
    Path(slug): Path<String>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = Project::find_by_slug(&deployment.db().pool, &slug)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No project with slug '{slug}'")))?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn create_project(
    State(deployment): State<Deployment>,
    payload: Result<Json<CreateProject>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let payload = require_json(payload)?;
    tracing::debug!("Creating project '{}'", payload.slug);

    let project = Project::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn update_project(
    State(deployment): State<Deployment>,
    Path(slug): Path<String>,
    payload: Result<Json<UpdateProject>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let payload = require_json(payload)?;
    let project = Project::update(&deployment.db().pool, &slug, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}
