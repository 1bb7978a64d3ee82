use std::str::FromStr;

use axum::{
    Extension, Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::models::task::{CreateTask, Task, TaskPriority, TaskStatus, UpdateTask};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    Deployment, error::ApiError, http::auth::require_agent_auth,
    middleware::load_task_middleware, routes::require_json,
};

pub fn router(deployment: &Deployment) -> Router<Deployment> {
    let protected = Router::new()
        .route("/tasks", post(create_task).patch(update_task))
        .merge(
            Router::new()
                .route("/tasks/{task_id}", delete(delete_task))
                .layer(from_fn_with_state(
                    deployment.clone(),
                    load_task_middleware,
                )),
        )
        .layer(from_fn_with_state(deployment.clone(), require_agent_auth));

    Router::new()
        .route("/tasks", get(get_tasks))
        .route("/tasks/stats", get(get_task_stats))
        .merge(
            Router::new()
                .route("/tasks/{task_id}/subtasks", get(get_subtasks))
                .layer(from_fn_with_state(
                    deployment.clone(),
                    load_task_middleware,
                )),
        )
        .merge(protected)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    pub project_slug: Option<String>,
    pub status: Option<TaskStatus>,
}

/// Agent intake shape. `priority` arrives as a free string so that a
/// misremembered value degrades to `medium` instead of bouncing the report.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub project_slug: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub labels: Option<Vec<String>>,
    pub parent_task_id: Option<Uuid>,
    pub decision_id: Option<Uuid>,
    pub agent_run_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: UpdateTask,
}

pub async fn get_tasks(
    State(deployment): State<Deployment>,
    Query(query): Query<TaskListQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = match query.status {
        Some(status) => Task::find_by_status(&deployment.db().pool, status).await?,
        None => Task::find_all(&deployment.db().pool, query.project_slug.as_deref()).await?,
    };
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task_stats(
    State(deployment): State<Deployment>,
    Query(query): Query<TaskListQuery>,
) -> Result<ResponseJson<ApiResponse<std::collections::BTreeMap<String, u64>>>, ApiError> {
    let counts = Task::status_counts(&deployment.db().pool, query.project_slug.as_deref()).await?;
    Ok(ResponseJson(ApiResponse::success(counts)))
}

pub async fn get_subtasks(
    Extension(parent): Extension<Task>,
    State(deployment): State<Deployment>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let subtasks = Task::find_subtasks(&deployment.db().pool, parent.id).await?;
    Ok(ResponseJson(ApiResponse::success(subtasks)))
}

pub async fn create_task(
    State(deployment): State<Deployment>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let payload = require_json(payload)?;
    if payload.project_slug.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "projectSlug must not be empty".to_string(),
        ));
    }
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let priority = payload
        .priority
        .as_deref()
        .map(|raw| TaskPriority::from_str(raw).unwrap_or_default());

    let data = CreateTask {
        project_slug: payload.project_slug,
        title: payload.title,
        description: payload.description,
        status: payload.status,
        priority,
        assignee: payload.assignee,
        labels: payload.labels,
        parent_task_id: payload.parent_task_id,
        decision_id: payload.decision_id,
        agent_run_id: payload.agent_run_id,
    };

    let task = Task::create(&deployment.db().pool, &data, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn update_task(
    State(deployment): State<Deployment>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let payload = require_json(payload)?;
    let task = Task::update(&deployment.db().pool, payload.id, &payload.fields).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    Extension(task): Extension<Task>,
    State(deployment): State<Deployment>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows_affected = Task::delete(&deployment.db().pool, task.id).await?;
    if rows_affected == 0 {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}
