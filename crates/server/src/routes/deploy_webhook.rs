use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::Json as ResponseJson,
    routing::post,
};
use db::{
    models::{
        activity::{Activity, CreateActivity},
        project::Project,
    },
    types::ActivityType,
};
use serde::Deserialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{Deployment, error::ApiError, routes::require_json};

const MAX_ERROR_LEN: usize = 500;

pub fn router() -> Router<Deployment> {
    Router::new().route("/deploy-webhook", post(handle_deploy_webhook))
}

#[derive(Debug, Deserialize)]
pub struct DeployWebhook {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

fn deployment_name(payload: &serde_json::Value) -> &str {
    payload
        .pointer("/deployment/name")
        .or_else(|| payload.get("name"))
        .and_then(|value| value.as_str())
        .unwrap_or("unknown")
}

fn deployment_error(payload: &serde_json::Value) -> String {
    let raw = payload
        .get("errorMessage")
        .or_else(|| payload.pointer("/deployment/errorMessage"))
        .and_then(|value| value.as_str())
        .unwrap_or("unknown error");
    raw.chars().take(MAX_ERROR_LEN).collect()
}

/// Substring match against the deployment name; Vercel project names rarely
/// equal our slugs exactly.
fn match_project_slug(projects: &[Project], name: &str) -> Option<String> {
    let name = name.to_lowercase();
    projects
        .iter()
        .find(|project| {
            name.contains(&project.slug.to_lowercase())
                || name.contains(&project.name.to_lowercase())
        })
        .map(|project| project.slug.clone())
}

pub async fn handle_deploy_webhook(
    State(deployment): State<Deployment>,
    payload: Result<Json<DeployWebhook>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let webhook = require_json(payload)?;

    // Only failed deployments are worth a feed entry; everything else is
    // acknowledged and dropped.
    if !matches!(
        webhook.event_type.as_str(),
        "deployment.error" | "deployment-error"
    ) {
        return Ok(ResponseJson(ApiResponse::success(())));
    }

    let name = deployment_name(&webhook.payload);
    let error = deployment_error(&webhook.payload);

    let projects = Project::find_all(&deployment.db().pool).await?;
    let project_slug = match_project_slug(&projects, name);

    let entry = CreateActivity {
        activity_type: ActivityType::Agent,
        actor: "vercel".to_string(),
        message: format!("DEPLOY_FAILED::{name}::{error}"),
        project_slug,
    };
    Activity::create(&deployment.db().pool, &entry, Uuid::new_v4()).await?;

    Ok(ResponseJson(ApiResponse::success(())))
}
