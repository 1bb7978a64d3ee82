use std::str::FromStr;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use db::models::usage_record::{UpsertUsageRecord, UsageRecord, UsageSource, UsageStats};
use serde::{Deserialize, Serialize};
use services::services::pricing;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{Deployment, error::ApiError, http::auth::require_agent_auth, routes::require_json};

pub fn router(deployment: &Deployment) -> Router<Deployment> {
    let protected = Router::new()
        .route("/usage", post(report_usage))
        .layer(from_fn_with_state(deployment.clone(), require_agent_auth));

    Router::new()
        .route("/usage", get(get_usage))
        .merge(protected)
}

#[derive(Debug, Deserialize)]
pub struct UsageListQuery {
    pub project: Option<String>,
    pub model: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, TS)]
pub struct UsageResponse {
    pub records: Vec<UsageRecord>,
    pub stats: UsageStats,
}

/// Agent cost report. Token counters default to zero, `source` is a free
/// string sanitized to the enum, and a missing `estimated_cost` is priced
/// from the shared table.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportUsageRequest {
    pub agent_id: String,
    pub session_id: Option<String>,
    pub model: String,
    pub source: Option<String>,
    pub project_slug: Option<String>,
    #[serde(default)]
    pub input_tokens: i64,
    #[serde(default)]
    pub output_tokens: i64,
    #[serde(default)]
    pub cache_read_tokens: i64,
    #[serde(default)]
    pub cache_write_tokens: i64,
    #[serde(default)]
    pub api_calls: i64,
    pub estimated_cost: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

pub async fn get_usage(
    State(deployment): State<Deployment>,
    Query(query): Query<UsageListQuery>,
) -> Result<ResponseJson<ApiResponse<UsageResponse>>, ApiError> {
    let records = UsageRecord::find_all(
        &deployment.db().pool,
        query.project.as_deref(),
        query.model.as_deref(),
        query.limit,
    )
    .await?;
    let stats = UsageRecord::stats(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(UsageResponse {
        records,
        stats,
    })))
}

pub async fn report_usage(
    State(deployment): State<Deployment>,
    payload: Result<Json<ReportUsageRequest>, JsonRejection>,
) -> Result<ResponseJson<ApiResponse<UsageRecord>>, ApiError> {
    let payload = require_json(payload)?;
    if payload.agent_id.trim().is_empty() {
        return Err(ApiError::BadRequest("agentId must not be empty".to_string()));
    }

    let source = payload
        .source
        .as_deref()
        .map(|raw| UsageSource::from_str(raw).unwrap_or_default())
        .unwrap_or_default();

    let estimated_cost = payload.estimated_cost.unwrap_or_else(|| {
        pricing::calculate_cost(
            &payload.model,
            payload.input_tokens,
            payload.output_tokens,
            payload.cache_read_tokens,
            payload.cache_write_tokens,
        )
    });

    let data = UpsertUsageRecord {
        agent_id: payload.agent_id,
        session_id: payload.session_id,
        model: payload.model,
        source,
        project_slug: payload.project_slug,
        input_tokens: payload.input_tokens,
        output_tokens: payload.output_tokens,
        cache_read_tokens: payload.cache_read_tokens,
        cache_write_tokens: payload.cache_write_tokens,
        api_calls: payload.api_calls,
        estimated_cost,
        started_at: payload.started_at,
        ended_at: payload.ended_at,
    };

    let record = UsageRecord::upsert_by_agent_id(&deployment.db().pool, &data).await?;
    Ok(ResponseJson(ApiResponse::success(record)))
}
