use axum::{Json, extract::rejection::JsonRejection};

use crate::error::ApiError;

pub mod activities;
pub mod agent_runs;
pub mod cron_jobs;
pub mod decisions;
pub mod deploy_webhook;
pub mod events;
pub mod health;
pub mod memory;
pub mod projects;
pub mod tasks;
pub mod usage;

/// Unwrap a JSON body, turning deserialization failures into a 400 instead of
/// axum's default 422.
pub(crate) fn require_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
    }
}
