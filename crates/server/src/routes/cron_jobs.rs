use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use services::services::cron::{self, CronJob};
use utils::response::ApiResponse;

use crate::{Deployment, error::ApiError};

pub fn router() -> Router<Deployment> {
    Router::new().route("/cron-jobs", get(get_cron_jobs))
}

/// Renders the scheduler's state file; the scheduler itself runs elsewhere.
pub async fn get_cron_jobs(
    State(deployment): State<Deployment>,
) -> Result<ResponseJson<ApiResponse<Vec<CronJob>>>, ApiError> {
    let path = {
        let config = deployment.config().read().await;
        config.cron_jobs_path()
    };
    let jobs = cron::read_jobs(&path)?;
    Ok(ResponseJson(ApiResponse::success(jobs)))
}
