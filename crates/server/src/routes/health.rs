use axum::{Router, response::Json as ResponseJson, routing::get};
use utils::response::ApiResponse;

use crate::Deployment;

pub fn router() -> Router<Deployment> {
    Router::new().route("/health", get(health_check))
}

pub async fn health_check() -> ResponseJson<ApiResponse<&'static str>> {
    ResponseJson(ApiResponse::success("ok"))
}
