use axum::{
    Router,
    extract::State,
    response::sse::{KeepAlive, Sse},
    routing::get,
};

use crate::Deployment;

pub fn router() -> Router<Deployment> {
    Router::new().route("/events", get(stream_events))
}

/// Replays patch history, then streams live RFC 6902 patches as SSE.
pub async fn stream_events(State(deployment): State<Deployment>) -> impl axum::response::IntoResponse {
    Sse::new(deployment.events().msg_store().sse_stream()).keep_alive(KeepAlive::default())
}
