use axum::Router;

use crate::{Deployment, routes};

pub(crate) mod auth;

pub fn router(deployment: Deployment) -> Router {
    let api_routes = Router::new()
        .merge(routes::health::router())
        .merge(routes::projects::router(&deployment))
        .merge(routes::tasks::router(&deployment))
        .merge(routes::decisions::router(&deployment))
        .merge(routes::agent_runs::router(&deployment))
        .merge(routes::usage::router(&deployment))
        .merge(routes::activities::router(&deployment))
        .merge(routes::memory::router(&deployment))
        .merge(routes::cron_jobs::router())
        .merge(routes::deploy_webhook::router())
        .merge(routes::events::router());

    Router::new()
        .nest("/api", api_routes)
        .with_state(deployment)
}
