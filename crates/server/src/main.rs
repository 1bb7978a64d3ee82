use anyhow::Error as AnyhowError;
use db::DbErr;
use server::{Deployment, DeploymentError, http};
use services::services::config::save_config_to_file;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::{
    APP_VERSION,
    assets::{asset_dir, config_path},
};

const DEFAULT_PORT: u16 = 8420;

#[derive(Debug, Error)]
pub enum MissionControlError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), MissionControlError> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},utils={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string).expect("Failed to create tracing filter");
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    if !asset_dir().exists() {
        std::fs::create_dir_all(asset_dir())?;
    }

    let deployment = Deployment::new().await?;

    {
        let mut config = deployment.config().write().await;
        config.last_app_version = Some(APP_VERSION.to_string());
        if let Err(err) = save_config_to_file(&config, &config_path()).await {
            tracing::warn!("Failed to persist config: {}", err);
        }
    }

    let app_router = http::router(deployment);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|raw| raw.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("Mission Control API on http://{host}:{actual_port}");

    axum::serve(
        listener,
        app_router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {err}");
        return;
    }
    tracing::info!("Shutdown signal received");
}
