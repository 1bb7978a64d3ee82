use std::sync::Arc;

use db::{DBService, DbErr};
use services::services::{
    config::{Config, load_config_from_file},
    events::EventService,
    status_files::{FilesystemStatusSource, StatusSource},
};
use thiserror::Error;
use tokio::sync::RwLock;
use utils::{assets::config_path, msg_store::MsgStore};

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shared application state handed to every route.
#[derive(Clone)]
pub struct Deployment {
    config: Arc<RwLock<Config>>,
    db: DBService,
    events: EventService,
    status_source: Arc<dyn StatusSource>,
}

impl Deployment {
    pub async fn new() -> Result<Self, DeploymentError> {
        let config = load_config_from_file(&config_path()).await;
        let db = DBService::new().await?;
        Ok(Self::from_parts(config, db))
    }

    /// Assemble state around an existing database handle. Spawns the outbox
    /// worker, so it must run inside a tokio runtime.
    pub fn from_parts(config: Config, db: DBService) -> Self {
        let status_dir = config.agent_status_dir();
        let msg_store = Arc::new(MsgStore::new());
        let events = EventService::new(db.clone(), msg_store);

        Self {
            config: Arc::new(RwLock::new(config)),
            db,
            events,
            status_source: Arc::new(FilesystemStatusSource::new(status_dir)),
        }
    }

    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn events(&self) -> &EventService {
        &self.events
    }

    pub fn status_source(&self) -> &Arc<dyn StatusSource> {
        &self.status_source
    }
}
