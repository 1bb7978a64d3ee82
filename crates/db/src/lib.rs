use sea_orm::{ConnectOptions, Database, DatabaseConnection};
pub use sea_orm::DbErr;
use sea_orm_migration::MigratorTrait;
use utils::assets::asset_dir;

pub mod entities;
pub mod events;
pub mod models;
pub mod types;

#[derive(Clone)]
pub struct DBService {
    pub pool: DatabaseConnection,
}

impl DBService {
    pub async fn new() -> Result<DBService, DbErr> {
        let database_url = format!(
            "sqlite://{}?mode=rwc",
            asset_dir().join("db.sqlite").to_string_lossy()
        );
        Self::new_with_url(&database_url).await
    }

    pub async fn new_with_url(database_url: &str) -> Result<DBService, DbErr> {
        let mut options = ConnectOptions::new(database_url);
        options.sqlx_logging(false);
        let pool = Database::connect(options).await?;
        db_migration::Migrator::up(&pool, None).await?;
        Ok(DBService { pool })
    }
}
