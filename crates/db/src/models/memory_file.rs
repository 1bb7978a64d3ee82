use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::memory_file,
    events::{EVENT_MEMORY_FILE_UPSERTED, MemoryFileEventPayload},
    models::event_outbox::EventOutbox,
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct MemoryFile {
    pub id: Uuid,
    pub filename: String,
    pub content: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpsertMemoryFile {
    pub filename: String,
    pub content: String,
}

impl MemoryFile {
    fn from_model(model: memory_file::Model) -> Self {
        Self {
            id: model.uuid,
            filename: model.filename,
            content: model.content,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = memory_file::Entity::find()
            .order_by_asc(memory_file::Column::Filename)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_filename<C: ConnectionTrait>(
        db: &C,
        filename: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = memory_file::Entity::find()
            .filter(memory_file::Column::Filename.eq(filename))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn upsert_by_filename<C: ConnectionTrait>(
        db: &C,
        data: &UpsertMemoryFile,
    ) -> Result<Self, DbErr> {
        let existing = memory_file::Entity::find()
            .filter(memory_file::Column::Filename.eq(data.filename.as_str()))
            .one(db)
            .await?;

        let now = Utc::now();
        let model = match existing {
            None => {
                let active = memory_file::ActiveModel {
                    uuid: Set(Uuid::new_v4()),
                    filename: Set(data.filename.clone()),
                    content: Set(data.content.clone()),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                active.insert(db).await?
            }
            Some(record) => {
                let mut active: memory_file::ActiveModel = record.into();
                active.content = Set(data.content.clone());
                active.updated_at = Set(now);
                active.update(db).await?
            }
        };

        let payload = serde_json::to_value(MemoryFileEventPayload {
            file_id: model.uuid,
            filename: model.filename.clone(),
        })
        .map_err(|err| DbErr::Custom(err.to_string()))?;
        EventOutbox::enqueue(
            db,
            EVENT_MEMORY_FILE_UPSERTED,
            "memory_file",
            model.uuid,
            payload,
        )
        .await?;
        Ok(Self::from_model(model))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    #[tokio::test]
    async fn upsert_replaces_content_for_same_filename() {
        let db = setup_db().await;

        let first = MemoryFile::upsert_by_filename(
            &db,
            &UpsertMemoryFile {
                filename: "context.md".to_string(),
                content: "v1".to_string(),
            },
        )
        .await
        .unwrap();

        let second = MemoryFile::upsert_by_filename(
            &db,
            &UpsertMemoryFile {
                filename: "context.md".to_string(),
                content: "v2".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.content, "v2");
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(MemoryFile::find_all(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lookup_by_filename() {
        let db = setup_db().await;
        MemoryFile::upsert_by_filename(
            &db,
            &UpsertMemoryFile {
                filename: "notes.md".to_string(),
                content: "hello".to_string(),
            },
        )
        .await
        .unwrap();

        let found = MemoryFile::find_by_filename(&db, "notes.md")
            .await
            .unwrap()
            .expect("file");
        assert_eq!(found.content, "hello");
        assert!(
            MemoryFile::find_by_filename(&db, "missing.md")
                .await
                .unwrap()
                .is_none()
        );
    }
}
