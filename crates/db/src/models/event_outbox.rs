use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde_json::Value;
use uuid::Uuid;

use crate::entities::event_outbox;

/// Durable change-event queue. Mutations enqueue a row on the same
/// connection, a background poller publishes rows to subscribers.
pub struct EventOutbox;

impl EventOutbox {
    pub async fn enqueue<C: ConnectionTrait>(
        db: &C,
        event_type: &str,
        entity_type: &str,
        entity_uuid: Uuid,
        payload: Value,
    ) -> Result<(), DbErr> {
        let active = event_outbox::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            event_type: Set(event_type.to_string()),
            entity_type: Set(entity_type.to_string()),
            entity_uuid: Set(entity_uuid),
            payload: Set(payload),
            created_at: Set(Utc::now()),
            published_at: Set(None),
            attempts: Set(0),
            last_error: Set(None),
            ..Default::default()
        };

        active.insert(db).await?;
        Ok(())
    }

    /// Oldest-first batch of rows not yet delivered.
    pub async fn fetch_unpublished<C: ConnectionTrait>(
        db: &C,
        limit: u64,
    ) -> Result<Vec<event_outbox::Model>, DbErr> {
        event_outbox::Entity::find()
            .filter(event_outbox::Column::PublishedAt.is_null())
            .order_by_asc(event_outbox::Column::CreatedAt)
            .limit(limit)
            .all(db)
            .await
    }

    pub async fn mark_published<C: ConnectionTrait>(db: &C, id: i64) -> Result<(), DbErr> {
        let record = event_outbox::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound(
                "Event outbox record not found".to_string(),
            ))?;

        let mut active: event_outbox::ActiveModel = record.into();
        active.published_at = Set(Some(Utc::now()));
        active.update(db).await?;
        Ok(())
    }

    pub async fn mark_failed<C: ConnectionTrait>(db: &C, id: i64, error: &str) -> Result<(), DbErr> {
        let record = event_outbox::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or(DbErr::RecordNotFound(
                "Event outbox record not found".to_string(),
            ))?;

        let attempts = record.attempts + 1;
        let mut active: event_outbox::ActiveModel = record.into();
        active.attempts = Set(attempts);
        active.last_error = Set(Some(error.to_string()));
        active.update(db).await?;
        Ok(())
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
    async fn published_rows_leave_the_queue() {
        let db = setup_db().await;

        let entity_uuid = Uuid::new_v4();
        EventOutbox::enqueue(
            &db,
            "task.created",
            "task",
            entity_uuid,
            serde_json::json!({ "task_id": entity_uuid }),
        )
        .await
        .unwrap();

        let pending = EventOutbox::fetch_unpublished(&db, 10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].entity_uuid, entity_uuid);

        EventOutbox::mark_published(&db, pending[0].id).await.unwrap();
        assert!(
            EventOutbox::fetch_unpublished(&db, 10)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn failures_accumulate_attempts() {
        let db = setup_db().await;

        EventOutbox::enqueue(
            &db,
            "activity.created",
            "activity",
            Uuid::new_v4(),
            serde_json::json!({}),
        )
        .await
        .unwrap();

        let pending = EventOutbox::fetch_unpublished(&db, 10).await.unwrap();
        let id = pending[0].id;

        EventOutbox::mark_failed(&db, id, "subscriber gone").await.unwrap();
        EventOutbox::mark_failed(&db, id, "still gone").await.unwrap();

        let pending = EventOutbox::fetch_unpublished(&db, 10).await.unwrap();
        assert_eq!(pending[0].attempts, 2);
        assert_eq!(pending[0].last_error.as_deref(), Some("still gone"));
    }
}
