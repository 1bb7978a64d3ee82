use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::ActivityType;
use crate::{
    entities::activity,
    events::{ActivityEventPayload, EVENT_ACTIVITY_CREATED},
    models::event_outbox::EventOutbox,
};

pub const DEFAULT_ACTIVITY_LIMIT: u64 = 50;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub actor: String,
    pub message: String,
    pub project_slug: Option<String>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub actor: String,
    pub message: String,
    pub project_slug: Option<String>,
}

impl Activity {
    fn from_model(model: activity::Model) -> Self {
        Self {
            id: model.uuid,
            activity_type: model.activity_type,
            actor: model.actor,
            message: model.message,
            project_slug: model.project_slug,
            created_at: model.created_at,
        }
    }

    /// Append-only log, newest first.
    pub async fn find_recent<C: ConnectionTrait>(
        db: &C,
        project_slug: Option<&str>,
        limit: Option<u64>,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = activity::Entity::find();
        if let Some(slug) = project_slug {
            query = query.filter(activity::Column::ProjectSlug.eq(slug));
        }
        let records = query
            .order_by_desc(activity::Column::CreatedAt)
            .order_by_desc(activity::Column::Id)
            .limit(limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT))
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = activity::Entity::find()
            .filter(activity::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateActivity,
        activity_id: Uuid,
    ) -> Result<Self, DbErr> {
        let active = activity::ActiveModel {
            uuid: Set(activity_id),
            activity_type: Set(data.activity_type.clone()),
            actor: Set(data.actor.clone()),
            message: Set(data.message.clone()),
            project_slug: Set(data.project_slug.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        let payload = serde_json::to_value(ActivityEventPayload { activity_id })
            .map_err(|err| DbErr::Custom(err.to_string()))?;
        EventOutbox::enqueue(db, EVENT_ACTIVITY_CREATED, "activity", activity_id, payload).await?;
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

    fn entry(message: &str) -> CreateActivity {
        CreateActivity {
            activity_type: ActivityType::Note,
            actor: "sean".to_string(),
            message: message.to_string(),
            project_slug: None,
        }
    }

    #[tokio::test]
    async fn limit_returns_newest_first() {
        let db = setup_db().await;
        for i in 0..5 {
            Activity::create(&db, &entry(&format!("event {i}")), Uuid::new_v4())
                .await
                .unwrap();
        }

        let recent = Activity::find_recent(&db, None, Some(2)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "event 4");
        assert_eq!(recent[1].message, "event 3");
    }

    #[tokio::test]
    async fn project_filter() {
        let db = setup_db().await;
        let mut scoped = entry("scoped");
        scoped.project_slug = Some("mc".to_string());
        Activity::create(&db, &scoped, Uuid::new_v4()).await.unwrap();
        Activity::create(&db, &entry("global"), Uuid::new_v4())
            .await
            .unwrap();

        let mc = Activity::find_recent(&db, Some("mc"), None).await.unwrap();
        assert_eq!(mc.len(), 1);
        assert_eq!(mc[0].message, "scoped");
    }
}
