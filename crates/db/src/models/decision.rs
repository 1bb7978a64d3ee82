use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::DecisionStatus;
use crate::{
    entities::decision,
    events::{DecisionEventPayload, EVENT_DECISION_CREATED, EVENT_DECISION_UPDATED},
    models::event_outbox::EventOutbox,
};

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Decision not found")]
    NotFound,
    #[error("A decision needs at least one option")]
    EmptyOptions,
    #[error("Decision is already {0}")]
    AlreadyClosed(DecisionStatus),
    #[error("Resolution must be one of the decision's options")]
    InvalidResolution,
    #[error("Comment must not be empty")]
    EmptyComment,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub id: Uuid,
    pub project_slug: Option<String>,
    pub title: String,
    pub context: String,
    pub options: Vec<String>,
    pub recommendation: Option<String>,
    pub status: DecisionStatus,
    pub resolution: Option<String>,
    pub comment: Option<String>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date | null")]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateDecision {
    pub project_slug: String,
    pub title: String,
    pub context: String,
    pub options: Vec<String>,
    pub recommendation: Option<String>,
    pub status: Option<DecisionStatus>,
}

impl Decision {
    fn from_model(model: decision::Model) -> Self {
        let options = serde_json::from_value(model.options).unwrap_or_default();
        Self {
            id: model.uuid,
            project_slug: model.project_slug,
            title: model.title,
            context: model.context,
            options,
            recommendation: model.recommendation,
            status: model.status,
            resolution: model.resolution,
            comment: model.comment,
            created_at: model.created_at,
            resolved_at: model.resolved_at,
        }
    }

    async fn find_record<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<decision::Model, DecisionError> {
        decision::Entity::find()
            .filter(decision::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(DecisionError::NotFound)
    }

    async fn enqueue_updated<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<(), DbErr> {
        let payload = serde_json::to_value(DecisionEventPayload { decision_id: id })
            .map_err(|err| DbErr::Custom(err.to_string()))?;
        EventOutbox::enqueue(db, EVENT_DECISION_UPDATED, "decision", id, payload).await
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = decision::Entity::find()
            .order_by_desc(decision::Column::CreatedAt)
            .order_by_desc(decision::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_status<C: ConnectionTrait>(
        db: &C,
        status: DecisionStatus,
    ) -> Result<Vec<Self>, DbErr> {
        let records = decision::Entity::find()
            .filter(decision::Column::Status.eq(status))
            .order_by_desc(decision::Column::CreatedAt)
            .order_by_desc(decision::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    /// Decisions still waiting on somebody.
    pub async fn find_pending<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = decision::Entity::find()
            .filter(
                decision::Column::Status
                    .is_in([DecisionStatus::NeedsSean, DecisionStatus::NeedsAgent]),
            )
            .order_by_desc(decision::Column::CreatedAt)
            .order_by_desc(decision::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = decision::Entity::find()
            .filter(decision::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateDecision,
        decision_id: Uuid,
    ) -> Result<Self, DecisionError> {
        let options: Vec<String> = data
            .options
            .iter()
            .map(|opt| opt.trim().to_string())
            .filter(|opt| !opt.is_empty())
            .collect();
        if options.is_empty() {
            return Err(DecisionError::EmptyOptions);
        }

        let active = decision::ActiveModel {
            uuid: Set(decision_id),
            project_slug: Set(Some(data.project_slug.clone())),
            title: Set(data.title.clone()),
            context: Set(data.context.clone()),
            options: Set(serde_json::Value::from(options)),
            recommendation: Set(data.recommendation.clone()),
            status: Set(data.status.clone().unwrap_or_default()),
            resolution: Set(None),
            comment: Set(None),
            created_at: Set(Utc::now()),
            resolved_at: Set(None),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        let payload = serde_json::to_value(DecisionEventPayload { decision_id })
            .map_err(|err| DbErr::Custom(err.to_string()))?;
        EventOutbox::enqueue(db, EVENT_DECISION_CREATED, "decision", decision_id, payload).await?;
        Ok(Self::from_model(model))
    }

    pub async fn resolve<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        resolution: &str,
        comment: Option<&str>,
    ) -> Result<Self, DecisionError> {
        let record = Self::find_record(db, id).await?;
        if record.status.is_closed() {
            return Err(DecisionError::AlreadyClosed(record.status));
        }

        let options: Vec<String> = serde_json::from_value(record.options.clone())
            .unwrap_or_default();
        if !options.iter().any(|opt| opt == resolution) {
            return Err(DecisionError::InvalidResolution);
        }

        let mut active: decision::ActiveModel = record.into();
        active.status = Set(DecisionStatus::Resolved);
        active.resolution = Set(Some(resolution.to_string()));
        if let Some(comment) = comment {
            active.comment = Set(Some(comment.to_string()));
        }
        active.resolved_at = Set(Some(Utc::now()));

        let updated = active.update(db).await?;
        Self::enqueue_updated(db, id).await?;
        Ok(Self::from_model(updated))
    }

    pub async fn defer<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        comment: Option<&str>,
    ) -> Result<Self, DecisionError> {
        let record = Self::find_record(db, id).await?;
        if record.status.is_closed() {
            return Err(DecisionError::AlreadyClosed(record.status));
        }

        let mut active: decision::ActiveModel = record.into();
        active.status = Set(DecisionStatus::Deferred);
        if let Some(comment) = comment {
            active.comment = Set(Some(comment.to_string()));
        }

        let updated = active.update(db).await?;
        Self::enqueue_updated(db, id).await?;
        Ok(Self::from_model(updated))
    }

    /// Annotation only; allowed on closed decisions.
    pub async fn add_comment<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        comment: &str,
    ) -> Result<Self, DecisionError> {
        if comment.trim().is_empty() {
            return Err(DecisionError::EmptyComment);
        }

        let record = Self::find_record(db, id).await?;
        let mut active: decision::ActiveModel = record.into();
        active.comment = Set(Some(comment.to_string()));

        let updated = active.update(db).await?;
        Self::enqueue_updated(db, id).await?;
        Ok(Self::from_model(updated))
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

    fn sample() -> CreateDecision {
        CreateDecision {
            project_slug: "mc".to_string(),
            title: "Database choice".to_string(),
            context: "Need persistence".to_string(),
            options: vec!["sqlite".to_string(), "postgres".to_string()],
            recommendation: Some("sqlite".to_string()),
            status: None,
        }
    }

    #[tokio::test]
    async fn create_defaults_to_needs_sean() {
        let db = setup_db().await;
        let decision = Decision::create(&db, &sample(), Uuid::new_v4()).await.unwrap();
        assert_eq!(decision.status, DecisionStatus::NeedsSean);
        assert!(decision.resolution.is_none());
        assert!(decision.resolved_at.is_none());
    }

    #[tokio::test]
    async fn empty_options_rejected() {
        let db = setup_db().await;
        let mut data = sample();
        data.options = vec![];
        let err = Decision::create(&db, &data, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DecisionError::EmptyOptions));

        // whitespace-only options count as empty
        data.options = vec!["   ".to_string()];
        let err = Decision::create(&db, &data, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DecisionError::EmptyOptions));
    }

    #[tokio::test]
    async fn resolve_requires_a_listed_option() {
        let db = setup_db().await;
        let id = Uuid::new_v4();
        Decision::create(&db, &sample(), id).await.unwrap();

        let err = Decision::resolve(&db, id, "mysql", None).await.unwrap_err();
        assert!(matches!(err, DecisionError::InvalidResolution));

        let resolved = Decision::resolve(&db, id, "sqlite", Some("fits the deployment"))
            .await
            .unwrap();
        assert_eq!(resolved.status, DecisionStatus::Resolved);
        assert_eq!(resolved.resolution.as_deref(), Some("sqlite"));
        assert!(resolved.resolved_at.is_some());
    }

    #[tokio::test]
    async fn closed_decisions_are_terminal() {
        let db = setup_db().await;
        let id = Uuid::new_v4();
        Decision::create(&db, &sample(), id).await.unwrap();
        Decision::resolve(&db, id, "sqlite", None).await.unwrap();

        let err = Decision::defer(&db, id, None).await.unwrap_err();
        assert!(matches!(
            err,
            DecisionError::AlreadyClosed(DecisionStatus::Resolved)
        ));
        let err = Decision::resolve(&db, id, "postgres", None).await.unwrap_err();
        assert!(matches!(err, DecisionError::AlreadyClosed(_)));

        // annotations are still fine
        let annotated = Decision::add_comment(&db, id, "revisit next quarter")
            .await
            .unwrap();
        assert_eq!(annotated.comment.as_deref(), Some("revisit next quarter"));
        assert_eq!(annotated.status, DecisionStatus::Resolved);
    }

    #[tokio::test]
    async fn defer_keeps_resolution_empty() {
        let db = setup_db().await;
        let id = Uuid::new_v4();
        Decision::create(&db, &sample(), id).await.unwrap();

        let deferred = Decision::defer(&db, id, Some("blocked on budget")).await.unwrap();
        assert_eq!(deferred.status, DecisionStatus::Deferred);
        assert!(deferred.resolution.is_none());
        assert!(deferred.resolved_at.is_none());
    }

    #[tokio::test]
    async fn pending_excludes_closed() {
        let db = setup_db().await;
        let open_id = Uuid::new_v4();
        Decision::create(&db, &sample(), open_id).await.unwrap();
        let closed_id = Uuid::new_v4();
        Decision::create(&db, &sample(), closed_id).await.unwrap();
        Decision::defer(&db, closed_id, None).await.unwrap();

        let pending = Decision::find_pending(&db).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, open_id);
    }
}
