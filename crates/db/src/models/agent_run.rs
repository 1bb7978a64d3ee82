use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::AgentRunStatus;
use crate::{
    entities::agent_run,
    events::{AgentRunEventPayload, EVENT_AGENT_RUN_UPSERTED},
    models::event_outbox::EventOutbox,
};

pub const DEFAULT_AGENT_RUN_LIMIT: u64 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AgentRun {
    pub id: Uuid,
    pub agent_id: String,
    pub project_slug: Option<String>,
    pub task_id: Option<Uuid>,
    pub model: Option<String>,
    pub status: AgentRunStatus,
    #[ts(type = "Date")]
    pub started_at: DateTime<Utc>,
    #[ts(type = "Date | null")]
    pub ended_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub deliverables: Option<serde_json::Value>,
    pub error_message: Option<String>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

/// Partial patch keyed by the external `agent_id`. Absent fields keep their
/// stored value on update and their defaults on insert.
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpsertAgentRun {
    pub agent_id: String,
    pub status: AgentRunStatus,
    pub project_slug: Option<String>,
    pub task_id: Option<Uuid>,
    pub model: Option<String>,
    #[ts(type = "Date | null")]
    pub started_at: Option<DateTime<Utc>>,
    #[ts(type = "Date | null")]
    pub ended_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub deliverables: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

impl AgentRun {
    fn from_model(model: agent_run::Model) -> Self {
        Self {
            id: model.uuid,
            agent_id: model.agent_id,
            project_slug: model.project_slug,
            task_id: model.task_id,
            model: model.model,
            status: model.status,
            started_at: model.started_at,
            ended_at: model.ended_at,
            summary: model.summary,
            deliverables: model.deliverables,
            error_message: model.error_message,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(
        db: &C,
        project_slug: Option<&str>,
        limit: Option<u64>,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = agent_run::Entity::find();
        if let Some(slug) = project_slug {
            query = query.filter(agent_run::Column::ProjectSlug.eq(slug));
        }
        let records = query
            .order_by_desc(agent_run::Column::StartedAt)
            .order_by_desc(agent_run::Column::Id)
            .limit(limit.unwrap_or(DEFAULT_AGENT_RUN_LIMIT))
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_running<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = agent_run::Entity::find()
            .filter(agent_run::Column::Status.eq(AgentRunStatus::Running))
            .order_by_desc(agent_run::Column::StartedAt)
            .order_by_desc(agent_run::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_agent_id<C: ConnectionTrait>(
        db: &C,
        agent_id: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = agent_run::Entity::find()
            .filter(agent_run::Column::AgentId.eq(agent_id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn upsert_by_agent_id<C: ConnectionTrait>(
        db: &C,
        data: &UpsertAgentRun,
    ) -> Result<Self, DbErr> {
        let existing = agent_run::Entity::find()
            .filter(agent_run::Column::AgentId.eq(data.agent_id.as_str()))
            .one(db)
            .await?;

        let now = Utc::now();
        let terminal = data.status != AgentRunStatus::Running;

        let model = match existing {
            None => {
                let run_id = Uuid::new_v4();
                let active = agent_run::ActiveModel {
                    uuid: Set(run_id),
                    agent_id: Set(data.agent_id.clone()),
                    project_slug: Set(data.project_slug.clone()),
                    task_id: Set(data.task_id),
                    model: Set(data.model.clone()),
                    status: Set(data.status.clone()),
                    started_at: Set(data.started_at.unwrap_or(now)),
                    ended_at: Set(data.ended_at.or(terminal.then_some(now))),
                    summary: Set(data.summary.clone()),
                    deliverables: Set(data.deliverables.clone()),
                    error_message: Set(data.error_message.clone()),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                active.insert(db).await?
            }
            Some(record) => {
                let mut active: agent_run::ActiveModel = record.into();
                active.status = Set(data.status.clone());
                if let Some(project_slug) = &data.project_slug {
                    active.project_slug = Set(Some(project_slug.clone()));
                }
                if let Some(task_id) = data.task_id {
                    active.task_id = Set(Some(task_id));
                }
                if let Some(model) = &data.model {
                    active.model = Set(Some(model.clone()));
                }
                if let Some(started_at) = data.started_at {
                    active.started_at = Set(started_at);
                }
                if let Some(summary) = &data.summary {
                    active.summary = Set(Some(summary.clone()));
                }
                if let Some(deliverables) = &data.deliverables {
                    active.deliverables = Set(Some(deliverables.clone()));
                }
                if let Some(error_message) = &data.error_message {
                    active.error_message = Set(Some(error_message.clone()));
                }
                // any non-running report closes the run, last write wins
                if terminal {
                    active.ended_at = Set(Some(data.ended_at.unwrap_or(now)));
                } else if let Some(ended_at) = data.ended_at {
                    active.ended_at = Set(Some(ended_at));
                }
                active.updated_at = Set(now);
                active.update(db).await?
            }
        };

        let payload = serde_json::to_value(AgentRunEventPayload {
            run_id: model.uuid,
            agent_id: model.agent_id.clone(),
        })
        .map_err(|err| DbErr::Custom(err.to_string()))?;
        EventOutbox::enqueue(db, EVENT_AGENT_RUN_UPSERTED, "agent_run", model.uuid, payload)
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

    fn report(agent_id: &str, status: AgentRunStatus) -> UpsertAgentRun {
        UpsertAgentRun {
            agent_id: agent_id.to_string(),
            status,
            project_slug: None,
            task_id: None,
            model: None,
            started_at: None,
            ended_at: None,
            summary: None,
            deliverables: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn insert_then_patch_by_agent_id() {
        let db = setup_db().await;

        let mut first = report("agent-1", AgentRunStatus::Running);
        first.model = Some("claude-sonnet-4-5".to_string());
        let run = AgentRun::upsert_by_agent_id(&db, &first).await.unwrap();
        assert!(run.ended_at.is_none());

        let mut second = report("agent-1", AgentRunStatus::Done);
        second.summary = Some("shipped".to_string());
        let run = AgentRun::upsert_by_agent_id(&db, &second).await.unwrap();

        assert_eq!(run.status, AgentRunStatus::Done);
        assert_eq!(run.summary.as_deref(), Some("shipped"));
        // unsupplied fields survive the patch
        assert_eq!(run.model.as_deref(), Some("claude-sonnet-4-5"));
        assert!(run.ended_at.is_some());

        let all = AgentRun::find_all(&db, None, None).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn terminal_initial_report_is_already_ended() {
        let db = setup_db().await;
        let run = AgentRun::upsert_by_agent_id(&db, &report("agent-2", AgentRunStatus::Failed))
            .await
            .unwrap();
        assert!(run.ended_at.is_some());
    }

    #[tokio::test]
    async fn running_filter_and_limit() {
        let db = setup_db().await;
        AgentRun::upsert_by_agent_id(&db, &report("a", AgentRunStatus::Running))
            .await
            .unwrap();
        AgentRun::upsert_by_agent_id(&db, &report("b", AgentRunStatus::Done))
            .await
            .unwrap();
        AgentRun::upsert_by_agent_id(&db, &report("c", AgentRunStatus::Running))
            .await
            .unwrap();

        let running = AgentRun::find_running(&db).await.unwrap();
        assert_eq!(running.len(), 2);

        let limited = AgentRun::find_all(&db, None, Some(2)).await.unwrap();
        assert_eq!(limited.len(), 2);
    }
}
