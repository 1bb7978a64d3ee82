use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::{TaskPriority, TaskStatus};
use crate::{
    entities::task,
    events::{EVENT_TASK_CREATED, EVENT_TASK_DELETED, EVENT_TASK_UPDATED, TaskEventPayload},
    models::event_outbox::EventOutbox,
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Task not found")]
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub project_slug: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub assignee: Option<String>,
    pub labels: Option<Vec<String>>,
    pub parent_task_id: Option<Uuid>,
    pub decision_id: Option<Uuid>,
    pub agent_run_id: Option<Uuid>,
    #[ts(type = "Date | null")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub project_slug: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee: Option<String>,
    pub labels: Option<Vec<String>>,
    pub parent_task_id: Option<Uuid>,
    pub decision_id: Option<Uuid>,
    pub agent_run_id: Option<Uuid>,
}

impl CreateTask {
    pub fn from_title(project_slug: String, title: String) -> Self {
        Self {
            project_slug,
            title,
            description: None,
            status: None,
            priority: None,
            assignee: None,
            labels: None,
            parent_task_id: None,
            decision_id: None,
            agent_run_id: None,
        }
    }
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee: Option<String>,
    pub labels: Option<Vec<String>>,
    pub project_slug: Option<String>,
}

fn labels_to_json(labels: &Option<Vec<String>>) -> Option<serde_json::Value> {
    labels
        .as_ref()
        .map(|labels| serde_json::Value::from(labels.clone()))
}

fn labels_from_json(value: Option<serde_json::Value>) -> Option<Vec<String>> {
    value.and_then(|value| serde_json::from_value(value).ok())
}

impl Task {
    fn from_model(model: task::Model) -> Self {
        Self {
            id: model.uuid,
            project_slug: model.project_slug,
            title: model.title,
            description: model.description,
            status: model.status,
            priority: model.priority,
            assignee: model.assignee,
            labels: labels_from_json(model.labels),
            parent_task_id: model.parent_task_id,
            decision_id: model.decision_id,
            agent_run_id: model.agent_run_id,
            completed_at: model.completed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(
        db: &C,
        project_slug: Option<&str>,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = task::Entity::find();
        if let Some(slug) = project_slug {
            query = query.filter(task::Column::ProjectSlug.eq(slug));
        }
        let records = query
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_status<C: ConnectionTrait>(
        db: &C,
        status: TaskStatus,
    ) -> Result<Vec<Self>, DbErr> {
        let records = task::Entity::find()
            .filter(task::Column::Status.eq(status))
            .order_by_desc(task::Column::CreatedAt)
            .order_by_desc(task::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_subtasks<C: ConnectionTrait>(
        db: &C,
        parent_task_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let records = task::Entity::find()
            .filter(task::Column::ParentTaskId.eq(parent_task_id))
            .order_by_asc(task::Column::CreatedAt)
            .order_by_asc(task::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    /// Per-status task counts, optionally scoped to one project.
    pub async fn status_counts<C: ConnectionTrait>(
        db: &C,
        project_slug: Option<&str>,
    ) -> Result<BTreeMap<String, u64>, DbErr> {
        let mut counts = BTreeMap::new();
        for status in [
            TaskStatus::Backlog,
            TaskStatus::Todo,
            TaskStatus::InProgress,
            TaskStatus::Done,
        ] {
            let mut query = task::Entity::find().filter(task::Column::Status.eq(status.clone()));
            if let Some(slug) = project_slug {
                query = query.filter(task::Column::ProjectSlug.eq(slug));
            }
            counts.insert(status.to_string(), query.count(db).await?);
        }
        Ok(counts)
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTask,
        task_id: Uuid,
    ) -> Result<Self, DbErr> {
        let status = data.status.clone().unwrap_or_default();
        let completed_at = (status == TaskStatus::Done).then(Utc::now);

        let now = Utc::now();
        let active = task::ActiveModel {
            uuid: Set(task_id),
            project_slug: Set(Some(data.project_slug.clone())),
            title: Set(data.title.clone()),
            description: Set(data.description.clone()),
            status: Set(status),
            priority: Set(data.priority.clone().unwrap_or_default()),
            assignee: Set(data.assignee.clone()),
            labels: Set(labels_to_json(&data.labels)),
            parent_task_id: Set(data.parent_task_id),
            decision_id: Set(data.decision_id),
            agent_run_id: Set(data.agent_run_id),
            completed_at: Set(completed_at),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        let payload = serde_json::to_value(TaskEventPayload {
            task_id,
            project_slug: model.project_slug.clone(),
        })
        .map_err(|err| DbErr::Custom(err.to_string()))?;
        EventOutbox::enqueue(db, EVENT_TASK_CREATED, "task", task_id, payload).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
        data: &UpdateTask,
    ) -> Result<Self, TaskError> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?
            .ok_or(TaskError::NotFound)?;

        let previous_status = record.status.clone();
        let mut active: task::ActiveModel = record.into();

        if let Some(title) = &data.title {
            active.title = Set(title.clone());
        }
        if let Some(description) = &data.description {
            active.description = Set(Some(description.clone()));
        }
        if let Some(priority) = &data.priority {
            active.priority = Set(priority.clone());
        }
        if let Some(assignee) = &data.assignee {
            active.assignee = Set(Some(assignee.clone()));
        }
        if data.labels.is_some() {
            active.labels = Set(labels_to_json(&data.labels));
        }
        if let Some(project_slug) = &data.project_slug {
            active.project_slug = Set(Some(project_slug.clone()));
        }
        if let Some(status) = &data.status {
            active.status = Set(status.clone());
            // completed_at tracks membership in done, not the update itself
            if *status == TaskStatus::Done && previous_status != TaskStatus::Done {
                active.completed_at = Set(Some(Utc::now()));
            } else if *status != TaskStatus::Done && previous_status == TaskStatus::Done {
                active.completed_at = Set(None);
            }
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        let payload = serde_json::to_value(TaskEventPayload {
            task_id: id,
            project_slug: updated.project_slug.clone(),
        })
        .map_err(|err| DbErr::Custom(err.to_string()))?;
        EventOutbox::enqueue(db, EVENT_TASK_UPDATED, "task", id, payload).await?;
        Ok(Self::from_model(updated))
    }

    /// Hard delete. Subtasks keep their dangling parent reference.
    pub async fn delete<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<u64, DbErr> {
        let record = task::Entity::find()
            .filter(task::Column::Uuid.eq(id))
            .one(db)
            .await?;

        let Some(record) = record else {
            return Ok(0);
        };
        let project_slug = record.project_slug.clone();

        let result = task::Entity::delete_many()
            .filter(task::Column::Uuid.eq(id))
            .exec(db)
            .await?;

        if result.rows_affected > 0 {
            let payload = serde_json::to_value(TaskEventPayload {
                task_id: id,
                project_slug,
            })
            .map_err(|err| DbErr::Custom(err.to_string()))?;
            EventOutbox::enqueue(db, EVENT_TASK_DELETED, "task", id, payload).await?;
        }

        Ok(result.rows_affected)
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

    fn no_update() -> UpdateTask {
        UpdateTask {
            title: None,
            description: None,
            status: None,
            priority: None,
            assignee: None,
            labels: None,
            project_slug: None,
        }
    }

    #[tokio::test]
    async fn entering_done_stamps_completed_at() {
        let db = setup_db().await;
        let id = Uuid::new_v4();
        let task = Task::create(
            &db,
            &CreateTask::from_title("mc".to_string(), "Ship it".to_string()),
            id,
        )
        .await
        .unwrap();
        assert_eq!(task.status, TaskStatus::Backlog);
        assert!(task.completed_at.is_none());

        let done = Task::update(
            &db,
            id,
            &UpdateTask {
                status: Some(TaskStatus::Done),
                ..no_update()
            },
        )
        .await
        .unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        assert!(done.completed_at.is_some());

        let reopened = Task::update(
            &db,
            id,
            &UpdateTask {
                status: Some(TaskStatus::InProgress),
                ..no_update()
            },
        )
        .await
        .unwrap();
        assert_eq!(reopened.status, TaskStatus::InProgress);
        assert!(reopened.completed_at.is_none());
    }

    #[tokio::test]
    async fn created_done_is_already_completed() {
        let db = setup_db().await;
        let mut data = CreateTask::from_title("mc".to_string(), "Prefinished".to_string());
        data.status = Some(TaskStatus::Done);
        let task = Task::create(&db, &data, Uuid::new_v4()).await.unwrap();
        assert!(task.completed_at.is_some());
    }

    #[tokio::test]
    async fn non_status_update_keeps_completed_at() {
        let db = setup_db().await;
        let id = Uuid::new_v4();
        let mut data = CreateTask::from_title("mc".to_string(), "Done already".to_string());
        data.status = Some(TaskStatus::Done);
        Task::create(&db, &data, id).await.unwrap();

        let renamed = Task::update(
            &db,
            id,
            &UpdateTask {
                title: Some("Done and renamed".to_string()),
                ..no_update()
            },
        )
        .await
        .unwrap();
        assert!(renamed.completed_at.is_some());
    }

    #[tokio::test]
    async fn project_filter_and_subtasks() {
        let db = setup_db().await;
        let parent_id = Uuid::new_v4();
        Task::create(
            &db,
            &CreateTask::from_title("mc".to_string(), "Parent".to_string()),
            parent_id,
        )
        .await
        .unwrap();

        let mut child = CreateTask::from_title("mc".to_string(), "Child".to_string());
        child.parent_task_id = Some(parent_id);
        Task::create(&db, &child, Uuid::new_v4()).await.unwrap();

        Task::create(
            &db,
            &CreateTask::from_title("other".to_string(), "Elsewhere".to_string()),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let mc_tasks = Task::find_all(&db, Some("mc")).await.unwrap();
        assert_eq!(mc_tasks.len(), 2);

        let subtasks = Task::find_subtasks(&db, parent_id).await.unwrap();
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].title, "Child");
    }

    #[tokio::test]
    async fn delete_leaves_subtasks_orphaned() {
        let db = setup_db().await;
        let parent_id = Uuid::new_v4();
        Task::create(
            &db,
            &CreateTask::from_title("mc".to_string(), "Parent".to_string()),
            parent_id,
        )
        .await
        .unwrap();
        let mut child = CreateTask::from_title("mc".to_string(), "Child".to_string());
        child.parent_task_id = Some(parent_id);
        let child_id = Uuid::new_v4();
        Task::create(&db, &child, child_id).await.unwrap();

        assert_eq!(Task::delete(&db, parent_id).await.unwrap(), 1);
        assert_eq!(Task::delete(&db, parent_id).await.unwrap(), 0);

        let orphan = Task::find_by_id(&db, child_id).await.unwrap().unwrap();
        assert_eq!(orphan.parent_task_id, Some(parent_id));
    }

    #[tokio::test]
    async fn status_counts_by_project() {
        let db = setup_db().await;
        let mut done = CreateTask::from_title("mc".to_string(), "A".to_string());
        done.status = Some(TaskStatus::Done);
        Task::create(&db, &done, Uuid::new_v4()).await.unwrap();
        Task::create(
            &db,
            &CreateTask::from_title("mc".to_string(), "B".to_string()),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let counts = Task::status_counts(&db, Some("mc")).await.unwrap();
        assert_eq!(counts.get("done"), Some(&1));
        assert_eq!(counts.get("backlog"), Some(&1));
        assert_eq!(counts.get("todo"), Some(&0));
    }

    #[tokio::test]
    async fn new_tasks_start_in_backlog() {
        let db = setup_db().await;
        let task = Task::create(
            &db,
            &CreateTask::from_title("mc".to_string(), "Unscheduled".to_string()),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        assert_eq!(task.status, TaskStatus::Backlog);
        assert_eq!(task.project_slug.as_deref(), Some("mc"));
    }
}
