use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::project,
    events::{EVENT_PROJECT_CREATED, EVENT_PROJECT_UPDATED, ProjectEventPayload},
    models::event_outbox::EventOutbox,
    types::ProjectStatus,
};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Project not found")]
    NotFound,
    #[error("Project slug already in use: {0}")]
    SlugTaken(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub github_url: Option<String>,
    pub color: Option<String>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub github_url: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub github_url: Option<String>,
    pub color: Option<String>,
}

impl Project {
    fn from_model(model: project::Model) -> Self {
        Self {
            id: model.uuid,
            slug: model.slug,
            name: model.name,
            description: model.description,
            status: model.status,
            github_url: model.github_url,
            color: model.color,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(db: &C) -> Result<Vec<Self>, DbErr> {
        let records = project::Entity::find()
            .order_by_desc(project::Column::CreatedAt)
            .order_by_desc(project::Column::Id)
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_slug<C: ConnectionTrait>(
        db: &C,
        slug: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Slug.eq(slug))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn find_by_id<C: ConnectionTrait>(db: &C, id: Uuid) -> Result<Option<Self>, DbErr> {
        let record = project::Entity::find()
            .filter(project::Column::Uuid.eq(id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateProject,
        project_id: Uuid,
    ) -> Result<Self, ProjectError> {
        if Self::find_by_slug(db, &data.slug).await?.is_some() {
            return Err(ProjectError::SlugTaken(data.slug.clone()));
        }

        let now = Utc::now();
        let active = project::ActiveModel {
            uuid: Set(project_id),
            slug: Set(data.slug.clone()),
            name: Set(data.name.clone()),
            description: Set(data.description.clone()),
            status: Set(data.status.clone().unwrap_or_default()),
            github_url: Set(data.github_url.clone()),
            color: Set(data.color.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(db).await?;
        let payload = serde_json::to_value(ProjectEventPayload {
            project_id,
            slug: model.slug.clone(),
        })
        .map_err(|err| DbErr::Custom(err.to_string()))?;
        EventOutbox::enqueue(db, EVENT_PROJECT_CREATED, "project", project_id, payload).await?;
        Ok(Self::from_model(model))
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        slug: &str,
        data: &UpdateProject,
    ) -> Result<Self, ProjectError> {
        let record = project::Entity::find()
            .filter(project::Column::Slug.eq(slug))
            .one(db)
            .await?
            .ok_or(ProjectError::NotFound)?;

        let project_id = record.uuid;
        let mut active: project::ActiveModel = record.into();
        if let Some(name) = &data.name {
            active.name = Set(name.clone());
        }
        if let Some(description) = &data.description {
            active.description = Set(Some(description.clone()));
        }
        if let Some(status) = &data.status {
            active.status = Set(status.clone());
        }
        if let Some(github_url) = &data.github_url {
            active.github_url = Set(Some(github_url.clone()));
        }
        if let Some(color) = &data.color {
            active.color = Set(Some(color.clone()));
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await?;
        let payload = serde_json::to_value(ProjectEventPayload {
            project_id,
            slug: updated.slug.clone(),
        })
        .map_err(|err| DbErr::Custom(err.to_string()))?;
        EventOutbox::enqueue(db, EVENT_PROJECT_UPDATED, "project", project_id, payload).await?;
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

    fn sample(slug: &str) -> CreateProject {
        CreateProject {
            slug: slug.to_string(),
            name: format!("Project {slug}"),
            description: None,
            status: None,
            github_url: None,
            color: None,
        }
    }

    #[tokio::test]
    async fn create_and_find_by_slug() {
        let db = setup_db().await;
        let id = Uuid::new_v4();
        let created = Project::create(&db, &sample("mission-control"), id)
            .await
            .unwrap();
        assert_eq!(created.id, id);
        assert_eq!(created.status, ProjectStatus::Active);

        let found = Project::find_by_slug(&db, "mission-control")
            .await
            .unwrap()
            .expect("project");
        assert_eq!(found.id, id);
        assert!(Project::find_by_slug(&db, "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_slug_rejected() {
        let db = setup_db().await;
        Project::create(&db, &sample("mc"), Uuid::new_v4())
            .await
            .unwrap();
        let err = Project::create(&db, &sample("mc"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::SlugTaken(_)));
    }

    #[tokio::test]
    async fn partial_update_keeps_unset_fields() {
        let db = setup_db().await;
        Project::create(&db, &sample("mc"), Uuid::new_v4())
            .await
            .unwrap();

        let updated = Project::update(
            &db,
            "mc",
            &UpdateProject {
                name: None,
                description: Some("ops dashboard".to_string()),
                status: Some(ProjectStatus::Paused),
                github_url: None,
                color: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.name, "Project mc");
        assert_eq!(updated.description.as_deref(), Some("ops dashboard"));
        assert_eq!(updated.status, ProjectStatus::Paused);
    }
}
