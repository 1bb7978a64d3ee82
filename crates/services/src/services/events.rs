use std::{sync::Arc, time::Duration};

use db::{
    DBService,
    events::{
        ActivityEventPayload, AgentRunEventPayload, DecisionEventPayload,
        EVENT_ACTIVITY_CREATED, EVENT_AGENT_RUN_UPSERTED, EVENT_DECISION_CREATED,
        EVENT_DECISION_UPDATED, EVENT_MEMORY_FILE_UPSERTED, EVENT_PROJECT_CREATED,
        EVENT_PROJECT_UPDATED, EVENT_TASK_CREATED, EVENT_TASK_DELETED, EVENT_TASK_UPDATED,
        EVENT_USAGE_UPSERTED, MemoryFileEventPayload, ProjectEventPayload, TaskEventPayload,
        UsageEventPayload,
    },
    models::{
        activity::Activity, agent_run::AgentRun, decision::Decision, event_outbox::EventOutbox,
        memory_file::MemoryFile, project::Project, task::Task, usage_record::UsageRecord,
    },
};
use utils::msg_store::MsgStore;
use uuid::Uuid;

#[path = "events/patches.rs"]
pub mod patches;
#[path = "events/types.rs"]
pub mod types;

pub use patches::{
    activity_patch, agent_run_patch, decision_patch, memory_patch, project_patch, task_patch,
    usage_patch,
};
pub use types::EventError;

const OUTBOX_POLL_INTERVAL: Duration = Duration::from_millis(250);
const OUTBOX_BATCH_LIMIT: u64 = 100;

#[derive(Clone)]
pub struct EventService {
    msg_store: Arc<MsgStore>,
    db: DBService,
}

enum PatchKind {
    Add,
    Replace,
}

impl EventService {
    pub fn new(db: DBService, msg_store: Arc<MsgStore>) -> Self {
        let service = Self { msg_store, db };
        service.spawn_outbox_worker();
        service
    }

    fn spawn_outbox_worker(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            service.run_outbox_loop().await;
        });
    }

    async fn run_outbox_loop(&self) {
        loop {
            if let Err(err) = self.flush_pending().await {
                tracing::error!(error = %err, "event outbox flush failed");
            }
            tokio::time::sleep(OUTBOX_POLL_INTERVAL).await;
        }
    }

    async fn flush_pending(&self) -> Result<(), EventError> {
        let entries = EventOutbox::fetch_unpublished(&self.db.pool, OUTBOX_BATCH_LIMIT).await?;
        if entries.is_empty() {
            return Ok(());
        }

        for entry in entries {
            match self.dispatch_entry(&entry).await {
                Ok(()) => {
                    EventOutbox::mark_published(&self.db.pool, entry.id).await?;
                }
                Err(err) => {
                    let err_msg = err.to_string();
                    tracing::warn!(event_id = %entry.uuid, error = %err_msg, "event dispatch failed");
                    EventOutbox::mark_failed(&self.db.pool, entry.id, &err_msg).await?;
                }
            }
        }

        Ok(())
    }

    async fn dispatch_entry(
        &self,
        entry: &db::entities::event_outbox::Model,
    ) -> Result<(), EventError> {
        match entry.event_type.as_str() {
            EVENT_PROJECT_CREATED => {
                let payload: ProjectEventPayload = serde_json::from_value(entry.payload.clone())?;
                self.emit_project_patch(payload.project_id, PatchKind::Add)
                    .await?;
            }
            EVENT_PROJECT_UPDATED => {
                let payload: ProjectEventPayload = serde_json::from_value(entry.payload.clone())?;
                self.emit_project_patch(payload.project_id, PatchKind::Replace)
                    .await?;
            }
            EVENT_TASK_CREATED => {
                let payload: TaskEventPayload = serde_json::from_value(entry.payload.clone())?;
                self.emit_task_patch(payload.task_id, PatchKind::Add).await?;
            }
            EVENT_TASK_UPDATED => {
                let payload: TaskEventPayload = serde_json::from_value(entry.payload.clone())?;
                self.emit_task_patch(payload.task_id, PatchKind::Replace)
                    .await?;
            }
            EVENT_TASK_DELETED => {
                let payload: TaskEventPayload = serde_json::from_value(entry.payload.clone())?;
                self.msg_store.push_patch(task_patch::remove(payload.task_id));
            }
            EVENT_DECISION_CREATED => {
                let payload: DecisionEventPayload = serde_json::from_value(entry.payload.clone())?;
                self.emit_decision_patch(payload.decision_id, PatchKind::Add)
                    .await?;
            }
            EVENT_DECISION_UPDATED => {
                let payload: DecisionEventPayload = serde_json::from_value(entry.payload.clone())?;
                self.emit_decision_patch(payload.decision_id, PatchKind::Replace)
                    .await?;
            }
            EVENT_AGENT_RUN_UPSERTED => {
                let payload: AgentRunEventPayload = serde_json::from_value(entry.payload.clone())?;
                if let Some(run) = AgentRun::find_by_agent_id(&self.db.pool, &payload.agent_id).await? {
                    self.msg_store.push_patch(agent_run_patch::upsert(&run));
                }
            }
            EVENT_USAGE_UPSERTED => {
                let payload: UsageEventPayload = serde_json::from_value(entry.payload.clone())?;
                if let Some(record) =
                    UsageRecord::find_by_agent_id(&self.db.pool, &payload.agent_id).await?
                {
                    self.msg_store.push_patch(usage_patch::upsert(&record));
                }
            }
            EVENT_ACTIVITY_CREATED => {
                let payload: ActivityEventPayload = serde_json::from_value(entry.payload.clone())?;
                if let Some(activity) = Activity::find_by_id(&self.db.pool, payload.activity_id).await?
                {
                    self.msg_store.push_patch(activity_patch::add(&activity));
                }
            }
            EVENT_MEMORY_FILE_UPSERTED => {
                let payload: MemoryFileEventPayload =
                    serde_json::from_value(entry.payload.clone())?;
                if let Some(file) =
                    MemoryFile::find_by_filename(&self.db.pool, &payload.filename).await?
                {
                    self.msg_store.push_patch(memory_patch::upsert(&file));
                }
            }
            _ => {
                tracing::debug!(event_type = entry.event_type.as_str(), "unknown event type");
            }
        }

        Ok(())
    }

    async fn emit_project_patch(&self, project_id: Uuid, kind: PatchKind) -> Result<(), EventError> {
        if let Some(project) = Project::find_by_id(&self.db.pool, project_id).await? {
            let patch = match kind {
                PatchKind::Add => project_patch::add(&project),
                PatchKind::Replace => project_patch::replace(&project),
            };
            self.msg_store.push_patch(patch);
        }
        Ok(())
    }

    async fn emit_task_patch(&self, task_id: Uuid, kind: PatchKind) -> Result<(), EventError> {
        if let Some(task) = Task::find_by_id(&self.db.pool, task_id).await? {
            let patch = match kind {
                PatchKind::Add => task_patch::add(&task),
                PatchKind::Replace => task_patch::replace(&task),
            };
            self.msg_store.push_patch(patch);
        }
        Ok(())
    }

    async fn emit_decision_patch(
        &self,
        decision_id: Uuid,
        kind: PatchKind,
    ) -> Result<(), EventError> {
        if let Some(decision) = Decision::find_by_id(&self.db.pool, decision_id).await? {
            let patch = match kind {
                PatchKind::Add => decision_patch::add(&decision),
                PatchKind::Replace => decision_patch::replace(&decision),
            };
            self.msg_store.push_patch(patch);
        }
        Ok(())
    }

    pub fn msg_store(&self) -> &Arc<MsgStore> {
        &self.msg_store
    }
}

#[cfg(test)]
mod tests {
    use db::models::task::CreateTask;
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;
    use utils::log_msg::LogMsg;

    use super::*;

    async fn setup_db() -> DBService {
        let pool = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&pool, None).await.unwrap();
        DBService { pool }
    }

    #[tokio::test]
    async fn flush_pending_publishes_outbox_and_emits_patches() {
        let db = setup_db().await;

        let task_id = Uuid::new_v4();
        Task::create(
            &db.pool,
            &CreateTask::from_title("mc".to_string(), "Test task".to_string()),
            task_id,
        )
        .await
        .unwrap();

        // a row with an unparsable payload stays queued with an error
        EventOutbox::enqueue(
            &db.pool,
            EVENT_TASK_CREATED,
            "task",
            Uuid::new_v4(),
            serde_json::Value::Null,
        )
        .await
        .unwrap();

        let msg_store = Arc::new(MsgStore::new());
        let service = EventService {
            msg_store: msg_store.clone(),
            db: db.clone(),
        };

        let before_flush = EventOutbox::fetch_unpublished(&service.db.pool, 10)
            .await
            .unwrap();
        assert_eq!(before_flush.len(), 2);

        service.flush_pending().await.unwrap();

        let unpublished_after = EventOutbox::fetch_unpublished(&service.db.pool, 10)
            .await
            .unwrap();
        assert_eq!(unpublished_after.len(), 1);
        assert_eq!(unpublished_after[0].attempts, 1);
        assert!(unpublished_after[0].last_error.is_some());

        let patch_count = msg_store
            .get_history()
            .into_iter()
            .filter(|msg| matches!(msg, LogMsg::JsonPatch(_)))
            .count();
        assert_eq!(patch_count, 1);
    }

    #[tokio::test]
    async fn deleted_tasks_emit_remove_patches() {
        let db = setup_db().await;

        let task_id = Uuid::new_v4();
        Task::create(
            &db.pool,
            &CreateTask::from_title("mc".to_string(), "Doomed".to_string()),
            task_id,
        )
        .await
        .unwrap();
        Task::delete(&db.pool, task_id).await.unwrap();

        let msg_store = Arc::new(MsgStore::new());
        let service = EventService {
            msg_store: msg_store.clone(),
            db: db.clone(),
        };
        service.flush_pending().await.unwrap();

        let history = msg_store.get_history();
        let last = history.last().expect("patch history");
        let value = match last {
            LogMsg::JsonPatch(patch) => serde_json::to_value(patch).unwrap(),
            other => panic!("unexpected message: {other:?}"),
        };
        assert_eq!(value[0]["op"], "remove");
        assert_eq!(value[0]["path"], format!("/tasks/{task_id}"));
    }
}
