use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const EVENT_PROJECT_CREATED: &str = "project.created";
pub const EVENT_PROJECT_UPDATED: &str = "project.updated";

pub const EVENT_TASK_CREATED: &str = "task.created";
pub const EVENT_TASK_UPDATED: &str = "task.updated";
pub const EVENT_TASK_DELETED: &str = "task.deleted";

pub const EVENT_DECISION_CREATED: &str = "decision.created";
pub const EVENT_DECISION_UPDATED: &str = "decision.updated";

pub const EVENT_AGENT_RUN_UPSERTED: &str = "agent_run.upserted";

pub const EVENT_USAGE_UPSERTED: &str = "usage_record.upserted";

pub const EVENT_ACTIVITY_CREATED: &str = "activity.created";

pub const EVENT_MEMORY_FILE_UPSERTED: &str = "memory_file.upserted";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEventPayload {
    pub project_id: Uuid,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEventPayload {
    pub task_id: Uuid,
    pub project_slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEventPayload {
    pub decision_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRunEventPayload {
    pub run_id: Uuid,
    pub agent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEventPayload {
    pub record_id: Uuid,
    pub agent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEventPayload {
    pub activity_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryFileEventPayload {
    pub file_id: Uuid,
    pub filename: String,
}
