use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "paused")]
    Paused,
    #[sea_orm(string_value = "archived")]
    Archived,
}

#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    #[sea_orm(string_value = "backlog")]
    Backlog,
    #[sea_orm(string_value = "todo")]
    Todo,
    #[sea_orm(string_value = "in-progress")]
    InProgress,
    #[sea_orm(string_value = "done")]
    Done,
}

#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TaskPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[default]
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DecisionStatus {
    #[default]
    #[sea_orm(string_value = "needs-sean")]
    NeedsSean,
    #[sea_orm(string_value = "needs-agent")]
    NeedsAgent,
    #[sea_orm(string_value = "resolved")]
    Resolved,
    #[sea_orm(string_value = "deferred")]
    Deferred,
}

impl DecisionStatus {
    /// Resolved and deferred decisions accept no further state changes.
    pub fn is_closed(&self) -> bool {
        matches!(self, DecisionStatus::Resolved | DecisionStatus::Deferred)
    }
}

#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AgentRunStatus {
    #[default]
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "done")]
    Done,
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum UsageSource {
    #[sea_orm(string_value = "api")]
    Api,
    #[default]
    #[sea_orm(string_value = "claude-code")]
    ClaudeCode,
}

#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ActivityType {
    #[sea_orm(string_value = "commit")]
    Commit,
    #[sea_orm(string_value = "decision")]
    Decision,
    #[sea_orm(string_value = "task")]
    Task,
    #[sea_orm(string_value = "agent")]
    Agent,
    #[default]
    #[sea_orm(string_value = "note")]
    Note,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab_case_wire_format() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!(
            serde_json::to_string(&DecisionStatus::NeedsSean).unwrap(),
            "\"needs-sean\""
        );
        assert_eq!(
            serde_json::to_string(&UsageSource::ClaudeCode).unwrap(),
            "\"claude-code\""
        );
    }

    #[test]
    fn closed_decision_statuses() {
        assert!(DecisionStatus::Resolved.is_closed());
        assert!(DecisionStatus::Deferred.is_closed());
        assert!(!DecisionStatus::NeedsSean.is_closed());
        assert!(!DecisionStatus::NeedsAgent.is_closed());
    }
}
