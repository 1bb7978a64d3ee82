use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

pub use crate::types::UsageSource;
use crate::{
    entities::usage_record,
    events::{EVENT_USAGE_UPSERTED, UsageEventPayload},
    models::event_outbox::EventOutbox,
};

pub const DEFAULT_USAGE_LIMIT: u64 = 100;

/// Bucket key for records without a project.
const UNKNOWN_PROJECT: &str = "unknown";

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub id: Uuid,
    pub agent_id: String,
    pub session_id: Option<String>,
    pub model: String,
    pub source: UsageSource,
    pub project_slug: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_write_tokens: i64,
    pub api_calls: i64,
    pub estimated_cost: f64,
    #[ts(type = "Date")]
    pub started_at: DateTime<Utc>,
    #[ts(type = "Date | null")]
    pub ended_at: Option<DateTime<Utc>>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpsertUsageRecord {
    pub agent_id: String,
    pub session_id: Option<String>,
    pub model: String,
    pub source: UsageSource,
    pub project_slug: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_write_tokens: i64,
    pub api_calls: i64,
    pub estimated_cost: f64,
    #[ts(type = "Date | null")]
    pub started_at: Option<DateTime<Utc>>,
    #[ts(type = "Date | null")]
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UsageBucket {
    pub cost: f64,
    pub api_calls: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub total_cost: f64,
    pub total_input_tokens: i64,
    pub total_output_tokens: i64,
    pub total_cache_read_tokens: i64,
    pub total_cache_write_tokens: i64,
    pub total_api_calls: i64,
    pub by_model: BTreeMap<String, UsageBucket>,
    pub by_project: BTreeMap<String, UsageBucket>,
}

impl UsageRecord {
    fn from_model(model: usage_record::Model) -> Self {
        Self {
            id: model.uuid,
            agent_id: model.agent_id,
            session_id: model.session_id,
            model: model.model,
            source: model.source,
            project_slug: model.project_slug,
            input_tokens: model.input_tokens,
            output_tokens: model.output_tokens,
            cache_read_tokens: model.cache_read_tokens,
            cache_write_tokens: model.cache_write_tokens,
            api_calls: model.api_calls,
            estimated_cost: model.estimated_cost,
            started_at: model.started_at,
            ended_at: model.ended_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn find_all<C: ConnectionTrait>(
        db: &C,
        project_slug: Option<&str>,
        model: Option<&str>,
        limit: Option<u64>,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = usage_record::Entity::find();
        if let Some(slug) = project_slug {
            query = query.filter(usage_record::Column::ProjectSlug.eq(slug));
        }
        if let Some(model) = model {
            query = query.filter(usage_record::Column::Model.eq(model));
        }
        let records = query
            .order_by_desc(usage_record::Column::CreatedAt)
            .order_by_desc(usage_record::Column::Id)
            .limit(limit.unwrap_or(DEFAULT_USAGE_LIMIT))
            .all(db)
            .await?;
        Ok(records.into_iter().map(Self::from_model).collect())
    }

    pub async fn find_by_agent_id<C: ConnectionTrait>(
        db: &C,
        agent_id: &str,
    ) -> Result<Option<Self>, DbErr> {
        let record = usage_record::Entity::find()
            .filter(usage_record::Column::AgentId.eq(agent_id))
            .one(db)
            .await?;
        Ok(record.map(Self::from_model))
    }

    /// One ledger row per agent run; a second report for the same `agent_id`
    /// replaces every mutable field and keeps the original `created_at`.
    pub async fn upsert_by_agent_id<C: ConnectionTrait>(
        db: &C,
        data: &UpsertUsageRecord,
    ) -> Result<Self, DbErr> {
        let existing = usage_record::Entity::find()
            .filter(usage_record::Column::AgentId.eq(data.agent_id.as_str()))
            .one(db)
            .await?;

        let now = Utc::now();
        let model = match existing {
            None => {
                let record_id = Uuid::new_v4();
                let active = usage_record::ActiveModel {
                    uuid: Set(record_id),
                    agent_id: Set(data.agent_id.clone()),
                    session_id: Set(data.session_id.clone()),
                    model: Set(data.model.clone()),
                    source: Set(data.source.clone()),
                    project_slug: Set(data.project_slug.clone()),
                    input_tokens: Set(data.input_tokens),
                    output_tokens: Set(data.output_tokens),
                    cache_read_tokens: Set(data.cache_read_tokens),
                    cache_write_tokens: Set(data.cache_write_tokens),
                    api_calls: Set(data.api_calls),
                    estimated_cost: Set(data.estimated_cost),
                    started_at: Set(data.started_at.unwrap_or(now)),
                    ended_at: Set(data.ended_at),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                active.insert(db).await?
            }
            Some(record) => {
                let started_at = data.started_at.unwrap_or(record.started_at);
                let mut active: usage_record::ActiveModel = record.into();
                active.session_id = Set(data.session_id.clone());
                active.model = Set(data.model.clone());
                active.source = Set(data.source.clone());
                active.project_slug = Set(data.project_slug.clone());
                active.input_tokens = Set(data.input_tokens);
                active.output_tokens = Set(data.output_tokens);
                active.cache_read_tokens = Set(data.cache_read_tokens);
                active.cache_write_tokens = Set(data.cache_write_tokens);
                active.api_calls = Set(data.api_calls);
                active.estimated_cost = Set(data.estimated_cost);
                active.started_at = Set(started_at);
                active.ended_at = Set(data.ended_at);
                active.updated_at = Set(now);
                active.update(db).await?
            }
        };

        let payload = serde_json::to_value(UsageEventPayload {
            record_id: model.uuid,
            agent_id: model.agent_id.clone(),
        })
        .map_err(|err| DbErr::Custom(err.to_string()))?;
        EventOutbox::enqueue(db, EVENT_USAGE_UPSERTED, "usage_record", model.uuid, payload)
            .await?;
        Ok(Self::from_model(model))
    }

    /// Grand totals plus per-model and per-project breakdowns over the whole
    /// ledger. Zero rows produce zero totals and empty breakdowns.
    pub async fn stats<C: ConnectionTrait>(db: &C) -> Result<UsageStats, DbErr> {
        let records = usage_record::Entity::find().all(db).await?;

        let mut stats = UsageStats::default();
        for record in records {
            stats.total_cost += record.estimated_cost;
            stats.total_input_tokens += record.input_tokens;
            stats.total_output_tokens += record.output_tokens;
            stats.total_cache_read_tokens += record.cache_read_tokens;
            stats.total_cache_write_tokens += record.cache_write_tokens;
            stats.total_api_calls += record.api_calls;

            let model_bucket = stats.by_model.entry(record.model.clone()).or_default();
            model_bucket.cost += record.estimated_cost;
            model_bucket.api_calls += record.api_calls;

            let project = record
                .project_slug
                .clone()
                .unwrap_or_else(|| UNKNOWN_PROJECT.to_string());
            let project_bucket = stats.by_project.entry(project).or_default();
            project_bucket.cost += record.estimated_cost;
            project_bucket.api_calls += record.api_calls;
        }

        Ok(stats)
    }
}
