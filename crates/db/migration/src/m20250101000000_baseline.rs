use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Projects::Table)
                    .col(pk_id_col(manager, Projects::Id))
                    .col(uuid_col(Projects::Uuid))
                    .col(ColumnDef::new(Projects::Slug).string().not_null())
                    .col(ColumnDef::new(Projects::Name).string().not_null())
                    .col(ColumnDef::new(Projects::Description).text())
                    .col(
                        ColumnDef::new(Projects::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("active")),
                    )
                    .col(ColumnDef::new(Projects::GithubUrl).string())
                    .col(ColumnDef::new(Projects::Color).string())
                    .col(timestamp_col(Projects::CreatedAt))
                    .col(timestamp_col(Projects::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_projects_uuid")
                    .table(Projects::Table)
                    .col(Projects::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_projects_slug")
                    .table(Projects::Table)
                    .col(Projects::Slug)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Tasks::Table)
                    .col(pk_id_col(manager, Tasks::Id))
                    .col(uuid_col(Tasks::Uuid))
                    .col(ColumnDef::new(Tasks::ProjectSlug).string())
                    .col(ColumnDef::new(Tasks::Title).string().not_null())
                    .col(ColumnDef::new(Tasks::Description).text())
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("backlog")),
                    )
                    .col(
                        ColumnDef::new(Tasks::Priority)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("medium")),
                    )
                    .col(ColumnDef::new(Tasks::Assignee).string())
                    .col(ColumnDef::new(Tasks::Labels).json_binary())
                    .col(uuid_nullable_col(Tasks::ParentTaskId))
                    .col(uuid_nullable_col(Tasks::DecisionId))
                    .col(uuid_nullable_col(Tasks::AgentRunId))
                    .col(ColumnDef::new(Tasks::CompletedAt).timestamp())
                    .col(timestamp_col(Tasks::CreatedAt))
                    .col(timestamp_col(Tasks::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_uuid")
                    .table(Tasks::Table)
                    .col(Tasks::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_project_slug")
                    .table(Tasks::Table)
                    .col(Tasks::ProjectSlug)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_status")
                    .table(Tasks::Table)
                    .col(Tasks::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_parent_task_id")
                    .table(Tasks::Table)
                    .col(Tasks::ParentTaskId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Decisions::Table)
                    .col(pk_id_col(manager, Decisions::Id))
                    .col(uuid_col(Decisions::Uuid))
                    .col(ColumnDef::new(Decisions::ProjectSlug).string())
                    .col(ColumnDef::new(Decisions::Title).string().not_null())
                    .col(ColumnDef::new(Decisions::Context).text().not_null())
                    .col(ColumnDef::new(Decisions::Options).json_binary().not_null())
                    .col(ColumnDef::new(Decisions::Recommendation).text())
                    .col(
                        ColumnDef::new(Decisions::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("needs-sean")),
                    )
                    .col(ColumnDef::new(Decisions::Resolution).text())
                    .col(ColumnDef::new(Decisions::Comment).text())
                    .col(timestamp_col(Decisions::CreatedAt))
                    .col(ColumnDef::new(Decisions::ResolvedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_decisions_uuid")
                    .table(Decisions::Table)
                    .col(Decisions::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_decisions_status")
                    .table(Decisions::Table)
                    .col(Decisions::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(AgentRuns::Table)
                    .col(pk_id_col(manager, AgentRuns::Id))
                    .col(uuid_col(AgentRuns::Uuid))
                    .col(ColumnDef::new(AgentRuns::AgentId).string().not_null())
                    .col(ColumnDef::new(AgentRuns::ProjectSlug).string())
                    .col(uuid_nullable_col(AgentRuns::TaskId))
                    .col(ColumnDef::new(AgentRuns::Model).string())
                    .col(
                        ColumnDef::new(AgentRuns::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("running")),
                    )
                    .col(timestamp_col(AgentRuns::StartedAt))
                    .col(ColumnDef::new(AgentRuns::EndedAt).timestamp())
                    .col(ColumnDef::new(AgentRuns::Summary).text())
                    .col(ColumnDef::new(AgentRuns::Deliverables).json_binary())
                    .col(ColumnDef::new(AgentRuns::ErrorMessage).text())
                    .col(timestamp_col(AgentRuns::CreatedAt))
                    .col(timestamp_col(AgentRuns::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_agent_runs_uuid")
                    .table(AgentRuns::Table)
                    .col(AgentRuns::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_agent_runs_agent_id")
                    .table(AgentRuns::Table)
                    .col(AgentRuns::AgentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_agent_runs_status")
                    .table(AgentRuns::Table)
                    .col(AgentRuns::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(UsageRecords::Table)
                    .col(pk_id_col(manager, UsageRecords::Id))
                    .col(uuid_col(UsageRecords::Uuid))
                    .col(ColumnDef::new(UsageRecords::AgentId).string().not_null())
                    .col(ColumnDef::new(UsageRecords::SessionId).string())
                    .col(ColumnDef::new(UsageRecords::Model).string().not_null())
                    .col(
                        ColumnDef::new(UsageRecords::Source)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("claude-code")),
                    )
                    .col(ColumnDef::new(UsageRecords::ProjectSlug).string())
                    .col(
                        ColumnDef::new(UsageRecords::InputTokens)
                            .big_integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::OutputTokens)
                            .big_integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::CacheReadTokens)
                            .big_integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::CacheWriteTokens)
                            .big_integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::ApiCalls)
                            .big_integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(
                        ColumnDef::new(UsageRecords::EstimatedCost)
                            .double()
                            .not_null()
                            .default(Expr::val(0.0)),
                    )
                    .col(timestamp_col(UsageRecords::StartedAt))
                    .col(ColumnDef::new(UsageRecords::EndedAt).timestamp())
                    .col(timestamp_col(UsageRecords::CreatedAt))
                    .col(timestamp_col(UsageRecords::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_usage_records_uuid")
                    .table(UsageRecords::Table)
                    .col(UsageRecords::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_usage_records_agent_id")
                    .table(UsageRecords::Table)
                    .col(UsageRecords::AgentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Activities::Table)
                    .col(pk_id_col(manager, Activities::Id))
                    .col(uuid_col(Activities::Uuid))
                    .col(
                        ColumnDef::new(Activities::ActivityType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Activities::Actor).string().not_null())
                    .col(ColumnDef::new(Activities::Message).text().not_null())
                    .col(ColumnDef::new(Activities::ProjectSlug).string())
                    .col(timestamp_col(Activities::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_activities_uuid")
                    .table(Activities::Table)
                    .col(Activities::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_activities_created_at")
                    .table(Activities::Table)
                    .col(Activities::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(MemoryFiles::Table)
                    .col(pk_id_col(manager, MemoryFiles::Id))
                    .col(uuid_col(MemoryFiles::Uuid))
                    .col(ColumnDef::new(MemoryFiles::Filename).string().not_null())
                    .col(ColumnDef::new(MemoryFiles::Content).text().not_null())
                    .col(timestamp_col(MemoryFiles::CreatedAt))
                    .col(timestamp_col(MemoryFiles::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_memory_files_uuid")
                    .table(MemoryFiles::Table)
                    .col(MemoryFiles::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_memory_files_filename")
                    .table(MemoryFiles::Table)
                    .col(MemoryFiles::Filename)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(EventOutbox::Table)
                    .col(pk_id_col(manager, EventOutbox::Id))
                    .col(uuid_col(EventOutbox::Uuid))
                    .col(ColumnDef::new(EventOutbox::EventType).string().not_null())
                    .col(ColumnDef::new(EventOutbox::EntityType).string().not_null())
                    .col(uuid_col(EventOutbox::EntityUuid))
                    .col(ColumnDef::new(EventOutbox::Payload).json_binary().not_null())
                    .col(timestamp_col(EventOutbox::CreatedAt))
                    .col(ColumnDef::new(EventOutbox::PublishedAt).timestamp())
                    .col(
                        ColumnDef::new(EventOutbox::Attempts)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(ColumnDef::new(EventOutbox::LastError).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_event_outbox_uuid")
                    .table(EventOutbox::Table)
                    .col(EventOutbox::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_event_outbox_published_at")
                    .table(EventOutbox::Table)
                    .col(EventOutbox::PublishedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventOutbox::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MemoryFiles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Activities::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UsageRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(AgentRuns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Decisions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn uuid_nullable_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Projects {
    Table,
    Id,
    Uuid,
    Slug,
    Name,
    Description,
    Status,
    GithubUrl,
    Color,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Tasks {
    Table,
    Id,
    Uuid,
    ProjectSlug,
    Title,
    Description,
    Status,
    Priority,
    Assignee,
    Labels,
    ParentTaskId,
    DecisionId,
    AgentRunId,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Decisions {
    Table,
    Id,
    Uuid,
    ProjectSlug,
    Title,
    Context,
    Options,
    Recommendation,
    Status,
    Resolution,
    Comment,
    CreatedAt,
    ResolvedAt,
}

#[derive(Iden)]
enum AgentRuns {
    Table,
    Id,
    Uuid,
    AgentId,
    ProjectSlug,
    TaskId,
    Model,
    Status,
    StartedAt,
    EndedAt,
    Summary,
    Deliverables,
    ErrorMessage,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum UsageRecords {
    Table,
    Id,
    Uuid,
    AgentId,
    SessionId,
    Model,
    Source,
    ProjectSlug,
    InputTokens,
    OutputTokens,
    CacheReadTokens,
    CacheWriteTokens,
    ApiCalls,
    EstimatedCost,
    StartedAt,
    EndedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Activities {
    Table,
    Id,
    Uuid,
    ActivityType,
    Actor,
    Message,
    ProjectSlug,
    CreatedAt,
}

#[derive(Iden)]
enum MemoryFiles {
    Table,
    Id,
    Uuid,
    Filename,
    Content,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum EventOutbox {
    Table,
    Id,
    Uuid,
    EventType,
    EntityType,
    EntityUuid,
    Payload,
    CreatedAt,
    PublishedAt,
    Attempts,
    LastError,
}
