use sea_orm::entity::prelude::*;

use crate::types::DecisionStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "decisions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub project_slug: Option<String>,
    pub title: String,
    pub context: String,
    pub options: Json,
    pub recommendation: Option<String>,
    pub status: DecisionStatus,
    pub resolution: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTimeUtc,
    pub resolved_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
