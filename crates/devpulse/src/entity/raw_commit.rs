//! Commits authored by the tracked account, keyed by SHA.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "raw_commits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub sha: String,
    pub repo_full_name: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    /// ISO-8601 authored date as returned by the API.
    pub author_date: Option<String>,
    pub author_login: Option<String>,
    pub author_id: Option<i64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub message: Option<String>,
    pub additions: Option<i64>,
    pub deletions: Option<i64>,
    pub total_changes: Option<i64>,
    pub ingestion_timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
