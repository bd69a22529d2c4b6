//! Repository snapshots, one row per GitHub repository id.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "raw_repositories")]
pub struct Model {
    /// GitHub repository id.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub owner_login: Option<String>,
    pub language: Option<String>,
    pub visibility: Option<String>,
    pub fork: bool,
    pub stargazers_count: Option<i64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub ingestion_timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
