//! Language byte counts, one row per language per repository.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "raw_languages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub repo_full_name: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub language_name: String,
    pub bytes: i64,
    pub ingestion_timestamp: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
