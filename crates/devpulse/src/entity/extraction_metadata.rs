//! ExtractionMetadata entity - one watermark row per entity type.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "extraction_metadata")]
pub struct Model {
    /// Entity type key (e.g. "commits").
    #[sea_orm(primary_key, auto_increment = false)]
    pub entity_type: String,

    /// Instant the last fully successful extraction of this type started.
    pub last_extracted_at: DateTimeUtc,

    /// When this row was last written.
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
