//! Warehouse loading contract.
//!
//! Loads are idempotent upserts keyed on each entity's natural key, so
//! re-extracting the same window never duplicates rows. Every row carries an
//! ingestion timestamp set at load time.

mod error;
mod rows;
mod sql;
mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entity::entity_type::EntityType;
use crate::github::types::{Commit, LanguageBreakdown, PullRequest, Repository, Review};

pub use error::{Result, WarehouseError};
pub use sql::{SqlWarehouse, UPSERT_BATCH_SIZE};
pub use types::{InsertResult, RowError};

/// Destination for extracted records.
///
/// Implementations report rejected rows in the returned [`InsertResult`]
/// and reserve `Err` for failures of the call as a whole.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Create tables and indexes if they do not exist yet. Safe to call repeatedly.
    async fn ensure_infrastructure_exists(&self) -> Result<()>;

    async fn load_repositories(&self, repos: &[Repository]) -> Result<InsertResult>;

    async fn load_commits(&self, repo_full_name: &str, commits: &[Commit]) -> Result<InsertResult>;

    async fn load_pull_requests(
        &self,
        repo_full_name: &str,
        pull_requests: &[PullRequest],
    ) -> Result<InsertResult>;

    async fn load_reviews(
        &self,
        repo_full_name: &str,
        pr_number: i64,
        reviews: &[Review],
    ) -> Result<InsertResult>;

    /// One row per language in the breakdown.
    async fn load_languages(&self, languages: &LanguageBreakdown) -> Result<InsertResult>;
}

/// Per-entity-type high-water marks for incremental extraction.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Last successful extraction instant, or `None` if never recorded.
    ///
    /// Read failures are logged and reported as `None`, which degrades the
    /// next run to a full extraction for that type.
    async fn last_extraction_timestamp(&self, entity: EntityType) -> Option<DateTime<Utc>>;

    /// Insert or replace the watermark for `entity`.
    async fn update_last_extraction_timestamp(
        &self,
        entity: EntityType,
        extracted_at: DateTime<Utc>,
    ) -> Result<()>;
}
