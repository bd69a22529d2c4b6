//! Warehouse implementation over a sea-orm connection (SQLite or Postgres).

use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Insert, IntoActiveModel,
};
use sea_orm_migration::MigratorTrait;

use super::error::{Result, WarehouseError, is_transient_db_error};
use super::rows::{
    RowResult, commit_row, language_row, pull_request_row, repository_row, review_row,
};
use super::types::{InsertResult, RowError};
use super::{Warehouse, WatermarkStore};
use crate::entity::entity_type::EntityType;
use crate::entity::{
    extraction_metadata, raw_commit, raw_language, raw_pull_request, raw_repository, raw_review,
};
use crate::github::types::{Commit, LanguageBreakdown, PullRequest, Repository, Review};
use crate::migration::Migrator;
use crate::retry::warehouse_backoff;

/// Rows per INSERT statement. Keeps bound parameters well under SQLite's limit.
pub const UPSERT_BATCH_SIZE: usize = 500;

/// Loads rows with `INSERT ... ON CONFLICT DO UPDATE` and keeps watermarks
/// in the `extraction_metadata` table.
#[derive(Debug)]
pub struct SqlWarehouse {
    db: DatabaseConnection,
}

impl SqlWarehouse {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Connect without running migrations; call
    /// [`ensure_infrastructure_exists`](Warehouse::ensure_infrastructure_exists) before loading.
    pub async fn connect(database_url: &str) -> Result<Self> {
        if database_url.trim().is_empty() {
            return Err(WarehouseError::InvalidInput {
                message: "database URL must not be blank".to_string(),
            });
        }
        Ok(Self::new(crate::db::connect(database_url).await?))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Upsert prepared rows, reporting rejected ones by index.
    ///
    /// Valid rows go out in batches. A batch that fails for a non-transient
    /// reason is replayed row by row so each bad row gets its own message.
    /// Transient failures that outlast the retry budget fail the whole call.
    async fn upsert<A>(
        &self,
        table: &'static str,
        prepared: Vec<RowResult<A>>,
        on_conflict: OnConflict,
    ) -> Result<InsertResult>
    where
        A: ActiveModelTrait + Clone + Send + Sync + 'static,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        let mut result = InsertResult {
            total_rows: prepared.len(),
            ..InsertResult::default()
        };

        let mut valid: Vec<(usize, A)> = Vec::with_capacity(prepared.len());
        for (row_index, row) in prepared.into_iter().enumerate() {
            match row {
                Ok(model) => valid.push((row_index, model)),
                Err(message) => result.errors.push(RowError { row_index, message }),
            }
        }

        for chunk in valid.chunks(UPSERT_BATCH_SIZE) {
            let models: Vec<A> = chunk.iter().map(|(_, m)| m.clone()).collect();
            match self.insert_batch(table, models, &on_conflict).await {
                Ok(()) => result.successful_rows += chunk.len(),
                Err(e) if is_transient_db_error(&e) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(
                        table,
                        rows = chunk.len(),
                        error = %e,
                        "Batch upsert rejected, retrying rows individually"
                    );
                    self.insert_rows_individually(chunk, &on_conflict, &mut result)
                        .await?;
                }
            }
        }

        result.errors.sort_by_key(|e| e.row_index);
        tracing::debug!(
            table,
            total = result.total_rows,
            successful = result.successful_rows,
            failed = result.failed_rows(),
            "Upsert complete"
        );
        Ok(result)
    }

    async fn insert_batch<A>(
        &self,
        table: &'static str,
        models: Vec<A>,
        on_conflict: &OnConflict,
    ) -> std::result::Result<(), DbErr>
    where
        A: ActiveModelTrait + Clone + Send + Sync + 'static,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        let db = &self.db;
        let models = &models;

        (|| async move {
            Insert::many(models.clone())
                .on_conflict(on_conflict.clone())
                .exec_without_returning(db)
                .await
                .map(|_| ())
        })
        .retry(warehouse_backoff())
        .when(is_transient_db_error)
        .notify(|err: &DbErr, dur: Duration| {
            tracing::warn!(
                table,
                backoff_ms = dur.as_millis() as u64,
                error = %err,
                "Transient warehouse error, retrying"
            );
        })
        .await
    }

    async fn insert_rows_individually<A>(
        &self,
        chunk: &[(usize, A)],
        on_conflict: &OnConflict,
        result: &mut InsertResult,
    ) -> Result<()>
    where
        A: ActiveModelTrait + Clone + Send + Sync + 'static,
        <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    {
        for (row_index, model) in chunk {
            match Insert::one(model.clone())
                .on_conflict(on_conflict.clone())
                .exec_without_returning(&self.db)
                .await
            {
                Ok(_) => result.successful_rows += 1,
                Err(e) if is_transient_db_error(&e) => return Err(e.into()),
                Err(e) => result.errors.push(RowError {
                    row_index: *row_index,
                    message: e.to_string(),
                }),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Warehouse for SqlWarehouse {
    async fn ensure_infrastructure_exists(&self) -> Result<()> {
        Migrator::up(&self.db, None).await?;
        tracing::info!("Warehouse schema ready");
        Ok(())
    }

    async fn load_repositories(&self, repos: &[Repository]) -> Result<InsertResult> {
        let now = Utc::now();
        let rows = repos.iter().map(|r| repository_row(r, now)).collect();
        let on_conflict = OnConflict::column(raw_repository::Column::Id)
            .update_columns([
                raw_repository::Column::Name,
                raw_repository::Column::FullName,
                raw_repository::Column::OwnerLogin,
                raw_repository::Column::Language,
                raw_repository::Column::Visibility,
                raw_repository::Column::Fork,
                raw_repository::Column::StargazersCount,
                raw_repository::Column::CreatedAt,
                raw_repository::Column::UpdatedAt,
                raw_repository::Column::IngestionTimestamp,
            ])
            .to_owned();
        self.upsert("raw_repositories", rows, on_conflict).await
    }

    async fn load_commits(&self, repo_full_name: &str, commits: &[Commit]) -> Result<InsertResult> {
        let now = Utc::now();
        let rows = commits
            .iter()
            .map(|c| commit_row(repo_full_name, c, now))
            .collect();
        let on_conflict = OnConflict::column(raw_commit::Column::Sha)
            .update_columns([
                raw_commit::Column::RepoFullName,
                raw_commit::Column::AuthorName,
                raw_commit::Column::AuthorEmail,
                raw_commit::Column::AuthorDate,
                raw_commit::Column::AuthorLogin,
                raw_commit::Column::AuthorId,
                raw_commit::Column::Message,
                raw_commit::Column::Additions,
                raw_commit::Column::Deletions,
                raw_commit::Column::TotalChanges,
                raw_commit::Column::IngestionTimestamp,
            ])
            .to_owned();
        self.upsert("raw_commits", rows, on_conflict).await
    }

    async fn load_pull_requests(
        &self,
        repo_full_name: &str,
        pull_requests: &[PullRequest],
    ) -> Result<InsertResult> {
        let now = Utc::now();
        let rows = pull_requests
            .iter()
            .map(|pr| pull_request_row(repo_full_name, pr, now))
            .collect();
        let on_conflict = OnConflict::columns([
            raw_pull_request::Column::RepoFullName,
            raw_pull_request::Column::Number,
        ])
        .update_columns([
            raw_pull_request::Column::Title,
            raw_pull_request::Column::State,
            raw_pull_request::Column::CreatedAt,
            raw_pull_request::Column::UpdatedAt,
            raw_pull_request::Column::MergedAt,
            raw_pull_request::Column::MergeCommitSha,
            raw_pull_request::Column::AuthorLogin,
            raw_pull_request::Column::IngestionTimestamp,
        ])
        .to_owned();
        self.upsert("raw_pull_requests", rows, on_conflict).await
    }

    async fn load_reviews(
        &self,
        repo_full_name: &str,
        pr_number: i64,
        reviews: &[Review],
    ) -> Result<InsertResult> {
        let now = Utc::now();
        let rows = reviews
            .iter()
            .map(|r| review_row(repo_full_name, pr_number, r, now))
            .collect();
        let on_conflict = OnConflict::column(raw_review::Column::Id)
            .update_columns([
                raw_review::Column::RepoFullName,
                raw_review::Column::PrNumber,
                raw_review::Column::State,
                raw_review::Column::SubmittedAt,
                raw_review::Column::Body,
                raw_review::Column::ReviewerLogin,
                raw_review::Column::IngestionTimestamp,
            ])
            .to_owned();
        self.upsert("raw_reviews", rows, on_conflict).await
    }

    async fn load_languages(&self, languages: &LanguageBreakdown) -> Result<InsertResult> {
        let now = Utc::now();
        let rows = languages
            .bytes
            .iter()
            .map(|(name, bytes)| language_row(&languages.repo_full_name, name, *bytes, now))
            .collect();
        let on_conflict = OnConflict::columns([
            raw_language::Column::RepoFullName,
            raw_language::Column::LanguageName,
        ])
        .update_columns([
            raw_language::Column::Bytes,
            raw_language::Column::IngestionTimestamp,
        ])
        .to_owned();
        self.upsert("raw_languages", rows, on_conflict).await
    }
}

#[async_trait]
impl WatermarkStore for SqlWarehouse {
    async fn last_extraction_timestamp(&self, entity: EntityType) -> Option<DateTime<Utc>> {
        match extraction_metadata::Entity::find_by_id(entity.as_str().to_string())
            .one(&self.db)
            .await
        {
            Ok(row) => row.map(|r| r.last_extracted_at),
            Err(e) => {
                tracing::warn!(
                    entity = %entity,
                    error = %e,
                    "Failed to read extraction watermark, treating as absent"
                );
                None
            }
        }
    }

    async fn update_last_extraction_timestamp(
        &self,
        entity: EntityType,
        extracted_at: DateTime<Utc>,
    ) -> Result<()> {
        let model = extraction_metadata::ActiveModel {
            entity_type: Set(entity.as_str().to_string()),
            last_extracted_at: Set(extracted_at),
            updated_at: Set(Utc::now()),
        };

        extraction_metadata::Entity::insert(model)
            .on_conflict(
                OnConflict::column(extraction_metadata::Column::EntityType)
                    .update_columns([
                        extraction_metadata::Column::LastExtractedAt,
                        extraction_metadata::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::types::Account;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, RuntimeErr};

    fn exec_ok(rows: u64) -> MockExecResult {
        MockExecResult {
            rows_affected: rows,
            last_insert_id: 0,
        }
    }

    fn pr(number: i64) -> PullRequest {
        PullRequest {
            number,
            title: Some(format!("PR {number}")),
            state: Some("open".to_string()),
            created_at: None,
            updated_at: None,
            merged_at: None,
            merge_commit_sha: None,
            user: Some(Account {
                login: "octo".to_string(),
                id: None,
            }),
        }
    }

    #[tokio::test]
    async fn watermark_query_failure_reads_as_absent() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([DbErr::Custom("table missing".to_string())])
            .into_connection();
        let warehouse = SqlWarehouse::new(db);

        assert_eq!(
            warehouse
                .last_extraction_timestamp(EntityType::Commits)
                .await,
            None
        );
    }

    #[tokio::test]
    async fn watermark_write_failure_propagates() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_errors([DbErr::Custom("read-only".to_string())])
            .into_connection();
        let warehouse = SqlWarehouse::new(db);

        let err = warehouse
            .update_last_extraction_timestamp(EntityType::Reviews, Utc::now())
            .await
            .expect_err("write failure should surface");
        assert!(matches!(err, WarehouseError::Database(_)));
    }

    #[tokio::test]
    async fn invalid_rows_are_skipped_and_reported() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results([exec_ok(1)])
            .into_connection();
        let warehouse = SqlWarehouse::new(db);

        let result = warehouse
            .load_pull_requests("octo/a", &[pr(0), pr(5)])
            .await
            .expect("call should succeed");

        assert_eq!(result.total_rows, 2);
        assert_eq!(result.successful_rows, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].row_index, 0);
    }

    #[tokio::test]
    async fn rejected_batch_falls_back_to_per_row_errors() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_errors([DbErr::Custom("CHECK constraint failed".to_string())])
            .append_exec_results([exec_ok(1)])
            .append_exec_errors([DbErr::Custom("CHECK constraint failed".to_string())])
            .into_connection();
        let warehouse = SqlWarehouse::new(db);

        let result = warehouse
            .load_pull_requests("octo/a", &[pr(1), pr(2)])
            .await
            .expect("row-level failures must not fail the call");

        assert_eq!(result.total_rows, 2);
        assert_eq!(result.successful_rows, 1);
        assert_eq!(
            result.errors,
            vec![RowError {
                row_index: 1,
                message: "Custom Error: CHECK constraint failed".to_string(),
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_connection_errors_fail_the_call() {
        let errors = (0..=crate::retry::WAREHOUSE_MAX_RETRIES)
            .map(|_| DbErr::Conn(RuntimeErr::Internal("connection refused".to_string())));
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_errors(errors)
            .into_connection();
        let warehouse = SqlWarehouse::new(db);

        let err = warehouse
            .load_pull_requests("octo/a", &[pr(1)])
            .await
            .expect_err("transient errors past the retry budget fail the call");
        assert!(matches!(err, WarehouseError::Database(DbErr::Conn(_))));
    }

    #[tokio::test]
    async fn connect_rejects_blank_url() {
        let err = SqlWarehouse::connect("  ")
            .await
            .expect_err("blank url should fail");
        assert!(matches!(err, WarehouseError::InvalidInput { .. }));
    }
}
