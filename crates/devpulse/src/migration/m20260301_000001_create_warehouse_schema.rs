//! Raw landing tables and the extraction watermark table.
//!
//! Every raw table carries `ingestion_timestamp` and is indexed on it; the
//! remaining indexes cover the columns downstream transforms filter by.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        self.create_raw_commits(manager).await?;
        self.create_raw_pull_requests(manager).await?;
        self.create_raw_reviews(manager).await?;
        self.create_raw_repositories(manager).await?;
        self.create_raw_languages(manager).await?;
        self.create_extraction_metadata(manager).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExtractionMetadata::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RawLanguages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RawRepositories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RawReviews::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RawPullRequests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RawCommits::Table).to_owned())
            .await?;
        Ok(())
    }
}

impl Migration {
    async fn create_raw_commits(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RawCommits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RawCommits::Sha)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RawCommits::RepoFullName).string().not_null())
                    .col(ColumnDef::new(RawCommits::AuthorName).string().null())
                    .col(ColumnDef::new(RawCommits::AuthorEmail).string().null())
                    .col(ColumnDef::new(RawCommits::AuthorDate).string().null())
                    .col(ColumnDef::new(RawCommits::AuthorLogin).string().null())
                    .col(ColumnDef::new(RawCommits::AuthorId).big_integer().null())
                    .col(ColumnDef::new(RawCommits::Message).text().null())
                    .col(ColumnDef::new(RawCommits::Additions).big_integer().null())
                    .col(ColumnDef::new(RawCommits::Deletions).big_integer().null())
                    .col(ColumnDef::new(RawCommits::TotalChanges).big_integer().null())
                    .col(
                        ColumnDef::new(RawCommits::IngestionTimestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_raw_commits_repo")
                    .table(RawCommits::Table)
                    .col(RawCommits::RepoFullName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_raw_commits_ingestion")
                    .table(RawCommits::Table)
                    .col(RawCommits::IngestionTimestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_raw_pull_requests(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RawPullRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RawPullRequests::RepoFullName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RawPullRequests::Number)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RawPullRequests::Title).text().null())
                    .col(ColumnDef::new(RawPullRequests::State).string().null())
                    .col(ColumnDef::new(RawPullRequests::CreatedAt).string().null())
                    .col(ColumnDef::new(RawPullRequests::UpdatedAt).string().null())
                    .col(ColumnDef::new(RawPullRequests::MergedAt).string().null())
                    .col(
                        ColumnDef::new(RawPullRequests::MergeCommitSha)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(RawPullRequests::AuthorLogin).string().null())
                    .col(
                        ColumnDef::new(RawPullRequests::IngestionTimestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(RawPullRequests::RepoFullName)
                            .col(RawPullRequests::Number),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_raw_pull_requests_repo_state")
                    .table(RawPullRequests::Table)
                    .col(RawPullRequests::RepoFullName)
                    .col(RawPullRequests::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_raw_pull_requests_ingestion")
                    .table(RawPullRequests::Table)
                    .col(RawPullRequests::IngestionTimestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_raw_reviews(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RawReviews::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RawReviews::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RawReviews::RepoFullName).string().not_null())
                    .col(ColumnDef::new(RawReviews::PrNumber).big_integer().not_null())
                    .col(ColumnDef::new(RawReviews::State).string().null())
                    .col(ColumnDef::new(RawReviews::SubmittedAt).string().null())
                    .col(ColumnDef::new(RawReviews::Body).text().null())
                    .col(ColumnDef::new(RawReviews::ReviewerLogin).string().null())
                    .col(
                        ColumnDef::new(RawReviews::IngestionTimestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_raw_reviews_repo")
                    .table(RawReviews::Table)
                    .col(RawReviews::RepoFullName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_raw_reviews_ingestion")
                    .table(RawReviews::Table)
                    .col(RawReviews::IngestionTimestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_raw_repositories(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RawRepositories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RawRepositories::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RawRepositories::Name).string().not_null())
                    .col(
                        ColumnDef::new(RawRepositories::FullName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RawRepositories::OwnerLogin).string().null())
                    .col(ColumnDef::new(RawRepositories::Language).string().null())
                    .col(ColumnDef::new(RawRepositories::Visibility).string().null())
                    .col(
                        ColumnDef::new(RawRepositories::Fork)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(RawRepositories::StargazersCount)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(RawRepositories::CreatedAt).string().null())
                    .col(ColumnDef::new(RawRepositories::UpdatedAt).string().null())
                    .col(
                        ColumnDef::new(RawRepositories::IngestionTimestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_raw_repositories_language")
                    .table(RawRepositories::Table)
                    .col(RawRepositories::Language)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_raw_repositories_ingestion")
                    .table(RawRepositories::Table)
                    .col(RawRepositories::IngestionTimestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_raw_languages(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(RawLanguages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RawLanguages::RepoFullName)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RawLanguages::LanguageName)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RawLanguages::Bytes).big_integer().not_null())
                    .col(
                        ColumnDef::new(RawLanguages::IngestionTimestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(RawLanguages::RepoFullName)
                            .col(RawLanguages::LanguageName),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_raw_languages_ingestion")
                    .table(RawLanguages::Table)
                    .col(RawLanguages::IngestionTimestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn create_extraction_metadata(&self, manager: &SchemaManager<'_>) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExtractionMetadata::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ExtractionMetadata::EntityType)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExtractionMetadata::LastExtractedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ExtractionMetadata::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum RawCommits {
    Table,
    Sha,
    RepoFullName,
    AuthorName,
    AuthorEmail,
    AuthorDate,
    AuthorLogin,
    AuthorId,
    Message,
    Additions,
    Deletions,
    TotalChanges,
    IngestionTimestamp,
}

#[derive(DeriveIden)]
enum RawPullRequests {
    Table,
    RepoFullName,
    Number,
    Title,
    State,
    CreatedAt,
    UpdatedAt,
    MergedAt,
    MergeCommitSha,
    AuthorLogin,
    IngestionTimestamp,
}

#[derive(DeriveIden)]
enum RawReviews {
    Table,
    Id,
    RepoFullName,
    PrNumber,
    State,
    SubmittedAt,
    Body,
    ReviewerLogin,
    IngestionTimestamp,
}

#[derive(DeriveIden)]
enum RawRepositories {
    Table,
    Id,
    Name,
    FullName,
    OwnerLogin,
    Language,
    Visibility,
    Fork,
    StargazersCount,
    CreatedAt,
    UpdatedAt,
    IngestionTimestamp,
}

#[derive(DeriveIden)]
enum RawLanguages {
    Table,
    RepoFullName,
    LanguageName,
    Bytes,
    IngestionTimestamp,
}

#[derive(DeriveIden)]
enum ExtractionMetadata {
    Table,
    EntityType,
    LastExtractedAt,
    UpdatedAt,
}
