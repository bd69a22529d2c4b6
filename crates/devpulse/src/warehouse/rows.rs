//! Conversion from API payloads to warehouse rows.
//!
//! Each converter either produces an active model stamped with the ingestion
//! time or explains why the row cannot be stored.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;

use crate::entity::{raw_commit, raw_language, raw_pull_request, raw_repository, raw_review};
use crate::github::types::{Commit, PullRequest, Repository, Review};

pub(crate) type RowResult<T> = std::result::Result<T, String>;

fn require_non_blank(value: &str, field: &str) -> RowResult<()> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be blank"))
    } else {
        Ok(())
    }
}

pub(crate) fn repository_row(
    repo: &Repository,
    ingested_at: DateTime<Utc>,
) -> RowResult<raw_repository::ActiveModel> {
    require_non_blank(&repo.full_name, "full_name")?;
    require_non_blank(&repo.name, "name")?;

    Ok(raw_repository::ActiveModel {
        id: Set(repo.id),
        name: Set(repo.name.clone()),
        full_name: Set(repo.full_name.clone()),
        owner_login: Set(repo.owner.as_ref().map(|o| o.login.clone())),
        language: Set(repo.language.clone()),
        visibility: Set(repo.visibility.clone()),
        fork: Set(repo.fork),
        stargazers_count: Set(repo.stargazers_count),
        created_at: Set(repo.created_at.clone()),
        updated_at: Set(repo.updated_at.clone()),
        ingestion_timestamp: Set(ingested_at),
    })
}

pub(crate) fn commit_row(
    repo_full_name: &str,
    commit: &Commit,
    ingested_at: DateTime<Utc>,
) -> RowResult<raw_commit::ActiveModel> {
    require_non_blank(&commit.sha, "sha")?;

    let detail = commit.commit.as_ref();
    let signature = detail.and_then(|d| d.author.as_ref());
    let stats = commit.stats.unwrap_or_default();

    Ok(raw_commit::ActiveModel {
        sha: Set(commit.sha.clone()),
        repo_full_name: Set(repo_full_name.to_string()),
        author_name: Set(signature.and_then(|s| s.name.clone())),
        author_email: Set(signature.and_then(|s| s.email.clone())),
        author_date: Set(signature.and_then(|s| s.date.clone())),
        author_login: Set(commit.author.as_ref().map(|a| a.login.clone())),
        author_id: Set(commit.author.as_ref().and_then(|a| a.id)),
        message: Set(detail.and_then(|d| d.message.clone())),
        additions: Set(stats.additions),
        deletions: Set(stats.deletions),
        total_changes: Set(stats.total),
        ingestion_timestamp: Set(ingested_at),
    })
}

pub(crate) fn pull_request_row(
    repo_full_name: &str,
    pr: &PullRequest,
    ingested_at: DateTime<Utc>,
) -> RowResult<raw_pull_request::ActiveModel> {
    if pr.number <= 0 {
        return Err(format!("invalid pull request number {}", pr.number));
    }

    Ok(raw_pull_request::ActiveModel {
        repo_full_name: Set(repo_full_name.to_string()),
        number: Set(pr.number),
        title: Set(pr.title.clone()),
        state: Set(pr.state.clone()),
        created_at: Set(pr.created_at.clone()),
        updated_at: Set(pr.updated_at.clone()),
        merged_at: Set(pr.merged_at.clone()),
        merge_commit_sha: Set(pr.merge_commit_sha.clone()),
        author_login: Set(pr.user.as_ref().map(|u| u.login.clone())),
        ingestion_timestamp: Set(ingested_at),
    })
}

pub(crate) fn review_row(
    repo_full_name: &str,
    pr_number: i64,
    review: &Review,
    ingested_at: DateTime<Utc>,
) -> RowResult<raw_review::ActiveModel> {
    if review.id <= 0 {
        return Err(format!("invalid review id {}", review.id));
    }

    Ok(raw_review::ActiveModel {
        id: Set(review.id),
        repo_full_name: Set(repo_full_name.to_string()),
        pr_number: Set(pr_number),
        state: Set(review.state.clone()),
        submitted_at: Set(review.submitted_at.clone()),
        body: Set(review.body.clone()),
        reviewer_login: Set(review.user.as_ref().map(|u| u.login.clone())),
        ingestion_timestamp: Set(ingested_at),
    })
}

pub(crate) fn language_row(
    repo_full_name: &str,
    language: &str,
    bytes: i64,
    ingested_at: DateTime<Utc>,
) -> RowResult<raw_language::ActiveModel> {
    require_non_blank(language, "language_name")?;
    if bytes < 0 {
        return Err(format!("negative byte count {bytes} for {language}"));
    }

    Ok(raw_language::ActiveModel {
        repo_full_name: Set(repo_full_name.to_string()),
        language_name: Set(language.to_string()),
        bytes: Set(bytes),
        ingestion_timestamp: Set(ingested_at),
    })
}
