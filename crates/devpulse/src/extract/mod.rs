//! Per-entity extraction steps: fetch, filter, load.
//!
//! Extractors never swallow source or warehouse call failures; the
//! orchestrator decides what a failed step means for the run. An empty
//! fetch produces no load call.

mod error;
mod filter;

use chrono::{DateTime, Utc};

use crate::github::types::{Commit, PullRequest, Repository, Review};
use crate::source::ActivitySource;
use crate::warehouse::{InsertResult, Warehouse};

pub use error::{ExtractError, Result};
pub use filter::{filter_since, is_after_watermark};

/// Items an extractor kept after filtering, and how many rows were stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted<T> {
    pub items: Vec<T>,
    pub loaded: usize,
}

impl<T> Extracted<T> {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            loaded: 0,
        }
    }

    #[must_use]
    pub fn extracted(&self) -> usize {
        self.items.len()
    }
}

fn warn_on_row_errors(entity: &str, scope: &str, result: &InsertResult) {
    if result.has_errors() {
        tracing::warn!(
            entity,
            repo = scope,
            failed = result.failed_rows(),
            total = result.total_rows,
            first_error = %result.errors[0].message,
            "Warehouse rejected rows"
        );
    }
}

/// List and load every repository owned by the account.
pub async fn extract_repositories<S>(
    source: &S,
    warehouse: &dyn Warehouse,
) -> Result<Extracted<Repository>>
where
    S: ActivitySource + ?Sized,
{
    let repos = source.list_repositories().await?;
    if repos.is_empty() {
        return Ok(Extracted::empty());
    }

    let result = warehouse.load_repositories(&repos).await?;
    warn_on_row_errors("repositories", "all", &result);
    tracing::info!(count = repos.len(), "Extracted repositories");

    Ok(Extracted {
        items: repos,
        loaded: result.successful_rows,
    })
}

/// Commits authored after `since` (by authored date).
pub async fn extract_commits<S>(
    source: &S,
    warehouse: &dyn Warehouse,
    repo_full_name: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Extracted<Commit>>
where
    S: ActivitySource + ?Sized,
{
    let fetched = source.list_commits(repo_full_name).await?;
    let fetched_count = fetched.len();
    let commits = filter_since(fetched, since, Commit::authored_date);
    if commits.is_empty() {
        tracing::debug!(repo = repo_full_name, fetched = fetched_count, "No new commits");
        return Ok(Extracted::empty());
    }

    let result = warehouse.load_commits(repo_full_name, &commits).await?;
    warn_on_row_errors("commits", repo_full_name, &result);
    tracing::info!(repo = repo_full_name, count = commits.len(), "Extracted commits");

    Ok(Extracted {
        items: commits,
        loaded: result.successful_rows,
    })
}

/// Pull requests updated after `since`.
pub async fn extract_pull_requests<S>(
    source: &S,
    warehouse: &dyn Warehouse,
    repo_full_name: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Extracted<PullRequest>>
where
    S: ActivitySource + ?Sized,
{
    let fetched = source.list_pull_requests(repo_full_name).await?;
    let pull_requests = filter_since(fetched, since, |pr| pr.updated_at.as_deref());
    if pull_requests.is_empty() {
        return Ok(Extracted::empty());
    }

    let result = warehouse
        .load_pull_requests(repo_full_name, &pull_requests)
        .await?;
    warn_on_row_errors("pull_requests", repo_full_name, &result);
    tracing::info!(
        repo = repo_full_name,
        count = pull_requests.len(),
        "Extracted pull requests"
    );

    Ok(Extracted {
        items: pull_requests,
        loaded: result.successful_rows,
    })
}

/// Reviews for each of `pull_requests`, loaded one pull request at a time.
///
/// Only the given pull requests are visited, so incremental runs pick up
/// reviews through the pull requests that passed their own filter.
pub async fn extract_reviews<S>(
    source: &S,
    warehouse: &dyn Warehouse,
    repo_full_name: &str,
    pull_requests: &[PullRequest],
) -> Result<Extracted<Review>>
where
    S: ActivitySource + ?Sized,
{
    let mut extracted = Extracted::empty();

    for pr in pull_requests {
        let reviews = source.list_reviews(repo_full_name, pr.number).await?;
        if reviews.is_empty() {
            continue;
        }

        let result = warehouse
            .load_reviews(repo_full_name, pr.number, &reviews)
            .await?;
        warn_on_row_errors("reviews", repo_full_name, &result);

        extracted.loaded += result.successful_rows;
        extracted.items.extend(reviews);
    }

    if !extracted.items.is_empty() {
        tracing::info!(
            repo = repo_full_name,
            count = extracted.items.len(),
            pull_requests = pull_requests.len(),
            "Extracted reviews"
        );
    }
    Ok(extracted)
}

/// The full language breakdown, as `(language, bytes)` pairs.
pub async fn extract_languages<S>(
    source: &S,
    warehouse: &dyn Warehouse,
    repo_full_name: &str,
) -> Result<Extracted<(String, i64)>>
where
    S: ActivitySource + ?Sized,
{
    let breakdown = source.languages(repo_full_name).await?;
    if breakdown.is_empty() {
        return Ok(Extracted::empty());
    }

    let result = warehouse.load_languages(&breakdown).await?;
    warn_on_row_errors("languages", repo_full_name, &result);

    Ok(Extracted {
        items: breakdown.bytes.into_iter().collect(),
        loaded: result.successful_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::entity_type::EntityType;
    use crate::testing::{
        FakeSource, LoadCall, RecordingWarehouse, commit, pull_request, repo, review,
    };
    use chrono::TimeZone;

    fn watermark() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn commits_after_watermark_are_kept_and_bad_dates_fail_open() {
        let mut source = FakeSource::default();
        source.commits.insert(
            "octo/a".to_string(),
            vec![
                commit("old", Some("2024-02-01T00:00:00Z")),
                commit("new", Some("2024-04-01T00:00:00Z")),
                commit("garbled", Some("not-a-date")),
            ],
        );
        let warehouse = RecordingWarehouse::default();

        let out = extract_commits(&source, &warehouse, "octo/a", Some(watermark()))
            .await
            .unwrap();

        let shas: Vec<_> = out.items.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["new", "garbled"]);
        assert_eq!(out.loaded, 2);
        assert_eq!(
            warehouse.loads(),
            vec![LoadCall {
                entity: EntityType::Commits,
                scope: "octo/a".to_string(),
                rows: 2,
            }]
        );
    }

    #[tokio::test]
    async fn empty_fetch_makes_no_load_call() {
        let source = FakeSource::default();
        let warehouse = RecordingWarehouse::default();

        let commits = extract_commits(&source, &warehouse, "octo/a", None)
            .await
            .unwrap();
        let languages = extract_languages(&source, &warehouse, "octo/a")
            .await
            .unwrap();

        assert_eq!(commits.extracted(), 0);
        assert_eq!(languages.extracted(), 0);
        assert!(warehouse.loads().is_empty());
    }

    #[tokio::test]
    async fn pull_requests_filter_on_updated_at() {
        let mut source = FakeSource::default();
        source.pull_requests.insert(
            "octo/a".to_string(),
            vec![
                pull_request(1, Some("2024-01-01T00:00:00Z")),
                pull_request(2, Some("2024-05-01T00:00:00Z")),
                pull_request(3, None),
            ],
        );
        let warehouse = RecordingWarehouse::default();

        let out = extract_pull_requests(&source, &warehouse, "octo/a", Some(watermark()))
            .await
            .unwrap();

        let numbers: Vec<_> = out.items.iter().map(|pr| pr.number).collect();
        assert_eq!(numbers, vec![2, 3]);
    }

    #[tokio::test]
    async fn api_failure_propagates_without_loading() {
        let mut source = FakeSource::default();
        source.failing_pull_requests.insert("octo/a".to_string());
        let warehouse = RecordingWarehouse::default();

        let err = extract_pull_requests(&source, &warehouse, "octo/a", None)
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::Api(_)));
        assert!(warehouse.loads().is_empty());
    }

    #[tokio::test]
    async fn reviews_are_fetched_only_for_given_pull_requests() {
        let mut source = FakeSource::default();
        source
            .reviews
            .insert(("octo/a".to_string(), 1), vec![review(10), review(11)]);
        source
            .reviews
            .insert(("octo/a".to_string(), 2), vec![review(20)]);
        let warehouse = RecordingWarehouse::default();

        let prs = vec![pull_request(1, None), pull_request(3, None)];
        let out = extract_reviews(&source, &warehouse, "octo/a", &prs)
            .await
            .unwrap();

        assert_eq!(out.extracted(), 2);
        assert_eq!(out.loaded, 2);
        assert_eq!(
            source.calls(),
            vec!["reviews octo/a#1".to_string(), "reviews octo/a#3".to_string()]
        );
        assert_eq!(warehouse.loads_for(EntityType::Reviews).len(), 1);
    }

    #[tokio::test]
    async fn rejected_rows_reduce_loaded_count() {
        let source = FakeSource {
            repos: vec![repo(1, "octo/a"), repo(2, "octo/b")],
            ..FakeSource::default()
        };
        let warehouse = RecordingWarehouse {
            rejected_rows: [0].into_iter().collect(),
            ..RecordingWarehouse::default()
        };

        let out = extract_repositories(&source, &warehouse).await.unwrap();

        assert_eq!(out.extracted(), 2);
        assert_eq!(out.loaded, 1);
    }

    #[tokio::test]
    async fn languages_load_the_whole_breakdown() {
        let mut source = FakeSource::default();
        source.languages.insert(
            "octo/a".to_string(),
            [("Rust".to_string(), 900), ("Shell".to_string(), 100)]
                .into_iter()
                .collect(),
        );
        let warehouse = RecordingWarehouse::default();

        let out = extract_languages(&source, &warehouse, "octo/a")
            .await
            .unwrap();

        assert_eq!(
            out.items,
            vec![("Rust".to_string(), 900), ("Shell".to_string(), 100)]
        );
        assert_eq!(warehouse.loads_for(EntityType::Languages)[0].rows, 2);
    }
}
