//! The read side of an extraction run.

use async_trait::async_trait;

use crate::github::error::Result;
use crate::github::types::{Commit, LanguageBreakdown, PullRequest, Repository, Review};

/// Where activity data comes from.
///
/// Implemented by [`GitHubClient`](crate::github::GitHubClient); tests substitute
/// in-memory sources. Implementations must be safe to call concurrently for
/// different repositories.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Repositories owned by the configured account.
    async fn list_repositories(&self) -> Result<Vec<Repository>>;

    /// Commits in `repo_full_name` authored by the configured account.
    async fn list_commits(&self, repo_full_name: &str) -> Result<Vec<Commit>>;

    /// Pull requests in any state.
    async fn list_pull_requests(&self, repo_full_name: &str) -> Result<Vec<PullRequest>>;

    async fn list_reviews(&self, repo_full_name: &str, pr_number: i64) -> Result<Vec<Review>>;

    /// Byte counts per language.
    async fn languages(&self, repo_full_name: &str) -> Result<LanguageBreakdown>;
}
