//! In-memory collaborators for extractor and orchestrator tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entity::entity_type::EntityType;
use crate::github::error::{GitHubError, Result as ApiResult};
use crate::github::types::{
    Account, Commit, CommitDetail, GitSignature, LanguageBreakdown, PullRequest, Repository, Review,
};
use crate::source::ActivitySource;
use crate::warehouse::{
    InsertResult, Result as WarehouseResult, RowError, Warehouse, WarehouseError, WatermarkStore,
};

pub(crate) fn repo(id: i64, full_name: &str) -> Repository {
    Repository {
        id,
        name: full_name.rsplit('/').next().unwrap_or(full_name).to_string(),
        full_name: full_name.to_string(),
        owner: None,
        language: None,
        visibility: Some("public".to_string()),
        fork: false,
        stargazers_count: Some(0),
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn commit(sha: &str, date: Option<&str>) -> Commit {
    Commit {
        sha: sha.to_string(),
        commit: Some(CommitDetail {
            message: Some(format!("commit {sha}")),
            author: Some(GitSignature {
                name: Some("Octo".to_string()),
                email: None,
                date: date.map(str::to_string),
            }),
        }),
        author: Some(Account {
            login: "octo".to_string(),
            id: Some(1),
        }),
        stats: None,
    }
}

pub(crate) fn pull_request(number: i64, updated_at: Option<&str>) -> PullRequest {
    PullRequest {
        number,
        title: Some(format!("PR {number}")),
        state: Some("open".to_string()),
        created_at: None,
        updated_at: updated_at.map(str::to_string),
        merged_at: None,
        merge_commit_sha: None,
        user: None,
    }
}

pub(crate) fn review(id: i64) -> Review {
    Review {
        id,
        state: Some("APPROVED".to_string()),
        submitted_at: None,
        body: None,
        user: None,
    }
}

fn api_failure(url: &str) -> GitHubError {
    GitHubError::Status {
        status: 500,
        url: url.to_string(),
    }
}

/// Canned activity keyed by repository full name.
#[derive(Default)]
pub(crate) struct FakeSource {
    pub repos: Vec<Repository>,
    pub fail_repo_listing: bool,
    pub commits: HashMap<String, Vec<Commit>>,
    pub pull_requests: HashMap<String, Vec<PullRequest>>,
    pub failing_pull_requests: HashSet<String>,
    pub reviews: HashMap<(String, i64), Vec<Review>>,
    pub languages: HashMap<String, BTreeMap<String, i64>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSource {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivitySource for FakeSource {
    async fn list_repositories(&self) -> ApiResult<Vec<Repository>> {
        self.record("repos".to_string());
        if self.fail_repo_listing {
            return Err(api_failure("/user/repos"));
        }
        Ok(self.repos.clone())
    }

    async fn list_commits(&self, repo: &str) -> ApiResult<Vec<Commit>> {
        self.record(format!("commits {repo}"));
        Ok(self.commits.get(repo).cloned().unwrap_or_default())
    }

    async fn list_pull_requests(&self, repo: &str) -> ApiResult<Vec<PullRequest>> {
        self.record(format!("pulls {repo}"));
        if self.failing_pull_requests.contains(repo) {
            return Err(api_failure(&format!("/repos/{repo}/pulls")));
        }
        Ok(self.pull_requests.get(repo).cloned().unwrap_or_default())
    }

    async fn list_reviews(&self, repo: &str, pr_number: i64) -> ApiResult<Vec<Review>> {
        self.record(format!("reviews {repo}#{pr_number}"));
        Ok(self
            .reviews
            .get(&(repo.to_string(), pr_number))
            .cloned()
            .unwrap_or_default())
    }

    async fn languages(&self, repo: &str) -> ApiResult<LanguageBreakdown> {
        self.record(format!("languages {repo}"));
        Ok(LanguageBreakdown {
            repo_full_name: repo.to_string(),
            bytes: self.languages.get(repo).cloned().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoadCall {
    pub entity: EntityType,
    pub scope: String,
    pub rows: usize,
}

/// Records every load and watermark call.
#[derive(Default)]
pub(crate) struct RecordingWarehouse {
    pub fail_infrastructure: bool,
    /// Every watermark write is attempted and recorded, then fails.
    pub fail_watermark_writes: bool,
    /// Rows at these indexes are rejected on every load.
    pub rejected_rows: HashSet<usize>,
    pub watermarks: Mutex<HashMap<EntityType, DateTime<Utc>>>,
    pub loads: Mutex<Vec<LoadCall>>,
    pub watermark_updates: Mutex<Vec<EntityType>>,
}

impl RecordingWarehouse {
    pub fn with_watermark(self, entity: EntityType, at: DateTime<Utc>) -> Self {
        self.watermarks.lock().unwrap().insert(entity, at);
        self
    }

    pub fn loads(&self) -> Vec<LoadCall> {
        self.loads.lock().unwrap().clone()
    }

    pub fn loads_for(&self, entity: EntityType) -> Vec<LoadCall> {
        self.loads()
            .into_iter()
            .filter(|l| l.entity == entity)
            .collect()
    }

    pub fn watermark_updates(&self) -> Vec<EntityType> {
        let mut updates = self.watermark_updates.lock().unwrap().clone();
        updates.sort();
        updates
    }

    fn record(&self, entity: EntityType, scope: &str, rows: usize) -> InsertResult {
        self.loads.lock().unwrap().push(LoadCall {
            entity,
            scope: scope.to_string(),
            rows,
        });
        let errors: Vec<RowError> = (0..rows)
            .filter(|i| self.rejected_rows.contains(i))
            .map(|row_index| RowError {
                row_index,
                message: "rejected".to_string(),
            })
            .collect();
        InsertResult {
            total_rows: rows,
            successful_rows: rows - errors.len(),
            errors,
        }
    }
}

#[async_trait]
impl Warehouse for RecordingWarehouse {
    async fn ensure_infrastructure_exists(&self) -> WarehouseResult<()> {
        if self.fail_infrastructure {
            return Err(WarehouseError::InvalidInput {
                message: "warehouse unreachable".to_string(),
            });
        }
        Ok(())
    }

    async fn load_repositories(&self, repos: &[Repository]) -> WarehouseResult<InsertResult> {
        Ok(self.record(EntityType::Repositories, "all", repos.len()))
    }

    async fn load_commits(&self, repo: &str, commits: &[Commit]) -> WarehouseResult<InsertResult> {
        Ok(self.record(EntityType::Commits, repo, commits.len()))
    }

    async fn load_pull_requests(
        &self,
        repo: &str,
        pull_requests: &[PullRequest],
    ) -> WarehouseResult<InsertResult> {
        Ok(self.record(EntityType::PullRequests, repo, pull_requests.len()))
    }

    async fn load_reviews(
        &self,
        repo: &str,
        pr_number: i64,
        reviews: &[Review],
    ) -> WarehouseResult<InsertResult> {
        Ok(self.record(
            EntityType::Reviews,
            &format!("{repo}#{pr_number}"),
            reviews.len(),
        ))
    }

    async fn load_languages(&self, languages: &LanguageBreakdown) -> WarehouseResult<InsertResult> {
        Ok(self.record(
            EntityType::Languages,
            &languages.repo_full_name,
            languages.len(),
        ))
    }
}

#[async_trait]
impl WatermarkStore for RecordingWarehouse {
    async fn last_extraction_timestamp(&self, entity: EntityType) -> Option<DateTime<Utc>> {
        self.watermarks.lock().unwrap().get(&entity).copied()
    }

    async fn update_last_extraction_timestamp(
        &self,
        entity: EntityType,
        extracted_at: DateTime<Utc>,
    ) -> WarehouseResult<()> {
        self.watermark_updates.lock().unwrap().push(entity);
        if self.fail_watermark_writes {
            return Err(WarehouseError::InvalidInput {
                message: "metadata table is read-only".to_string(),
            });
        }
        self.watermarks.lock().unwrap().insert(entity, extracted_at);
        Ok(())
    }
}
