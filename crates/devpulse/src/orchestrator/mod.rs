//! Runs a complete extraction: infrastructure, watermarks, repositories,
//! per-repository steps, then watermark advancement.
//!
//! Every step failure is caught and recorded as a result; only an
//! infrastructure failure ends the run early. Watermarks are advanced only
//! after every repository has finished, for entity types that had at least
//! one success and no failures.

mod progress;
mod result;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use crate::entity::entity_type::EntityType;
use crate::extract::{
    self, extract_commits, extract_languages, extract_pull_requests, extract_repositories,
    extract_reviews,
};
use crate::github::short_error_message;
use crate::source::ActivitySource;
use crate::warehouse::{Warehouse, WatermarkStore};

pub use progress::{ExtractionProgress, ProgressCallback, emit};
pub use result::{
    ALL_REPOSITORIES, EntityTotals, ExtractionResult, ExtractionSummary, INFRASTRUCTURE,
    NO_SCOPE,
};

/// The per-repository steps, in execution order.
const REPOSITORY_STEPS: [EntityType; 4] = [
    EntityType::Commits,
    EntityType::PullRequests,
    EntityType::Reviews,
    EntityType::Languages,
];

/// The order watermarks are evaluated and written in.
const WATERMARK_ORDER: [EntityType; 5] = [
    EntityType::Commits,
    EntityType::PullRequests,
    EntityType::Reviews,
    EntityType::Repositories,
    EntityType::Languages,
];

/// Whether watermarks narrow what gets extracted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Ignore watermarks and fetch everything.
    Full,
    /// Fetch only commits and pull requests newer than their watermarks.
    #[default]
    Incremental,
}

#[derive(Debug, Clone, Copy, Default)]
struct Watermarks {
    commits: Option<DateTime<Utc>>,
    pull_requests: Option<DateTime<Utc>>,
}

/// Drives one extraction run against a source and a warehouse.
pub struct Orchestrator<S> {
    source: Arc<S>,
    warehouse: Arc<dyn Warehouse>,
    watermarks: Arc<dyn WatermarkStore>,
    concurrency: usize,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl<S: ActivitySource + 'static> Orchestrator<S> {
    pub fn new(
        source: Arc<S>,
        warehouse: Arc<dyn Warehouse>,
        watermarks: Arc<dyn WatermarkStore>,
    ) -> Self {
        Self {
            source,
            warehouse,
            watermarks,
            concurrency: 1,
            on_progress: None,
        }
    }

    /// Process up to `concurrency` repositories at once. Zero is treated as one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(Arc::new(on_progress));
        self
    }

    /// Run to completion. Never fails; problems are reported in the summary.
    pub async fn run(&self, mode: ExtractionMode) -> ExtractionSummary {
        let started_at = Utc::now();
        let on_progress = self.on_progress.as_deref();
        let mut results = Vec::new();

        let infra_start = Instant::now();
        if let Err(e) = self.warehouse.ensure_infrastructure_exists().await {
            tracing::error!(error = %e, "Warehouse setup failed, skipping extraction");
            results.push(ExtractionResult::infrastructure_failure(
                short_error_message(&e),
                infra_start.elapsed(),
            ));
            return self.finish(results, started_at);
        }
        emit(on_progress, ExtractionProgress::InfrastructureReady);

        let watermarks = match mode {
            ExtractionMode::Full => {
                tracing::info!("Full extraction, ignoring watermarks");
                Watermarks::default()
            }
            ExtractionMode::Incremental => self.read_watermarks().await,
        };

        // Everything fetched from here on is covered by the next watermark.
        let extraction_instant = Utc::now();

        let listing_start = Instant::now();
        let repos = match extract_repositories(self.source.as_ref(), self.warehouse.as_ref()).await
        {
            Ok(out) => {
                results.push(ExtractionResult::success(
                    EntityType::Repositories,
                    ALL_REPOSITORIES,
                    out.extracted(),
                    out.loaded,
                    listing_start.elapsed(),
                ));
                out.items
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to list repositories");
                results.push(ExtractionResult::failure(
                    EntityType::Repositories,
                    ALL_REPOSITORIES,
                    short_error_message(&e),
                    listing_start.elapsed(),
                ));
                Vec::new()
            }
        };
        emit(
            on_progress,
            ExtractionProgress::RepositoriesListed { count: repos.len() },
        );

        let names: Vec<String> = repos.into_iter().map(|r| r.full_name).collect();
        let worker = RepositoryWorker {
            source: Arc::clone(&self.source),
            warehouse: Arc::clone(&self.warehouse),
            watermarks,
            on_progress: self.on_progress.clone(),
        };

        if self.concurrency > 1 && names.len() > 1 {
            results.extend(self.process_concurrently(&worker, names).await);
        } else {
            let total = names.len();
            for (index, repo) in names.into_iter().enumerate() {
                results.extend(worker.process(repo, index, total).await);
            }
        }

        self.advance_watermarks(&results, extraction_instant).await;
        self.finish(results, started_at)
    }

    async fn read_watermarks(&self) -> Watermarks {
        let watermarks = Watermarks {
            commits: self
                .watermarks
                .last_extraction_timestamp(EntityType::Commits)
                .await,
            pull_requests: self
                .watermarks
                .last_extraction_timestamp(EntityType::PullRequests)
                .await,
        };
        tracing::info!(
            commits = ?watermarks.commits,
            pull_requests = ?watermarks.pull_requests,
            "Incremental extraction"
        );
        emit(
            self.on_progress.as_deref(),
            ExtractionProgress::WatermarksLoaded {
                commits: watermarks.commits.map(|t| t.to_rfc3339()),
                pull_requests: watermarks.pull_requests.map(|t| t.to_rfc3339()),
            },
        );
        watermarks
    }

    /// Fan out over repositories, keeping results in listing order.
    async fn process_concurrently(
        &self,
        worker: &RepositoryWorker<S>,
        names: Vec<String>,
    ) -> Vec<ExtractionResult> {
        let total = names.len();
        let concurrency = self.concurrency.min(total);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        tracing::debug!(repos = total, concurrency, "Processing repositories concurrently");

        let mut handles = Vec::with_capacity(total);
        for (index, repo) in names.into_iter().enumerate() {
            let worker = worker.clone();
            let semaphore = Arc::clone(&semaphore);
            let scope = repo.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return failed_repository(&repo, "Semaphore closed unexpectedly"),
                };
                worker.process(repo, index, total).await
            });
            handles.push((scope, handle));
        }

        let mut results = Vec::new();
        for (repo, handle) in handles {
            match handle.await {
                Ok(repo_results) => results.extend(repo_results),
                Err(e) => {
                    tracing::error!(repo = %repo, error = %e, "Repository task panicked");
                    results.extend(failed_repository(&repo, &e.to_string()));
                }
            }
        }
        results
    }

    async fn advance_watermarks(&self, results: &[ExtractionResult], extracted_at: DateTime<Utc>) {
        for entity in WATERMARK_ORDER {
            let of_entity = results.iter().filter(|r| r.entity_type == entity.as_str());
            let (successes, failures) = of_entity.fold((0usize, 0usize), |(ok, err), r| {
                if r.success { (ok + 1, err) } else { (ok, err + 1) }
            });

            if successes == 0 || failures > 0 {
                tracing::info!(
                    entity = %entity,
                    successes,
                    failures,
                    "Watermark not advanced"
                );
                continue;
            }

            match self
                .watermarks
                .update_last_extraction_timestamp(entity, extracted_at)
                .await
            {
                Ok(()) => {
                    tracing::debug!(entity = %entity, at = %extracted_at, "Watermark advanced");
                    emit(
                        self.on_progress.as_deref(),
                        ExtractionProgress::WatermarkAdvanced { entity },
                    );
                }
                Err(e) => {
                    tracing::error!(entity = %entity, error = %e, "Failed to advance watermark");
                }
            }
        }
    }

    fn finish(
        &self,
        results: Vec<ExtractionResult>,
        started_at: DateTime<Utc>,
    ) -> ExtractionSummary {
        let summary = ExtractionSummary {
            results,
            started_at,
            finished_at: Utc::now(),
        };
        log_summary(&summary);
        emit(
            self.on_progress.as_deref(),
            ExtractionProgress::Finished {
                successes: summary.success_count(),
                failures: summary.failure_count(),
            },
        );
        summary
    }
}

fn log_summary(summary: &ExtractionSummary) {
    tracing::info!(
        results = summary.results.len(),
        successes = summary.success_count(),
        failures = summary.failure_count(),
        duration_ms = summary.duration().as_millis() as u64,
        "Extraction run finished"
    );
    for totals in summary.entity_totals() {
        tracing::info!(
            entity = %totals.entity,
            extracted = totals.extracted,
            loaded = totals.loaded,
            failures = totals.failures,
            "Entity totals"
        );
    }
    if summary.has_failures() {
        tracing::warn!(failures = summary.failure_count(), "Extraction completed with failures");
        for failure in summary.failures() {
            tracing::warn!(
                entity = %failure.entity_type,
                repo = %failure.repo,
                error = failure.error.as_deref().unwrap_or("unknown error"),
                "Step failed"
            );
        }
    }
}

/// One failure per repository step, for a repository whose task never ran.
fn failed_repository(repo: &str, error: &str) -> Vec<ExtractionResult> {
    REPOSITORY_STEPS
        .iter()
        .map(|entity| {
            ExtractionResult::failure(*entity, repo, error, std::time::Duration::ZERO)
        })
        .collect()
}

/// Everything a single repository's steps need, cheap to clone into a task.
struct RepositoryWorker<S> {
    source: Arc<S>,
    warehouse: Arc<dyn Warehouse>,
    watermarks: Watermarks,
    on_progress: Option<Arc<ProgressCallback>>,
}

impl<S> Clone for RepositoryWorker<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            warehouse: Arc::clone(&self.warehouse),
            watermarks: self.watermarks,
            on_progress: self.on_progress.clone(),
        }
    }
}

impl<S: ActivitySource> RepositoryWorker<S> {
    /// Commits, pull requests, reviews, languages. Each step stands alone;
    /// reviews run over an empty list when pull requests failed.
    async fn process(&self, repo: String, index: usize, total: usize) -> Vec<ExtractionResult> {
        emit(
            self.on_progress.as_deref(),
            ExtractionProgress::RepositoryStarted {
                repo: repo.clone(),
                index,
                total,
            },
        );
        let source = self.source.as_ref();
        let warehouse = self.warehouse.as_ref();
        let mut results = Vec::with_capacity(REPOSITORY_STEPS.len());

        let start = Instant::now();
        let commits = extract_commits(source, warehouse, &repo, self.watermarks.commits).await;
        results.push(self.record(EntityType::Commits, &repo, start, commits.map(counts)));

        let start = Instant::now();
        let pull_requests =
            extract_pull_requests(source, warehouse, &repo, self.watermarks.pull_requests).await;
        let (pr_result, pull_requests) = match pull_requests {
            Ok(out) => (Ok((out.extracted(), out.loaded)), out.items),
            Err(e) => (Err(e), Vec::new()),
        };
        results.push(self.record(EntityType::PullRequests, &repo, start, pr_result));

        let start = Instant::now();
        let reviews = extract_reviews(source, warehouse, &repo, &pull_requests).await;
        results.push(self.record(EntityType::Reviews, &repo, start, reviews.map(counts)));

        let start = Instant::now();
        let languages = extract_languages(source, warehouse, &repo).await;
        results.push(self.record(EntityType::Languages, &repo, start, languages.map(counts)));

        emit(
            self.on_progress.as_deref(),
            ExtractionProgress::RepositoryFinished { repo },
        );
        results
    }

    fn record(
        &self,
        entity: EntityType,
        repo: &str,
        start: Instant,
        outcome: extract::Result<(usize, usize)>,
    ) -> ExtractionResult {
        match outcome {
            Ok((extracted, loaded)) => {
                emit(
                    self.on_progress.as_deref(),
                    ExtractionProgress::StepCompleted {
                        repo: repo.to_string(),
                        entity,
                        extracted,
                        loaded,
                    },
                );
                ExtractionResult::success(entity, repo, extracted, loaded, start.elapsed())
            }
            Err(e) => {
                let message = short_error_message(&e);
                tracing::error!(repo, entity = %entity, error = %message, "Extraction step failed");
                emit(
                    self.on_progress.as_deref(),
                    ExtractionProgress::StepFailed {
                        repo: repo.to_string(),
                        entity,
                        error: message.clone(),
                    },
                );
                ExtractionResult::failure(entity, repo, message, start.elapsed())
            }
        }
    }
}

fn counts<T>(out: extract::Extracted<T>) -> (usize, usize) {
    (out.extracted(), out.loaded)
}
