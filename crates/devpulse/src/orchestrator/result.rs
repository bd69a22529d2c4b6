use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::entity_type::EntityType;

/// Scope recorded for the repository listing step.
pub const ALL_REPOSITORIES: &str = "all";

/// Entity label for a run that never got past infrastructure setup.
pub const INFRASTRUCTURE: &str = "infrastructure";

/// Scope recorded for a failed infrastructure check.
pub const NO_SCOPE: &str = "N/A";

/// Outcome of one (entity type, scope) step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    pub entity_type: String,
    /// Repository full name, `all` for the listing, `N/A` for infrastructure.
    pub repo: String,
    pub records_extracted: usize,
    pub records_loaded: usize,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ExtractionResult {
    pub fn success(
        entity: EntityType,
        repo: impl Into<String>,
        records_extracted: usize,
        records_loaded: usize,
        duration: Duration,
    ) -> Self {
        Self {
            entity_type: entity.as_str().to_string(),
            repo: repo.into(),
            records_extracted,
            records_loaded,
            success: true,
            error: None,
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn failure(
        entity: EntityType,
        repo: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self::failed(entity.as_str(), repo, error, duration)
    }

    /// The single result of a run whose warehouse setup failed.
    pub fn infrastructure_failure(error: impl Into<String>, duration: Duration) -> Self {
        Self::failed(INFRASTRUCTURE, NO_SCOPE, error, duration)
    }

    fn failed(
        entity_type: &str,
        repo: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            repo: repo.into(),
            records_extracted: 0,
            records_loaded: 0,
            success: false,
            error: Some(error.into()),
            duration_ms: duration.as_millis() as u64,
        }
    }

    fn is_for(&self, entity: EntityType) -> bool {
        self.entity_type == entity.as_str()
    }
}

/// Per-entity totals across every scope, as shown in the summary breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityTotals {
    pub entity: EntityType,
    pub extracted: usize,
    pub loaded: usize,
    pub failures: usize,
}

/// Everything a run produced, in the order steps finished.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionSummary {
    pub results: Vec<ExtractionResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExtractionSummary {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| !r.success)
    }

    pub fn total_extracted_for_entity(&self, entity: EntityType) -> usize {
        self.results
            .iter()
            .filter(|r| r.is_for(entity))
            .map(|r| r.records_extracted)
            .sum()
    }

    pub fn total_loaded_for_entity(&self, entity: EntityType) -> usize {
        self.results
            .iter()
            .filter(|r| r.is_for(entity))
            .map(|r| r.records_loaded)
            .sum()
    }

    pub fn failure_count_for_entity(&self, entity: EntityType) -> usize {
        self.results
            .iter()
            .filter(|r| r.is_for(entity) && !r.success)
            .count()
    }

    pub fn success_count_for_entity(&self, entity: EntityType) -> usize {
        self.results
            .iter()
            .filter(|r| r.is_for(entity) && r.success)
            .count()
    }

    /// One row per entity type, listing first.
    pub fn entity_totals(&self) -> Vec<EntityTotals> {
        EntityType::ALL
            .into_iter()
            .map(|entity| EntityTotals {
                entity,
                extracted: self.total_extracted_for_entity(entity),
                loaded: self.total_loaded_for_entity(entity),
                failures: self.failure_count_for_entity(entity),
            })
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExtractionResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

impl fmt::Display for ExtractionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== DevPulse Extraction Summary ===")?;
        writeln!(f, "Duration: {}ms", self.duration().as_millis())?;
        writeln!(
            f,
            "Results:  {} successful, {} failed",
            self.success_count(),
            self.failure_count()
        )?;
        writeln!(f)?;
        writeln!(f, "Entity breakdown:")?;
        for totals in self.entity_totals() {
            writeln!(
                f,
                "  {:<16} extracted={:<6} loaded={:<6} failures={}",
                totals.entity.as_str(),
                totals.extracted,
                totals.loaded,
                totals.failures
            )?;
        }

        if self.has_failures() {
            writeln!(f)?;
            writeln!(f, "Failures:")?;
            for failure in self.failures() {
                writeln!(
                    f,
                    "  - {} [{}]: {}",
                    failure.entity_type,
                    failure.repo,
                    failure.error.as_deref().unwrap_or("unknown error")
                )?;
            }
        }
        Ok(())
    }
}
