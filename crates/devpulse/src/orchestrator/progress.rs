//! Progress events emitted during an extraction run.

use crate::entity::entity_type::EntityType;

/// Progress events for a UI or log sink.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ExtractionProgress {
    /// Warehouse tables checked or created.
    InfrastructureReady,

    /// Watermarks read for an incremental run.
    WatermarksLoaded {
        commits: Option<String>,
        pull_requests: Option<String>,
    },

    /// Repository listing finished.
    RepositoriesListed { count: usize },

    /// Starting the per-repository steps.
    RepositoryStarted {
        repo: String,
        index: usize,
        total: usize,
    },

    /// One step finished successfully.
    StepCompleted {
        repo: String,
        entity: EntityType,
        extracted: usize,
        loaded: usize,
    },

    /// One step failed; the run continues.
    StepFailed {
        repo: String,
        entity: EntityType,
        error: String,
    },

    /// All steps for a repository are done.
    RepositoryFinished { repo: String },

    WatermarkAdvanced { entity: EntityType },

    /// The run is over.
    Finished { successes: usize, failures: usize },
}

/// Type alias for progress callback functions.
pub type ProgressCallback = Box<dyn Fn(ExtractionProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
pub fn emit(on_progress: Option<&ProgressCallback>, event: ExtractionProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
