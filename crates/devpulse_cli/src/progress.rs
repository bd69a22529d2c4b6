//! Progress reporting for extraction runs.
//!
//! Two modes:
//! - Interactive (TTY): a repository progress bar and a step spinner using indicatif
//! - Logging (non-TTY): structured events via tracing

use std::sync::{Arc, Mutex};
use std::time::Duration;

use console::{Term, style};
use devpulse::{ExtractionProgress, ProgressCallback};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    Interactive(InteractiveReporter),
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter)
        }
    }

    pub fn handle(&self, event: ExtractionProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to a callback for the orchestrator.
    pub fn as_callback(self: &Arc<Self>) -> ProgressCallback {
        let reporter = Arc::clone(self);
        Box::new(move |event| reporter.handle(event))
    }

    /// Finish all progress bars (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct ProgressState {
    repo_bar: Option<ProgressBar>,
    failures: usize,
}

/// Interactive progress reporter using indicatif.
pub struct InteractiveReporter {
    multi: MultiProgress,
    spinner: ProgressBar,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        let multi = MultiProgress::new();
        let spinner = multi.add(ProgressBar::new_spinner());
        spinner.set_style(Self::spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message("Preparing warehouse");
        Self {
            multi,
            spinner,
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn handle(&self, event: ExtractionProgress) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        match event {
            ExtractionProgress::InfrastructureReady => {
                self.spinner.set_message("Listing repositories");
            }
            ExtractionProgress::WatermarksLoaded {
                commits,
                pull_requests,
            } => {
                let since = |w: Option<String>| w.unwrap_or_else(|| "never".to_string());
                self.spinner.println(format!(
                    "{} commits since {}, pull requests since {}",
                    style("incremental").cyan(),
                    since(commits),
                    since(pull_requests)
                ));
            }
            ExtractionProgress::RepositoriesListed { count } => {
                let bar = self.multi.insert_before(&self.spinner, ProgressBar::new(count as u64));
                bar.set_style(Self::bar_style());
                bar.set_prefix("repos");
                state.repo_bar = Some(bar);
            }
            ExtractionProgress::RepositoryStarted { repo, .. } => {
                self.spinner.set_message(repo);
            }
            ExtractionProgress::StepCompleted {
                repo,
                entity,
                extracted,
                ..
            } => {
                self.spinner
                    .set_message(format!("{repo}: {entity} ({extracted})"));
            }
            ExtractionProgress::StepFailed {
                repo,
                entity,
                error,
            } => {
                state.failures += 1;
                self.spinner.println(format!(
                    "{} {entity} [{repo}]: {error}",
                    style("✗").red().bold()
                ));
            }
            ExtractionProgress::RepositoryFinished { .. } => {
                if let Some(bar) = &state.repo_bar {
                    bar.inc(1);
                    if state.failures > 0 {
                        bar.set_message(format!("{} failed steps", state.failures));
                    }
                }
            }
            ExtractionProgress::WatermarkAdvanced { entity } => {
                self.spinner
                    .set_message(format!("Advanced {entity} watermark"));
            }
            ExtractionProgress::Finished { .. } => {
                self.finish_bars(&state);
            }
            _ => {}
        }
    }

    pub fn finish(&self) {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.finish_bars(&state);
    }

    fn finish_bars(&self, state: &ProgressState) {
        if let Some(bar) = &state.repo_bar {
            bar.finish();
        }
        self.spinner.finish_and_clear();
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn handle(&self, event: ExtractionProgress) {
        match event {
            ExtractionProgress::InfrastructureReady => {
                tracing::debug!("Warehouse infrastructure ready");
            }
            ExtractionProgress::WatermarksLoaded {
                commits,
                pull_requests,
            } => {
                tracing::debug!(commits = ?commits, pull_requests = ?pull_requests, "Watermarks loaded");
            }
            ExtractionProgress::RepositoriesListed { count } => {
                tracing::info!(count, "Repositories listed");
            }
            ExtractionProgress::RepositoryStarted { repo, index, total } => {
                tracing::info!(repo = %repo, position = index + 1, total, "Processing repository");
            }
            ExtractionProgress::StepCompleted {
                repo,
                entity,
                extracted,
                loaded,
            } => {
                tracing::debug!(repo = %repo, entity = %entity, extracted, loaded, "Step complete");
            }
            ExtractionProgress::StepFailed {
                repo,
                entity,
                error,
            } => {
                tracing::warn!(repo = %repo, entity = %entity, error = %error, "Step failed");
            }
            ExtractionProgress::RepositoryFinished { repo } => {
                tracing::debug!(repo = %repo, "Repository done");
            }
            ExtractionProgress::WatermarkAdvanced { entity } => {
                tracing::info!(entity = %entity, "Watermark advanced");
            }
            ExtractionProgress::Finished {
                successes,
                failures,
            } => {
                tracing::info!(successes, failures, "Extraction finished");
            }
            _ => {}
        }
    }
}
