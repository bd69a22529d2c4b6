//! DevPulse - extract GitHub activity into an analytical warehouse.
//!
//! A run lists the account's repositories and, for each one, pulls commits,
//! pull requests, reviews and language breakdowns from the GitHub REST API,
//! upserting everything into raw warehouse tables. Per-entity watermarks let
//! later runs fetch only what changed.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use devpulse::{ExtractionMode, GitHubClient, Orchestrator, SqlWarehouse};
//!
//! let warehouse = Arc::new(SqlWarehouse::connect("sqlite://devpulse.db?mode=rwc").await?);
//! let client = Arc::new(GitHubClient::new(token, "octocat", None)?);
//!
//! let summary = Orchestrator::new(client, warehouse.clone(), warehouse)
//!     .run(ExtractionMode::Incremental)
//!     .await;
//! println!("{summary}");
//! ```

pub mod db;
pub mod entity;
pub mod extract;
pub mod github;
pub mod http;
pub mod migration;
pub mod orchestrator;
pub mod retry;
pub mod source;
pub mod warehouse;

#[cfg(test)]
mod testing;

pub use db::{connect, connect_and_migrate};
pub use entity::prelude::*;
pub use github::{ApiRateLimiter, Conditional, GitHubClient, GitHubError};
pub use orchestrator::{
    EntityTotals, ExtractionMode, ExtractionProgress, ExtractionResult, ExtractionSummary,
    Orchestrator, ProgressCallback,
};
pub use source::ActivitySource;
pub use warehouse::{InsertResult, RowError, SqlWarehouse, Warehouse, WarehouseError, WatermarkStore};
