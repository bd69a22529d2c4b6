use thiserror::Error;

use crate::github::GitHubError;
use crate::warehouse::WarehouseError;

/// Why an extraction step failed. Both sides are fatal for the step.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Api(#[from] GitHubError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
