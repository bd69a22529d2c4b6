//! GitHub API error types.

use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur when talking to the GitHub REST API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] HttpError),

    /// A non-retryable, non-success status.
    #[error("GitHub API error: {status} for {url}")]
    Status { status: u16, url: String },

    /// Still rate limited or unavailable after the retry budget was spent.
    #[error("Max retries exceeded for {url} (last status {status} after {attempts} attempts)")]
    RetriesExhausted {
        status: u16,
        url: String,
        attempts: usize,
    },

    /// A response body could not be decoded.
    #[error("Failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl GitHubError {
    /// The HTTP status behind this error, when there is one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::RetriesExhausted { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Whether a status should be retried with backoff.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 503)
}

/// First line of an error's display text.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for GitHub operations.
pub type Result<T> = std::result::Result<T, GitHubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses_are_rate_limit_and_unavailable() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        for status in [200, 304, 403, 404, 500, 502] {
            assert!(!is_retryable_status(status), "{status} must not retry");
        }
    }

    #[test]
    fn status_error_message_names_status_and_url() {
        let err = GitHubError::Status {
            status: 404,
            url: "https://api.github.com/repos/a/b/commits".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "GitHub API error: 404 for https://api.github.com/repos/a/b/commits"
        );
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn transport_errors_have_no_status() {
        let err = GitHubError::from(HttpError::Transport("reset".to_string()));
        assert_eq!(err.status(), None);
        assert_eq!(short_error_message(&err), "http transport error: reset");
    }
}
