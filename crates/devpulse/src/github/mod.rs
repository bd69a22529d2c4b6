//! GitHub REST API client.

mod client;
pub mod error;
mod pagination;
mod rate_limit;
pub mod types;

pub use client::{Conditional, DEFAULT_API_URL, GitHubClient, PER_PAGE, Page, REQUEST_TIMEOUT};
pub use error::{GitHubError, is_retryable_status, short_error_message};
pub use pagination::parse_next_page_url;
pub use rate_limit::{
    ApiRateLimiter, DEFAULT_REQUESTS_PER_SECOND, RATE_LIMIT_THRESHOLD, RateLimitInfo,
};
pub use types::{
    Account, Commit, CommitDetail, CommitStats, GitSignature, LanguageBreakdown, PullRequest,
    Repository, Review,
};
