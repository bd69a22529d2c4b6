//! GitHub REST client: authentication, pagination, retry and quota throttling.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;

use super::error::{GitHubError, Result, is_retryable_status};
use super::pagination::parse_next_page_url;
use super::rate_limit::{ApiRateLimiter, RateLimitInfo};
use super::types::{Commit, LanguageBreakdown, PullRequest, Repository, Review};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::retry::RetryConfig;
use crate::source::ActivitySource;

/// Public GitHub API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Page size requested from every list endpoint.
pub const PER_PAGE: u32 = 100;

/// Per-request timeout for the reqwest transport.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("devpulse/", env!("CARGO_PKG_VERSION"));

/// Conditional request validator. At most one is sent per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Conditional {
    #[default]
    None,
    /// Sent as `If-None-Match`.
    ETag(String),
    /// Sent as `If-Modified-Since`.
    Since(String),
}

/// Outcome of a single successful request.
///
/// A `304 Not Modified` response has neither a body nor a next link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub body: Option<Vec<u8>>,
    pub next_url: Option<String>,
    pub etag: Option<String>,
}

impl Page {
    fn not_modified() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_not_modified(&self) -> bool {
        self.body.is_none()
    }
}

/// GitHub API client.
///
/// Holds no per-request state; clones share the transport and pacing limiter
/// and may be used concurrently.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    token: String,
    username: String,
    retry: RetryConfig,
    rate_limiter: Option<ApiRateLimiter>,
}

impl GitHubClient {
    /// Create a client for the public API backed by reqwest.
    pub fn new(
        token: &str,
        username: &str,
        rate_limiter: Option<ApiRateLimiter>,
    ) -> Result<Self> {
        Self::with_api_url(DEFAULT_API_URL, token, username, rate_limiter)
    }

    /// Create a client for a specific API root (e.g. GitHub Enterprise).
    pub fn with_api_url(
        api_url: &str,
        token: &str,
        username: &str,
        rate_limiter: Option<ApiRateLimiter>,
    ) -> Result<Self> {
        url::Url::parse(api_url)
            .map_err(|e| GitHubError::Config(format!("invalid API URL {api_url:?}: {e}")))?;
        let transport = ReqwestTransport::with_timeout(REQUEST_TIMEOUT)
            .map_err(|e| GitHubError::Config(e.to_string()))?;

        Ok(Self::new_with_transport(
            api_url,
            token,
            username,
            rate_limiter,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        api_url: &str,
        token: &str,
        username: &str,
        rate_limiter: Option<ApiRateLimiter>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            username: username.to_string(),
            retry: RetryConfig::default(),
            rate_limiter,
        }
    }

    /// Override the retry schedule.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }
    }

    /// Pause when the remaining quota has dropped below the low-water mark.
    async fn throttle(&self, quota: Option<RateLimitInfo>, url: &str) {
        let Some(quota) = quota else {
            return;
        };
        if let Some(delay) = quota.throttle_delay(Utc::now()) {
            tracing::warn!(
                url = %url,
                remaining = quota.remaining,
                wait_ms = delay.as_millis() as u64,
                "Rate limit nearly exhausted, pausing until reset"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Build an authenticated GET request.
    pub fn build_request(&self, url: &str, conditional: &Conditional) -> HttpRequest {
        let request = HttpRequest::get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT);

        match conditional {
            Conditional::None => request,
            Conditional::ETag(etag) => request.header("If-None-Match", etag.as_str()),
            Conditional::Since(since) => request.header("If-Modified-Since", since.as_str()),
        }
    }

    /// Send a request, retrying 429/503 responses with exponential backoff.
    ///
    /// A numeric `Retry-After` header replaces the backoff value for that wait.
    /// Other non-success statuses fail immediately; 304 yields an empty page.
    pub async fn execute_with_retry(&self, request: HttpRequest) -> Result<Page> {
        let mut schedule = self.retry.schedule();
        let mut attempts = 0usize;

        loop {
            self.wait_for_rate_limit().await;
            attempts += 1;

            let response = self.transport.send(request.clone()).await?;
            let quota = RateLimitInfo::from_response(&response);
            tracing::info!(
                status = response.status,
                url = %request.url,
                remaining = ?quota.map(|q| q.remaining),
                "GitHub API response"
            );
            self.throttle(quota, &request.url).await;

            if is_retryable_status(response.status) {
                let Some(backoff) = schedule.next() else {
                    return Err(GitHubError::RetriesExhausted {
                        status: response.status,
                        url: request.url,
                        attempts,
                    });
                };
                let wait = retry_after(&response).unwrap_or(backoff);
                tracing::warn!(
                    status = response.status,
                    url = %request.url,
                    attempt = attempts,
                    wait_ms = wait.as_millis() as u64,
                    "Retryable response, backing off"
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            return match response.status {
                304 => Ok(Page::not_modified()),
                _ if response.is_success() => Ok(Page {
                    next_url: parse_next_page_url(response.header("link")),
                    etag: response.header("etag").map(str::to_string),
                    body: Some(response.body),
                }),
                status => Err(GitHubError::Status {
                    status,
                    url: request.url,
                }),
            };
        }
    }

    /// Fetch one page with an optional conditional validator.
    pub async fn fetch_page(&self, url: &str, conditional: &Conditional) -> Result<Page> {
        self.execute_with_retry(self.build_request(url, conditional))
            .await
    }

    /// Follow `rel="next"` links from `url`, concatenating every page's array.
    pub async fn fetch_all_pages<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        let mut pages = 0u32;

        while let Some(page_url) = next {
            let page = self.fetch_page(&page_url, &Conditional::None).await?;
            let Some(body) = page.body else {
                break;
            };
            pages += 1;

            let batch: Vec<T> = decode_or_default(&page_url, &body)?;
            tracing::debug!(url = %page_url, page = pages, count = batch.len(), "Fetched page");
            items.extend(batch);
            next = page.next_url;
        }

        Ok(items)
    }

    /// Fetch a single JSON object. Not-modified and empty bodies yield `T::default()`.
    pub async fn fetch_object<T: DeserializeOwned + Default>(&self, url: &str) -> Result<T> {
        let page = self.fetch_page(url, &Conditional::None).await?;
        match page.body {
            Some(body) => decode_or_default(url, &body),
            None => Ok(T::default()),
        }
    }

    fn repos_url(&self) -> String {
        format!("{}/user/repos?per_page={PER_PAGE}&type=owner", self.api_url)
    }

    fn commits_url(&self, repo_full_name: &str) -> String {
        let author: String = url::form_urlencoded::byte_serialize(self.username.as_bytes()).collect();
        format!(
            "{}/repos/{repo_full_name}/commits?per_page={PER_PAGE}&author={author}",
            self.api_url
        )
    }

    fn pulls_url(&self, repo_full_name: &str) -> String {
        format!(
            "{}/repos/{repo_full_name}/pulls?state=all&per_page={PER_PAGE}",
            self.api_url
        )
    }

    fn reviews_url(&self, repo_full_name: &str, pr_number: i64) -> String {
        format!(
            "{}/repos/{repo_full_name}/pulls/{pr_number}/reviews?per_page={PER_PAGE}",
            self.api_url
        )
    }

    fn languages_url(&self, repo_full_name: &str) -> String {
        format!("{}/repos/{repo_full_name}/languages", self.api_url)
    }
}

#[async_trait]
impl ActivitySource for GitHubClient {
    async fn list_repositories(&self) -> Result<Vec<Repository>> {
        self.fetch_all_pages(&self.repos_url()).await
    }

    async fn list_commits(&self, repo_full_name: &str) -> Result<Vec<Commit>> {
        self.fetch_all_pages(&self.commits_url(repo_full_name))
            .await
    }

    async fn list_pull_requests(&self, repo_full_name: &str) -> Result<Vec<PullRequest>> {
        self.fetch_all_pages(&self.pulls_url(repo_full_name)).await
    }

    async fn list_reviews(&self, repo_full_name: &str, pr_number: i64) -> Result<Vec<Review>> {
        self.fetch_all_pages(&self.reviews_url(repo_full_name, pr_number))
            .await
    }

    async fn languages(&self, repo_full_name: &str) -> Result<LanguageBreakdown> {
        let bytes: BTreeMap<String, i64> =
            self.fetch_object(&self.languages_url(repo_full_name)).await?;
        Ok(LanguageBreakdown {
            repo_full_name: repo_full_name.to_string(),
            bytes,
        })
    }
}

/// Numeric `Retry-After` header, in seconds.
fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn decode_or_default<T: DeserializeOwned + Default>(url: &str, body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|source| GitHubError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpHeaders, MockTransport};

    const API: &str = "https://api.test";

    fn to_headers(pairs: Vec<(&str, &str)>) -> HttpHeaders {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn response(status: u16, headers: Vec<(&str, &str)>, body: impl AsRef<[u8]>) -> HttpResponse {
        HttpResponse {
            status,
            headers: to_headers(headers),
            body: body.as_ref().to_vec(),
        }
    }

    fn client(transport: &MockTransport) -> GitHubClient {
        GitHubClient::new_with_transport(API, "tok", "octo", None, Arc::new(transport.clone()))
    }

    fn repos_json(ids: &[i64]) -> String {
        let repos: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "name": format!("repo-{id}"),
                    "full_name": format!("octo/repo-{id}"),
                    "owner": {"login": "octo"},
                    "fork": false
                })
            })
            .collect();
        serde_json::Value::Array(repos).to_string()
    }

    // ─── Requests ────────────────────────────────────────────────────────────

    #[test]
    fn build_request_sets_auth_and_api_headers() {
        let transport = MockTransport::new();
        let req = client(&transport).build_request("https://api.test/x", &Conditional::None);

        assert_eq!(req.header_value("authorization"), Some("Bearer tok"));
        assert_eq!(req.header_value("accept"), Some("application/vnd.github+json"));
        assert_eq!(req.header_value("x-github-api-version"), Some("2022-11-28"));
        assert!(req.header_value("user-agent").is_some());
        assert_eq!(req.header_value("if-none-match"), None);
        assert_eq!(req.header_value("if-modified-since"), None);
    }

    #[test]
    fn build_request_sends_exactly_one_validator() {
        let transport = MockTransport::new();
        let c = client(&transport);

        let etag = c.build_request(API, &Conditional::ETag("\"abc\"".to_string()));
        assert_eq!(etag.header_value("if-none-match"), Some("\"abc\""));
        assert_eq!(etag.header_value("if-modified-since"), None);

        let since = c.build_request(
            API,
            &Conditional::Since("Wed, 21 Oct 2015 07:28:00 GMT".to_string()),
        );
        assert_eq!(since.header_value("if-none-match"), None);
        assert_eq!(
            since.header_value("if-modified-since"),
            Some("Wed, 21 Oct 2015 07:28:00 GMT")
        );
    }

    #[test]
    fn endpoint_urls_match_rest_routes() {
        let transport = MockTransport::new();
        let c = GitHubClient::new_with_transport(
            "https://api.test/",
            "tok",
            "octo cat",
            None,
            Arc::new(transport),
        );

        assert_eq!(c.repos_url(), "https://api.test/user/repos?per_page=100&type=owner");
        assert_eq!(
            c.commits_url("octo/a"),
            "https://api.test/repos/octo/a/commits?per_page=100&author=octo+cat"
        );
        assert_eq!(
            c.pulls_url("octo/a"),
            "https://api.test/repos/octo/a/pulls?state=all&per_page=100"
        );
        assert_eq!(
            c.reviews_url("octo/a", 12),
            "https://api.test/repos/octo/a/pulls/12/reviews?per_page=100"
        );
        assert_eq!(c.languages_url("octo/a"), "https://api.test/repos/octo/a/languages");
    }

    #[test]
    fn with_api_url_rejects_garbage() {
        let err = GitHubClient::with_api_url("not a url", "tok", "octo", None)
            .err()
            .expect("invalid url should fail");
        assert!(matches!(err, GitHubError::Config(_)));
    }

    // ─── Pagination ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn fetch_all_pages_follows_next_links_in_order() {
        let transport = MockTransport::new();
        let first = format!("{API}/user/repos?per_page=100&type=owner");
        let second = format!("{API}/user/repos?per_page=100&type=owner&page=2");
        let link = format!(r#"<{second}>; rel="next", <{second}>; rel="last""#);

        transport.push_response(&first, response(200, vec![("Link", link.as_str())], repos_json(&[1, 2])));
        transport.push_response(&second, response(200, vec![], repos_json(&[3])));

        let repos = client(&transport)
            .list_repositories()
            .await
            .expect("pages should load");

        let ids: Vec<i64> = repos.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn fetch_all_pages_surfaces_decode_errors() {
        let transport = MockTransport::new();
        let url = format!("{API}/user/repos?per_page=100&type=owner");
        transport.push_response(&url, response(200, vec![], "{not json"));

        let err = client(&transport)
            .list_repositories()
            .await
            .expect_err("bad json should fail");
        assert!(matches!(err, GitHubError::Decode { .. }));
    }

    #[tokio::test]
    async fn transport_failures_propagate() {
        let transport = MockTransport::new();
        let url = format!("{API}/repos/octo/a/pulls?state=all&per_page=100");
        transport.push_transport_error(&url, "connection reset");

        let err = client(&transport)
            .list_pull_requests("octo/a")
            .await
            .expect_err("transport failure should propagate");
        assert!(matches!(err, GitHubError::Transport(_)));
        assert_eq!(transport.requests().len(), 1);
    }

    // ─── Retry ───────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn rate_limited_then_ok_takes_two_requests() {
        let transport = MockTransport::new();
        transport.push_response(API, response(429, vec![], ""));
        transport.push_response(API, response(200, vec![], "[]"));

        let page = client(&transport)
            .fetch_page(API, &Conditional::None)
            .await
            .expect("second attempt should succeed");

        assert_eq!(page.body.as_deref(), Some(b"[]".as_slice()));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_header_sets_the_wait() {
        let transport = MockTransport::new();
        transport.push_response(API, response(429, vec![("Retry-After", "3")], ""));
        transport.push_response(API, response(200, vec![], "[]"));

        let start = tokio::time::Instant::now();
        client(&transport)
            .fetch_page(API, &Conditional::None)
            .await
            .expect("should succeed after waiting");
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(3_000), "waited {elapsed:?}");
        assert!(elapsed < Duration::from_millis(3_500), "waited {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_without_retry_after_uses_initial_backoff() {
        let transport = MockTransport::new();
        transport.push_response(API, response(503, vec![], ""));
        transport.push_response(API, response(200, vec![], "[]"));

        let start = tokio::time::Instant::now();
        client(&transport)
            .fetch_page(API, &Conditional::None)
            .await
            .expect("should succeed after backoff");
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(1_000), "waited {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_500), "waited {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_rate_limit_exhausts_retries() {
        let transport = MockTransport::new();
        for _ in 0..=crate::retry::MAX_RETRIES {
            transport.push_response(API, response(429, vec![], ""));
        }

        let err = client(&transport)
            .fetch_page(API, &Conditional::None)
            .await
            .expect_err("should give up");

        match err {
            GitHubError::RetriesExhausted {
                status, attempts, ..
            } => {
                assert_eq!(status, 429);
                assert_eq!(attempts, crate::retry::MAX_RETRIES + 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.requests().len(), crate::retry::MAX_RETRIES + 1);
    }

    #[tokio::test]
    async fn not_modified_is_an_empty_page_without_retries() {
        let transport = MockTransport::new();
        transport.push_response(API, response(304, vec![], ""));

        let page = client(&transport)
            .fetch_page(API, &Conditional::ETag("\"v1\"".to_string()))
            .await
            .expect("304 is not an error");

        assert!(page.is_not_modified());
        assert_eq!(page.next_url, None);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(
            transport.requests()[0].header_value("if-none-match"),
            Some("\"v1\"")
        );
    }

    #[tokio::test]
    async fn not_found_fails_immediately() {
        let transport = MockTransport::new();
        transport.push_response(API, response(404, vec![], r#"{"message":"Not Found"}"#));

        let err = client(&transport)
            .fetch_page(API, &Conditional::None)
            .await
            .expect_err("404 should fail");

        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), format!("GitHub API error: 404 for {API}"));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn successful_page_exposes_etag() {
        let transport = MockTransport::new();
        transport.push_response(API, response(200, vec![("ETag", "W/\"e1\"")], "[]"));

        let page = client(&transport)
            .fetch_page(API, &Conditional::None)
            .await
            .expect("ok");
        assert_eq!(page.etag.as_deref(), Some("W/\"e1\""));
    }

    // ─── Throttling ──────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn low_quota_pauses_until_reset() {
        let transport = MockTransport::new();
        let reset = (Utc::now().timestamp() + 10).to_string();
        transport.push_response(
            API,
            response(
                200,
                vec![("X-RateLimit-Remaining", "3"), ("X-RateLimit-Reset", reset.as_str())],
                "[]",
            ),
        );

        let start = tokio::time::Instant::now();
        client(&transport)
            .fetch_page(API, &Conditional::None)
            .await
            .expect("ok");

        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_quota_on_a_rate_limited_response_pauses_before_retrying() {
        let transport = MockTransport::new();
        let reset = (Utc::now().timestamp() + 20).to_string();
        transport.push_response(
            API,
            response(
                429,
                vec![
                    ("X-RateLimit-Remaining", "0"),
                    ("X-RateLimit-Reset", reset.as_str()),
                    ("Retry-After", "2"),
                ],
                "",
            ),
        );
        transport.push_response(API, response(200, vec![], "[]"));

        let start = tokio::time::Instant::now();
        client(&transport)
            .fetch_page(API, &Conditional::None)
            .await
            .expect("should succeed after the quota resets");
        let elapsed = start.elapsed();

        assert_eq!(transport.requests().len(), 2);
        // quota wait (reset + 1 s, minus at most a second of clock drift) plus Retry-After
        assert!(elapsed >= Duration::from_secs(22), "waited {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_quota_does_not_pause() {
        let transport = MockTransport::new();
        let reset = (Utc::now().timestamp() + 3600).to_string();
        transport.push_response(
            API,
            response(
                200,
                vec![("X-RateLimit-Remaining", "4000"), ("X-RateLimit-Reset", reset.as_str())],
                "[]",
            ),
        );

        let start = tokio::time::Instant::now();
        client(&transport)
            .fetch_page(API, &Conditional::None)
            .await
            .expect("ok");

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    // ─── Languages ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn languages_decode_byte_counts() {
        let transport = MockTransport::new();
        transport.push_response(
            format!("{API}/repos/octo/a/languages"),
            response(200, vec![], r#"{"Rust": 1200, "Shell": 30}"#),
        );

        let langs = client(&transport).languages("octo/a").await.expect("ok");
        assert_eq!(langs.repo_full_name, "octo/a");
        assert_eq!(langs.bytes.get("Rust"), Some(&1200));
        assert_eq!(langs.len(), 2);
    }

    #[tokio::test]
    async fn languages_not_modified_or_empty_is_empty_map() {
        let transport = MockTransport::new();
        let url = format!("{API}/repos/octo/a/languages");
        transport.push_response(&url, response(304, vec![], ""));
        transport.push_response(&url, response(200, vec![], ""));

        let c = client(&transport);
        assert!(c.languages("octo/a").await.expect("304").is_empty());
        assert!(c.languages("octo/a").await.expect("empty").is_empty());
    }
}
