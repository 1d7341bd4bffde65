//! GitHub API client
//!
//! Minimal GitHub API client for searching repositories and fetching repository and issue data.

use super::models::{Issue, IssuePage, RepoHandle, SearchPage, SearchResponse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core::fmt::Debug;
use ohno::app_err;
use regex::Regex;
use reqwest::header::{HeaderMap, LINK};
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use url::Url;

const LOG_TARGET: &str = "   hosting";

/// Largest page size the search and issue endpoints accept
pub const MAX_PER_PAGE: u32 = 100;

static NEXT_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).expect("invalid regex"));

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
}

/// Result of a hosting API call
#[derive(Debug)]
pub enum HostingApiResult<T> {
    /// Request succeeded - contains data and optional rate limit info
    Success(T, Option<RateLimitInfo>),

    /// Rate limited - should retry after reset time
    RateLimited(RateLimitInfo),

    /// The requested resource was not found (404)
    NotFound(Option<RateLimitInfo>),

    /// Request failed permanently - should NOT retry
    Failed(ohno::AppError, Option<RateLimitInfo>),
}

impl<T> HostingApiResult<T> {
    /// Collapse into a plain result, describing non-success outcomes as errors
    pub fn into_result(self) -> crate::Result<T> {
        match self {
            Self::Success(data, _) => Ok(data),
            Self::RateLimited(rate_limit) => Err(app_err!("rate limited until {}", rate_limit.reset_at)),
            Self::NotFound(_) => Err(app_err!("not found")),
            Self::Failed(e, _) => Err(e),
        }
    }
}

/// Hosting-platform API used by crawl sources and the snapshot builder.
#[async_trait]
pub trait HostingApi: Debug + Send + Sync {
    /// One page of a language-filtered repository search, pages counting from 1
    async fn search_repositories(&self, query: &str, page: u32) -> HostingApiResult<SearchPage>;

    /// One page of the issues and pull requests of a repository, in any state
    async fn list_issues(&self, owner: &str, name: &str, page: u32) -> HostingApiResult<IssuePage>;

    async fn get_repository(&self, owner: &str, name: &str) -> HostingApiResult<RepoHandle>;
}

/// [`HostingApi`] implementation for GitHub
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    per_page: u32,
}

impl GitHubClient {
    /// Create a new client with an authentication token and base URL
    pub fn new(token: &str, base_url: impl Into<String>, per_page: u32) -> crate::Result<Self> {
        use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};

        let mut auth_val = HeaderValue::from_str(&format!("token {token}"))?;
        auth_val.set_sensitive(true);

        let mut headers = HeaderMap::new();
        let _ = headers.insert(AUTHORIZATION, auth_val);
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        let client = reqwest::Client::builder()
            .user_agent(concat!("metagodoc-indexer/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        })
    }

    /// Get the base URL for this client
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make an API call and classify the result
    async fn api_call(&self, url: &str, query: &[(&str, String)]) -> HostingApiResult<reqwest::Response> {
        log::trace!(target: LOG_TARGET, "GET {url} {query:?}");

        let resp = match self.client.get(url).query(query).send().await {
            Ok(r) => r,
            Err(e) => return HostingApiResult::Failed(e.into(), None),
        };

        // Extract rate limit info from response headers before checking status
        let rate_limit = extract_rate_limit_from_headers(resp.headers());
        if let Some(info) = rate_limit {
            log::trace!(target: LOG_TARGET, "{} requests remaining until {}", info.remaining, info.reset_at);
        }

        // Check status code
        let status = resp.status();
        if status.is_success() {
            return HostingApiResult::Success(resp, rate_limit);
        }

        // Check for rate limiting (403 or 429)
        let status_code = status.as_u16();
        if matches!(status_code, 403 | 429) {
            // Rate limited - use rate limit info from headers or default to 1 hour retry
            let rate_limit = rate_limit.unwrap_or_else(|| RateLimitInfo {
                remaining: 0,
                reset_at: Utc::now() + chrono::Duration::hours(1),
            });
            return HostingApiResult::RateLimited(rate_limit);
        }

        // Check for not found (404)
        if status_code == 404 {
            return HostingApiResult::NotFound(rate_limit);
        }

        // Any other HTTP error is a permanent failure
        match resp.error_for_status() {
            Ok(_) => HostingApiResult::Failed(app_err!("unexpected HTTP status {status} from '{url}'"), rate_limit),
            Err(e) => HostingApiResult::Failed(e.into(), rate_limit),
        }
    }

    /// Make an API call and decode a JSON body, also returning the next page number from the `Link` header
    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> HostingApiResult<(T, u32)> {
        let (resp, rate_limit) = match self.api_call(url, query).await {
            HostingApiResult::Success(resp, rate_limit) => (resp, rate_limit),
            HostingApiResult::RateLimited(rate_limit) => return HostingApiResult::RateLimited(rate_limit),
            HostingApiResult::NotFound(rate_limit) => return HostingApiResult::NotFound(rate_limit),
            HostingApiResult::Failed(e, rate_limit) => return HostingApiResult::Failed(e, rate_limit),
        };

        let next_page = next_page_from_headers(resp.headers());
        match resp.json::<T>().await {
            Ok(data) => HostingApiResult::Success((data, next_page), rate_limit),
            Err(e) => HostingApiResult::Failed(e.into(), rate_limit),
        }
    }
}

#[async_trait]
impl HostingApi for GitHubClient {
    async fn search_repositories(&self, query: &str, page: u32) -> HostingApiResult<SearchPage> {
        let url = format!("{}/search/repositories", self.base_url);
        let params = [
            ("q", query.to_string()),
            ("per_page", self.per_page.to_string()),
            ("page", page.to_string()),
        ];

        match self.get_json::<SearchResponse>(&url, &params).await {
            HostingApiResult::Success((response, next_page), rate_limit) => {
                // An empty page ends the listing even if a next link is present
                let next_page = if response.items.is_empty() { 0 } else { next_page };
                HostingApiResult::Success(
                    SearchPage {
                        items: response.items,
                        next_page,
                    },
                    rate_limit,
                )
            }
            HostingApiResult::RateLimited(rate_limit) => HostingApiResult::RateLimited(rate_limit),
            HostingApiResult::NotFound(rate_limit) => HostingApiResult::NotFound(rate_limit),
            HostingApiResult::Failed(e, rate_limit) => HostingApiResult::Failed(e, rate_limit),
        }
    }

    async fn list_issues(&self, owner: &str, name: &str, page: u32) -> HostingApiResult<IssuePage> {
        let url = format!("{}/repos/{owner}/{name}/issues", self.base_url);
        let params = [
            ("state", "all".to_string()),
            ("per_page", self.per_page.to_string()),
            ("page", page.to_string()),
        ];

        match self.get_json::<Vec<Issue>>(&url, &params).await {
            HostingApiResult::Success((items, next_page), rate_limit) => {
                HostingApiResult::Success(IssuePage { items, next_page }, rate_limit)
            }
            HostingApiResult::RateLimited(rate_limit) => HostingApiResult::RateLimited(rate_limit),
            HostingApiResult::NotFound(rate_limit) => HostingApiResult::NotFound(rate_limit),
            HostingApiResult::Failed(e, rate_limit) => HostingApiResult::Failed(e, rate_limit),
        }
    }

    async fn get_repository(&self, owner: &str, name: &str) -> HostingApiResult<RepoHandle> {
        let url = format!("{}/repos/{owner}/{name}", self.base_url);
        match self.get_json::<RepoHandle>(&url, &[]).await {
            HostingApiResult::Success((repo, _), rate_limit) => HostingApiResult::Success(repo, rate_limit),
            HostingApiResult::RateLimited(rate_limit) => HostingApiResult::RateLimited(rate_limit),
            HostingApiResult::NotFound(rate_limit) => HostingApiResult::NotFound(rate_limit),
            HostingApiResult::Failed(e, rate_limit) => HostingApiResult::Failed(e, rate_limit),
        }
    }
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<usize>().ok()?;

    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;

    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}

/// Page number of the `rel="next"` link, or `0` when there is none
fn next_page_from_headers(headers: &HeaderMap) -> u32 {
    headers
        .get(LINK)
        .and_then(|value| value.to_str().ok())
        .and_then(|link| NEXT_LINK_REGEX.captures(link))
        .and_then(|captures| Url::parse(&captures[1]).ok())
        .and_then(|url| url.query_pairs().find(|(key, _)| key == "page").and_then(|(_, value)| value.parse().ok()))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_extract_rate_limit_from_headers() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

        let info = extract_rate_limit_from_headers(&headers).unwrap();
        assert_eq!(info.remaining, 42);
        assert_eq!(info.reset_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_extract_rate_limit_missing_headers() {
        let headers = HeaderMap::new();
        assert!(extract_rate_limit_from_headers(&headers).is_none());

        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("42"));
        assert!(extract_rate_limit_from_headers(&headers).is_none());
    }

    #[test]
    fn test_extract_rate_limit_invalid_values() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("lots"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));
        assert!(extract_rate_limit_from_headers(&headers).is_none());
    }

    #[test]
    fn test_next_page_from_link_header() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://api.github.com/search/repositories?q=language%3Ago&page=3>; rel="next", <https://api.github.com/search/repositories?q=language%3Ago&page=34>; rel="last""#,
            ),
        );
        assert_eq!(next_page_from_headers(&headers), 3);
    }

    #[test]
    fn test_next_page_last_page() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(
            LINK,
            HeaderValue::from_static(
                r#"<https://api.github.com/search/repositories?q=language%3Ago&page=1>; rel="first", <https://api.github.com/search/repositories?q=language%3Ago&page=33>; rel="prev""#,
            ),
        );
        assert_eq!(next_page_from_headers(&headers), 0);
        assert_eq!(next_page_from_headers(&HeaderMap::new()), 0);
    }

    #[test]
    fn test_into_result() {
        let ok: HostingApiResult<u32> = HostingApiResult::Success(7, None);
        assert_eq!(ok.into_result().unwrap(), 7);

        let limited: HostingApiResult<u32> = HostingApiResult::RateLimited(RateLimitInfo {
            remaining: 0,
            reset_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        });
        assert!(limited.into_result().unwrap_err().to_string().contains("rate limited"));

        let missing: HostingApiResult<u32> = HostingApiResult::NotFound(None);
        assert!(missing.into_result().unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_per_page_clamped() {
        let client = GitHubClient::new("token", "https://api.github.com/", 500).unwrap();
        assert_eq!(client.per_page, MAX_PER_PAGE);
        assert_eq!(client.base_url(), "https://api.github.com");
    }
}
