use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::IgnoredAny;

/// A repository as reported by the hosting platform's API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoHandle {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner: Owner,
    pub html_url: String,
    pub clone_url: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub fork: bool,
    pub created_at: DateTime<Utc>,

    /// Absent for repositories that never received a push
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,

    #[serde(default = "default_branch")]
    pub default_branch: String,
}

fn default_branch() -> String {
    "master".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Minimal issue/PR info with only the fields we need
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Present, with any content, only when the issue is a pull request
    #[serde(default)]
    pub pull_request: Option<IgnoredAny>,
}

impl Issue {
    #[must_use]
    pub const fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }
}

/// One page of repository search results.
///
/// `next_page` is `0` once the listing is exhausted.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub items: Vec<RepoHandle>,
    pub next_page: u32,
}

/// One page of issues and pull requests; `next_page` is `0` on the last page
#[derive(Debug, Clone)]
pub struct IssuePage {
    pub items: Vec<Issue>,
    pub next_page: u32,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse {
    #[serde(default)]
    pub items: Vec<RepoHandle>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const TESTIFY: &str = r#"{
        "id": 1,
        "name": "testify",
        "full_name": "stretchr/testify",
        "description": "A toolkit with common assertions and mocks",
        "owner": { "login": "stretchr", "id": 2 },
        "html_url": "https://github.com/stretchr/testify",
        "clone_url": "https://github.com/stretchr/testify.git",
        "stargazers_count": 20000,
        "forks_count": 1500,
        "fork": false,
        "created_at": "2012-10-16T17:50:19Z",
        "pushed_at": "2024-05-01T10:00:00Z",
        "default_branch": "master",
        "language": "Go"
    }"#;

    #[test]
    fn test_repo_handle_deserialize() {
        let repo: RepoHandle = serde_json::from_str(TESTIFY).unwrap();
        assert_eq!(repo.name, "testify");
        assert_eq!(repo.full_name, "stretchr/testify");
        assert_eq!(repo.owner.login, "stretchr");
        assert_eq!(repo.stargazers_count, 20000);
        assert_eq!(repo.forks_count, 1500);
        assert!(!repo.fork);
        assert!(repo.pushed_at.is_some());
        assert_eq!(repo.default_branch, "master");
    }

    #[test]
    fn test_repo_handle_optional_fields() {
        let json = r#"{
            "name": "empty",
            "full_name": "acme/empty",
            "description": null,
            "owner": { "login": "acme" },
            "html_url": "https://github.com/acme/empty",
            "clone_url": "https://github.com/acme/empty.git",
            "created_at": "2024-01-01T00:00:00Z",
            "pushed_at": null
        }"#;

        let repo: RepoHandle = serde_json::from_str(json).unwrap();
        assert!(repo.description.is_none());
        assert!(repo.pushed_at.is_none());
        assert_eq!(repo.stargazers_count, 0);
        assert_eq!(repo.default_branch, "master");
    }

    #[test]
    fn test_issue_deserialize() {
        let json = r#"{
            "created_at": "2024-01-01T00:00:00Z",
            "closed_at": "2024-01-02T00:00:00Z",
            "state": "closed"
        }"#;

        let issue: Issue = serde_json::from_str(json).unwrap();
        assert!(issue.is_closed());
        assert!(!issue.is_pull_request());
    }

    #[test]
    fn test_issue_deserialize_with_pull_request() {
        let json = r#"{
            "closed_at": null,
            "state": "open",
            "pull_request": {
                "url": "https://api.github.com/repos/owner/repo/pulls/1"
            }
        }"#;

        let issue: Issue = serde_json::from_str(json).unwrap();
        assert!(!issue.is_closed());
        assert!(issue.is_pull_request());
    }

    #[test]
    fn test_issue_pull_request_marker_content_ignored() {
        let empty: Issue = serde_json::from_str(r#"{ "pull_request": {} }"#).unwrap();
        assert!(empty.is_pull_request());

        let nulled: Issue = serde_json::from_str(r#"{ "pull_request": null }"#).unwrap();
        assert!(!nulled.is_pull_request());
    }
}
