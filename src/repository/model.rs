use super::{ActivityStatus, RepoId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// One fully recomputed repository document, as written to the search index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub id: RepoId,
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub owner: String,

    /// Version-control system of the mirror, always `git`
    pub vcs: String,

    pub primary_url: String,
    pub issues: Tickets,
    pub pull_requests: Tickets,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub last_crawled: DateTime<Utc>,
    pub stars: u64,
    pub forks: u64,
    pub is_fork: bool,
    pub status: ActivityStatus,
    pub about: Option<About>,

    /// Default branch first, then selected version tags in ascending version order
    pub refs: Vec<Ref>,
}

impl RepositorySnapshot {
    /// The default-branch ref, which every snapshot carries exactly once
    #[must_use]
    pub fn default_ref(&self) -> Option<&Ref> {
        self.refs.iter().find(|r| r.is_default_branch)
    }
}

/// Open/closed counts for issues or pull requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tickets {
    pub open: u64,
    pub closed: u64,
    pub url: String,
}

/// README content found at the top of the default branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct About {
    pub content: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RefType {
    Branch,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ref {
    pub name: String,
    pub ref_type: RefType,
    pub is_default_branch: bool,
    pub last_seen_commit: String,
    pub last_updated: DateTime<Utc>,
    pub packages: Vec<Package>,
}

/// Package metadata produced by a [`super::DocExtractor`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub import_path: String,
    pub synopsis: String,
    pub doc: String,
    pub browse_url: String,

    /// Problems found while reading the package, such as conflicting package clauses
    pub errors: Vec<String>,

    pub is_command: bool,
    pub files: Vec<String>,
    pub test_files: Vec<String>,
    pub x_test_files: Vec<String>,
    pub imports: Vec<String>,
    pub test_imports: Vec<String>,
    pub x_test_imports: Vec<String>,
    pub consts: Vec<Declaration>,
    pub vars: Vec<Declaration>,
    pub funcs: Vec<Declaration>,
    pub types: Vec<Declaration>,
    pub examples: Vec<Declaration>,
    pub notes: Vec<Note>,
}

/// A named, documented top-level declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub doc: String,
    pub file: String,
}

/// A marked note such as `BUG(uid): body`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub kind: String,
    pub uid: String,
    pub body: String,
}
