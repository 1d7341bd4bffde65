//! Hosting-platform API access.

mod client;
mod models;

pub use client::{GitHubClient, HostingApi, HostingApiResult, MAX_PER_PAGE, RateLimitInfo};
pub use models::{Issue, IssuePage, Owner, RepoHandle, SearchPage};
