use super::git::Git;
use super::packages::{PackageTree, discover_packages};
use super::readme::find_readme;
use super::refs::{TagScheme, select_version_tags};
use super::status::{ForkInfo, SAMPLED_COMMITS, classify};
use super::{About, DocExtractor, Ref, RefType, RepoId, RepositorySnapshot, SkipList, Tickets};
use crate::Result;
use crate::cache::clone_path;
use crate::hosting::{HostingApi, RepoHandle};
use chrono::Utc;
use core::time::Duration;
use ohno::{EnrichableExt, bail};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

const LOG_TARGET: &str = "  snapshot";

/// What a build produced
#[derive(Debug)]
pub enum BuildOutcome {
    Snapshot(Box<RepositorySnapshot>),

    /// The repository is on the skip list; nothing was done
    Skip,
}

/// Settings for a [`SnapshotBuilder`]
#[derive(Debug, Clone)]
pub struct BuilderOptions {
    pub cache_root: PathBuf,

    /// ID of the core distribution, which uses its own tag scheme and source layout
    pub core_repository: RepoId,

    pub git_timeout: Duration,
}

/// Turns a remote repository handle into a fully classified, package-enumerated snapshot.
///
/// Builds of the same repository ID are serialised so that only one of them touches the shared
/// working clone at a time. Builds of different repositories proceed independently.
#[derive(Debug)]
pub struct SnapshotBuilder {
    hosting: Arc<dyn HostingApi>,
    extractor: Arc<dyn DocExtractor>,
    skip_list: Arc<SkipList>,
    cache_root: PathBuf,
    core_repository: RepoId,
    git: Git,
    gates: Mutex<HashMap<RepoId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SnapshotBuilder {
    #[must_use]
    pub fn new(hosting: Arc<dyn HostingApi>, extractor: Arc<dyn DocExtractor>, skip_list: Arc<SkipList>, options: BuilderOptions) -> Self {
        Self {
            hosting,
            extractor,
            skip_list,
            cache_root: options.cache_root,
            core_repository: options.core_repository,
            git: Git::new(options.git_timeout),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Derive the stable ID of a remote repository from its canonical web URL
    pub fn repo_id(handle: &RepoHandle) -> Result<RepoId> {
        RepoId::from_url_str(&handle.html_url)
    }

    #[must_use]
    pub fn is_skipped(&self, id: &RepoId) -> bool {
        self.skip_list.contains(id)
    }

    /// Build a fresh snapshot of one repository.
    ///
    /// Skip-listed repositories return [`BuildOutcome::Skip`] without any network or VCS work.
    pub async fn build(&self, handle: &RepoHandle) -> Result<BuildOutcome> {
        let id = Self::repo_id(handle)?;

        if self.is_skipped(&id) {
            log::info!(target: LOG_TARGET, "Skipping '{id}', it is on the skip list");
            return Ok(BuildOutcome::Skip);
        }

        log::info!(target: LOG_TARGET, "Indexing '{id}'");
        let start_time = std::time::Instant::now();

        let gate = self.gate(&id);
        let guarded = {
            let _guard = gate.lock().await;
            self.build_from_clone(&id, handle).await
        };
        drop(gate);
        self.release_gate(&id);

        let (status, about, refs) = guarded?;

        let (issues, pull_requests) = self
            .tickets(handle)
            .await
            .map_err(|e| e.enrich_with(|| format!("fetching issues for '{id}'")))?;

        let snapshot = RepositorySnapshot {
            name: handle.name.clone(),
            full_name: handle.full_name.clone(),
            description: handle.description.clone().unwrap_or_default(),
            owner: handle.owner.login.clone(),
            vcs: "git".to_string(),
            primary_url: handle.html_url.clone(),
            issues,
            pull_requests,
            created: handle.created_at,
            last_updated: handle.pushed_at.unwrap_or(handle.created_at),
            last_crawled: Utc::now(),
            stars: handle.stargazers_count,
            forks: handle.forks_count,
            is_fork: handle.fork,
            status,
            about,
            refs,
            id,
        };

        log::info!(
            target: LOG_TARGET,
            "Built '{}' ({}, {} refs) in {:.3}s",
            snapshot.id,
            snapshot.status,
            snapshot.refs.len(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(BuildOutcome::Snapshot(Box::new(snapshot)))
    }

    /// Mirror, classify and materialise refs; runs while holding the ID's gate
    async fn build_from_clone(&self, id: &RepoId, handle: &RepoHandle) -> Result<(super::ActivityStatus, Option<About>, Vec<Ref>)> {
        let clone_dir = clone_path(&self.cache_root, id);
        let is_core = *id == self.core_repository;

        self.git
            .mirror(&handle.clone_url, &clone_dir)
            .await
            .map_err(|e| e.enrich_with(|| format!("mirroring '{id}'")))?;

        let default_branch = handle.default_branch.as_str();
        let commits = self
            .git
            .commit_log(&clone_dir, &format!("origin/{default_branch}"), SAMPLED_COMMITS)
            .await
            .map_err(|e| e.enrich_with(|| format!("reading history of '{id}'")))?;

        let fork = ForkInfo {
            is_fork: handle.fork,
            created: handle.created_at,
            pushed: handle.pushed_at,
        };
        let status = classify(&commits, &fork, Utc::now());
        log::debug!(target: LOG_TARGET, "'{id}' is {status}");

        let tags = self
            .git
            .list_tags(&clone_dir)
            .await
            .map_err(|e| e.enrich_with(|| format!("listing tags of '{id}'")))?;
        let scheme = if is_core { TagScheme::Core } else { TagScheme::Standard };
        let versions = select_version_tags(&tags, scheme);

        // Checkouts share one working tree, so refs are materialised strictly one at a time
        let mut refs = Vec::with_capacity(versions.len() + 1);
        let (default_ref, about) = self
            .materialize(id, handle, &clone_dir, default_branch, RefType::Branch, is_core)
            .await
            .map_err(|e| e.enrich_with(|| format!("materialising branch '{default_branch}' of '{id}'")))?;
        refs.push(default_ref);

        for tag in &versions {
            let (tag_ref, _) = self
                .materialize(id, handle, &clone_dir, tag, RefType::Tag, is_core)
                .await
                .map_err(|e| e.enrich_with(|| format!("materialising tag '{tag}' of '{id}'")))?;
            refs.push(tag_ref);
        }

        Ok((status, about, refs))
    }

    async fn materialize(
        &self,
        id: &RepoId,
        handle: &RepoHandle,
        clone_dir: &Path,
        name: &str,
        ref_type: RefType,
        is_core: bool,
    ) -> Result<(Ref, Option<About>)> {
        log::debug!(target: LOG_TARGET, "Checking out {ref_type} '{name}' of '{id}'");

        let target = match ref_type {
            RefType::Branch => {
                self.git.fetch_branch(clone_dir, name).await?;
                format!("origin/{name}")
            }
            RefType::Tag => format!("refs/tags/{name}"),
        };
        self.git.checkout(clone_dir, &target).await?;

        let Some(head) = self.git.commit_log(clone_dir, "HEAD", 1).await?.into_iter().next() else {
            bail!("'{name}' has no commits");
        };

        let is_default_branch = ref_type == RefType::Branch && name == handle.default_branch;
        let tree = PackageTree {
            clone_dir: clone_dir.to_path_buf(),
            id: id.clone(),
            html_url: handle.html_url.clone(),
            ref_name: name.to_string(),
            is_core,
        };
        let extractor = Arc::clone(&self.extractor);

        let (packages, about) = tokio::task::spawn_blocking(move || {
            let about = if is_default_branch { find_readme(&tree.clone_dir)? } else { None };
            let packages = discover_packages(&tree, extractor.as_ref())?;
            Ok::<_, ohno::AppError>((packages, about))
        })
        .await??;

        log::debug!(target: LOG_TARGET, "Found {} packages in {ref_type} '{name}' of '{id}'", packages.len());

        let git_ref = Ref {
            name: name.to_string(),
            ref_type,
            is_default_branch,
            last_seen_commit: head.hash,
            last_updated: head.when,
            packages,
        };

        Ok((git_ref, about))
    }

    /// Count open and closed issues and pull requests across every page
    async fn tickets(&self, handle: &RepoHandle) -> Result<(Tickets, Tickets)> {
        let html_url = handle.html_url.trim_end_matches('/');
        let mut issues = Tickets {
            url: format!("{html_url}/issues"),
            ..Tickets::default()
        };
        let mut pull_requests = Tickets {
            url: format!("{html_url}/pulls"),
            ..Tickets::default()
        };

        let mut page = 1;
        while page != 0 {
            let listing = self.hosting.list_issues(&handle.owner.login, &handle.name, page).await.into_result()?;

            for issue in &listing.items {
                let tickets = if issue.is_pull_request() { &mut pull_requests } else { &mut issues };
                if issue.is_closed() {
                    tickets.closed += 1;
                } else {
                    tickets.open += 1;
                }
            }

            page = listing.next_page;
        }

        Ok((issues, pull_requests))
    }

    fn gate(&self, id: &RepoId) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(id.clone()).or_default())
    }

    /// Drop the gate for an ID once no build holds or waits on it
    fn release_gate(&self, id: &RepoId) {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        if gates.get(id).is_some_and(|gate| Arc::strong_count(gate) == 1) {
            let _ = gates.remove(id);
        }
    }

    #[cfg(test)]
    fn gate_count(&self) -> usize {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosting::{HostingApiResult, Issue, IssuePage, Owner, SearchPage};
    use crate::repository::GoDocExtractor;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingHosting {
        calls: AtomicUsize,
        pages: Vec<Vec<Issue>>,
    }

    #[async_trait]
    impl HostingApi for CountingHosting {
        async fn search_repositories(&self, _query: &str, _page: u32) -> HostingApiResult<SearchPage> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            HostingApiResult::NotFound(None)
        }

        async fn list_issues(&self, _owner: &str, _name: &str, page: u32) -> HostingApiResult<IssuePage> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            let index = usize::try_from(page).unwrap() - 1;
            let next_page = if index + 1 < self.pages.len() { page + 1 } else { 0 };
            HostingApiResult::Success(
                IssuePage {
                    items: self.pages.get(index).cloned().unwrap_or_default(),
                    next_page,
                },
                None,
            )
        }

        async fn get_repository(&self, _owner: &str, _name: &str) -> HostingApiResult<RepoHandle> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            HostingApiResult::NotFound(None)
        }
    }

    fn handle(html_url: &str) -> RepoHandle {
        RepoHandle {
            name: "widgets".into(),
            full_name: "acme/widgets".into(),
            description: None,
            owner: Owner { login: "acme".into() },
            html_url: html_url.into(),
            clone_url: "file:///nonexistent/widgets.git".into(),
            stargazers_count: 0,
            forks_count: 0,
            fork: false,
            created_at: DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
            pushed_at: None,
            default_branch: "main".into(),
        }
    }

    fn issue(closed: bool, pull_request: bool) -> Issue {
        serde_json::from_value(serde_json::json!({
            "closed_at": if closed { Some("2024-01-01T00:00:00Z") } else { None },
            "pull_request": if pull_request { Some(serde_json::json!({})) } else { None },
        }))
        .unwrap()
    }

    fn builder(hosting: Arc<CountingHosting>, cache_root: &Path, skip: &[&str]) -> SnapshotBuilder {
        SnapshotBuilder::new(
            hosting,
            Arc::new(GoDocExtractor),
            Arc::new(SkipList::new(skip).unwrap()),
            BuilderOptions {
                cache_root: cache_root.to_path_buf(),
                core_repository: RepoId::from_url_str("github.com/golang/go").unwrap(),
                git_timeout: Duration::from_secs(30),
            },
        )
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_skip_listed_does_no_work() {
        let tmp = tempfile::tempdir().unwrap();
        let hosting = Arc::new(CountingHosting::default());
        let builder = builder(Arc::clone(&hosting), tmp.path(), &["github.com/acme/widgets"]);

        let outcome = builder.build(&handle("https://github.com/acme/widgets")).await.unwrap();
        assert!(matches!(outcome, BuildOutcome::Skip));
        assert_eq!(hosting.calls.load(Ordering::SeqCst), 0);
        assert!(!tmp.path().join("repos").exists());
        assert_eq!(builder.gate_count(), 0);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_mirror_failure_names_repository() {
        let tmp = tempfile::tempdir().unwrap();
        let hosting = Arc::new(CountingHosting::default());
        let builder = builder(Arc::clone(&hosting), tmp.path(), &[]);

        // An existing directory that is not a clone fails the mirror step
        std::fs::create_dir_all(tmp.path().join("repos/github.com/acme/widgets")).unwrap();

        let error_msg = format!("{:#}", builder.build(&handle("https://github.com/acme/widgets")).await.unwrap_err());
        assert!(error_msg.contains("github.com/acme/widgets"));
        assert_eq!(builder.gate_count(), 0);
    }

    #[tokio::test]
    async fn test_tickets_partitioned_across_pages() {
        let tmp = tempfile::tempdir().unwrap();
        let hosting = Arc::new(CountingHosting {
            calls: AtomicUsize::new(0),
            pages: vec![
                vec![issue(false, false), issue(true, false), issue(false, true)],
                vec![issue(true, true), issue(true, true), issue(false, false)],
            ],
        });
        let builder = builder(Arc::clone(&hosting), tmp.path(), &[]);

        let (issues, pull_requests) = builder.tickets(&handle("https://github.com/acme/widgets/")).await.unwrap();
        assert_eq!(issues.open, 2);
        assert_eq!(issues.closed, 1);
        assert_eq!(issues.url, "https://github.com/acme/widgets/issues");
        assert_eq!(pull_requests.open, 1);
        assert_eq!(pull_requests.closed, 2);
        assert_eq!(pull_requests.url, "https://github.com/acme/widgets/pulls");
        assert_eq!(hosting.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_repo_id_from_handle() {
        let id = SnapshotBuilder::repo_id(&handle("https://github.com/acme/widgets")).unwrap();
        assert_eq!(id.as_str(), "github.com/acme/widgets");
    }
}
