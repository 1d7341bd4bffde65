use super::source::{CrawlReport, CrawlResult, CrawlSource, TargetedCrawl};
use crate::hosting::{HostingApi, RepoHandle, SearchPage};
use crate::repository::{BuildOutcome, RepoId, SnapshotBuilder};
use async_trait::async_trait;
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;
use ohno::{EnrichableExt, app_err};
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

const LOG_TARGET: &str = "   crawler";

const GITHUB_HOST: &str = "github.com";

/// A [`CrawlSource`] backed by GitHub's repository search.
///
/// Each pass walks the search results page by page, building a snapshot for every repository
/// not on the skip list. When the listing runs out the cursor is reset so the next pass starts
/// again from the first page.
#[derive(Debug)]
pub struct GitHubSource {
    name: Arc<str>,
    query: String,
    sleep: Duration,
    hosting: Arc<dyn HostingApi>,
    builder: Arc<SnapshotBuilder>,

    /// Next search page to fetch; `0` once the listing is exhausted
    next_page: AtomicU32,
}

impl GitHubSource {
    #[must_use]
    pub fn new(query: impl Into<String>, sleep: Duration, hosting: Arc<dyn HostingApi>, builder: Arc<SnapshotBuilder>) -> Self {
        Self {
            name: Arc::from("github"),
            query: query.into(),
            sleep,
            hosting,
            builder,
            next_page: AtomicU32::new(1),
        }
    }

    async fn send(&self, sink: &mpsc::Sender<CrawlReport>, result: CrawlResult) -> bool {
        let report = CrawlReport {
            source: Arc::clone(&self.name),
            result,
        };

        if sink.send(report).await.is_err() {
            log::warn!(target: LOG_TARGET, "Result channel closed, stopping source '{}'", self.name);
            return false;
        }

        true
    }

    /// Build one candidate, translating the outcome into a crawl result
    async fn crawl_handle(&self, handle: &RepoHandle) -> CrawlResult {
        match self.builder.build(handle).await {
            Ok(BuildOutcome::Snapshot(snapshot)) => CrawlResult::Snapshot(snapshot),
            Ok(BuildOutcome::Skip) => CrawlResult::Skip,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not crawl '{}': {e:#}", handle.html_url);
                CrawlResult::error(e)
            }
        }
    }

    async fn fetch_page(&self, page: u32) -> crate::Result<SearchPage> {
        self.hosting
            .search_repositories(&self.query, page)
            .await
            .into_result()
            .map_err(|e| e.enrich_with(|| format!("could not fetch page {page} of '{}'", self.query)))
    }
}

#[async_trait]
impl CrawlSource for GitHubSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn sleep_duration(&self) -> Duration {
        self.sleep
    }

    async fn crawl_all(&self, sink: &mpsc::Sender<CrawlReport>) {
        loop {
            let page = self.next_page.load(Ordering::Acquire);
            if page == 0 {
                log::info!(target: LOG_TARGET, "Source '{}' finished a pass", self.name);
                self.next_page.store(1, Ordering::Release);
                let _ = self.send(sink, CrawlResult::exhausted(&self.name)).await;
                return;
            }

            log::debug!(target: LOG_TARGET, "Fetching page {page} of '{}'", self.query);

            let listing = match self.fetch_page(page).await {
                Ok(listing) => listing,
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "{e:#}");
                    let _ = self.send(sink, CrawlResult::error(e)).await;
                    return;
                }
            };

            log::debug!(target: LOG_TARGET, "Page {page} has {} repositories", listing.items.len());

            for handle in &listing.items {
                // Skip-listed candidates are dropped without a result
                let result = self.crawl_handle(handle).await;
                if matches!(result, CrawlResult::Skip) {
                    continue;
                }

                if !self.send(sink, result).await {
                    return;
                }
            }

            self.next_page.store(listing.next_page, Ordering::Release);
        }
    }

    async fn crawl_one(&self, locator: &Url) -> TargetedCrawl {
        if locator.host_str() != Some(GITHUB_HOST) {
            return TargetedCrawl::NotSupported;
        }

        let mut segments = locator.path_segments().into_iter().flatten().filter(|s| !s.is_empty());
        let (Some(owner), Some(name)) = (segments.next(), segments.next()) else {
            return TargetedCrawl::Done(CrawlResult::error(app_err!("'{locator}' does not name a repository")));
        };
        let name = name.trim_end_matches(".git");

        let id = match RepoId::from_url_str(&format!("{GITHUB_HOST}/{owner}/{name}")) {
            Ok(id) => id,
            Err(e) => return TargetedCrawl::Done(CrawlResult::error(e)),
        };

        if self.builder.is_skipped(&id) {
            log::info!(target: LOG_TARGET, "Skipping '{id}', it is on the skip list");
            return TargetedCrawl::Done(CrawlResult::Skip);
        }

        let handle = match self.hosting.get_repository(owner, name).await.into_result() {
            Ok(handle) => handle,
            Err(e) => {
                return TargetedCrawl::Done(CrawlResult::error(
                    e.enrich_with(|| format!("could not fetch repository metadata for '{id}'")),
                ));
            }
        };

        TargetedCrawl::Done(self.crawl_handle(&handle).await)
    }
}
