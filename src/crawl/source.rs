use crate::repository::RepositorySnapshot;
use async_trait::async_trait;
use core::fmt::Debug;
use core::time::Duration;
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// Outcome of crawling one candidate repository
#[derive(Debug, Clone)]
pub enum CrawlResult {
    /// A freshly built snapshot, ready to be written to the index
    Snapshot(Box<RepositorySnapshot>),

    /// The source failed or ran out of candidates
    Error {
        error: Arc<ohno::AppError>,

        /// Set when the source finished a full pass rather than failing
        exhausted: bool,
    },

    /// Nothing to do for this candidate
    Skip,
}

impl CrawlResult {
    #[must_use]
    pub fn error(error: ohno::AppError) -> Self {
        Self::Error {
            error: Arc::new(error),
            exhausted: false,
        }
    }

    #[must_use]
    pub fn exhausted(source: &str) -> Self {
        Self::Error {
            error: Arc::new(ohno::app_err!("source '{source}' is exhausted")),
            exhausted: true,
        }
    }
}

/// A result tagged with the name of the source that produced it
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub source: Arc<str>,
    pub result: CrawlResult,
}

/// Outcome of [`CrawlSource::crawl_one`]
#[derive(Debug, Clone)]
pub enum TargetedCrawl {
    /// The source cannot fetch the given locator
    NotSupported,
    Done(CrawlResult),
}

/// A pluggable producer of candidate repositories from one hosting platform.
#[async_trait]
pub trait CrawlSource: Debug + Send + Sync {
    /// Stable identifier used for logging and backoff bookkeeping
    fn name(&self) -> &str;

    /// How long the source sleeps after it errors or finishes a pass
    fn sleep_duration(&self) -> Duration;

    /// Run until the candidate listing is exhausted or fails, sending every result to `sink`.
    ///
    /// The sink is shared with other sources and must not be closed by this call.
    async fn crawl_all(&self, sink: &mpsc::Sender<CrawlReport>);

    /// Crawl a single repository identified by `locator`, out of band with any pass in progress
    async fn crawl_one(&self, locator: &Url) -> TargetedCrawl;
}
