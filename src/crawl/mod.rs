//! Crawl sources and the scheduler that runs them.
//!
//! A [`CrawlSource`] produces [`CrawlReport`]s into a channel shared by every source. The
//! [`Scheduler`] launches the available sources concurrently, writes each snapshot it receives to
//! the index, and parks a source for its own sleep duration whenever it reports an error or the
//! end of a pass.

mod github;
mod scheduler;
mod source;

pub use github::GitHubSource;
pub use scheduler::{DEFAULT_WAIT, Scheduler, SchedulerState};
pub use source::{CrawlReport, CrawlResult, CrawlSource, TargetedCrawl};
