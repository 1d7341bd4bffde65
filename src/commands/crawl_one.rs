use super::common::{Common, CommonArgs, GitHubArgs};
use clap::Parser;
use metagodoc_indexer::Result;
use metagodoc_indexer::crawl::{CrawlResult, CrawlSource, TargetedCrawl};
use metagodoc_indexer::index::IndexWriter;
use ohno::bail;
use std::sync::Arc;
use url::Url;

#[derive(Parser, Debug)]
pub struct CrawlOneArgs {
    /// Web URL of the repository, e.g. https://github.com/stretchr/testify
    #[arg(value_name = "URL")]
    pub url: Url,

    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub github: GitHubArgs,
}

/// Crawl a single repository and write its snapshot to the index
pub async fn run_crawl_one(args: &CrawlOneArgs) -> Result<()> {
    let common = Common::new(&args.common)?;
    let (cache_root, _lock) = common.lock_cache().await?;

    let index = common.connect_index().await?;
    let writer = IndexWriter::new(Arc::new(index));
    let source = common.github_source(&args.github, cache_root)?;

    match source.crawl_one(&args.url).await {
        TargetedCrawl::NotSupported => bail!("no crawl source supports '{}'", args.url),
        TargetedCrawl::Done(CrawlResult::Skip) => {
            println!("Skipped {}, it is on the skip list", args.url);
            Ok(())
        }
        TargetedCrawl::Done(CrawlResult::Error { error, .. }) => bail!("could not crawl '{}': {error:#}", args.url),
        TargetedCrawl::Done(CrawlResult::Snapshot(snapshot)) => {
            writer.upsert(&snapshot).await?;
            println!("Indexed {} ({}, {} refs)", snapshot.id, snapshot.status, snapshot.refs.len());
            Ok(())
        }
    }
}
