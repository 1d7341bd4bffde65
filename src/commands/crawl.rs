use super::common::{Common, CommonArgs, GitHubArgs};
use clap::Parser;
use metagodoc_indexer::Result;
use metagodoc_indexer::crawl::{CrawlSource, Scheduler};
use metagodoc_indexer::index::IndexWriter;
use std::sync::Arc;

#[derive(Parser, Debug)]
pub struct CrawlArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub github: GitHubArgs,
}

/// Crawl every configured source forever, writing snapshots to the index
pub async fn run_crawl(args: &CrawlArgs) -> Result<()> {
    let common = Common::new(&args.common)?;
    let (cache_root, _lock) = common.lock_cache().await?;

    let index = common.connect_index().await?;
    let writer = Arc::new(IndexWriter::new(Arc::new(index)));

    let sources: Vec<Arc<dyn CrawlSource>> = vec![Arc::new(common.github_source(&args.github, cache_root)?)];
    let scheduler = Scheduler::new(sources, writer, common.config.result_buffer)?;

    scheduler.run().await;
    Ok(())
}
