//! Crawls public Go repositories and publishes their documentation metadata to a search index.
//!
//! # Overview
//!
//! `metagodoc-indexer` discovers Go repositories through the GitHub search API, keeps a full
//! working clone of each one under a local cache root, and writes one document per repository
//! to an Elasticsearch-compatible index. Each document records the repository's activity
//! status, its default branch plus up to three of its most recent version tags, and the
//! packages found in each of those refs.
//!
//! # Quick Start
//!
//! Create the index and start crawling:
//!
//! ```bash
//! metagodoc-indexer create-index
//! METAGODOC_GITHUB_TOKEN=... metagodoc-indexer crawl
//! ```
//!
//! The `crawl` command runs until the process is stopped. A crawl source that errors or
//! finishes a pass sleeps for its configured interval and is then started again.
//!
//! Re-crawl one repository immediately:
//!
//! ```bash
//! metagodoc-indexer crawl-one https://github.com/stretchr/testify
//! ```
//!
//! # Configuration
//!
//! Settings are read from `metagodoc.toml` in the working directory, or from the file given
//! with `--config`. Generate a commented default file with:
//!
//! ```bash
//! metagodoc-indexer init
//! ```
//!
//! The cache root defaults to `$METAGODOC_ROOT`, falling back to the platform cache directory.
//! Only one indexer may use a cache root at a time.
//!
//! # Logging
//!
//! Use `--log-level` to choose how much is logged, or `RUST_LOG` for finer control.
//! `--trace-index` logs every request sent to the search index.

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use metagodoc_indexer::Result;

mod commands;

use crate::commands::{
    CrawlArgs, CrawlOneArgs, CreateIndexArgs, InitArgs, create_index, init_config, run_crawl, run_crawl_one,
};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "metagodoc-indexer", version, about, long_about = None)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl all sources forever, writing snapshots to the search index
    Crawl(Box<CrawlArgs>),
    /// Crawl a single repository now
    CrawlOne(Box<CrawlOneArgs>),
    /// Create the search index with the repository mapping
    CreateIndex(CreateIndexArgs),
    /// Generate a default configuration file
    Init(InitArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    match &Cli::parse().command {
        Command::Crawl(args) => run_crawl(args).await,
        Command::CrawlOne(args) => run_crawl_one(args).await,
        Command::CreateIndex(args) => create_index(args).await,
        Command::Init(args) => init_config(args),
    }
}
