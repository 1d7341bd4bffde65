mod common;
mod crawl;
mod crawl_one;
mod create_index;
mod init;

pub use crawl::{CrawlArgs, run_crawl};
pub use crawl_one::{CrawlOneArgs, run_crawl_one};
pub use create_index::{CreateIndexArgs, create_index};
pub use init::{InitArgs, init_config};
