//! Setup shared by the commands: logging, configuration, the cache root and the collaborators built from them.

use camino::Utf8PathBuf;
use clap::{Args, ValueEnum};
use metagodoc_indexer::Result;
use metagodoc_indexer::cache::{CacheLockGuard, acquire_cache_lock, prepare_cache_root};
use metagodoc_indexer::config::Config;
use metagodoc_indexer::crawl::GitHubSource;
use metagodoc_indexer::hosting::{GitHubClient, HostingApi};
use metagodoc_indexer::index::{ElasticIndex, INDEX_LOG_TARGET};
use metagodoc_indexer::repository::{BuilderOptions, GoDocExtractor, SnapshotBuilder};
use ohno::{IntoAppError, app_err, bail};
use std::path::PathBuf;
use std::sync::Arc;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and above messages
    Debug,
    /// All messages including trace
    Trace,
}

/// Arguments shared by every command that talks to the index
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Path to configuration file [default: metagodoc.toml, if present]
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Log every request sent to the search index
    #[arg(long)]
    pub trace_index: bool,
}

/// Arguments for commands that crawl GitHub
#[derive(Args, Debug)]
pub struct GitHubArgs {
    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "METAGODOC_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
}

#[derive(Debug)]
pub struct Common {
    pub config: Config,
}

impl Common {
    /// Initialize logging and load the configuration
    pub fn new(args: &CommonArgs) -> Result<Self> {
        init_logging(args.log_level, args.trace_index);

        let cwd = std::env::current_dir().into_app_err("unable to determine the working directory")?;
        let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|p| app_err!("working directory '{}' is not valid UTF-8", p.display()))?;
        let config = Config::load(&cwd, args.config.as_ref())?;

        Ok(Self { config })
    }

    /// Prepare the cache root and take the process-wide cache lock
    pub async fn lock_cache(&self) -> Result<(PathBuf, CacheLockGuard)> {
        let root = self.config.cache_root()?;
        let _ = prepare_cache_root(&root)?;
        let guard = acquire_cache_lock(&root).await?;
        Ok((root, guard))
    }

    pub async fn connect_index(&self) -> Result<ElasticIndex> {
        ElasticIndex::connect(&self.config.index.url, self.config.index.name.clone()).await
    }

    /// Build the GitHub crawl source and everything behind it
    pub fn github_source(&self, args: &GitHubArgs, cache_root: PathBuf) -> Result<GitHubSource> {
        let Some(token) = args.github_token.as_deref().filter(|t| !t.is_empty()) else {
            bail!("a GitHub token is required, pass --github-token or set METAGODOC_GITHUB_TOKEN");
        };

        let github = &self.config.github;
        let hosting: Arc<dyn HostingApi> = Arc::new(GitHubClient::new(token, github.api_url.as_str(), github.per_page)?);

        let builder = SnapshotBuilder::new(
            Arc::clone(&hosting),
            Arc::new(GoDocExtractor),
            Arc::new(self.config.skip_list()?),
            BuilderOptions {
                cache_root,
                core_repository: self.config.core_repository_id()?,
                git_timeout: self.config.git_timeout,
            },
        );

        Ok(GitHubSource::new(github.query.as_str(), github.sleep, hosting, Arc::new(builder)))
    }
}

/// Initialize logger based on log level
fn init_logging(log_level: LogLevel, trace_index: bool) {
    let level = match log_level {
        LogLevel::None if !trace_index => return,
        LogLevel::None => "off",
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    let mut builder = env_logger::Builder::from_env(env);
    let _ = builder
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace) || trace_index);

    if trace_index {
        let _ = builder.filter_module(INDEX_LOG_TARGET, log::LevelFilter::Trace);
    }

    builder.init();
}
