//! Configuration file handling.

use crate::Result;
use crate::hosting::MAX_PER_PAGE;
use crate::repository::{RepoId, SkipList};
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use directories::BaseDirs;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use url::Url;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../default_config.toml");

/// Name of the configuration file looked for in the working directory
pub const CONFIG_FILE_NAME: &str = "metagodoc.toml";

/// Environment variable overriding the default cache root
pub const CACHE_ROOT_ENV: &str = "METAGODOC_ROOT";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory holding repository clones [default: `$METAGODOC_ROOT`, else the platform cache directory]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_root: Option<Utf8PathBuf>,

    /// Repository ID of the Go distribution
    #[serde(default = "default_core_repository")]
    pub core_repository: String,

    /// Capacity of the channel shared by all crawl sources
    #[serde(default = "default_result_buffer")]
    pub result_buffer: usize,

    /// Longest any single git command may run
    #[serde(default = "default_git_timeout", with = "humantime_serde")]
    pub git_timeout: Duration,

    /// Repositories that are never crawled, as URLs or IDs
    #[serde(default)]
    pub skip_list: Vec<String>,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub github: GitHubConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    #[serde(default = "default_index_url")]
    pub url: String,

    #[serde(default = "default_index_name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_query")]
    pub query: String,

    /// How long the source sleeps after a finished pass or an error
    #[serde(default = "default_sleep", with = "humantime_serde")]
    pub sleep: Duration,

    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_core_repository() -> String {
    "github.com/golang/go".to_string()
}

const fn default_result_buffer() -> usize {
    32
}

const fn default_git_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_index_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index_name() -> String {
    "metagodoc-repository".to_string()
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_query() -> String {
    "language:go".to_string()
}

const fn default_sleep() -> Duration {
    Duration::from_secs(15 * 60)
}

const fn default_per_page() -> u32 {
    MAX_PER_PAGE
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            name: default_index_name(),
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            query: default_query(),
            sleep: default_sleep(),
            per_page: default_per_page(),
        }
    }
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `metagodoc.toml` in `base_dir` is used when present.
    pub fn load(base_dir: &Utf8Path, config_path: Option<&Utf8PathBuf>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.clone(), text)
        } else {
            let path = base_dir.join(CONFIG_FILE_NAME);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Ok(Self::default());
                }
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{final_path}'"))?;
        config.validate()?;

        Ok(config)
    }

    /// Save the default configuration to a TOML file, comments included
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Check values that deserialize fine but cannot work
    pub fn validate(&self) -> Result<()> {
        if self.result_buffer == 0 {
            return Err(app_err!("result_buffer must be at least 1"));
        }

        if !(1..=MAX_PER_PAGE).contains(&self.github.per_page) {
            return Err(app_err!(
                "github.per_page must be between 1 and {MAX_PER_PAGE}, got {}",
                self.github.per_page
            ));
        }

        let _ = Url::parse(&self.index.url).into_app_err_with(|| format!("index.url '{}' is not a valid URL", self.index.url))?;
        let _ = Url::parse(&self.github.api_url).into_app_err_with(|| format!("github.api_url '{}' is not a valid URL", self.github.api_url))?;

        if self.index.name.is_empty() {
            return Err(app_err!("index.name must not be empty"));
        }

        let _ = self.core_repository_id()?;
        let _ = self.skip_list()?;

        Ok(())
    }

    /// Resolve the cache root: the configured directory, else `$METAGODOC_ROOT`, else the platform cache directory
    pub fn cache_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.cache_root {
            return Ok(root.as_std_path().to_path_buf());
        }

        if let Some(root) = std::env::var_os(CACHE_ROOT_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(root));
        }

        Ok(BaseDirs::new()
            .into_app_err("Failed to determine cache directory")?
            .cache_dir()
            .join("metagodoc"))
    }

    pub fn core_repository_id(&self) -> Result<RepoId> {
        RepoId::from_url_str(&self.core_repository)
    }

    pub fn skip_list(&self) -> Result<SkipList> {
        SkipList::new(&self.skip_list)
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}
