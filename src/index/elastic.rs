//! Search index access over the Elasticsearch document API.

use super::schema::mapping_json;
use crate::Result;
use crate::repository::{RepoId, RepositorySnapshot};
use async_trait::async_trait;
use core::fmt::Debug;
use ohno::{IntoAppError, app_err, bail};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use url::Url;

pub(super) const LOG_TARGET: &str = "     index";

/// The document store written by the indexer and read by the downstream API.
#[async_trait]
pub trait SearchIndex: Debug + Send + Sync {
    async fn exists(&self, id: &RepoId) -> Result<bool>;

    /// Fetch the current document for `id`, or `None` when there is none
    async fn get(&self, id: &RepoId) -> Result<Option<RepositorySnapshot>>;

    /// Write `doc` as the whole document for `id`, replacing whatever was there
    async fn index(&self, id: &RepoId, doc: &RepositorySnapshot) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(rename = "_source")]
    source: Option<RepositorySnapshot>,
}

/// [`SearchIndex`] implementation for an Elasticsearch-compatible server
#[derive(Debug, Clone)]
pub struct ElasticIndex {
    client: reqwest::Client,
    base_url: Url,
    index: String,
}

impl ElasticIndex {
    /// Connect to the server at `url`, failing if it cannot be reached
    pub async fn connect(url: &str, index: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(url).into_app_err_with(|| format!("invalid index URL '{url}'"))?;
        if base_url.cannot_be_a_base() {
            bail!("invalid index URL '{url}'");
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("metagodoc-indexer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let this = Self {
            client,
            base_url,
            index: index.into(),
        };

        let _ = this
            .request(Method::GET, &[])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .into_app_err_with(|| format!("search index at '{url}' is unreachable"))?;

        log::info!(target: LOG_TARGET, "Connected to search index at '{url}'");
        Ok(this)
    }

    /// Name of the index documents are written to
    #[must_use]
    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Create the index with the repository mapping.
    ///
    /// An existing index is deleted first when `recreate` is set, otherwise its presence is an error.
    pub async fn create_index(&self, recreate: bool) -> Result<()> {
        let index = self.index.as_str();
        let resp = self.request(Method::HEAD, &[index]).send().await?;
        if resp.status().is_success() {
            if !recreate {
                bail!("index '{index}' already exists");
            }

            log::info!(target: LOG_TARGET, "Deleting index '{index}'");
            let _ = self
                .request(Method::DELETE, &[index])
                .send()
                .await?
                .error_for_status()
                .into_app_err_with(|| format!("could not delete index '{index}'"))?;
        }

        log::info!(target: LOG_TARGET, "Creating index '{index}'");
        let body = serde_json::json!({ "mappings": mapping_json() });
        let _ = self
            .request(Method::PUT, &[index])
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .into_app_err_with(|| format!("could not create index '{index}'"))?;

        Ok(())
    }

    fn doc_url(&self, id: &RepoId) -> Url {
        self.url(&[self.index.as_str(), "_doc", id.as_str()])
    }

    /// Append percent-encoded `segments` to the base URL
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            let _ = path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> reqwest::RequestBuilder {
        let url = self.url(segments);
        log::trace!(target: LOG_TARGET, "{method} {url}");
        self.client.request(method, url)
    }
}

#[async_trait]
impl SearchIndex for ElasticIndex {
    async fn exists(&self, id: &RepoId) -> Result<bool> {
        let url = self.doc_url(id);
        log::trace!(target: LOG_TARGET, "HEAD {url}");

        let resp = self.client.head(url).send().await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(app_err!("unexpected HTTP status {status} checking for '{id}'")),
        }
    }

    async fn get(&self, id: &RepoId) -> Result<Option<RepositorySnapshot>> {
        let url = self.doc_url(id);
        log::trace!(target: LOG_TARGET, "GET {url}");

        let resp = self.client.get(url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: GetResponse = resp.error_for_status()?.json().await?;
        Ok(body.source)
    }

    async fn index(&self, id: &RepoId, doc: &RepositorySnapshot) -> Result<()> {
        let url = self.doc_url(id);
        log::trace!(target: LOG_TARGET, "PUT {url}");

        let _ = self.client.put(url).json(doc).send().await?.error_for_status()?;
        Ok(())
    }
}
