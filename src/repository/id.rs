use crate::Result;
use core::fmt::{Display, Formatter};
use ohno::bail;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static SCHEME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^https?://").expect("invalid regex"));

/// Stable identity of a crawled repository.
///
/// The ID is the repository's canonical web URL with the scheme stripped, so
/// `https://github.com/stretchr/testify` becomes `github.com/stretchr/testify`. It doubles as the
/// search index key and as the relative location of the repository's local clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(String);

impl RepoId {
    /// Derive an ID from a canonical repository URL.
    ///
    /// Applying this to an already-derived ID yields the same ID.
    pub fn from_url_str(url: &str) -> Result<Self> {
        let stripped = SCHEME_REGEX.replace(url.trim(), "");
        let id = stripped.trim_end_matches('/');

        if id.is_empty() {
            bail!("cannot derive a repository ID from '{url}'");
        }

        Ok(Self(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RepoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RepoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
