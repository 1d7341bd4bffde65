//! Selection of the refs that get materialised for each repository.

use core::cmp::Ordering;
use regex::Regex;
use std::sync::LazyLock;

/// Maximum number of version tags materialised per repository, in addition to the default branch
pub const MAX_VERSION_TAGS: usize = 3;

static VERSION_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^v?([0-9]+(?:\.[0-9]+)*)$").expect("invalid regex"));
static CORE_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^go([0-9]+(?:\.[0-9]+)*)$").expect("invalid regex"));

/// Which tag naming scheme a repository uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagScheme {
    /// `1.2.3` or `v1.2.3`
    Standard,

    /// The core distribution's `go1.2.3` tags
    Core,
}

/// A dotted numeric version parsed from a tag name.
///
/// Missing trailing components compare as zero, so `1.2` and `1.2.0` are equal.
#[derive(Debug, Clone)]
pub struct TagVersion(Vec<u64>);

impl TagVersion {
    /// Parse a tag name under the given scheme, returning `None` for tags that are not versions
    #[must_use]
    pub fn parse(tag: &str, scheme: TagScheme) -> Option<Self> {
        let regex = match scheme {
            TagScheme::Standard => &*VERSION_TAG_REGEX,
            TagScheme::Core => &*CORE_TAG_REGEX,
        };

        let digits = regex.captures(tag)?.get(1)?.as_str();
        digits.split('.').map(|part| part.parse::<u64>().ok()).collect::<Option<Vec<_>>>().map(Self)
    }

    #[must_use]
    pub fn components(&self) -> &[u64] {
        &self.0
    }
}

impl PartialEq for TagVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TagVersion {}

impl PartialOrd for TagVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TagVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| {
                let a = self.0.get(i).copied().unwrap_or(0);
                let b = other.0.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Pick the version tags to materialise: the [`MAX_VERSION_TAGS`] highest matching tags, in ascending order.
///
/// Tags that do not match the scheme are ignored. Distinct tags that parse to the same version (`v1.0` and `1.0`)
/// are all candidates; ties are ordered by name so the selection is stable.
#[must_use]
pub fn select_version_tags<S: AsRef<str>>(tags: &[S], scheme: TagScheme) -> Vec<String> {
    let mut versions: Vec<(TagVersion, &str)> = tags
        .iter()
        .map(AsRef::as_ref)
        .filter_map(|tag| TagVersion::parse(tag, scheme).map(|v| (v, tag)))
        .collect();

    versions.sort_by(|(va, ta), (vb, tb)| va.cmp(vb).then_with(|| ta.cmp(tb)));

    let skip = versions.len().saturating_sub(MAX_VERSION_TAGS);
    versions.into_iter().skip(skip).map(|(_, tag)| tag.to_string()).collect()
}
