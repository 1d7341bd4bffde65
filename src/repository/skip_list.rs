use super::RepoId;
use crate::Result;
use std::collections::HashSet;

/// Repositories that are never crawled, such as books, slide decks, or trees with malformed sources.
///
/// Built once from configuration and shared immutably.
#[derive(Debug, Clone, Default)]
pub struct SkipList(HashSet<RepoId>);

impl SkipList {
    /// Build a skip list from repository URLs or IDs
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        entries
            .into_iter()
            .map(|entry| RepoId::from_url_str(entry.as_ref()))
            .collect::<Result<HashSet<_>>>()
            .map(Self)
    }

    #[must_use]
    pub fn contains(&self, id: &RepoId) -> bool {
        self.0.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_regardless_of_scheme() {
        let skip = SkipList::new(["github.com/qiniu/gobook", "https://github.com/adonovan/gopl.io"]).unwrap();
        assert_eq!(skip.len(), 2);
        assert!(skip.contains(&RepoId::from_url_str("https://github.com/qiniu/gobook").unwrap()));
        assert!(skip.contains(&RepoId::from_url_str("http://github.com/adonovan/gopl.io").unwrap()));
        assert!(!skip.contains(&RepoId::from_url_str("https://github.com/stretchr/testify").unwrap()));
    }

    #[test]
    fn test_empty() {
        let skip = SkipList::default();
        assert!(skip.is_empty());
        assert!(!skip.contains(&RepoId::from_url_str("github.com/golang/go").unwrap()));
    }

    #[test]
    fn test_invalid_entry_rejected() {
        let _ = SkipList::new(["https://"]).unwrap_err();
    }
}
