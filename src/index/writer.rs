use super::elastic::{LOG_TARGET, SearchIndex};
use crate::Result;
use crate::repository::RepositorySnapshot;
use ohno::EnrichableExt;
use std::sync::Arc;

/// Writes whole snapshots to a [`SearchIndex`], keyed by repository ID.
#[derive(Debug, Clone)]
pub struct IndexWriter {
    index: Arc<dyn SearchIndex>,
}

impl IndexWriter {
    #[must_use]
    pub const fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// Replace the document for the snapshot's ID with the snapshot.
    ///
    /// There is no merge with the previous document. A failure to reach the index, whether while
    /// checking for the document or writing it, fails the call.
    pub async fn upsert(&self, snapshot: &RepositorySnapshot) -> Result<()> {
        let id = &snapshot.id;

        let exists = self
            .index
            .exists(id)
            .await
            .map_err(|e| e.enrich_with(|| format!("could not check the index for '{id}'")))?;

        if exists {
            log::debug!(target: LOG_TARGET, "Replacing document for '{id}'");
        } else {
            log::debug!(target: LOG_TARGET, "Creating document for '{id}'");
        }

        self.index
            .index(id, snapshot)
            .await
            .map_err(|e| e.enrich_with(|| format!("could not write '{id}' to the index")))?;

        log::info!(target: LOG_TARGET, "Indexed '{id}' with {} refs", snapshot.refs.len());
        Ok(())
    }
}
