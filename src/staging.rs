//! Tag edits made before a file is saved.
//!
//! While a file sits in the upload queue it has no document id, but the
//! user can already tag its pages. `TagStaging` parks those edits under a
//! session-local staged key; when the upload lands, `promote` rewrites
//! every staged tag under the final `(document_id, global_page)` key and
//! removes the staged entries. A rename, not a copy: after promotion the
//! staged key reads as empty.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::models::LogicalDocument;
use crate::store::TagStore;
use crate::tagging::{self, TagError};

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("Unknown staged key: {0}")]
    UnknownKey(String),

    #[error(transparent)]
    Tag(#[from] TagError),
}

/// Session-owned staging area for tags on not-yet-saved files.
///
/// One instance per editing session; nothing here is shared or global, so
/// abandoning the session drops all staged edits with it.
#[derive(Debug, Default)]
pub struct TagStaging {
    counter: u32,
    /// staged key → page number → tag value.
    staged: BTreeMap<String, BTreeMap<u32, String>>,
}

impl TagStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a staged key for one queued file. Keys are stable for the
    /// session's lifetime and never reused.
    pub fn stage(&mut self) -> String {
        self.counter += 1;
        let key = format!("staged-{}", self.counter);
        self.staged.insert(key.clone(), BTreeMap::new());
        key
    }

    pub fn contains(&self, staged_key: &str) -> bool {
        self.staged.contains_key(staged_key)
    }

    /// Set or clear (`tag = None`) a tag on one page of a staged file.
    pub fn set_tag(
        &mut self,
        staged_key: &str,
        page_number: u32,
        tag: Option<String>,
    ) -> Result<(), StagingError> {
        let pages = self
            .staged
            .get_mut(staged_key)
            .ok_or_else(|| StagingError::UnknownKey(staged_key.to_string()))?;
        match tag {
            Some(value) => {
                pages.insert(page_number, value);
            }
            None => {
                pages.remove(&page_number);
            }
        }
        Ok(())
    }

    /// Staged tags for one file, in page order.
    pub fn tags_for(&self, staged_key: &str) -> Vec<(u32, &str)> {
        self.staged
            .get(staged_key)
            .map(|pages| pages.iter().map(|(&p, v)| (p, v.as_str())).collect())
            .unwrap_or_default()
    }

    /// Drop a staged file's tags without saving them.
    pub fn discard(&mut self, staged_key: &str) {
        if self.staged.remove(staged_key).is_some() {
            debug!(key = staged_key, "Staged tags discarded");
        }
    }

    /// Rewrite every tag staged under `staged_key` onto the saved
    /// document's global page numbers, then remove the staged entries.
    ///
    /// Fails before any write if the key is unknown or a staged page falls
    /// outside the document; on failure the staged entries are retained.
    pub async fn promote(
        &mut self,
        staged_key: &str,
        document: &LogicalDocument,
        tags: &dyn TagStore,
    ) -> Result<usize, StagingError> {
        let pages = self
            .staged
            .get(staged_key)
            .ok_or_else(|| StagingError::UnknownKey(staged_key.to_string()))?;

        let total = document.total_pages() as u32;
        if let Some((&page, _)) = pages.iter().find(|(&p, _)| p == 0 || p > total) {
            return Err(TagError::OutOfRange { page, total }.into());
        }

        let mut promoted = 0;
        for (&page, value) in pages {
            tagging::write_page_tag(document, tags, page, Some(value.clone())).await?;
            promoted += 1;
        }

        self.staged.remove(staged_key);
        info!(
            key = staged_key,
            document = %document.id,
            promoted,
            "Staged tags promoted to saved document"
        );
        Ok(promoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaType, PartRef};
    use crate::store::{MemoryTagStore, TagStore};

    fn doc(page_counts: &[u32]) -> LogicalDocument {
        let refs = page_counts
            .iter()
            .enumerate()
            .map(|(i, &pages)| PartRef {
                sequence_index: (i + 1) as u32,
                store_id: format!("blob-{i}"),
                byte_size: 10,
                page_count: pages,
                content_hash: None,
            })
            .collect();
        LogicalDocument::new("doc-s", "scan.pdf", MediaType::Pdf, refs)
    }

    #[test]
    fn keys_are_distinct_and_stable() {
        let mut staging = TagStaging::new();
        let a = staging.stage();
        let b = staging.stage();
        assert_eq!(a, "staged-1");
        assert_eq!(b, "staged-2");
        assert!(staging.contains(&a));
        assert!(staging.contains(&b));
    }

    #[test]
    fn set_overwrite_and_clear() {
        let mut staging = TagStaging::new();
        let key = staging.stage();
        staging.set_tag(&key, 2, Some("Labs".into())).unwrap();
        staging.set_tag(&key, 2, Some("Imaging".into())).unwrap();
        staging.set_tag(&key, 5, Some("Notes".into())).unwrap();
        staging.set_tag(&key, 5, None).unwrap();
        assert_eq!(staging.tags_for(&key), vec![(2, "Imaging")]);
    }

    #[test]
    fn unknown_key_rejected() {
        let mut staging = TagStaging::new();
        assert!(matches!(
            staging.set_tag("staged-9", 1, Some("X".into())),
            Err(StagingError::UnknownKey(_))
        ));
    }

    #[tokio::test]
    async fn promote_renames_tags_onto_the_document() {
        let store = MemoryTagStore::new();
        let mut staging = TagStaging::new();
        let key = staging.stage();
        staging.set_tag(&key, 1, Some("Cover".into())).unwrap();
        staging.set_tag(&key, 4, Some("Labs".into())).unwrap();

        let d = doc(&[3, 2]);
        let promoted = staging.promote(&key, &d, &store).await.unwrap();
        assert_eq!(promoted, 2);

        // Tags now live under the document id.
        let saved = store.page_tags("doc-s").await.unwrap();
        assert_eq!(saved.len(), 2);
        assert!(saved.iter().any(|t| t.global_page_number == 4 && t.tag_value == "Labs"));

        // Rename, not copy: the staged key is gone.
        assert!(!staging.contains(&key));
        assert!(staging.tags_for(&key).is_empty());
    }

    #[tokio::test]
    async fn promote_rejects_out_of_range_without_partial_writes() {
        let store = MemoryTagStore::new();
        let mut staging = TagStaging::new();
        let key = staging.stage();
        staging.set_tag(&key, 1, Some("A".into())).unwrap();
        staging.set_tag(&key, 9, Some("B".into())).unwrap();

        let d = doc(&[3, 2]);
        let err = staging.promote(&key, &d, &store).await.unwrap_err();
        assert!(matches!(err, StagingError::Tag(TagError::OutOfRange { page: 9, .. })));
        // Nothing hit the store, and the staged edits survive for retry.
        assert!(store.page_tags("doc-s").await.unwrap().is_empty());
        assert!(staging.contains(&key));
    }

    #[tokio::test]
    async fn discard_drops_without_saving() {
        let store = MemoryTagStore::new();
        let mut staging = TagStaging::new();
        let key = staging.stage();
        staging.set_tag(&key, 1, Some("A".into())).unwrap();
        staging.discard(&key);
        assert!(matches!(
            staging.promote(&key, &doc(&[2]), &store).await,
            Err(StagingError::UnknownKey(_))
        ));
    }
}
