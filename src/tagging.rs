//! Per-page tags on saved documents.
//!
//! Tags attach to global page numbers, so a tag written against page 14 of
//! a nine-part document stays on the same visual page no matter how the
//! parts were cut. Range checks run against the document's recorded page
//! counts before any write reaches the store.

use thiserror::Error;
use tracing::debug;

use crate::models::{LogicalDocument, PageTag};
use crate::store::{StoreError, TagStore};

#[derive(Error, Debug)]
pub enum TagError {
    #[error("Page {page} is out of range (document has {total} pages)")]
    OutOfRange { page: u32, total: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Set or clear (`tag = None`) the tag on one global page of a saved
/// document.
pub async fn write_page_tag(
    document: &LogicalDocument,
    tags: &dyn TagStore,
    global_page_number: u32,
    tag: Option<String>,
) -> Result<(), TagError> {
    let total = document.total_pages() as u32;
    if global_page_number == 0 || global_page_number > total {
        return Err(TagError::OutOfRange {
            page: global_page_number,
            total,
        });
    }
    tags.set_page_tag(&document.id, global_page_number, tag.clone())
        .await?;
    debug!(
        document = %document.id,
        page = global_page_number,
        cleared = tag.is_none(),
        "Page tag written"
    );
    Ok(())
}

/// All tags for a document, sorted by global page number.
pub async fn load_page_tags(
    document: &LogicalDocument,
    tags: &dyn TagStore,
) -> Result<Vec<PageTag>, TagError> {
    let mut out = tags.page_tags(&document.id).await?;
    out.sort_by_key(|t| t.global_page_number);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MediaType, PartRef};
    use crate::store::MemoryTagStore;

    fn doc(page_counts: &[u32]) -> LogicalDocument {
        let refs = page_counts
            .iter()
            .enumerate()
            .map(|(i, &pages)| PartRef {
                sequence_index: (i + 1) as u32,
                store_id: format!("blob-{i}"),
                byte_size: 100,
                page_count: pages,
                content_hash: None,
            })
            .collect();
        LogicalDocument::new("doc-t", "scan.pdf", MediaType::Pdf, refs)
    }

    #[tokio::test]
    async fn tag_lands_on_global_page_across_part_boundary() {
        let store = MemoryTagStore::new();
        let d = doc(&[3, 2]);
        // Page 4 is part 2 page 1; the tag key never mentions the part.
        write_page_tag(&d, &store, 4, Some("Labs".into())).await.unwrap();
        let tags = load_page_tags(&d, &store).await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].global_page_number, 4);
        assert_eq!(tags[0].tag_value, "Labs");
    }

    #[tokio::test]
    async fn out_of_range_rejected_before_store() {
        let store = MemoryTagStore::new();
        let d = doc(&[3, 2]);
        assert!(matches!(
            write_page_tag(&d, &store, 0, Some("X".into())).await,
            Err(TagError::OutOfRange { page: 0, total: 5 })
        ));
        assert!(matches!(
            write_page_tag(&d, &store, 6, Some("X".into())).await,
            Err(TagError::OutOfRange { page: 6, total: 5 })
        ));
        assert!(load_page_tags(&d, &store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clearing_removes_the_tag() {
        let store = MemoryTagStore::new();
        let d = doc(&[4]);
        write_page_tag(&d, &store, 2, Some("Imaging".into())).await.unwrap();
        write_page_tag(&d, &store, 2, None).await.unwrap();
        assert!(load_page_tags(&d, &store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tags_come_back_sorted_by_page() {
        let store = MemoryTagStore::new();
        let d = doc(&[5]);
        write_page_tag(&d, &store, 5, Some("C".into())).await.unwrap();
        write_page_tag(&d, &store, 1, Some("A".into())).await.unwrap();
        write_page_tag(&d, &store, 3, Some("B".into())).await.unwrap();
        let pages: Vec<u32> = load_page_tags(&d, &store)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.global_page_number)
            .collect();
        assert_eq!(pages, vec![1, 3, 5]);
    }
}
