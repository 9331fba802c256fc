//! In-memory store implementations.
//!
//! Back the storage traits with hash maps for tests and local development.
//! `MemoryBlobStore` can be told to fail specific blobs, which is how the
//! reassembly tests exercise per-part failure isolation.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{LogicalDocument, PageTag};

use super::{BlobStore, DocumentStore, StoreError, StoredBlob, TagStore};

fn poisoned() -> StoreError {
    StoreError::Backend("store lock poisoned".into())
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    failing_puts: Mutex<HashSet<String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `get` fail for this blob id from now on.
    pub fn fail_get(&self, id: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(id.to_string());
        }
    }

    /// Make `put` fail for this blob name from now on.
    pub fn fail_put(&self, name: &str) {
        if let Ok(mut failing) = self.failing_puts.lock() {
            failing.insert(name.to_string());
        }
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().map(|b| b.len()).unwrap_or(0)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, name: &str, _mime: &str, bytes: &[u8]) -> Result<StoredBlob, StoreError> {
        if self.failing_puts.lock().map_err(|_| poisoned())?.contains(name) {
            return Err(StoreError::Backend(format!("injected put failure for {name}")));
        }
        let id = format!("{name}#{}", Uuid::new_v4());
        let mut blobs = self.blobs.lock().map_err(|_| poisoned())?;
        blobs.insert(id.clone(), bytes.to_vec());
        Ok(StoredBlob {
            id,
            size: bytes.len() as u64,
        })
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        if self.failing.lock().map_err(|_| poisoned())?.contains(id) {
            return Err(StoreError::Backend(format!("injected failure for {id}")));
        }
        let blobs = self.blobs.lock().map_err(|_| poisoned())?;
        blobs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, LogicalDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, document: &LogicalDocument) -> Result<(), StoreError> {
        let mut documents = self.documents.lock().map_err(|_| poisoned())?;
        documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<LogicalDocument, StoreError> {
        let documents = self.documents.lock().map_err(|_| poisoned())?;
        documents
            .get(id)
            .filter(|d| !d.soft_deleted)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn mark_deleted(&self, id: &str) -> Result<(), StoreError> {
        let mut documents = self.documents.lock().map_err(|_| poisoned())?;
        match documents.get_mut(id) {
            Some(doc) => {
                doc.soft_deleted = true;
                Ok(())
            }
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }
}

#[derive(Default)]
pub struct MemoryTagStore {
    /// (document id, global page number) → tag value.
    tags: Mutex<HashMap<(String, u32), PageTag>>,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TagStore for MemoryTagStore {
    async fn set_page_tag(
        &self,
        document_id: &str,
        global_page_number: u32,
        tag: Option<String>,
    ) -> Result<(), StoreError> {
        let mut tags = self.tags.lock().map_err(|_| poisoned())?;
        let key = (document_id.to_string(), global_page_number);
        match tag {
            Some(value) => {
                tags.insert(key, PageTag::new(document_id, global_page_number, value));
            }
            None => {
                tags.remove(&key);
            }
        }
        Ok(())
    }

    async fn page_tags(&self, document_id: &str) -> Result<Vec<PageTag>, StoreError> {
        let tags = self.tags.lock().map_err(|_| poisoned())?;
        Ok(tags
            .values()
            .filter(|t| t.document_id == document_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blob_round_trip() {
        let store = MemoryBlobStore::new();
        let stored = store.put("report~1.pdf", "application/pdf", b"abc").await.unwrap();
        assert_eq!(stored.size, 3);
        assert_eq!(store.get(&stored.id).await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn injected_failure_only_hits_target() {
        let store = MemoryBlobStore::new();
        let a = store.put("a", "application/pdf", b"aa").await.unwrap();
        let b = store.put("b", "application/pdf", b"bb").await.unwrap();
        store.fail_get(&b.id);
        assert!(store.get(&a.id).await.is_ok());
        assert!(store.get(&b.id).await.is_err());
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let store = MemoryBlobStore::new();
        assert!(matches!(
            store.get("nope").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn soft_deleted_document_hidden_from_get() {
        let store = MemoryDocumentStore::new();
        let doc = LogicalDocument::new(
            "doc-1",
            "scan.png",
            crate::models::MediaType::Image,
            vec![crate::models::PartRef {
                sequence_index: 1,
                store_id: "blob-1".into(),
                byte_size: 100,
                page_count: 1,
                content_hash: None,
            }],
        );
        store.insert(&doc).await.unwrap();
        assert!(store.get("doc-1").await.is_ok());
        store.mark_deleted("doc-1").await.unwrap();
        assert!(matches!(
            store.get("doc-1").await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn tag_set_overwrite_and_clear() {
        let store = MemoryTagStore::new();
        store.set_page_tag("d", 3, Some("Labs".into())).await.unwrap();
        store.set_page_tag("d", 3, Some("Imaging".into())).await.unwrap();
        let tags = store.page_tags("d").await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].tag_value, "Imaging");

        store.set_page_tag("d", 3, None).await.unwrap();
        assert!(store.page_tags("d").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tags_are_scoped_per_document() {
        let store = MemoryTagStore::new();
        store.set_page_tag("d1", 1, Some("A".into())).await.unwrap();
        store.set_page_tag("d2", 1, Some("B".into())).await.unwrap();
        let tags = store.page_tags("d1").await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].tag_value, "A");
    }
}
