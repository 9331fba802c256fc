//! Storage abstractions.
//!
//! Three narrow async traits sit between the document logic and whatever
//! backend holds the bytes and records. Production wires these to remote
//! storage; tests use the in-memory implementations in [`memory`].

pub mod memory;

pub use memory::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{LogicalDocument, PageTag};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A stored blob's identity and size, as reported by the backend.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub id: String,
    pub size: u64,
}

/// Raw byte storage for part files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `name`, returning the backend's identity for it.
    async fn put(&self, name: &str, mime: &str, bytes: &[u8]) -> Result<StoredBlob, StoreError>;

    /// Fetch a blob by the identity `put` returned.
    async fn get(&self, id: &str) -> Result<Vec<u8>, StoreError>;
}

/// Persistence for logical document records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, document: &LogicalDocument) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<LogicalDocument, StoreError>;

    /// Soft delete: the record stays, listings hide it.
    async fn mark_deleted(&self, id: &str) -> Result<(), StoreError>;
}

/// Persistence for per-page tags, keyed by document and global page number.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Set or clear (`tag = None`) the tag on one global page.
    async fn set_page_tag(
        &self,
        document_id: &str,
        global_page_number: u32,
        tag: Option<String>,
    ) -> Result<(), StoreError>;

    /// All tags for a document, in no particular order.
    async fn page_tags(&self, document_id: &str) -> Result<Vec<PageTag>, StoreError>;
}

/// Name for the part at `sequence_index` of a multi-part file; single-part
/// saves keep the original name.
///
/// `report.pdf` → `report~1.pdf`, `report~2.pdf`, … The `~` keeps the parts
/// sortable next to the stem and survives storage backends that mangle
/// other punctuation.
pub fn part_file_name(source_name: &str, sequence_index: u32) -> String {
    match source_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}~{sequence_index}.{ext}"),
        _ => format!("{source_name}~{sequence_index}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_names_keep_stem_and_extension() {
        assert_eq!(part_file_name("report.pdf", 1), "report~1.pdf");
        assert_eq!(part_file_name("report.pdf", 12), "report~12.pdf");
        assert_eq!(part_file_name("lab.results.pdf", 2), "lab.results~2.pdf");
    }

    #[test]
    fn part_names_without_extension() {
        assert_eq!(part_file_name("scan", 3), "scan~3");
        assert_eq!(part_file_name(".hidden", 1), ".hidden~1");
    }
}
