//! Saving a queued file: split, upload, record, promote tags.
//!
//! Parts upload strictly in sequence order. The first failure aborts the
//! remainder and no `LogicalDocument` record is written, so a record is
//! only ever visible once every part it references is in the blob store.
//! Staged tags are promoted last, after the record exists to own them.

use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::SplitConfig;
use crate::models::{LogicalDocument, PartRef, SourceDocument};
use crate::split::{split_if_needed, PageEncoder, PageRasterizer, SplitError, SplitMode};
use crate::staging::{StagingError, TagStaging};
use crate::store::{part_file_name, BlobStore, DocumentStore, StoreError, TagStore};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Split(#[from] SplitError),

    #[error("Uploading part {sequence_index} failed: {source}")]
    PartUpload {
        sequence_index: u32,
        source: StoreError,
    },

    #[error("Document record is inconsistent: {0}")]
    InvalidRecord(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tag(#[from] StagingError),
}

/// The saved document plus what came along with it.
#[derive(Debug)]
pub struct SavedDocument {
    pub document: LogicalDocument,
    pub promoted_tags: usize,
}

fn content_hash(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    base64::engine::general_purpose::STANDARD.encode(hash)
}

/// Save one queued file: split it under the byte budget, upload the parts
/// sequentially, persist the document record, then promote the file's
/// staged tags onto it.
#[allow(clippy::too_many_arguments)]
pub async fn save_staged_file<R, E>(
    source: &SourceDocument,
    staged_key: &str,
    staging: &mut TagStaging,
    rasterizer: &R,
    encoder: &E,
    blobs: &dyn BlobStore,
    documents: &dyn DocumentStore,
    tags: &dyn TagStore,
    cfg: &SplitConfig,
) -> Result<SavedDocument, UploadError>
where
    R: PageRasterizer + ?Sized,
    E: PageEncoder + ?Sized,
{
    let outcome = split_if_needed(source, rasterizer, encoder, cfg)?;

    let part_mime = match outcome.mode {
        SplitMode::Single | SplitMode::SplitPdf => "application/pdf",
        SplitMode::SingleImage => source.mime_type.as_str(),
        SplitMode::CompressedImage => "image/jpeg",
    };

    let mut part_refs = Vec::with_capacity(outcome.parts.len());
    for (i, part) in outcome.parts.iter().enumerate() {
        let sequence_index = (i + 1) as u32;
        // Single-part saves keep the original file name.
        let name = if outcome.is_split() {
            part_file_name(&source.display_name, sequence_index)
        } else {
            source.display_name.clone()
        };
        let stored = blobs.put(&name, part_mime, &part.bytes).await.map_err(|e| {
            error!(
                file = %source.display_name,
                part = sequence_index,
                total_parts = outcome.parts.len(),
                error = %e,
                "Part upload failed; aborting remaining parts"
            );
            UploadError::PartUpload {
                sequence_index,
                source: e,
            }
        })?;
        part_refs.push(PartRef {
            sequence_index,
            store_id: stored.id,
            byte_size: stored.size,
            page_count: part.page_count as u32,
            content_hash: Some(content_hash(&part.bytes)),
        });
    }

    let media_type = source
        .media_type()
        .ok_or_else(|| SplitError::UnsupportedMediaType(source.mime_type.clone()))?;
    let document = LogicalDocument::new(
        Uuid::new_v4().to_string(),
        &source.display_name,
        media_type,
        part_refs,
    );
    document
        .validate()
        .map_err(UploadError::InvalidRecord)?;

    documents.insert(&document).await?;

    let promoted_tags = if staging.contains(staged_key) {
        staging.promote(staged_key, &document, tags).await?
    } else {
        0
    };

    info!(
        file = %source.display_name,
        document = %document.id,
        parts = document.part_count,
        pages = document.total_pages(),
        promoted_tags,
        "File saved"
    );

    Ok(SavedDocument {
        document,
        promoted_tags,
    })
}
