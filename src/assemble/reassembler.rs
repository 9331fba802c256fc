//! Fetching a split document back for viewing.
//!
//! Parts are fetched through the bounded-concurrency limiter, each under
//! its own timeout. A failed or timed-out part becomes a placeholder span
//! rather than sinking the whole document: recorded page counts keep the
//! global numbering intact so the surviving pages render at their correct
//! positions.

use std::time::Instant;

use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::ReassembleConfig;
use crate::models::{LogicalDocument, MediaType, PartRef};
use crate::split::PageRasterizer;
use crate::store::BlobStore;

use super::limiter::map_ordered;
use super::page_index::GlobalPageIndex;
use super::AssembleError;

/// One part's fetch result, page counts preserved either way.
#[derive(Debug)]
pub enum PartPayload {
    Loaded {
        sequence_index: u32,
        page_count: u32,
        bytes: Vec<u8>,
    },
    Failed {
        sequence_index: u32,
        page_count: u32,
        error: AssembleError,
    },
}

impl PartPayload {
    pub fn sequence_index(&self) -> u32 {
        match self {
            Self::Loaded { sequence_index, .. } | Self::Failed { sequence_index, .. } => {
                *sequence_index
            }
        }
    }

    pub fn page_count(&self) -> u32 {
        match self {
            Self::Loaded { page_count, .. } | Self::Failed { page_count, .. } => *page_count,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// A document fetched for viewing: parts in sequence order, some possibly
/// failed, plus the page index rebuilt from recorded counts.
pub struct AssembledDocument {
    pub document_id: String,
    pub parts: Vec<PartPayload>,
    pub page_index: GlobalPageIndex,
}

/// What one global page slot shows: real content from a loaded part, or a
/// placeholder when its part could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSlot {
    /// Page is available in a loaded part.
    Available {
        global_page_number: u32,
        sequence_index: u32,
        page_in_part: u32,
    },
    /// Page belongs to a failed part; shown as a placeholder.
    Unavailable {
        global_page_number: u32,
        sequence_index: u32,
    },
}

impl PageSlot {
    pub fn global_page_number(&self) -> u32 {
        match self {
            Self::Available { global_page_number, .. }
            | Self::Unavailable { global_page_number, .. } => *global_page_number,
        }
    }
}

/// One entry of a rendered view: pixels for available pages, placeholders
/// for everything that could not be fetched or rendered.
pub enum RenderedPage {
    Rendered {
        global_page_number: u32,
        image: image::DynamicImage,
    },
    Placeholder {
        global_page_number: u32,
        sequence_index: u32,
    },
}

impl RenderedPage {
    pub fn global_page_number(&self) -> u32 {
        match self {
            Self::Rendered { global_page_number, .. }
            | Self::Placeholder { global_page_number, .. } => *global_page_number,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }
}

impl AssembledDocument {
    pub fn total_pages(&self) -> u32 {
        self.page_index.total_pages()
    }

    pub fn loaded_part_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_loaded()).count()
    }

    pub fn failed_part_count(&self) -> usize {
        self.parts.len() - self.loaded_part_count()
    }

    /// Bytes of a loaded part by sequence index, if it loaded.
    pub fn part_bytes(&self, sequence_index: u32) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.sequence_index() == sequence_index)
            .and_then(|p| match p {
                PartPayload::Loaded { bytes, .. } => Some(bytes.as_slice()),
                PartPayload::Failed { .. } => None,
            })
    }

    /// Rasterize every available page in global order, emitting a
    /// placeholder for each page of a failed part. A page that fails to
    /// render degrades to a placeholder on its own, like its part would.
    pub fn render_view<R: PageRasterizer + ?Sized>(
        &self,
        rasterizer: &R,
        dpi: u32,
    ) -> Vec<RenderedPage> {
        self.page_slots()
            .into_iter()
            .map(|slot| match slot {
                PageSlot::Available {
                    global_page_number,
                    sequence_index,
                    page_in_part,
                } => {
                    let rendered = self.part_bytes(sequence_index).and_then(|bytes| {
                        rasterizer
                            .rasterize_page(bytes, page_in_part as usize, dpi)
                            .map_err(|e| {
                                warn!(
                                    page = global_page_number,
                                    part = sequence_index,
                                    error = %e,
                                    "Page render failed; rendering placeholder"
                                );
                            })
                            .ok()
                    });
                    match rendered {
                        Some(page) => RenderedPage::Rendered {
                            global_page_number,
                            image: page.image,
                        },
                        None => RenderedPage::Placeholder {
                            global_page_number,
                            sequence_index,
                        },
                    }
                }
                PageSlot::Unavailable {
                    global_page_number,
                    sequence_index,
                } => RenderedPage::Placeholder {
                    global_page_number,
                    sequence_index,
                },
            })
            .collect()
    }

    /// Every global page slot in order, placeholders included. This is the
    /// continuous page sequence a viewer walks.
    pub fn page_slots(&self) -> Vec<PageSlot> {
        let mut slots = Vec::with_capacity(self.total_pages() as usize);
        let mut global = 0u32;
        for part in &self.parts {
            for page_in_part in 1..=part.page_count() {
                global += 1;
                slots.push(match part {
                    PartPayload::Loaded { sequence_index, .. } => PageSlot::Available {
                        global_page_number: global,
                        sequence_index: *sequence_index,
                        page_in_part,
                    },
                    PartPayload::Failed { sequence_index, .. } => PageSlot::Unavailable {
                        global_page_number: global,
                        sequence_index: *sequence_index,
                    },
                });
            }
        }
        slots
    }
}

/// Fetch every part of `document` from the blob store, bounded by
/// `cfg.max_concurrent`, isolating per-part failures.
///
/// Loaded PDF parts are checked against their recorded page counts; on a
/// mismatch the recorded count stays authoritative for numbering and the
/// discrepancy is logged.
pub async fn reassemble(
    document: &LogicalDocument,
    blobs: &dyn BlobStore,
    rasterizer: &dyn PageRasterizer,
    cfg: &ReassembleConfig,
) -> Result<AssembledDocument, AssembleError> {
    if document.part_refs.is_empty() {
        return Err(AssembleError::Empty);
    }

    let started = Instant::now();
    let parts: Vec<PartRef> = document.part_refs.clone();

    let payloads = map_ordered(parts, cfg.max_concurrent, |part| async move {
        fetch_part(blobs, part, cfg).await
    })
    .await;

    if document.media_type == MediaType::Pdf {
        for payload in &payloads {
            let PartPayload::Loaded { sequence_index, page_count, bytes } = payload else {
                continue;
            };
            match rasterizer.page_count(bytes) {
                Ok(decoded) if decoded as u32 != *page_count => warn!(
                    part = sequence_index,
                    recorded = page_count,
                    decoded,
                    "Part page count drifted from record; recorded count stays authoritative"
                ),
                Err(e) => warn!(
                    part = sequence_index,
                    error = %e,
                    "Could not decode part for page count check"
                ),
                Ok(_) => {}
            }
        }
    }

    let assembled = AssembledDocument {
        document_id: document.id.clone(),
        page_index: GlobalPageIndex::from_part_refs(&document.part_refs),
        parts: payloads,
    };

    info!(
        document = %document.id,
        parts = assembled.parts.len(),
        failed = assembled.failed_part_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Document reassembled"
    );

    Ok(assembled)
}

async fn fetch_part(blobs: &dyn BlobStore, part: PartRef, cfg: &ReassembleConfig) -> PartPayload {
    let fetched = timeout(cfg.part_timeout, blobs.get(&part.store_id)).await;

    match fetched {
        Ok(Ok(bytes)) => PartPayload::Loaded {
            sequence_index: part.sequence_index,
            page_count: part.page_count,
            bytes,
        },
        Ok(Err(e)) => {
            warn!(
                part = part.sequence_index,
                store_id = %part.store_id,
                error = %e,
                "Part fetch failed; rendering placeholder span"
            );
            PartPayload::Failed {
                sequence_index: part.sequence_index,
                page_count: part.page_count,
                error: AssembleError::PartFetch {
                    sequence_index: part.sequence_index,
                    reason: e.to_string(),
                },
            }
        }
        Err(_) => {
            warn!(
                part = part.sequence_index,
                timeout_s = cfg.part_timeout.as_secs(),
                "Part fetch timed out; rendering placeholder span"
            );
            PartPayload::Failed {
                sequence_index: part.sequence_index,
                page_count: part.page_count,
                error: AssembleError::PartTimeout {
                    sequence_index: part.sequence_index,
                    seconds: cfg.part_timeout.as_secs(),
                },
            }
        }
    }
}
