//! The durable shape of a logical document.
//!
//! One user-facing document may be backed by several physical parts in the
//! blob store. The `LogicalDocument` record binds them together: an ordered
//! part list with store ids, byte sizes and — crucially — per-part page
//! counts captured at split time, so page numbering never depends on a
//! successful re-fetch.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::assemble::GlobalPageIndex;

/// Media families the splitter accepts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    Image,
}

impl MediaType {
    /// Classify a declared MIME type. Anything outside PDF and raster
    /// images is rejected before any work happens.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        if mime == "application/pdf" {
            Some(Self::Pdf)
        } else if mime.starts_with("image/") {
            Some(Self::Image)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }
}

/// Input to splitting: bytes plus the caller-declared identity.
/// Consumed once; the splitter never mutates it.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub display_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(display_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            display_name: display_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn media_type(&self) -> Option<MediaType> {
        MediaType::from_mime(&self.mime_type)
    }

    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }
}

/// One physical part of a logical document, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartRef {
    /// 1-based position within the logical document.
    pub sequence_index: u32,
    /// Opaque id assigned by the blob store.
    pub store_id: String,
    pub byte_size: u64,
    /// Pages inside this part, recorded at split time.
    pub page_count: u32,
    pub content_hash: Option<String>,
}

/// The persisted record for one user-facing document.
///
/// Immutable once written, except for soft deletion. A record is only ever
/// inserted after every part it references has reached the blob store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalDocument {
    pub id: String,
    pub display_name: String,
    pub media_type: MediaType,
    pub total_size: u64,
    pub part_count: u32,
    pub part_refs: Vec<PartRef>,
    pub soft_deleted: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl LogicalDocument {
    /// Build a record from an ordered part list, deriving the counters.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        media_type: MediaType,
        part_refs: Vec<PartRef>,
    ) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            id: id.into(),
            display_name: display_name.into(),
            media_type,
            total_size: part_refs.iter().map(|p| p.byte_size).sum(),
            part_count: part_refs.len() as u32,
            part_refs,
            soft_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the structural invariants: part refs ordered by sequence
    /// index, gap-free from 1, and the denormalized counters consistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.part_refs.is_empty() {
            return Err("document has no parts".into());
        }
        for (i, part) in self.part_refs.iter().enumerate() {
            let expected = (i + 1) as u32;
            if part.sequence_index != expected {
                return Err(format!(
                    "part at position {i} has sequence index {} (expected {expected})",
                    part.sequence_index
                ));
            }
            if part.page_count == 0 {
                return Err(format!("part {expected} has zero pages"));
            }
        }
        if self.part_count as usize != self.part_refs.len() {
            return Err(format!(
                "part_count {} does not match {} part refs",
                self.part_count,
                self.part_refs.len()
            ));
        }
        let sum: u64 = self.part_refs.iter().map(|p| p.byte_size).sum();
        if self.total_size != sum {
            return Err(format!(
                "total_size {} does not match summed part sizes {sum}",
                self.total_size
            ));
        }
        Ok(())
    }

    /// Pages across all parts.
    pub fn total_pages(&self) -> usize {
        self.part_refs.iter().map(|p| p.page_count as usize).sum()
    }

    /// The global↔local page mapping derived from recorded page counts.
    pub fn page_index(&self) -> GlobalPageIndex {
        GlobalPageIndex::from_part_refs(&self.part_refs)
    }

    /// Store ids in sequence order.
    pub fn store_ids(&self) -> Vec<&str> {
        self.part_refs.iter().map(|p| p.store_id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(seq: u32, pages: u32, size: u64) -> PartRef {
        PartRef {
            sequence_index: seq,
            store_id: format!("blob-{seq}"),
            byte_size: size,
            page_count: pages,
            content_hash: None,
        }
    }

    fn doc(parts: Vec<PartRef>) -> LogicalDocument {
        let total: u64 = parts.iter().map(|p| p.byte_size).sum();
        let now = chrono::Local::now().naive_local();
        LogicalDocument {
            id: "doc-1".into(),
            display_name: "Report.pdf".into(),
            media_type: MediaType::Pdf,
            total_size: total,
            part_count: parts.len() as u32,
            part_refs: parts,
            soft_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn media_type_from_mime() {
        assert_eq!(MediaType::from_mime("application/pdf"), Some(MediaType::Pdf));
        assert_eq!(MediaType::from_mime("image/jpeg"), Some(MediaType::Image));
        assert_eq!(MediaType::from_mime("IMAGE/PNG"), Some(MediaType::Image));
        assert_eq!(MediaType::from_mime("text/html"), None);
        assert_eq!(MediaType::from_mime("application/zip"), None);
    }

    #[test]
    fn valid_document_passes() {
        let d = doc(vec![part(1, 3, 100), part(2, 2, 200)]);
        assert!(d.validate().is_ok());
        assert_eq!(d.total_pages(), 5);
    }

    #[test]
    fn sequence_gap_rejected() {
        let d = doc(vec![part(1, 3, 100), part(3, 2, 200)]);
        assert!(d.validate().is_err());
    }

    #[test]
    fn sequence_must_start_at_one() {
        let d = doc(vec![part(2, 3, 100)]);
        assert!(d.validate().is_err());
    }

    #[test]
    fn zero_page_part_rejected() {
        let d = doc(vec![part(1, 0, 100)]);
        assert!(d.validate().is_err());
    }

    #[test]
    fn counter_mismatch_rejected() {
        let mut d = doc(vec![part(1, 3, 100)]);
        d.part_count = 2;
        assert!(d.validate().is_err());
        let mut d = doc(vec![part(1, 3, 100)]);
        d.total_size += 1;
        assert!(d.validate().is_err());
    }

    #[test]
    fn empty_part_list_rejected() {
        let d = doc(vec![]);
        assert!(d.validate().is_err());
    }

    #[test]
    fn record_round_trips_through_json() {
        let d = doc(vec![part(1, 3, 100), part(2, 2, 200)]);
        let json = serde_json::to_string(&d).unwrap();
        let back: LogicalDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back.part_refs, d.part_refs);
        assert_eq!(back.media_type, MediaType::Pdf);
        assert_eq!(back.total_pages(), 5);
    }
}
