//! Global page addressing across parts.
//!
//! A split document reads as one continuous sequence of pages; tags and UI
//! page numbers use the global number, while rendering needs the part and
//! the page's position inside it. The index converts between the two using
//! the page counts recorded at split time, never a re-fetch of part bytes.

use crate::models::PartRef;

use super::AssembleError;

/// Position of a page inside a specific part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalPage {
    /// 1-based sequence index of the owning part.
    pub sequence_index: u32,
    /// 1-based page number within that part.
    pub page_in_part: u32,
}

/// Bijective map between global page numbers and per-part positions.
///
/// Built from recorded page counts; parts with zero pages are not
/// representable (`LogicalDocument::validate` rejects them upstream).
#[derive(Debug, Clone)]
pub struct GlobalPageIndex {
    /// Cumulative page count before each part: `starts[i]` is the number of
    /// pages in parts `1..=i`. `starts[0] == 0`.
    starts: Vec<u32>,
}

impl GlobalPageIndex {
    pub fn from_page_counts(counts: &[u32]) -> Self {
        let mut starts = Vec::with_capacity(counts.len() + 1);
        let mut total = 0u32;
        starts.push(0);
        for &c in counts {
            total += c;
            starts.push(total);
        }
        Self { starts }
    }

    pub fn from_part_refs(parts: &[PartRef]) -> Self {
        let counts: Vec<u32> = parts.iter().map(|p| p.page_count).collect();
        Self::from_page_counts(&counts)
    }

    pub fn part_count(&self) -> usize {
        self.starts.len() - 1
    }

    pub fn total_pages(&self) -> u32 {
        *self.starts.last().unwrap_or(&0)
    }

    /// Global page number of `page_in_part` within part `sequence_index`
    /// (both 1-based).
    pub fn to_global(&self, sequence_index: u32, page_in_part: u32) -> Result<u32, AssembleError> {
        let part = sequence_index as usize;
        if part == 0 || part > self.part_count() || page_in_part == 0 {
            return Err(AssembleError::PageOutOfRange {
                page: page_in_part,
                total: self.total_pages(),
            });
        }
        let pages_in_part = self.starts[part] - self.starts[part - 1];
        if page_in_part > pages_in_part {
            return Err(AssembleError::PageOutOfRange {
                page: page_in_part,
                total: self.total_pages(),
            });
        }
        Ok(self.starts[part - 1] + page_in_part)
    }

    /// Part and in-part position of a global page number (1-based).
    pub fn to_local(&self, global_page: u32) -> Result<LocalPage, AssembleError> {
        if global_page == 0 || global_page > self.total_pages() {
            return Err(AssembleError::PageOutOfRange {
                page: global_page,
                total: self.total_pages(),
            });
        }
        // partition_point: first part whose cumulative count reaches the page.
        let part = self.starts.partition_point(|&s| s < global_page);
        Ok(LocalPage {
            sequence_index: part as u32,
            page_in_part: global_page - self.starts[part - 1],
        })
    }
}
