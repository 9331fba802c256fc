//! Reading side: global page addressing and bounded-concurrency part
//! fetching, with per-part failure isolation.

pub mod limiter;
pub mod page_index;
pub mod reassembler;

pub use limiter::*;
pub use page_index::*;
pub use reassembler::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("Part {sequence_index} could not be fetched: {reason}")]
    PartFetch { sequence_index: u32, reason: String },

    #[error("Part {sequence_index} timed out after {seconds}s")]
    PartTimeout { sequence_index: u32, seconds: u64 },

    #[error("Global page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("Document has no parts to assemble")]
    Empty,
}
