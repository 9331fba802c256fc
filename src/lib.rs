//! Byte-bounded document splitting and reassembly.
//!
//! Large PDFs and scans are cut into parts that each stay under a hard
//! byte ceiling: pages are rendered, re-encoded as JPEG, and packed into
//! standalone per-part PDFs, degrading quality then resolution when a
//! single page will not fit. The parts of one source file stay bound
//! together as a [`models::LogicalDocument`] whose pages keep one
//! continuous global numbering, which is also what per-page tags key on.
//! Reading back fetches parts with bounded concurrency and renders
//! placeholders for parts that fail, never losing page positions.

pub mod assemble;
pub mod config;
pub mod models;
pub mod split;
pub mod staging;
pub mod store;
pub mod tagging;
pub mod uploader;

pub use assemble::{reassemble, AssembledDocument, GlobalPageIndex};
pub use config::{ReassembleConfig, SplitConfig};
pub use models::{LogicalDocument, PageTag, PartRef, SourceDocument};
pub use split::{split_if_needed, SplitError, SplitOutcome};
pub use staging::TagStaging;
pub use uploader::{save_staged_file, SavedDocument, UploadError};
