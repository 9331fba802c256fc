pub mod encode;
pub mod fitter;
pub mod packer;
pub mod raster;
pub mod splitter;

pub use encode::*;
pub use fitter::*;
pub use packer::*;
pub use raster::*;
pub use splitter::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Unsupported media type: {0} (only PDF and raster images are accepted)")]
    UnsupportedMediaType(String),

    #[error("Page {page} cannot be compressed under the byte budget at floor settings")]
    Uncompressible { page: usize },

    #[error("PDF is password-protected — please decrypt it first")]
    EncryptedPdf,

    #[error("Rendering failed on page {page}: {reason}")]
    Raster { page: usize, reason: String },

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Part assembly error: {0}")]
    Packing(String),
}
