//! Tunables for splitting and reassembly.
//!
//! Defaults track the transport path this crate was built for: parts must
//! stay under common serverless payload caps (~4.5 MB), so the ceiling is
//! set a little lower to leave room for multipart framing.

use std::time::Duration;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default per-part byte ceiling (~4.2 MiB).
pub const DEFAULT_MAX_PART_BYTES: usize = 4_404_019;

/// Default render resolution for re-packed pages.
pub const DEFAULT_RENDER_DPI: u32 = 120;

/// Default JPEG quality on the 0–1 scale.
pub const DEFAULT_JPEG_QUALITY: f32 = 0.72;

/// Parameters driving [`split_if_needed`](crate::split::split_if_needed)
/// and the single-page fitter.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Hard ceiling for one finalized part.
    pub max_part_bytes: usize,
    /// Starting render resolution for PDF pages.
    pub dpi: u32,
    /// Starting JPEG quality (0–1).
    pub jpeg_quality: f32,
    /// Fitter: lowest quality tried before dropping resolution.
    pub quality_floor: f32,
    /// Fitter: quality decrement per retry.
    pub quality_step: f32,
    /// Fitter: quality after a resolution drop (capped at `jpeg_quality`).
    pub quality_reset: f32,
    /// Fitter: lowest resolution tried before giving up.
    pub dpi_floor: u32,
    /// Fitter: resolution multiplier per drop.
    pub dpi_scale: f32,
    /// Oversized bitmaps wider than this are downscaled first.
    pub image_max_width: u32,
    /// Bitmap compression: starting quality.
    pub image_quality_start: f32,
    /// Bitmap compression: quality decrement per retry.
    pub image_quality_step: f32,
    /// Bitmap compression: lowest quality tried.
    pub image_quality_floor: f32,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            max_part_bytes: DEFAULT_MAX_PART_BYTES,
            dpi: DEFAULT_RENDER_DPI,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            quality_floor: 0.4,
            quality_step: 0.1,
            quality_reset: 0.6,
            dpi_floor: 80,
            dpi_scale: 0.85,
            image_max_width: 2600,
            image_quality_start: 0.85,
            image_quality_step: 0.05,
            image_quality_floor: 0.5,
        }
    }
}

/// Parameters driving [`reassemble`](crate::assemble::reassemble).
#[derive(Debug, Clone)]
pub struct ReassembleConfig {
    /// Maximum parts fetched/decoded concurrently.
    pub max_concurrent: usize,
    /// Per-part fetch deadline; a timed-out part degrades to placeholders.
    pub part_timeout: Duration,
}

impl Default for ReassembleConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            part_timeout: Duration::from_secs(30),
        }
    }
}
