//! Split orchestration.
//!
//! Drives rasterize → encode → pack across the pages of one source
//! document, producing an ordered list of byte-bounded parts. Documents
//! already under the budget pass through untouched (no needless quality
//! loss); oversized bitmaps are recompressed in place rather than split.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use tracing::{debug, info};

use super::encode::{jpeg_quality_scale, EncodedPage, PageEncoder};
use super::fitter::fit_single_page;
use super::packer::{FinalizedPart, PartBuilder, TryPush};
use super::raster::PageRasterizer;
use super::SplitError;
use crate::config::SplitConfig;
use crate::models::{MediaType, SourceDocument};

/// How the source was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMode {
    /// Already under budget; passed through byte-identical.
    Single,
    /// PDF flattened and chunked into multiple parts.
    SplitPdf,
    /// Image under budget; passed through byte-identical.
    SingleImage,
    /// Image recompressed to fit the budget; still one part.
    CompressedImage,
}

/// Ordered parts plus how they came to be.
#[derive(Debug)]
pub struct SplitOutcome {
    pub parts: Vec<FinalizedPart>,
    pub mode: SplitMode,
    pub total_bytes: usize,
}

impl SplitOutcome {
    pub fn is_split(&self) -> bool {
        self.parts.len() > 1
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Per-part page counts in sequence order.
    pub fn page_counts(&self) -> Vec<usize> {
        self.parts.iter().map(|p| p.page_count).collect()
    }

    fn from_parts(parts: Vec<FinalizedPart>, mode: SplitMode) -> Self {
        let total_bytes = parts.iter().map(|p| p.byte_size()).sum();
        Self { parts, mode, total_bytes }
    }
}

/// Split or compress `source` so every resulting part fits
/// `cfg.max_part_bytes`. The returned order is the part sequence order.
pub fn split_if_needed<R: PageRasterizer + ?Sized, E: PageEncoder + ?Sized>(
    source: &SourceDocument,
    rasterizer: &R,
    encoder: &E,
    cfg: &SplitConfig,
) -> Result<SplitOutcome, SplitError> {
    let media_type = source
        .media_type()
        .ok_or_else(|| SplitError::UnsupportedMediaType(source.mime_type.clone()))?;

    match media_type {
        MediaType::Pdf => {
            if source.byte_size() <= cfg.max_part_bytes {
                let page_count = rasterizer.page_count(&source.bytes)?;
                debug!(
                    file = %source.display_name,
                    size = source.byte_size(),
                    page_count,
                    "PDF under budget, passing through"
                );
                return Ok(SplitOutcome::from_parts(
                    vec![FinalizedPart {
                        bytes: source.bytes.clone(),
                        page_count,
                    }],
                    SplitMode::Single,
                ));
            }
            split_pdf(source, rasterizer, encoder, cfg)
        }
        MediaType::Image => {
            if source.byte_size() <= cfg.max_part_bytes {
                return Ok(SplitOutcome::from_parts(
                    vec![FinalizedPart {
                        bytes: source.bytes.clone(),
                        page_count: 1,
                    }],
                    SplitMode::SingleImage,
                ));
            }
            let bytes = compress_image_to_max_bytes(&source.bytes, cfg)?;
            Ok(SplitOutcome::from_parts(
                vec![FinalizedPart { bytes, page_count: 1 }],
                SplitMode::CompressedImage,
            ))
        }
    }
}

/// Where a page ended up relative to the open part.
#[derive(Debug)]
enum Placement {
    /// Joined the open part.
    Appended,
    /// Closed the open part and opened a new one with this page.
    Rolled(FinalizedPart),
    /// Overflows even an empty part; the fitter must take over.
    /// `closed` is the previous part if one had to be finalized first.
    NeedsFit { closed: Option<FinalizedPart> },
}

/// Pure placement step for one encoded page. Leaves `builder` holding the
/// open part (empty when the page needs the fitter).
fn place_page(
    builder: &mut PartBuilder,
    page: EncodedPage,
    max_bytes: usize,
) -> Result<Placement, SplitError> {
    let page = match builder.try_push(page, max_bytes)? {
        TryPush::Added { .. } => return Ok(Placement::Appended),
        TryPush::Overflow(page) => page,
    };

    if builder.is_empty() {
        return Ok(Placement::NeedsFit { closed: None });
    }

    // Close the current part (without this page) and retry in a fresh one.
    let closed = std::mem::take(builder).finalize()?;
    match builder.try_push(page, max_bytes)? {
        TryPush::Added { .. } => Ok(Placement::Rolled(closed)),
        TryPush::Overflow(_) => Ok(Placement::NeedsFit {
            closed: Some(closed),
        }),
    }
}

/// Flatten a PDF page-by-page into `<= max_part_bytes` parts.
///
/// A page is never split across two parts; part boundaries are purely a
/// function of cumulative encoded size.
fn split_pdf<R: PageRasterizer + ?Sized, E: PageEncoder + ?Sized>(
    source: &SourceDocument,
    rasterizer: &R,
    encoder: &E,
    cfg: &SplitConfig,
) -> Result<SplitOutcome, SplitError> {
    let page_count = rasterizer.page_count(&source.bytes)?;
    let mut parts: Vec<FinalizedPart> = Vec::new();
    let mut builder = PartBuilder::new();

    for page_number in 1..=page_count {
        let raster = rasterizer.rasterize_page(&source.bytes, page_number, cfg.dpi)?;
        let encoded = encoder.encode(&raster, cfg.jpeg_quality)?;
        drop(raster); // one page of pixels resident at a time

        match place_page(&mut builder, encoded, cfg.max_part_bytes)? {
            Placement::Appended => {}
            Placement::Rolled(part) => parts.push(part),
            Placement::NeedsFit { closed } => {
                if let Some(part) = closed {
                    parts.push(part);
                }
                let fitted =
                    fit_single_page(&source.bytes, page_number, rasterizer, encoder, cfg)?;
                parts.push(fitted.part);
            }
        }
    }

    if !builder.is_empty() {
        parts.push(builder.finalize()?);
    }

    info!(
        file = %source.display_name,
        source_pages = page_count,
        parts = parts.len(),
        "PDF split into byte-bounded parts"
    );

    Ok(SplitOutcome::from_parts(parts, SplitMode::SplitPdf))
}

/// Compress a bitmap under the budget by downscaling and lowering JPEG
/// quality, with one aggressive shrink as a last resort.
pub fn compress_image_to_max_bytes(
    bytes: &[u8],
    cfg: &SplitConfig,
) -> Result<Vec<u8>, SplitError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| SplitError::ImageProcessing(format!("failed to decode image: {e}")))?;

    let img = if img.width() > cfg.image_max_width {
        let ratio = cfg.image_max_width as f32 / img.width() as f32;
        let h = ((img.height() as f32 * ratio).round() as u32).max(1);
        img.resize_exact(cfg.image_max_width, h, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let mut quality = cfg.image_quality_start;
    while quality >= cfg.image_quality_floor - f32::EPSILON {
        let jpeg = encode_image_jpeg(&img, quality)?;
        if jpeg.len() <= cfg.max_part_bytes {
            debug!(quality, size = jpeg.len(), "Image compressed under budget");
            return Ok(jpeg);
        }
        quality = ((quality - cfg.image_quality_step) * 100.0).round() / 100.0;
    }

    // Final attempt with an aggressive shrink at floor quality.
    let w = ((img.width() as f32 * 0.85).round() as u32).max(1);
    let h = ((img.height() as f32 * 0.85).round() as u32).max(1);
    let shrunk = img.resize_exact(w, h, image::imageops::FilterType::Lanczos3);
    let jpeg = encode_image_jpeg(&shrunk, cfg.image_quality_floor)?;
    if jpeg.len() <= cfg.max_part_bytes {
        return Ok(jpeg);
    }
    Err(SplitError::Uncompressible { page: 1 })
}

fn encode_image_jpeg(img: &DynamicImage, quality: f32) -> Result<Vec<u8>, SplitError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut cursor = Cursor::new(Vec::new());
    rgb.write_to(&mut cursor, ImageOutputFormat::Jpeg(jpeg_quality_scale(quality)))
        .map_err(|e| SplitError::ImageProcessing(format!("JPEG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}
