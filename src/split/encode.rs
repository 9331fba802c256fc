//! Lossy page encoding.
//!
//! Each rendered page is flattened to a JPEG before packing; quality is the
//! caller-facing 0–1 scale and is the fitter's primary degradation axis.

use std::io::Cursor;

use image::ImageOutputFormat;

use super::raster::RasterPage;
use super::SplitError;

/// One encoded page, ready for packing. Carries the geometry needed to
/// size the part's PDF page (px at the render dpi).
#[derive(Debug, Clone)]
pub struct EncodedPage {
    pub jpeg: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
    pub dpi: u32,
}

impl EncodedPage {
    pub fn byte_size(&self) -> usize {
        self.jpeg.len()
    }
}

/// Page compression abstraction (allows mocking for tests).
pub trait PageEncoder {
    fn encode(&self, page: &RasterPage, quality: f32) -> Result<EncodedPage, SplitError>;
}

/// Map 0–1 quality to the JPEG encoder's 1–100 scale.
pub(crate) fn jpeg_quality_scale(quality: f32) -> u8 {
    (quality.clamp(0.01, 1.0) * 100.0).round() as u8
}

/// Encodes pages with the `image` crate's JPEG encoder.
pub struct JpegPageEncoder;

impl PageEncoder for JpegPageEncoder {
    fn encode(&self, page: &RasterPage, quality: f32) -> Result<EncodedPage, SplitError> {
        // PDFium hands back RGBA; JPEG has no alpha channel.
        let rgb = image::DynamicImage::ImageRgb8(page.image.to_rgb8());
        let mut cursor = Cursor::new(Vec::new());
        rgb.write_to(&mut cursor, ImageOutputFormat::Jpeg(jpeg_quality_scale(quality)))
            .map_err(|e| SplitError::ImageProcessing(format!("JPEG encoding failed: {e}")))?;
        Ok(EncodedPage {
            jpeg: cursor.into_inner(),
            width_px: page.width_px(),
            height_px: page.height_px(),
            dpi: page.dpi,
        })
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock encoder whose output size is a deterministic function of the
/// page's dpi and the requested quality, so splitter and fitter tests can
/// script exact byte sizes per page without real compression.
pub struct MockEncoder {
    /// Bytes emitted per page at `base_dpi` and quality 1.0.
    pub base_bytes: Vec<usize>,
    pub base_dpi: u32,
}

impl MockEncoder {
    pub fn new(base_bytes: Vec<usize>, base_dpi: u32) -> Self {
        Self { base_bytes, base_dpi }
    }

    /// Size model: linear in quality, quadratic in dpi (pixel count).
    pub fn projected_size(&self, page_number: usize, dpi: u32, quality: f32) -> usize {
        let base = self.base_bytes[page_number - 1];
        let dpi_factor = (dpi as f64 / self.base_dpi as f64).powi(2);
        (base as f64 * dpi_factor * quality as f64) as usize
    }
}

impl PageEncoder for MockEncoder {
    fn encode(&self, page: &RasterPage, quality: f32) -> Result<EncodedPage, SplitError> {
        if page.page_number == 0 || page.page_number > self.base_bytes.len() {
            return Err(SplitError::Raster {
                page: page.page_number,
                reason: "mock encoder has no size for this page".into(),
            });
        }
        let size = self.projected_size(page.page_number, page.dpi, quality);
        Ok(EncodedPage {
            jpeg: vec![0xAB; size],
            width_px: page.width_px(),
            height_px: page.height_px(),
            dpi: page.dpi,
        })
    }
}
