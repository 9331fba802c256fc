//! PDF page rendering via Google PDFium.
//!
//! Renders individual PDF pages to pixel buffers for re-encoding.
//!
//! `PdfiumRasterizer` is stateless (`Send + Sync`). Each operation creates
//! a fresh `Pdfium` instance because the upstream type is `!Send`.
//! The OS caches `dlopen`/`LoadLibrary` calls, so repeat loads are near-free.

use image::{DynamicImage, GenericImageView};
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::SplitError;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages or absurd DPI settings.
const MAX_DIMENSION_PX: u32 = 4096;

/// PDF points per inch (standard PDF unit).
const POINTS_PER_INCH: f32 = 72.0;

/// One rendered page. Owned by the caller and meant to be dropped right
/// after encoding so at most one page's pixels are resident at a time.
pub struct RasterPage {
    /// 1-based page number within the source document.
    pub page_number: usize,
    /// Resolution the page was rendered at.
    pub dpi: u32,
    pub image: DynamicImage,
}

impl RasterPage {
    pub fn width_px(&self) -> u32 {
        self.image.width()
    }

    pub fn height_px(&self) -> u32 {
        self.image.height()
    }
}

/// Page rendering abstraction (allows mocking for tests).
pub trait PageRasterizer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, SplitError>;

    fn rasterize_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<RasterPage, SplitError>;
}

/// Renders PDF pages using Google PDFium.
///
/// PDFium handles all PDF complexities: CIDFont encodings, embedded fonts,
/// form fields, transparency, layers.
pub struct PdfiumRasterizer;

impl PdfiumRasterizer {
    /// Create a new rasterizer, verifying the PDFium library is loadable.
    pub fn new() -> Result<Self, SplitError> {
        // Verify library is loadable at construction time (fail-fast).
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path)
/// 2. Alongside the running executable
/// 3. System library search paths
fn load_pdfium() -> Result<Pdfium, SplitError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| SplitError::Raster {
            page: 0,
            reason: format!("Failed to load PDFium from {path}: {e}"),
        })?;
        return Ok(Pdfium::new(bindings));
    }

    // pdfium_platform_library_name_at_path() handles platform-specific names:
    //   Windows → pdfium.dll | Linux → libpdfium.so | macOS → libpdfium.dylib
    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                debug!(dir = %exe_dir.display(), "Loaded PDFium from executable directory");
                return Ok(Pdfium::new(bindings));
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| SplitError::Raster {
        page: 0,
        reason: format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ),
    })?;
    Ok(Pdfium::new(bindings))
}

/// Map PDF load errors — detect encrypted PDFs for user-friendly messaging.
fn map_load_error(e: PdfiumError) -> SplitError {
    let msg = format!("{e}");
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        SplitError::EncryptedPdf
    } else {
        SplitError::Raster {
            page: 0,
            reason: format!("Failed to load PDF: {e}"),
        }
    }
}

/// Compute pixel dimensions for rendering, applying the dimension guard.
///
/// Returns (width_px, height_px), both clamped to [1, MAX_DIMENSION_PX].
/// Preserves aspect ratio when capping.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).max(1).min(MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).max(1).min(MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, SplitError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;
        Ok(document.pages().len() as usize)
    }

    fn rasterize_page(
        &self,
        pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<RasterPage, SplitError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;

        let pages = document.pages();

        let page_index = page_number
            .checked_sub(1)
            .and_then(|i| u16::try_from(i).ok())
            .ok_or_else(|| SplitError::Raster {
                page: page_number,
                reason: format!("Invalid page number {page_number}"),
            })?;

        let page = pages.get(page_index).map_err(|_| SplitError::Raster {
            page: page_number,
            reason: format!(
                "Page {page_number} out of range (document has {} pages)",
                pages.len()
            ),
        })?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = compute_render_dimensions(width_points, height_points, dpi);

        let uncapped_w = (width_points * dpi as f32 / POINTS_PER_INCH) as u32;
        let uncapped_h = (height_points * dpi as f32 / POINTS_PER_INCH) as u32;
        if target_w != uncapped_w || target_h != uncapped_h {
            warn!(
                page = page_number,
                raw_width = uncapped_w,
                raw_height = uncapped_h,
                capped_width = target_w,
                capped_height = target_h,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| SplitError::Raster {
                page: page_number,
                reason: format!("Rendering failed: {e}"),
            })?;

        let image = bitmap.as_image();

        debug!(
            page = page_number,
            width = image.width(),
            height = image.height(),
            dpi,
            "Rendered PDF page"
        );

        Ok(RasterPage {
            page_number,
            dpi,
            image,
        })
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock rasterizer returning a solid-color page of fixed aspect ratio.
///
/// Used by splitter/fitter tests that need a `PageRasterizer` without
/// requiring the actual PDFium binary. The rendered size scales with dpi
/// like a real A4-ish page would.
pub struct MockRasterizer {
    page_count: usize,
}

impl MockRasterizer {
    pub fn new(page_count: usize) -> Self {
        Self { page_count }
    }
}

impl PageRasterizer for MockRasterizer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, SplitError> {
        Ok(self.page_count)
    }

    fn rasterize_page(
        &self,
        _pdf_bytes: &[u8],
        page_number: usize,
        dpi: u32,
    ) -> Result<RasterPage, SplitError> {
        if page_number == 0 || page_number > self.page_count {
            return Err(SplitError::Raster {
                page: page_number,
                reason: format!(
                    "Page {page_number} out of range (mock has {} pages)",
                    self.page_count
                ),
            });
        }
        // A4 at the requested dpi: 8.27in x 11.69in.
        let (w, h) = compute_render_dimensions(595.0, 842.0, dpi);
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            w,
            h,
            image::Rgb([255u8, 255, 255]),
        ));
        Ok(RasterPage {
            page_number,
            dpi,
            image,
        })
    }
}
