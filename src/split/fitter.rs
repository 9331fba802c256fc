//! Single-page degradation search.
//!
//! When one page alone overflows the byte budget, quality is walked down
//! first (visually cheaper for text-dense scans), then resolution, until
//! the page fits as its own part or both floors are exhausted.

use tracing::{debug, info};

use super::encode::PageEncoder;
use super::packer::{FinalizedPart, PartBuilder, TryPush};
use super::raster::PageRasterizer;
use super::SplitError;
use crate::config::SplitConfig;

/// A page that fit after degradation, packed as its own part.
#[derive(Debug)]
pub struct FittedPage {
    pub part: FinalizedPart,
    pub dpi_used: u32,
    pub quality_used: f32,
}

/// Compress a single page under `cfg.max_part_bytes`, degrading quality
/// then dpi. Each dpi step re-renders the page at the reduced resolution.
///
/// Search order per attempt: encode at the current `(dpi, quality)`; on
/// overflow step quality down by `quality_step`, clamped to and including
/// `quality_floor`; only then drop dpi by `dpi_scale`, reset quality to
/// `quality_reset` (never above the caller's starting quality), and
/// repeat. Fails with `Uncompressible` once dpi would fall below
/// `dpi_floor`.
pub fn fit_single_page<R: PageRasterizer + ?Sized, E: PageEncoder + ?Sized>(
    pdf_bytes: &[u8],
    page_number: usize,
    rasterizer: &R,
    encoder: &E,
    cfg: &SplitConfig,
) -> Result<FittedPage, SplitError> {
    let mut dpi = cfg.dpi;
    let start_quality = cfg.jpeg_quality;

    while dpi >= cfg.dpi_floor {
        let raster = rasterizer.rasterize_page(pdf_bytes, page_number, dpi)?;

        let mut quality = if dpi == cfg.dpi {
            start_quality
        } else {
            cfg.quality_reset.min(start_quality)
        };

        loop {
            let encoded = encoder.encode(&raster, quality)?;
            let mut builder = PartBuilder::new();
            match builder.try_push(encoded, cfg.max_part_bytes)? {
                TryPush::Added { projected_size } => {
                    info!(
                        page = page_number,
                        dpi,
                        quality,
                        part_size = projected_size,
                        "Oversized page fitted after degradation"
                    );
                    return Ok(FittedPage {
                        part: builder.finalize()?,
                        dpi_used: dpi,
                        quality_used: quality,
                    });
                }
                TryPush::Overflow(_) => {
                    debug!(page = page_number, dpi, quality, "Attempt over budget");
                }
            }

            if quality <= cfg.quality_floor + f32::EPSILON {
                break;
            }
            quality = round2((quality - cfg.quality_step).max(cfg.quality_floor));
        }

        dpi = (dpi as f32 * cfg.dpi_scale).floor() as u32;
    }

    Err(SplitError::Uncompressible { page: page_number })
}

/// Keep quality values on a two-decimal grid, matching the config knobs.
fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::encode::MockEncoder;
    use crate::split::raster::MockRasterizer;

    fn cfg(max_bytes: usize) -> SplitConfig {
        SplitConfig {
            max_part_bytes: max_bytes,
            ..SplitConfig::default()
        }
    }

    #[test]
    fn fits_by_quality_alone() {
        // ~6 MB at (120, 0.72); quality 0.52 brings it under budget.
        let raster = MockRasterizer::new(1);
        let encoder = MockEncoder::new(vec![8_300_000], 120);
        let fitted =
            fit_single_page(&[], 1, &raster, &encoder, &cfg(4_500_000)).unwrap();
        assert_eq!(fitted.dpi_used, 120);
        assert!(fitted.quality_used < 0.72);
        assert!(fitted.part.byte_size() <= 4_500_000);
        assert_eq!(fitted.part.page_count, 1);
    }

    #[test]
    fn fits_by_dpi_reduction() {
        // Too big at any quality at 120 dpi; two ×0.85 resolution drops
        // (dpi 86) land it under budget.
        let raster = MockRasterizer::new(1);
        let encoder = MockEncoder::new(vec![20_000_000], 120);
        let fitted =
            fit_single_page(&[], 1, &raster, &encoder, &cfg(4_500_000)).unwrap();
        assert!(fitted.dpi_used < 120);
        assert!(fitted.dpi_used >= 80);
        assert!(fitted.part.byte_size() <= 4_500_000);
    }

    #[test]
    fn quality_floor_tried_before_dropping_dpi() {
        // Fits at (120 dpi, 0.40) but not at 0.42: the floor itself must
        // be attempted before any resolution is given up.
        let raster = MockRasterizer::new(1);
        let encoder = MockEncoder::new(vec![11_000_000], 120);
        let fitted =
            fit_single_page(&[], 1, &raster, &encoder, &cfg(4_500_000)).unwrap();
        assert_eq!(fitted.dpi_used, 120);
        assert!((fitted.quality_used - 0.4).abs() < 1e-4, "got {}", fitted.quality_used);
    }

    #[test]
    fn uncompressible_when_floors_exhausted() {
        let raster = MockRasterizer::new(1);
        let encoder = MockEncoder::new(vec![500_000_000], 120);
        let err = fit_single_page(&[], 1, &raster, &encoder, &cfg(4_500_000)).unwrap_err();
        assert!(matches!(err, SplitError::Uncompressible { page: 1 }));
    }

    #[test]
    fn degradation_is_monotone() {
        // Instrumented encoder: record every (dpi, quality) attempt.
        use std::sync::Mutex;

        struct Recording {
            inner: MockEncoder,
            attempts: Mutex<Vec<(u32, f32)>>,
        }
        impl PageEncoder for Recording {
            fn encode(
                &self,
                page: &crate::split::raster::RasterPage,
                quality: f32,
            ) -> Result<crate::split::encode::EncodedPage, SplitError> {
                self.attempts.lock().unwrap().push((page.dpi, quality));
                self.inner.encode(page, quality)
            }
        }

        let raster = MockRasterizer::new(1);
        let encoder = Recording {
            inner: MockEncoder::new(vec![30_000_000], 120),
            attempts: Mutex::new(Vec::new()),
        };
        let _ = fit_single_page(&[], 1, &raster, &encoder, &cfg(4_500_000));

        let attempts = encoder.attempts.lock().unwrap();
        assert!(attempts.len() > 1);
        for pair in attempts.windows(2) {
            let (d0, q0) = pair[0];
            let (d1, q1) = pair[1];
            // dpi never increases; every retry strictly lowers one axis.
            assert!(d1 <= d0, "dpi rose: {d0} -> {d1}");
            assert!(d1 < d0 || q1 < q0, "no axis decreased: ({d0},{q0}) -> ({d1},{q1})");
        }
    }

    #[test]
    fn quality_reset_capped_at_starting_quality() {
        let raster = MockRasterizer::new(1);
        let encoder = MockEncoder::new(vec![20_000_000], 120);
        let mut config = cfg(4_500_000);
        config.jpeg_quality = 0.5; // below the 0.6 reset default
        let fitted = fit_single_page(&[], 1, &raster, &encoder, &config).unwrap();
        assert!(fitted.quality_used <= 0.5);
    }
}
