//! Byte-bounded part assembly.
//!
//! A part is a standalone PDF whose pages are the flattened JPEG images of
//! consecutive source pages, each page sized to the source page's pixel
//! dimensions at its render dpi. The JPEG bytes go into the document
//! unchanged as `DCTDecode` image XObjects, so part size tracks encoded
//! page size closely and the budget check runs against the ACTUAL
//! serialized bytes, not an estimate.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};

use super::encode::EncodedPage;
use super::SplitError;

/// PDF points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// A finalized, immutable part.
#[derive(Debug, Clone)]
pub struct FinalizedPart {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl FinalizedPart {
    pub fn byte_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Outcome of attempting to add a page to an open part.
#[derive(Debug)]
pub enum TryPush {
    /// Page accepted; the projected finalized size is returned.
    Added { projected_size: usize },
    /// Adding the page would blow the budget; the page is handed back.
    Overflow(EncodedPage),
}

/// Accumulates encoded pages into one byte-bounded part.
///
/// An explicit value — opened, pushed into, finalized — rather than a
/// document mutated in place across the split loop. Never finalized empty.
#[derive(Debug, Default)]
pub struct PartBuilder {
    pages: Vec<EncodedPage>,
}

impl PartBuilder {
    pub fn new() -> Self {
        Self { pages: Vec::new() }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Try to append `page` while keeping the finalized size within
    /// `max_bytes`. On overflow the builder is left unchanged and the page
    /// is returned to the caller.
    pub fn try_push(&mut self, page: EncodedPage, max_bytes: usize) -> Result<TryPush, SplitError> {
        self.pages.push(page);
        let bytes = build_part_pdf(&self.pages)?;
        if bytes.len() <= max_bytes {
            Ok(TryPush::Added {
                projected_size: bytes.len(),
            })
        } else {
            // Unwrap is fine: we just pushed.
            let page = self.pages.pop().expect("page pushed above");
            Ok(TryPush::Overflow(page))
        }
    }

    /// Serialize the accumulated pages into a standalone PDF.
    pub fn finalize(self) -> Result<FinalizedPart, SplitError> {
        if self.pages.is_empty() {
            return Err(SplitError::Packing(
                "refusing to finalize a part with zero pages".into(),
            ));
        }
        let page_count = self.pages.len();
        let bytes = build_part_pdf(&self.pages)?;
        Ok(FinalizedPart { bytes, page_count })
    }
}

/// Build a PDF holding one full-bleed JPEG per page.
///
/// Page geometry: the MediaBox is the image's pixel size converted to
/// points at its render dpi, so the part reproduces the source page
/// dimensions regardless of what dpi the fitter settled on.
fn build_part_pdf(pages: &[EncodedPage]) -> Result<Vec<u8>, SplitError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut page_ids = Vec::with_capacity(pages.len());

    for page in pages {
        let w_pt = px_to_pt(page.width_px, page.dpi);
        let h_pt = px_to_pt(page.height_px, page.dpi);

        let image_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"XObject".to_vec())),
            ("Subtype", Object::Name(b"Image".to_vec())),
            ("Width", Object::Integer(page.width_px as i64)),
            ("Height", Object::Integer(page.height_px as i64)),
            ("ColorSpace", Object::Name(b"DeviceRGB".to_vec())),
            ("BitsPerComponent", Object::Integer(8)),
            ("Filter", Object::Name(b"DCTDecode".to_vec())),
        ]);
        let image_id = doc.add_object(Stream::new(image_dict, page.jpeg.clone()));

        // q <w> 0 0 <h> 0 0 cm /Im0 Do Q — scale the unit image to the page.
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(w_pt),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(h_pt),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| SplitError::Packing(format!("content stream encoding failed: {e}")))?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

        let resources = Dictionary::from_iter(vec![(
            "XObject",
            Object::Dictionary(Dictionary::from_iter(vec![(
                "Im0",
                Object::Reference(image_id),
            )])),
        )]);

        let page_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(w_pt),
                    Object::Real(h_pt),
                ]),
            ),
            ("Resources", Object::Dictionary(resources)),
            ("Contents", Object::Reference(content_id)),
        ]);
        page_ids.push(doc.add_object(page_dict));
    }

    let pages_dict = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(pages.len() as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| SplitError::Packing(format!("part serialization failed: {e}")))?;
    Ok(buffer)
}

fn px_to_pt(px: u32, dpi: u32) -> f32 {
    px as f32 * POINTS_PER_INCH / dpi.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_page(jpeg_len: usize) -> EncodedPage {
        EncodedPage {
            jpeg: vec![0xCD; jpeg_len],
            width_px: 991,
            height_px: 1403,
            dpi: 120,
        }
    }

    #[test]
    fn px_to_pt_round_trip_at_render_dpi() {
        // 991 px at 120 dpi ≈ 594.6 pt (A4 width).
        let pt = px_to_pt(991, 120);
        assert!((pt - 594.6).abs() < 0.5, "got {pt}");
    }

    #[test]
    fn push_within_budget_is_added() {
        let mut builder = PartBuilder::new();
        match builder.try_push(fake_page(10_000), 1_000_000).unwrap() {
            TryPush::Added { projected_size } => {
                assert!(projected_size > 10_000);
                assert!(projected_size <= 1_000_000);
            }
            TryPush::Overflow(_) => panic!("page should have fit"),
        }
        assert_eq!(builder.page_count(), 1);
    }

    #[test]
    fn push_over_budget_hands_page_back() {
        let mut builder = PartBuilder::new();
        builder.try_push(fake_page(10_000), 1_000_000).unwrap();
        match builder.try_push(fake_page(995_000), 1_000_000).unwrap() {
            TryPush::Overflow(page) => assert_eq!(page.jpeg.len(), 995_000),
            TryPush::Added { .. } => panic!("page should have overflowed"),
        }
        // Builder unchanged by the rejected push.
        assert_eq!(builder.page_count(), 1);
    }

    #[test]
    fn finalized_size_respects_budget_exactly() {
        let budget = 50_000;
        let mut builder = PartBuilder::new();
        let mut added = 0;
        for _ in 0..10 {
            match builder.try_push(fake_page(9_000), budget).unwrap() {
                TryPush::Added { .. } => added += 1,
                TryPush::Overflow(_) => break,
            }
        }
        assert!(added >= 1);
        let part = builder.finalize().unwrap();
        assert_eq!(part.page_count, added);
        assert!(part.byte_size() <= budget, "part size {} > {budget}", part.byte_size());
    }

    #[test]
    fn empty_builder_refuses_to_finalize() {
        assert!(PartBuilder::new().finalize().is_err());
    }

    #[test]
    fn part_is_a_loadable_pdf_with_right_page_count() {
        let mut builder = PartBuilder::new();
        for _ in 0..3 {
            builder.try_push(fake_page(5_000), 1_000_000).unwrap();
        }
        let part = builder.finalize().unwrap();
        let doc = Document::load_mem(&part.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn page_geometry_follows_render_dpi() {
        // Same pixel size at half the dpi must produce twice the point size.
        let mut hi = PartBuilder::new();
        hi.try_push(fake_page(1_000), 1_000_000).unwrap();
        let hi_part = hi.finalize().unwrap();

        let mut page = fake_page(1_000);
        page.dpi = 60;
        let mut lo = PartBuilder::new();
        lo.try_push(page, 1_000_000).unwrap();
        let lo_part = lo.finalize().unwrap();

        let media_box_width = |bytes: &[u8]| -> f32 {
            let doc = Document::load_mem(bytes).unwrap();
            let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
            let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
            let mb = page.get(b"MediaBox").unwrap().as_array().unwrap();
            mb[2].as_float().unwrap()
        };
        let hi_w = media_box_width(&hi_part.bytes);
        let lo_w = media_box_width(&lo_part.bytes);
        assert!((lo_w / hi_w - 2.0).abs() < 0.01, "hi {hi_w} lo {lo_w}");
    }
}
