//! pdfium-backed reading: text extraction, term search and rasterization.

use crate::{PageRect, PdfError, Result};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};

/// Scale applied when rasterizing a page for OCR or replacement
/// (PDF user space is 72 dpi, so this renders at 144 dpi).
pub const RASTER_SCALE: f32 = 2.0;

/// Padding added around search hits so box edges do not clip glyphs.
const HIT_PADDING: f64 = 0.003;

/// One search hit, normalized to the page with a top-left origin.
#[derive(Debug, Clone)]
pub struct TermHit {
    pub term: String,
    pub rect: PageRect,
}

fn pdfium_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.join("libs"));
            paths.push(exe_dir.to_path_buf());
        }
    }
    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));
    paths
}

fn bind_pdfium() -> Result<Pdfium> {
    for path in pdfium_search_paths() {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(&path);
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            log::debug!("[Pdfium] loaded from {:?}", path);
            return Ok(Pdfium::new(bindings));
        }
    }
    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| PdfError::PdfiumUnavailable(e.to_string()))
}

/// Read-only PDF access. One binding is shared across all calls; documents
/// are opened per call since they borrow the binding.
pub struct PdfRasterizer {
    pdfium: Pdfium,
}

impl PdfRasterizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pdfium: bind_pdfium()?,
        })
    }

    pub fn page_count(&self, pdf_path: &Path) -> Result<usize> {
        let document = self.load(pdf_path)?;
        Ok(document.pages().len() as usize)
    }

    /// Text layer of every page, in page order. Pages without a text layer
    /// yield empty strings.
    pub fn extract_page_texts(&self, pdf_path: &Path) -> Result<Vec<String>> {
        let document = self.load(pdf_path)?;
        let mut texts = Vec::new();
        for page in document.pages().iter() {
            let text = page
                .text()
                .map(|t| t.all())
                .unwrap_or_default();
            texts.push(text);
        }
        Ok(texts)
    }

    /// Finds every occurrence of each term on one page. Opens the document
    /// once for the whole batch.
    pub fn search_terms_in_page(
        &self,
        pdf_path: &Path,
        page_index: usize,
        terms: &[String],
    ) -> Result<Vec<TermHit>> {
        let document = self.load(pdf_path)?;
        let page = document
            .pages()
            .get(page_index as u16)
            .map_err(|_| PdfError::PageNotFound(page_index))?;

        let page_width = page.width().value as f64;
        let page_height = page.height().value as f64;
        let text = page.text().map_err(|e| PdfError::Render(e.to_string()))?;
        let search_options = PdfSearchOptions::new();

        let mut hits = Vec::new();
        for term in terms {
            let search = match text.search(term, &search_options) {
                Ok(s) => s,
                Err(_) => continue,
            };

            for segments in search.iter(PdfSearchDirection::SearchForward) {
                for segment in segments.iter() {
                    let bounds = segment.bounds();
                    let left = bounds.left().value as f64 / page_width;
                    let top = 1.0 - (bounds.top().value as f64 / page_height);
                    let width =
                        (bounds.right().value - bounds.left().value) as f64 / page_width;
                    let height =
                        (bounds.top().value - bounds.bottom().value) as f64 / page_height;

                    hits.push(TermHit {
                        term: term.clone(),
                        rect: PageRect {
                            x: ((left - HIT_PADDING).max(0.0)) as f32,
                            y: ((top - HIT_PADDING).max(0.0)) as f32,
                            width: ((width + HIT_PADDING * 2.0).min(1.0)) as f32,
                            height: ((height + HIT_PADDING * 2.0).min(1.0)) as f32,
                        },
                    });
                }
            }
        }

        log::debug!(
            "[Pdfium] page {}: {} hits for {} terms",
            page_index,
            hits.len(),
            terms.len()
        );
        Ok(hits)
    }

    /// Rasterizes one page at [`RASTER_SCALE`].
    pub fn render_page(&self, pdf_path: &Path, page_index: usize) -> Result<DynamicImage> {
        let document = self.load(pdf_path)?;
        let page = document
            .pages()
            .get(page_index as u16)
            .map_err(|_| PdfError::PageNotFound(page_index))?;

        let target_width = (page.width().value * RASTER_SCALE) as i32;
        let target_height = (page.height().value * RASTER_SCALE) as i32;

        let render_config = PdfRenderConfig::new()
            .set_target_width(target_width)
            .set_target_height(target_height);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| PdfError::Render(e.to_string()))?;

        log::debug!(
            "[Pdfium] rendered page {} at {}x{}",
            page_index,
            target_width,
            target_height
        );
        Ok(bitmap.as_image())
    }

    fn load(&self, pdf_path: &Path) -> Result<PdfDocument<'_>> {
        self.pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| PdfError::Load(format!("{}: {}", pdf_path.display(), e)))
    }
}
