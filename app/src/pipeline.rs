//! File processing: strategy dispatch, physical redaction, audit trail.

use crate::analysis::{self, PageAnalysis};
use crate::config::{AppConfig, RunMode};
use crate::orchestrator::apply_filters;
use anyhow::Context;
use dossier_core::{AuditLogger, Detection, Location};
use dossier_pdf::{
    detect_page_kind, get_media_box, get_page_content, paint_black_boxes, replace_page_with_jpeg,
    save_document, scrub_content_stream, set_page_content, MaskRect, PageKind, PdfRasterizer,
};
use dossier_vision::GeminiClient;
use image::DynamicImage;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use lopdf::Document;
use std::io::Cursor;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "bmp"];

pub struct FileOutcome {
    pub output_path: PathBuf,
    pub audit_path: PathBuf,
    pub detections: usize,
}

pub struct Pipeline {
    config: AppConfig,
    vision: Option<GeminiClient>,
    audit: AuditLogger,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let vision = match (config.mode, &config.api_key) {
            (RunMode::Vision, Some(key)) => Some(GeminiClient::new(key.clone())?),
            _ => None,
        };
        if config.mode == RunMode::Ocr {
            match dossier_ocr::tesseract::tesseract_version("tesseract") {
                Ok(version) => log::info!("[Pipeline] tesseract {} found", version),
                Err(e) => log::warn!("[Pipeline] tesseract probe failed: {}", e),
            }
        }
        let audit = AuditLogger::new(&config.output_dir);
        Ok(Self {
            config,
            vision,
            audit,
        })
    }

    pub fn process_file(&self, path: &Path) -> anyhow::Result<FileOutcome> {
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .context("input path has no file name")?;
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        log::info!("[Pipeline] processing {}", filename);
        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            self.process_image(path, filename)
        } else if extension == "pdf" {
            self.process_pdf(path, filename)
        } else {
            anyhow::bail!("unsupported file format: .{}", extension)
        }
    }

    fn process_image(&self, path: &Path, filename: &str) -> anyhow::Result<FileOutcome> {
        let img = image::open(path).with_context(|| format!("opening {}", path.display()))?;
        let analysis = self.analyze_image(&img, filename)?;
        let policy = self.config.policies.lookup(analysis.doc_type.as_deref());
        let kept = apply_filters(analysis.detections, &self.config.ignored_entities, policy);

        // Detection may run on a preprocessed frame, but redaction is always
        // painted on the original image.
        let redacted = paint_boxes(&img, &kept);
        let output_path = self.config.output_dir.join(filename);
        redacted
            .save(&output_path)
            .with_context(|| format!("saving {}", output_path.display()))?;

        let audit_path = self.audit.log(filename, &kept)?;
        Ok(FileOutcome {
            output_path,
            audit_path,
            detections: kept.len(),
        })
    }

    fn process_pdf(&self, path: &Path, filename: &str) -> anyhow::Result<FileOutcome> {
        let rasterizer = PdfRasterizer::new()?;
        let page_texts = rasterizer.extract_page_texts(path)?;
        let mut doc =
            Document::load(path).with_context(|| format!("loading {}", path.display()))?;
        let page_ids: Vec<lopdf::ObjectId> = doc.page_iter().collect();

        // pdfium indices are paired with lopdf page order below.
        let page_count = rasterizer.page_count(path)?;
        if page_count != page_ids.len() {
            log::warn!(
                "[Pipeline] {}: pdfium reports {} pages, document tree has {}",
                filename,
                page_count,
                page_ids.len()
            );
        }

        let mut all_detections: Vec<Detection> = Vec::new();
        for (index, page_id) in page_ids.iter().enumerate() {
            let text = page_texts.get(index).map(String::as_str).unwrap_or("");
            let content = get_page_content(&doc, *page_id).unwrap_or_default();
            let kept = if page_is_native(self.config.force_image, text, &content) {
                self.redact_native_page(&rasterizer, &mut doc, *page_id, path, index, text, filename)
                    .with_context(|| format!("page {} (native)", index + 1))?
            } else {
                self.redact_scanned_page(&rasterizer, &mut doc, *page_id, path, index, filename)
                    .with_context(|| format!("page {} (scanned)", index + 1))?
            };
            all_detections.extend(kept);
        }

        let output_path = self.config.output_dir.join(filename);
        save_document(&mut doc, &output_path)?;

        let audit_path = self.audit.log(filename, &all_detections)?;
        Ok(FileOutcome {
            output_path,
            audit_path,
            detections: all_detections.len(),
        })
    }

    /// Native text page: detect over the text layer, locate the matched
    /// strings on the page, scrub the characters out of the content stream
    /// and paint black boxes on top.
    #[allow(clippy::too_many_arguments)]
    fn redact_native_page(
        &self,
        rasterizer: &PdfRasterizer,
        doc: &mut Document,
        page_id: lopdf::ObjectId,
        path: &Path,
        page_index: usize,
        text: &str,
        filename: &str,
    ) -> anyhow::Result<Vec<Detection>> {
        let analysis = analysis::analyze_text(&self.config, text, filename);
        let policy = self.config.policies.lookup(analysis.doc_type.as_deref());
        let kept = apply_filters(analysis.detections, &self.config.ignored_entities, policy);

        let mut terms: Vec<String> = kept
            .iter()
            .filter_map(|d| d.source_text.clone())
            .filter(|t| !t.trim().is_empty())
            .collect();
        terms.sort();
        terms.dedup();

        if !terms.is_empty() {
            let hits = rasterizer.search_terms_in_page(path, page_index, &terms)?;
            let media_box = get_media_box(doc, page_id);
            let masks: Vec<MaskRect> = hits
                .iter()
                .map(|hit| MaskRect::from_page_rect(&hit.rect, media_box))
                .collect();

            if !masks.is_empty() {
                let content = get_page_content(doc, page_id)?;
                let scrubbed = scrub_content_stream(&content, &masks)?;
                let overlaid = paint_black_boxes(&scrubbed, &masks)?;
                set_page_content(doc, page_id, overlaid)?;
                log::info!(
                    "[Pipeline] page {}: {} masks applied",
                    page_index + 1,
                    masks.len()
                );
            }
        }

        Ok(kept)
    }

    /// Scanned page: rasterize, detect on the raster, paint, and replace
    /// the whole page with the redacted image so the original scan data is
    /// gone from the file.
    fn redact_scanned_page(
        &self,
        rasterizer: &PdfRasterizer,
        doc: &mut Document,
        page_id: lopdf::ObjectId,
        path: &Path,
        page_index: usize,
        filename: &str,
    ) -> anyhow::Result<Vec<Detection>> {
        let img = rasterizer.render_page(path, page_index)?;
        let analysis = self.analyze_image(&img, filename)?;
        let policy = self.config.policies.lookup(analysis.doc_type.as_deref());
        let kept = apply_filters(analysis.detections, &self.config.ignored_entities, policy);

        let redacted = paint_boxes(&img, &kept);
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(redacted)
            .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
            .context("encoding redacted page")?;
        replace_page_with_jpeg(doc, page_id, jpeg, img.width(), img.height())?;

        Ok(kept)
    }

    fn analyze_image(&self, img: &DynamicImage, filename: &str) -> anyhow::Result<PageAnalysis> {
        match self.config.mode {
            RunMode::Ocr => analysis::analyze_image_with_ocr(&self.config, img, filename),
            RunMode::Vision => {
                let client = self
                    .vision
                    .as_ref()
                    .context("vision client not initialized")?;
                analysis::analyze_image_with_vision(&self.config, client, img, filename)
            }
        }
    }
}

/// A page is scrubbed in place only when pdfium reports a text layer and the
/// page content stream itself carries text-show operators. Pages whose text
/// lives in form XObjects cannot be scrubbed there and take the raster path.
fn page_is_native(force_image: bool, text: &str, content: &[u8]) -> bool {
    !force_image && !text.trim().is_empty() && detect_page_kind(content) == PageKind::NativeText
}

/// Fills every pixel-box detection with black on a copy of the original.
fn paint_boxes(img: &DynamicImage, detections: &[Detection]) -> image::RgbImage {
    let mut canvas = img.to_rgb8();
    let (width, height) = canvas.dimensions();
    let black = image::Rgb([0u8, 0, 0]);

    for det in detections {
        let Location::PixelBox {
            left,
            top,
            right,
            bottom,
        } = det.location
        else {
            continue;
        };

        let x = (left.max(0.0) as u32).min(width);
        let y = (top.max(0.0) as u32).min(height);
        let x_end = (right.max(0.0) as u32).min(width);
        let y_end = (bottom.max(0.0) as u32).min(height);
        if x_end > x && y_end > y {
            let rect = Rect::at(x as i32, y as i32).of_size(x_end - x, y_end - y);
            draw_filled_rect_mut(&mut canvas, rect, black);
        }
    }

    canvas
}
