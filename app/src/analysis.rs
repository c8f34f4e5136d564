//! Detection strategies: text, OCR and vision.
//!
//! Each strategy classifies the document (unless a type was forced),
//! resolves the allow list for that type, and produces raw detections. The
//! caller applies the policy filters afterwards.

use crate::config::AppConfig;
use anyhow::Context;
use dossier_core::Detection;
use dossier_ocr::{prepare_for_ocr, OcrEngine, OcrEngineKind, OcrWord, TesseractOcr};
use dossier_rules::catalog::is_handwriting_prone;
use dossier_rules::{ExtendedAllowList, TextPiiDetector};
use dossier_vision::{build_prompt, to_pixel_detections, VisionError, VisionModelClient};
use image::DynamicImage;
use std::collections::BTreeSet;
use std::io::Cursor;

pub struct PageAnalysis {
    pub doc_type: Option<String>,
    pub detections: Vec<Detection>,
}

fn resolve_allow_list(config: &AppConfig, doc_type: Option<&str>) -> ExtendedAllowList {
    let terms = config.allow_list.resolve(doc_type, &BTreeSet::new());
    ExtendedAllowList::from_terms(&terms)
}

fn classify(config: &AppConfig, text: &str, filename: &str) -> Option<String> {
    if let Some(forced) = &config.forced_doc_type {
        return Some(forced.clone());
    }
    config
        .classifier
        .classify(text, filename)
        .map(str::to_string)
}

/// Pattern detection over a native text layer.
pub fn analyze_text(config: &AppConfig, text: &str, filename: &str) -> PageAnalysis {
    let doc_type = classify(config, text, filename);
    let allow = resolve_allow_list(config, doc_type.as_deref());
    let detections = config.engine.detect_text(text, &allow);
    log::info!(
        "[Text] {}: type={:?}, {} raw detections",
        filename,
        doc_type,
        detections.len()
    );
    PageAnalysis {
        doc_type,
        detections,
    }
}

/// OCR the image, classify from the recognized text, then run pattern
/// detection over it and map matched spans back to word boxes. The
/// handwriting profile re-reads the page when classification says the
/// document is an accident-report form. An OCR failure degrades to zero
/// detections for this unit rather than failing the file.
pub fn analyze_image_with_ocr(
    config: &AppConfig,
    img: &DynamicImage,
    filename: &str,
) -> anyhow::Result<PageAnalysis> {
    let processed = prepare_for_ocr(img);

    let mut words = match TesseractOcr::print().recognize(&processed) {
        Ok(words) => words,
        Err(e) => {
            log::warn!("[Ocr] {}: ocr failed, unit left undetected: {}", filename, e);
            return Ok(PageAnalysis {
                doc_type: config.forced_doc_type.clone(),
                detections: Vec::new(),
            });
        }
    };
    let (joined, _) = join_words(&words);
    let doc_type = classify(config, &joined, filename);

    let kind = ocr_kind_for(doc_type.as_deref());
    if kind != OcrEngineKind::Print {
        log::info!("[Ocr] {}: re-reading with the {} profile", filename, kind);
        match TesseractOcr::for_kind(kind).recognize(&processed) {
            Ok(rescanned) => words = rescanned,
            // Keep the printed-text pass rather than dropping the unit.
            Err(e) => log::warn!("[Ocr] {}: {} pass failed: {}", filename, kind, e),
        }
    }

    let (text, spans) = join_words(&words);
    let allow = resolve_allow_list(config, doc_type.as_deref());
    let span_detections = config.engine.detect_text(&text, &allow);
    let detections = spans_to_word_boxes(span_detections, &words, &spans);

    log::info!(
        "[Ocr] {}: type={:?}, {} words, {} raw detections",
        filename,
        doc_type,
        words.len(),
        detections.len()
    );
    Ok(PageAnalysis {
        doc_type,
        detections,
    })
}

/// Single vision-model round trip for the whole page. An unavailable
/// backend degrades to zero detections for this page rather than failing
/// the file.
pub fn analyze_image_with_vision(
    config: &AppConfig,
    client: &dyn VisionModelClient,
    img: &DynamicImage,
    filename: &str,
) -> anyhow::Result<PageAnalysis> {
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .context("encoding page for the vision model")?;

    let global: Vec<String> = config.allow_list.global_terms().iter().cloned().collect();
    let per_type = config
        .allow_list
        .per_type_terms()
        .iter()
        .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
        .collect();
    let prompt = build_prompt(&config.classifier.doc_type_ids(), &global, &per_type);

    let analysis = match client.analyze(&png, &prompt) {
        Ok(a) => a,
        Err(VisionError::Unavailable { attempts }) => {
            log::warn!(
                "[Vision] {}: backend unavailable after {} attempts, page left as is",
                filename,
                attempts
            );
            return Ok(PageAnalysis {
                doc_type: config.forced_doc_type.clone(),
                detections: Vec::new(),
            });
        }
        Err(e) => return Err(e).context("vision analysis"),
    };

    let doc_type = config
        .forced_doc_type
        .clone()
        .or(analysis.document_type.clone());

    // The prompt asks the model to honor the allow lists, but the protected-
    // term invariant is enforced here regardless of what comes back.
    let allow = resolve_allow_list(config, doc_type.as_deref());
    let detections: Vec<Detection> = to_pixel_detections(&analysis, img.width(), img.height())
        .into_iter()
        .filter(|det| {
            let protected = det
                .source_text
                .as_deref()
                .map(|t| allow.contains(t))
                .unwrap_or(false);
            if protected {
                log::debug!(
                    "[Vision] allow-listed term skipped: {:?}",
                    det.source_text
                );
            }
            !protected
        })
        .collect();

    log::info!(
        "[Vision] {}: type={:?}, {} raw detections",
        filename,
        doc_type,
        detections.len()
    );
    Ok(PageAnalysis {
        doc_type,
        detections,
    })
}

/// OCR profile for a classified document type.
fn ocr_kind_for(doc_type: Option<&str>) -> OcrEngineKind {
    if doc_type.map(is_handwriting_prone).unwrap_or(false) {
        OcrEngineKind::Handwriting
    } else {
        OcrEngineKind::Print
    }
}

/// Joins OCR words with single spaces, recording each word's byte span in
/// the joined string.
fn join_words(words: &[OcrWord]) -> (String, Vec<(usize, usize)>) {
    let mut text = String::new();
    let mut spans = Vec::with_capacity(words.len());
    for word in words {
        if !text.is_empty() {
            text.push(' ');
        }
        let start = text.len();
        text.push_str(&word.text);
        spans.push((start, text.len()));
    }
    (text, spans)
}

/// Projects text-span detections onto the pixel boxes of the words they
/// overlap. A match spanning several words yields one box per word.
fn spans_to_word_boxes(
    detections: Vec<Detection>,
    words: &[OcrWord],
    spans: &[(usize, usize)],
) -> Vec<Detection> {
    let mut out = Vec::new();
    for det in detections {
        let Some((start, end)) = det.span() else {
            continue;
        };
        for (word, &(word_start, word_end)) in words.iter().zip(spans) {
            if word_start < end && word_end > start {
                let boxed = Detection::pixel_box(
                    &det.entity_type,
                    word.left,
                    word.top,
                    word.left + word.width,
                    word.top + word.height,
                    det.score,
                )
                .with_source_text(det.source_text.clone().unwrap_or_else(|| word.text.clone()));
                out.push(boxed);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunMode;
    use dossier_core::PolicyTable;
    use dossier_rules::{AllowList, DocumentTypeClassifier, PatternEngine};
    use dossier_vision::{VlmAnalysis, VlmEntity};

    fn vision_config() -> AppConfig {
        AppConfig {
            output_dir: std::path::PathBuf::from("output"),
            mode: RunMode::Vision,
            force_image: false,
            forced_doc_type: None,
            ignored_entities: BTreeSet::new(),
            allow_list: AllowList::builtin(),
            engine: PatternEngine::new(),
            classifier: DocumentTypeClassifier::new(),
            policies: PolicyTable::builtin(),
            api_key: Some("test-key".to_string()),
        }
    }

    struct StubVision(VlmAnalysis);

    impl VisionModelClient for StubVision {
        fn analyze(&self, _png: &[u8], _prompt: &str) -> dossier_vision::Result<VlmAnalysis> {
            Ok(self.0.clone())
        }
    }

    fn entity(entity_type: &str, text: &str) -> VlmEntity {
        VlmEntity {
            entity_type: entity_type.to_string(),
            text: text.to_string(),
            box_2d: vec![100.0, 100.0, 200.0, 300.0],
        }
    }

    #[test]
    fn vision_detections_matching_allow_list_are_dropped() {
        let config = vision_config();
        // "tva" is a case variant of the globally protected "TVA".
        let client = StubVision(VlmAnalysis {
            document_type: Some("facture".to_string()),
            entities: vec![entity("PERSON", "tva"), entity("PERSON", "Jean Dupont")],
        });
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            100,
            100,
            image::Rgb([255, 255, 255]),
        ));

        let analysis = analyze_image_with_vision(&config, &client, &img, "facture.png").unwrap();
        assert_eq!(analysis.doc_type.as_deref(), Some("facture"));
        assert_eq!(analysis.detections.len(), 1);
        assert_eq!(
            analysis.detections[0].source_text.as_deref(),
            Some("Jean Dupont")
        );
    }

    #[test]
    fn ocr_profile_follows_document_type() {
        assert_eq!(
            ocr_kind_for(Some("constat_amiable")),
            OcrEngineKind::Handwriting
        );
        assert_eq!(ocr_kind_for(Some("facture")), OcrEngineKind::Print);
        assert_eq!(ocr_kind_for(None), OcrEngineKind::Print);
    }

    fn word(text: &str, left: f32) -> OcrWord {
        OcrWord {
            text: text.to_string(),
            confidence: 0.9,
            left,
            top: 50.0,
            width: 80.0,
            height: 20.0,
        }
    }

    #[test]
    fn join_words_tracks_spans() {
        let words = vec![word("Plaque", 0.0), word("AB-123-CD", 100.0)];
        let (text, spans) = join_words(&words);
        assert_eq!(text, "Plaque AB-123-CD");
        assert_eq!(spans, vec![(0, 6), (7, 16)]);
    }

    #[test]
    fn span_detection_maps_to_the_matching_word_box() {
        let words = vec![word("Plaque", 0.0), word("AB-123-CD", 100.0)];
        let (_, spans) = join_words(&words);
        let dets = vec![
            Detection::text_span("FR_LICENSE_PLATE", 7, 16, 0.8).with_source_text("AB-123-CD")
        ];
        let boxes = spans_to_word_boxes(dets, &words, &spans);
        assert_eq!(boxes.len(), 1);
        match boxes[0].location {
            dossier_core::Location::PixelBox { left, top, right, bottom } => {
                assert_eq!((left, top, right, bottom), (100.0, 50.0, 180.0, 70.0));
            }
            _ => panic!("expected pixel box"),
        }
        assert_eq!(boxes[0].source_text.as_deref(), Some("AB-123-CD"));
    }

    #[test]
    fn multi_word_match_yields_one_box_per_word() {
        let words = vec![word("Jean", 0.0), word("Dupont", 100.0), word("Paris", 250.0)];
        let (_, spans) = join_words(&words);
        // Span covering "Jean Dupont".
        let dets = vec![Detection::text_span("PERSON", 0, 11, 0.85)];
        let boxes = spans_to_word_boxes(dets, &words, &spans);
        assert_eq!(boxes.len(), 2);
    }
}
