//! Image preprocessing ahead of OCR.
//!
//! Scanned administrative documents are often noisy or unevenly lit; a
//! grayscale / denoise / adaptive-threshold pass improves word segmentation.
//! The preprocessed frame is only fed to the engine; redaction is always
//! painted on the original image so the output keeps its appearance.

use image::DynamicImage;
use imageproc::contrast::adaptive_threshold;
use imageproc::filter::median_filter;

const MEDIAN_RADIUS: u32 = 1;
const THRESHOLD_BLOCK_RADIUS: u32 = 15;

/// Grayscale, 3x3 median denoise, then adaptive binarization.
///
/// Dimensions are preserved, so word boxes found on the preprocessed frame
/// map 1:1 onto the original.
pub fn prepare_for_ocr(img: &DynamicImage) -> DynamicImage {
    let gray = img.to_luma8();
    let denoised = median_filter(&gray, MEDIAN_RADIUS, MEDIAN_RADIUS);
    let binarized = adaptive_threshold(&denoised, THRESHOLD_BLOCK_RADIUS);
    DynamicImage::ImageLuma8(binarized)
}
