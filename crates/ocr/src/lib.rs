//! OCR engine interface and the Tesseract CLI adapter.

pub mod preprocess;
pub mod tesseract;

pub use preprocess::prepare_for_ocr;
pub use tesseract::TesseractOcr;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, OcrError>;

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("cannot run ocr binary: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("ocr engine failed: {0}")]
    EngineFailed(String),
    #[error("cannot encode image for ocr: {0}")]
    Image(#[from] image::ImageError),
}

/// Which OCR profile to use for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    /// Printed text (machine-set documents).
    #[default]
    Print,
    /// Handwriting-heavy documents such as accident-report forms.
    Handwriting,
}

impl std::fmt::Display for OcrEngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcrEngineKind::Print => write!(f, "print"),
            OcrEngineKind::Handwriting => write!(f, "handwriting"),
        }
    }
}

/// One recognized word with its pixel bounding box.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    /// 0.0 - 1.0
    pub confidence: f32,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Capability interface for OCR text extraction.
pub trait OcrEngine: Send {
    fn recognize(&self, img: &DynamicImage) -> Result<Vec<OcrWord>>;

    fn kind(&self) -> OcrEngineKind;
}
