//! PDF access and physical redaction.
//!
//! Reading, text search and rasterization go through pdfium ([`reader`]);
//! document mutation goes through lopdf. Pages with a native text layer get
//! a character-level content-stream scrub plus black box overlays
//! ([`scrub`]); scanned pages are replaced wholesale by a redacted raster
//! ([`replace`]).

pub mod content;
pub mod reader;
pub mod replace;
pub mod scrub;

pub use content::{detect_page_kind, get_media_box, get_page_content, set_page_content, PageKind};
pub use reader::{PdfRasterizer, TermHit};
pub use replace::{replace_page_with_jpeg, save_document};
pub use scrub::{paint_black_boxes, scrub_content_stream};

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, PdfError>;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("pdfium library unavailable: {0}")]
    PdfiumUnavailable(String),
    #[error("cannot load pdf: {0}")]
    Load(String),
    #[error("page {0} not found")]
    PageNotFound(usize),
    #[error("cannot render page: {0}")]
    Render(String),
    #[error("malformed content stream: {0}")]
    Content(#[from] lopdf::Error),
    #[error("cannot save pdf: {0}")]
    Save(String),
}

/// Rectangle normalized to the page, top-left origin, all values 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Rectangle in PDF user space (points, bottom-left origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl MaskRect {
    /// Converts a normalized top-left rect into user-space coordinates
    /// against the page media box. Rotated pages are treated as upright;
    /// rotated scans go down the raster path anyway.
    pub fn from_page_rect(rect: &PageRect, media_box: (f32, f32, f32, f32)) -> Self {
        let (llx, lly, urx, ury) = media_box;
        let page_width = urx - llx;
        let page_height = ury - lly;
        Self {
            x: llx + rect.x * page_width,
            y: lly + (1.0 - rect.y - rect.height) * page_height,
            width: rect.width * page_width,
            height: rect.height * page_height,
        }
    }

    pub fn intersects(&self, x: f32, y: f32, width: f32, height: f32) -> bool {
        x < self.x + self.width
            && x + width > self.x
            && y < self.y + self.height
            && y + height > self.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_rect_converts_to_user_space() {
        // A4-ish page; rect in the top-left quadrant.
        let rect = PageRect {
            x: 0.1,
            y: 0.1,
            width: 0.2,
            height: 0.05,
        };
        let mask = MaskRect::from_page_rect(&rect, (0.0, 0.0, 600.0, 800.0));
        assert!((mask.x - 60.0).abs() < 1e-3);
        // Top-left origin flips to bottom-left: y = (1 - 0.1 - 0.05) * 800.
        assert!((mask.y - 680.0).abs() < 1e-3);
        assert!((mask.width - 120.0).abs() < 1e-3);
        assert!((mask.height - 40.0).abs() < 1e-3);
    }

    #[test]
    fn mask_intersection() {
        let mask = MaskRect {
            x: 100.0,
            y: 100.0,
            width: 50.0,
            height: 20.0,
        };
        assert!(mask.intersects(110.0, 105.0, 10.0, 10.0));
        assert!(!mask.intersects(200.0, 105.0, 10.0, 10.0));
        assert!(!mask.intersects(110.0, 300.0, 10.0, 10.0));
    }
}
