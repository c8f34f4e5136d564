//! Core data model for the redaction pipeline.

pub mod audit;
pub mod dedup;
pub mod policy;

pub use audit::{AuditDetection, AuditLogger, AuditRecord};
pub use dedup::dedupe;
pub use policy::{DocTypePolicy, PolicyTable};

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where a detection was found: a byte span in extracted text, or a pixel
/// rectangle on an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    TextSpan {
        start: usize,
        end: usize,
    },
    PixelBox {
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
    },
}

/// One candidate PII occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub entity_type: String,
    pub location: Location,
    pub score: f32,
    /// Raw matched text, when the detector can report it.
    pub source_text: Option<String>,
}

impl Detection {
    pub fn text_span(entity_type: impl Into<String>, start: usize, end: usize, score: f32) -> Self {
        debug_assert!(start <= end);
        Self {
            entity_type: entity_type.into(),
            location: Location::TextSpan { start, end },
            score,
            source_text: None,
        }
    }

    pub fn pixel_box(
        entity_type: impl Into<String>,
        left: f32,
        top: f32,
        right: f32,
        bottom: f32,
        score: f32,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            location: Location::PixelBox {
                left,
                top,
                right,
                bottom,
            },
            score,
            source_text: None,
        }
    }

    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }

    /// Text span of the detection, if it has one.
    pub fn span(&self) -> Option<(usize, usize)> {
        match self.location {
            Location::TextSpan { start, end } => Some((start, end)),
            Location::PixelBox { .. } => None,
        }
    }
}

/// Entity types the pipeline treats specially. Detectors may report other
/// types; these constants back the policy tables and defaults.
pub mod entities {
    pub const PERSON: &str = "PERSON";
    pub const LOCATION: &str = "LOCATION";
    pub const EMAIL_ADDRESS: &str = "EMAIL_ADDRESS";
    pub const PHONE_NUMBER: &str = "PHONE_NUMBER";
    pub const IBAN_CODE: &str = "IBAN_CODE";
    pub const FR_NIR: &str = "FR_NIR";
    pub const FR_LICENSE_PLATE: &str = "FR_LICENSE_PLATE";
    pub const FR_INSURANCE_NUMBER: &str = "FR_INSURANCE_NUMBER";
    pub const MONETARY_AMOUNT: &str = "MONETARY_AMOUNT";
    pub const DATE_TIME: &str = "DATE_TIME";
    pub const CARDINAL: &str = "CARDINAL";
}

/// Entity types ignored by default: noisy and rarely sensitive on their own.
pub fn default_ignored_entities() -> Vec<String> {
    vec![
        entities::DATE_TIME.to_string(),
        entities::CARDINAL.to_string(),
    ]
}
