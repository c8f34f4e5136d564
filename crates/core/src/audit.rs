//! Audit trail: one JSON record per processed file.

use crate::{Detection, Location, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub filename: String,
    pub timestamp: String,
    pub detections: Vec<AuditDetection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditDetection {
    pub entity_type: String,
    pub start: usize,
    pub end: usize,
    pub score: f32,
}

impl From<&Detection> for AuditDetection {
    fn from(det: &Detection) -> Self {
        // Box-only detections carry the span of the matched source text;
        // without one they fall back to 0..len, mirroring the span the
        // detector would have reported for the recognized text.
        let (start, end) = match det.location {
            Location::TextSpan { start, end } => (start, end),
            Location::PixelBox { .. } => {
                let len = det.source_text.as_deref().map(str::len).unwrap_or(0);
                (0, len)
            }
        };
        Self {
            entity_type: det.entity_type.clone(),
            start,
            end,
            score: det.score,
        }
    }
}

impl AuditRecord {
    pub fn new(filename: &str, detections: &[Detection]) -> Self {
        Self {
            filename: filename.to_string(),
            timestamp: chrono::Local::now().to_rfc3339(),
            detections: detections.iter().map(AuditDetection::from).collect(),
        }
    }
}

/// Writes audit records into the output directory, one per input file.
pub struct AuditLogger {
    output_dir: PathBuf,
}

impl AuditLogger {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Serializes the record to `<stem>_audit.json`. The write goes through
    /// a temp file in the same directory and a rename, so a partial record
    /// is never left behind under the final name.
    pub fn log(&self, filename: &str, detections: &[Detection]) -> Result<PathBuf> {
        let record = AuditRecord::new(filename, detections);

        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);
        let audit_path = self.output_dir.join(format!("{}_audit.json", stem));

        let json = serde_json::to_string_pretty(&record)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.output_dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(&audit_path).map_err(|e| e.error)?;

        log::info!(
            "[Audit] {} detections for {} -> {}",
            record.detections.len(),
            filename,
            audit_path.display()
        );
        Ok(audit_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Detection;

    #[test]
    fn one_person_detection_serializes_once() {
        let dir = tempfile::tempdir().unwrap();
        let logger = AuditLogger::new(dir.path());

        let dets = vec![Detection::text_span("PERSON", 0, 4, 0.9)];
        let path = logger.log("test.pdf", &dets).unwrap();

        assert!(path.ends_with("test_audit.json"));
        let raw = std::fs::read_to_string(&path).unwrap();
        let record: AuditRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.filename, "test.pdf");
        assert_eq!(record.detections.len(), 1);
        assert_eq!(record.detections[0].entity_type, "PERSON");
        assert_eq!(record.detections[0].start, 0);
        assert_eq!(record.detections[0].end, 4);
    }

    #[test]
    fn box_detection_records_source_text_span() {
        let det = Detection::pixel_box("PERSON", 1.0, 2.0, 3.0, 4.0, 1.0)
            .with_source_text("Jean Dupont");
        let audit = AuditDetection::from(&det);
        assert_eq!(audit.start, 0);
        assert_eq!(audit.end, 11);
    }
}
