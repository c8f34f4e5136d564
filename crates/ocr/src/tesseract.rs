//! Tesseract CLI wrapper.
//!
//! Shells out to the `tesseract` binary and parses its TSV output into
//! word-level boxes. Two profiles are exposed: a printed-text profile and a
//! sparse-text profile tuned for handwriting-heavy forms.

use crate::{OcrEngine, OcrEngineKind, OcrError, OcrWord, Result};
use image::DynamicImage;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

const DEFAULT_LANG: &str = "fra";
const PSM_PRINT: u8 = 6;
const PSM_SPARSE: u8 = 11;
const OEM_LSTM: u8 = 1;

pub struct TesseractOcr {
    binary: String,
    lang: String,
    tessdata_path: Option<String>,
    psm: u8,
    oem: u8,
    kind: OcrEngineKind,
}

impl TesseractOcr {
    /// Printed-text profile (uniform block segmentation).
    pub fn print() -> Self {
        Self {
            binary: "tesseract".to_string(),
            lang: DEFAULT_LANG.to_string(),
            tessdata_path: None,
            psm: PSM_PRINT,
            oem: OEM_LSTM,
            kind: OcrEngineKind::Print,
        }
    }

    /// Sparse-text profile for handwriting-heavy forms, where words float
    /// outside any block structure.
    pub fn handwriting() -> Self {
        Self {
            psm: PSM_SPARSE,
            kind: OcrEngineKind::Handwriting,
            ..Self::print()
        }
    }

    pub fn for_kind(kind: OcrEngineKind) -> Self {
        match kind {
            OcrEngineKind::Print => Self::print(),
            OcrEngineKind::Handwriting => Self::handwriting(),
        }
    }

    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }

    pub fn with_tessdata(mut self, path: &str) -> Self {
        self.tessdata_path = Some(path.to_string());
        self
    }

    pub fn recognize_file(&self, image_path: &Path) -> Result<Vec<OcrWord>> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.binary);
        cmd.arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("--oem")
            .arg(self.oem.to_string())
            .arg("tsv");
        if let Some(tessdata) = &self.tessdata_path {
            cmd.env("TESSDATA_PREFIX", tessdata);
        }

        log::debug!(
            "[Tesseract] {} {} -l {} --psm {} --oem {} tsv",
            self.binary,
            image_path.display(),
            self.lang,
            self.psm,
            self.oem
        );

        let output = cmd.output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::EngineFailed(stderr.trim().to_string()));
        }

        let words = parse_tesseract_tsv(&String::from_utf8_lossy(&output.stdout));

        log::info!(
            "[Tesseract] {} profile: {} words in {} ms",
            self.kind,
            words.len(),
            start.elapsed().as_millis()
        );

        Ok(words)
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, img: &DynamicImage) -> Result<Vec<OcrWord>> {
        let temp_dir = tempfile::tempdir().map_err(OcrError::Spawn)?;
        let temp_input = temp_dir.path().join("ocr_input.png");
        img.save(&temp_input)?;
        self.recognize_file(&temp_input)
    }

    fn kind(&self) -> OcrEngineKind {
        self.kind
    }
}

/// Parses Tesseract TSV output into word-level results.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Only word rows (level 5) with a
/// non-negative confidence are kept; boxes stay in pixel coordinates.
fn parse_tesseract_tsv(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();

    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }

        let level: i32 = cols[0].parse().unwrap_or(-1);
        let left: f32 = cols[6].parse().unwrap_or(0.0);
        let top: f32 = cols[7].parse().unwrap_or(0.0);
        let width: f32 = cols[8].parse().unwrap_or(0.0);
        let height: f32 = cols[9].parse().unwrap_or(0.0);
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();

        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        words.push(OcrWord {
            text: text.to_string(),
            // Tesseract confidences are 0-100.
            confidence: conf / 100.0,
            left,
            top,
            width,
            height,
        });
    }

    words
}

/// Probes the installed Tesseract version, for startup diagnostics.
pub fn tesseract_version(binary: &str) -> Result<String> {
    let output = Command::new(binary).arg("--version").output()?;
    if !output.status.success() {
        return Err(OcrError::EngineFailed(
            "tesseract --version failed".to_string(),
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined = format!("{}{}", stdout, stderr);

    for line in combined.lines() {
        if line.contains("tesseract") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                return Ok(parts[1].trim_start_matches('v').to_string());
            }
        }
    }

    Ok("unknown".to_string())
}
