//! Pattern-based PII recognizers.
//!
//! Each recognizer owns one entity type and a set of scored regex patterns,
//! optionally with context words that boost confidence when they appear near
//! a match. Custom recognizers can be merged in from a YAML file.

use crate::{Result, RulesError};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Pattern {
    pub name: String,
    pub regex: Regex,
    pub score: f32,
}

impl Pattern {
    pub fn new(name: &str, regex: &str, score: f32) -> Result<Self> {
        let regex = Regex::new(regex).map_err(|source| RulesError::InvalidPattern {
            name: name.to_string(),
            source,
        })?;
        Ok(Self {
            name: name.to_string(),
            regex,
            score,
        })
    }
}

/// Rejects matches the regex alone cannot rule out (the regex crate has no
/// lookaround).
pub type MatchValidator = fn(&str) -> bool;

#[derive(Debug, Clone)]
pub struct PatternRecognizer {
    pub entity: String,
    pub patterns: Vec<Pattern>,
    pub context: Vec<String>,
    pub validator: Option<MatchValidator>,
}

impl PatternRecognizer {
    pub fn new(entity: &str, patterns: Vec<Pattern>, context: &[&str]) -> Self {
        Self {
            entity: entity.to_string(),
            patterns,
            context: context.iter().map(|c| c.to_string()).collect(),
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: MatchValidator) -> Self {
        self.validator = Some(validator);
        self
    }
}

// ---- YAML custom recognizers ----

#[derive(Debug, Clone, Deserialize)]
pub struct RecognizerConfigFile {
    #[serde(default)]
    pub recognizers: Vec<RecognizerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecognizerConfig {
    pub entity: String,
    pub patterns: Vec<PatternConfig>,
    #[serde(default)]
    pub context: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternConfig {
    pub name: String,
    pub regex: String,
    #[serde(default = "default_pattern_score")]
    pub score: f32,
}

fn default_pattern_score() -> f32 {
    0.5
}

impl RecognizerConfig {
    pub fn compile(&self) -> Result<PatternRecognizer> {
        let patterns = self
            .patterns
            .iter()
            .map(|p| Pattern::new(&p.name, &p.regex, p.score))
            .collect::<Result<Vec<_>>>()?;
        Ok(PatternRecognizer {
            entity: self.entity.clone(),
            patterns,
            context: self.context.clone(),
            validator: None,
        })
    }
}

/// Loads and compiles every recognizer described in a YAML config file.
pub fn load_custom_recognizers(path: &Path) -> Result<Vec<PatternRecognizer>> {
    let raw = std::fs::read_to_string(path).map_err(|source| RulesError::ConfigRead {
        path: path.display().to_string(),
        source,
    })?;
    let file: RecognizerConfigFile =
        serde_yaml::from_str(&raw).map_err(|source| RulesError::ConfigParse {
            path: path.display().to_string(),
            source,
        })?;
    file.recognizers.iter().map(|c| c.compile()).collect()
}

// ---- Built-in French recognizers ----

/// Letter groups in old-format plates that are actually common French words;
/// the regex crate cannot express the negative lookahead the pattern needs.
const PLATE_STOP_WORDS: &[&str] = &["AU", "LE", "LA", "DU", "DE", "EN", "UN", "ET", "AUX", "LES"];

fn validate_license_plate(text: &str) -> bool {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() == 3 {
        return !PLATE_STOP_WORDS.contains(&tokens[1]);
    }
    true
}

pub fn french_license_plate() -> PatternRecognizer {
    let patterns = vec![
        Pattern::new("license_plate_new", r"\b[A-Z]{2}-\d{3}-[A-Z]{2}\b", 0.8)
            .expect("static pattern"),
        // Old format: 1-4 digits, 1-3 letters, then a department code.
        Pattern::new(
            "license_plate_old",
            r"\b\d{1,4}\s[A-Z]{1,3}\s(?:0[1-9]|[1-8]\d|9[0-5]|2[AB]|97[1-8]|98[4-9])\b",
            0.6,
        )
        .expect("static pattern"),
    ];
    PatternRecognizer::new(
        "FR_LICENSE_PLATE",
        patterns,
        &["plaque", "immatriculation", "véhicule"],
    )
    .with_validator(validate_license_plate)
}

pub fn french_insurance_number() -> PatternRecognizer {
    let patterns =
        vec![Pattern::new("insurance_number", r"\b[A-Z]{2}\s?\d{8}\b", 0.8).expect("static pattern")];
    PatternRecognizer::new(
        "FR_INSURANCE_NUMBER",
        patterns,
        &["assurance", "police", "contrat"],
    )
}

pub fn french_nir() -> PatternRecognizer {
    let patterns = vec![Pattern::new(
        "nir",
        r"\b[12]\s?\d{2}\s?(?:0[1-9]|1[0-2])\s?(?:\d{2}|2[AB])\s?\d{3}\s?\d{3}\s?\d{2}\b",
        0.85,
    )
    .expect("static pattern")];
    PatternRecognizer::new("FR_NIR", patterns, &["sécurité sociale", "nir"])
}

pub fn french_iban() -> PatternRecognizer {
    let patterns = vec![Pattern::new(
        "iban_fr",
        r"\bFR\d{2}(?:\s?[A-Z0-9]{4}){5}\s?[A-Z0-9]{3}\b",
        0.8,
    )
    .expect("static pattern")];
    PatternRecognizer::new("IBAN_CODE", patterns, &["iban", "rib", "compte"])
}

pub fn email_address() -> PatternRecognizer {
    let patterns = vec![Pattern::new(
        "email",
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        0.85,
    )
    .expect("static pattern")];
    PatternRecognizer::new("EMAIL_ADDRESS", patterns, &["email", "courriel", "mail"])
}

pub fn french_phone_number() -> PatternRecognizer {
    let patterns = vec![
        Pattern::new("phone_fr", r"\b0[1-9](?:[ .\-]?\d{2}){4}\b", 0.7).expect("static pattern"),
        Pattern::new("phone_fr_intl", r"\+33\s?[1-9](?:[ .\-]?\d{2}){4}\b", 0.75)
            .expect("static pattern"),
    ];
    PatternRecognizer::new(
        "PHONE_NUMBER",
        patterns,
        &["tél", "téléphone", "portable", "fixe"],
    )
}

pub fn monetary_amount() -> PatternRecognizer {
    let patterns = vec![Pattern::new(
        "amount_eur",
        r"\b\d{1,3}(?:[ .]\d{3})*(?:,\d{2})?\s?(?:€|(?i:eur|euros?))\b",
        0.5,
    )
    .expect("static pattern")];
    PatternRecognizer::new("MONETARY_AMOUNT", patterns, &["montant", "somme"])
}

pub fn date_time() -> PatternRecognizer {
    let patterns = vec![
        Pattern::new("date_slash", r"\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b", 0.6).expect("static pattern"),
    ];
    PatternRecognizer::new("DATE_TIME", patterns, &["date", "le"])
}

pub fn cardinal() -> PatternRecognizer {
    let patterns = vec![Pattern::new("cardinal", r"\b\d{4,}\b", 0.4).expect("static pattern")];
    PatternRecognizer::new("CARDINAL", patterns, &[])
}

/// The full built-in registry.
pub fn builtin_recognizers() -> Vec<PatternRecognizer> {
    vec![
        french_license_plate(),
        french_insurance_number(),
        french_nir(),
        french_iban(),
        email_address(),
        french_phone_number(),
        monetary_amount(),
        date_time(),
        cardinal(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_match(rec: &PatternRecognizer, text: &str) -> Option<(usize, usize)> {
        for pattern in &rec.patterns {
            if let Some(m) = pattern.regex.find(text) {
                if rec.validator.map(|v| v(m.as_str())).unwrap_or(true) {
                    return Some((m.start(), m.end()));
                }
            }
        }
        None
    }

    #[test]
    fn new_format_plate_with_exact_span() {
        let rec = french_license_plate();
        assert_eq!(first_match(&rec, "Ma plaque est AA-123-BB"), Some((14, 23)));
    }

    #[test]
    fn old_format_plate_matches() {
        let rec = french_license_plate();
        assert!(first_match(&rec, "Ancienne plaque 1234 AB 75").is_some());
    }

    #[test]
    fn old_format_plate_rejects_french_words() {
        let rec = french_license_plate();
        assert_eq!(first_match(&rec, "du 12 AU 75 rue des Lilas"), None);
    }

    #[test]
    fn insurance_number_matches() {
        let rec = french_insurance_number();
        assert!(first_match(&rec, "Mon contrat AA 12345678").is_some());
    }

    #[test]
    fn custom_recognizer_yaml_compiles() {
        let file: RecognizerConfigFile = serde_yaml::from_str(
            r#"
recognizers:
  - entity: INTERNAL_REF
    patterns:
      - name: dossier_ref
        regex: "\\bDOS-\\d{6}\\b"
        score: 0.7
    context: [dossier]
"#,
        )
        .unwrap();
        let rec = file.recognizers[0].compile().unwrap();
        assert_eq!(rec.entity, "INTERNAL_REF");
        assert!(first_match(&rec, "Réf DOS-123456").is_some());
    }

    #[test]
    fn yaml_score_defaults_to_half() {
        let config: RecognizerConfig = serde_yaml::from_str(
            "entity: X\npatterns:\n  - {name: n, regex: abc}\n",
        )
        .unwrap();
        assert_eq!(config.patterns[0].score, 0.5);
    }
}
