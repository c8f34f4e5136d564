//! Pattern PII engine.
//!
//! Runs every registered recognizer over a text, boosts scores when context
//! words appear near a match, and drops matches that are protected by the
//! active allow list or fall under the score floor. Statistical NER engines
//! plug in behind the same trait.

use crate::allow_list::ExtendedAllowList;
use crate::recognizers::{builtin_recognizers, PatternRecognizer};
use dossier_core::Detection;

/// Score floor below which matches are discarded outright.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.4;

/// Confidence added when a recognizer context word appears shortly before
/// the match.
const CONTEXT_BOOST: f32 = 0.35;

/// How far back (in characters) context words are searched for.
const CONTEXT_WINDOW_CHARS: usize = 50;

/// Capability interface for text-based PII detection.
pub trait TextPiiDetector {
    fn detect_text(&self, text: &str, allow_list: &ExtendedAllowList) -> Vec<Detection>;
}

pub struct PatternEngine {
    recognizers: Vec<PatternRecognizer>,
    score_threshold: f32,
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternEngine {
    pub fn new() -> Self {
        Self {
            recognizers: builtin_recognizers(),
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }

    /// Merges additional (e.g. YAML-configured) recognizers into the registry.
    pub fn with_recognizers(mut self, extra: Vec<PatternRecognizer>) -> Self {
        self.recognizers.extend(extra);
        self
    }

    pub fn recognizer_count(&self) -> usize {
        self.recognizers.len()
    }
}

impl TextPiiDetector for PatternEngine {
    fn detect_text(&self, text: &str, allow_list: &ExtendedAllowList) -> Vec<Detection> {
        let mut detections = Vec::new();

        for recognizer in &self.recognizers {
            for pattern in &recognizer.patterns {
                for m in pattern.regex.find_iter(text) {
                    if let Some(validate) = recognizer.validator {
                        if !validate(m.as_str()) {
                            continue;
                        }
                    }
                    if allow_list.contains(m.as_str()) {
                        log::debug!(
                            "[Engine] allow-listed term skipped: {:?} ({})",
                            m.as_str(),
                            recognizer.entity
                        );
                        continue;
                    }

                    let mut score = pattern.score;
                    if has_context_before(text, m.start(), &recognizer.context) {
                        score = (score + CONTEXT_BOOST).min(1.0);
                    }
                    if score < self.score_threshold {
                        continue;
                    }

                    detections.push(
                        Detection::text_span(&recognizer.entity, m.start(), m.end(), score)
                            .with_source_text(m.as_str()),
                    );
                }
            }
        }

        detections
    }
}

fn has_context_before(text: &str, match_start: usize, context: &[String]) -> bool {
    if context.is_empty() {
        return false;
    }
    let before = &text[..match_start];
    let window_start = before
        .char_indices()
        .rev()
        .nth(CONTEXT_WINDOW_CHARS.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let window = before[window_start..].to_lowercase();
    context.iter().any(|word| window.contains(&word.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allow_list::{AllowList, AllowListConfig, ExtendedAllowList};
    use std::collections::BTreeSet;

    fn empty_allow() -> ExtendedAllowList {
        ExtendedAllowList::from_terms(&BTreeSet::new())
    }

    fn allow(terms: &[&str]) -> ExtendedAllowList {
        ExtendedAllowList::from_terms(&terms.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn detects_license_plate_with_span_and_text() {
        let engine = PatternEngine::new();
        let dets = engine.detect_text("Voici ma plaque : AB-123-CD", &empty_allow());
        let plate = dets
            .iter()
            .find(|d| d.entity_type == "FR_LICENSE_PLATE")
            .expect("plate detected");
        assert_eq!(plate.span(), Some((18, 27)));
        assert_eq!(plate.source_text.as_deref(), Some("AB-123-CD"));
    }

    #[test]
    fn context_word_boosts_score() {
        let engine = PatternEngine::new();
        let with_ctx = engine.detect_text("police d'assurance AA 12345678", &empty_allow());
        let without_ctx = engine.detect_text("référence AA 12345678", &empty_allow());
        let score_with = with_ctx
            .iter()
            .find(|d| d.entity_type == "FR_INSURANCE_NUMBER")
            .unwrap()
            .score;
        let score_without = without_ctx
            .iter()
            .find(|d| d.entity_type == "FR_INSURANCE_NUMBER")
            .unwrap()
            .score;
        assert!(score_with > score_without);
        assert!(score_with <= 1.0);
    }

    #[test]
    fn allow_listed_term_is_never_detected() {
        let engine = PatternEngine::new();
        let text = "Mon contrat AA 12345678";

        let unprotected = engine.detect_text(text, &empty_allow());
        assert!(unprotected
            .iter()
            .any(|d| d.entity_type == "FR_INSURANCE_NUMBER"));

        let protected = engine.detect_text(text, &allow(&["AA 12345678"]));
        assert!(!protected
            .iter()
            .any(|d| d.entity_type == "FR_INSURANCE_NUMBER"));
    }

    #[test]
    fn configured_merchant_term_is_protected_on_bank_statements() {
        let config: AllowListConfig = serde_yaml::from_str(
            "document_specific:\n  extrait_compte: [CARREFOUR]\n",
        )
        .unwrap();
        let list = AllowList::builtin().merged_with(&config);
        let resolved = list.resolve(Some("extrait_compte"), &BTreeSet::new());
        assert!(resolved.contains("CARREFOUR"));

        let allow = ExtendedAllowList::from_terms(&resolved);
        let text = "Paiement CARREFOUR le 12/01.";
        let engine = PatternEngine::new();
        let dets = engine.detect_text(text, &allow);

        let carrefour_span = (text.find("CARREFOUR").unwrap(), text.find("CARREFOUR").unwrap() + 9);
        assert!(dets
            .iter()
            .all(|d| d.span() != Some(carrefour_span)));
    }

    #[test]
    fn custom_yaml_recognizer_participates() {
        let config: crate::recognizers::RecognizerConfig = serde_yaml::from_str(
            "entity: INTERNAL_REF\npatterns:\n  - {name: r, regex: \"\\\\bDOS-\\\\d{6}\\\\b\", score: 0.7}\n",
        )
        .unwrap();
        let engine = PatternEngine::new().with_recognizers(vec![config.compile().unwrap()]);
        let dets = engine.detect_text("dossier DOS-123456", &empty_allow());
        assert!(dets.iter().any(|d| d.entity_type == "INTERNAL_REF"));
    }

    #[test]
    fn sub_threshold_matches_are_dropped() {
        let config: crate::recognizers::RecognizerConfig = serde_yaml::from_str(
            "entity: WEAK\npatterns:\n  - {name: w, regex: weakterm, score: 0.1}\n",
        )
        .unwrap();
        let engine = PatternEngine::new().with_recognizers(vec![config.compile().unwrap()]);
        let dets = engine.detect_text("weakterm", &empty_allow());
        assert!(!dets.iter().any(|d| d.entity_type == "WEAK"));
    }
}
