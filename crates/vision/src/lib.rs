//! Vision-model document analysis.
//!
//! A multimodal model receives the page image plus a French instruction
//! prompt and returns the document type and PII entities with normalized
//! bounding boxes. The wire adapter lives in [`gemini`]; everything here is
//! transport-independent.

pub mod gemini;

pub use gemini::GeminiClient;

use dossier_core::Detection;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, VisionError>;

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("GOOGLE_API_KEY is not set")]
    MissingApiKey,
    #[error("vision api request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected vision api response: {0}")]
    BadResponse(String),
    #[error("cannot parse vision model output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("vision api unavailable after {attempts} attempts")]
    Unavailable { attempts: u32 },
}

/// Retry schedule for transient API failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Structured model output: detected document type plus entities with
/// `[ymin, xmin, ymax, xmax]` boxes normalized to 0-1000.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VlmAnalysis {
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub entities: Vec<VlmEntity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VlmEntity {
    pub entity_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub box_2d: Vec<f32>,
}

/// Capability interface for multimodal page analysis.
pub trait VisionModelClient: Send {
    fn analyze(&self, png_bytes: &[u8], prompt: &str) -> Result<VlmAnalysis>;
}

/// Builds the French instruction prompt embedding the known document types
/// and the protected-term rules, and pinning the JSON answer shape.
pub fn build_prompt(
    doc_types: &[&str],
    global_allow: &[String],
    per_type_allow: &BTreeMap<String, Vec<String>>,
) -> String {
    let mut doc_specific_rules = String::new();
    for (doc_type, terms) in per_type_allow {
        doc_specific_rules.push_str(&format!(
            "- {} : ne pas anonymiser {}\n",
            doc_type,
            terms.join(", ")
        ));
    }

    format!(
        "Vous êtes un expert en anonymisation de documents français. Votre tâche est \
d'analyser l'image d'un document fournie et de :\n\
1. Identifier le type de document parmi cette liste : {}.\n\
2. Détecter toutes les informations personnelles (PII) à anonymiser.\n\
\n\
Entités à anonymiser :\n\
- Noms de personnes (PERSON)\n\
- Adresses postales (LOCATION)\n\
- Numéros de téléphone (PHONE_NUMBER)\n\
- Adresses e-mail (EMAIL_ADDRESS)\n\
- Numéros de sécurité sociale (FR_NIR)\n\
- Numéros de comptes bancaires (IBAN/BBAN)\n\
- Plaques d'immatriculation (FR_LICENSE_PLATE)\n\
- Numéros de police d'assurance (FR_INSURANCE_NUMBER)\n\
\n\
Règles de protection (NE PAS ANONYMISER) :\n\
- Liste globale : {}.\n\
- Par type de document :\n{}\n\
Pour chaque entité détectée (qui n'est pas dans les listes de protection), vous devez \
fournir le texte exact et ses coordonnées sous forme de boîte englobante \
[ymin, xmin, ymax, xmax] avec des valeurs normalisées de 0 à 1000.\n\
\n\
Répondez EXCLUSIVEMENT sous format JSON avec la structure suivante :\n\
{{\n\
  \"document_type\": \"type_détecté\",\n\
  \"entities\": [\n\
    {{\n\
      \"entity_type\": \"TYPE_ENTITE\",\n\
      \"text\": \"texte détecté\",\n\
      \"box_2d\": [ymin, xmin, ymax, xmax]\n\
    }}\n\
  ]\n\
}}\n",
        doc_types.join(", "),
        global_allow.join(", "),
        doc_specific_rules
    )
}

/// Converts the model's normalized boxes into pixel-space detections.
/// Entities with a malformed box are dropped.
pub fn to_pixel_detections(analysis: &VlmAnalysis, img_width: u32, img_height: u32) -> Vec<Detection> {
    let (w, h) = (img_width as f32, img_height as f32);
    analysis
        .entities
        .iter()
        .filter(|e| e.box_2d.len() == 4)
        .map(|e| {
            let (ymin, xmin, ymax, xmax) = (e.box_2d[0], e.box_2d[1], e.box_2d[2], e.box_2d[3]);
            let left = xmin * w / 1000.0;
            let top = ymin * h / 1000.0;
            let right = xmax * w / 1000.0;
            let bottom = ymax * h / 1000.0;
            Detection::pixel_box(&e.entity_type, left, top, right, bottom, 1.0)
                .with_source_text(&e.text)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::Location;

    #[test]
    fn normalized_boxes_scale_to_pixels() {
        let analysis = VlmAnalysis {
            document_type: Some("facture".to_string()),
            entities: vec![VlmEntity {
                entity_type: "PERSON".to_string(),
                text: "Jean Dupont".to_string(),
                box_2d: vec![100.0, 200.0, 150.0, 400.0],
            }],
        };
        let dets = to_pixel_detections(&analysis, 1000, 1000);
        assert_eq!(dets.len(), 1);
        match dets[0].location {
            Location::PixelBox {
                left,
                top,
                right,
                bottom,
            } => {
                assert_eq!((left, top, right, bottom), (200.0, 100.0, 400.0, 150.0));
            }
            _ => panic!("expected pixel box"),
        }
        assert_eq!(dets[0].score, 1.0);
    }

    #[test]
    fn malformed_boxes_are_dropped() {
        let analysis = VlmAnalysis {
            document_type: None,
            entities: vec![VlmEntity {
                entity_type: "PERSON".to_string(),
                text: "x".to_string(),
                box_2d: vec![1.0, 2.0],
            }],
        };
        assert!(to_pixel_detections(&analysis, 800, 600).is_empty());
    }

    #[test]
    fn analysis_parses_from_model_json() {
        let raw = r#"{"document_type": "constat_amiable", "entities": [
            {"entity_type": "FR_LICENSE_PLATE", "text": "AB-123-CD", "box_2d": [10, 20, 30, 40]}
        ]}"#;
        let analysis: VlmAnalysis = serde_json::from_str(raw).unwrap();
        assert_eq!(analysis.document_type.as_deref(), Some("constat_amiable"));
        assert_eq!(analysis.entities[0].entity_type, "FR_LICENSE_PLATE");
    }

    #[test]
    fn prompt_embeds_types_and_protected_terms() {
        let mut per_type = BTreeMap::new();
        per_type.insert("facture".to_string(), vec!["TVA".to_string()]);
        let prompt = build_prompt(
            &["facture", "quittance"],
            &["euro".to_string()],
            &per_type,
        );
        assert!(prompt.contains("facture, quittance"));
        assert!(prompt.contains("Liste globale : euro."));
        assert!(prompt.contains("- facture : ne pas anonymiser TVA"));
        assert!(prompt.contains("[ymin, xmin, ymax, xmax]"));
    }
}
