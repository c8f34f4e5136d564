//! Document-type catalog and keyword classifier.

/// Weight applied to keyword occurrences found in the filename rather than
/// the body. Occurrence-count scoring: every occurrence counts, a filename
/// occurrence counts ten times.
pub const FILENAME_BONUS: u32 = 10;

#[derive(Debug, Clone)]
pub struct DocumentTypeProfile {
    pub id: &'static str,
    pub keywords: &'static [&'static str],
}

/// Scores the fixed profile catalog against filename + sample text.
///
/// Ties resolve to the first profile in catalog order; the catalog order is
/// therefore part of the contract and covered by tests.
pub struct DocumentTypeClassifier {
    profiles: Vec<DocumentTypeProfile>,
}

impl Default for DocumentTypeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTypeClassifier {
    pub fn new() -> Self {
        Self {
            profiles: builtin_profiles(),
        }
    }

    pub fn profiles(&self) -> &[DocumentTypeProfile] {
        &self.profiles
    }

    pub fn doc_type_ids(&self) -> Vec<&'static str> {
        self.profiles.iter().map(|p| p.id).collect()
    }

    /// Best-scoring document type, or None when nothing matches at all.
    pub fn classify(&self, text: &str, filename: &str) -> Option<&'static str> {
        let mut best: Option<(&'static str, u32)> = None;
        for (id, score) in self.scores(text, filename) {
            if score > best.map(|(_, s)| s).unwrap_or(0) {
                best = Some((id, score));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Per-profile scores in catalog order.
    pub fn scores(&self, text: &str, filename: &str) -> Vec<(&'static str, u32)> {
        let body = text.to_lowercase();
        let name = filename.to_lowercase();

        self.profiles
            .iter()
            .map(|profile| {
                let score: u32 = profile
                    .keywords
                    .iter()
                    .map(|kw| {
                        let in_body = body.matches(kw).count() as u32;
                        let in_name = name.matches(kw).count() as u32;
                        in_body + in_name * FILENAME_BONUS
                    })
                    .sum();
                (profile.id, score)
            })
            .collect()
    }
}

fn builtin_profiles() -> Vec<DocumentTypeProfile> {
    vec![
        DocumentTypeProfile {
            id: "facture",
            keywords: &["facture", "tva", "total ht", "total ttc"],
        },
        DocumentTypeProfile {
            id: "quittance",
            keywords: &["quittance", "loyer"],
        },
        DocumentTypeProfile {
            id: "bail_location",
            keywords: &["contrat de location", "bail", "locataire", "bailleur"],
        },
        DocumentTypeProfile {
            id: "extrait_compte",
            keywords: &["relevé de compte", "extrait de compte", "bancaire", "solde", "iban"],
        },
        DocumentTypeProfile {
            id: "avis_imposition",
            keywords: &["avis d'imposition", "imposition", "impôt", "revenu fiscal"],
        },
        DocumentTypeProfile {
            id: "bulletin_salaire",
            keywords: &["bulletin de salaire", "salaire", "paie", "net imposable"],
        },
        DocumentTypeProfile {
            id: "certificat_medical",
            keywords: &["certificat médical", "médecin", "aptitude"],
        },
        DocumentTypeProfile {
            id: "constat_amiable",
            keywords: &["constat", "accident", "véhicule", "conducteur"],
        },
        DocumentTypeProfile {
            id: "expertise",
            keywords: &["expertise", "expert"],
        },
        DocumentTypeProfile {
            id: "plainte",
            keywords: &["plainte", "dépôt de plainte", "procès-verbal", "commissariat"],
        },
        DocumentTypeProfile {
            id: "etat_perte",
            keywords: &["état de perte", "perte", "sinistre"],
        },
        DocumentTypeProfile {
            id: "courrier_assureur",
            keywords: &["assureur", "courrier", "adverse"],
        },
        DocumentTypeProfile {
            id: "bulletin_hospitalisation",
            keywords: &["bulletin de situation", "hospitalisation", "hospitalière", "hôpital"],
        },
        DocumentTypeProfile {
            id: "arret_travail",
            keywords: &["arrêt de travail", "incapacité temporaire"],
        },
        DocumentTypeProfile {
            id: "releve_social",
            keywords: &["organisme social", "prestations", "allocations", "cpam"],
        },
    ]
}

/// Accident-report style documents get the handwriting-capable OCR profile.
pub fn is_handwriting_prone(doc_type: &str) -> bool {
    doc_type.contains("constat")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> Option<&'static str> {
        DocumentTypeClassifier::new().classify(text, "")
    }

    #[test]
    fn detects_facture() {
        assert_eq!(
            classify("Facture d'achat pour un ordinateur portable."),
            Some("facture")
        );
    }

    #[test]
    fn detects_bulletin_salaire() {
        assert_eq!(
            classify("Ceci est un bulletin de salaire pour le mois de Janvier."),
            Some("bulletin_salaire")
        );
    }

    #[test]
    fn detects_certificat_medical() {
        assert_eq!(
            classify("Certificat médical d'aptitude au sport."),
            Some("certificat_medical")
        );
    }

    #[test]
    fn detects_remaining_doc_types() {
        let cases = [
            ("avis d'imposition 2023", "avis_imposition"),
            ("relevé de compte bancaire", "extrait_compte"),
            ("contrat de location appartement", "bail_location"),
            ("convocation à une expertise médicale", "expertise"),
            ("déclaration de dépôt de plainte", "plainte"),
            ("état de perte suite au sinistre", "etat_perte"),
            ("courrier de l'assureur adverse", "courrier_assureur"),
            ("bulletin de situation hospitalière", "bulletin_hospitalisation"),
            ("attestation d'arrêt de travail", "arret_travail"),
            ("relevé de l'organisme social", "releve_social"),
        ];
        for (text, expected) in cases {
            assert_eq!(classify(text), Some(expected), "text: {text}");
        }
    }

    #[test]
    fn no_keywords_means_no_type() {
        assert_eq!(classify("Bonjour, voici un document quelconque."), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn ties_resolve_to_first_profile_in_catalog_order() {
        // One occurrence each; facture precedes quittance in the catalog.
        assert_eq!(classify("facture quittance"), Some("facture"));
    }

    #[test]
    fn filename_occurrences_outweigh_body_occurrences() {
        let classifier = DocumentTypeClassifier::new();
        assert_eq!(
            classifier.classify("quittance", "facture_2023.pdf"),
            Some("facture")
        );
    }

    #[test]
    fn more_occurrences_never_lower_the_score() {
        let classifier = DocumentTypeClassifier::new();
        let once: u32 = score_of(&classifier, "facture", "facture");
        let thrice = score_of(&classifier, "facture", "facture facture facture");
        assert!(thrice >= once);
        assert_eq!(thrice, 3 * once);
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier = DocumentTypeClassifier::new();
        let text = "relevé de compte bancaire, solde au 31/12";
        let first = classifier.classify(text, "releve.pdf");
        for _ in 0..10 {
            assert_eq!(classifier.classify(text, "releve.pdf"), first);
        }
    }

    #[test]
    fn constat_is_handwriting_prone() {
        assert!(is_handwriting_prone("constat_amiable"));
        assert!(!is_handwriting_prone("facture"));
    }

    fn score_of(classifier: &DocumentTypeClassifier, id: &str, text: &str) -> u32 {
        classifier
            .scores(text, "")
            .into_iter()
            .find(|(p, _)| *p == id)
            .map(|(_, s)| s)
            .unwrap()
    }
}
