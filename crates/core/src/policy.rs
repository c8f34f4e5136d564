//! Document-type filtering policies.
//!
//! A table lookup replaces per-type conditional chains: each document type
//! maps to a minimum confidence threshold and a set of entity types that are
//! never redacted for that type.

use crate::entities;
use std::collections::BTreeMap;

/// Default minimum score, matching the engine's own floor.
pub const DEFAULT_MIN_SCORE: f32 = 0.4;

#[derive(Debug, Clone)]
pub struct DocTypePolicy {
    pub min_score: f32,
    pub excluded_entities: Vec<String>,
}

impl Default for DocTypePolicy {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            excluded_entities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PolicyTable {
    overrides: BTreeMap<String, DocTypePolicy>,
    default: DocTypePolicy,
}

impl PolicyTable {
    /// Built-in policies: stricter thresholds for financial documents,
    /// a looser one for handwriting-heavy accident reports, and monetary
    /// amounts left alone on invoices and rent receipts.
    pub fn builtin() -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "extrait_compte".to_string(),
            DocTypePolicy {
                min_score: 0.6,
                excluded_entities: Vec::new(),
            },
        );
        overrides.insert(
            "avis_imposition".to_string(),
            DocTypePolicy {
                min_score: 0.6,
                excluded_entities: Vec::new(),
            },
        );
        overrides.insert(
            "facture".to_string(),
            DocTypePolicy {
                min_score: 0.5,
                excluded_entities: vec![entities::MONETARY_AMOUNT.to_string()],
            },
        );
        overrides.insert(
            "quittance".to_string(),
            DocTypePolicy {
                min_score: DEFAULT_MIN_SCORE,
                excluded_entities: vec![entities::MONETARY_AMOUNT.to_string()],
            },
        );
        overrides.insert(
            "bulletin_salaire".to_string(),
            DocTypePolicy {
                min_score: 0.5,
                excluded_entities: Vec::new(),
            },
        );
        overrides.insert(
            "constat_amiable".to_string(),
            DocTypePolicy {
                min_score: 0.35,
                excluded_entities: Vec::new(),
            },
        );
        Self {
            overrides,
            default: DocTypePolicy::default(),
        }
    }

    pub fn lookup(&self, doc_type: Option<&str>) -> &DocTypePolicy {
        doc_type
            .and_then(|t| self.overrides.get(t))
            .unwrap_or(&self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_type_gets_default() {
        let table = PolicyTable::builtin();
        assert_eq!(table.lookup(Some("plainte")).min_score, DEFAULT_MIN_SCORE);
        assert_eq!(table.lookup(None).min_score, DEFAULT_MIN_SCORE);
    }

    #[test]
    fn bank_statements_are_stricter_than_accident_reports() {
        let table = PolicyTable::builtin();
        let bank = table.lookup(Some("extrait_compte")).min_score;
        let constat = table.lookup(Some("constat_amiable")).min_score;
        assert!(bank > constat);
    }

    #[test]
    fn invoices_keep_monetary_amounts() {
        let table = PolicyTable::builtin();
        assert!(table
            .lookup(Some("facture"))
            .excluded_entities
            .iter()
            .any(|e| e == entities::MONETARY_AMOUNT));
    }
}
