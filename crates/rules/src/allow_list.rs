//! Protected-term allow lists.
//!
//! Terms on the allow list are never redacted regardless of detector
//! confidence. The base sets are built once at startup (built-ins plus an
//! optional YAML file) and are read-only afterwards; resolution and case
//! extension are pure functions over them.

use crate::{Result, RulesError};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct AllowList {
    global: BTreeSet<String>,
    per_type: BTreeMap<String, BTreeSet<String>>,
}

/// YAML shape: `{global: [terms], document_specific: {doc_type: [terms]}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllowListConfig {
    #[serde(default)]
    pub global: Vec<String>,
    #[serde(default)]
    pub document_specific: BTreeMap<String, Vec<String>>,
}

impl AllowListConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| RulesError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| RulesError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }
}

impl AllowList {
    /// Built-in protected vocabulary: administrative terms that look like
    /// PII to detectors but are not sensitive in context.
    pub fn builtin() -> Self {
        let global = ["euro", "euros", "montant", "total", "TVA", "SIRET"]
            .into_iter()
            .map(String::from)
            .collect();

        let mut per_type: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut insert = |doc_type: &str, terms: &[&str]| {
            per_type.insert(
                doc_type.to_string(),
                terms.iter().map(|t| t.to_string()).collect(),
            );
        };
        insert("facture", &["Facture", "HT", "TTC", "Remise"]);
        insert("quittance", &["Loyer", "Charges", "Provision", "Quittance"]);
        insert("extrait_compte", &["Solde", "Virement", "Prélèvement"]);
        insert("bail_location", &["Bailleur", "Locataire", "Loyer"]);
        insert("constat_amiable", &["Constat", "Amiable", "Assuré"]);

        Self { global, per_type }
    }

    /// Folds a config file into the base sets. Construction-time only.
    pub fn merged_with(mut self, config: &AllowListConfig) -> Self {
        self.global.extend(config.global.iter().cloned());
        for (doc_type, terms) in &config.document_specific {
            self.per_type
                .entry(doc_type.clone())
                .or_default()
                .extend(terms.iter().cloned());
        }
        self
    }

    pub fn global_terms(&self) -> &BTreeSet<String> {
        &self.global
    }

    pub fn per_type_terms(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.per_type
    }

    /// global ∪ per_type[doc_type] ∪ extra_terms, deduplicated.
    pub fn resolve(&self, doc_type: Option<&str>, extra_terms: &BTreeSet<String>) -> BTreeSet<String> {
        let mut resolved = self.global.clone();
        if let Some(doc_type) = doc_type {
            if let Some(terms) = self.per_type.get(doc_type) {
                resolved.extend(terms.iter().cloned());
            }
        }
        resolved.extend(extra_terms.iter().cloned());
        resolved
    }
}

/// Adds lower/UPPER/Capitalized variants of every term.
pub fn extend_case_insensitive(terms: &BTreeSet<String>) -> BTreeSet<String> {
    let mut extended = terms.clone();
    for term in terms {
        extended.insert(term.to_lowercase());
        extended.insert(term.to_uppercase());
        extended.insert(capitalize(term));
    }
    extended
}

fn capitalize(term: &str) -> String {
    let mut chars = term.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Case-extended allow set with constant-time case-insensitive lookup.
#[derive(Debug, Clone)]
pub struct ExtendedAllowList {
    terms: BTreeSet<String>,
    lowered: BTreeSet<String>,
}

impl ExtendedAllowList {
    pub fn from_terms(terms: &BTreeSet<String>) -> Self {
        let extended = extend_case_insensitive(terms);
        let lowered = extended.iter().map(|t| t.to_lowercase()).collect();
        Self {
            terms: extended,
            lowered,
        }
    }

    pub fn terms(&self) -> &BTreeSet<String> {
        &self.terms
    }

    /// True when `text` (trimmed) equals a protected term, ignoring case.
    pub fn contains(&self, text: &str) -> bool {
        self.lowered.contains(&text.trim().to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
