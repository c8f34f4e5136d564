//! Detection filtering.
//!
//! Every detection stream, whatever its source, goes through the same
//! funnel: user/default ignore list first, then the document-type policy
//! (confidence floor and per-type exclusions), then deduplication.

use dossier_core::{dedupe, Detection, DocTypePolicy};
use std::collections::BTreeSet;

pub fn apply_filters(
    detections: Vec<Detection>,
    ignored: &BTreeSet<String>,
    policy: &DocTypePolicy,
) -> Vec<Detection> {
    let kept: Vec<Detection> = detections
        .into_iter()
        .filter(|d| !ignored.contains(&d.entity_type))
        .filter(|d| d.score >= policy.min_score)
        .filter(|d| !policy.excluded_entities.iter().any(|e| e == &d.entity_type))
        .collect();
    dedupe(kept)
}
