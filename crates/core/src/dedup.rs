//! Duplicate-detection filter.
//!
//! The same span can be reported twice when OCR and the vision fallback are
//! both consulted, or when allow-list case variants cause double matching.

use crate::{Detection, Location};
use std::collections::HashSet;

/// Removes detections that collide on identical location and entity type.
/// The first occurrence wins; order is otherwise preserved.
pub fn dedupe(detections: Vec<Detection>) -> Vec<Detection> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(detections.len());

    for det in detections {
        let key = match det.location {
            Location::TextSpan { start, end } => {
                format!("{},{},{}", start, end, det.entity_type)
            }
            Location::PixelBox {
                left,
                top,
                right,
                bottom,
            } => format!(
                "{:.3},{:.3},{:.3},{:.3},{}",
                left, top, right, bottom, det.entity_type
            ),
        };
        if seen.insert(key) {
            result.push(det);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Detection;

    #[test]
    fn identical_spans_collapse_to_one() {
        let dets = vec![
            Detection::text_span("PERSON", 0, 4, 0.9),
            Detection::text_span("PERSON", 0, 4, 0.7),
        ];
        let out = dedupe(dets);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].score, 0.9);
    }

    #[test]
    fn same_span_different_entity_survives() {
        let dets = vec![
            Detection::text_span("PERSON", 0, 4, 0.9),
            Detection::text_span("LOCATION", 0, 4, 0.9),
        ];
        assert_eq!(dedupe(dets).len(), 2);
    }

    #[test]
    fn identical_boxes_collapse() {
        let dets = vec![
            Detection::pixel_box("PERSON", 10.0, 20.0, 30.0, 40.0, 1.0),
            Detection::pixel_box("PERSON", 10.0, 20.0, 30.0, 40.0, 1.0),
            Detection::pixel_box("PERSON", 10.0, 20.0, 30.0, 41.0, 1.0),
        ];
        assert_eq!(dedupe(dets).len(), 2);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let dets = vec![
            Detection::text_span("PERSON", 0, 4, 0.9),
            Detection::text_span("PERSON", 0, 4, 0.9),
            Detection::pixel_box("IBAN_CODE", 1.0, 2.0, 3.0, 4.0, 0.8),
        ];
        let once = dedupe(dets);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }
}
