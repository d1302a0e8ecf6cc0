//! Masking: replace sensitive spans with type-tagged placeholders
//!
//! Replacement runs in descending `begin_offset` order. This is a
//! correctness requirement, not a style choice: placeholder length
//! generally differs from span length, so ascending replacement would
//! invalidate the offsets of every not-yet-processed entity.

use triage_types::Entity;

/// Drop overlapping spans, keeping the higher-confidence entity.
///
/// Extractors do not guarantee non-overlapping output. Ties on
/// confidence are broken toward the earlier, then longer, span so the
/// result is deterministic for identical input.
pub fn resolve_overlaps(entities: &[Entity]) -> Vec<&Entity> {
    let mut candidates: Vec<&Entity> = entities.iter().collect();
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.begin_offset.cmp(&b.begin_offset))
            .then(b.end_offset.cmp(&a.end_offset))
    });

    let mut kept: Vec<&Entity> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept.iter().all(|k| !k.overlaps(candidate)) {
            kept.push(candidate);
        }
    }
    kept
}

/// Mask the given spans of `text` with `[{TYPE}_REDACTED]`
/// placeholders.
///
/// Offsets are char offsets; splicing happens on a char vector so
/// multi-byte payloads cannot be split mid-codepoint. A span is only
/// replaced if it still carries the entity's original text, which
/// makes masking idempotent: re-masking an already-masked payload with
/// the same entity set is a no-op. Spans that do not fit the payload
/// are skipped.
pub fn mask_payload(text: &str, spans: &[&Entity]) -> String {
    let mut chars: Vec<char> = text.chars().collect();

    let mut ordered: Vec<&Entity> = spans.to_vec();
    ordered.sort_by(|a, b| b.begin_offset.cmp(&a.begin_offset));

    for entity in ordered {
        if !entity.is_well_formed(chars.len()) {
            continue;
        }
        let current: String = chars[entity.begin_offset..entity.end_offset].iter().collect();
        if current != entity.text {
            continue;
        }
        let placeholder = format!("[{}_REDACTED]", entity.entity_type);
        chars.splice(
            entity.begin_offset..entity.end_offset,
            placeholder.chars(),
        );
    }

    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(text: &str, entity_type: &str, confidence: f64, begin: usize, end: usize) -> Entity {
        Entity::new(text, "PHI", entity_type, confidence, begin, end)
    }

    #[test]
    fn test_mask_single_span() {
        //            0123456789
        let text = "Dr. Smith saw the patient";
        let spans = vec![entity("Smith", "NAME", 0.95, 4, 9)];
        let refs: Vec<&Entity> = spans.iter().collect();
        assert_eq!(mask_payload(text, &refs), "Dr. [NAME_REDACTED] saw the patient");
    }

    #[test]
    fn test_mask_preserves_relative_order() {
        let text = "Alice emailed bob@x.io today";
        let spans = vec![
            entity("Alice", "NAME", 0.9, 0, 5),
            entity("bob@x.io", "EMAIL", 0.9, 14, 22),
        ];
        let refs: Vec<&Entity> = spans.iter().collect();
        let masked = mask_payload(text, &refs);
        assert_eq!(masked, "[NAME_REDACTED] emailed [EMAIL_REDACTED] today");

        let name_pos = masked.find("[NAME_REDACTED]").unwrap();
        let email_pos = masked.find("[EMAIL_REDACTED]").unwrap();
        assert!(name_pos < email_pos);
    }

    #[test]
    fn test_mask_arbitrary_input_order() {
        let text = "Alice emailed bob@x.io today";
        // Ascending input order must produce the same result
        let spans = vec![
            entity("bob@x.io", "EMAIL", 0.9, 14, 22),
            entity("Alice", "NAME", 0.9, 0, 5),
        ];
        let refs: Vec<&Entity> = spans.iter().collect();
        assert_eq!(
            mask_payload(text, &refs),
            "[NAME_REDACTED] emailed [EMAIL_REDACTED] today"
        );
    }

    #[test]
    fn test_mask_idempotent() {
        let text = "Alice called 555-1234";
        let spans = vec![
            entity("Alice", "NAME", 0.9, 0, 5),
            entity("555-1234", "PHONE_OR_FAX", 0.85, 13, 21),
        ];
        let refs: Vec<&Entity> = spans.iter().collect();
        let once = mask_payload(text, &refs);
        let twice = mask_payload(&once, &refs);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_mask_multibyte_payload() {
        // Char offsets, not byte offsets: "é" counts as one
        let text = "Seen at caf\u{e9} by Ren\u{e9}e";
        let spans = vec![entity("Ren\u{e9}e", "NAME", 0.9, 16, 21)];
        let refs: Vec<&Entity> = spans.iter().collect();
        assert_eq!(mask_payload(text, &refs), "Seen at caf\u{e9} by [NAME_REDACTED]");
    }

    #[test]
    fn test_mask_skips_out_of_bounds_span() {
        let text = "short";
        let spans = vec![entity("ghost", "NAME", 0.9, 10, 15)];
        let refs: Vec<&Entity> = spans.iter().collect();
        assert_eq!(mask_payload(text, &refs), "short");
    }

    #[test]
    fn test_overlap_drops_lower_confidence() {
        let spans = vec![
            entity("John Smith", "NAME", 0.95, 0, 10),
            entity("Smith", "ID", 0.60, 5, 10),
        ];
        let kept = resolve_overlaps(&spans);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].entity_type, "NAME");
        assert_eq!(kept[0].confidence, 0.95);
    }

    #[test]
    fn test_overlap_masking_single_placeholder() {
        let text = "John Smith was admitted";
        let spans = vec![
            entity("John Smith", "NAME", 0.95, 0, 10),
            entity("Smith", "ID", 0.60, 5, 10),
        ];
        let kept = resolve_overlaps(&spans);
        let masked = mask_payload(text, &kept);
        assert_eq!(masked, "[NAME_REDACTED] was admitted");
        assert_eq!(masked.matches("_REDACTED]").count(), 1);
    }

    #[test]
    fn test_non_overlapping_all_kept() {
        let spans = vec![
            entity("a", "NAME", 0.5, 0, 1),
            entity("b", "ID", 0.9, 2, 3),
            entity("c", "DATE", 0.7, 4, 5),
        ];
        assert_eq!(resolve_overlaps(&spans).len(), 3);
    }

    #[test]
    fn test_overlap_tie_is_deterministic() {
        let spans = vec![
            entity("ab", "NAME", 0.8, 0, 2),
            entity("bc", "ID", 0.8, 1, 3),
        ];
        let kept = resolve_overlaps(&spans);
        assert_eq!(kept.len(), 1);
        // Equal confidence: the earlier span wins
        assert_eq!(kept[0].begin_offset, 0);
    }
}
