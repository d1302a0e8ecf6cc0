//! Sensitivity partitioning and tier classification

use crate::masking::{mask_payload, resolve_overlaps};
use triage_types::{Entity, Payload, RiskAssessment, RiskConfig};

/// Check whether an entity falls under the sensitivity allow-list,
/// either by specific type or by extractor category.
pub fn is_sensitive(entity: &Entity, config: &RiskConfig) -> bool {
    config.sensitive_types.contains(&entity.entity_type)
        || config.sensitive_categories.contains(&entity.category)
}

/// Assess the risk of a payload given its extracted entities.
///
/// Pure and deterministic: identical entity input yields an identical
/// assessment. Classification runs on the raw sensitive counts;
/// overlap resolution only affects masking, so a malformed extractor
/// span can never lower the reported tier.
pub fn assess(payload: &Payload, entities: &[Entity], config: &RiskConfig) -> RiskAssessment {
    let sensitive: Vec<&Entity> = entities
        .iter()
        .filter(|e| is_sensitive(e, config))
        .collect();

    let sensitive_count = sensitive.len();
    let high_confidence_sensitive_count = sensitive
        .iter()
        .filter(|e| e.confidence >= config.confidence_threshold)
        .count();

    let sensitive_types = sensitive
        .iter()
        .map(|e| e.entity_type.clone())
        .collect();

    let risk_level = config.classify(sensitive_count, high_confidence_sensitive_count);

    let owned: Vec<Entity> = sensitive.into_iter().cloned().collect();
    let maskable = resolve_overlaps(&owned);
    let masked_payload = mask_payload(&payload.text, &maskable);

    RiskAssessment {
        risk_level,
        total_entities: entities.len(),
        sensitive_count,
        high_confidence_sensitive_count,
        sensitive_types,
        masked_payload,
    }
}
