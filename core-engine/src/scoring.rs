//! # Priority Scorer Seam
//!
//! Inbound sync recomputes a record's priority score on every upsert. The
//! scoring formula lives behind [`PriorityScorer`] so hosts can plug in their
//! own; the engine only guarantees the seam is invoked with the fresh field
//! bag and the tenant's mappings.

use core_store::FieldMapping;
use remote_traits::FieldMap;

/// Derives a record's priority score from its field bag.
///
/// Implementations must be deterministic pure functions of their inputs:
/// the same bag and mappings always yield the same score.
pub trait PriorityScorer: Send + Sync {
    /// Score a record, or `None` to leave it unscored
    fn score(&self, fields: &FieldMap, mappings: &[FieldMapping]) -> Option<f64>;
}

/// Scorer that never assigns a score.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScorer;

impl PriorityScorer for NoopScorer {
    fn score(&self, _fields: &FieldMap, _mappings: &[FieldMapping]) -> Option<f64> {
        None
    }
}

/// Scorer that sums the weights of mapped fields present in the bag.
///
/// A field counts when the bag carries a non-null value under the mapping's
/// remote field name. Returns `None` when nothing contributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightScorer;

impl PriorityScorer for WeightScorer {
    fn score(&self, fields: &FieldMap, mappings: &[FieldMapping]) -> Option<f64> {
        let mut total = 0.0;
        let mut contributed = false;

        for mapping in mappings {
            if mapping.priority_weight == 0.0 {
                continue;
            }
            match fields.get(&mapping.remote_field_name) {
                Some(value) if !value.is_null() => {
                    total += mapping.priority_weight;
                    contributed = true;
                }
                _ => {}
            }
        }

        contributed.then_some(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_store::{MappingId, TenantId};
    use serde_json::json;

    fn mapping(name: &str, weight: f64) -> FieldMapping {
        FieldMapping {
            id: MappingId::new(),
            tenant_id: TenantId::new(),
            remote_field_id: format!("fld_{}", name),
            remote_field_name: name.to_string(),
            remote_field_type: "singleLineText".to_string(),
            display_name: name.to_string(),
            visible_in_list: true,
            visible_in_detail: true,
            sort_order: None,
            priority_weight: weight,
            created_at: 0,
        }
    }

    #[test]
    fn test_noop_scorer() {
        let mut fields = FieldMap::new();
        fields.insert("Name".to_string(), json!("Ada"));
        assert_eq!(NoopScorer.score(&fields, &[mapping("Name", 5.0)]), None);
    }

    #[test]
    fn test_weight_scorer_sums_present_fields() {
        let mut fields = FieldMap::new();
        fields.insert("Name".to_string(), json!("Ada"));
        fields.insert("Urgency".to_string(), json!("high"));
        fields.insert("Notes".to_string(), json!(null));

        let mappings = [
            mapping("Name", 1.0),
            mapping("Urgency", 2.5),
            mapping("Notes", 4.0),  // null value does not contribute
            mapping("Absent", 8.0), // missing field does not contribute
        ];

        assert_eq!(WeightScorer.score(&fields, &mappings), Some(3.5));
    }

    #[test]
    fn test_weight_scorer_none_when_nothing_contributes() {
        let fields = FieldMap::new();
        assert_eq!(WeightScorer.score(&fields, &[mapping("Name", 1.0)]), None);

        let mut fields = FieldMap::new();
        fields.insert("Name".to_string(), json!("Ada"));
        assert_eq!(WeightScorer.score(&fields, &[mapping("Name", 0.0)]), None);
    }
}
