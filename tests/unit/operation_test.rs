//! Tests for operation weights and dispatch keys

use factcheck_scheduler::core::{OperationType, PartitionKey, PriorityKey};

#[test]
fn test_weights_are_ordered() {
    let weights: Vec<u8> = OperationType::ALL.iter().map(|op| op.weight()).collect();
    assert_eq!(weights, vec![10, 8, 6, 5, 3]);
}

#[test]
fn test_priority_key_weight_then_sequence() {
    let early_light = PriorityKey::new(OperationType::LinkEvidenceRetriever, 1);
    let late_heavy = PriorityKey::new(OperationType::ClaimsExtraction, 99);
    let late_light = PriorityKey::new(OperationType::LinkEvidenceRetriever, 2);

    assert!(late_heavy > early_light);
    assert!(early_light > late_light);
    assert_eq!(late_light.sequence(), 2);
}

#[test]
fn test_operation_names() {
    assert_eq!(OperationType::LinkContextExpanding.to_string(), "link_context_expanding");
    let json = serde_json::to_string(&OperationType::AdjudicationWithSearch).unwrap();
    assert_eq!(json, "\"adjudication_with_search\"");
}

#[test]
fn test_generated_partition_keys_are_unique() {
    let a = PartitionKey::generate("run");
    let b = PartitionKey::generate("run");
    assert_ne!(a, b);
    assert!(a.as_str().starts_with("run"));
}
