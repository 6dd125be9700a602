//! Tests for audit sink

use factcheck_scheduler::core::{
    AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, JobId, JobMeta, OperationType, PartitionKey,
};

fn meta(partition: Option<&str>) -> JobMeta {
    JobMeta {
        id: JobId::new(),
        operation: OperationType::ClaimsExtraction,
        partition: partition.map(PartitionKey::from),
        sequence: 7,
        created_at_ms: 0,
    }
}

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);
    let job = meta(Some("run-1"));

    sink.record(AuditEvent::new(&job, AuditAction::Submitted));
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].job_id, job.id);
    assert_eq!(events[0].operation, OperationType::ClaimsExtraction);
    assert_eq!(events[0].action, AuditAction::Submitted);
    assert!(events[0].at_ms > 0);
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);
    let jobs: Vec<JobMeta> = (0..3).map(|_| meta(None)).collect();
    for job in &jobs {
        sink.record(AuditEvent::new(job, AuditAction::Submitted));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].job_id, jobs[1].id); // first one popped
    assert_eq!(events[1].job_id, jobs[2].id);
}

#[test]
fn test_audit_event_serializes_action_snake_case() {
    let event = AuditEvent::new(&meta(Some("run-9")), AuditAction::Cancelled);
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["action"], "cancelled");
    assert_eq!(json["operation"], "claims_extraction");
    assert_eq!(json["partition"], "run-9");
}

#[test]
fn test_audit_sink_as_trait_object() {
    let sink = std::sync::Arc::new(InMemoryAuditSink::new(4));
    let dyn_sink: std::sync::Arc<dyn AuditSink> = sink.clone();
    dyn_sink.record(AuditEvent::new(&meta(None), AuditAction::Failed));
    assert_eq!(sink.events_with(AuditAction::Failed).len(), 1);
    assert!(sink.events_with(AuditAction::Succeeded).is_empty());
}
