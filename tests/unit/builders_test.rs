//! Tests for builders

use std::sync::Arc;

use factcheck_scheduler::builders::SchedulerBuilder;
use factcheck_scheduler::config::SchedulerConfig;
use factcheck_scheduler::core::{AuditAction, InMemoryAuditSink, OperationType, SchedulerError};

#[test]
fn test_builder_rejects_invalid_config() {
    let err = SchedulerBuilder::new().max_workers(0).build().unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidConfig(_)));
}

#[test]
fn test_build_does_not_start() {
    let scheduler = SchedulerBuilder::new().max_workers(2).build().unwrap();
    assert!(!scheduler.is_initialized());
    assert_eq!(scheduler.config().max_workers, 2);

    let err = scheduler.submit(OperationType::ClaimsExtraction, || Ok(1_u32)).unwrap_err();
    assert!(matches!(err, SchedulerError::NotInitialized));
}

#[test]
fn test_start_with_config_and_audit() {
    let sink = Arc::new(InMemoryAuditSink::new(64));
    let config = SchedulerConfig::default().with_max_workers(2).with_dispatch_poll_ms(10);
    let scheduler = SchedulerBuilder::with_config(config)
        .shutdown_timeout_secs(5)
        .audit(sink.clone())
        .start()
        .unwrap();
    assert!(scheduler.is_initialized());

    let handle = scheduler.submit(OperationType::AdjudicationWithSearch, || Ok(42_u32)).unwrap();
    assert_eq!(handle.wait().unwrap(), 42);
    scheduler.shutdown(true);

    assert_eq!(sink.events_with(AuditAction::Submitted).len(), 1);
    assert_eq!(sink.events_with(AuditAction::Succeeded).len(), 1);
}
