//! Tests for error types

use std::time::Duration;

use factcheck_scheduler::core::{JobError, JobErrorKind, JobId, OperationType, SchedulerError};

#[test]
fn test_not_initialized_error() {
    let err = SchedulerError::NotInitialized;
    assert_eq!(format!("{err}"), "scheduler not initialized; call initialize() first");
    assert!(!err.is_timeout());
}

#[test]
fn test_timeout_error() {
    let err = SchedulerError::TimeoutExceeded {
        waiting_for: "claims_extraction completion".to_string(),
        timeout: Duration::from_millis(250),
    };
    assert!(err.is_timeout());
    assert_eq!(format!("{err}"), "timed out after 250ms waiting for claims_extraction completion");
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("max_workers must be greater than 0".to_string());
    assert_eq!(format!("{err}"), "invalid configuration: max_workers must be greater than 0");
}

#[test]
fn test_job_failed_error_exposes_source() {
    let job_id = JobId::new();
    let err = SchedulerError::JobFailed {
        job_id,
        operation: OperationType::LinkEvidenceRetriever,
        source: JobError::failed(anyhow::anyhow!("rate limited")),
    };
    let text = format!("{err}");
    assert!(text.starts_with("link_evidence_retriever job "));
    assert!(text.ends_with("failed: rate limited"));

    let source = std::error::Error::source(&err).expect("source present");
    assert_eq!(source.to_string(), "rate limited");
}

#[test]
fn test_job_error_from_anyhow() {
    let err: JobError = anyhow::anyhow!("bad json").context("parse claims").into();
    assert_eq!(err.kind(), JobErrorKind::Failed);
    assert!(!err.is_cancelled());
    assert_eq!(err.to_string(), "parse claims: bad json");
    assert_eq!(err.inner().root_cause().to_string(), "bad json");
}
