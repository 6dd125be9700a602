//! Tests for the completion stream

use std::time::{Duration, Instant};

use factcheck_scheduler::core::{Completion, JobError, JobId, JobValue, OperationType, PartitionKey};
use factcheck_scheduler::infra::CompletionStream;

fn completion(partition: Option<&str>, outcome: Result<JobValue, JobError>) -> Completion {
    Completion {
        job_id: JobId::new(),
        operation: OperationType::ClaimsExtraction,
        partition: partition.map(PartitionKey::from),
        outcome,
    }
}

#[test]
fn test_unfiltered_next_sees_every_partition() {
    let stream = CompletionStream::new();
    stream.publish(completion(Some("run-a"), Ok(JobValue::new(1_u32))));
    stream.publish(completion(None, Ok(JobValue::new(2_u32))));

    let first = stream.next(Some(Duration::ZERO), None).unwrap();
    assert_eq!(first.value::<u32>().unwrap(), 1);
    let second = stream.next(Some(Duration::ZERO), None).unwrap();
    assert_eq!(second.value::<u32>().unwrap(), 2);
    assert!(stream.is_empty());
}

#[test]
fn test_next_times_out() {
    let stream = CompletionStream::new();
    let start = Instant::now();
    assert!(stream.next(Some(Duration::from_millis(50)), None).is_none());
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(45));
    assert!(elapsed < Duration::from_millis(500));
}

#[test]
fn test_failed_completion_value() {
    let stream = CompletionStream::new();
    stream.publish(completion(None, Err(JobError::failed(anyhow::anyhow!("no claims")))));

    let done = stream.next(Some(Duration::ZERO), None).unwrap();
    assert!(!done.is_success());
    assert!(done.value::<u32>().is_err());
}
