//! Benchmarks for the factcheck scheduler.
//!
//! Benchmarks cover:
//! - Completion stream publish/next, filtered and unfiltered
//! - Batch submission through the priority queue to the worker pool
//! - Mixed-weight scheduling with a single worker
//! - Parallel map over a shared scheduler

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::seq::SliceRandom;
use std::hint::black_box;
use std::time::Duration;

use factcheck_scheduler::builders::SchedulerBuilder;
use factcheck_scheduler::core::{Completion, JobId, JobValue, OperationType, PartitionKey, Scheduler};
use factcheck_scheduler::infra::CompletionStream;
use factcheck_scheduler::wait_all;

// ============================================================================
// Helper Functions
// ============================================================================

fn build_completion(id: u64, partition: &PartitionKey) -> Completion {
    Completion {
        job_id: JobId::new(),
        operation: OperationType::LinkEvidenceRetriever,
        partition: Some(partition.clone()),
        outcome: Ok(JobValue::new(id)),
    }
}

fn start_scheduler(workers: usize) -> Scheduler {
    SchedulerBuilder::new()
        .max_workers(workers)
        .dispatch_poll_ms(5)
        .start()
        .expect("scheduler starts")
}

fn shuffled_operations(count: usize) -> Vec<OperationType> {
    let mut ops: Vec<OperationType> = OperationType::ALL.iter().copied().cycle().take(count).collect();
    ops.shuffle(&mut rand::rng());
    ops
}

// ============================================================================
// Completion Stream Benchmarks
// ============================================================================

fn bench_stream_publish_next(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_publish_next");
    let partition = PartitionKey::from("bench-run");

    for size in [10_u64, 100, 1000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let stream = CompletionStream::new();
                for i in 0..size {
                    stream.publish(build_completion(i, &partition));
                }
                while let Some(done) = stream.next(Some(Duration::ZERO), None) {
                    black_box(done);
                }
            });
        });
    }
    group.finish();
}

fn bench_stream_filtered_next(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_filtered_next");
    let wanted = PartitionKey::from("bench-wanted");
    let other = PartitionKey::from("bench-other");

    // Every wanted record sits behind `noise` records of another partition.
    for noise in [0_u64, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(noise), &noise, |b, &noise| {
            b.iter(|| {
                let stream = CompletionStream::new();
                for i in 0..10 {
                    for n in 0..noise {
                        stream.publish(build_completion(n, &other));
                    }
                    stream.publish(build_completion(i, &wanted));
                }
                for _ in 0..10 {
                    black_box(stream.next(Some(Duration::ZERO), Some(&wanted)));
                }
            });
        });
    }
    group.finish();
}

// ============================================================================
// Scheduler Benchmarks
// ============================================================================

fn bench_submit_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_submit_batch");
    let scheduler = start_scheduler(4);

    for job_count in [10_u64, 100, 500] {
        group.throughput(Throughput::Elements(job_count));
        group.bench_with_input(BenchmarkId::from_parameter(job_count), &job_count, |b, &job_count| {
            b.iter(|| {
                let jobs = (0..job_count).map(|i| (OperationType::LinkEvidenceRetriever, move || Ok::<_, anyhow::Error>(i)));
                let handles = scheduler.submit_batch(jobs, None).expect("submit");
                black_box(wait_all(&handles, None).expect("all complete"));
            });
        });
    }
    group.finish();
    scheduler.shutdown(true);
}

fn bench_mixed_priorities(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_mixed_priorities");
    let scheduler = start_scheduler(1);

    group.bench_function("single_worker_shuffled_weights", |b| {
        b.iter(|| {
            let jobs = shuffled_operations(100)
                .into_iter()
                .map(|op| (op, move || Ok::<_, anyhow::Error>(op.weight())));
            let handles = scheduler.submit_batch(jobs, None).expect("submit");
            black_box(wait_all(&handles, None).expect("all complete"));
        });
    });
    group.finish();
    scheduler.shutdown(true);
}

fn bench_map_blocking(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_map_blocking");
    let scheduler = start_scheduler(4);

    for size in [16_u64, 128] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let out = scheduler
                    .map_blocking(OperationType::LinkContextExpanding, 0..size, |i| Ok::<_, anyhow::Error>(i * 2))
                    .expect("map");
                black_box(out);
            });
        });
    }
    group.finish();
    scheduler.shutdown(true);
}

criterion_group!(stream_benches, bench_stream_publish_next, bench_stream_filtered_next);

criterion_group!(scheduler_benches, bench_submit_batch, bench_mixed_priorities, bench_map_blocking);

criterion_main!(stream_benches, scheduler_benches);
