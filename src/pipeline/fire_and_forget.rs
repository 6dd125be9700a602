//! Fire-and-forget evidence orchestration.
//!
//! Extraction jobs are fired up front. As each one finishes, evidence jobs for
//! its claims are fired immediately, one per claim per gatherer, so evidence
//! work for fast sources starts while slow sources are still extracting. An
//! optional link-expansion job feeds more items back into extraction. A final
//! drain waits for every evidence job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::traits::{ClaimBatch, ClaimRef, EvidenceGatherer};
use crate::config::PipelineConfig;
use crate::core::{Completion, ErrorPolicy, OperationType, PartitionKey, Scheduler, SchedulerError};

/// Link expansion: derives more input items from the original ones.
pub type ExpandFn<I> = Box<dyn FnOnce(Vec<I>) -> anyhow::Result<Vec<I>> + Send + 'static>;

/// Value produced by one evidence job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceBatch<Ct> {
    /// Claim the citations belong to.
    pub claim_id: String,
    /// Gatherer that produced them.
    pub source: String,
    /// Citations found.
    pub citations: Vec<Ct>,
}

/// Progress counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Extraction jobs fired, including those fed by expansion.
    pub extraction_jobs_submitted: usize,
    /// Extraction jobs observed finished, failures included.
    pub extraction_jobs_completed: usize,
    /// Evidence jobs fired.
    pub evidence_jobs_submitted: usize,
    /// Evidence jobs observed finished, failures included.
    pub evidence_jobs_completed: usize,
    /// An expansion job is still outstanding.
    pub pending_expansion: bool,
}

/// Result of a run.
#[derive(Debug, Clone)]
pub struct EvidenceReport<O: ClaimBatch, Ct> {
    /// Successful extraction outputs, in completion order.
    pub extraction_outputs: Vec<O>,
    /// Every claim seen, by id.
    pub claims: HashMap<String, O::Claim>,
    /// Citations per claim id; every seen claim has an entry.
    pub citations: HashMap<String, Vec<Ct>>,
    /// Final counters.
    pub counters: RunCounters,
}

impl<O: ClaimBatch, Ct> EvidenceReport<O, Ct> {
    /// Total citations across all claims.
    #[must_use]
    pub fn total_citations(&self) -> usize {
        self.citations.values().map(Vec::len).sum()
    }
}

/// State owned by the orchestrating thread for one run.
struct Run<'a, I, C, O, Ct, E> {
    scheduler: &'a Scheduler,
    partition: PartitionKey,
    extract_fn: Arc<E>,
    gatherers: &'a [Arc<dyn EvidenceGatherer<C, Ct>>],
    counters: RunCounters,
    outputs: Vec<O>,
    claims: HashMap<String, C>,
    citations: HashMap<String, Vec<Ct>>,
    _items: std::marker::PhantomData<fn(I)>,
}

/// Extract claims from `items` and gather evidence for each claim as soon as
/// its extraction finishes.
///
/// The run's jobs are tagged with a fresh partition key, so concurrent runs
/// on one scheduler never see each other's completions. The partition is
/// released on every exit path: records left on the streams are discarded
/// and jobs still running when the run gives up publish nothing. Extraction
/// failures count as zero claims and evidence failures as zero citations;
/// both are logged and the run continues.
///
/// # Errors
///
/// `NotInitialized` if the scheduler is not running, `TimeoutExceeded` if the
/// evidence drain outlasts `config.drain_timeout_secs`.
pub fn run_fire_and_forget<I, C, O, Ct, E>(
    scheduler: &Scheduler,
    config: &PipelineConfig,
    items: Vec<I>,
    extract_fn: E,
    gatherers: &[Arc<dyn EvidenceGatherer<C, Ct>>],
    expand_fn: Option<ExpandFn<I>>,
) -> Result<EvidenceReport<O, Ct>, SchedulerError>
where
    I: Clone + Send + Sync + 'static,
    C: ClaimRef + Clone + Send + Sync + 'static,
    O: ClaimBatch<Claim = C> + Clone + Send + Sync + 'static,
    Ct: Clone + Send + Sync + 'static,
    E: Fn(I) -> anyhow::Result<O> + Send + Sync + 'static,
{
    config.validate().map_err(SchedulerError::InvalidConfig)?;

    let mut run = Run {
        scheduler,
        partition: PartitionKey::generate("fire-and-forget"),
        extract_fn: Arc::new(extract_fn),
        gatherers,
        counters: RunCounters::default(),
        outputs: Vec::new(),
        claims: HashMap::new(),
        citations: HashMap::new(),
        _items: std::marker::PhantomData,
    };
    info!(
        partition = %run.partition,
        items = items.len(),
        gatherers = gatherers.len(),
        expansion = expand_fn.is_some(),
        "starting fire-and-forget run"
    );

    let result = run.execute(items, expand_fn, config);
    let discarded = scheduler.release_partition(&run.partition);
    debug!(partition = %run.partition, discarded, "released run partition");
    result?;

    info!(
        partition = %run.partition,
        outputs = run.outputs.len(),
        claims = run.claims.len(),
        citations = run.citations.values().map(Vec::len).sum::<usize>(),
        "fire-and-forget run completed"
    );
    Ok(EvidenceReport {
        extraction_outputs: run.outputs,
        claims: run.claims,
        citations: run.citations,
        counters: run.counters,
    })
}

impl<I, C, O, Ct, E> Run<'_, I, C, O, Ct, E>
where
    I: Clone + Send + Sync + 'static,
    C: ClaimRef + Clone + Send + Sync + 'static,
    O: ClaimBatch<Claim = C> + Clone + Send + Sync + 'static,
    Ct: Clone + Send + Sync + 'static,
    E: Fn(I) -> anyhow::Result<O> + Send + Sync + 'static,
{
    fn execute(
        &mut self,
        items: Vec<I>,
        expand_fn: Option<ExpandFn<I>>,
        config: &PipelineConfig,
    ) -> Result<(), SchedulerError> {
        if let Some(expand) = expand_fn {
            let seeds = items.clone();
            let _ = self.scheduler.submit_with_partition(
                OperationType::LinkExpansionPipeline,
                self.partition.clone(),
                move || expand(seeds),
            )?;
            self.counters.pending_expansion = true;
        }
        for item in items {
            self.fire_extraction(item)?;
        }
        self.stream(config)?;
        self.drain(config)
    }

    fn fire_extraction(&mut self, item: I) -> Result<(), SchedulerError> {
        let extract = Arc::clone(&self.extract_fn);
        let _ = self.scheduler.submit_with_partition(
            OperationType::ClaimsExtraction,
            self.partition.clone(),
            move || extract(item),
        )?;
        self.counters.extraction_jobs_submitted += 1;
        Ok(())
    }

    fn fire_evidence(&mut self, output: &O) -> Result<(), SchedulerError> {
        for claim in output.claims() {
            let claim_id = claim.claim_id().to_string();
            self.claims.insert(claim_id.clone(), claim.clone());
            self.citations.entry(claim_id.clone()).or_default();

            for gatherer in self.gatherers {
                let gatherer = Arc::clone(gatherer);
                let claim = claim.clone();
                let claim_id = claim_id.clone();
                let _ = self.scheduler.submit_with_partition(
                    OperationType::LinkEvidenceRetriever,
                    self.partition.clone(),
                    move || {
                        let source = gatherer.source_name().to_string();
                        let citations = gatherer
                            .gather(&claim)
                            .with_context(|| format!("{source} failed for claim {claim_id}"))?;
                        Ok(EvidenceBatch {
                            claim_id,
                            source,
                            citations,
                        })
                    },
                )?;
                self.counters.evidence_jobs_submitted += 1;
            }
        }
        Ok(())
    }

    /// Interleave the extraction and expansion streams until every extraction
    /// has reported and no expansion is outstanding.
    fn stream(&mut self, config: &PipelineConfig) -> Result<(), SchedulerError> {
        while self.counters.extraction_jobs_completed < self.counters.extraction_jobs_submitted
            || self.counters.pending_expansion
        {
            if let Some(done) = self.poll(OperationType::ClaimsExtraction, config.poll_interval())? {
                self.on_extraction(&done)?;
            }
            if self.counters.pending_expansion {
                if let Some(done) = self.poll(OperationType::LinkExpansionPipeline, Duration::ZERO)? {
                    self.on_expansion(&done)?;
                }
            }
        }
        info!(
            partition = %self.partition,
            extractions = self.counters.extraction_jobs_completed,
            evidence_jobs = self.counters.evidence_jobs_submitted,
            "all extractions reported; draining evidence"
        );
        Ok(())
    }

    fn poll(&self, operation: OperationType, timeout: Duration) -> Result<Option<Completion>, SchedulerError> {
        match self
            .scheduler
            .await_next(operation, Some(timeout), Some(&self.partition), ErrorPolicy::ReturnAsValue)
        {
            Ok(done) => Ok(Some(done)),
            Err(e) if e.is_timeout() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn on_extraction(&mut self, done: &Completion) -> Result<(), SchedulerError> {
        self.counters.extraction_jobs_completed += 1;
        match done.value::<O>() {
            Ok(output) => {
                info!(
                    partition = %self.partition,
                    completed = self.counters.extraction_jobs_completed,
                    submitted = self.counters.extraction_jobs_submitted,
                    claims = output.claims().len(),
                    "claim extraction completed"
                );
                self.fire_evidence(&output)?;
                self.outputs.push(output);
            }
            Err(e) => warn!(partition = %self.partition, job_id = %done.job_id, error = %e, "claim extraction failed"),
        }
        Ok(())
    }

    fn on_expansion(&mut self, done: &Completion) -> Result<(), SchedulerError> {
        self.counters.pending_expansion = false;
        match done.value::<Vec<I>>() {
            Ok(new_items) => {
                info!(partition = %self.partition, new_items = new_items.len(), "link expansion completed");
                for item in new_items {
                    self.fire_extraction(item)?;
                }
            }
            Err(e) => warn!(partition = %self.partition, job_id = %done.job_id, error = %e, "link expansion failed"),
        }
        Ok(())
    }

    /// Wait for every evidence job, grouping citations by claim id.
    fn drain(&mut self, config: &PipelineConfig) -> Result<(), SchedulerError> {
        let drain_timeout = config.drain_timeout();
        let deadline = drain_timeout.and_then(|t| Instant::now().checked_add(t));
        let heartbeat = config.drain_heartbeat();

        while self.counters.evidence_jobs_completed < self.counters.evidence_jobs_submitted {
            let wait = deadline.map_or(heartbeat, |d| heartbeat.min(d.saturating_duration_since(Instant::now())));
            let Some(done) = self.poll(OperationType::LinkEvidenceRetriever, wait)? else {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    warn!(
                        partition = %self.partition,
                        completed = self.counters.evidence_jobs_completed,
                        submitted = self.counters.evidence_jobs_submitted,
                        "evidence drain timed out"
                    );
                    return Err(SchedulerError::timeout(
                        format!("evidence drain of partition {}", self.partition),
                        drain_timeout,
                    ));
                }
                info!(
                    partition = %self.partition,
                    completed = self.counters.evidence_jobs_completed,
                    submitted = self.counters.evidence_jobs_submitted,
                    "still draining evidence"
                );
                continue;
            };

            self.on_evidence(&done);
        }
        Ok(())
    }

    /// Group one evidence job's citations under its claim. Batches for claims
    /// this run never extracted are dropped.
    fn on_evidence(&mut self, done: &Completion) {
        self.counters.evidence_jobs_completed += 1;
        let batch = match done.value::<EvidenceBatch<Ct>>() {
            Ok(batch) => batch,
            Err(e) => {
                warn!(partition = %self.partition, error = %e, "evidence gathering failed");
                return;
            }
        };
        let Some(citations) = self.citations.get_mut(&batch.claim_id) else {
            warn!(
                partition = %self.partition,
                claim_id = %batch.claim_id,
                source = %batch.source,
                "received citations for unknown claim"
            );
            return;
        };
        debug!(
            claim_id = %batch.claim_id,
            source = %batch.source,
            citations = batch.citations.len(),
            completed = self.counters.evidence_jobs_completed,
            submitted = self.counters.evidence_jobs_submitted,
            "evidence gathered"
        );
        citations.extend(batch.citations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use crate::core::{JobId, JobValue};

    #[derive(Debug, Clone)]
    struct Claim(String);

    impl ClaimRef for Claim {
        fn claim_id(&self) -> &str {
            &self.0
        }
    }

    #[derive(Debug, Clone)]
    struct Claims(Vec<Claim>);

    impl ClaimBatch for Claims {
        type Claim = Claim;

        fn claims(&self) -> &[Claim] {
            &self.0
        }
    }

    type Extract = fn(String) -> anyhow::Result<Claims>;

    fn evidence(claim_id: &str, citations: &[&str]) -> Completion {
        Completion {
            job_id: JobId::new(),
            operation: OperationType::LinkEvidenceRetriever,
            partition: None,
            outcome: Ok(JobValue::new(EvidenceBatch {
                claim_id: claim_id.to_string(),
                source: "search".to_string(),
                citations: citations.iter().map(|c| (*c).to_string()).collect::<Vec<_>>(),
            })),
        }
    }

    #[test]
    fn test_citations_for_unknown_claim_are_dropped() {
        let scheduler = Scheduler::new(SchedulerConfig::default()).unwrap();
        let extract: Extract = |_| Ok(Claims(Vec::new()));
        let mut run: Run<'_, String, Claim, Claims, String, Extract> = Run {
            scheduler: &scheduler,
            partition: PartitionKey::from("run"),
            extract_fn: Arc::new(extract),
            gatherers: &[],
            counters: RunCounters::default(),
            outputs: Vec::new(),
            claims: HashMap::new(),
            citations: HashMap::new(),
            _items: std::marker::PhantomData,
        };
        run.claims.insert("c1".to_string(), Claim("c1".to_string()));
        run.citations.insert("c1".to_string(), Vec::new());

        run.on_evidence(&evidence("c1", &["https://example.org/a"]));
        run.on_evidence(&evidence("ghost", &["https://example.org/b"]));
        run.on_evidence(&evidence("c1", &["https://example.org/c"]));

        assert_eq!(run.counters.evidence_jobs_completed, 3);
        assert_eq!(run.citations.len(), 1);
        assert!(!run.citations.contains_key("ghost"));
        assert_eq!(run.citations["c1"], vec!["https://example.org/a", "https://example.org/c"]);
    }
}
