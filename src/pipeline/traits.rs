//! Collaborator interfaces the orchestrator calls into.
//!
//! The orchestrator never looks inside claims or citations beyond a claim's
//! identifier; their schemas belong to the caller.

/// A claim that can be keyed by identifier.
pub trait ClaimRef {
    /// Stable identifier used to group citations.
    fn claim_id(&self) -> &str;
}

/// Output of one extraction job.
pub trait ClaimBatch {
    /// Claim type carried by the batch.
    type Claim: ClaimRef + Clone + Send + Sync + 'static;

    /// Claims extracted from one input item.
    fn claims(&self) -> &[Self::Claim];
}

/// Source of citations for a claim, such as a web search or a fact-check API.
///
/// `gather` runs on a worker thread and may block on network I/O.
pub trait EvidenceGatherer<C, Ct>: Send + Sync {
    /// Name used in logs and evidence records.
    fn source_name(&self) -> &str;

    /// Look up citations for `claim`.
    ///
    /// # Errors
    ///
    /// Any failure; the orchestrator counts it as zero citations.
    fn gather(&self, claim: &C) -> anyhow::Result<Vec<Ct>>;
}
