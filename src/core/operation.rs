//! Operation types and their scheduling weights.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of work in the fact-checking pipeline.
///
/// Each type carries a fixed weight; higher weight is dispatched sooner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Claim extraction from a data source. Critical path.
    ClaimsExtraction,
    /// Final adjudication call with real-time search.
    AdjudicationWithSearch,
    /// Full link expansion producing new data sources.
    LinkExpansionPipeline,
    /// Scraping of a single link.
    LinkContextExpanding,
    /// Evidence retrieval for one claim from one gatherer.
    LinkEvidenceRetriever,
}

impl OperationType {
    /// Every operation type, highest weight first.
    pub const ALL: [Self; 5] = [
        Self::ClaimsExtraction,
        Self::AdjudicationWithSearch,
        Self::LinkExpansionPipeline,
        Self::LinkContextExpanding,
        Self::LinkEvidenceRetriever,
    ];

    /// Scheduling weight. Higher runs first.
    #[must_use]
    pub const fn weight(self) -> u8 {
        match self {
            Self::ClaimsExtraction => 10,
            Self::AdjudicationWithSearch => 8,
            Self::LinkExpansionPipeline => 6,
            Self::LinkContextExpanding => 5,
            Self::LinkEvidenceRetriever => 3,
        }
    }

    /// Stable snake_case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClaimsExtraction => "claims_extraction",
            Self::AdjudicationWithSearch => "adjudication_with_search",
            Self::LinkExpansionPipeline => "link_expansion_pipeline",
            Self::LinkContextExpanding => "link_context_expanding",
            Self::LinkEvidenceRetriever => "link_evidence_retriever",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
