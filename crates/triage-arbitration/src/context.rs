//! Input handed to an arbitrator.

use std::sync::Arc;
use triage_types::{
    BodyPartConfig, BucketOrder, BucketScore, DiscrepancyRecord, EvidenceItem,
    NaturalLanguageInput, Ranking, SymptomSet,
};

/// Every upstream signal of one request.
#[derive(Debug, Clone)]
pub struct ArbitrationContext {
    pub config: Arc<BodyPartConfig>,
    pub symptoms: SymptomSet,
    pub natural_language: NaturalLanguageInput,
    pub bucket_scores: Vec<BucketScore>,
    /// Carries both full rankings.
    pub discrepancy: DiscrepancyRecord,
    /// Deduplicated, tier-sorted.
    pub evidence: Vec<EvidenceItem>,
}

impl ArbitrationContext {
    pub fn body_part(&self) -> &str {
        self.config.code()
    }

    pub fn bucket_order(&self) -> &BucketOrder {
        self.config.bucket_order()
    }

    pub fn weight_ranking(&self) -> &Ranking {
        &self.discrepancy.weight_ranking
    }

    pub fn search_ranking(&self) -> &Ranking {
        &self.discrepancy.search_ranking
    }
}
