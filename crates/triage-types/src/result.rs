//! The value handed to exercise recommendation.

use serde::Serialize;

use crate::bucket::{BucketCode, Ranking};
use crate::discrepancy::DiscrepancyRecord;
use crate::evidence::Citation;
use crate::red_flag::RedFlagResult;

/// Score breakdown of one bucket on the weight path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketScore {
    pub bucket: BucketCode,
    pub score: f64,
    /// Share of the total score in percent, 0 when the total is 0.
    pub percentage: f64,
    pub contributing_codes: Vec<String>,
}

/// Terminal output of one graph run.
///
/// Contains no timestamps or ids so that a replayed run serializes to the
/// same bytes as the original.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalResult {
    pub body_part: String,
    pub final_bucket: Option<BucketCode>,
    pub confidence: f64,
    pub evidence_summary: String,
    pub reasoning: String,
    /// How a disagreement between the two rankings was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<String>,
    pub has_red_flag: bool,
    pub skip_exercise: bool,
    pub bucket_scores: Vec<BucketScore>,
    pub weight_ranking: Ranking,
    pub search_ranking: Ranking,
    pub merged_ranking: Ranking,
    pub discrepancy: DiscrepancyRecord,
    pub red_flag: RedFlagResult,
    pub citations: Vec<Citation>,
}
