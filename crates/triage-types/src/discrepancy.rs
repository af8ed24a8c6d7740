//! Disagreement between the weight path and the search path.

use serde::Serialize;

use crate::bucket::{BucketCode, Ranking};

/// A bucket whose position moved by two or more places between paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankShift {
    pub bucket: BucketCode,
    pub weight_position: usize,
    pub search_position: usize,
}

/// Both rankings and whether their top buckets disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscrepancyRecord {
    pub weight_ranking: Ranking,
    pub search_ranking: Ranking,
    pub has_discrepancy: bool,
    /// Weight score of the weight-path top minus weight score of the
    /// search-path top. Zero without a discrepancy.
    pub gap: f64,
    /// No retrieved item voted, so the search ranking is tie-break order.
    pub search_abstained: bool,
    pub rank_shifts: Vec<RankShift>,
}

impl DiscrepancyRecord {
    /// One-line human-readable description.
    pub fn summary(&self) -> String {
        let mut text = if self.has_discrepancy {
            format!(
                "weight path favours {} but search favours {} (weight score gap {:.2})",
                self.weight_ranking.top(),
                self.search_ranking.top(),
                self.gap
            )
        } else {
            format!("both paths favour {}", self.weight_ranking.top())
        };
        if self.search_abstained {
            text.push_str("; search returned no votes");
        }
        for shift in &self.rank_shifts {
            text.push_str(&format!(
                "; {} moved from #{} to #{}",
                shift.bucket,
                shift.weight_position + 1,
                shift.search_position + 1
            ));
        }
        text
    }
}
