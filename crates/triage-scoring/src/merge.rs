//! Ranking fusion and disagreement detection.

use tracing::warn;
use triage_types::{BucketOrder, BucketScoreVector, DiscrepancyRecord, RankShift, Ranking};

use crate::error::ScoringError;

/// Positional fusion of the two rankings.
#[derive(Debug, Clone, Copy)]
pub struct RankingMerger {
    weight_ratio: f64,
}

impl RankingMerger {
    /// `weight_ratio` must lie in `[0, 1]`.
    pub fn new(weight_ratio: f64) -> Result<Self, ScoringError> {
        if !(0.0..=1.0).contains(&weight_ratio) {
            return Err(ScoringError::InvalidParameter {
                name: "weight ratio",
                value: weight_ratio,
            });
        }
        Ok(Self { weight_ratio })
    }

    pub fn weight_ratio(&self) -> f64 {
        self.weight_ratio
    }

    /// Each bucket scores `ratio * (N - i_w) + (1 - ratio) * (N - i_s)`
    /// where `i_w`/`i_s` are its zero-based positions. Ties follow the order.
    pub fn merge(
        &self,
        order: &BucketOrder,
        weight: &Ranking,
        search: &Ranking,
    ) -> Result<Ranking, ScoringError> {
        let n = order.len() as f64;
        let fused: Vec<f64> = order
            .iter()
            .map(|bucket| {
                let i_w = weight.position(bucket.as_str()).unwrap_or(order.len()) as f64;
                let i_s = search.position(bucket.as_str()).unwrap_or(order.len()) as f64;
                self.weight_ratio * (n - i_w) + (1.0 - self.weight_ratio) * (n - i_s)
            })
            .collect();
        let mut scores = BucketScoreVector::zeros(order);
        scores.accumulate("merged", &fused)?;
        Ok(scores.ranking())
    }
}

impl Default for RankingMerger {
    fn default() -> Self {
        Self { weight_ratio: 0.6 }
    }
}

/// Flags top-bucket disagreement between the weight and search paths.
#[derive(Debug, Clone, Copy)]
pub struct DiscrepancyDetector {
    shift_threshold: usize,
}

impl DiscrepancyDetector {
    pub fn new(shift_threshold: usize) -> Self {
        Self {
            shift_threshold: shift_threshold.max(1),
        }
    }

    pub fn detect(
        &self,
        weight_scores: &BucketScoreVector,
        weight_ranking: &Ranking,
        search_ranking: &Ranking,
        search_abstained: bool,
    ) -> DiscrepancyRecord {
        let weight_top = weight_ranking.top();
        let search_top = search_ranking.top();
        let has_discrepancy = weight_top != search_top;

        let gap = if has_discrepancy {
            let top = weight_scores.score_of(weight_top.as_str()).unwrap_or(0.0);
            let favoured = weight_scores.score_of(search_top.as_str()).unwrap_or(0.0);
            top - favoured
        } else {
            0.0
        };

        let rank_shifts = weight_ranking
            .iter()
            .enumerate()
            .filter_map(|(weight_position, bucket)| {
                let search_position = search_ranking.position(bucket.as_str())?;
                (weight_position.abs_diff(search_position) >= self.shift_threshold).then(|| {
                    RankShift {
                        bucket: bucket.clone(),
                        weight_position,
                        search_position,
                    }
                })
            })
            .collect();

        let record = DiscrepancyRecord {
            weight_ranking: weight_ranking.clone(),
            search_ranking: search_ranking.clone(),
            has_discrepancy,
            gap,
            search_abstained,
            rank_shifts,
        };
        if has_discrepancy {
            warn!(
                weight_top = %weight_top,
                search_top = %search_top,
                gap,
                "weight and search paths disagree"
            );
        }
        record
    }
}

impl Default for DiscrepancyDetector {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> BucketOrder {
        BucketOrder::from_codes(["OA", "OVR", "TRM", "INF"]).unwrap()
    }

    fn scores(values: [f64; 4]) -> BucketScoreVector {
        let mut v = BucketScoreVector::zeros(&order());
        v.accumulate("t", &values).unwrap();
        v
    }

    #[test]
    fn test_merge_fuses_positions() {
        let order = order();
        let weight = order.rank_by(&[3.0, 2.0, 1.0, 0.0]).unwrap(); // OA OVR TRM INF
        let search = order.rank_by(&[0.0, 3.0, 2.0, 1.0]).unwrap(); // OVR TRM INF OA
        let merged = RankingMerger::default().merge(&order, &weight, &search).unwrap();
        // OA 2.8, OVR 3.4, TRM 2.4, INF 1.4
        assert_eq!(merged.to_string(), "OVR > OA > TRM > INF");
    }

    #[test]
    fn test_weight_ratio_out_of_range_is_rejected() {
        assert!(RankingMerger::new(f64::NAN).is_err());
        assert_eq!(
            RankingMerger::new(1.5).unwrap_err().to_string(),
            "invalid weight ratio: 1.5"
        );
        assert_eq!(RankingMerger::new(1.0).unwrap().weight_ratio(), 1.0);
    }

    #[test]
    fn test_detect_discrepancy_and_gap() {
        let order = order();
        let w = scores([3.0, 2.0, 1.0, 0.0]);
        let weight = w.ranking();
        let search = order.rank_by(&[0.0, 2.0, 3.0, 1.0]).unwrap();
        let record = DiscrepancyDetector::default().detect(&w, &weight, &search, false);

        assert!(record.has_discrepancy);
        assert_eq!(record.gap, 2.0);
        let shifted: Vec<_> = record.rank_shifts.iter().map(|s| s.bucket.as_str()).collect();
        assert_eq!(shifted, vec!["OA", "TRM"]);
        assert!(record.summary().contains("weight path favours OA but search favours TRM"));
    }

    #[test]
    fn test_agreement_has_zero_gap() {
        let w = scores([3.0, 2.0, 1.0, 0.0]);
        let weight = w.ranking();
        let record = DiscrepancyDetector::default().detect(&w, &weight, &weight, false);
        assert!(!record.has_discrepancy);
        assert_eq!(record.gap, 0.0);
        assert!(record.rank_shifts.is_empty());
    }
}
