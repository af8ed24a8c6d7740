//! Search path: evidence filtering and bucket votes.

use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;
use triage_types::{BucketOrder, BucketScoreVector, EvidenceItem, Ranking, SourceTier};

use crate::error::ScoringError;

/// Vote multiplier per source tier. Every multiplier is finite and
/// non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierWeights([f64; 3]);

impl TierWeights {
    pub fn new(weights: [f64; 3]) -> Result<Self, ScoringError> {
        if let Some(&value) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(ScoringError::InvalidParameter {
                name: "tier weight",
                value,
            });
        }
        Ok(Self(weights))
    }

    pub fn weight(&self, tier: SourceTier) -> f64 {
        self.0[usize::from(tier.level()) - 1]
    }
}

impl Default for TierWeights {
    fn default() -> Self {
        Self([1.0, 0.7, 0.4])
    }
}

/// Output of the search path.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchVotes {
    pub scores: BucketScoreVector,
    pub ranking: Ranking,
    /// No item voted for a bucket in the order.
    pub abstained: bool,
}

/// Turns retrieved evidence into a bucket ranking.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchVoter {
    tier_weights: TierWeights,
}

impl SearchVoter {
    pub fn new(tier_weights: TierWeights) -> Self {
        Self { tier_weights }
    }

    /// Drop items below `min_score`, keep the most similar copy of each id,
    /// and sort by tier, then similarity descending, then id.
    pub fn prepare_evidence(&self, items: Vec<EvidenceItem>, min_score: f64) -> Vec<EvidenceItem> {
        let mut best: HashMap<String, EvidenceItem> = HashMap::new();
        for item in items {
            if !item.similarity.is_finite() || item.similarity < min_score {
                continue;
            }
            match best.get(&item.id) {
                Some(existing) if existing.similarity >= item.similarity => {}
                _ => {
                    best.insert(item.id.clone(), item);
                }
            }
        }
        let mut evidence: Vec<EvidenceItem> = best.into_values().collect();
        evidence.sort_by(compare_evidence);
        evidence
    }

    /// Each item votes `tier_weight * similarity` for every tagged bucket.
    /// Tags outside the order are ignored.
    pub fn rank(
        &self,
        order: &BucketOrder,
        evidence: &[EvidenceItem],
    ) -> Result<SearchVotes, ScoringError> {
        let mut votes = vec![0.0; order.len()];
        let mut voted = false;
        for item in evidence {
            let vote = self.tier_weights.weight(item.source_tier) * item.similarity.max(0.0);
            for tag in &item.bucket_tags {
                if let Some(index) = order.position(tag.as_str()) {
                    votes[index] += vote;
                    voted = true;
                }
            }
        }

        let mut scores = BucketScoreVector::zeros(order);
        scores.accumulate("search_votes", &votes)?;
        let abstained = !voted;
        let ranking = scores.ranking();
        debug!(
            ranking = %ranking,
            items = evidence.len(),
            abstained,
            "search votes tallied"
        );

        Ok(SearchVotes {
            scores,
            ranking,
            abstained,
        })
    }
}

fn compare_evidence(a: &EvidenceItem, b: &EvidenceItem) -> Ordering {
    a.source_tier
        .cmp(&b.source_tier)
        .then_with(|| b.similarity.total_cmp(&a.similarity))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> BucketOrder {
        BucketOrder::from_codes(["OA", "OVR", "TRM", "INF"]).unwrap()
    }

    fn item(id: &str, tier: SourceTier, similarity: f64, tag: &str) -> EvidenceItem {
        EvidenceItem::new(id, format!("doc {id}"), tier, similarity).with_tag(tag)
    }

    #[test]
    fn test_prepare_filters_dedups_and_sorts() {
        let voter = SearchVoter::default();
        let prepared = voter.prepare_evidence(
            vec![
                item("b", SourceTier::Unverified, 0.9, "OA"),
                item("a", SourceTier::Curated, 0.5, "TRM"),
                item("a", SourceTier::Curated, 0.7, "TRM"),
                item("c", SourceTier::Curated, 0.7, "OVR"),
                item("d", SourceTier::Curated, 0.2, "OA"),
            ],
            0.35,
        );
        let ids: Vec<_> = prepared.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert_eq!(prepared[0].similarity, 0.7);
    }

    #[test]
    fn test_tier_weighted_votes() {
        let voter = SearchVoter::default();
        let evidence = vec![
            item("a", SourceTier::Curated, 0.6, "TRM"),
            item("b", SourceTier::Unverified, 0.9, "OA"),
            item("c", SourceTier::SecondaryCurated, 0.5, "OA"),
        ];
        let votes = voter.rank(&order(), &evidence).unwrap();
        // OA = 0.4*0.9 + 0.7*0.5 = 0.71, TRM = 0.6
        assert_eq!(votes.ranking.top().as_str(), "OA");
        assert!(!votes.abstained);
    }

    #[test]
    fn test_empty_and_foreign_tags_abstain() {
        let voter = SearchVoter::default();
        let votes = voter.rank(&order(), &[]).unwrap();
        assert!(votes.abstained);
        assert_eq!(votes.ranking, order().identity_ranking());

        let foreign = vec![item("a", SourceTier::Curated, 0.9, "STF")];
        assert!(voter.rank(&order(), &foreign).unwrap().abstained);
    }

    #[test]
    fn test_tier_weights_must_be_non_negative() {
        assert_eq!(
            TierWeights::new([1.0, -0.5, 0.4]),
            Err(ScoringError::InvalidParameter {
                name: "tier weight",
                value: -0.5,
            })
        );
        assert!(TierWeights::new([1.0, f64::NAN, 0.4]).is_err());
        let zeroed = TierWeights::new([1.0, 0.0, 0.4]).unwrap();
        assert_eq!(zeroed.weight(SourceTier::SecondaryCurated), 0.0);
    }

    #[test]
    fn test_zero_tier_weight_still_counts_as_a_vote() {
        let voter = SearchVoter::new(TierWeights::new([1.0, 0.0, 0.4]).unwrap());
        let evidence = vec![item("a", SourceTier::SecondaryCurated, 0.9, "TRM")];
        let votes = voter.rank(&order(), &evidence).unwrap();
        assert!(!votes.abstained);
        assert!(votes.scores.is_zero());
    }
}
