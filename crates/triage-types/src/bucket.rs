//! Buckets, bucket orders, rankings and score vectors.
//!
//! A body part defines an ordered bucket set once; every ranking and score
//! vector built for that body part is aligned to it. Ties are always broken
//! by position in the order, so rankings are fully deterministic.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::ValidationError;

/// Diagnostic category code (e.g. `OA`, `OVR`, `TRM`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketCode(String);

impl BucketCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for BucketCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for BucketCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl PartialEq<str> for BucketCode {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for BucketCode {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Ordered, non-empty, duplicate-free bucket set of one body part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BucketCode>", into = "Vec<BucketCode>")]
pub struct BucketOrder(Vec<BucketCode>);

impl BucketOrder {
    pub fn new(buckets: Vec<BucketCode>) -> Result<Self, ValidationError> {
        if buckets.is_empty() {
            return Err(ValidationError::EmptyBucketOrder);
        }
        let mut seen = HashSet::with_capacity(buckets.len());
        for bucket in &buckets {
            if !seen.insert(bucket.as_str()) {
                return Err(ValidationError::DuplicateBucket(bucket.to_string()));
            }
        }
        Ok(Self(buckets))
    }

    /// Build an order from string codes.
    pub fn from_codes<I, S>(codes: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(codes.into_iter().map(BucketCode::new).collect())
    }

    /// Number of buckets (N).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; an order is never empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BucketCode> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[BucketCode] {
        &self.0
    }

    /// The first bucket; used as the example answer in prompts.
    pub fn first(&self) -> &BucketCode {
        &self.0[0]
    }

    pub fn get(&self, index: usize) -> Option<&BucketCode> {
        self.0.get(index)
    }

    pub fn position(&self, bucket: &str) -> Option<usize> {
        self.0.iter().position(|b| b.as_str() == bucket)
    }

    pub fn contains(&self, bucket: &str) -> bool {
        self.position(bucket).is_some()
    }

    /// Rank buckets by descending score, ties broken by order position.
    ///
    /// `scores` must be aligned to this order.
    pub fn rank_by(&self, scores: &[f64]) -> Result<Ranking, ValidationError> {
        if scores.len() != self.len() {
            return Err(ValidationError::NotAPermutation(format!(
                "{} scores for {} buckets",
                scores.len(),
                self.len()
            )));
        }
        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then_with(|| a.cmp(&b)));
        Ok(Ranking(
            indices.into_iter().map(|i| self.0[i].clone()).collect(),
        ))
    }

    /// The ranking that pure tie-breaking produces: the order itself.
    pub fn identity_ranking(&self) -> Ranking {
        Ranking(self.0.clone())
    }
}

impl TryFrom<Vec<BucketCode>> for BucketOrder {
    type Error = ValidationError;

    fn try_from(buckets: Vec<BucketCode>) -> Result<Self, Self::Error> {
        Self::new(buckets)
    }
}

impl From<BucketOrder> for Vec<BucketCode> {
    fn from(order: BucketOrder) -> Self {
        order.0
    }
}

impl<'a> IntoIterator for &'a BucketOrder {
    type Item = &'a BucketCode;
    type IntoIter = std::slice::Iter<'a, BucketCode>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A permutation of a [`BucketOrder`], most favoured bucket first.
///
/// Rankings are only produced by [`BucketOrder::rank_by`] or validated with
/// [`Ranking::try_new`], so every bucket appears exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ranking(Vec<BucketCode>);

impl Ranking {
    /// Validate an externally produced permutation against `order`.
    pub fn try_new(order: &BucketOrder, buckets: Vec<BucketCode>) -> Result<Self, ValidationError> {
        if buckets.len() != order.len() {
            return Err(ValidationError::NotAPermutation(format!(
                "{} buckets ranked, order has {}",
                buckets.len(),
                order.len()
            )));
        }
        let mut seen = HashSet::with_capacity(buckets.len());
        for bucket in &buckets {
            if !order.contains(bucket.as_str()) {
                return Err(ValidationError::UnknownBucket(bucket.to_string()));
            }
            if !seen.insert(bucket.as_str()) {
                return Err(ValidationError::DuplicateBucket(bucket.to_string()));
            }
        }
        Ok(Self(buckets))
    }

    /// The top-ranked bucket.
    pub fn top(&self) -> &BucketCode {
        &self.0[0]
    }

    pub fn position(&self, bucket: &str) -> Option<usize> {
        self.0.iter().position(|b| b.as_str() == bucket)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BucketCode> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[BucketCode] {
        &self.0
    }
}

impl fmt::Display for Ranking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, bucket) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" > ")?;
            }
            f.write_str(bucket.as_str())?;
        }
        Ok(())
    }
}

/// Non-negative per-bucket scores aligned to a [`BucketOrder`].
#[derive(Debug, Clone, PartialEq)]
pub struct BucketScoreVector {
    order: BucketOrder,
    scores: Vec<f64>,
}

impl BucketScoreVector {
    /// All-zero vector for `order`.
    pub fn zeros(order: &BucketOrder) -> Self {
        Self {
            order: order.clone(),
            scores: vec![0.0; order.len()],
        }
    }

    /// Add `weights` elementwise. Rejects misaligned or negative vectors so
    /// the non-negativity invariant cannot be broken from outside.
    pub fn accumulate(&mut self, code: &str, weights: &[f64]) -> Result<(), ValidationError> {
        if weights.len() != self.scores.len() {
            return Err(ValidationError::WeightLengthMismatch {
                code: code.to_string(),
                expected: self.scores.len(),
                actual: weights.len(),
            });
        }
        if let Some((index, &value)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(ValidationError::InvalidWeight {
                code: code.to_string(),
                index,
                value,
            });
        }
        for (score, weight) in self.scores.iter_mut().zip(weights) {
            *score += weight;
        }
        Ok(())
    }

    pub fn order(&self) -> &BucketOrder {
        &self.order
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn score_of(&self, bucket: &str) -> Option<f64> {
        self.order.position(bucket).map(|i| self.scores[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BucketCode, f64)> {
        self.order.iter().zip(self.scores.iter().copied())
    }

    pub fn total(&self) -> f64 {
        self.scores.iter().sum()
    }

    pub fn is_zero(&self) -> bool {
        self.scores.iter().all(|s| *s == 0.0)
    }

    /// Descending ranking, ties broken by order position.
    pub fn ranking(&self) -> Ranking {
        // Aligned by construction.
        Ranking(rank_indices(&self.scores).map(|i| self.order.as_slice()[i].clone()).collect())
    }
}

fn rank_indices(scores: &[f64]) -> impl Iterator<Item = usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then_with(|| a.cmp(&b)));
    indices.into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knee() -> BucketOrder {
        BucketOrder::from_codes(["OA", "OVR", "TRM", "INF"]).unwrap()
    }

    #[test]
    fn order_rejects_empty_and_duplicates() {
        assert_eq!(
            BucketOrder::from_codes(Vec::<String>::new()),
            Err(ValidationError::EmptyBucketOrder)
        );
        assert_eq!(
            BucketOrder::from_codes(["OA", "OA"]),
            Err(ValidationError::DuplicateBucket("OA".into()))
        );
    }

    #[test]
    fn ties_follow_order_position() {
        let order = knee();
        let ranking = order.rank_by(&[1.0, 2.0, 2.0, 0.0]).unwrap();
        assert_eq!(ranking.to_string(), "OVR > TRM > OA > INF");
        assert_eq!(order.rank_by(&[0.0; 4]).unwrap(), order.identity_ranking());
    }

    #[test]
    fn ranking_validation() {
        let order = knee();
        let ok = Ranking::try_new(
            &order,
            ["TRM", "OA", "INF", "OVR"].into_iter().map(BucketCode::from).collect(),
        );
        assert_eq!(ok.unwrap().top(), &BucketCode::from("TRM"));

        let missing = Ranking::try_new(&order, vec!["OA".into(), "OVR".into(), "TRM".into()]);
        assert!(matches!(missing, Err(ValidationError::NotAPermutation(_))));

        let dup = Ranking::try_new(
            &order,
            ["OA", "OA", "TRM", "INF"].into_iter().map(BucketCode::from).collect(),
        );
        assert!(matches!(dup, Err(ValidationError::DuplicateBucket(_))));

        let foreign = Ranking::try_new(
            &order,
            ["OA", "STF", "TRM", "INF"].into_iter().map(BucketCode::from).collect(),
        );
        assert!(matches!(foreign, Err(ValidationError::UnknownBucket(_))));
    }

    #[test]
    fn score_vector_rejects_bad_weights() {
        let order = knee();
        let mut scores = BucketScoreVector::zeros(&order);
        assert!(scores.accumulate("x", &[1.0, 0.0]).is_err());
        assert!(scores.accumulate("x", &[1.0, -0.5, 0.0, 0.0]).is_err());
        assert!(scores.accumulate("x", &[f64::NAN, 0.0, 0.0, 0.0]).is_err());
        assert!(scores.is_zero());

        scores.accumulate("x", &[1.0, 0.5, 0.0, 0.0]).unwrap();
        scores.accumulate("y", &[0.5, 0.0, 2.0, 0.0]).unwrap();
        assert_eq!(scores.score_of("TRM"), Some(2.0));
        assert_eq!(scores.total(), 4.0);
        assert_eq!(scores.ranking().to_string(), "TRM > OA > OVR > INF");
    }

    proptest::proptest! {
        #[test]
        fn rank_by_is_a_descending_permutation(scores in proptest::collection::vec(0.0f64..10.0, 4)) {
            let order = knee();
            let ranking = order.rank_by(&scores).unwrap();
            proptest::prop_assert!(Ranking::try_new(&order, ranking.as_slice().to_vec()).is_ok());
            let ranked: Vec<f64> = ranking
                .iter()
                .map(|b| scores[order.position(b.as_str()).unwrap()])
                .collect();
            proptest::prop_assert!(ranked.windows(2).all(|w| w[0] >= w[1]));
        }
    }

    #[test]
    fn order_serde_is_validated() {
        let parsed: Result<BucketOrder, _> = serde_json::from_str(r#"["OA","OA"]"#);
        assert!(parsed.is_err());
        let parsed: BucketOrder = serde_json::from_str(r#"["OA","TRM"]"#).unwrap();
        assert_eq!(parsed.len(), 2);
    }
}
