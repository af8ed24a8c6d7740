//! Weight scorer.
//!
//! Sums calibrated weight vectors for every present symptom code and every
//! demographic code the table calibrates. No normalisation is applied; the
//! table is calibrated so magnitudes compare directly.

use std::collections::BTreeMap;
use tracing::debug;
use triage_types::{BodyPartConfig, BucketScore, BucketScoreVector, Ranking, SymptomSet};

use crate::error::ScoringError;

/// Output of the weight path.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightScore {
    pub scores: BucketScoreVector,
    pub ranking: Ranking,
    pub breakdown: Vec<BucketScore>,
    /// Codes whose vectors were added, symptoms first then demographics.
    pub applied_codes: Vec<String>,
}

/// Stateless scorer over one body part's weight table.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightScorer;

impl WeightScorer {
    pub fn new() -> Self {
        Self
    }

    /// Submitted codes outside the body part's vocabulary, sorted.
    pub fn unknown_codes(config: &BodyPartConfig, symptoms: &SymptomSet) -> Vec<String> {
        symptoms
            .codes()
            .iter()
            .filter(|code| !config.is_known_code(code))
            .cloned()
            .collect()
    }

    pub fn score(
        &self,
        config: &BodyPartConfig,
        symptoms: &SymptomSet,
    ) -> Result<WeightScore, ScoringError> {
        let unknown = Self::unknown_codes(config, symptoms);
        if !unknown.is_empty() {
            return Err(ScoringError::UnknownSymptomCodes {
                body_part: config.code().to_string(),
                codes: unknown,
            });
        }

        let order = config.bucket_order();
        let mut scores = BucketScoreVector::zeros(order);
        let mut applied = Vec::new();
        let mut contributors: BTreeMap<usize, Vec<String>> = BTreeMap::new();

        let symptom_codes = symptoms.codes().iter().map(String::as_str);
        let demographic_codes = symptoms.demographics().derived_codes();

        for code in symptom_codes.chain(demographic_codes) {
            // Red-flag-only codes and uncalibrated demographics contribute nothing.
            let Some(weights) = config.weights_for(code) else {
                continue;
            };
            scores.accumulate(code, weights)?;
            for (index, weight) in weights.iter().enumerate() {
                if *weight > 0.0 {
                    contributors.entry(index).or_default().push(code.to_string());
                }
            }
            applied.push(code.to_string());
        }

        let total = scores.total();
        let breakdown = scores
            .iter()
            .enumerate()
            .map(|(index, (bucket, score))| BucketScore {
                bucket: bucket.clone(),
                score,
                percentage: if total > 0.0 {
                    (score / total * 1000.0).round() / 10.0
                } else {
                    0.0
                },
                contributing_codes: contributors.remove(&index).unwrap_or_default(),
            })
            .collect();

        let ranking = scores.ranking();
        debug!(
            body_part = config.code(),
            ranking = %ranking,
            applied = applied.len(),
            "weight scoring complete"
        );

        Ok(WeightScore {
            scores,
            ranking,
            breakdown,
            applied_codes: applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_types::{BucketOrder, Demographics, RedFlagRule, Severity, Sex};

    fn config() -> BodyPartConfig {
        let order = BucketOrder::from_codes(["OA", "OVR", "TRM"]).unwrap();
        BodyPartConfig::builder("knee", order)
            .weight("pain_medial", vec![2.0, 1.0, 0.0])
            .weight("locking", vec![0.0, 0.5, 2.5])
            .weight("age_gte_50", vec![1.0, 0.0, 0.0])
            .red_flag_rule(RedFlagRule::new("fever", ["fever"], Severity::Emergency))
            .build()
            .unwrap()
    }

    fn demo(age: u32) -> Demographics {
        Demographics::new(age, Sex::Female, 165.0, 60.0)
    }

    #[test]
    fn test_accumulates_symptoms_and_calibrated_demographics() {
        let symptoms = SymptomSet::new(["pain_medial", "locking"], demo(55));
        let score = WeightScorer::new().score(&config(), &symptoms).unwrap();

        assert_eq!(score.scores.scores(), &[3.0, 1.5, 2.5]);
        assert_eq!(score.ranking.to_string(), "OA > TRM > OVR");
        assert_eq!(score.applied_codes, vec!["locking", "pain_medial", "age_gte_50"]);
        assert_eq!(score.breakdown[0].percentage, 42.9);
        assert_eq!(
            score.breakdown[0].contributing_codes,
            vec!["pain_medial", "age_gte_50"]
        );
    }

    #[test]
    fn test_empty_symptoms_give_zero_vector_and_order_ranking() {
        let symptoms = SymptomSet::new(Vec::<String>::new(), demo(30));
        let config = config();
        let score = WeightScorer::new().score(&config, &symptoms).unwrap();

        assert!(score.scores.is_zero());
        assert_eq!(score.ranking, config.bucket_order().identity_ranking());
        assert!(score.breakdown.iter().all(|b| b.percentage == 0.0));
    }

    #[test]
    fn test_red_flag_code_is_known_but_weightless() {
        let symptoms = SymptomSet::new(["fever"], demo(30));
        let score = WeightScorer::new().score(&config(), &symptoms).unwrap();
        assert!(score.scores.is_zero());
    }

    #[test]
    fn test_unknown_codes_fail_fast() {
        let symptoms = SymptomSet::new(["zzz", "pain_medial", "aaa"], demo(30));
        let err = WeightScorer::new().score(&config(), &symptoms).unwrap_err();
        assert_eq!(
            err,
            ScoringError::UnknownSymptomCodes {
                body_part: "knee".into(),
                codes: vec!["aaa".into(), "zzz".into()],
            }
        );
        assert_eq!(err.to_string(), "unknown symptom codes for knee: aaa, zzz");
    }

    #[test]
    fn test_submitted_demographic_codes_are_rejected() {
        let symptoms = SymptomSet::new(["locking", "age_gte_50"], demo(28));
        let err = WeightScorer::new().score(&config(), &symptoms).unwrap_err();
        assert_eq!(
            err,
            ScoringError::UnknownSymptomCodes {
                body_part: "knee".into(),
                codes: vec!["age_gte_50".into()],
            }
        );
    }
}
