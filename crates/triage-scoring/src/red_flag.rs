//! Red-flag gate.

use tracing::warn;
use triage_types::{RedFlagResult, RedFlagRule, SymptomSet};

/// Evaluates safety rules against a symptom set.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedFlagGate;

impl RedFlagGate {
    pub fn new() -> Self {
        Self
    }

    /// Every rule whose required codes are all present matches. Severity is
    /// the highest among matched rules.
    pub fn evaluate(&self, rules: &[RedFlagRule], symptoms: &SymptomSet) -> RedFlagResult {
        let matched: Vec<&RedFlagRule> = rules.iter().filter(|r| r.matches(symptoms)).collect();
        if matched.is_empty() {
            return RedFlagResult::clear();
        }

        let severity = matched.iter().map(|r| r.severity).max();
        let result = RedFlagResult {
            matched: true,
            matched_rules: matched.iter().map(|r| r.code.clone()).collect(),
            severity,
            messages: matched
                .iter()
                .filter(|r| !r.message.is_empty())
                .map(|r| r.message.clone())
                .collect(),
        };
        warn!(
            rules = ?result.matched_rules,
            severity = ?result.severity,
            "red flag matched"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_types::{Demographics, Severity, Sex};

    fn symptoms(codes: &[&str]) -> SymptomSet {
        SymptomSet::new(codes.iter().copied(), Demographics::new(45, Sex::Male, 178.0, 80.0))
    }

    fn rules() -> Vec<RedFlagRule> {
        vec![
            RedFlagRule::new("infection", ["fever_chills"], Severity::Emergency)
                .with_message("possible septic joint"),
            RedFlagRule::new("hot_joint", ["swelling_heat", "redness"], Severity::Urgent),
            RedFlagRule::new("night_pain", ["pain_night"], Severity::Warning),
        ]
    }

    #[test]
    fn test_no_match_is_clear() {
        let result = RedFlagGate::new().evaluate(&rules(), &symptoms(&["swelling_heat"]));
        assert_eq!(result, RedFlagResult::clear());
        assert!(result.recommended_action().is_none());
    }

    #[test]
    fn test_highest_severity_wins() {
        let result = RedFlagGate::new().evaluate(
            &rules(),
            &symptoms(&["pain_night", "fever_chills", "redness", "swelling_heat"]),
        );
        assert!(result.matched);
        assert_eq!(result.matched_rules, vec!["infection", "hot_joint", "night_pain"]);
        assert_eq!(result.severity, Some(Severity::Emergency));
        assert_eq!(result.messages, vec!["possible septic joint"]);
    }
}
