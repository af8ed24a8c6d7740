//! Safety rules that bypass diagnosis entirely.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::request::SymptomSet;

/// Urgency of a red flag, ordered `Warning < Urgent < Emergency`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Urgent,
    Emergency,
}

impl Severity {
    pub fn recommended_action(&self) -> &'static str {
        match self {
            Severity::Emergency => {
                "Go to an emergency department now. Exercise recommendations are withheld."
            }
            Severity::Urgent => {
                "See an orthopaedic specialist as soon as possible. Exercise recommendations are withheld."
            }
            Severity::Warning => "Consult a specialist if the symptoms persist.",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Warning => "warning",
            Severity::Urgent => "urgent",
            Severity::Emergency => "emergency",
        };
        f.write_str(s)
    }
}

/// A rule matches when all `required` codes are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedFlagRule {
    pub code: String,
    pub required: BTreeSet<String>,
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
}

impl RedFlagRule {
    pub fn new<I, S>(code: impl Into<String>, required: I, severity: Severity) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            code: code.into(),
            required: required.into_iter().map(Into::into).collect(),
            severity,
            message: String::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn matches(&self, symptoms: &SymptomSet) -> bool {
        self.required.is_subset(symptoms.codes())
    }
}

/// Outcome of the red-flag check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedFlagResult {
    pub matched: bool,
    pub matched_rules: Vec<String>,
    pub severity: Option<Severity>,
    #[serde(default)]
    pub messages: Vec<String>,
}

impl RedFlagResult {
    pub fn clear() -> Self {
        Self::default()
    }

    pub fn recommended_action(&self) -> Option<&'static str> {
        self.severity.map(|s| s.recommended_action())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Demographics, Sex};

    #[test]
    fn severity_ordering() {
        assert!(Severity::Warning < Severity::Urgent);
        assert!(Severity::Urgent < Severity::Emergency);
        assert_eq!(
            [Severity::Urgent, Severity::Emergency, Severity::Warning].iter().max(),
            Some(&Severity::Emergency)
        );
    }

    #[test]
    fn rule_matches_on_subset() {
        let demo = Demographics::new(40, Sex::Male, 175.0, 70.0);
        let rule = RedFlagRule::new("hot_joint", ["swelling_heat", "redness"], Severity::Urgent);
        assert!(rule.matches(&SymptomSet::new(["swelling_heat", "redness", "locking"], demo)));
        assert!(!rule.matches(&SymptomSet::new(["swelling_heat"], demo)));
    }
}
