//! Arbitration decision and its contract.

use serde::{Deserialize, Serialize};
use triage_types::{BucketCode, Citation};

use crate::context::ArbitrationContext;
use crate::error::ArbitrationError;

/// One committed bucket with its justification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationDecision {
    pub final_bucket: BucketCode,
    pub confidence: f64,
    #[serde(default)]
    pub evidence_summary: String,
    pub reasoning: String,
    /// Required when the weight and search paths disagreed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl ArbitrationDecision {
    pub fn new(final_bucket: impl Into<BucketCode>, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            final_bucket: final_bucket.into(),
            confidence,
            evidence_summary: String::new(),
            reasoning: reasoning.into(),
            reconciliation: None,
            citations: Vec::new(),
        }
    }

    pub fn with_evidence_summary(mut self, summary: impl Into<String>) -> Self {
        self.evidence_summary = summary.into();
        self
    }

    pub fn with_reconciliation(mut self, reconciliation: impl Into<String>) -> Self {
        self.reconciliation = Some(reconciliation.into());
        self
    }

    pub fn with_citation(mut self, citation: Citation) -> Self {
        self.citations.push(citation);
        self
    }

    /// Check the decision against the context it was produced from.
    pub fn validate(&self, ctx: &ArbitrationContext) -> Result<(), ArbitrationError> {
        let bucket = self.final_bucket.as_str();
        if !ctx.bucket_order().contains(bucket) {
            return Err(ArbitrationError::ContractViolation(format!(
                "bucket {bucket:?} is not one of {}",
                valid_buckets(ctx)
            )));
        }

        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(ArbitrationError::ContractViolation(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }

        if self.reasoning.trim().is_empty() {
            return Err(ArbitrationError::ContractViolation(
                "reasoning is empty".to_string(),
            ));
        }

        if let Some(stray) = self
            .citations
            .iter()
            .find(|c| !ctx.evidence.iter().any(|item| c.cites(item)))
        {
            return Err(ArbitrationError::ContractViolation(format!(
                "citation {:?} ({}) was not among the supplied evidence",
                stray.title, stray.source_tier
            )));
        }

        if ctx.discrepancy.has_discrepancy
            && self
                .reconciliation
                .as_deref()
                .map_or(true, |r| r.trim().is_empty())
        {
            return Err(ArbitrationError::ContractViolation(format!(
                "rankings disagree ({}) but no reconciliation was given",
                ctx.discrepancy.summary()
            )));
        }

        Ok(())
    }
}

fn valid_buckets(ctx: &ArbitrationContext) -> String {
    ctx.bucket_order()
        .iter()
        .map(BucketCode::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
