use thiserror::Error;
use triage_types::ValidationError;

/// Errors from the weight path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    /// Symptom codes the body part does not recognise, sorted.
    #[error("unknown symptom codes for {body_part}: {}", codes.join(", "))]
    UnknownSymptomCodes {
        body_part: String,
        codes: Vec<String>,
    },

    /// A tunable outside its valid range.
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
