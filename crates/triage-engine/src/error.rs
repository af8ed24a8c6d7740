//! Engine errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use triage_arbitration::ArbitrationError;
use triage_config::ConfigError;
use triage_scoring::ScoringError;
use triage_types::ValidationError;

use crate::checkpoint::CheckpointError;
use crate::node::GraphNode;
use crate::retriever::RetrieverError;

/// Result type for graph runs.
pub type Result<T> = std::result::Result<T, InferenceError>;

/// Every way a graph run can fail. All are fatal for the request; a red
/// flag is an outcome, not an error.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("no configuration for body part: {0}")]
    ConfigNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown symptom codes for {body_part}: {}", codes.join(", "))]
    UnknownSymptomCode {
        body_part: String,
        codes: Vec<String>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("evidence search failed: {0}")]
    EvidenceSearch(String),

    #[error(transparent)]
    Arbitration(#[from] ArbitrationError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("inference cancelled")]
    Cancelled,

    #[error("{node} reached without {field}")]
    MissingState {
        node: GraphNode,
        field: &'static str,
    },
}

/// Error category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ConfigNotFound,
    InvalidConfig,
    UnknownSymptomCode,
    InvalidRequest,
    EvidenceSearchError,
    ArbitrationError,
    Checkpoint,
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Serializable error summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub detail: String,
}

impl InferenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigNotFound(_) => ErrorKind::ConfigNotFound,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::UnknownSymptomCode { .. } => ErrorKind::UnknownSymptomCode,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::EvidenceSearch(_) => ErrorKind::EvidenceSearchError,
            Self::Arbitration(_) => ErrorKind::ArbitrationError,
            Self::Checkpoint(_) => ErrorKind::Checkpoint,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::MissingState { .. } => ErrorKind::Internal,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            detail: self.to_string(),
        }
    }
}

impl From<&InferenceError> for ErrorReport {
    fn from(err: &InferenceError) -> Self {
        err.report()
    }
}

impl From<ConfigError> for InferenceError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound(body_part) => Self::ConfigNotFound(body_part),
            other => Self::InvalidConfig(other.to_string()),
        }
    }
}

impl From<ScoringError> for InferenceError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::UnknownSymptomCodes { body_part, codes } => {
                Self::UnknownSymptomCode { body_part, codes }
            }
            other => Self::InvalidConfig(other.to_string()),
        }
    }
}

impl From<RetrieverError> for InferenceError {
    fn from(err: RetrieverError) -> Self {
        Self::EvidenceSearch(err.to_string())
    }
}

impl From<ValidationError> for InferenceError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidDemographics(detail) => Self::InvalidRequest(detail),
            other => Self::InvalidConfig(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_reports() {
        let err: InferenceError = ConfigError::NotFound("hip".into()).into();
        assert_eq!(err.kind(), ErrorKind::ConfigNotFound);

        let err: InferenceError = ScoringError::UnknownSymptomCodes {
            body_part: "knee".into(),
            codes: vec!["a".into(), "b".into()],
        }
        .into();
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::UnknownSymptomCode);
        assert_eq!(report.detail, "unknown symptom codes for knee: a, b");

        let err: InferenceError = ScoringError::InvalidParameter {
            name: "tier weight",
            value: -1.0,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
        assert_eq!(err.to_string(), "invalid configuration: invalid tier weight: -1");

        let err: InferenceError = ArbitrationError::Timeout { after_ms: 5 }.into();
        assert_eq!(err.kind().to_string(), "ArbitrationError");

        let json = serde_json::to_string(&InferenceError::Cancelled.report()).unwrap();
        assert_eq!(json, r#"{"kind":"Cancelled","detail":"inference cancelled"}"#);
    }
}
