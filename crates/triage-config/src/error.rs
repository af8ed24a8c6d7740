//! Configuration errors.

use std::path::PathBuf;
use thiserror::Error;
use triage_types::ValidationError;

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading body-part data or engine settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration exists for the body part.
    #[error("no configuration for body part: {0}")]
    NotFound(String),

    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid JSON for its schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The data parsed but breaks an invariant.
    #[error("invalid configuration for {body_part}: {reason}")]
    Invalid { body_part: String, reason: String },

    /// Engine settings could not be layered or deserialized.
    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),
}

impl ConfigError {
    pub fn invalid(body_part: impl Into<String>, reason: impl ToString) -> Self {
        Self::Invalid {
            body_part: body_part.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn from_validation(body_part: &str, err: ValidationError) -> Self {
        Self::invalid(body_part, err)
    }

    /// True when the body part is simply unknown, as opposed to broken.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
