use thiserror::Error;

/// Arbitration failures. All are fatal for the request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArbitrationError {
    /// The arbitrator did not answer in time.
    #[error("arbitration timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// The reasoning backend failed (transport, HTTP status, empty answer).
    #[error("reasoning backend failed: {0}")]
    Backend(String),

    /// The answer could not be parsed into a decision.
    #[error("malformed arbitration response: {0}")]
    Malformed(String),

    /// The decision parsed but breaks the arbitration contract.
    #[error("arbitration contract violated: {0}")]
    ContractViolation(String),

    /// The backend lacks required settings such as an API key.
    #[error("reasoning backend not configured: {0}")]
    NotConfigured(String),
}
