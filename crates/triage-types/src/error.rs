//! Validation errors for the data model.

use thiserror::Error;

/// Raised when a value would break one of the model's invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A bucket order must name at least one bucket.
    #[error("bucket order is empty")]
    EmptyBucketOrder,

    /// A bucket appears twice in an order or ranking.
    #[error("duplicate bucket: {0}")]
    DuplicateBucket(String),

    /// A bucket is not part of the body part's order.
    #[error("unknown bucket: {0}")]
    UnknownBucket(String),

    /// A ranking does not cover the bucket order exactly once.
    #[error("ranking is not a permutation of the bucket order: {0}")]
    NotAPermutation(String),

    /// A weight vector is not aligned to the bucket order.
    #[error("weight vector for {code} has {actual} entries, expected {expected}")]
    WeightLengthMismatch {
        code: String,
        expected: usize,
        actual: usize,
    },

    /// A weight entry is negative or not finite.
    #[error("weight for {code} at position {index} is invalid: {value}")]
    InvalidWeight {
        code: String,
        index: usize,
        value: f64,
    },

    /// A red-flag rule with no required codes would match every request.
    #[error("red-flag rule {0} has no required codes")]
    EmptyRedFlagRule(String),

    /// Two red-flag rules share a code.
    #[error("duplicate red-flag rule: {0}")]
    DuplicateRedFlagRule(String),

    /// Source tiers are 1, 2 or 3.
    #[error("invalid source tier: {0}")]
    InvalidSourceTier(u8),

    /// Demographic attributes outside the accepted range.
    #[error("invalid demographics: {0}")]
    InvalidDemographics(String),
}
