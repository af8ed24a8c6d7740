//! Deterministic half of bucket inference.
//!
//! All functions here are pure: the same inputs always produce the same
//! scores and rankings, which is what lets the inference graph re-run these
//! stages on resume instead of caching them.

#![deny(unsafe_code)]

pub mod error;
pub mod merge;
pub mod red_flag;
pub mod votes;
pub mod weights;

pub use error::ScoringError;
pub use merge::{DiscrepancyDetector, RankingMerger};
pub use red_flag::RedFlagGate;
pub use votes::{SearchVoter, SearchVotes, TierWeights};
pub use weights::{WeightScore, WeightScorer};
