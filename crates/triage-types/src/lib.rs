//! Triage data model
//!
//! Shared vocabulary for the bucket inference engine. Everything here is
//! plain data with its invariants enforced at construction:
//!
//! - [`BucketOrder`] — the ordered, duplicate-free bucket set of a body part
//! - [`Ranking`] — a permutation of a bucket order, highest first
//! - [`BucketScoreVector`] — non-negative scores aligned to a bucket order
//! - [`BodyPartConfig`] — validated weight table, red-flag rules and template
//! - [`SymptomSet`] / [`TriageRequest`] — the immutable per-request input
//! - [`EvidenceItem`] / [`Citation`] — retrieved evidence and references to it
//! - [`FinalResult`] — the value handed to exercise recommendation

#![deny(unsafe_code)]

pub mod body_part;
pub mod bucket;
pub mod discrepancy;
pub mod error;
pub mod evidence;
pub mod red_flag;
pub mod request;
pub mod result;

pub use body_part::{BodyPartConfig, BodyPartConfigBuilder, BucketInfo};
pub use bucket::{BucketCode, BucketOrder, BucketScoreVector, Ranking};
pub use discrepancy::{DiscrepancyRecord, RankShift};
pub use error::ValidationError;
pub use evidence::{Citation, EvidenceItem, SourceTier};
pub use red_flag::{RedFlagResult, RedFlagRule, Severity};
pub use request::{Demographics, NaturalLanguageInput, RequestId, Sex, SymptomSet, TriageRequest};
pub use result::{BucketScore, FinalResult};
