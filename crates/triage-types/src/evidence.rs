//! Retrieved evidence and citations of it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bucket::BucketCode;
use crate::error::ValidationError;

/// Trust level of an evidence source. Lower level means higher trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SourceTier {
    /// Curated clinical reference.
    Curated = 1,
    /// Secondary curated source (reviews, peer-reviewed abstracts).
    SecondaryCurated = 2,
    /// Unverified material.
    Unverified = 3,
}

impl SourceTier {
    pub fn level(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceTier::Curated => "curated",
            SourceTier::SecondaryCurated => "secondary curated",
            SourceTier::Unverified => "unverified",
        }
    }
}

impl TryFrom<u8> for SourceTier {
    type Error = ValidationError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            1 => Ok(SourceTier::Curated),
            2 => Ok(SourceTier::SecondaryCurated),
            3 => Ok(SourceTier::Unverified),
            other => Err(ValidationError::InvalidSourceTier(other)),
        }
    }
}

impl From<SourceTier> for u8 {
    fn from(tier: SourceTier) -> Self {
        tier.level()
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {} ({})", self.level(), self.label())
    }
}

/// One retrieved document chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: String,
    pub title: String,
    pub source_tier: SourceTier,
    pub snippet: String,
    pub similarity: f64,
    #[serde(default)]
    pub bucket_tags: Vec<BucketCode>,
}

impl EvidenceItem {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        source_tier: SourceTier,
        similarity: f64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source_tier,
            snippet: String::new(),
            similarity,
            bucket_tags: Vec::new(),
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn with_tag(mut self, bucket: impl Into<BucketCode>) -> Self {
        self.bucket_tags.push(bucket.into());
        self
    }

    pub fn is_tagged(&self, bucket: &str) -> bool {
        self.bucket_tags.iter().any(|t| t.as_str() == bucket)
    }
}

/// Reference from reasoning text to a supplied evidence item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub source_tier: SourceTier,
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub relevance: String,
}

impl Citation {
    pub fn new(title: impl Into<String>, source_tier: SourceTier) -> Self {
        Self {
            title: title.into(),
            source_tier,
            quote: String::new(),
            relevance: String::new(),
        }
    }

    /// True when this citation refers to `item` (same title and tier).
    pub fn cites(&self, item: &EvidenceItem) -> bool {
        self.source_tier == item.source_tier && self.title.trim() == item.title.trim()
    }
}
