//! Evidence retrieval contract and a file-backed retriever.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};
use triage_types::EvidenceItem;

/// Retrieval failures.
#[derive(Debug, Error)]
pub enum RetrieverError {
    #[error("evidence backend unavailable: {0}")]
    Unavailable(String),

    #[error("evidence search timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("failed to read evidence corpus {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid evidence corpus {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Returns evidence for a free-text query.
///
/// An empty result is valid. Implementations should honour `min_score`,
/// though the engine re-applies it.
#[async_trait]
pub trait EvidenceRetriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        body_part: &str,
        min_score: f64,
    ) -> Result<Vec<EvidenceItem>, RetrieverError>;
}

#[async_trait]
impl<R: EvidenceRetriever + ?Sized> EvidenceRetriever for Arc<R> {
    async fn search(
        &self,
        query: &str,
        body_part: &str,
        min_score: f64,
    ) -> Result<Vec<EvidenceItem>, RetrieverError> {
        (**self).search(query, body_part, min_score).await
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CorpusEntry {
    body_part: String,
    #[serde(flatten)]
    item: EvidenceItem,
}

/// Serves a precomputed evidence corpus from a JSON file.
///
/// Each entry carries its body part and a similarity score already computed
/// offline; the query text is only logged. Results are sorted by similarity
/// and capped at `top_k`.
#[derive(Debug, Clone)]
pub struct JsonFileRetriever {
    entries: Vec<CorpusEntry>,
    top_k: usize,
}

impl JsonFileRetriever {
    pub async fn load(path: impl AsRef<Path>, top_k: usize) -> Result<Self, RetrieverError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RetrieverError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json(&text, top_k).map_err(|source| RetrieverError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(json: &str, top_k: usize) -> Result<Self, serde_json::Error> {
        let entries: Vec<CorpusEntry> = serde_json::from_str(json)?;
        Ok(Self {
            entries,
            top_k: top_k.max(1),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl EvidenceRetriever for JsonFileRetriever {
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    async fn search(
        &self,
        query: &str,
        body_part: &str,
        min_score: f64,
    ) -> Result<Vec<EvidenceItem>, RetrieverError> {
        let mut hits: Vec<EvidenceItem> = self
            .entries
            .iter()
            .filter(|e| e.body_part == body_part && e.item.similarity >= min_score)
            .map(|e| e.item.clone())
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(self.top_k);
        debug!(hits = hits.len(), "file corpus searched");
        Ok(hits)
    }
}
