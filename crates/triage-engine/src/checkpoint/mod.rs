//! Append-only per-request checkpoint log.
//!
//! One record is appended after each completed node. Records of impure
//! nodes carry the node's output so a resumed run replays it instead of
//! calling the collaborator again.

mod file;
mod memory;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use triage_config::{CheckpointKind, CheckpointSettings};
use triage_arbitration::ArbitrationDecision;
use triage_types::{EvidenceItem, RequestId};

use crate::node::GraphNode;

/// Checkpoint store failures.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt checkpoint record {line} in {path}: {source}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode checkpoint record: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Output of an impure node, replayed on resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CachedOutput {
    Evidence(Vec<EvidenceItem>),
    Decision(ArbitrationDecision),
}

/// One completed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub request_id: RequestId,
    /// Position in the request's log, assigned by the store.
    #[serde(default)]
    pub sequence: u64,
    pub node: GraphNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<CachedOutput>,
    pub recorded_at: DateTime<Utc>,
}

impl CheckpointRecord {
    pub fn new(request_id: RequestId, node: GraphNode, output: Option<CachedOutput>) -> Self {
        Self {
            request_id,
            sequence: 0,
            node,
            output,
            recorded_at: Utc::now(),
        }
    }
}

/// Storage for checkpoint logs.
///
/// Appends for one request are serialized; different requests never wait on
/// each other.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Append a record, returning its assigned sequence number.
    async fn append(&self, record: CheckpointRecord) -> Result<u64, CheckpointError>;

    /// The request's log in append order; empty when none exists.
    async fn load(&self, request_id: &RequestId) -> Result<Vec<CheckpointRecord>, CheckpointError>;

    /// Drop the request's log.
    async fn clear(&self, request_id: &RequestId) -> Result<(), CheckpointError>;
}

/// The store selected by the engine settings, if any.
pub fn store_from_settings(settings: &CheckpointSettings) -> Option<Arc<dyn CheckpointStore>> {
    match settings.kind {
        CheckpointKind::None => None,
        CheckpointKind::Memory => Some(Arc::new(MemoryCheckpointStore::new())),
        CheckpointKind::File => Some(Arc::new(FileCheckpointStore::new(settings.dir.clone()))),
    }
}

/// Replayable outputs found in a log.
#[derive(Debug, Clone, Default)]
pub struct ReplayCache {
    pub evidence: Option<Vec<EvidenceItem>>,
    pub decision: Option<ArbitrationDecision>,
    pub completed: Vec<GraphNode>,
}

impl ReplayCache {
    pub fn from_records(records: &[CheckpointRecord]) -> Self {
        let mut cache = Self::default();
        for record in records {
            if !cache.completed.contains(&record.node) {
                cache.completed.push(record.node);
            }
            match &record.output {
                Some(CachedOutput::Evidence(items)) => cache.evidence = Some(items.clone()),
                Some(CachedOutput::Decision(decision)) => cache.decision = Some(decision.clone()),
                None => {}
            }
        }
        cache
    }

    pub fn has_completed(&self, node: GraphNode) -> bool {
        self.completed.contains(&node)
    }
}
