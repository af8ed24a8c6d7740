//! Bucket inference graph.
//!
//! [`InferenceGraph`] drives one request through an explicit state machine:
//!
//! 1. load the body part's configuration
//! 2. score symptom weights while building a query and searching evidence
//! 3. merge both rankings and record any disagreement
//! 4. short-circuit on a red flag, otherwise hand everything to the
//!    [`Arbitrator`](triage_arbitration::Arbitrator)
//!
//! Each completed node can be appended to a [`CheckpointStore`]. A resumed
//! run re-executes the deterministic nodes and replays the search evidence
//! and arbitration decision from the log, producing the same
//! [`FinalResult`](triage_types::FinalResult).
//!
//! ```ignore
//! let graph = InferenceGraph::new(configs, retriever, arbitrator)
//!     .with_checkpoints(Arc::new(MemoryCheckpointStore::new()))
//!     .with_options(GraphOptions::from_config(&settings)?);
//! let result = graph.run(request).await?;
//! ```

#![deny(unsafe_code)]

pub mod checkpoint;
pub mod error;
pub mod graph;
pub mod node;
pub mod query;
pub mod retriever;
pub mod state;
pub mod testing;

pub use checkpoint::{
    store_from_settings, CachedOutput, CheckpointError, CheckpointRecord, CheckpointStore,
    FileCheckpointStore, MemoryCheckpointStore, ReplayCache,
};
pub use error::{ErrorKind, ErrorReport, InferenceError, Result};
pub use graph::{GraphOptions, InferenceGraph};
pub use node::GraphNode;
pub use query::build_query;
pub use retriever::{EvidenceRetriever, JsonFileRetriever, RetrieverError};
pub use state::{InferenceState, StateUpdate};
