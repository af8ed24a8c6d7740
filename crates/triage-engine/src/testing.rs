//! Test doubles for the graph's collaborators.
//!
//! Shared by this crate's integration tests and by downstream crates that
//! drive an [`InferenceGraph`](crate::InferenceGraph) without a real
//! retriever or reasoning backend.

use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use triage_arbitration::{ArbitrationContext, ArbitrationDecision, ArbitrationError, Arbitrator};
use triage_types::{Citation, EvidenceItem};

use crate::retriever::{EvidenceRetriever, RetrieverError};

type Script =
    dyn Fn(&ArbitrationContext) -> Result<ArbitrationDecision, ArbitrationError> + Send + Sync;

/// Arbitrator whose answers come from a closure.
pub struct ScriptedArbitrator {
    script: Box<Script>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedArbitrator {
    pub fn from_fn<F>(script: F) -> Self
    where
        F: Fn(&ArbitrationContext) -> Result<ArbitrationDecision, ArbitrationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Box::new(script),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the same decision for every request.
    pub fn always(decision: ArbitrationDecision) -> Self {
        Self::from_fn(move |_| Ok(decision.clone()))
    }

    pub fn failing(error: ArbitrationError) -> Self {
        Self::from_fn(move |_| Err(error.clone()))
    }

    /// Commits to the weight path's top bucket, cites the strongest evidence
    /// item and reconciles any discrepancy in favour of the weights.
    pub fn follow_weights() -> Self {
        Self::from_fn(|ctx| {
            let bucket = ctx.weight_ranking().top().clone();
            let mut decision = ArbitrationDecision::new(
                bucket.clone(),
                0.8,
                format!("Symptom weights favour {bucket}."),
            )
            .with_evidence_summary(format!("{} evidence items reviewed", ctx.evidence.len()));
            if let Some(item) = ctx.evidence.first() {
                decision = decision.with_citation(Citation::new(item.title.clone(), item.source_tier));
            }
            if ctx.discrepancy.has_discrepancy {
                decision = decision.with_reconciliation(format!(
                    "{}; the calibrated weights take precedence",
                    ctx.discrepancy.summary()
                ));
            }
            Ok(decision)
        })
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ScriptedArbitrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedArbitrator")
            .field("delay", &self.delay)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Arbitrator for ScriptedArbitrator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn decide(&self, ctx: &ArbitrationContext) -> Result<ArbitrationDecision, ArbitrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.script)(ctx)
    }
}

/// Counts calls into any arbitrator.
pub struct CountingArbitrator {
    inner: Arc<dyn Arbitrator>,
    calls: AtomicUsize,
}

impl CountingArbitrator {
    pub fn new(inner: Arc<dyn Arbitrator>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for CountingArbitrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingArbitrator")
            .field("inner", &self.inner.name())
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl Arbitrator for CountingArbitrator {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn decide(&self, ctx: &ArbitrationContext) -> Result<ArbitrationDecision, ArbitrationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.decide(ctx).await
    }
}

/// Retriever serving a fixed list of items.
#[derive(Debug, Default)]
pub struct StaticRetriever {
    items: Vec<EvidenceItem>,
    failure: Option<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticRetriever {
    pub fn new(items: Vec<EvidenceItem>) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Fails every search as an unavailable backend.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvidenceRetriever for StaticRetriever {
    async fn search(
        &self,
        _query: &str,
        _body_part: &str,
        min_score: f64,
    ) -> Result<Vec<EvidenceItem>, RetrieverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.failure {
            return Err(RetrieverError::Unavailable(reason.clone()));
        }
        Ok(self
            .items
            .iter()
            .filter(|item| item.similarity >= min_score)
            .cloned()
            .collect())
    }
}
