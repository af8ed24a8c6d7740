use async_trait::async_trait;
use std::sync::Arc;

use crate::context::ArbitrationContext;
use crate::decision::ArbitrationDecision;
use crate::error::ArbitrationError;

/// Commits to exactly one bucket from the supplied signals.
///
/// Implementations must pick a bucket from the context's bucket order,
/// report confidence in `[0, 1]`, cite only supplied evidence and reconcile
/// any recorded discrepancy. Callers re-check this with
/// [`ArbitrationDecision::validate`].
#[async_trait]
pub trait Arbitrator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn decide(&self, ctx: &ArbitrationContext) -> Result<ArbitrationDecision, ArbitrationError>;
}

#[async_trait]
impl<A: Arbitrator + ?Sized> Arbitrator for Arc<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn decide(&self, ctx: &ArbitrationContext) -> Result<ArbitrationDecision, ArbitrationError> {
        (**self).decide(ctx).await
    }
}
