//! Arbitrator backed by a reasoning backend.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::arbitrator::Arbitrator;
use crate::backend::{ReasoningBackend, ReasoningRequest};
use crate::context::ArbitrationContext;
use crate::decision::ArbitrationDecision;
use crate::error::ArbitrationError;
use crate::parse::parse_decision;
use crate::prompt::{PromptBuilder, SYSTEM_PROMPT};

/// Renders the prompt, asks the backend once and parses the answer.
#[derive(Clone)]
pub struct LlmArbitrator {
    backend: Arc<dyn ReasoningBackend>,
    prompts: PromptBuilder,
}

impl LlmArbitrator {
    pub fn new(backend: Arc<dyn ReasoningBackend>) -> Self {
        Self {
            backend,
            prompts: PromptBuilder::new(),
        }
    }

    pub fn request_for(&self, ctx: &ArbitrationContext) -> ReasoningRequest {
        ReasoningRequest::new(SYSTEM_PROMPT, self.prompts.build(ctx))
    }
}

impl std::fmt::Debug for LlmArbitrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmArbitrator")
            .field("backend", &self.backend.name())
            .finish()
    }
}

#[async_trait]
impl Arbitrator for LlmArbitrator {
    fn name(&self) -> &str {
        self.backend.name()
    }

    #[instrument(skip(self, ctx), fields(body_part = ctx.body_part(), backend = self.backend.name()))]
    async fn decide(&self, ctx: &ArbitrationContext) -> Result<ArbitrationDecision, ArbitrationError> {
        let request = self.request_for(ctx);
        let raw = self.backend.complete(&request).await?;
        debug!(chars = raw.len(), "arbitration answer received");

        parse_decision(&raw, ctx).inspect_err(|e| {
            warn!(error = %e, "arbitration answer rejected");
        })
    }
}
