//! Graph driver.
//!
//! The driver owns the only mutable state of a run. It dispatches on the
//! current [`GraphNode`], applies the [`StateUpdate`] each stage returns and
//! appends a checkpoint once the node completes.

use futures::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use triage_arbitration::{ArbitrationContext, ArbitrationDecision, ArbitrationError, Arbitrator};
use triage_config::{ConfigProvider, EngineConfig};
use triage_scoring::{
    DiscrepancyDetector, RankingMerger, RedFlagGate, SearchVoter, TierWeights, WeightScore,
    WeightScorer,
};
use triage_types::{BodyPartConfig, EvidenceItem, FinalResult, RequestId, TriageRequest};

use crate::checkpoint::{CachedOutput, CheckpointRecord, CheckpointStore, ReplayCache};
use crate::error::{InferenceError, Result};
use crate::node::{self, GraphNode};
use crate::query::build_query;
use crate::retriever::{EvidenceRetriever, RetrieverError};
use crate::state::{required, InferenceState, StateUpdate};

/// Tunables of one graph.
#[derive(Debug, Clone)]
pub struct GraphOptions {
    /// Evidence below this similarity is dropped.
    pub min_score: f64,
    pub tier_weights: TierWeights,
    /// Share of the weight path in the merged ranking.
    pub weight_ratio: f64,
    /// Minimum position change reported as a rank shift.
    pub rank_shift_threshold: usize,
    pub search_timeout: Duration,
    pub arbitration_timeout: Duration,
    /// Keep the checkpoint log of a run that reached DONE. Otherwise it is
    /// released once the result is produced.
    pub keep_completed_logs: bool,
}

impl GraphOptions {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            min_score: config.search.min_score,
            tier_weights: TierWeights::new(config.search.tier_weights.as_array())?,
            weight_ratio: config.ranking.weight_ratio,
            rank_shift_threshold: config.ranking.rank_shift_threshold,
            search_timeout: config.timeouts.search(),
            arbitration_timeout: config.timeouts.arbitration(),
            keep_completed_logs: config.checkpoint.keep_completed,
        })
    }
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            min_score: 0.35,
            tier_weights: TierWeights::default(),
            weight_ratio: 0.6,
            rank_shift_threshold: 2,
            search_timeout: Duration::from_secs(10),
            arbitration_timeout: Duration::from_secs(60),
            keep_completed_logs: false,
        }
    }
}

/// Appends checkpoints for one run, skipping nodes already in the log.
struct Recorder {
    store: Option<Arc<dyn CheckpointStore>>,
    request_id: RequestId,
    replay: ReplayCache,
}

impl Recorder {
    async fn record(&self, node: GraphNode, output: Option<CachedOutput>) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if self.replay.has_completed(node) {
            return Ok(());
        }
        let sequence = store
            .append(CheckpointRecord::new(self.request_id, node, output))
            .await?;
        debug!(node = %node, sequence, "checkpoint recorded");
        Ok(())
    }

    /// Drop the run's log once nothing is left to resume.
    async fn release(&self) -> Result<()> {
        if let Some(store) = &self.store {
            store.clear(&self.request_id).await?;
            debug!("checkpoint log released");
        }
        Ok(())
    }
}

/// Musculoskeletal bucket inference.
///
/// One graph serves any number of concurrent requests; each run gets its
/// own [`InferenceState`].
///
/// ```text
/// LOAD_CONFIG -> SCORE_WEIGHTS  ----------------------\
///             -> BUILD_QUERY -> SEARCH_EVIDENCE ------> MERGE_RANKINGS
///   -> DETECT_DISCREPANCY -> CHECK_RED_FLAG -> RED_FLAG_RESPONSE | ARBITRATE -> DONE
/// ```
pub struct InferenceGraph {
    configs: Arc<dyn ConfigProvider>,
    retriever: Arc<dyn EvidenceRetriever>,
    arbitrator: Arc<dyn Arbitrator>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    options: GraphOptions,
}

impl InferenceGraph {
    pub fn new(
        configs: Arc<dyn ConfigProvider>,
        retriever: Arc<dyn EvidenceRetriever>,
        arbitrator: Arc<dyn Arbitrator>,
    ) -> Self {
        Self {
            configs,
            retriever,
            arbitrator,
            checkpoints: None,
            options: GraphOptions::default(),
        }
    }

    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn with_options(mut self, options: GraphOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &GraphOptions {
        &self.options
    }

    pub fn checkpoints(&self) -> Option<&Arc<dyn CheckpointStore>> {
        self.checkpoints.as_ref()
    }

    /// The graph as a Mermaid flowchart.
    pub fn describe(&self) -> String {
        node::mermaid()
    }

    /// Run a request from scratch, discarding any earlier log for its id.
    ///
    /// A failed or cancelled run keeps its log for [`resume`](Self::resume).
    pub async fn run(&self, request: TriageRequest) -> Result<FinalResult> {
        if let Some(store) = &self.checkpoints {
            store.clear(&request.request_id).await?;
        }
        self.execute(request, ReplayCache::default()).await
    }

    /// Continue a request from its checkpoint log.
    ///
    /// Pure nodes are re-run. Search evidence and the arbitration decision
    /// are replayed from the log when present, so neither collaborator is
    /// called again for a node that already completed.
    pub async fn resume(&self, request: TriageRequest) -> Result<FinalResult> {
        let replay = match &self.checkpoints {
            Some(store) => ReplayCache::from_records(&store.load(&request.request_id).await?),
            None => ReplayCache::default(),
        };
        debug!(
            request_id = %request.request_id,
            completed = replay.completed.len(),
            "resuming from checkpoint log"
        );
        self.execute(request, replay).await
    }

    /// Run until `shutdown` resolves. In-flight collaborator calls are
    /// dropped and the run's state is discarded.
    pub async fn run_cancellable<F>(&self, request: TriageRequest, shutdown: F) -> Result<FinalResult>
    where
        F: Future<Output = ()>,
    {
        let request_id = request.request_id;
        tokio::select! {
            biased;
            _ = shutdown => {
                warn!(request_id = %request_id, "inference cancelled");
                Err(InferenceError::Cancelled)
            }
            result = self.run(request) => result,
        }
    }

    /// Run independent requests concurrently, typically several body parts
    /// of one submission. Outcomes are returned in input order.
    pub async fn run_many(
        &self,
        requests: Vec<TriageRequest>,
    ) -> Vec<(String, Result<FinalResult>)> {
        let runs = requests.into_iter().map(|request| async move {
            let body_part = request.body_part.clone();
            (body_part, self.run(request).await)
        });
        join_all(runs).await
    }

    #[instrument(
        name = "inference",
        skip_all,
        fields(request_id = %request.request_id, body_part = %request.body_part)
    )]
    async fn execute(&self, request: TriageRequest, replay: ReplayCache) -> Result<FinalResult> {
        let request = Arc::new(request);
        let recorder = Recorder {
            store: self.checkpoints.clone(),
            request_id: request.request_id,
            replay,
        };
        let mut state = InferenceState::new(Arc::clone(&request));
        let mut node = GraphNode::LoadConfig;

        loop {
            debug!(node = %node, "entering node");
            node = match node {
                GraphNode::LoadConfig => {
                    state.apply(self.load_config(&request).await?);
                    recorder.record(node, None).await?;
                    state.next_node(node)
                }
                // Fork: SCORE_WEIGHTS alongside BUILD_QUERY -> SEARCH_EVIDENCE,
                // joined before MERGE_RANKINGS.
                GraphNode::ScoreWeights | GraphNode::BuildQuery | GraphNode::SearchEvidence => {
                    let config = Arc::clone(required(&state.config, node, "config")?);
                    let (weight, (query, evidence)) = tokio::try_join!(
                        self.score_weights(&config, &request, &recorder),
                        self.query_and_search(&config, &request, &recorder),
                    )?;
                    state.apply(StateUpdate::WeightsScored(weight));
                    state.apply(StateUpdate::QueryBuilt(query));
                    state.apply(StateUpdate::EvidenceRetrieved(evidence));
                    GraphNode::JOIN
                }
                GraphNode::MergeRankings => {
                    state.apply(self.merge_rankings(&state)?);
                    recorder.record(node, None).await?;
                    state.next_node(node)
                }
                GraphNode::DetectDiscrepancy => {
                    state.apply(self.detect_discrepancy(&state)?);
                    recorder.record(node, None).await?;
                    state.next_node(node)
                }
                GraphNode::CheckRedFlag => {
                    state.apply(self.check_red_flag(&state)?);
                    recorder.record(node, None).await?;
                    state.next_node(node)
                }
                GraphNode::RedFlagResponse => {
                    state.apply(red_flag_response(&state)?);
                    recorder.record(node, None).await?;
                    state.next_node(node)
                }
                GraphNode::Arbitrate => {
                    let decision = self.arbitrate(&state, &recorder).await?;
                    state.apply(StateUpdate::Decided(decision));
                    state.next_node(node)
                }
                GraphNode::Done => {
                    if state.result.is_none() {
                        state.apply(arbitrated_result(&state)?);
                    }
                    if self.options.keep_completed_logs {
                        recorder.record(node, None).await?;
                    } else {
                        recorder.release().await?;
                    }
                    let result = required(&state.result, node, "result")?.clone();
                    info!(
                        final_bucket = result.final_bucket.as_ref().map_or("none", |b| b.as_str()),
                        confidence = result.confidence,
                        has_red_flag = result.has_red_flag,
                        "inference complete"
                    );
                    return Ok(result);
                }
            };
        }
    }

    async fn load_config(&self, request: &TriageRequest) -> Result<StateUpdate> {
        request.symptoms.demographics().validate()?;
        let config = self.configs.load(&request.body_part).await?;
        Ok(StateUpdate::ConfigLoaded(config))
    }

    async fn score_weights(
        &self,
        config: &BodyPartConfig,
        request: &TriageRequest,
        recorder: &Recorder,
    ) -> Result<WeightScore> {
        let weight = WeightScorer::new().score(config, &request.symptoms)?;
        debug!(ranking = %weight.ranking, applied = weight.applied_codes.len(), "weights scored");
        recorder.record(GraphNode::ScoreWeights, None).await?;
        Ok(weight)
    }

    async fn query_and_search(
        &self,
        config: &BodyPartConfig,
        request: &TriageRequest,
        recorder: &Recorder,
    ) -> Result<(String, Vec<EvidenceItem>)> {
        let query = build_query(request);
        recorder.record(GraphNode::BuildQuery, None).await?;

        let evidence = match &recorder.replay.evidence {
            Some(cached) => {
                debug!(items = cached.len(), "replaying cached evidence");
                cached.clone()
            }
            None => {
                let evidence = self.search(&query, config.code()).await?;
                recorder
                    .record(
                        GraphNode::SearchEvidence,
                        Some(CachedOutput::Evidence(evidence.clone())),
                    )
                    .await?;
                evidence
            }
        };
        Ok((query, evidence))
    }

    #[instrument(skip_all, fields(node = %GraphNode::SearchEvidence))]
    async fn search(&self, query: &str, body_part: &str) -> Result<Vec<EvidenceItem>> {
        let limit = self.options.search_timeout;
        let call = self.retriever.search(query, body_part, self.options.min_score);
        let outcome = match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(RetrieverError::Timeout {
                after_ms: millis(limit),
            }),
        };
        match outcome {
            Ok(items) => {
                debug!(items = items.len(), "evidence retrieved");
                Ok(items)
            }
            Err(e) => {
                warn!(error = %e, "evidence search failed");
                Err(e.into())
            }
        }
    }

    fn merge_rankings(&self, state: &InferenceState) -> Result<StateUpdate> {
        let node = GraphNode::MergeRankings;
        let config = required(&state.config, node, "config")?;
        let weight = required(&state.weight, node, "weight score")?;
        let raw = required(&state.evidence, node, "evidence")?;

        let voter = SearchVoter::new(self.options.tier_weights);
        let evidence = voter.prepare_evidence(raw.clone(), self.options.min_score);
        let search = voter.rank(config.bucket_order(), &evidence)?;
        let merged = RankingMerger::new(self.options.weight_ratio)?.merge(
            config.bucket_order(),
            &weight.ranking,
            &search.ranking,
        )?;
        debug!(merged = %merged, "rankings merged");
        Ok(StateUpdate::RankingsMerged {
            evidence,
            search,
            merged,
        })
    }

    fn detect_discrepancy(&self, state: &InferenceState) -> Result<StateUpdate> {
        let node = GraphNode::DetectDiscrepancy;
        let weight = required(&state.weight, node, "weight score")?;
        let search = required(&state.search, node, "search votes")?;
        let record = DiscrepancyDetector::new(self.options.rank_shift_threshold).detect(
            &weight.scores,
            &weight.ranking,
            &search.ranking,
            search.abstained,
        );
        Ok(StateUpdate::DiscrepancyDetected(record))
    }

    fn check_red_flag(&self, state: &InferenceState) -> Result<StateUpdate> {
        let config = required(&state.config, GraphNode::CheckRedFlag, "config")?;
        let result = RedFlagGate::new().evaluate(config.red_flag_rules(), &state.request.symptoms);
        Ok(StateUpdate::RedFlagChecked(result))
    }

    #[instrument(skip_all, fields(node = %GraphNode::Arbitrate, arbitrator = self.arbitrator.name()))]
    async fn arbitrate(
        &self,
        state: &InferenceState,
        recorder: &Recorder,
    ) -> Result<ArbitrationDecision> {
        let ctx = arbitration_context(state)?;
        let decision = match &recorder.replay.decision {
            Some(cached) => {
                debug!(bucket = %cached.final_bucket, "replaying cached decision");
                cached.clone()
            }
            None => self.call_arbitrator(&ctx).await?,
        };

        if let Err(e) = decision.validate(&ctx) {
            warn!(error = %e, "arbitration decision rejected");
            return Err(e.into());
        }
        recorder
            .record(
                GraphNode::Arbitrate,
                Some(CachedOutput::Decision(decision.clone())),
            )
            .await?;
        Ok(decision)
    }

    async fn call_arbitrator(&self, ctx: &ArbitrationContext) -> Result<ArbitrationDecision> {
        let limit = self.options.arbitration_timeout;
        match tokio::time::timeout(limit, self.arbitrator.decide(ctx)).await {
            Ok(Ok(decision)) => Ok(decision),
            Ok(Err(e)) => {
                warn!(error = %e, "arbitration failed");
                Err(e.into())
            }
            Err(_) => {
                warn!(after_ms = millis(limit), "arbitration timed out");
                Err(ArbitrationError::Timeout {
                    after_ms: millis(limit),
                }
                .into())
            }
        }
    }
}

impl fmt::Debug for InferenceGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceGraph")
            .field("arbitrator", &self.arbitrator.name())
            .field("checkpoints", &self.checkpoints.is_some())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn arbitration_context(state: &InferenceState) -> Result<ArbitrationContext> {
    let node = GraphNode::Arbitrate;
    Ok(ArbitrationContext {
        config: Arc::clone(required(&state.config, node, "config")?),
        symptoms: state.request.symptoms.clone(),
        natural_language: state.request.natural_language.clone(),
        bucket_scores: required(&state.weight, node, "weight score")?
            .breakdown
            .clone(),
        discrepancy: required(&state.discrepancy, node, "discrepancy")?.clone(),
        evidence: required(&state.ranked_evidence, node, "ranked evidence")?.clone(),
    })
}

/// Audit fields shared by both terminal branches, with the outcome fields
/// left empty.
fn audit_result(state: &InferenceState, node: GraphNode) -> Result<FinalResult> {
    let config = required(&state.config, node, "config")?;
    let weight = required(&state.weight, node, "weight score")?;
    let search = required(&state.search, node, "search votes")?;
    Ok(FinalResult {
        body_part: config.code().to_string(),
        final_bucket: None,
        confidence: 0.0,
        evidence_summary: String::new(),
        reasoning: String::new(),
        reconciliation: None,
        has_red_flag: false,
        skip_exercise: false,
        bucket_scores: weight.breakdown.clone(),
        weight_ranking: weight.ranking.clone(),
        search_ranking: search.ranking.clone(),
        merged_ranking: required(&state.merged_ranking, node, "merged ranking")?.clone(),
        discrepancy: required(&state.discrepancy, node, "discrepancy")?.clone(),
        red_flag: required(&state.red_flag, node, "red flag result")?.clone(),
        citations: Vec::new(),
    })
}

fn red_flag_response(state: &InferenceState) -> Result<StateUpdate> {
    let node = GraphNode::RedFlagResponse;
    let red_flag = required(&state.red_flag, node, "red flag result")?;
    warn!(
        rules = ?red_flag.matched_rules,
        severity = ?red_flag.severity,
        "red flag raised, arbitration skipped"
    );

    let mut reasoning = red_flag.messages.join(" ");
    if let Some(action) = red_flag.recommended_action() {
        if !reasoning.is_empty() {
            reasoning.push(' ');
        }
        reasoning.push_str(action);
    }

    let mut result = audit_result(state, node)?;
    result.evidence_summary = format!("Red flag rules matched: {}", red_flag.matched_rules.join(", "));
    result.reasoning = reasoning;
    result.has_red_flag = true;
    result.skip_exercise = true;
    Ok(StateUpdate::RedFlagResponded(result))
}

fn arbitrated_result(state: &InferenceState) -> Result<StateUpdate> {
    let node = GraphNode::Done;
    let decision = required(&state.decision, node, "decision")?.clone();
    let mut result = audit_result(state, node)?;
    result.final_bucket = Some(decision.final_bucket);
    result.confidence = decision.confidence;
    result.evidence_summary = decision.evidence_summary;
    result.reasoning = decision.reasoning;
    result.reconciliation = decision.reconciliation;
    result.citations = decision.citations;
    Ok(StateUpdate::Finished(result))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
