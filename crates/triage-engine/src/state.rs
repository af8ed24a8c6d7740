//! Per-request state threaded through the graph.

use std::sync::Arc;
use tracing::debug;
use triage_arbitration::ArbitrationDecision;
use triage_scoring::{SearchVotes, WeightScore};
use triage_types::{
    BodyPartConfig, DiscrepancyRecord, EvidenceItem, FinalResult, Ranking, RedFlagResult,
    TriageRequest,
};

use crate::error::{InferenceError, Result};
use crate::node::GraphNode;

/// Output of one node. Stages never touch the state; the driver applies the
/// update they return.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    ConfigLoaded(Arc<BodyPartConfig>),
    WeightsScored(WeightScore),
    QueryBuilt(String),
    EvidenceRetrieved(Vec<EvidenceItem>),
    RankingsMerged {
        evidence: Vec<EvidenceItem>,
        search: SearchVotes,
        merged: Ranking,
    },
    DiscrepancyDetected(DiscrepancyRecord),
    RedFlagChecked(RedFlagResult),
    RedFlagResponded(FinalResult),
    Decided(ArbitrationDecision),
    Finished(FinalResult),
}

impl StateUpdate {
    /// The node that produces this update.
    pub fn node(&self) -> GraphNode {
        match self {
            StateUpdate::ConfigLoaded(_) => GraphNode::LoadConfig,
            StateUpdate::WeightsScored(_) => GraphNode::ScoreWeights,
            StateUpdate::QueryBuilt(_) => GraphNode::BuildQuery,
            StateUpdate::EvidenceRetrieved(_) => GraphNode::SearchEvidence,
            StateUpdate::RankingsMerged { .. } => GraphNode::MergeRankings,
            StateUpdate::DiscrepancyDetected(_) => GraphNode::DetectDiscrepancy,
            StateUpdate::RedFlagChecked(_) => GraphNode::CheckRedFlag,
            StateUpdate::RedFlagResponded(_) => GraphNode::RedFlagResponse,
            StateUpdate::Decided(_) => GraphNode::Arbitrate,
            StateUpdate::Finished(_) => GraphNode::Done,
        }
    }
}

/// Context for one request. Created at graph entry, filled in monotonically
/// and discarded once the final result is taken.
#[derive(Debug, Clone)]
pub struct InferenceState {
    pub request: Arc<TriageRequest>,
    pub config: Option<Arc<BodyPartConfig>>,
    pub weight: Option<WeightScore>,
    pub query: Option<String>,
    /// Raw retriever output, as checkpointed.
    pub evidence: Option<Vec<EvidenceItem>>,
    /// Filtered, deduplicated and tier-sorted evidence.
    pub ranked_evidence: Option<Vec<EvidenceItem>>,
    pub search: Option<SearchVotes>,
    pub merged_ranking: Option<Ranking>,
    pub discrepancy: Option<DiscrepancyRecord>,
    pub red_flag: Option<RedFlagResult>,
    pub decision: Option<ArbitrationDecision>,
    pub result: Option<FinalResult>,
}

impl InferenceState {
    pub fn new(request: Arc<TriageRequest>) -> Self {
        Self {
            request,
            config: None,
            weight: None,
            query: None,
            evidence: None,
            ranked_evidence: None,
            search: None,
            merged_ranking: None,
            discrepancy: None,
            red_flag: None,
            decision: None,
            result: None,
        }
    }

    pub fn apply(&mut self, update: StateUpdate) {
        debug!(node = %update.node(), "state updated");
        match update {
            StateUpdate::ConfigLoaded(config) => self.config = Some(config),
            StateUpdate::WeightsScored(weight) => self.weight = Some(weight),
            StateUpdate::QueryBuilt(query) => self.query = Some(query),
            StateUpdate::EvidenceRetrieved(evidence) => self.evidence = Some(evidence),
            StateUpdate::RankingsMerged {
                evidence,
                search,
                merged,
            } => {
                self.ranked_evidence = Some(evidence);
                self.search = Some(search);
                self.merged_ranking = Some(merged);
            }
            StateUpdate::DiscrepancyDetected(record) => self.discrepancy = Some(record),
            StateUpdate::RedFlagChecked(result) => self.red_flag = Some(result),
            StateUpdate::Decided(decision) => self.decision = Some(decision),
            StateUpdate::RedFlagResponded(result) | StateUpdate::Finished(result) => {
                self.result = Some(result)
            }
        }
    }

    /// Whether the red-flag gate fired.
    pub fn is_red_flagged(&self) -> bool {
        self.red_flag.as_ref().is_some_and(|r| r.matched)
    }

    /// The node to run after `current`, branching on the red-flag result.
    pub fn next_node(&self, current: GraphNode) -> GraphNode {
        match current {
            GraphNode::LoadConfig => GraphNode::ScoreWeights,
            GraphNode::ScoreWeights => GraphNode::BuildQuery,
            GraphNode::BuildQuery => GraphNode::SearchEvidence,
            GraphNode::SearchEvidence => GraphNode::MergeRankings,
            GraphNode::MergeRankings => GraphNode::DetectDiscrepancy,
            GraphNode::DetectDiscrepancy => GraphNode::CheckRedFlag,
            GraphNode::CheckRedFlag if self.is_red_flagged() => GraphNode::RedFlagResponse,
            GraphNode::CheckRedFlag => GraphNode::Arbitrate,
            GraphNode::RedFlagResponse | GraphNode::Arbitrate | GraphNode::Done => GraphNode::Done,
        }
    }
}

/// Borrow a field an earlier node must have written.
pub(crate) fn required<'a, T>(
    field: &'a Option<T>,
    node: GraphNode,
    name: &'static str,
) -> Result<&'a T> {
    field
        .as_ref()
        .ok_or(InferenceError::MissingState { node, field: name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_types::{Demographics, Severity, Sex, SymptomSet};

    fn state() -> InferenceState {
        let symptoms = SymptomSet::new(
            ["fever_chills"],
            Demographics::new(40, Sex::Male, 175.0, 70.0),
        );
        InferenceState::new(Arc::new(TriageRequest::new("shoulder", symptoms)))
    }

    #[test]
    fn test_branch_on_red_flag() {
        let mut s = state();
        s.apply(StateUpdate::RedFlagChecked(RedFlagResult::clear()));
        assert_eq!(s.next_node(GraphNode::CheckRedFlag), GraphNode::Arbitrate);

        let mut s = state();
        s.apply(StateUpdate::RedFlagChecked(RedFlagResult {
            matched: true,
            matched_rules: vec!["infection".into()],
            severity: Some(Severity::Emergency),
            messages: vec![],
        }));
        assert!(s.is_red_flagged());
        assert_eq!(
            s.next_node(GraphNode::CheckRedFlag),
            GraphNode::RedFlagResponse
        );
    }

    #[test]
    fn test_linear_prefix_and_terminals() {
        let s = state();
        let mut node = GraphNode::LoadConfig;
        let mut path = vec![node];
        while node != GraphNode::CheckRedFlag {
            node = s.next_node(node);
            path.push(node);
        }
        assert_eq!(path.len(), 7);
        assert_eq!(s.next_node(GraphNode::Arbitrate), GraphNode::Done);
        assert_eq!(s.next_node(GraphNode::RedFlagResponse), GraphNode::Done);
        assert_eq!(s.next_node(GraphNode::Done), GraphNode::Done);
    }

    #[test]
    fn test_required_reports_missing_field() {
        let s = state();
        let err = required(&s.weight, GraphNode::MergeRankings, "weight").unwrap_err();
        assert!(matches!(
            err,
            InferenceError::MissingState {
                node: GraphNode::MergeRankings,
                field: "weight"
            }
        ));
    }
}
