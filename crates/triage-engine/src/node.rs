//! Graph node tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One state of the inference graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphNode {
    LoadConfig,
    /// Runs concurrently with `BuildQuery -> SearchEvidence`. The driver
    /// dispatches all of [`GraphNode::FORK`] as one joined step that
    /// continues at [`GraphNode::JOIN`]; each still gets its own checkpoint.
    ScoreWeights,
    BuildQuery,
    SearchEvidence,
    MergeRankings,
    DetectDiscrepancy,
    CheckRedFlag,
    RedFlagResponse,
    Arbitrate,
    Done,
}

impl GraphNode {
    pub const ALL: [GraphNode; 10] = [
        GraphNode::LoadConfig,
        GraphNode::ScoreWeights,
        GraphNode::BuildQuery,
        GraphNode::SearchEvidence,
        GraphNode::MergeRankings,
        GraphNode::DetectDiscrepancy,
        GraphNode::CheckRedFlag,
        GraphNode::RedFlagResponse,
        GraphNode::Arbitrate,
        GraphNode::Done,
    ];

    /// Nodes executed as one concurrent step after `LoadConfig`.
    pub const FORK: [GraphNode; 3] = [
        GraphNode::ScoreWeights,
        GraphNode::BuildQuery,
        GraphNode::SearchEvidence,
    ];

    /// Where the forked branches meet.
    pub const JOIN: GraphNode = GraphNode::MergeRankings;

    /// Edges as `(from, to, label)`.
    pub const EDGES: [(GraphNode, GraphNode, Option<&'static str>); 11] = [
        (GraphNode::LoadConfig, GraphNode::ScoreWeights, None),
        (GraphNode::LoadConfig, GraphNode::BuildQuery, None),
        (GraphNode::BuildQuery, GraphNode::SearchEvidence, None),
        (GraphNode::ScoreWeights, GraphNode::MergeRankings, None),
        (GraphNode::SearchEvidence, GraphNode::MergeRankings, None),
        (GraphNode::MergeRankings, GraphNode::DetectDiscrepancy, None),
        (GraphNode::DetectDiscrepancy, GraphNode::CheckRedFlag, None),
        (GraphNode::CheckRedFlag, GraphNode::RedFlagResponse, Some("red flag")),
        (GraphNode::CheckRedFlag, GraphNode::Arbitrate, Some("clear")),
        (GraphNode::RedFlagResponse, GraphNode::Done, None),
        (GraphNode::Arbitrate, GraphNode::Done, None),
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GraphNode::LoadConfig => "LOAD_CONFIG",
            GraphNode::ScoreWeights => "SCORE_WEIGHTS",
            GraphNode::BuildQuery => "BUILD_QUERY",
            GraphNode::SearchEvidence => "SEARCH_EVIDENCE",
            GraphNode::MergeRankings => "MERGE_RANKINGS",
            GraphNode::DetectDiscrepancy => "DETECT_DISCREPANCY",
            GraphNode::CheckRedFlag => "CHECK_RED_FLAG",
            GraphNode::RedFlagResponse => "RED_FLAG_RESPONSE",
            GraphNode::Arbitrate => "ARBITRATE",
            GraphNode::Done => "DONE",
        }
    }

    /// Pure nodes are re-run on resume; impure outputs are replayed.
    pub fn is_pure(&self) -> bool {
        !matches!(self, GraphNode::SearchEvidence | GraphNode::Arbitrate)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GraphNode::Done)
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mermaid flowchart of the graph.
pub fn mermaid() -> String {
    let mut out = String::from("graph TD\n");
    for (from, to, label) in GraphNode::EDGES {
        match label {
            Some(label) => out.push_str(&format!("    {from} -->|{label}| {to}\n")),
            None => out.push_str(&format!("    {from} --> {to}\n")),
        }
    }
    out
}
