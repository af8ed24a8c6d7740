//! End-to-end runs over the reference body-part data.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use triage_arbitration::{ArbitrationDecision, ArbitrationError};
use triage_config::{CachedConfigProvider, ConfigProvider, FileConfigProvider};
use triage_engine::testing::{CountingArbitrator, ScriptedArbitrator, StaticRetriever};
use triage_engine::{
    CheckpointStore, ErrorKind, FileCheckpointStore, GraphNode, GraphOptions, InferenceError,
    InferenceGraph, JsonFileRetriever, MemoryCheckpointStore,
};
use triage_types::{
    BucketCode, Demographics, EvidenceItem, FinalResult, NaturalLanguageInput, Severity, Sex,
    SourceTier, SymptomSet, TriageRequest,
};

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/medical")
}

fn configs() -> Arc<dyn ConfigProvider> {
    Arc::new(CachedConfigProvider::new(Arc::new(FileConfigProvider::new(
        data_dir(),
    ))))
}

async fn corpus() -> Arc<JsonFileRetriever> {
    Arc::new(
        JsonFileRetriever::load(data_dir().join("evidence.json"), 10)
            .await
            .unwrap(),
    )
}

fn knee_evidence() -> Vec<EvidenceItem> {
    vec![
        EvidenceItem::new(
            "oa-guideline",
            "Osteoarthritis in over 16s: diagnosis and management",
            SourceTier::Curated,
            0.82,
        )
        .with_snippet("Activity-related joint pain with short morning stiffness.")
        .with_tag("OA"),
        // Lower-similarity duplicate of the item above.
        EvidenceItem::new(
            "oa-guideline",
            "Osteoarthritis in over 16s: diagnosis and management",
            SourceTier::Curated,
            0.50,
        )
        .with_tag("OA"),
        EvidenceItem::new(
            "meniscus",
            "Meniscal tears: diagnosis and treatment",
            SourceTier::SecondaryCurated,
            0.66,
        )
        .with_tag("TRM"),
        EvidenceItem::new("forum", "Knee clicking thread", SourceTier::Unverified, 0.10)
            .with_tag("OVR"),
    ]
}

fn request(body_part: &str, codes: &[&str], demographics: Demographics) -> TriageRequest {
    TriageRequest::new(
        body_part,
        SymptomSet::new(codes.iter().copied(), demographics),
    )
}

fn scenario_a() -> TriageRequest {
    request(
        "knee",
        &["pain_medial", "stiffness_morning", "chronic", "stairs_down"],
        Demographics::new(55, Sex::Female, 160.0, 60.0),
    )
    .with_natural_language(NaturalLanguageInput {
        chief_complaint: Some("Knee aches going down stairs".into()),
        ..Default::default()
    })
}

fn scenario_b() -> TriageRequest {
    request(
        "knee",
        &["trauma_recent", "locking", "swelling_acute"],
        Demographics::new(28, Sex::Male, 180.0, 75.0),
    )
}

fn scenario_c() -> TriageRequest {
    request(
        "shoulder",
        &["fever_chills", "pain_night"],
        Demographics::new(45, Sex::Female, 165.0, 62.0),
    )
}

fn bucket(result: &FinalResult) -> Option<&str> {
    result.final_bucket.as_ref().map(BucketCode::as_str)
}

fn fast_options() -> GraphOptions {
    GraphOptions {
        search_timeout: Duration::from_millis(50),
        arbitration_timeout: Duration::from_millis(50),
        ..GraphOptions::default()
    }
}

fn retain_logs() -> GraphOptions {
    GraphOptions {
        keep_completed_logs: true,
        ..GraphOptions::default()
    }
}

#[tokio::test]
async fn test_degenerative_knee_resolves_to_oa() {
    let arbitrator = Arc::new(ScriptedArbitrator::follow_weights());
    let graph = InferenceGraph::new(configs(), corpus().await, arbitrator.clone());

    let result = graph.run(scenario_a()).await.unwrap();

    assert_eq!(result.weight_ranking.top(), "OA");
    assert_eq!(result.search_ranking.top(), "OA");
    assert!(!result.discrepancy.has_discrepancy);
    assert!(!result.has_red_flag);
    assert!(!result.skip_exercise);
    assert_eq!(bucket(&result), Some("OA"));
    assert_eq!(result.body_part, "knee");
    assert_eq!(result.merged_ranking.top(), "OA");
    assert_eq!(result.bucket_scores.len(), 4);
    assert_eq!(result.citations.len(), 1);
    assert_eq!(result.citations[0].source_tier, SourceTier::Curated);
    assert!(result.reconciliation.is_none());
    assert_eq!(arbitrator.calls(), 1);
}

#[tokio::test]
async fn test_acute_knee_injury_resolves_to_trm_with_reconciliation() {
    let arbitrator = Arc::new(ScriptedArbitrator::follow_weights());
    let graph = InferenceGraph::new(configs(), corpus().await, arbitrator.clone());

    let result = graph.run(scenario_b()).await.unwrap();

    assert_eq!(result.weight_ranking.top(), "TRM");
    // The corpus leans degenerative, so the search path disagrees.
    assert_eq!(result.search_ranking.top(), "OA");
    assert!(result.discrepancy.has_discrepancy);
    assert!(result.discrepancy.gap > 0.0);
    assert_eq!(bucket(&result), Some("TRM"));
    assert!(result
        .reconciliation
        .as_deref()
        .is_some_and(|r| r.contains("weight path favours TRM")));
}

#[tokio::test]
async fn test_red_flag_skips_arbitration() {
    let counting = Arc::new(CountingArbitrator::new(Arc::new(
        ScriptedArbitrator::follow_weights(),
    )));
    let graph = InferenceGraph::new(configs(), corpus().await, counting.clone());

    let result = graph.run(scenario_c()).await.unwrap();

    assert!(result.has_red_flag);
    assert!(result.skip_exercise);
    assert_eq!(result.final_bucket, None);
    assert_eq!(result.confidence, 0.0);
    assert!(result.citations.is_empty());
    assert_eq!(result.red_flag.matched_rules, vec!["joint_infection"]);
    assert_eq!(result.red_flag.severity, Some(Severity::Emergency));
    assert!(result.reasoning.contains("joint infection"));
    assert!(result.reasoning.contains("emergency department"));
    assert_eq!(counting.calls(), 0);

    let json = serde_json::to_value(&result).unwrap();
    assert!(json["final_bucket"].is_null());
    assert_eq!(json["skip_exercise"], true);
}

#[tokio::test]
async fn test_red_flag_path_log_has_no_arbitration() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let graph = InferenceGraph::new(
        configs(),
        corpus().await,
        Arc::new(ScriptedArbitrator::follow_weights()),
    )
    .with_checkpoints(store.clone())
    .with_options(retain_logs());
    let request = scenario_c();
    let id = request.request_id;

    graph.run(request).await.unwrap();

    let nodes: Vec<GraphNode> = store.load(&id).await.unwrap().iter().map(|r| r.node).collect();
    assert_eq!(nodes.first(), Some(&GraphNode::LoadConfig));
    assert_eq!(
        &nodes[4..],
        &[
            GraphNode::MergeRankings,
            GraphNode::DetectDiscrepancy,
            GraphNode::CheckRedFlag,
            GraphNode::RedFlagResponse,
            GraphNode::Done,
        ]
    );
    // The parallel branch completes in either order.
    let mut fork = nodes[1..4].to_vec();
    fork.sort();
    assert_eq!(
        fork,
        vec![
            GraphNode::ScoreWeights,
            GraphNode::BuildQuery,
            GraphNode::SearchEvidence
        ]
    );
    assert!(!nodes.contains(&GraphNode::Arbitrate));
}

#[tokio::test]
async fn test_unknown_bucket_from_arbitrator_is_an_error() {
    let arbitrator = ScriptedArbitrator::always(ArbitrationDecision::new(
        "MENISCUS",
        0.9,
        "Looks like a meniscal problem",
    ));
    let graph = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        Arc::new(arbitrator),
    );

    let err = graph.run(scenario_a()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ArbitrationError);
    assert!(matches!(
        err,
        InferenceError::Arbitration(ArbitrationError::ContractViolation(_))
    ));
}

#[tokio::test]
async fn test_stray_citation_is_rejected() {
    let arbitrator = ScriptedArbitrator::always(
        ArbitrationDecision::new("OA", 0.9, "Degenerative picture").with_citation(
            triage_types::Citation::new("A paper nobody retrieved", SourceTier::Curated),
        ),
    );
    let graph = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        Arc::new(arbitrator),
    );

    let err = graph.run(scenario_a()).await.unwrap_err();
    assert!(err.to_string().contains("A paper nobody retrieved"), "{err}");
}

#[tokio::test]
async fn test_request_errors() {
    let arbitrator = Arc::new(ScriptedArbitrator::follow_weights());
    let graph = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        arbitrator.clone(),
    );

    let unknown = request(
        "knee",
        &["pain_medial", "zz_not_a_code"],
        Demographics::new(40, Sex::Male, 175.0, 70.0),
    );
    let err = graph.run(unknown).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownSymptomCode);
    assert_eq!(err.to_string(), "unknown symptom codes for knee: zz_not_a_code");

    // Demographic codes come from the patient's attributes only.
    let spoofed = request(
        "knee",
        &["locking", "age_gte_60", "sex_male"],
        Demographics::new(28, Sex::Male, 180.0, 75.0),
    );
    let err = graph.run(spoofed).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownSymptomCode);
    assert_eq!(
        err.to_string(),
        "unknown symptom codes for knee: age_gte_60, sex_male"
    );

    let hip = request("hip", &[], Demographics::new(40, Sex::Male, 175.0, 70.0));
    assert_eq!(
        graph.run(hip).await.unwrap_err().kind(),
        ErrorKind::ConfigNotFound
    );

    let child = request("knee", &["pain_medial"], Demographics::new(5, Sex::Male, 110.0, 20.0));
    assert_eq!(
        graph.run(child).await.unwrap_err().kind(),
        ErrorKind::InvalidRequest
    );

    assert_eq!(arbitrator.calls(), 0);
}

#[tokio::test]
async fn test_invalid_weight_ratio_fails_the_run() {
    let arbitrator = Arc::new(ScriptedArbitrator::follow_weights());
    let graph = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        arbitrator.clone(),
    )
    .with_options(GraphOptions {
        weight_ratio: f64::NAN,
        ..GraphOptions::default()
    });

    let err = graph.run(scenario_b()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    assert!(err.to_string().contains("invalid weight ratio"), "{err}");
    assert_eq!(arbitrator.calls(), 0);
}

#[tokio::test]
async fn test_search_failures() {
    let failing = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::failing("index offline")),
        Arc::new(ScriptedArbitrator::follow_weights()),
    );
    let err = failing.run(scenario_a()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EvidenceSearchError);
    assert!(err.to_string().contains("index offline"));

    let slow = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence()).with_delay(Duration::from_secs(5))),
        Arc::new(ScriptedArbitrator::follow_weights()),
    )
    .with_options(fast_options());
    let err = slow.run(scenario_a()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EvidenceSearchError);
    assert!(err.to_string().contains("timed out after 50 ms"), "{err}");
}

#[tokio::test]
async fn test_arbitration_timeout() {
    let graph = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        Arc::new(ScriptedArbitrator::follow_weights().with_delay(Duration::from_secs(5))),
    )
    .with_options(fast_options());

    let err = graph.run(scenario_a()).await.unwrap_err();
    assert!(matches!(
        err,
        InferenceError::Arbitration(ArbitrationError::Timeout { after_ms: 50 })
    ));
}

#[tokio::test]
async fn test_empty_evidence_still_arbitrates() {
    let graph = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::empty()),
        Arc::new(ScriptedArbitrator::follow_weights()),
    );

    let result = graph.run(scenario_b()).await.unwrap();
    assert!(result.discrepancy.search_abstained);
    // An abstaining search falls back to bucket order.
    assert_eq!(result.search_ranking.top(), "OA");
    assert!(result.discrepancy.has_discrepancy);
    assert_eq!(bucket(&result), Some("TRM"));
    assert!(result.citations.is_empty());
}

#[tokio::test]
async fn test_resume_replays_cached_outputs_bit_identically() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let request = scenario_a();

    let first = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        Arc::new(ScriptedArbitrator::follow_weights()),
    )
    .with_checkpoints(store.clone())
    .with_options(retain_logs());
    let original = first.run(request.clone()).await.unwrap();
    let logged = store.load(&request.request_id).await.unwrap().len();

    // Neither collaborator may be called on resume.
    let retriever = Arc::new(StaticRetriever::failing("must not be called"));
    let arbitrator = Arc::new(ScriptedArbitrator::failing(ArbitrationError::Backend(
        "must not be called".into(),
    )));
    let second = InferenceGraph::new(configs(), retriever.clone(), arbitrator.clone())
        .with_checkpoints(store.clone())
        .with_options(retain_logs());
    let resumed = second.resume(request.clone()).await.unwrap();

    assert_eq!(
        serde_json::to_vec(&original).unwrap(),
        serde_json::to_vec(&resumed).unwrap()
    );
    assert_eq!(retriever.calls(), 0);
    assert_eq!(arbitrator.calls(), 0);
    assert_eq!(store.load(&request.request_id).await.unwrap().len(), logged);
}

#[tokio::test]
async fn test_resume_after_crash_in_arbitration_from_file_log() {
    let dir = tempfile::tempdir().unwrap();
    let request = scenario_b();
    let id = request.request_id;

    let crashed = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        Arc::new(ScriptedArbitrator::failing(ArbitrationError::Backend(
            "connection reset".into(),
        ))),
    )
    .with_checkpoints(Arc::new(FileCheckpointStore::new(dir.path())));
    assert!(crashed.run(request.clone()).await.is_err());

    // A new process over the same directory.
    let store = Arc::new(FileCheckpointStore::new(dir.path()));
    let retriever = Arc::new(StaticRetriever::failing("must not be called"));
    let arbitrator = Arc::new(ScriptedArbitrator::follow_weights());
    let resumed = InferenceGraph::new(configs(), retriever.clone(), arbitrator.clone())
        .with_checkpoints(store.clone())
        .with_options(retain_logs())
        .resume(request.clone())
        .await
        .unwrap();
    assert_eq!(retriever.calls(), 0);
    assert_eq!(arbitrator.calls(), 1);

    let fresh = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        Arc::new(ScriptedArbitrator::follow_weights()),
    )
    .run(request)
    .await
    .unwrap();
    assert_eq!(
        serde_json::to_string(&fresh).unwrap(),
        serde_json::to_string(&resumed).unwrap()
    );

    let nodes: Vec<GraphNode> = store.load(&id).await.unwrap().iter().map(|r| r.node).collect();
    let mut unique = nodes.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), nodes.len(), "nodes appended twice: {nodes:?}");
    assert_eq!(nodes.last(), Some(&GraphNode::Done));
    assert!(nodes.contains(&GraphNode::Arbitrate));
}

#[tokio::test]
async fn test_run_discards_previous_log() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let graph = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        Arc::new(ScriptedArbitrator::follow_weights()),
    )
    .with_checkpoints(store.clone())
    .with_options(retain_logs());
    let request = scenario_a();

    graph.run(request.clone()).await.unwrap();
    let once = store.load(&request.request_id).await.unwrap().len();
    graph.run(request.clone()).await.unwrap();
    assert_eq!(store.load(&request.request_id).await.unwrap().len(), once);
}

#[tokio::test]
async fn test_completed_runs_release_their_logs() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let graph = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        Arc::new(ScriptedArbitrator::follow_weights()),
    )
    .with_checkpoints(store.clone());

    for _ in 0..50 {
        graph.run(scenario_a()).await.unwrap();
    }
    graph.run(scenario_c()).await.unwrap();
    assert_eq!(store.request_count(), 0);

    // A failed run keeps its log so it can be resumed.
    let failing = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        Arc::new(ScriptedArbitrator::failing(ArbitrationError::Backend(
            "connection reset".into(),
        ))),
    )
    .with_checkpoints(store.clone());
    let request = scenario_b();
    assert!(failing.run(request.clone()).await.is_err());
    assert_eq!(store.request_count(), 1);

    graph.resume(request).await.unwrap();
    assert_eq!(store.request_count(), 0);
}

#[tokio::test]
async fn test_completed_file_log_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let graph = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        Arc::new(ScriptedArbitrator::follow_weights()),
    )
    .with_checkpoints(Arc::new(FileCheckpointStore::new(dir.path())));

    graph.run(scenario_a()).await.unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_cancellation_drops_in_flight_arbitration() {
    let graph = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::new(knee_evidence())),
        Arc::new(ScriptedArbitrator::follow_weights().with_delay(Duration::from_secs(30))),
    );

    let started = std::time::Instant::now();
    let err = graph
        .run_cancellable(scenario_a(), tokio::time::sleep(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_run_many_keeps_body_parts_independent() {
    let arbitrator = Arc::new(ScriptedArbitrator::follow_weights());
    let graph = InferenceGraph::new(configs(), corpus().await, arbitrator.clone());

    let outcomes = graph
        .run_many(vec![
            scenario_a(),
            scenario_c(),
            request("hip", &[], Demographics::new(40, Sex::Male, 175.0, 70.0)),
        ])
        .await;

    let parts: Vec<&str> = outcomes.iter().map(|(part, _)| part.as_str()).collect();
    assert_eq!(parts, vec!["knee", "shoulder", "hip"]);
    assert_eq!(bucket(outcomes[0].1.as_ref().unwrap()), Some("OA"));
    assert!(outcomes[1].1.as_ref().unwrap().has_red_flag);
    assert_eq!(
        outcomes[2].1.as_ref().unwrap_err().kind(),
        ErrorKind::ConfigNotFound
    );
    assert_eq!(arbitrator.calls(), 1);
}

#[tokio::test]
async fn test_describe_renders_mermaid() {
    let graph = InferenceGraph::new(
        configs(),
        Arc::new(StaticRetriever::empty()),
        Arc::new(ScriptedArbitrator::follow_weights()),
    );
    let chart = graph.describe();
    assert!(chart.starts_with("graph TD\n"));
    assert!(chart.contains("CHECK_RED_FLAG -->|red flag| RED_FLAG_RESPONSE"));
    assert!(chart.contains("CHECK_RED_FLAG -->|clear| ARBITRATE"));
}
