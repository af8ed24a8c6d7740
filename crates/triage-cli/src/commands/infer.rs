//! `triage infer`

use anyhow::Context;
use std::sync::Arc;
use triage_arbitration::{LlmArbitrator, OpenAiChatBackend};
use triage_config::{ConfigProvider, EngineConfig};
use triage_engine::{
    store_from_settings, EvidenceRetriever, GraphOptions, InferenceError, InferenceGraph,
    JsonFileRetriever,
};
use triage_types::{FinalResult, TriageRequest};

use crate::output::{
    bucket_score_rows, print_error, print_heading, print_json, print_red_flag, print_warning,
    render_table, OutputFormat,
};

const DEFAULT_CORPUS: &str = "evidence.json";

pub async fn execute(
    settings: &EngineConfig,
    configs: Arc<dyn ConfigProvider>,
    requests: Vec<TriageRequest>,
    resume: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let backend = OpenAiChatBackend::from_settings(&settings.arbitration)
        .context("arbitration backend is not configured")?;
    let arbitrator = Arc::new(LlmArbitrator::new(Arc::new(backend)));

    let mut graph = InferenceGraph::new(configs, retriever(settings).await?, arbitrator)
        .with_options(GraphOptions::from_config(settings)?);
    if let Some(store) = store_from_settings(&settings.checkpoint) {
        graph = graph.with_checkpoints(store);
    }

    let outcomes = if resume {
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let body_part = request.body_part.clone();
            outcomes.push((body_part, graph.resume(request).await));
        }
        outcomes
    } else if requests.len() == 1 {
        let mut requests = requests;
        let request = requests.remove(0);
        let body_part = request.body_part.clone();
        let result = graph.run_cancellable(request, shutdown_signal()).await;
        vec![(body_part, result)]
    } else {
        graph.run_many(requests).await
    };

    let failed = outcomes.iter().any(|(_, outcome)| outcome.is_err());
    match format {
        OutputFormat::Json => {
            let reports: Vec<serde_json::Value> = outcomes
                .iter()
                .map(|(body_part, outcome)| match outcome {
                    Ok(result) => serde_json::json!({ "body_part": body_part, "result": result }),
                    Err(e) => serde_json::json!({ "body_part": body_part, "error": e.report() }),
                })
                .collect();
            print_json(&reports)?;
        }
        OutputFormat::Text => {
            for (body_part, outcome) in &outcomes {
                match outcome {
                    Ok(result) => print_result(result),
                    Err(e) => print_failure(body_part, e),
                }
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

async fn retriever(settings: &EngineConfig) -> anyhow::Result<Arc<dyn EvidenceRetriever>> {
    let path = settings
        .data
        .evidence_file
        .clone()
        .unwrap_or_else(|| settings.data.dir.join(DEFAULT_CORPUS));
    let corpus = JsonFileRetriever::load(&path, settings.search.top_k)
        .await
        .with_context(|| format!("failed to load evidence corpus {}", path.display()))?;
    tracing::info!(items = corpus.len(), path = %path.display(), "evidence corpus loaded");
    Ok(Arc::new(corpus))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler; never cancel.
        std::future::pending::<()>().await;
    }
}

fn print_result(result: &FinalResult) {
    match &result.final_bucket {
        Some(bucket) => print_heading(&format!(
            "{}: {} (confidence {:.2})",
            result.body_part, bucket, result.confidence
        )),
        None => {
            print_heading(&result.body_part);
            print_red_flag("exercise withheld");
        }
    }
    println!("{}", render_table(bucket_score_rows(&result.bucket_scores)));
    println!("weight ranking: {}", result.weight_ranking);
    println!("search ranking: {}", result.search_ranking);
    println!("merged ranking: {}", result.merged_ranking);
    if result.discrepancy.has_discrepancy {
        print_warning(&result.discrepancy.summary());
    }
    if !result.evidence_summary.is_empty() {
        println!("evidence: {}", result.evidence_summary);
    }
    println!("reasoning: {}", result.reasoning);
    if let Some(reconciliation) = &result.reconciliation {
        println!("reconciliation: {reconciliation}");
    }
    for citation in &result.citations {
        println!("  [{}] {}", citation.source_tier, citation.title);
    }
}

fn print_failure(body_part: &str, error: &InferenceError) {
    print_error(&format!("{body_part}: {error} ({})", error.kind()));
}
