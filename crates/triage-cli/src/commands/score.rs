//! `triage score`

use serde::Serialize;
use std::sync::Arc;
use triage_config::ConfigProvider;
use triage_scoring::{RedFlagGate, WeightScorer};
use triage_types::{BucketScore, Ranking, RedFlagResult, TriageRequest};

use crate::output::{
    bucket_score_rows, print_heading, print_json, print_red_flag, render_table, OutputFormat,
};

#[derive(Serialize)]
struct ScoreReport {
    body_part: String,
    bmi: f64,
    derived_codes: [&'static str; 3],
    applied_codes: Vec<String>,
    bucket_scores: Vec<BucketScore>,
    weight_ranking: Ranking,
    red_flag: RedFlagResult,
}

pub async fn execute(
    provider: &Arc<dyn ConfigProvider>,
    requests: Vec<TriageRequest>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut reports = Vec::with_capacity(requests.len());
    for request in requests {
        let demographics = request.symptoms.demographics();
        demographics.validate()?;
        let config = provider.load(&request.body_part).await?;
        let weight = WeightScorer::new().score(&config, &request.symptoms)?;
        let red_flag = RedFlagGate::new().evaluate(config.red_flag_rules(), &request.symptoms);
        reports.push(ScoreReport {
            body_part: config.code().to_string(),
            bmi: demographics.bmi(),
            derived_codes: demographics.derived_codes(),
            applied_codes: weight.applied_codes,
            bucket_scores: weight.breakdown,
            weight_ranking: weight.ranking,
            red_flag,
        });
    }

    match format {
        OutputFormat::Json => print_json(&reports),
        OutputFormat::Text => {
            for report in &reports {
                print_text(report);
            }
            Ok(())
        }
    }
}

fn print_text(report: &ScoreReport) {
    print_heading(&format!(
        "{} (BMI {:.1}; {})",
        report.body_part,
        report.bmi,
        report.derived_codes.join(", ")
    ));
    println!("{}", render_table(bucket_score_rows(&report.bucket_scores)));
    println!("ranking: {}", report.weight_ranking);
    if report.red_flag.matched {
        print_red_flag(&report.red_flag.matched_rules.join(", "));
        for message in &report.red_flag.messages {
            println!("  {message}");
        }
        if let Some(action) = report.red_flag.recommended_action() {
            println!("  {action}");
        }
    }
}
