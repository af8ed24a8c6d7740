//! `triage body-parts`

use serde::Serialize;
use std::sync::Arc;
use tabled::Tabled;
use triage_config::ConfigProvider;
use triage_types::BodyPartConfig;

use crate::output::{print_json, print_output, OutputFormat};

#[derive(Serialize)]
struct BodyPartSummary {
    code: String,
    display_name: String,
    version: String,
    buckets: Vec<BucketSummary>,
    symptom_codes: usize,
    red_flag_rules: usize,
}

#[derive(Serialize)]
struct BucketSummary {
    code: String,
    name: Option<String>,
}

impl From<&BodyPartConfig> for BodyPartSummary {
    fn from(config: &BodyPartConfig) -> Self {
        Self {
            code: config.code().to_string(),
            display_name: config.display_name().to_string(),
            version: config.version().to_string(),
            buckets: config
                .bucket_order()
                .iter()
                .map(|bucket| BucketSummary {
                    code: bucket.to_string(),
                    name: config.bucket_info(bucket.as_str()).map(|info| info.name.clone()),
                })
                .collect(),
            symptom_codes: config.vocabulary().len(),
            red_flag_rules: config.red_flag_rules().len(),
        }
    }
}

/// Table row for body-part display
#[derive(Debug, Serialize, Tabled)]
struct BodyPartRow {
    code: String,
    name: String,
    version: String,
    /// Bucket order, highest priority first
    buckets: String,
    #[tabled(rename = "symptom codes")]
    symptom_codes: usize,
    #[tabled(rename = "red-flag rules")]
    red_flag_rules: usize,
}

impl From<&BodyPartSummary> for BodyPartRow {
    fn from(summary: &BodyPartSummary) -> Self {
        Self {
            code: summary.code.clone(),
            name: summary.display_name.clone(),
            version: summary.version.clone(),
            buckets: summary
                .buckets
                .iter()
                .map(|b| match &b.name {
                    Some(name) if !name.is_empty() => format!("{} ({name})", b.code),
                    _ => b.code.clone(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            symptom_codes: summary.symptom_codes,
            red_flag_rules: summary.red_flag_rules,
        }
    }
}

pub async fn execute(provider: &Arc<dyn ConfigProvider>, format: OutputFormat) -> anyhow::Result<()> {
    let mut summaries = Vec::new();
    for code in provider.available_body_parts().await? {
        let config = provider.load(&code).await?;
        summaries.push(BodyPartSummary::from(config.as_ref()));
    }

    match format {
        OutputFormat::Json => print_json(&summaries),
        OutputFormat::Text => print_output(
            summaries.iter().map(BodyPartRow::from).collect(),
            format,
        ),
    }
}
