//! Prompt assembly.
//!
//! A body part may ship its own template; otherwise [`DEFAULT_TEMPLATE`] is
//! used. Placeholders are `{name}` tokens from a closed set. Anything else in
//! braces, including the JSON example in the template, is left as written.

use std::fmt::Write as _;
use triage_types::BucketCode;

use crate::context::ArbitrationContext;

/// System message sent with every arbitration prompt.
pub const SYSTEM_PROMPT: &str = "You are a musculoskeletal triage specialist. \
You commit to exactly one diagnostic bucket, cite only the evidence you are given, \
and answer with a single JSON object.";

/// Template used when a body part configures none.
pub const DEFAULT_TEMPLATE: &str = r#"Decide the diagnostic bucket for this {body_part} case.

## Patient
{patient_info}

## Symptoms
{symptoms}

## Weight-based scores
{bucket_scores}
Weight ranking: {weight_ranking}
Search ranking: {search_ranking}

## Agreement between the two rankings
{discrepancy_info}

## Evidence
{evidence}

## Buckets
{bucket_descriptions}

## Rules
- Choose exactly one of: {valid_buckets}.
- Cite only the evidence listed above, by exact title and source tier.
- If the rankings disagree, explain in "reconciliation" which one you follow and why.
- Confidence is a number between 0 and 1.

Answer with one JSON object:
{"final_bucket": "{default_bucket}", "confidence": 0.8, "evidence_summary": "...", "reasoning": "...", "reconciliation": "...", "citations": [{"title": "...", "source_tier": 1, "quote": "...", "relevance": "..."}]}
"#;

const PLACEHOLDERS: [&str; 11] = [
    "body_part",
    "patient_info",
    "symptoms",
    "bucket_scores",
    "weight_ranking",
    "search_ranking",
    "discrepancy_info",
    "evidence",
    "bucket_descriptions",
    "valid_buckets",
    "default_bucket",
];

/// Replace known `{name}` placeholders in one pass.
///
/// Substituted values are not re-scanned, and unknown names stay verbatim.
pub fn render_template<F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            lookup(name).map(|value| (value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(&value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Renders the arbitration prompt for one context.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, ctx: &ArbitrationContext) -> String {
        let template = ctx
            .config
            .arbitration_template()
            .unwrap_or(DEFAULT_TEMPLATE);
        render_template(template, |name| {
            PLACEHOLDERS
                .contains(&name)
                .then(|| self.placeholder(ctx, name))
        })
    }

    fn placeholder(&self, ctx: &ArbitrationContext, name: &str) -> String {
        match name {
            "body_part" => ctx.config.display_name().to_string(),
            "patient_info" => patient_info(ctx),
            "symptoms" => symptoms(ctx),
            "bucket_scores" => bucket_scores(ctx),
            "weight_ranking" => ctx.weight_ranking().to_string(),
            "search_ranking" => search_ranking(ctx),
            "discrepancy_info" => discrepancy_info(ctx),
            "evidence" => evidence(ctx),
            "bucket_descriptions" => bucket_descriptions(ctx),
            "valid_buckets" => ctx
                .bucket_order()
                .iter()
                .map(BucketCode::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            "default_bucket" => ctx.bucket_order().first().to_string(),
            _ => String::new(),
        }
    }
}

fn patient_info(ctx: &ArbitrationContext) -> String {
    let d = ctx.symptoms.demographics();
    format!(
        "{}-year-old {}, height {} cm, weight {} kg, BMI {:.1}",
        d.age,
        d.sex,
        d.height_cm,
        d.weight_kg,
        d.bmi()
    )
}

fn symptoms(ctx: &ArbitrationContext) -> String {
    let mut text = if ctx.symptoms.is_empty() {
        "(no symptom codes)".to_string()
    } else {
        ctx.symptoms
            .codes()
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    if ctx.natural_language.has_content() {
        text.push('\n');
        text.push_str(&ctx.natural_language.to_text());
    }
    text
}

fn bucket_scores(ctx: &ArbitrationContext) -> String {
    if ctx.bucket_scores.is_empty() {
        return "(no scores)".to_string();
    }
    let mut out = String::new();
    for score in &ctx.bucket_scores {
        let _ = write!(out, "- {}: {:.2} ({:.1}%)", score.bucket, score.score, score.percentage);
        if !score.contributing_codes.is_empty() {
            let _ = write!(out, " from {}", score.contributing_codes.join(", "));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn search_ranking(ctx: &ArbitrationContext) -> String {
    if ctx.discrepancy.search_abstained {
        format!("{} (no evidence votes; order only)", ctx.search_ranking())
    } else {
        ctx.search_ranking().to_string()
    }
}

fn discrepancy_info(ctx: &ArbitrationContext) -> String {
    let record = &ctx.discrepancy;
    if record.has_discrepancy {
        format!("DISAGREEMENT: {}. You must reconcile it.", record.summary())
    } else {
        record.summary()
    }
}

fn evidence(ctx: &ArbitrationContext) -> String {
    if ctx.evidence.is_empty() {
        return "(no evidence retrieved; do not cite anything)".to_string();
    }
    let mut out = String::new();
    for (i, item) in ctx.evidence.iter().enumerate() {
        let tags = item
            .bucket_tags
            .iter()
            .map(BucketCode::as_str)
            .collect::<Vec<_>>()
            .join("/");
        let _ = writeln!(
            out,
            "[{}] \"{}\" (source_tier {}, {}; similarity {:.2}; buckets {})",
            i + 1,
            item.title,
            item.source_tier.level(),
            item.source_tier.label(),
            item.similarity,
            if tags.is_empty() { "-" } else { &tags }
        );
        if !item.snippet.is_empty() {
            let _ = writeln!(out, "    {}", item.snippet.trim());
        }
    }
    out.trim_end().to_string()
}

fn bucket_descriptions(ctx: &ArbitrationContext) -> String {
    ctx.bucket_order()
        .iter()
        .map(|bucket| match ctx.config.bucket_info(bucket.as_str()) {
            Some(info) => {
                let mut line = format!("- {bucket}");
                if !info.name.is_empty() {
                    let _ = write!(line, " ({})", info.name);
                }
                if !info.description.is_empty() {
                    let _ = write!(line, ": {}", info.description);
                }
                if !info.typical_profile.is_empty() {
                    let _ = write!(line, " Typical: {}", info.typical_profile);
                }
                line
            }
            None => format!("- {bucket}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
