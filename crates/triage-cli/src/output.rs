//! Output formatting utilities

use colored::*;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use triage_types::BucketScore;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Tables and human-readable text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Print any serializable value as pretty JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print rows as a table, or as a JSON array.
pub fn print_output<T: Serialize + Tabled>(rows: Vec<T>, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            if rows.is_empty() {
                println!("{}", "No results".dimmed());
            } else {
                println!("{}", render_table(rows));
            }
            Ok(())
        }
        OutputFormat::Json => print_json(&rows),
    }
}

pub fn render_table<T: Tabled>(rows: Vec<T>) -> String {
    Table::new(rows).with(Style::sharp()).to_string()
}

/// Print a heading line
pub fn print_heading(message: &str) {
    println!("{}", message.bold());
}

/// Print a red-flag banner
pub fn print_red_flag(message: &str) {
    println!("{} {}", "RED FLAG".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// `[####      ]` bar for a percentage.
pub fn bar(percentage: f64, width: usize) -> String {
    let filled = ((percentage / 100.0) * width as f64).round().clamp(0.0, width as f64) as usize;
    format!("[{}{}]", "#".repeat(filled), " ".repeat(width - filled))
}

/// Table row for one bucket's weight score
#[derive(Debug, Serialize, Tabled)]
pub struct BucketScoreRow {
    bucket: String,
    score: String,
    share: String,
    #[tabled(rename = "")]
    bar: String,
    /// Codes that added weight to the bucket
    codes: String,
}

impl From<&BucketScore> for BucketScoreRow {
    fn from(score: &BucketScore) -> Self {
        Self {
            bucket: score.bucket.to_string(),
            score: format!("{:.2}", score.score),
            share: format!("{:.1}%", score.percentage),
            bar: bar(score.percentage, 20),
            codes: score.contributing_codes.join(", "),
        }
    }
}

pub fn bucket_score_rows(scores: &[BucketScore]) -> Vec<BucketScoreRow> {
    scores.iter().map(BucketScoreRow::from).collect()
}
