//! Building triage requests from files or flags.

use anyhow::{bail, Context};
use clap::Args;
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;
use triage_types::{Demographics, NaturalLanguageInput, Sex, SymptomSet, TriageRequest};

/// A request file holds one request or the body parts of one submission.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RequestFile {
    One(TriageRequest),
    Many(Vec<TriageRequest>),
}

/// Where a request comes from.
#[derive(Debug, Args)]
pub struct RequestArgs {
    /// JSON request file, `-` for stdin
    #[arg(short, long, conflicts_with = "body_part")]
    pub request: Option<PathBuf>,

    /// Body part code
    #[arg(short, long)]
    pub body_part: Option<String>,

    /// Symptom code (repeatable)
    #[arg(short, long = "symptom")]
    pub symptoms: Vec<String>,

    /// Age in years
    #[arg(long, default_value_t = 40)]
    pub age: u32,

    /// male or female
    #[arg(long, default_value = "female", value_parser = parse_sex)]
    pub sex: Sex,

    /// Height in centimetres
    #[arg(long, default_value_t = 170.0)]
    pub height: f64,

    /// Weight in kilograms
    #[arg(long, default_value_t = 70.0)]
    pub weight: f64,

    /// Chief complaint in the patient's words
    #[arg(long)]
    pub complaint: Option<String>,
}

impl RequestArgs {
    /// All requests described by the arguments.
    pub fn into_requests(self) -> anyhow::Result<Vec<TriageRequest>> {
        if let Some(path) = &self.request {
            return read_requests(path);
        }
        let Some(body_part) = self.body_part else {
            bail!("either --request or --body-part is required");
        };
        let demographics = Demographics::new(self.age, self.sex, self.height, self.weight);
        let request = TriageRequest::new(body_part, SymptomSet::new(self.symptoms, demographics))
            .with_natural_language(NaturalLanguageInput {
                chief_complaint: self.complaint,
                ..Default::default()
            });
        Ok(vec![request])
    }
}

fn read_requests(path: &PathBuf) -> anyhow::Result<Vec<TriageRequest>> {
    let text = if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read request from stdin")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request file {}", path.display()))?
    };
    parse_requests(&text).with_context(|| format!("invalid request in {}", path.display()))
}

fn parse_requests(text: &str) -> anyhow::Result<Vec<TriageRequest>> {
    let requests = match serde_json::from_str(text)? {
        RequestFile::One(request) => vec![request],
        RequestFile::Many(requests) => requests,
    };
    if requests.is_empty() {
        bail!("request file contains no requests");
    }
    Ok(requests)
}

fn parse_sex(value: &str) -> Result<Sex, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "male" | "m" => Ok(Sex::Male),
        "female" | "f" => Ok(Sex::Female),
        other => Err(format!("unknown sex {other:?}, expected male or female")),
    }
}
