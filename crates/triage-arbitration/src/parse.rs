//! Response parsing.
//!
//! The answer must be a JSON decision object. A strict parse is tried first;
//! if the model wrapped the object in prose or a code fence, the first
//! balanced object is extracted and parsed. There is no repair beyond that
//! and no fallback decision.

use triage_types::BucketCode;

use crate::context::ArbitrationContext;
use crate::decision::ArbitrationDecision;
use crate::error::ArbitrationError;

/// Parse and validate a raw backend answer.
pub fn parse_decision(
    raw: &str,
    ctx: &ArbitrationContext,
) -> Result<ArbitrationDecision, ArbitrationError> {
    let decision = parse_json(raw)?;
    decision.validate(ctx)?;
    Ok(decision)
}

fn parse_json(raw: &str) -> Result<ArbitrationDecision, ArbitrationError> {
    let strict_err = match serde_json::from_str::<ArbitrationDecision>(raw.trim()) {
        Ok(decision) => return Ok(normalise(decision)),
        Err(e) => e,
    };

    let extracted = extract_first_json_object(raw).ok_or_else(|| {
        ArbitrationError::Malformed(format!("no JSON object in response: {strict_err}"))
    })?;
    serde_json::from_str::<ArbitrationDecision>(&extracted)
        .map(normalise)
        .map_err(|e| ArbitrationError::Malformed(e.to_string()))
}

fn normalise(mut decision: ArbitrationDecision) -> ArbitrationDecision {
    let trimmed = decision.final_bucket.as_str().trim();
    if trimmed.len() != decision.final_bucket.as_str().len() {
        decision.final_bucket = BucketCode::new(trimmed);
    }
    decision
}

/// First balanced `{...}` object in `raw`, ignoring braces inside strings.
fn extract_first_json_object(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in raw[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(raw[start..start + idx + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::tests::context;

    const GOOD: &str = r#"{"final_bucket": "OA", "confidence": 0.82, "evidence_summary": "guideline supports OA",
        "reasoning": "age and medial pain {typical}", "citations": [{"title": "Knee osteoarthritis guideline", "source_tier": 1}]}"#;

    #[test]
    fn test_strict_parse() {
        let decision = parse_decision(GOOD, &context(false)).unwrap();
        assert_eq!(decision.final_bucket.as_str(), "OA");
        assert_eq!(decision.citations.len(), 1);
    }

    #[test]
    fn test_extracts_object_from_fenced_answer() {
        let raw = format!("Here is my decision:\n```json\n{GOOD}\n```\nThanks.");
        let decision = parse_decision(&raw, &context(false)).unwrap();
        assert_eq!(decision.confidence, 0.82);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = parse_decision("I think it is OA.", &context(false)).unwrap_err();
        assert!(matches!(err, ArbitrationError::Malformed(_)));
        let err = parse_decision(r#"{"final_bucket": "OA"}"#, &context(false)).unwrap_err();
        assert!(matches!(err, ArbitrationError::Malformed(_)));
    }

    #[test]
    fn test_multi_bucket_answer_is_violation() {
        let raw = r#"{"final_bucket": "OA|OVR", "confidence": 0.5, "reasoning": "unsure"}"#;
        let err = parse_decision(raw, &context(false)).unwrap_err();
        assert!(matches!(err, ArbitrationError::ContractViolation(_)));
    }

    #[test]
    fn test_unknown_bucket_is_violation() {
        let raw = r#"{"final_bucket": "STF", "confidence": 0.5, "reasoning": "shoulder-like"}"#;
        assert!(matches!(
            parse_decision(raw, &context(false)),
            Err(ArbitrationError::ContractViolation(_))
        ));
    }

    #[test]
    fn test_extract_ignores_braces_in_strings() {
        let raw = r#"prefix {"a": "}{", "b": {"c": 1}} suffix"#;
        assert_eq!(
            extract_first_json_object(raw).as_deref(),
            Some(r#"{"a": "}{", "b": {"c": 1}}"#)
        );
    }
}
