//! Search query construction.

use triage_types::TriageRequest;

/// Symptom codes included in the query's first line.
const QUERY_SYMPTOM_LIMIT: usize = 5;

/// `"{age}-year-old {sex} patient, symptoms: {codes}"` followed by one line
/// per non-blank free-text field.
pub fn build_query(request: &TriageRequest) -> String {
    let demographics = request.symptoms.demographics();
    let codes: Vec<&str> = request
        .symptoms
        .codes()
        .iter()
        .take(QUERY_SYMPTOM_LIMIT)
        .map(String::as_str)
        .collect();
    let symptoms = if codes.is_empty() {
        "none reported".to_string()
    } else {
        codes.join(", ")
    };

    let mut query = format!(
        "{}-year-old {} patient, symptoms: {}",
        demographics.age, demographics.sex, symptoms
    );
    if request.natural_language.has_content() {
        query.push('\n');
        query.push_str(&request.natural_language.to_text());
    }
    query
}
