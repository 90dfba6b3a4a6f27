// src/core/classify.rs

use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::core::models::{Finding, SearchHit, Severity};

/// The classifier is a single blocking round-trip per batch; generation can
/// be slow, so its budget is wider than the search gateway's.
const CLASSIFY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);
const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 2000;

#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Transport-level failure or a non-success status from the backend.
    #[error("classifier backend unavailable: {0}")]
    BackendUnavailable(String),
    /// The candidate list was empty; classification is skipped, not attempted.
    #[error("no candidates to classify")]
    EmptyInput,
    /// The response was not JSON, or violated the findings schema. The whole
    /// batch fails; this layer produces no partial result and does not retry.
    #[error("classifier response violated the expected schema: {0}")]
    InvalidSchema(String),
}

/// Client for the generative triage backend.
pub struct RiskClassifier {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl RiskClassifier {
    pub fn new(settings: &Settings) -> Result<Self, ClassifyError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ArgusRecon/", env!("CARGO_PKG_VERSION")))
            .timeout(CLASSIFY_TIMEOUT)
            .build()
            .map_err(|e| ClassifyError::BackendUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            api_key: settings.classifier_api_key.clone(),
            endpoint: settings.classifier_api_url.clone(),
            model: settings.classifier_model.clone(),
        })
    }

    /// Sends the whole candidate batch for triage and returns the validated
    /// findings in the order the backend produced them.
    pub async fn classify(&self, candidates: &[SearchHit]) -> Result<Vec<Finding>, ClassifyError> {
        if candidates.is_empty() {
            return Err(ClassifyError::EmptyInput);
        }

        info!(candidates = candidates.len(), "Requesting risk classification.");
        let payload = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": build_prompt(candidates)}],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| ClassifyError::BackendUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Classifier backend returned an error status.");
            return Err(ClassifyError::BackendUnavailable(format!("HTTP {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClassifyError::InvalidSchema(e.to_string()))?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ClassifyError::InvalidSchema("response carries no message content".to_string())
            })?;

        let findings = parse_findings(content, candidates.len())?;
        info!(findings = findings.len(), "Classification succeeded.");
        Ok(findings)
    }
}

/// Renders the triage instruction. Each candidate appears with its 1-based
/// position so the backend can reference entries by index.
fn build_prompt(candidates: &[SearchHit]) -> String {
    let mut listing = String::new();
    for (i, hit) in candidates.iter().enumerate() {
        listing.push_str(&format!("{}. {}\n", i + 1, hit.link));
    }
    format!(
        "You are an information security expert. The numbered entries below are \
search results obtained with targeted queries (dorks) and may point at leaked \
files, exposed administrative interfaces or other sensitive assets.\n\
\n\
For each entry that plausibly represents an exposure, produce one finding with:\n\
- \"index\": the entry number\n\
- \"link\": the entry link\n\
- \"severity\": exactly one of \"low\", \"medium\", \"high\"\n\
- \"explanation\": at most two sentences\n\
- \"mitigation\": at most two sentences\n\
\n\
Respond with ONLY a JSON object of this exact shape and nothing else:\n\
{{\"analisis\": [{{\"index\": 1, \"link\": \"...\", \"severity\": \"low\", \
\"explanation\": \"...\", \"mitigation\": \"...\"}}]}}\n\
\n\
Entries:\n{listing}"
    )
}

/// Extracts the structured payload from a possibly-fenced response.
///
/// If the text carries a fenced code block, the content between the first
/// opening fence and its matching closing fence is the payload (an optional
/// `json` tag on the fence is dropped). A fence with no matching close is
/// not a fenced block, so the whole text is the payload.
pub fn extract_payload(text: &str) -> &str {
    if let Some(open) = text.find("```") {
        let after = &text[open + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(close) = after.find("```") {
            return after[..close].trim();
        }
    }
    text.trim()
}

// Wire shapes of the backend's findings payload, before validation.
#[derive(Debug, Deserialize)]
struct ClassifierPayload {
    analisis: Vec<RawFinding>,
}

#[derive(Debug, Deserialize)]
struct RawFinding {
    index: i64,
    #[serde(default)]
    link: String,
    severity: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    mitigation: String,
}

/// Parses and validates the backend's textual response against the findings
/// schema. Any invalid entry fails the whole call; the backend's ordering
/// is preserved on success.
pub fn parse_findings(
    response_text: &str,
    candidate_count: usize,
) -> Result<Vec<Finding>, ClassifyError> {
    let payload = extract_payload(response_text);
    let parsed: ClassifierPayload = serde_json::from_str(payload)
        .map_err(|e| ClassifyError::InvalidSchema(format!("payload is not valid JSON: {e}")))?;

    let mut findings = Vec::with_capacity(parsed.analisis.len());
    for raw in parsed.analisis {
        if raw.index < 1 || raw.index as usize > candidate_count {
            return Err(ClassifyError::InvalidSchema(format!(
                "index {} outside [1, {candidate_count}]",
                raw.index
            )));
        }
        let severity = Severity::from_str(&raw.severity).map_err(|_| {
            ClassifyError::InvalidSchema(format!("unknown severity label `{}`", raw.severity))
        })?;
        debug!(index = raw.index, severity = %severity, "Validated finding.");
        findings.push(Finding {
            index: raw.index as usize,
            link: raw.link,
            severity,
            explanation: raw.explanation,
            mitigation: raw.mitigation,
        });
    }
    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_PAYLOAD: &str = r#"{"analisis": [
        {"index": 2, "link": "https://example.com/backup.sql", "severity": "high",
         "explanation": "Database dump exposed.", "mitigation": "Remove the file."},
        {"index": 1, "link": "https://example.com/admin", "severity": "low",
         "explanation": "Login page indexed.", "mitigation": "Disallow indexing."}
    ]}"#;

    #[test]
    fn extract_payload_handles_multiline_fence() {
        let text = "Here is the analysis:\n```json\n{\"analisis\": []}\n```\nDone.";
        assert_eq!(extract_payload(text), "{\"analisis\": []}");
    }

    #[test]
    fn extract_payload_handles_single_line_fence() {
        let text = "```json {\"analisis\": []} ```";
        assert_eq!(extract_payload(text), "{\"analisis\": []}");
    }

    #[test]
    fn extract_payload_handles_untagged_fence() {
        let text = "```\n{\"analisis\": []}\n```";
        assert_eq!(extract_payload(text), "{\"analisis\": []}");
    }

    #[test]
    fn extract_payload_passes_unfenced_text_through() {
        assert_eq!(extract_payload("  {\"analisis\": []}  "), "{\"analisis\": []}");
    }

    #[test]
    fn extract_payload_treats_unclosed_fence_as_plain_text() {
        let text = "```json\n{\"analisis\": []}";
        assert_eq!(extract_payload(text), text.trim());
    }

    #[test]
    fn parse_accepts_valid_payload_in_backend_order() {
        let findings = parse_findings(VALID_PAYLOAD, 3).unwrap();
        assert_eq!(findings.len(), 2);
        // Backend order, not index order.
        assert_eq!(findings[0].index, 2);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[1].index, 1);
        assert_eq!(findings[1].severity, Severity::Low);
    }

    #[test]
    fn parse_fenced_and_unfenced_payloads_agree() {
        let fenced = format!("```json\n{VALID_PAYLOAD}\n```");
        assert_eq!(
            parse_findings(&fenced, 3).unwrap(),
            parse_findings(VALID_PAYLOAD, 3).unwrap()
        );
    }

    #[test]
    fn parse_rejects_index_zero() {
        let text = r#"{"analisis": [{"index": 0, "link": "x", "severity": "low"}]}"#;
        assert!(matches!(
            parse_findings(text, 3),
            Err(ClassifyError::InvalidSchema(_))
        ));
    }

    #[test]
    fn parse_rejects_out_of_range_index() {
        let text = r#"{"analisis": [{"index": 4, "link": "x", "severity": "low"}]}"#;
        assert!(matches!(
            parse_findings(text, 3),
            Err(ClassifyError::InvalidSchema(_))
        ));
    }

    #[test]
    fn parse_rejects_severity_outside_the_enum() {
        let text = r#"{"analisis": [{"index": 1, "link": "x", "severity": "Critical"}]}"#;
        assert!(matches!(
            parse_findings(text, 3),
            Err(ClassifyError::InvalidSchema(_))
        ));
    }

    #[test]
    fn parse_normalizes_severity_case() {
        let text = r#"{"analisis": [{"index": 1, "link": "x", "severity": "HIGH"}]}"#;
        let findings = parse_findings(text, 1).unwrap();
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn parse_rejects_plain_text_responses() {
        let err = parse_findings("I could not find anything risky here.", 3).unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidSchema(_)));
    }

    #[test]
    fn prompt_lists_candidates_one_based() {
        let candidates = vec![
            SearchHit {
                title: "t".to_string(),
                snippet: "s".to_string(),
                link: "https://example.com/a".to_string(),
            },
            SearchHit {
                title: "t".to_string(),
                snippet: "s".to_string(),
                link: "https://example.com/b".to_string(),
            },
        ];
        let prompt = build_prompt(&candidates);
        assert!(prompt.contains("1. https://example.com/a"));
        assert!(prompt.contains("2. https://example.com/b"));
        assert!(prompt.contains("\"analisis\""));
    }
}
