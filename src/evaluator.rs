//! Priority assignment and interest matching against the user's context
//! document, with a normalization layer that makes the output envelope
//! deterministic regardless of how the raw LLM response varies.

use serde::Deserialize;
use tracing::warn;

use crate::error::PrismisError;
use crate::llm::LlmClient;
use crate::models::Priority;

const TEMPERATURE: f32 = 0.1;

const SYSTEM_PROMPT: &str = "You triage one piece of content against a user's declared interests. \
Return a single JSON object with keys: priority (one of \"high\", \"medium\", \"low\", \"none\"), \
matched_interests (a list of the user's interest phrases this content matches), and an optional \
reasoning string. Respond with JSON only.";

#[derive(Debug, Deserialize, Default)]
struct RawEvaluation {
    #[serde(default)]
    priority: serde_json::Value,
    #[serde(default)]
    matched_interests: serde_json::Value,
    #[serde(default)]
    reasoning: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub priority: Priority,
    pub matched_interests: Vec<String>,
    pub reasoning: Option<String>,
}

pub struct Evaluator {
    client: LlmClient,
}

impl Evaluator {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    pub async fn evaluate(
        &self,
        title: &str,
        url: &str,
        content_or_summary: &str,
        user_context: &str,
    ) -> Result<EvaluationResult, PrismisError> {
        let user_prompt = format!(
            "user_context:\n{user_context}\n\ntitle: {title}\nurl: {url}\n\ncontent:\n{content_or_summary}"
        );
        let raw = self.client.complete_json(SYSTEM_PROMPT, &user_prompt, TEMPERATURE).await?;
        let raw: RawEvaluation = serde_json::from_value(raw).unwrap_or_default();
        Ok(normalize(raw))
    }
}

/// Coerce an arbitrary, possibly adversarial LLM response into the fixed
/// output envelope: any non-enum priority becomes `medium` with a log
/// note, any non-list `matched_interests` becomes `[]`.
fn normalize(raw: RawEvaluation) -> EvaluationResult {
    let priority = match raw.priority.as_str() {
        Some(s) => {
            let coerced = Priority::coerce(s);
            if !matches!(s.trim().to_lowercase().as_str(), "high" | "medium" | "low" | "none") {
                warn!(raw_priority = %s, "evaluator returned a priority outside the enum; coerced to medium");
            }
            coerced
        }
        None => {
            warn!(raw_priority = ?raw.priority, "evaluator priority field was not a string; coerced to medium");
            Priority::Medium
        }
    };

    let matched_interests = match raw.matched_interests {
        serde_json::Value::Array(items) => items.into_iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect(),
        _ => Vec::new(),
    };

    EvaluationResult { priority, matched_interests, reasoning: raw.reasoning }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(priority: serde_json::Value, matched_interests: serde_json::Value) -> RawEvaluation {
        RawEvaluation { priority, matched_interests, reasoning: None }
    }

    #[test]
    fn valid_priority_passes_through_case_insensitively() {
        let result = normalize(raw(json!("HIGH"), json!([])));
        assert_eq!(result.priority, Priority::High);
    }

    #[test]
    fn adversarial_priority_string_coerces_to_medium() {
        let result = normalize(raw(json!("urgent!!"), json!([])));
        assert_eq!(result.priority, Priority::Medium);
    }

    #[test]
    fn non_string_priority_coerces_to_medium() {
        let result = normalize(raw(json!(42), json!([])));
        assert_eq!(result.priority, Priority::Medium);
    }

    #[test]
    fn non_list_matched_interests_coerces_to_empty() {
        let result = normalize(raw(json!("low"), json!("rust")));
        assert!(result.matched_interests.is_empty());
    }

    #[test]
    fn list_matched_interests_passes_through() {
        let result = normalize(raw(json!("low"), json!(["rust", "databases"])));
        assert_eq!(result.matched_interests, vec!["rust".to_string(), "databases".to_string()]);
    }

    #[test]
    fn normalization_is_deterministic_for_identical_raw_input() {
        let a = normalize(raw(json!("HIGH"), json!(["x"])));
        let b = normalize(raw(json!("HIGH"), json!(["x"])));
        assert_eq!(a.priority, b.priority);
        assert_eq!(a.matched_interests, b.matched_interests);
    }
}
