//! Structured content analysis: summary, reading summary, entities,
//! patterns, and alpha insights for one item.

use serde::Deserialize;

use crate::error::PrismisError;
use crate::llm::LlmClient;
use crate::models::SourceKind;

const TEMPERATURE: f32 = 0.2;

const SYSTEM_PROMPT: &str = "You analyze one piece of content for a personal intelligence feed. \
Return a single JSON object with keys: summary (<=400 characters), reading_summary (markdown, \
targeted at 10-15% of the source length), alpha_insights (at most 3 sharp, non-obvious \
takeaways), patterns (a list of recurring themes or signals), entities (exactly the 5 most \
searchable proper nouns mentioned - never file names, never generic nouns). Respond with JSON \
only, no prose outside the object.";

#[derive(Debug, Deserialize)]
struct RawSummary {
    summary: String,
    reading_summary: String,
    #[serde(default)]
    alpha_insights: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    entities: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SummaryResult {
    pub summary: String,
    pub reading_summary: String,
    pub alpha_insights: Vec<String>,
    pub patterns: Vec<String>,
    pub entities: Vec<String>,
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

pub struct Summarizer {
    client: LlmClient,
}

impl Summarizer {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }

    pub async fn summarize(
        &self,
        title: &str,
        url: &str,
        content: &str,
        source_kind: SourceKind,
    ) -> Result<SummaryResult, PrismisError> {
        let user_prompt = format!(
            "source_type: {}\ntitle: {title}\nurl: {url}\n\ncontent:\n{content}",
            source_kind.as_str()
        );

        let raw = self
            .client
            .complete_json(SYSTEM_PROMPT, &user_prompt, TEMPERATURE)
            .await?;
        let mut parsed: RawSummary = serde_json::from_value(raw)
            .map_err(|e| PrismisError::Analysis(format!("could not parse summarizer output: {e}")))?;

        parsed.summary = truncate_chars(&parsed.summary, 400);
        parsed.alpha_insights.truncate(3);
        parsed.entities.truncate(5);

        Ok(SummaryResult {
            summary: parsed.summary,
            reading_summary: parsed.reading_summary,
            alpha_insights: parsed.alpha_insights,
            patterns: parsed.patterns,
            entities: parsed.entities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_summary_deserializes_missing_optional_lists_as_empty() {
        let raw: RawSummary = serde_json::from_str(
            r#"{"summary":"short","reading_summary":"longer body"}"#,
        )
        .unwrap();
        assert!(raw.alpha_insights.is_empty());
        assert!(raw.patterns.is_empty());
        assert!(raw.entities.is_empty());
    }

    #[test]
    fn truncate_chars_enforces_the_400_char_cap() {
        let long = "x".repeat(500);
        assert_eq!(truncate_chars(&long, 400).chars().count(), 400);
        assert_eq!(truncate_chars("short", 400), "short");
    }
}
