//! Shared LLM client used by the summarizer, evaluator, and embedder.
//!
//! Request/backoff behavior is adapted from the teacher's `bitvia-ai`
//! digest generator: exponential backoff on 429/5xx, bounded retries,
//! and a typed client struct rather than poking raw JSON per call site.

use std::time::Duration;

use reqwest::Client;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::PrismisError;

const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 8_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    fn parse(raw: &str) -> Result<Self, PrismisError> {
        match raw {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            other => Err(PrismisError::Config(format!("unsupported llm provider: {other}"))),
        }
    }
}

/// A small client shared by the summarizer and evaluator. Construction
/// fails fast on an unknown provider or a missing API key, per spec.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    provider: Provider,
    model: String,
    api_key: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, PrismisError> {
        let provider = Provider::parse(&config.provider)?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| PrismisError::Config("llm.api_key is not set".to_string()))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(format!("Prismis/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("static client config is always valid");
        Ok(Self { http, provider, model: config.model.clone(), api_key })
    }

    /// Request a structured JSON completion from `system`/`user` prompts
    /// at low temperature, retrying on 429/5xx with exponential backoff.
    pub async fn complete_json(&self, system: &str, user: &str, temperature: f32) -> Result<Value, PrismisError> {
        let raw_text = match self.provider {
            Provider::OpenAi => self.call_openai(system, user, temperature).await?,
            Provider::Anthropic => self.call_anthropic(system, user, temperature).await?,
        };
        serde_json::from_str(&raw_text).map_err(|e| PrismisError::Analysis(format!("non-JSON model response: {e}")))
    }

    /// Request a fixed-dimensional embedding vector for `text`.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, PrismisError> {
        match self.provider {
            Provider::OpenAi => self.embed_openai(text).await,
            Provider::Anthropic => Err(PrismisError::Config(
                "anthropic provider does not support embeddings".to_string(),
            )),
        }
    }

    async fn call_openai(&self, system: &str, user: &str, temperature: f32) -> Result<String, PrismisError> {
        let body = json!({
            "model": self.model,
            "temperature": temperature,
            "input": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "text": { "format": { "type": "json_object" } },
        });
        let resp = self.post_with_retry("https://api.openai.com/v1/responses", &body).await?;
        extract_openai_output_text(&resp)
            .ok_or_else(|| PrismisError::Analysis("no output text in OpenAI response".to_string()))
    }

    async fn embed_openai(&self, text: &str) -> Result<Vec<f32>, PrismisError> {
        let body = json!({
            "model": "text-embedding-3-small",
            "input": text,
        });
        let resp = self.post_with_retry("https://api.openai.com/v1/embeddings", &body).await?;
        resp.pointer("/data/0/embedding")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|n| n.as_f64()).map(|n| n as f32).collect())
            .ok_or_else(|| PrismisError::Analysis("no embedding in response".to_string()))
    }

    async fn call_anthropic(&self, system: &str, user: &str, temperature: f32) -> Result<String, PrismisError> {
        let body = json!({
            "model": self.model,
            "max_tokens": 2048,
            "temperature": temperature,
            "system": system,
            "messages": [{ "role": "user", "content": user }],
        });
        let resp = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| PrismisError::Analysis(format!("anthropic request failed: {e}")))?
            .json::<Value>()
            .await
            .map_err(|e| PrismisError::Analysis(format!("anthropic response was not JSON: {e}")))?;
        resp.pointer("/content/0/text")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| PrismisError::Analysis("no content text in anthropic response".to_string()))
    }

    async fn post_with_retry(&self, url: &str, body: &Value) -> Result<Value, PrismisError> {
        let mut delay_ms = INITIAL_BACKOFF_MS;
        for attempt in 1..=MAX_ATTEMPTS {
            let resp = self.http.post(url).bearer_auth(&self.api_key).json(body).send().await;
            match resp {
                Ok(r) if r.status().is_success() => {
                    return r
                        .json::<Value>()
                        .await
                        .map_err(|e| PrismisError::Analysis(format!("malformed response body: {e}")));
                }
                Ok(r) => {
                    let status = r.status();
                    let retryable = status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                    let text = r.text().await.unwrap_or_default();
                    if retryable && attempt < MAX_ATTEMPTS {
                        sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(MAX_BACKOFF_MS);
                        continue;
                    }
                    return Err(PrismisError::Analysis(format!("{url} returned {status}: {text}")));
                }
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    if retryable && attempt < MAX_ATTEMPTS {
                        sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(MAX_BACKOFF_MS);
                        continue;
                    }
                    return Err(PrismisError::Analysis(format!("request to {url} failed: {e}")));
                }
            }
        }
        Err(PrismisError::Analysis(format!("exhausted retries calling {url}")))
    }
}

fn extract_openai_output_text(resp: &Value) -> Option<String> {
    if let Some(s) = resp.pointer("/output/0/content/0/text").and_then(|v| v.as_str()) {
        return Some(s.to_string());
    }
    resp.get("output")?.as_array()?.iter().find_map(|item| {
        item.get("content")?.as_array()?.iter().find_map(|part| part.get("text")?.as_str().map(|s| s.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_provider_fails_fast() {
        let config = LlmConfig { provider: "ollama".to_string(), model: "x".to_string(), api_key: Some("k".to_string()) };
        assert!(LlmClient::new(&config).is_err());
    }

    #[test]
    fn missing_api_key_fails_fast() {
        let config = LlmConfig { provider: "openai".to_string(), model: "x".to_string(), api_key: None };
        assert!(LlmClient::new(&config).is_err());
    }

    #[test]
    fn extracts_primary_output_text_path() {
        let resp = json!({ "output": [{ "content": [{ "text": "{\"ok\":true}" }] }] });
        assert_eq!(extract_openai_output_text(&resp).as_deref(), Some("{\"ok\":true}"));
    }
}
