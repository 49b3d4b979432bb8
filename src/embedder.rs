//! Derives a fixed-dimensional embedding for an analyzed item and writes
//! it to the vector side-index. Failures are logged and non-fatal: an
//! item without an embedding is still queryable by priority and date.

use tracing::warn;

use crate::llm::LlmClient;
use crate::store::Store;

pub struct Embedder {
    client: LlmClient,
    store: Store,
}

impl Embedder {
    pub fn new(client: LlmClient, store: Store) -> Self {
        Self { client, store }
    }

    /// Embed `reading_summary` (falling back to `summary`) and persist
    /// the vector. Returns `Ok(false)` rather than erroring on any
    /// embedding-provider failure, so the pipeline never poisons a
    /// source over a flaky embeddings endpoint.
    pub async fn embed_item(&self, content_id: &str, reading_summary: Option<&str>, summary: Option<&str>) -> bool {
        let Some(text) = reading_summary.filter(|s| !s.is_empty()).or(summary) else {
            warn!(content_id, "no text available to embed");
            return false;
        };

        let vector = match self.client.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(content_id, error = %e, "embedding request failed");
                return false;
            }
        };

        if let Err(e) = self.store.insert_vector(content_id, &vector).await {
            warn!(content_id, error = %e, "failed to persist embedding");
            return false;
        }
        true
    }
}
