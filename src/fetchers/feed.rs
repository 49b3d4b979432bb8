//! RSS/Atom fetcher, adapted from the teacher's `bitvia-news` feed loop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use reqwest::Client;
use std::time::Duration;

use crate::error::Result;
use crate::models::{FetchRecord, Source};

use super::{clamp_max_items, fetch_error, passes_freshness_gate, sha256_16, Fetcher};

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(format!("Prismis/{}", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("static client config is always valid"),
        }
    }
}

/// entry.id → sha256-16(link) → sha256-16(title) → sha256-16(nanosecond
/// timestamp), the last resort guaranteeing uniqueness.
fn external_id(entry: &Entry, link: &str) -> String {
    if !entry.id.is_empty() {
        return entry.id.clone();
    }
    if !link.is_empty() {
        return sha256_16(link);
    }
    let title = entry.title.as_ref().map(|t| t.content.as_str()).unwrap_or("");
    if !title.is_empty() {
        return sha256_16(title);
    }
    sha256_16(&Utc::now().timestamp_nanos_opt().unwrap_or_default().to_string())
}

fn entry_published(entry: &Entry) -> Option<DateTime<Utc>> {
    entry
        .published
        .or(entry.updated)
        .map(|dt| dt.with_timezone(&Utc))
}

fn entry_link(entry: &Entry) -> String {
    entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().unwrap_or("") != "self")
        .map(|l| l.href.clone())
        .unwrap_or_else(|| entry.id.clone())
}

fn entry_body(entry: &Entry) -> String {
    if let Some(summary) = entry.summary.as_ref() {
        let text = summary.content.trim();
        if !text.is_empty() {
            return text.to_string();
        }
    }
    if let Some(content) = entry.content.as_ref() {
        if let Some(body) = content.body.as_ref() {
            let text = body.trim();
            if !text.is_empty() {
                return text.to_string();
            }
        }
    }
    entry
        .title
        .as_ref()
        .map(|t| t.content.clone())
        .unwrap_or_else(|| "Untitled".to_string())
}

#[async_trait]
impl Fetcher for FeedFetcher {
    async fn fetch(&self, source: &Source, max_items: u32, max_days_lookback: i64) -> Result<Vec<FetchRecord>> {
        let bytes = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(|e| fetch_error(&source.url, e))?
            .bytes()
            .await
            .map_err(|e| fetch_error(&source.url, e))?;

        let feed = feed_rs::parser::parse(&bytes[..]).map_err(|e| fetch_error(&source.url, e))?;

        let limit = clamp_max_items(max_items) as usize;
        let mut records = Vec::new();
        for entry in feed.entries {
            if records.len() >= limit {
                break;
            }
            let link = entry_link(&entry);
            let published_at = entry_published(&entry);
            if !passes_freshness_gate(published_at, max_days_lookback) {
                continue;
            }
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());
            let mut record = FetchRecord::new(external_id(&entry, &link), title, link, entry_body(&entry));
            record.published_at = published_at;
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_id_prefers_entry_id() {
        let entry = Entry {
            id: "guid-123".to_string(),
            ..Default::default()
        };
        assert_eq!(external_id(&entry, "https://a.com"), "guid-123");
    }

    #[test]
    fn external_id_falls_back_to_link_hash() {
        let entry = Entry::default();
        let a = external_id(&entry, "https://a.com/post-1");
        let b = external_id(&entry, "https://a.com/post-1");
        let c = external_id(&entry, "https://a.com/post-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn external_id_falls_back_to_nanosecond_hash_when_no_title_or_link() {
        let entry = Entry::default();
        let id = external_id(&entry, "");
        assert_eq!(id.len(), 16);
    }
}
