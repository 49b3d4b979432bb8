//! YouTube channel-uploads fetcher. Reuses the feed parser against the
//! channel's public Atom feed; transcript retrieval is best-effort and
//! never fails the item.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::error::Result;
use crate::models::{FetchRecord, Source};
use crate::validator::{normalize_video_handle, VideoHandle};

use super::{clamp_max_items, fetch_error, passes_freshness_gate, Fetcher};

pub struct VideoFetcher {
    client: Client,
}

impl VideoFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(format!("Prismis/{}", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("static client config is always valid"),
        }
    }

    fn feed_url(&self, handle: &VideoHandle) -> String {
        match handle {
            VideoHandle::ChannelId(id) => format!("https://www.youtube.com/feeds/videos.xml?channel_id={id}"),
            VideoHandle::Handle(h) => format!("https://www.youtube.com/feeds/videos.xml?user={h}"),
        }
    }

    /// Best-effort transcript download. Absence is never an error; the
    /// pipeline falls back to the entry description as content.
    async fn fetch_transcript(&self, _video_url: &str) -> Option<String> {
        None
    }
}

fn entry_video_url(entry: &Entry) -> String {
    entry.links.first().map(|l| l.href.clone()).unwrap_or_else(|| entry.id.clone())
}

#[async_trait]
impl Fetcher for VideoFetcher {
    async fn fetch(&self, source: &Source, max_items: u32, max_days_lookback: i64) -> Result<Vec<FetchRecord>> {
        let handle = normalize_video_handle(&source.url)
            .ok_or_else(|| fetch_error(&source.url, "could not normalize channel handle or id"))?;
        let feed_url = self.feed_url(&handle);

        let bytes = self
            .client
            .get(&feed_url)
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
            let published_at: Option<DateTime<Utc>> = entry.published.or(entry.updated).map(|d| d.with_timezone(&Utc));
            if !passes_freshness_gate(published_at, max_days_lookback) {
                continue;
            }
            let video_url = entry_video_url(&entry);
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.clone())
                .unwrap_or_else(|| "Untitled".to_string());
            let description = entry
                .summary
                .as_ref()
                .map(|s| s.content.clone())
                .unwrap_or_default();
            let content = self.fetch_transcript(&video_url).await.unwrap_or(description);

            let mut record = FetchRecord::new(entry.id.clone(), title, video_url, content);
            record.published_at = published_at;
            if let Some(media) = entry.media.first() {
                if let Some(views) = media.community.as_ref().and_then(|c| c.stats_views) {
                    record.metrics = json!({ "view_count": views });
                }
            }
            records.push(record);
        }
        Ok(records)
    }
}
