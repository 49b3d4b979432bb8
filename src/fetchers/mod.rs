//! Fetchers turn one [`Source`] into a bounded list of [`FetchRecord`]s.
//!
//! Every fetcher honors `max_items_per_feed` and the freshness gate
//! (§4.C) before returning; the pipeline never re-applies those rules.

mod feed;
pub mod file;
mod forum;
mod video;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{PrismisError, Result};
use crate::models::{FetchRecord, Source, SourceKind};

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &Source, max_items: u32, max_days_lookback: i64) -> Result<Vec<FetchRecord>>;
}

pub fn fetcher_for(kind: SourceKind) -> Box<dyn Fetcher> {
    match kind {
        SourceKind::Feed => Box::new(feed::FeedFetcher::new()),
        SourceKind::Forum => Box::new(forum::ForumFetcher::new()),
        SourceKind::Video => Box::new(video::VideoFetcher::new()),
        SourceKind::File => Box::new(file::FileFetcher::new()),
    }
}

/// First 16 hex characters of the SHA-256 digest of `s`, used throughout
/// the fetchers as a short, collision-resistant external-id fallback.
pub(crate) fn sha256_16(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 16)
}

fn hex_prefix(bytes: &[u8], chars: usize) -> String {
    let mut out = String::with_capacity(chars);
    for b in bytes {
        if out.len() >= chars {
            break;
        }
        out.push_str(&format!("{b:02x}"));
    }
    out.truncate(chars);
    out
}

/// Applied uniformly by every fetcher: never admit a record older than
/// `max_days_lookback`; a missing timestamp is also dropped rather than
/// admitted (spec property 1).
pub(crate) fn passes_freshness_gate(published_at: Option<DateTime<Utc>>, max_days_lookback: i64) -> bool {
    match published_at {
        None => false,
        Some(ts) => Utc::now() - ts <= chrono::Duration::days(max_days_lookback),
    }
}

pub(crate) fn clamp_max_items(requested: u32) -> u32 {
    requested.clamp(1, 100)
}

pub(crate) fn fetch_error(source_url: &str, cause: impl std::fmt::Display) -> PrismisError {
    PrismisError::fetch(source_url, cause)
}
