//! Reddit forum fetcher against the public JSON API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::Result;
use crate::models::{FetchRecord, Source};
use crate::validator::normalize_forum_handle;

use super::{clamp_max_items, fetch_error, passes_freshness_gate, Fetcher};

const SKIPPED_DOMAINS: &[&str] = &["i.redd.it", "i.imgur.com", "imgur.com", "v.redd.it"];

pub struct ForumFetcher {
    client: Client,
}

impl ForumFetcher {
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

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Submission,
}

#[derive(Debug, Deserialize, Default)]
struct Submission {
    permalink: String,
    title: String,
    url: String,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    upvote_ratio: f64,
    #[serde(default)]
    num_comments: i64,
    #[serde(default)]
    author: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    created_utc: f64,
}

fn is_skipped_domain(submission: &Submission) -> bool {
    let Ok(parsed) = reqwest::Url::parse(&submission.url) else {
        return false;
    };
    let Some(domain) = parsed.domain() else {
        return false;
    };
    if SKIPPED_DOMAINS.contains(&domain) {
        return true;
    }
    domain == "youtube.com" && !submission.is_self
}

fn submission_content(submission: &Submission) -> String {
    if submission.is_self {
        submission.selftext.clone()
    } else {
        format!("Link: {}", submission.url)
    }
}

#[async_trait]
impl Fetcher for ForumFetcher {
    async fn fetch(&self, source: &Source, max_items: u32, max_days_lookback: i64) -> Result<Vec<FetchRecord>> {
        let handle = normalize_forum_handle(&source.url)
            .ok_or_else(|| fetch_error(&source.url, "could not normalize subreddit handle"))?;
        let url = format!("https://www.reddit.com/r/{handle}/new.json");

        let listing: Listing = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_error(&source.url, e))?
            .json()
            .await
            .map_err(|e| fetch_error(&source.url, e))?;

        let limit = clamp_max_items(max_items) as usize;
        let mut records = Vec::new();
        for child in listing.data.children {
            if records.len() >= limit {
                break;
            }
            let submission = child.data;
            if is_skipped_domain(&submission) {
                continue;
            }
            let published_at: Option<DateTime<Utc>> = DateTime::from_timestamp(submission.created_utc as i64, 0);
            if !passes_freshness_gate(published_at, max_days_lookback) {
                continue;
            }
            let permalink = format!("https://www.reddit.com{}", submission.permalink);
            let mut record = FetchRecord::new(permalink.clone(), submission.title.clone(), permalink, submission_content(&submission));
            record.published_at = published_at;
            record.metrics = json!({
                "score": submission.score,
                "upvote_ratio": submission.upvote_ratio,
                "num_comments": submission.num_comments,
                "author": submission.author,
                "subreddit": submission.subreddit,
            });
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(url: &str, is_self: bool) -> Submission {
        Submission { url: url.to_string(), is_self, ..Default::default() }
    }

    #[test]
    fn skips_image_cdn_domains() {
        assert!(is_skipped_domain(&submission("https://i.redd.it/abc.jpg", false)));
        assert!(is_skipped_domain(&submission("https://i.imgur.com/abc.png", false)));
        assert!(is_skipped_domain(&submission("https://v.redd.it/abc", false)));
    }

    #[test]
    fn skips_non_self_youtube_but_keeps_self_youtube() {
        assert!(is_skipped_domain(&submission("https://youtube.com/watch?v=1", false)));
        assert!(!is_skipped_domain(&submission("https://youtube.com/watch?v=1", true)));
    }

    #[test]
    fn keeps_ordinary_link_domains() {
        assert!(!is_skipped_domain(&submission("https://blog.example.com/post", false)));
    }

    #[test]
    fn self_post_content_uses_selftext() {
        let s = Submission { is_self: true, selftext: "body text".to_string(), ..Default::default() };
        assert_eq!(submission_content(&s), "body text");
    }

    #[test]
    fn link_post_content_wraps_url() {
        let s = Submission { is_self: false, url: "https://example.com".to_string(), ..Default::default() };
        assert_eq!(submission_content(&s), "Link: https://example.com");
    }
}
