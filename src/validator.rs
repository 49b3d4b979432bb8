//! Source Validator — probes a candidate URL against its declared
//! [`SourceKind`] and reports whether the daemon should accept it.
//!
//! Every probe carries a `Prismis/<version>` user agent; Reddit and most
//! forum providers reject anonymous/unidentified traffic outright.

use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;

use crate::models::SourceKind;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

fn user_agent() -> String {
    format!("Prismis/{}", env!("CARGO_PKG_VERSION"))
}

fn probe_client() -> Client {
    Client::builder()
        .timeout(PROBE_TIMEOUT)
        .user_agent(user_agent())
        .build()
        .expect("static probe client config is always valid")
}

/// Normalize `foo`, `r/foo`, a full reddit URL, or `forum://foo` to the
/// bare subreddit handle.
pub fn normalize_forum_handle(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("forum://") {
        return Some(rest.trim_matches('/').to_string());
    }
    if let Ok(url) = reqwest::Url::parse(raw) {
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        if let Some(pos) = segments.iter().position(|s| *s == "r") {
            return segments.get(pos + 1).map(|s| s.to_string());
        }
        return None;
    }
    if let Some(rest) = raw.strip_prefix("r/") {
        return Some(rest.trim_matches('/').to_string());
    }
    if !raw.is_empty() && !raw.contains('/') {
        return Some(raw.to_string());
    }
    None
}

fn channel_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"youtube\.com/(?:channel/(?P<id>[A-Za-z0-9_-]{24})|(?P<handle>@[A-Za-z0-9_.-]+))")
            .expect("static pattern is valid")
    })
}

/// Normalize `@handle`, a bare 24-character channel ID, or a full
/// `youtube.com/channel/...` or `youtube.com/@handle` URL into the form
/// expected by the uploads-feed endpoint.
pub fn normalize_video_handle(raw: &str) -> Option<VideoHandle> {
    let raw = raw.trim();
    if let Some(handle) = raw.strip_prefix('@') {
        return Some(VideoHandle::Handle(handle.to_string()));
    }
    if raw.len() == 24 && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Some(VideoHandle::ChannelId(raw.to_string()));
    }
    if let Some(captures) = channel_url_pattern().captures(raw) {
        if let Some(id) = captures.name("id") {
            return Some(VideoHandle::ChannelId(id.as_str().to_string()));
        }
        if let Some(handle) = captures.name("handle") {
            return Some(VideoHandle::Handle(handle.as_str().trim_start_matches('@').to_string()));
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoHandle {
    Handle(String),
    ChannelId(String),
}

/// Probe `url` as a candidate of type `kind`; returns `(ok, reason)`
/// where `reason` explains a `false` verdict.
pub async fn validate_source(url: &str, kind: SourceKind) -> (bool, Option<String>) {
    let client = probe_client();
    match kind {
        SourceKind::Feed => validate_feed(&client, url).await,
        SourceKind::Forum => validate_forum(&client, url).await,
        SourceKind::Video => validate_video(&client, url).await,
        SourceKind::File => validate_file(&client, url).await,
    }
}

/// Entry point used when `kind` has not yet been validated as a known
/// [`SourceKind`] string — mirrors the "unknown source type" verdict
/// without making any network call.
pub async fn validate_source_str(url: &str, kind_str: &str) -> (bool, Option<String>) {
    match kind_str.parse::<SourceKind>() {
        Ok(kind) => validate_source(url, kind).await,
        Err(_) => (false, Some(format!("Unknown source type: {kind_str}"))),
    }
}

async fn validate_feed(client: &Client, url: &str) -> (bool, Option<String>) {
    let resp = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => return (false, Some(format!("request failed: {e}"))),
    };
    let bytes = match resp.bytes().await {
        Ok(b) => b,
        Err(e) => return (false, Some(format!("could not read body: {e}"))),
    };
    match feed_rs::parser::parse(&bytes[..]) {
        Ok(feed) => {
            if !feed.entries.is_empty() || feed.title.is_some() {
                (true, None)
            } else {
                (false, Some("feed has no entries and no title".to_string()))
            }
        }
        Err(e) => (false, Some(format!("not a valid feed: {e}"))),
    }
}

async fn validate_forum(client: &Client, url: &str) -> (bool, Option<String>) {
    let Some(handle) = normalize_forum_handle(url) else {
        return (false, Some(format!("could not parse subreddit from: {url}")));
    };
    let probe_url = format!("https://www.reddit.com/r/{handle}/about.json");
    let resp = match client.get(&probe_url).send().await {
        Ok(r) => r,
        Err(e) => return (false, Some(format!("request failed: {e}"))),
    };
    if !resp.status().is_success() {
        return (false, Some(format!("subreddit r/{handle} is unreachable or private")));
    }
    let body: serde_json::Value = match resp.json().await {
        Ok(v) => v,
        Err(e) => return (false, Some(format!("malformed subreddit response: {e}"))),
    };
    let is_private = body["data"]["subreddit_type"].as_str() == Some("private");
    if is_private {
        return (false, Some(format!("subreddit r/{handle} is private")));
    }
    (true, None)
}

async fn validate_video(client: &Client, url: &str) -> (bool, Option<String>) {
    let Some(handle) = normalize_video_handle(url) else {
        return (false, Some(format!("could not parse a channel handle or ID from: {url}")));
    };
    let feed_url = match &handle {
        VideoHandle::ChannelId(id) => format!("https://www.youtube.com/feeds/videos.xml?channel_id={id}"),
        VideoHandle::Handle(h) => format!("https://www.youtube.com/feeds/videos.xml?user={h}"),
    };
    let resp = match client.get(&feed_url).send().await {
        Ok(r) => r,
        Err(e) => return (false, Some(format!("request failed: {e}"))),
    };
    if !resp.status().is_success() {
        return (false, Some("channel did not resolve".to_string()));
    }
    let bytes = match resp.bytes().await {
        Ok(b) => b,
        Err(e) => return (false, Some(format!("could not read channel feed: {e}"))),
    };
    match feed_rs::parser::parse(&bytes[..]) {
        Ok(_) => (true, None),
        Err(e) => (false, Some(format!("channel feed did not parse: {e}"))),
    }
}

async fn validate_file(client: &Client, url: &str) -> (bool, Option<String>) {
    let resp = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => return (false, Some(format!("request failed: {e}"))),
    };
    if !resp.status().is_success() {
        return (false, Some(format!("returned status {}", resp.status())));
    }
    let is_text = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("text/") || ct.contains("json") || ct.contains("xml") || ct.contains("yaml"))
        .unwrap_or(true);
    if is_text {
        (true, None)
    } else {
        (false, Some("content type is not text-like".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_name() {
        assert_eq!(normalize_forum_handle("rust").as_deref(), Some("rust"));
    }

    #[test]
    fn normalizes_r_prefixed() {
        assert_eq!(normalize_forum_handle("r/rust").as_deref(), Some("rust"));
    }

    #[test]
    fn normalizes_full_url() {
        assert_eq!(
            normalize_forum_handle("https://www.reddit.com/r/rust/").as_deref(),
            Some("rust")
        );
    }

    #[test]
    fn normalizes_forum_scheme() {
        assert_eq!(normalize_forum_handle("forum://rust").as_deref(), Some("rust"));
    }

    #[test]
    fn normalizes_at_handle() {
        assert_eq!(
            normalize_video_handle("@someChannel"),
            Some(VideoHandle::Handle("someChannel".to_string()))
        );
    }

    #[test]
    fn normalizes_channel_id() {
        let id = "UC1234567890123456789012"; // 24 chars
        assert_eq!(normalize_video_handle(id), Some(VideoHandle::ChannelId(id.to_string())));
    }

    #[test]
    fn normalizes_full_channel_url() {
        let id = "UC1234567890123456789012";
        let url = format!("https://www.youtube.com/channel/{id}");
        assert_eq!(normalize_video_handle(&url), Some(VideoHandle::ChannelId(id.to_string())));
    }

    #[test]
    fn rejects_malformed_video_handle() {
        assert_eq!(normalize_video_handle("not-a-handle-or-id"), None);
    }

    #[tokio::test]
    async fn unknown_kind_fails_without_network_call() {
        let (ok, reason) = validate_source_str("https://example.com", "podcast").await;
        assert!(!ok);
        assert_eq!(reason.as_deref(), Some("Unknown source type: podcast"));
    }
}
