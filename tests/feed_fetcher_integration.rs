//! Exercises the feed fetcher's HTTP path end to end against a stubbed
//! server, since its unit tests only cover the pure helper functions.

use chrono::Utc;
use prismisd::fetchers::fetcher_for;
use prismisd::models::{Source, SourceKind};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_feed(entry_id: &str, published: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Feed</title>
  <entry>
    <id>{entry_id}</id>
    <title>Hello World</title>
    <link href="https://example.com/hello"/>
    <published>{published}</published>
    <summary>A short summary.</summary>
  </entry>
</feed>"#
    )
}

#[tokio::test]
async fn fetch_returns_fresh_entries_and_skips_stale_ones() {
    let server = MockServer::start().await;
    let fresh_published = Utc::now().to_rfc3339();
    let body = sample_feed("tag:example.com,2024:fresh", &fresh_published);

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let source = Source::new(format!("{}/feed.xml", server.uri()), SourceKind::Feed, None);
    let fetcher = fetcher_for(SourceKind::Feed);

    let records = fetcher.fetch(&source, 50, 7).await.expect("fetch should succeed");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].external_id, "tag:example.com,2024:fresh");
    assert_eq!(records[0].title, "Hello World");
}

#[tokio::test]
async fn fetch_drops_entries_older_than_lookback_window() {
    let server = MockServer::start().await;
    let stale_published = "2001-01-01T00:00:00Z";
    let body = sample_feed("tag:example.com,2024:stale", stale_published);

    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let source = Source::new(format!("{}/feed.xml", server.uri()), SourceKind::Feed, None);
    let fetcher = fetcher_for(SourceKind::Feed);

    let records = fetcher.fetch(&source, 50, 7).await.expect("fetch should succeed");
    assert!(records.is_empty());
}

#[tokio::test]
async fn fetch_wraps_transport_errors_with_source_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/missing.xml", server.uri());
    let source = Source::new(url.clone(), SourceKind::Feed, None);
    let fetcher = fetcher_for(SourceKind::Feed);

    let err = fetcher.fetch(&source, 50, 7).await.unwrap_err();
    assert!(err.to_string().contains(&url));
}
