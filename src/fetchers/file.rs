//! Tracked-file fetcher. Diffs the current body against the last fetch
//! so the summarizer can emphasize what changed.

use async_trait::async_trait;
use reqwest::Client;
use similar::TextDiff;
use std::time::Duration;

use crate::error::Result;
use crate::models::{FetchRecord, FileDiff, Source};

use super::{fetch_error, sha256_16, Fetcher};

pub struct FileFetcher {
    client: Client,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent(format!("Prismis/{}", env!("CARGO_PKG_VERSION")))
                .build()
                .expect("static client config is always valid"),
        }
    }

    /// Unified diff plus per-line add/remove/change counts between the
    /// previously fetched body and the current one.
    pub fn diff(previous: &str, current: &str) -> FileDiff {
        let diff = TextDiff::from_lines(previous, current);
        let mut added = 0usize;
        let mut removed = 0usize;
        for change in diff.iter_all_changes() {
            match change.tag() {
                similar::ChangeTag::Insert => added += 1,
                similar::ChangeTag::Delete => removed += 1,
                similar::ChangeTag::Equal => {}
            }
        }
        FileDiff {
            diff_text: diff.unified_diff().header("previous", "current").to_string(),
            added_lines: added,
            removed_lines: removed,
            changed_lines: added + removed,
        }
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    /// `max_items`/`max_days_lookback` are meaningless for a single
    /// tracked URL; the file fetcher always returns at most one record.
    async fn fetch(&self, source: &Source, _max_items: u32, _max_days_lookback: i64) -> Result<Vec<FetchRecord>> {
        let resp = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(|e| fetch_error(&source.url, e))?;
        if !resp.status().is_success() {
            return Err(fetch_error(&source.url, format!("unexpected status {}", resp.status())));
        }
        let body = resp.text().await.map_err(|e| fetch_error(&source.url, e))?;
        let content_hash = sha256_16(&body);
        let external_id = sha256_16(&format!("{}|{}", source.url, content_hash));

        let title = source.name.clone().unwrap_or_else(|| source.url.clone());
        let record = FetchRecord::new(external_id, title, source.url.clone(), body);
        Ok(vec![record])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_counts_added_and_removed_lines() {
        let previous = "line one\nline two\nline three\n";
        let current = "line one\nline two changed\nline three\nline four\n";
        let diff = FileFetcher::diff(previous, current);
        assert!(diff.added_lines >= 1);
        assert!(diff.removed_lines >= 1);
        assert!(diff.diff_text.contains("line four"));
    }

    #[test]
    fn identical_content_has_no_changes() {
        let text = "same\ncontent\n";
        let diff = FileFetcher::diff(text, text);
        assert_eq!(diff.added_lines, 0);
        assert_eq!(diff.removed_lines, 0);
    }

    #[test]
    fn changed_lines_is_additions_plus_removals_for_pure_additions() {
        let previous = "Line 1\nLine 2";
        let current = "Line 1\nLine 2\nLine 3\nLine 4";
        let diff = FileFetcher::diff(previous, current);
        assert_eq!(diff.added_lines, 2);
        assert_eq!(diff.removed_lines, 0);
        assert_eq!(diff.changed_lines, 2);
    }

    #[test]
    fn changed_lines_is_additions_plus_removals_for_pure_deletions() {
        let previous = "Line 1\nLine 2\nLine 3\nLine 4";
        let current = "Line 1\nLine 2";
        let diff = FileFetcher::diff(previous, current);
        assert_eq!(diff.added_lines, 0);
        assert_eq!(diff.removed_lines, 2);
        assert_eq!(diff.changed_lines, 2);
    }

    #[test]
    fn changed_lines_sums_mixed_additions_and_removals() {
        let previous = "Line 1\nLine 2\nLine 3";
        let current = "Line 1\nLine 2 modified\nLine 4";
        let diff = FileFetcher::diff(previous, current);
        assert!(diff.added_lines >= 1);
        assert!(diff.removed_lines >= 1);
        assert_eq!(diff.changed_lines, diff.added_lines + diff.removed_lines);
        assert!(diff.changed_lines >= 2);
    }
}
