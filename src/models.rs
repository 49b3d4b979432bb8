//! Core data model: [`Source`], [`ContentItem`], [`VectorRow`], and the
//! transient [`FetchRecord`] a fetcher hands back before analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PrismisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Feed,
    Forum,
    Video,
    File,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::Forum => "forum",
            SourceKind::Video => "video",
            SourceKind::File => "file",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = PrismisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feed" => Ok(SourceKind::Feed),
            "forum" => Ok(SourceKind::Forum),
            "video" => Ok(SourceKind::Video),
            "file" => Ok(SourceKind::File),
            other => Err(PrismisError::InvalidType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
    None,
}

impl Priority {
    /// Case-fold and coerce an arbitrary LLM-supplied string into a valid
    /// priority, defaulting to `Medium` for anything unrecognized.
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "high" => Priority::High,
            "medium" => Priority::Medium,
            "low" => Priority::Low,
            "none" => Priority::None,
            _ => Priority::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::None => "none",
        }
    }
}

/// Per-file-source delta metadata, attached to an item's analysis when the
/// previous fetch of the same URL differed from the current body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDiff {
    pub diff_text: String,
    pub added_lines: usize,
    pub removed_lines: usize,
    pub changed_lines: usize,
}

/// Structured analysis produced by the summarizer and evaluator, persisted
/// verbatim alongside a `ContentItem`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Analysis {
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub alpha_insights: Vec<String>,
    #[serde(default)]
    pub metrics: serde_json::Value,
    #[serde(default)]
    pub matched_interests: Vec<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub diff: Option<FileDiff>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub url: String,
    pub kind: SourceKind,
    pub name: Option<String>,
    pub active: bool,
    pub error_count: i64,
    pub last_error: Option<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl Source {
    pub fn new(url: impl Into<String>, kind: SourceKind, name: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            kind,
            name,
            active: true,
            error_count: 0,
            last_error: None,
            last_fetched_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub source_id: String,
    pub external_id: String,
    pub title: String,
    pub url: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub reading_summary: Option<String>,
    pub analysis: Option<Analysis>,
    pub priority: Option<Priority>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub read: bool,
    pub favorited: bool,
    pub notes: Option<String>,
}

impl ContentItem {
    pub fn new(source_id: impl Into<String>, external_id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            external_id: external_id.into(),
            title: title.into(),
            url: url.into(),
            content: None,
            summary: None,
            reading_summary: None,
            analysis: None,
            priority: None,
            published_at: None,
            fetched_at: None,
            read: false,
            favorited: false,
            notes: None,
        }
    }
}

/// One row of the semantic-vector side-index.
#[derive(Debug, Clone)]
pub struct VectorRow {
    pub content_id: String,
    pub vector: Vec<f32>,
}

/// An item as produced by a fetcher before analysis. Never persisted.
#[derive(Debug, Clone)]
pub struct FetchRecord {
    pub external_id: String,
    pub title: String,
    pub url: String,
    pub content: String,
    pub published_at: Option<DateTime<Utc>>,
    pub metrics: serde_json::Value,
    pub diff: Option<FileDiff>,
}

impl FetchRecord {
    pub fn new(external_id: impl Into<String>, title: impl Into<String>, url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: title.into(),
            url: url.into(),
            content: content.into(),
            published_at: None,
            metrics: serde_json::Value::Null,
            diff: None,
        }
    }
}
