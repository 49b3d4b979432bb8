//! Transactional persistence over a single SQLite file, plus a
//! `sqlite-vec` virtual table used as the semantic-vector side-index.
//!
//! The virtual table has no concept of foreign keys, so a content item
//! deleted outside of [`Store::delete_vector`] (pruning, manual deletion)
//! leaves a dangling vector row behind; [`Store::cleanup_orphaned_vectors`]
//! is the reconciliation pass that restores the invariant.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::error::{PrismisError, Result};
use crate::models::{Analysis, ContentItem, Priority, Source, SourceKind};

const SCHEMA: &str = r#"
PRAGMA journal_mode=WAL;

CREATE TABLE IF NOT EXISTS sources (
    id              TEXT PRIMARY KEY,
    url             TEXT NOT NULL,
    type            TEXT NOT NULL,
    name            TEXT,
    active          INTEGER NOT NULL DEFAULT 1,
    error_count     INTEGER NOT NULL DEFAULT 0,
    last_error      TEXT,
    last_fetched_at TEXT,
    UNIQUE(url, type)
);

CREATE TABLE IF NOT EXISTS content_items (
    id              TEXT PRIMARY KEY,
    source_id       TEXT NOT NULL REFERENCES sources(id),
    external_id     TEXT NOT NULL,
    title           TEXT NOT NULL,
    url             TEXT NOT NULL,
    content         TEXT,
    summary         TEXT,
    reading_summary TEXT,
    analysis        TEXT,
    priority        TEXT,
    published_at    TEXT,
    fetched_at      TEXT,
    read            INTEGER NOT NULL DEFAULT 0,
    favorited       INTEGER NOT NULL DEFAULT 0,
    notes           TEXT,
    UNIQUE(source_id, external_id)
);

CREATE VIRTUAL TABLE IF NOT EXISTS content_vectors USING vec0(
    embedding float[1536]
);

CREATE TABLE IF NOT EXISTS vector_index (
    content_id TEXT PRIMARY KEY,
    vec_rowid  INTEGER NOT NULL
);
"#;

fn register_vec_extension() {
    use rusqlite::ffi::sqlite3_auto_extension;
    use sqlite_vec::sqlite3_vec_init;

    unsafe {
        sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    }
}

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (creating if absent) the database at `path` and run the
    /// idempotent schema migration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        register_vec_extension();
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Store { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> Result<Self> {
        register_vec_extension();
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Store { conn: Arc::new(Mutex::new(conn)) })
    }

    pub async fn add_source(&self, url: &str, kind: SourceKind, name: Option<String>) -> Result<String> {
        let source = Source::new(url, kind, name);
        let conn = self.conn.lock().await;
        let n = conn
            .execute(
                "INSERT OR IGNORE INTO sources (id, url, type, name, active, error_count) VALUES (?1, ?2, ?3, ?4, 1, 0)",
                params![source.id, source.url, kind.as_str(), source.name],
            )?;
        if n == 0 {
            return Err(PrismisError::Duplicate);
        }
        Ok(source.id)
    }

    pub async fn list_sources(&self, active_only: bool) -> Result<Vec<Source>> {
        let conn = self.conn.lock().await;
        let sql = if active_only {
            "SELECT id, url, type, name, active, error_count, last_error, last_fetched_at FROM sources WHERE active = 1"
        } else {
            "SELECT id, url, type, name, active, error_count, last_error, last_fetched_at FROM sources"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], Self::row_to_source)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn row_to_source(row: &rusqlite::Row) -> rusqlite::Result<Source> {
        let kind_str: String = row.get(2)?;
        let kind = kind_str.parse::<SourceKind>().unwrap_or(SourceKind::Feed);
        let last_fetched_at: Option<String> = row.get(7)?;
        Ok(Source {
            id: row.get(0)?,
            url: row.get(1)?,
            kind,
            name: row.get(3)?,
            active: row.get::<_, i64>(4)? != 0,
            error_count: row.get(5)?,
            last_error: row.get(6)?,
            last_fetched_at: last_fetched_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
        })
    }

    pub async fn mark_source_fetched(&self, source_id: &str, ok: bool, error: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().await;
        if ok {
            conn.execute(
                "UPDATE sources SET error_count = 0, last_error = NULL, last_fetched_at = ?2 WHERE id = ?1",
                params![source_id, Utc::now().to_rfc3339()],
            )?;
        } else {
            conn.execute(
                "UPDATE sources SET error_count = error_count + 1, last_error = ?2 WHERE id = ?1",
                params![source_id, error],
            )?;
        }
        Ok(())
    }

    /// O(index lookup) dedup gate via the `(source_id, external_id)`
    /// unique index.
    pub async fn exists(&self, source_id: &str, external_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM content_items WHERE source_id = ?1 AND external_id = ?2",
                params![source_id, external_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Most recently fetched body previously stored for this `(source_id,
    /// url)` pair, used by the file fetcher's diff path — a changed file
    /// always gets a new `external_id`, so its predecessor has to be
    /// looked up by URL rather than by the dedup key.
    pub async fn latest_content_for_url(&self, source_id: &str, url: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        let content = conn
            .query_row(
                "SELECT content FROM content_items
                 WHERE source_id = ?1 AND url = ?2 AND content IS NOT NULL
                 ORDER BY fetched_at DESC LIMIT 1",
                params![source_id, url],
                |r| r.get::<_, String>(0),
            )
            .optional()?;
        Ok(content)
    }

    pub async fn insert_item(&self, item: &ContentItem) -> Result<String> {
        let conn = self.conn.lock().await;
        let analysis_json = item
            .analysis
            .as_ref()
            .map(|a| serde_json::to_string(a).unwrap_or_default());
        let n = conn.execute(
            "INSERT OR IGNORE INTO content_items
                (id, source_id, external_id, title, url, content, summary, reading_summary,
                 analysis, priority, published_at, fetched_at, read, favorited, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                item.id,
                item.source_id,
                item.external_id,
                item.title,
                item.url,
                item.content,
                item.summary,
                item.reading_summary,
                analysis_json,
                item.priority.map(|p| p.as_str()),
                item.published_at.map(|d| d.to_rfc3339()),
                item.fetched_at.map(|d| d.to_rfc3339()),
                item.read as i64,
                item.favorited as i64,
                item.notes,
            ],
        )?;
        if n == 0 {
            return Err(PrismisError::Duplicate);
        }
        Ok(item.id.clone())
    }

    pub async fn insert_vector(&self, content_id: &str, vector: &[f32]) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM vector_index WHERE content_id = ?1",
            params![content_id],
        )?;
        tx.execute(
            "INSERT INTO content_vectors(embedding) VALUES (?1)",
            params![vector_to_blob(vector)],
        )?;
        let rowid = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO vector_index (content_id, vec_rowid) VALUES (?1, ?2)",
            params![content_id, rowid],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub async fn delete_vector(&self, content_id: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        let rowid: Option<i64> = conn
            .query_row(
                "SELECT vec_rowid FROM vector_index WHERE content_id = ?1",
                params![content_id],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(rowid) = rowid {
            conn.execute("DELETE FROM content_vectors WHERE rowid = ?1", params![rowid])?;
            conn.execute("DELETE FROM vector_index WHERE content_id = ?1", params![content_id])?;
        }
        Ok(())
    }

    /// Delete every vector row whose content id no longer resolves to a
    /// live `ContentItem`. Returns the number deleted.
    pub async fn cleanup_orphaned_vectors(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT content_id, vec_rowid FROM vector_index
             WHERE content_id NOT IN (SELECT id FROM content_items)",
        )?;
        let orphans: Vec<(String, i64)> = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        for (content_id, rowid) in &orphans {
            conn.execute("DELETE FROM content_vectors WHERE rowid = ?1", params![rowid])?;
            conn.execute("DELETE FROM vector_index WHERE content_id = ?1", params![content_id])?;
        }
        Ok(orphans.len())
    }

    /// Delete every item at the given priority (default `None`) older
    /// than `older_than`, along with their vectors, in one transaction.
    pub async fn prune(&self, priority: Priority, older_than: Option<DateTime<Utc>>) -> Result<usize> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let ids: Vec<String> = {
            let mut stmt = match older_than {
                Some(_) => tx.prepare(
                    "SELECT id FROM content_items WHERE priority = ?1 AND fetched_at < ?2",
                )?,
                None => tx.prepare("SELECT id FROM content_items WHERE priority = ?1")?,
            };
            let rows = match older_than {
                Some(cutoff) => stmt
                    .query_map(params![priority.as_str(), cutoff.to_rfc3339()], |r| r.get(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?,
                None => stmt
                    .query_map(params![priority.as_str()], |r| r.get(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?,
            };
            rows
        };

        for id in &ids {
            tx.execute("DELETE FROM content_items WHERE id = ?1", params![id])?;
            let rowid: Option<i64> = tx
                .query_row("SELECT vec_rowid FROM vector_index WHERE content_id = ?1", params![id], |r| r.get(0))
                .optional()?;
            if let Some(rowid) = rowid {
                tx.execute("DELETE FROM content_vectors WHERE rowid = ?1", params![rowid])?;
                tx.execute("DELETE FROM vector_index WHERE content_id = ?1", params![id])?;
            }
        }
        tx.commit()?;
        Ok(ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    fn test_item(source_id: &str, external_id: &str) -> ContentItem {
        ContentItem::new(source_id, external_id, "Title", "https://example.com")
    }

    #[tokio::test]
    async fn add_source_rejects_duplicate_url_and_type() {
        let store = Store::open_in_memory().unwrap();
        store.add_source("https://a.com/feed", SourceKind::Feed, None).await.unwrap();
        let err = store.add_source("https://a.com/feed", SourceKind::Feed, None).await.unwrap_err();
        assert!(matches!(err, PrismisError::Duplicate));
    }

    #[tokio::test]
    async fn insert_item_dedups_by_source_and_external_id() {
        let store = Store::open_in_memory().unwrap();
        let source_id = store.add_source("https://a.com/feed", SourceKind::Feed, None).await.unwrap();
        store.insert_item(&test_item(&source_id, "abc")).await.unwrap();
        let err = store.insert_item(&test_item(&source_id, "abc")).await.unwrap_err();
        assert!(matches!(err, PrismisError::Duplicate));
    }

    #[tokio::test]
    async fn exists_reflects_dedup_state() {
        let store = Store::open_in_memory().unwrap();
        let source_id = store.add_source("https://a.com/feed", SourceKind::Feed, None).await.unwrap();
        assert!(!store.exists(&source_id, "abc").await.unwrap());
        store.insert_item(&test_item(&source_id, "abc")).await.unwrap();
        assert!(store.exists(&source_id, "abc").await.unwrap());
    }

    #[tokio::test]
    async fn mark_source_fetched_resets_error_state_on_success() {
        let store = Store::open_in_memory().unwrap();
        let source_id = store.add_source("https://a.com/feed", SourceKind::Feed, None).await.unwrap();
        store.mark_source_fetched(&source_id, false, Some("boom")).await.unwrap();
        store.mark_source_fetched(&source_id, true, None).await.unwrap();
        let sources = store.list_sources(false).await.unwrap();
        let s = sources.iter().find(|s| s.id == source_id).unwrap();
        assert_eq!(s.error_count, 0);
        assert!(s.last_error.is_none());
    }

    #[tokio::test]
    async fn latest_content_for_url_returns_most_recent_prior_body() {
        let store = Store::open_in_memory().unwrap();
        let source_id = store.add_source("https://a.com/file", SourceKind::File, None).await.unwrap();

        assert_eq!(store.latest_content_for_url(&source_id, "https://tracked.example/CHANGELOG.md").await.unwrap(), None);

        let mut first = ContentItem::new(&source_id, "ext-1", "CHANGELOG", "https://tracked.example/CHANGELOG.md");
        first.content = Some("version 1".to_string());
        first.fetched_at = Some(Utc::now() - chrono::Duration::hours(1));
        store.insert_item(&first).await.unwrap();

        let mut second = ContentItem::new(&source_id, "ext-2", "CHANGELOG", "https://tracked.example/CHANGELOG.md");
        second.content = Some("version 2".to_string());
        second.fetched_at = Some(Utc::now());
        store.insert_item(&second).await.unwrap();

        let latest = store.latest_content_for_url(&source_id, "https://tracked.example/CHANGELOG.md").await.unwrap();
        assert_eq!(latest.as_deref(), Some("version 2"));
    }

    #[tokio::test]
    async fn orphan_reconciliation_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let source_id = store.add_source("https://a.com/feed", SourceKind::Feed, None).await.unwrap();
        let item = test_item(&source_id, "abc");
        store.insert_item(&item).await.unwrap();
        store.insert_vector(&item.id, &[0.1f32; 1536]).await.unwrap();

        {
            let conn = store.conn.lock().await;
            conn.execute("DELETE FROM content_items WHERE id = ?1", params![item.id]).unwrap();
        }

        assert_eq!(store.cleanup_orphaned_vectors().await.unwrap(), 1);
        assert_eq!(store.cleanup_orphaned_vectors().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn prune_deletes_matching_priority_and_its_vector() {
        let store = Store::open_in_memory().unwrap();
        let source_id = store.add_source("https://a.com/feed", SourceKind::Feed, None).await.unwrap();
        let mut item = test_item(&source_id, "abc");
        item.priority = Some(Priority::None);
        store.insert_item(&item).await.unwrap();
        store.insert_vector(&item.id, &[0.2f32; 1536]).await.unwrap();

        let pruned = store.prune(Priority::None, None).await.unwrap();
        assert_eq!(pruned, 1);
        assert_eq!(store.cleanup_orphaned_vectors().await.unwrap(), 0);
    }
}
