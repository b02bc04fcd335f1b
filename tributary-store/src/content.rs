//! Content store implementations.
//!
//! Both stores key records by `(provider, native_id)` and merge a re-synced
//! record field by field: a newer non-empty value replaces the stored one,
//! an empty value keeps it.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tokio::sync::RwLock;
use tracing::{debug, info};
use tributary_core::{
    ContentKey, ContentKind, ContentRecord, ContentStore, CoreError, ProviderKind, UNTITLED,
    UpsertOutcome,
};

use crate::error::StoreError;

// ============================================================================
// Schema
// ============================================================================

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }

    info!(from = version, to = SCHEMA_VERSION, "Creating content schema");
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS content (
            provider TEXT NOT NULL,
            native_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            url TEXT,
            author TEXT,
            thumbnail_url TEXT,
            tags TEXT,
            published_at TEXT,
            source_updated_at TEXT,
            metadata TEXT,
            synced_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (provider, native_id)
        );

        CREATE INDEX IF NOT EXISTS idx_content_provider ON content(provider);
        CREATE INDEX IF NOT EXISTS idx_content_published ON content(published_at);
        ",
    )?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

const UPSERT_SQL: &str = r"
    INSERT INTO content (
        provider, native_id, kind, title, description, url, author, thumbnail_url,
        tags, published_at, source_updated_at, metadata, synced_at, created_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
    ON CONFLICT (provider, native_id) DO UPDATE SET
        kind = excluded.kind,
        title = CASE WHEN excluded.title = ?14 THEN content.title ELSE excluded.title END,
        description = COALESCE(excluded.description, content.description),
        url = COALESCE(excluded.url, content.url),
        author = COALESCE(excluded.author, content.author),
        thumbnail_url = COALESCE(excluded.thumbnail_url, content.thumbnail_url),
        tags = COALESCE(excluded.tags, content.tags),
        published_at = COALESCE(excluded.published_at, content.published_at),
        source_updated_at = COALESCE(excluded.source_updated_at, content.source_updated_at),
        metadata = COALESCE(excluded.metadata, content.metadata),
        synced_at = excluded.synced_at
";

const SELECT_COLUMNS: &str = "provider, native_id, kind, title, description, url, author, \
    thumbnail_url, tags, published_at, source_updated_at, metadata, synced_at";

// ============================================================================
// SQLite Store
// ============================================================================

/// Content store backed by a SQLite database.
///
/// The connection is shared behind a mutex and every statement runs on
/// the blocking pool, so upserts of the same key are serialized.
#[derive(Clone)]
pub struct SqliteContentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteContentStore {
    /// Opens (or creates) a database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        info!(path = %path.display(), "Opening content database");
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Task("content db mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Inserts or merges a record.
    pub async fn upsert_record(&self, record: &ContentRecord) -> Result<UpsertOutcome, StoreError> {
        let record = record.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let exists = tx
                .query_row(
                    "SELECT 1 FROM content WHERE provider = ?1 AND native_id = ?2",
                    params![record.provider.cli_name(), record.native_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();

            let tags = if record.tags.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&record.tags)?)
            };
            let metadata = if record.metadata.is_null() {
                None
            } else {
                Some(record.metadata.to_string())
            };

            tx.execute(
                UPSERT_SQL,
                params![
                    record.provider.cli_name(),
                    record.native_id,
                    record.kind.as_str(),
                    record.title,
                    record.description,
                    record.url,
                    record.author,
                    record.thumbnail_url,
                    tags,
                    record.published_at.map(|t| t.to_rfc3339()),
                    record.source_updated_at.map(|t| t.to_rfc3339()),
                    metadata,
                    record.synced_at.to_rfc3339(),
                    UNTITLED,
                ],
            )?;
            tx.commit()?;

            let outcome = if exists {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Inserted
            };
            debug!(key = %record.key(), ?outcome, "Upserted content");
            Ok(outcome)
        })
        .await
    }

    /// Reads a record by key.
    pub async fn get_record(&self, key: &ContentKey) -> Result<Option<ContentRecord>, StoreError> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM content WHERE provider = ?1 AND native_id = ?2"
            );
            let row = conn
                .query_row(
                    &sql,
                    params![key.provider.cli_name(), key.native_id],
                    RawRow::from_row,
                )
                .optional()?;
            row.map(RawRow::into_record).transpose()
        })
        .await
    }

    /// Counts records, optionally for one provider.
    pub async fn count_records(&self, provider: Option<ProviderKind>) -> Result<u64, StoreError> {
        self.with_conn(move |conn| {
            let count: i64 = match provider {
                Some(p) => conn.query_row(
                    "SELECT COUNT(*) FROM content WHERE provider = ?1",
                    params![p.cli_name()],
                    |row| row.get(0),
                )?,
                None => conn.query_row("SELECT COUNT(*) FROM content", [], |row| row.get(0))?,
            };
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }
}

impl std::fmt::Debug for SqliteContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteContentStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn upsert(&self, record: &ContentRecord) -> Result<UpsertOutcome, CoreError> {
        Ok(self.upsert_record(record).await?)
    }

    async fn get(&self, key: &ContentKey) -> Result<Option<ContentRecord>, CoreError> {
        Ok(self.get_record(key).await?)
    }

    async fn count(&self, provider: Option<ProviderKind>) -> Result<u64, CoreError> {
        Ok(self.count_records(provider).await?)
    }
}

/// Column values as stored, before parsing.
struct RawRow {
    provider: String,
    native_id: String,
    kind: String,
    title: String,
    description: Option<String>,
    url: Option<String>,
    author: Option<String>,
    thumbnail_url: Option<String>,
    tags: Option<String>,
    published_at: Option<String>,
    source_updated_at: Option<String>,
    metadata: Option<String>,
    synced_at: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            provider: row.get(0)?,
            native_id: row.get(1)?,
            kind: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            url: row.get(5)?,
            author: row.get(6)?,
            thumbnail_url: row.get(7)?,
            tags: row.get(8)?,
            published_at: row.get(9)?,
            source_updated_at: row.get(10)?,
            metadata: row.get(11)?,
            synced_at: row.get(12)?,
        })
    }

    fn into_record(self) -> Result<ContentRecord, StoreError> {
        let provider = ProviderKind::from_cli_name(&self.provider)
            .ok_or_else(|| StoreError::Parse(format!("unknown provider `{}`", self.provider)))?;

        let mut record = ContentRecord::new(
            provider,
            self.native_id,
            ContentKind::parse(&self.kind),
            Some(&self.title),
        );
        record.description = self.description;
        record.url = self.url;
        record.author = self.author;
        record.thumbnail_url = self.thumbnail_url;
        record.tags = match self.tags {
            Some(text) => serde_json::from_str(&text)?,
            None => Vec::new(),
        };
        record.published_at = parse_time(self.published_at.as_deref())?;
        record.source_updated_at = parse_time(self.source_updated_at.as_deref())?;
        record.metadata = match self.metadata {
            Some(text) => serde_json::from_str(&text)?,
            None => serde_json::Value::Null,
        };
        record.synced_at = parse_time(Some(&self.synced_at))?.unwrap_or(record.synced_at);
        Ok(record)
    }
}

fn parse_time(text: Option<&str>) -> Result<Option<DateTime<Utc>>, StoreError> {
    text.map(|t| {
        DateTime::parse_from_rfc3339(t)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Parse(format!("timestamp `{t}`: {e}")))
    })
    .transpose()
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Content store held in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    records: RwLock<HashMap<ContentKey, ContentRecord>>,
    failing_ids: HashSet<String>,
}

impl MemoryContentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that rejects writes for the given native ids.
    pub fn with_failing_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: RwLock::default(),
            failing_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Snapshot of every stored record.
    pub async fn records(&self) -> Vec<ContentRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn upsert(&self, record: &ContentRecord) -> Result<UpsertOutcome, CoreError> {
        if self.failing_ids.contains(&record.native_id) {
            return Err(CoreError::StoreWrite(format!(
                "write rejected for {}",
                record.key()
            )));
        }

        let mut records = self.records.write().await;
        match records.get_mut(&record.key()) {
            Some(existing) => {
                existing.merge_from(record);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                records.insert(record.key(), record.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn get(&self, key: &ContentKey) -> Result<Option<ContentRecord>, CoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn count(&self, provider: Option<ProviderKind>) -> Result<u64, CoreError> {
        let records = self.records.read().await;
        let count = match provider {
            Some(p) => records.keys().filter(|k| k.provider == p).count(),
            None => records.len(),
        };
        Ok(count as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn video(id: &str, title: Option<&str>) -> ContentRecord {
        let mut r = ContentRecord::new(ProviderKind::YouTube, id, ContentKind::Video, title);
        r.url = Some(format!("https://www.youtube.com/watch?v={id}"));
        r
    }

    #[tokio::test]
    async fn test_sqlite_insert_then_update() {
        let store = SqliteContentStore::open_in_memory().unwrap();

        let mut first = video("v1", Some("First"));
        first.description = Some("desc".into());
        first.tags = vec!["a".into()];
        first.published_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        first.metadata = serde_json::json!({"channel_id": "UC1"});
        assert_eq!(store.upsert(&first).await.unwrap(), UpsertOutcome::Inserted);

        let second = video("v1", None);
        assert_eq!(store.upsert(&second).await.unwrap(), UpsertOutcome::Updated);

        assert_eq!(store.count(None).await.unwrap(), 1);
        let stored = store.get(&first.key()).await.unwrap().unwrap();
        assert_eq!(stored.title, "First", "untitled must not clobber a title");
        assert_eq!(stored.description.as_deref(), Some("desc"));
        assert_eq!(stored.tags, vec!["a"]);
        assert_eq!(stored.published_at, first.published_at);
        assert_eq!(stored.metadata["channel_id"], "UC1");
    }

    #[tokio::test]
    async fn test_sqlite_newer_values_win() {
        let store = SqliteContentStore::open_in_memory().unwrap();
        store.upsert(&video("v1", Some("Old"))).await.unwrap();

        let mut newer = video("v1", Some("New"));
        newer.author = Some("Channel".into());
        store.upsert(&newer).await.unwrap();

        let stored = store.get(&newer.key()).await.unwrap().unwrap();
        assert_eq!(stored.title, "New");
        assert_eq!(stored.author.as_deref(), Some("Channel"));
    }

    #[tokio::test]
    async fn test_sqlite_same_id_different_provider() {
        let store = SqliteContentStore::open_in_memory().unwrap();
        store.upsert(&video("42", Some("a"))).await.unwrap();
        store
            .upsert(&ContentRecord::new(
                ProviderKind::GitHub,
                "42",
                ContentKind::Repository,
                Some("b"),
            ))
            .await
            .unwrap();

        assert_eq!(store.count(None).await.unwrap(), 2);
        assert_eq!(store.count(Some(ProviderKind::GitHub)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("content.db");
        {
            let store = SqliteContentStore::open(&path).unwrap();
            store.upsert(&video("v1", Some("x"))).await.unwrap();
        }
        let reopened = SqliteContentStore::open(&path).unwrap();
        assert_eq!(reopened.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_concurrent_upserts_same_key() {
        let store = SqliteContentStore::open_in_memory().unwrap();
        let mut handles = Vec::new();
        for i in 0..20 {
            let s = store.clone();
            handles.push(tokio::spawn(async move {
                s.upsert(&video("same", Some(&format!("t{i}")))).await.unwrap()
            }));
        }
        let mut inserted = 0;
        for h in handles {
            if h.await.unwrap() == UpsertOutcome::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_merge_and_failures() {
        let store = MemoryContentStore::with_failing_ids(["bad"]);
        store.upsert(&video("v1", Some("T"))).await.unwrap();
        assert_eq!(
            store.upsert(&video("v1", None)).await.unwrap(),
            UpsertOutcome::Updated
        );
        assert!(store.upsert(&video("bad", Some("x"))).await.is_err());

        assert_eq!(store.len().await, 1);
        let stored = store
            .get(&ContentKey::new(ProviderKind::YouTube, "v1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.title, "T");
    }
}
