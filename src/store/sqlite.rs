//! SQLite-backed embedded configuration store.
//!
//! Values are stored as canonical JSON text and parsed back on read.
//! Timestamps are stored as fixed-width RFC 3339 text so that string
//! comparison matches chronological order.

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::error::Result;
use super::repository::ConfigRepository;
use super::types::{ConfigEntry, ExportOptions, ImportMode, ImportOptions, ListOptions};
use super::value::{ConfigRecord, ConfigValue};

/// Schema for the `config_kv` table.
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS config_kv (
  id integer PRIMARY KEY AUTOINCREMENT NOT NULL,
  key text NOT NULL UNIQUE,
  value text NOT NULL,
  updated_at text NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE UNIQUE INDEX IF NOT EXISTS config_kv_key_unique ON config_kv (key);
";

const SELECT_ENTRY: &str = "SELECT id, key, value, updated_at FROM config_kv WHERE key = ?1";

// ?1 is the prefix (NULL for none); starts-with is an exact byte comparison.
const SELECT_RANGE: &str = "SELECT id, key, value, updated_at FROM config_kv \
     WHERE (?1 IS NULL OR substr(key, 1, length(?1)) = ?1) \
     ORDER BY key ASC LIMIT ?2 OFFSET ?3";

// updated_at never moves backwards for a key, even if the clock does.
const UPSERT: &str = "INSERT INTO config_kv (key, value, updated_at) VALUES (?1, ?2, ?3) \
     ON CONFLICT(key) DO UPDATE SET \
       value = excluded.value, \
       updated_at = MAX(excluded.updated_at, config_kv.updated_at)";

/// Format used by SQLite's own `CURRENT_TIMESTAMP` default.
const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// SQLite-backed configuration repository.
///
/// # Thread Safety
///
/// `SqliteRepository` is `Clone`; clones share one connection guarded by a
/// mutex. Blocking SQLite calls run on tokio's blocking pool.
#[derive(Clone)]
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Opens or creates a SQLite database at the given path.
    ///
    /// Creates parent directories if needed and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory cannot be created
    /// - Database file cannot be opened or created (permissions, disk full, etc.)
    /// - Schema initialization fails
    pub fn open<P: AsRef<Path>>(path: P) -> AnyResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open config database: {}", path.display()))?;

        // WAL for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;

        info!(path = %path.display(), "Opened embedded config store");
        Self::init(conn)
    }

    /// Creates an in-memory database. All data is lost when dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn memory() -> AnyResult<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AnyResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))
            .context("Failed to set busy timeout")?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize config_kv table")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `op` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> AnyResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let value = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            op(&mut guard)
        })
        .await
        .context("Task join error")??;
        Ok(value)
    }
}

/// A row as stored, before value and timestamp decoding.
struct StoredRow {
    id: i64,
    key: String,
    value: String,
    updated_at: String,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            key: row.get(1)?,
            value: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }

    fn into_entry(self) -> AnyResult<ConfigEntry> {
        let updated_at = parse_timestamp(&self.updated_at)
            .with_context(|| format!("Invalid updated_at for key '{}'", self.key))?;
        let value = decode_value(&self.value);
        Ok(ConfigEntry {
            id: self.id,
            key: self.key,
            value,
            updated_at,
        })
    }
}

/// Decodes a stored value.
///
/// Text that is not valid JSON (written by older tools) is returned as a
/// plain string value rather than failing the read.
pub(crate) fn decode_value(raw: &str) -> ConfigValue {
    match serde_json::from_str::<ConfigValue>(raw) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "Stored value is not JSON, returning raw text");
            ConfigValue::String(raw.to_string())
        },
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> AnyResult<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, SQLITE_TIMESTAMP_FORMAT)
        .with_context(|| format!("Unrecognized timestamp '{raw}'"))?;
    Ok(naive.and_utc())
}

fn select_entry(conn: &Connection, key: &str) -> AnyResult<Option<ConfigEntry>> {
    let row = conn
        .query_row(SELECT_ENTRY, params![key], StoredRow::from_row)
        .optional()
        .with_context(|| format!("Failed to read key '{key}'"))?;
    row.map(StoredRow::into_entry).transpose()
}

fn select_range(
    conn: &Connection,
    prefix: Option<&str>,
    limit: Option<u64>,
    offset: Option<u64>,
) -> AnyResult<Vec<ConfigEntry>> {
    // LIMIT -1 is SQLite's "no limit".
    let limit = limit.map_or(Ok(-1), i64::try_from).context("limit out of range")?;
    let offset = offset.map_or(Ok(0), i64::try_from).context("offset out of range")?;

    let mut stmt = conn
        .prepare_cached(SELECT_RANGE)
        .context("Failed to prepare list query")?;
    let rows = stmt
        .query_map(params![prefix, limit, offset], StoredRow::from_row)
        .context("Failed to query config_kv")?;

    let mut entries = Vec::new();
    for row in rows {
        let row = row.context("Failed to read config_kv row")?;
        entries.push(row.into_entry()?);
    }
    Ok(entries)
}

/// Upserts one key and reads it back, inside a single transaction.
fn upsert_in(conn: &Connection, key: &str, value: &ConfigValue) -> AnyResult<ConfigEntry> {
    let now = format_timestamp(Utc::now());
    conn.execute(UPSERT, params![key, value.to_json_string(), now])
        .with_context(|| format!("Failed to upsert key '{key}'"))?;
    select_entry(conn, key)?
        .with_context(|| format!("Failed to persist config key '{key}'"))
}

fn upsert_one(conn: &mut Connection, key: &str, value: &ConfigValue) -> AnyResult<ConfigEntry> {
    let tx = conn.transaction().context("Failed to begin transaction")?;
    let entry = upsert_in(&tx, key, value)?;
    tx.commit().context("Failed to commit set transaction")?;
    Ok(entry)
}

fn replace_all(conn: &mut Connection, records: &ConfigRecord) -> AnyResult<Vec<ConfigEntry>> {
    let tx = conn.transaction().context("Failed to begin import transaction")?;
    let removed = tx
        .execute("DELETE FROM config_kv", [])
        .context("Failed to clear config_kv")?;
    debug!(removed, "Cleared config_kv for replace import");

    let mut entries = Vec::with_capacity(records.len());
    for (key, value) in records {
        entries.push(upsert_in(&tx, key, value)?);
    }
    tx.commit().context("Failed to commit import transaction")?;
    Ok(entries)
}

#[async_trait]
impl ConfigRepository for SqliteRepository {
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>> {
        let key = key.to_string();
        self.with_conn(move |conn| select_entry(conn, &key)).await
    }

    async fn set(&self, key: &str, value: ConfigValue) -> Result<ConfigEntry> {
        let key = key.to_string();
        debug!(%key, "sqlite set");
        self.with_conn(move |conn| upsert_one(conn, &key, &value)).await
    }

    async fn unset(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            let removed = conn
                .execute("DELETE FROM config_kv WHERE key = ?1", params![key])
                .with_context(|| format!("Failed to remove key '{key}'"))?;
            debug!(%key, removed, "sqlite unset");
            Ok(())
        })
        .await
    }

    async fn list(&self, options: ListOptions) -> Result<Vec<ConfigEntry>> {
        self.with_conn(move |conn| {
            select_range(conn, options.prefix.as_deref(), options.limit, options.offset)
        })
        .await
    }

    async fn import(
        &self,
        records: ConfigRecord,
        options: ImportOptions,
    ) -> Result<Vec<ConfigEntry>> {
        let count = records.len();
        let mut entries = self
            .with_conn(move |conn| match options.mode {
                ImportMode::Replace => replace_all(conn, &records),
                // Each key commits on its own.
                ImportMode::Merge => records
                    .iter()
                    .map(|(key, value)| upsert_one(conn, key, value))
                    .collect(),
            })
            .await?;
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        info!(count, mode = %options.mode, "Imported config entries");
        Ok(entries)
    }

    async fn export(&self, options: ExportOptions) -> Result<ConfigRecord> {
        self.with_conn(move |conn| {
            let entries = select_range(conn, options.prefix.as_deref(), None, None)?;
            Ok(entries.into_iter().map(|e| (e.key, e.value)).collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn insert_raw(repo: &SqliteRepository, key: &str, value: &str, updated_at: &str) {
        repo.conn
            .lock()
            .execute(
                "INSERT INTO config_kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, updated_at],
            )
            .unwrap();
    }

    #[tokio::test]
    async fn test_legacy_non_json_value_reads_back_as_string() {
        let repo = SqliteRepository::memory().unwrap();
        insert_raw(&repo, "legacy.banner", "hello {world", "2024-01-01T00:00:00.000000Z");

        let entry = repo.get("legacy.banner").await.unwrap().unwrap();
        assert_eq!(entry.value, ConfigValue::from("hello {world"));

        let exported = repo.export(ExportOptions::default()).await.unwrap();
        assert_eq!(exported["legacy.banner"], ConfigValue::from("hello {world"));
    }

    #[tokio::test]
    async fn test_reads_sqlite_default_timestamp_format() {
        let repo = SqliteRepository::memory().unwrap();
        insert_raw(&repo, "app.name", "\"demo\"", "2024-03-04 05:06:07");

        let entry = repo.get("app.name").await.unwrap().unwrap();
        assert_eq!(entry.updated_at.to_rfc3339(), "2024-03-04T05:06:07+00:00");
    }

    #[tokio::test]
    async fn test_values_are_stored_as_json_text() {
        let repo = SqliteRepository::memory().unwrap();
        repo.set("feature.beta", ConfigValue::from(json!({"enabled": false})))
            .await
            .unwrap();

        let raw: String = repo
            .conn
            .lock()
            .query_row(
                "SELECT value FROM config_kv WHERE key = 'feature.beta'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(raw, r#"{"enabled":false}"#);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_id_and_clock_never_goes_back() {
        let repo = SqliteRepository::memory().unwrap();
        insert_raw(&repo, "app.debug", "false", "2999-01-01T00:00:00.000000Z");
        let before = repo.get("app.debug").await.unwrap().unwrap();

        let after = repo.set("app.debug", ConfigValue::Bool(true)).await.unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.value, ConfigValue::Bool(true));
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn test_prefix_is_not_a_like_pattern() {
        let repo = SqliteRepository::memory().unwrap();
        repo.set("app_x.one", ConfigValue::from(1i64)).await.unwrap();
        repo.set("appyx.two", ConfigValue::from(2i64)).await.unwrap();

        let entries = repo
            .list(ListOptions::default().with_prefix("app_"))
            .await
            .unwrap();
        let keys: Vec<_> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["app_x.one"]);
    }

    #[tokio::test]
    async fn test_file_database_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("config.db");

        {
            let repo = SqliteRepository::open(&db_path).unwrap();
            repo.set("app.debug", ConfigValue::Bool(true)).await.unwrap();
        }

        let repo = SqliteRepository::open(&db_path).unwrap();
        let entry = repo.get("app.debug").await.unwrap().unwrap();
        assert_eq!(entry.value, ConfigValue::Bool(true));
    }

    #[tokio::test]
    async fn test_failed_replace_import_keeps_previous_state() {
        let repo = SqliteRepository::memory().unwrap();
        repo.set("app.a", ConfigValue::from(1i64)).await.unwrap();
        repo.conn
            .lock()
            .execute_batch(
                "CREATE TRIGGER reject_boom BEFORE INSERT ON config_kv \
                 WHEN NEW.key = 'boom' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let mut records = ConfigRecord::new();
        records.insert("app.b".to_string(), ConfigValue::from(2i64));
        records.insert("boom".to_string(), ConfigValue::Null);
        let err = repo.import(records, ImportOptions::replace()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));

        let exported = repo.export(ExportOptions::default()).await.unwrap();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported["app.a"], ConfigValue::from(1i64));
    }
}
