//! PostgreSQL-backed configuration store.
//!
//! Values live in a native `jsonb` column, so no text round trip is needed.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Executor, Postgres, Row};
use tracing::{debug, info};

use super::error::Result;
use super::repository::ConfigRepository;
use super::types::{ConfigEntry, ExportOptions, ImportMode, ImportOptions, ListOptions};
use super::value::{ConfigRecord, ConfigValue};

/// Schema for the `config_kv` table.
pub const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS config_kv (
  id serial PRIMARY KEY,
  key text NOT NULL,
  value jsonb NOT NULL,
  updated_at timestamptz NOT NULL DEFAULT now()
);

CREATE UNIQUE INDEX IF NOT EXISTS config_kv_key_unique ON config_kv (key);
";

const SELECT_ENTRY: &str = "SELECT id, key, value, updated_at FROM config_kv WHERE key = $1";

// NULL limit/offset mean "no restriction" in PostgreSQL.
const SELECT_RANGE: &str = "SELECT id, key, value, updated_at FROM config_kv \
     WHERE ($1::text IS NULL OR key LIKE $1 ESCAPE '\\') \
     ORDER BY key COLLATE \"C\" ASC LIMIT $2 OFFSET $3";

const UPSERT: &str = "INSERT INTO config_kv (key, value, updated_at) VALUES ($1, $2, $3) \
     ON CONFLICT (key) DO UPDATE SET \
       value = EXCLUDED.value, \
       updated_at = GREATEST(EXCLUDED.updated_at, config_kv.updated_at)";

/// Default pool size when none is configured.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// PostgreSQL-backed configuration repository.
///
/// Owns a connection pool; `Clone` shares the pool.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Connects to `database_url` and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// schema cannot be created.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        info!(max_connections, "Connected to relational config store");
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub async fn from_pool(pool: PgPool) -> anyhow::Result<Self> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&pool)
            .await
            .context("Failed to initialize config_kv table")?;
        Ok(Self { pool })
    }

    /// Underlying pool, for callers that manage its lifetime.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Escapes `prefix` for use as a `LIKE ... ESCAPE '\'` starts-with pattern.
pub(crate) fn like_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn entry_from_row(row: &PgRow) -> anyhow::Result<ConfigEntry> {
    let id: i32 = row.try_get("id").context("Failed to read id column")?;
    let key: String = row.try_get("key").context("Failed to read key column")?;
    let Json(value): Json<ConfigValue> =
        row.try_get("value").context("Failed to read value column")?;
    let updated_at: DateTime<Utc> = row
        .try_get("updated_at")
        .context("Failed to read updated_at column")?;
    Ok(ConfigEntry {
        id: i64::from(id),
        key,
        value,
        updated_at,
    })
}

async fn select_entry<'e, E>(executor: E, key: &str) -> anyhow::Result<Option<ConfigEntry>>
where
    E: Executor<'e, Database = Postgres>,
{
    let row = sqlx::query(SELECT_ENTRY)
        .bind(key)
        .fetch_optional(executor)
        .await
        .with_context(|| format!("Failed to read key '{key}'"))?;
    row.as_ref().map(entry_from_row).transpose()
}

async fn upsert<'e, E>(executor: E, key: &str, value: &ConfigValue) -> anyhow::Result<()>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(UPSERT)
        .bind(key)
        .bind(Json(value))
        .bind(Utc::now())
        .execute(executor)
        .await
        .with_context(|| format!("Failed to upsert key '{key}'"))?;
    Ok(())
}

impl PostgresRepository {
    async fn select_range(
        &self,
        prefix: Option<&str>,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> anyhow::Result<Vec<ConfigEntry>> {
        let pattern = prefix.map(like_prefix_pattern);
        let limit = limit.map(i64::try_from).transpose().context("limit out of range")?;
        let offset = offset.map(i64::try_from).transpose().context("offset out of range")?;

        let rows = sqlx::query(SELECT_RANGE)
            .bind(pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to query config_kv")?;
        rows.iter().map(entry_from_row).collect()
    }
}

#[async_trait]
impl ConfigRepository for PostgresRepository {
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>> {
        Ok(select_entry(&self.pool, key).await?)
    }

    async fn set(&self, key: &str, value: ConfigValue) -> Result<ConfigEntry> {
        debug!(%key, "postgres set");
        upsert(&self.pool, key, &value).await?;
        let entry = select_entry(&self.pool, key)
            .await?
            .with_context(|| format!("Failed to persist config key '{key}'"))?;
        Ok(entry)
    }

    async fn unset(&self, key: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM config_kv WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to remove key '{key}'"))?;
        debug!(%key, removed = result.rows_affected(), "postgres unset");
        Ok(())
    }

    async fn list(&self, options: ListOptions) -> Result<Vec<ConfigEntry>> {
        Ok(self
            .select_range(options.prefix.as_deref(), options.limit, options.offset)
            .await?)
    }

    async fn import(
        &self,
        records: ConfigRecord,
        options: ImportOptions,
    ) -> Result<Vec<ConfigEntry>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin import transaction")?;

        if options.mode == ImportMode::Replace {
            let result = sqlx::query("DELETE FROM config_kv")
                .execute(&mut *tx)
                .await
                .context("Failed to clear config_kv")?;
            debug!(removed = result.rows_affected(), "Cleared config_kv for replace import");
        }

        // Every key is written and read back inside the transaction.
        let mut entries = Vec::with_capacity(records.len());
        for (key, value) in &records {
            upsert(&mut *tx, key, value).await?;
            if let Some(entry) = select_entry(&mut *tx, key).await? {
                entries.push(entry);
            }
        }

        tx.commit()
            .await
            .context("Failed to commit import transaction")?;

        entries.sort_by(|a, b| a.key.cmp(&b.key));
        info!(count = entries.len(), mode = %options.mode, "Imported config entries");
        Ok(entries)
    }

    async fn export(&self, options: ExportOptions) -> Result<ConfigRecord> {
        let entries = self
            .select_range(options.prefix.as_deref(), None, None)
            .await?;
        Ok(entries.into_iter().map(|e| (e.key, e.value)).collect())
    }
}
