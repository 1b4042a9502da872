//! Validated front door over any [`ConfigRepository`].

use anyhow::Result as AnyResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::error::Result;
use super::postgres::PostgresRepository;
use super::remote::RemoteRepository;
use super::repository::ConfigRepository;
use super::sqlite::SqliteRepository;
use super::types::{ConfigEntry, ExportOptions, ImportOptions, ListOptions};
use super::validation::{
    validate_entry, validate_export_options, validate_key, validate_list_options, validate_record,
};
use super::value::{ConfigRecord, ConfigValue};

/// Which backend a [`ConfigService`] should be opened over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Embedded SQLite database file.
    Sqlite { path: PathBuf },
    /// Embedded SQLite database held in memory.
    Memory,
    /// PostgreSQL server.
    Postgres {
        url: String,
        max_connections: u32,
    },
    /// Another instance of this service, reached over HTTP.
    Remote { base_url: String, timeout: Duration },
}

impl BackendConfig {
    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sqlite { .. } => "sqlite",
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
            Self::Remote { .. } => "remote",
        }
    }
}

/// Configuration store handle.
///
/// Wraps a [`ConfigRepository`] and validates every key, value, and option
/// struct before the backend sees it. Invalid input never reaches storage.
///
/// # Thread Safety
///
/// `ConfigService` is `Clone` and holds no mutable state of its own; clones
/// share the same backend.
///
/// # Example
///
/// ```ignore
/// use confkv::store::{ConfigService, ConfigValue};
///
/// let service = ConfigService::memory()?;
/// service.set("app.debug", ConfigValue::Bool(true)).await?;
/// let entry = service.get("app.debug").await?;
/// ```
#[derive(Clone)]
pub struct ConfigService {
    repo: Arc<dyn ConfigRepository>,
}

impl ConfigService {
    /// Opens the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be opened or connected.
    pub async fn open(config: &BackendConfig) -> AnyResult<Self> {
        debug!(backend = config.kind(), "Opening config backend");
        match config {
            BackendConfig::Sqlite { path } => Self::sqlite(path),
            BackendConfig::Memory => Self::memory(),
            BackendConfig::Postgres {
                url,
                max_connections,
            } => Self::postgres(url, *max_connections).await,
            BackendConfig::Remote { base_url, timeout } => Self::remote(base_url, *timeout),
        }
    }

    /// Creates a service over a SQLite database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn sqlite<P: AsRef<Path>>(path: P) -> AnyResult<Self> {
        Ok(Self::custom(SqliteRepository::open(path)?))
    }

    /// Creates a service over an in-memory SQLite database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn memory() -> AnyResult<Self> {
        Ok(Self::custom(SqliteRepository::memory()?))
    }

    /// Creates a service over a PostgreSQL pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or the schema cannot be
    /// created.
    pub async fn postgres(url: &str, max_connections: u32) -> AnyResult<Self> {
        Ok(Self::custom(
            PostgresRepository::connect(url, max_connections).await?,
        ))
    }

    /// Creates a service that forwards to a remote peer.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is unusable.
    pub fn remote(base_url: &str, timeout: Duration) -> AnyResult<Self> {
        Ok(Self::custom(RemoteRepository::new(base_url, timeout)?))
    }

    /// Creates a service over any repository implementation.
    pub fn custom<R: ConfigRepository>(repo: R) -> Self {
        Self {
            repo: Arc::new(repo),
        }
    }

    /// Creates a service from a boxed repository.
    pub fn from_boxed(repo: Box<dyn ConfigRepository>) -> Self {
        Self {
            repo: Arc::from(repo),
        }
    }

    /// Creates a service sharing an existing repository.
    pub fn from_arc(repo: Arc<dyn ConfigRepository>) -> Self {
        Self { repo }
    }

    /// Retrieves an entry by key.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed key, or the backend error.
    pub async fn get(&self, key: &str) -> Result<Option<ConfigEntry>> {
        validate_key(key)?;
        self.repo.get(key).await
    }

    /// Inserts or overwrites `key`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed key or value, or the
    /// backend error.
    pub async fn set(&self, key: &str, value: ConfigValue) -> Result<ConfigEntry> {
        validate_entry(key, &value)?;
        self.repo.set(key, value).await
    }

    /// Removes `key`; a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a malformed key, or the backend error.
    pub async fn unset(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.repo.unset(key).await
    }

    /// Lists entries in ascending key order.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad options, or the backend error.
    pub async fn list(&self, options: ListOptions) -> Result<Vec<ConfigEntry>> {
        validate_list_options(&options)?;
        self.repo.list(options).await
    }

    /// Bulk-writes `records`.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming every bad key or value, or the
    /// backend error.
    pub async fn import(
        &self,
        records: ConfigRecord,
        options: ImportOptions,
    ) -> Result<Vec<ConfigEntry>> {
        validate_record(&records)?;
        self.repo.import(records, options).await
    }

    /// Returns the store (or the keys under a prefix) as a key→value map.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad prefix, or the backend error.
    pub async fn export(&self, options: ExportOptions) -> Result<ConfigRecord> {
        validate_export_options(&options)?;
        self.repo.export(options).await
    }
}
