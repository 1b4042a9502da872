//! Repository trait for the configuration store.
//!
//! Defines the contract that every storage backend must satisfy identically,
//! enabling pluggable storage (SQLite, PostgreSQL, a remote peer, etc.).

use async_trait::async_trait;

use super::error::Result;
use super::types::{ConfigEntry, ExportOptions, ImportOptions, ListOptions};
use super::value::{ConfigRecord, ConfigValue};

/// Backend trait for configuration storage.
///
/// All backends must be thread-safe (`Send + Sync`) for use with tokio.
/// Callers are expected to go through [`ConfigService`](super::ConfigService),
/// which validates keys, values, and options first; implementations may
/// assume their inputs are well-formed.
///
/// # Contract
///
/// - `set` is an upsert. Overwriting a key keeps its id and refreshes
///   `updated_at` (never moving it backwards).
/// - `list` applies the prefix filter (plain starts-with), then ascending key
///   order, then offset/limit. `include_values` never changes which entries
///   are returned or their order.
/// - `import` returns the affected entries sorted by key. A replace import is
///   atomic: afterwards the store holds exactly the imported keys, or on
///   failure its previous contents.
/// - `export` is `list` restricted by prefix, reduced to a key→value map.
/// - `unset` of a missing key succeeds.
#[async_trait]
pub trait ConfigRepository: Send + Sync + 'static {
    /// Retrieves an entry by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>>;

    /// Inserts or overwrites a key and returns the stored entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn set(&self, key: &str, value: ConfigValue) -> Result<ConfigEntry>;

    /// Removes a key. Idempotent - safe to call for missing keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn unset(&self, key: &str) -> Result<()>;

    /// Lists entries ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn list(&self, options: ListOptions) -> Result<Vec<ConfigEntry>>;

    /// Bulk-writes `records` with merge or replace semantics.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails. A failed
    /// replace import leaves the store unchanged.
    async fn import(&self, records: ConfigRecord, options: ImportOptions)
    -> Result<Vec<ConfigEntry>>;

    /// Returns a plain key→value map of the (optionally prefix-filtered) store.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn export(&self, options: ExportOptions) -> Result<ConfigRecord>;
}
