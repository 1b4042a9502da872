//! Typed key/value configuration store with pluggable backends.
//!
//! Every backend implements the same [`ConfigRepository`] contract:
//!
//! - **SqliteRepository**: embedded file (or in-memory) store, values kept as JSON text
//! - **PostgresRepository**: server-hosted store with native `jsonb` values
//! - **RemoteRepository**: forwards each call to another instance over HTTP
//!
//! Callers go through [`ConfigService`], which validates keys, values, and
//! options before a backend is touched.
//!
//! # Example
//!
//! ```ignore
//! use confkv::store::{BackendConfig, ConfigService, ConfigValue, ListOptions};
//!
//! let service = ConfigService::open(&BackendConfig::Memory).await?;
//! service.set("feature.beta", ConfigValue::Bool(true)).await?;
//! let entries = service.list(ListOptions::default().with_prefix("feature.")).await?;
//! ```
//!
//! # Custom Backends
//!
//! ```ignore
//! use confkv::store::{ConfigRepository, ConfigService};
//!
//! struct EtcdRepository { /* ... */ }
//! impl ConfigRepository for EtcdRepository { /* ... */ }
//!
//! let service = ConfigService::custom(EtcdRepository::new());
//! ```

mod error;
mod postgres;
mod remote;
mod repository;
mod service;
mod sqlite;
mod types;
mod validation;
mod value;


pub use error::{ProtocolError, Result, StoreError};
pub use postgres::{DEFAULT_MAX_CONNECTIONS, PostgresRepository};
pub use remote::{DEFAULT_TIMEOUT, RemoteRepository};
pub use repository::ConfigRepository;
pub use service::{BackendConfig, ConfigService};
pub use sqlite::SqliteRepository;
pub use types::{ConfigEntry, ExportOptions, ImportMode, ImportOptions, ListOptions};
pub use validation::{
    MAX_KEY_LEN, MAX_VALUE_DEPTH, ValidationError, ValidationIssue, record_from_json,
    validate_entry, validate_export_options, validate_key, validate_list_options, validate_record,
    validate_value,
};
pub use value::{ConfigRecord, ConfigValue};
