//! CLI command implementations for confkv.
//!
//! - [`config`] - get/set/unset/list/import/export against a local or remote store
//! - [`serve`] - HTTP API over PostgreSQL, a SQLite file, or memory
//! - [`values`] - lenient parsing of values typed on the command line

pub mod config;
pub mod serve;
pub mod values;

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::debug;

use confkv::config::Settings;
use confkv::paths;
use confkv::store::ConfigService;

/// Where a command's store lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Local,
    Remote,
}

/// A resolved store plus how it was reached.
pub struct StoreContext {
    pub service: ConfigService,
    pub mode: Mode,
}

impl StoreContext {
    /// Resolves the store for a config command.
    ///
    /// Resolution order:
    /// 1. `remote` (the `--remote` flag or `CONFKV_API_URL`), if non-blank
    /// 2. `[remote] url` from the settings file, if non-blank
    /// 3. The embedded database from [`paths::resolve_db_path`]
    ///
    /// # Errors
    ///
    /// Returns an error if the remote URL is unusable or the database
    /// cannot be opened.
    pub fn resolve(db: Option<&Path>, remote: Option<&str>, settings: &Settings) -> Result<Self> {
        let remote_url = remote
            .or(settings.remote.url.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty());

        if let Some(url) = remote_url {
            debug!(url, "Using remote config store");
            let service = ConfigService::remote(url, settings.remote.timeout())?;
            return Ok(Self {
                service,
                mode: Mode::Remote,
            });
        }

        let path = paths::resolve_db_path(db)?;
        debug!(path = %path.display(), "Using local config store");
        let service = ConfigService::sqlite(&path)?;
        Ok(Self {
            service,
            mode: Mode::Local,
        })
    }

    /// Context over an existing service, for tests.
    #[cfg(test)]
    pub fn local(service: ConfigService) -> Self {
        Self {
            service,
            mode: Mode::Local,
        }
    }
}

/// Reads all of standard input as UTF-8.
pub async fn read_stdin() -> Result<String> {
    let mut text = String::new();
    tokio::io::stdin()
        .read_to_string(&mut text)
        .await
        .context("Failed to read standard input")?;
    Ok(text)
}

/// Prints `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}

/// Settings file to use: the explicit path, or `confkv.toml` if present.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
}
