//! `confkv serve` - run the HTTP API.
//!
//! Storage selection, first match wins:
//! 1. `--database-url` / `DATABASE_URL` / `[storage] database_url` (PostgreSQL)
//! 2. `--db` / `[storage] path` (SQLite file)
//! 3. In-memory SQLite

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use confkv::config::Settings;
use confkv::server;
use confkv::store::ConfigService;

/// Command-line overrides for `serve`.
#[derive(Debug, Default, Clone)]
pub struct ServeOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub db: Option<PathBuf>,
}

/// Applies command-line overrides on top of file settings.
#[must_use]
pub fn apply_overrides(mut settings: Settings, overrides: ServeOverrides) -> Settings {
    if let Some(host) = overrides.host {
        settings.server.host = host;
    }
    if let Some(port) = overrides.port {
        settings.server.port = port;
    }
    if let Some(url) = overrides.database_url.filter(|u| !u.trim().is_empty()) {
        settings.storage.database_url = Some(url);
    }
    if let Some(path) = overrides.db {
        settings.storage.path = Some(path);
    }
    settings
}

/// Execute the serve command.
pub async fn execute(settings: Settings, overrides: ServeOverrides) -> Result<()> {
    let settings = apply_overrides(settings, overrides);
    let validation = settings.validate()?;
    for warning in &validation.warnings {
        warn!("{warning}");
    }

    let addr = settings.server.socket_addr()?;
    let backend = settings.storage.backend();
    info!(backend = backend.kind(), "Opening config store");
    let service = ConfigService::open(&backend)
        .await
        .with_context(|| format!("Failed to open {} config store", backend.kind()))?;

    server::serve_with_timeout(service, addr, settings.server.request_timeout()).await
}
